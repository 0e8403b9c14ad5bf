use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, app_with, Backend, MockConfig, Record};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn with_token(mut req: Request<String>, token: &str) -> Request<String> {
    req.headers_mut().insert(
        http::header::AUTHORIZATION,
        format!("Bearer {token}").parse().unwrap(),
    );
    req
}

const RECORDS: &str = "/api/collections/posts/records";

// --- list ---

#[tokio::test]
async fn list_unknown_collection_is_empty() {
    let resp = app().oneshot(get(RECORDS)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let list: Value = body_json(resp).await;
    assert_eq!(list["page"], 1);
    assert_eq!(list["perPage"], 30);
    assert_eq!(list["totalItems"], 0);
    assert_eq!(list["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn list_paginates_and_sorts() {
    let backend = Backend::new(MockConfig::open());
    for n in [3, 1, 2] {
        let resp = app_with(backend.clone())
            .oneshot(json_request("POST", RECORDS, &format!(r#"{{"n":{n}}}"#)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = app_with(backend.clone())
        .oneshot(get(&format!("{RECORDS}?page=2&perPage=2&sort=-n")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let list: Value = body_json(resp).await;
    assert_eq!(list["page"], 2);
    assert_eq!(list["perPage"], 2);
    assert_eq!(list["totalItems"], 3);
    assert_eq!(list["totalPages"], 2);
    let items = list["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["n"], 1);

    let log = backend.requests().await;
    let last = log.last().unwrap();
    assert_eq!(last.query_value("perPage"), Some("2"));
    assert_eq!(last.query_value("sort"), Some("-n"));
}

// --- create ---

#[tokio::test]
async fn create_assigns_system_fields() {
    let resp = app()
        .oneshot(json_request("POST", RECORDS, r#"{"title":"Hello","id":"forged"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let record: Record = body_json(resp).await;
    assert_eq!(record["title"], "Hello");
    assert_eq!(record["collectionName"], "posts");
    assert_ne!(record["id"], "forged");
    assert_eq!(record["id"].as_str().unwrap().len(), 15);
    assert!(record["created"].is_string());
}

#[tokio::test]
async fn create_malformed_json_is_rejected() {
    let resp = app()
        .oneshot(json_request("POST", RECORDS, "not json"))
        .await
        .unwrap();

    assert!(resp.status().is_client_error());
}

// --- get / update / delete ---

#[tokio::test]
async fn get_record_not_found() {
    let resp = app().oneshot(get(&format!("{RECORDS}/missing"))).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = body_json(resp).await;
    assert_eq!(body["code"], 404);
}

#[tokio::test]
async fn update_record_not_found() {
    let resp = app()
        .oneshot(json_request("PATCH", &format!("{RECORDS}/missing"), r#"{"title":"x"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_record_not_found() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("{RECORDS}/missing"))
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- auth ---

#[tokio::test]
async fn password_login_issues_token() {
    let backend = Backend::new(MockConfig::secured().with_account("users", "a@b.c", "pw"));
    let resp = app_with(backend)
        .oneshot(json_request(
            "POST",
            "/api/collections/users/auth-with-password",
            r#"{"identity":"a@b.c","password":"pw"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert!(!body["token"].as_str().unwrap().is_empty());
    assert_eq!(body["record"]["email"], "a@b.c");
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let backend = Backend::new(MockConfig::secured().with_admin("root@x", "pw"));
    let resp = app_with(backend)
        .oneshot(json_request(
            "POST",
            "/api/admins/auth-with-password",
            r#"{"identity":"root@x","password":"nope"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = body_json(resp).await;
    assert_eq!(body["message"], "Failed to authenticate.");
}

#[tokio::test]
async fn refresh_rejects_unknown_token() {
    let resp = app()
        .oneshot(with_token(
            json_request("POST", "/api/admins/auth-refresh", ""),
            "bogus",
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn secured_records_need_token() {
    let backend = Backend::new(MockConfig::secured());
    let resp = app_with(backend).oneshot(get(RECORDS)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- full lifecycle ---

#[tokio::test]
async fn secured_crud_lifecycle() {
    use tower::Service;

    let backend = Backend::new(MockConfig::secured().with_admin("root@x", "pw"));
    let mut app = app_with(backend.clone()).into_service();

    // login
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/api/admins/auth-with-password",
            r#"{"identity":"root@x","password":"pw"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let login: Value = body_json(resp).await;
    let token = login["token"].as_str().unwrap().to_string();

    // refresh rotates the token
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(with_token(
            json_request("POST", "/api/admins/auth-refresh", ""),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let refreshed: Value = body_json(resp).await;
    let token = refreshed["token"].as_str().unwrap().to_string();

    // create
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(with_token(
            json_request("POST", RECORDS, r#"{"title":"Walk dog"}"#),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let created: Record = body_json(resp).await;
    let id = created["id"].as_str().unwrap().to_string();

    // update
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(with_token(
            json_request("PATCH", &format!("{RECORDS}/{id}"), r#"{"title":"Walk cat"}"#),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Record = body_json(resp).await;
    assert_eq!(updated["title"], "Walk cat");
    assert_eq!(updated["created"], created["created"]);

    // get
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(with_token(get(&format!("{RECORDS}/{id}")), &token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: Record = body_json(resp).await;
    assert_eq!(fetched["title"], "Walk cat");

    // delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(with_token(
            Request::builder()
                .method("DELETE")
                .uri(format!("{RECORDS}/{id}"))
                .body(String::new())
                .unwrap(),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    assert!(backend.records("posts").await.is_empty());
    let log = backend.requests().await;
    assert_eq!(log.len(), 6);
    assert!(log[2..].iter().all(|r| r.authorization.as_deref() == Some(token.as_str())));
}
