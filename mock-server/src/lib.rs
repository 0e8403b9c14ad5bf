use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub type Record = Map<String, Value>;

/// Scope name used for admin accounts; every other scope is an auth
/// collection name.
pub const ADMIN_SCOPE: &str = "_admins";

const DEFAULT_PER_PAGE: u32 = 30;
const MAX_PER_PAGE: u32 = 500;
const SYSTEM_FIELDS: [&str; 5] = ["id", "collectionId", "collectionName", "created", "updated"];

/// One request as seen by the server, for test assertions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RequestLog {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub authorization: Option<String>,
}

impl RequestLog {
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// Accounts and access rules the server starts with.
#[derive(Clone, Debug, Default)]
pub struct MockConfig {
    /// Reject record requests that carry no valid token.
    pub require_auth: bool,
    accounts: Vec<(String, String, String)>,
}

impl MockConfig {
    pub fn open() -> Self {
        Self::default()
    }

    pub fn secured() -> Self {
        Self {
            require_auth: true,
            accounts: Vec::new(),
        }
    }

    pub fn with_admin(self, email: &str, password: &str) -> Self {
        self.with_account(ADMIN_SCOPE, email, password)
    }

    /// Add an account to the auth collection `scope`.
    pub fn with_account(mut self, scope: &str, identity: &str, password: &str) -> Self {
        self.accounts
            .push((scope.to_string(), identity.to_string(), password.to_string()));
        self
    }
}

#[derive(Default)]
struct Db {
    require_auth: bool,
    accounts: HashMap<(String, String), String>,
    tokens: HashMap<String, String>,
    collections: HashMap<String, Vec<Record>>,
    requests: Vec<RequestLog>,
}

/// Shared server state. Cloning yields another handle to the same data.
#[derive(Clone, Default)]
pub struct Backend {
    db: Arc<RwLock<Db>>,
}

impl Backend {
    pub fn new(config: MockConfig) -> Self {
        let accounts = config
            .accounts
            .into_iter()
            .map(|(scope, identity, password)| ((scope, identity), password))
            .collect();
        let db = Db {
            require_auth: config.require_auth,
            accounts,
            ..Db::default()
        };
        Self {
            db: Arc::new(RwLock::new(db)),
        }
    }

    pub async fn requests(&self) -> Vec<RequestLog> {
        self.db.read().await.requests.clone()
    }

    /// For callers outside the server's runtime.
    pub fn requests_blocking(&self) -> Vec<RequestLog> {
        self.db.blocking_read().requests.clone()
    }

    pub async fn records(&self, collection: &str) -> Vec<Record> {
        self.db
            .read()
            .await
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn records_blocking(&self, collection: &str) -> Vec<Record> {
        self.db
            .blocking_read()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

/// Error body in the backend's `{code, message, data}` shape.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    fn new(status: StatusCode, message: &'static str) -> Self {
        Self { status, message }
    }

    fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "The requested resource wasn't found.")
    }

    fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "The request requires valid record authorization token to be set.",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "code": self.status.as_u16(),
            "message": self.message,
            "data": {},
        });
        (self.status, Json(body)).into_response()
    }
}

#[derive(Deserialize)]
pub struct PasswordLogin {
    pub identity: String,
    pub password: String,
}

#[derive(Deserialize, Default)]
pub struct ListQuery {
    pub page: Option<u32>,
    #[serde(rename = "perPage")]
    pub per_page: Option<u32>,
    pub sort: Option<String>,
    pub filter: Option<String>,
}

pub fn app() -> Router {
    app_with(Backend::new(MockConfig::open()))
}

pub fn app_with(backend: Backend) -> Router {
    Router::new()
        .route("/api/admins/auth-with-password", post(admin_auth_with_password))
        .route("/api/admins/auth-refresh", post(admin_auth_refresh))
        .route(
            "/api/collections/{collection}/auth-with-password",
            post(collection_auth_with_password),
        )
        .route(
            "/api/collections/{collection}/auth-refresh",
            post(collection_auth_refresh),
        )
        .route(
            "/api/collections/{collection}/records",
            get(list_records).post(create_record),
        )
        .route(
            "/api/collections/{collection}/records/{id}",
            get(get_record).patch(update_record).delete(delete_record),
        )
        .layer(middleware::from_fn_with_state(backend.clone(), log_request))
        .with_state(backend)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, Backend::new(MockConfig::open())).await
}

pub async fn run_with(listener: TcpListener, backend: Backend) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock records server listening");
    }
    axum::serve(listener, app_with(backend)).await
}

async fn log_request(State(backend): State<Backend>, request: Request, next: Next) -> Response {
    let query = Query::<Vec<(String, String)>>::try_from_uri(request.uri())
        .map(|Query(pairs)| pairs)
        .unwrap_or_default();
    let entry = RequestLog {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        query,
        authorization: bearer_token(request.headers()).map(str::to_string),
    };
    debug!(method = %entry.method, path = %entry.path, "request");
    backend.db.write().await.requests.push(entry);
    next.run(request).await
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    Some(value.strip_prefix("Bearer ").unwrap_or(value))
}

fn has_id(record: &Record, id: &str) -> bool {
    record.get("id").and_then(Value::as_str) == Some(id)
}

fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

fn new_record_id() -> String {
    Uuid::new_v4().simple().to_string()[..15].to_string()
}

fn timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3fZ").to_string()
}

// --- auth ---

async fn admin_auth_with_password(
    State(backend): State<Backend>,
    Json(login): Json<PasswordLogin>,
) -> Result<Json<Value>, ApiError> {
    password_login(&backend, ADMIN_SCOPE, login).await
}

async fn collection_auth_with_password(
    State(backend): State<Backend>,
    Path(collection): Path<String>,
    Json(login): Json<PasswordLogin>,
) -> Result<Json<Value>, ApiError> {
    password_login(&backend, &collection, login).await
}

async fn password_login(
    backend: &Backend,
    scope: &str,
    login: PasswordLogin,
) -> Result<Json<Value>, ApiError> {
    let mut db = backend.db.write().await;
    let key = (scope.to_string(), login.identity.clone());
    if db.accounts.get(&key) != Some(&login.password) {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Failed to authenticate."));
    }
    let token = new_token();
    db.tokens.insert(token.clone(), scope.to_string());
    Ok(Json(auth_body(scope, &login.identity, &token)))
}

async fn admin_auth_refresh(
    State(backend): State<Backend>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    refresh(&backend, ADMIN_SCOPE, &headers).await
}

async fn collection_auth_refresh(
    State(backend): State<Backend>,
    Path(collection): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    refresh(&backend, &collection, &headers).await
}

async fn refresh(backend: &Backend, scope: &str, headers: &HeaderMap) -> Result<Json<Value>, ApiError> {
    let current = bearer_token(headers).ok_or_else(ApiError::unauthorized)?;
    let mut db = backend.db.write().await;
    if db.tokens.get(current).map(String::as_str) != Some(scope) {
        return Err(ApiError::unauthorized());
    }
    let token = new_token();
    db.tokens.insert(token.clone(), scope.to_string());
    Ok(Json(auth_body(scope, "", &token)))
}

fn auth_body(scope: &str, identity: &str, token: &str) -> Value {
    let subject = json!({ "id": new_record_id(), "email": identity });
    if scope == ADMIN_SCOPE {
        json!({ "token": token, "admin": subject })
    } else {
        json!({ "token": token, "record": subject })
    }
}

async fn authorize(backend: &Backend, headers: &HeaderMap) -> Result<(), ApiError> {
    let db = backend.db.read().await;
    if !db.require_auth {
        return Ok(());
    }
    match bearer_token(headers) {
        Some(token) if db.tokens.contains_key(token) => Ok(()),
        _ => Err(ApiError::unauthorized()),
    }
}

// --- records ---

async fn list_records(
    State(backend): State<Backend>,
    Path(collection): Path<String>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    authorize(&backend, &headers).await?;
    let mut items = backend.records(&collection).await;

    if let Some(sort) = query.sort.as_deref().filter(|s| !s.is_empty()) {
        items.sort_by(|a, b| compare_by(a, b, sort));
    }

    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    let page = query.page.unwrap_or(1).max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(per_page as usize);
    let start = (page as usize - 1) * per_page as usize;
    let page_items: Vec<Record> = items.into_iter().skip(start).take(per_page as usize).collect();

    Ok(Json(json!({
        "page": page,
        "perPage": per_page,
        "totalItems": total_items,
        "totalPages": total_pages,
        "items": page_items,
    })))
}

/// Order by a comma separated list of fields, `-field` for descending.
fn compare_by(a: &Record, b: &Record, sort: &str) -> Ordering {
    for field in sort.split(',').map(str::trim).filter(|f| !f.is_empty()) {
        let (name, descending) = match field.strip_prefix('-') {
            Some(name) => (name, true),
            None => (field.strip_prefix('+').unwrap_or(field), false),
        };
        let ord = compare_values(a.get(name), b.get(name));
        let ord = if descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

async fn create_record(
    State(backend): State<Backend>,
    Path(collection): Path<String>,
    headers: HeaderMap,
    Json(input): Json<Record>,
) -> Result<Json<Record>, ApiError> {
    authorize(&backend, &headers).await?;
    let now = timestamp();
    let mut record: Record = input
        .into_iter()
        .filter(|(k, _)| !SYSTEM_FIELDS.contains(&k.as_str()))
        .collect();
    record.insert("id".to_string(), Value::String(new_record_id()));
    record.insert(
        "collectionId".to_string(),
        Value::String(format!("col_{collection}")),
    );
    record.insert("collectionName".to_string(), Value::String(collection.clone()));
    record.insert("created".to_string(), Value::String(now.clone()));
    record.insert("updated".to_string(), Value::String(now));

    backend
        .db
        .write()
        .await
        .collections
        .entry(collection)
        .or_default()
        .push(record.clone());
    Ok(Json(record))
}

async fn get_record(
    State(backend): State<Backend>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Record>, ApiError> {
    authorize(&backend, &headers).await?;
    let db = backend.db.read().await;
    db.collections
        .get(&collection)
        .and_then(|records| records.iter().find(|r| has_id(r, &id)))
        .cloned()
        .map(Json)
        .ok_or_else(ApiError::not_found)
}

async fn update_record(
    State(backend): State<Backend>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(input): Json<Record>,
) -> Result<Json<Record>, ApiError> {
    authorize(&backend, &headers).await?;
    let mut db = backend.db.write().await;
    let record = db
        .collections
        .get_mut(&collection)
        .and_then(|records| records.iter_mut().find(|r| has_id(r, &id)))
        .ok_or_else(ApiError::not_found)?;
    for (key, value) in input {
        if !SYSTEM_FIELDS.contains(&key.as_str()) {
            record.insert(key, value);
        }
    }
    record.insert("updated".to_string(), Value::String(timestamp()));
    Ok(Json(record.clone()))
}

async fn delete_record(
    State(backend): State<Backend>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    authorize(&backend, &headers).await?;
    let mut db = backend.db.write().await;
    let records = db.collections.get_mut(&collection).ok_or_else(ApiError::not_found)?;
    let before = records.len();
    records.retain(|r| !has_id(r, &id));
    if records.len() == before {
        return Err(ApiError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
