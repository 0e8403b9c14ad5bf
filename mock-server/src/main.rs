use mock_server::{Backend, MockConfig};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "8090".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;

    let mut config = MockConfig::open();
    if let (Ok(email), Ok(password)) = (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD")) {
        config = config.with_admin(&email, &password);
    }
    if let (Ok(email), Ok(password)) = (std::env::var("USER_EMAIL"), std::env::var("USER_PASSWORD")) {
        config = config.with_account("users", &email, &password);
    }
    config.require_auth = std::env::var("REQUIRE_AUTH").is_ok_and(|v| v == "1" || v == "true");

    mock_server::run_with(listener, Backend::new(config)).await
}
