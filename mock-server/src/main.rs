use std::sync::Arc;

use mock_server::MockApi;
use tokio::{net::TcpListener, sync::RwLock};

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "8000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;

    let mut api = MockApi::demo();
    api.api_key = std::env::var("API_KEY").ok().filter(|k| !k.is_empty());

    println!("listening on {addr}");
    mock_server::run_with(listener, Arc::new(RwLock::new(api))).await
}
