mod cli;

use anyhow::Result;
use std::sync::Arc;
use storyline::RequestCoordinator;
use storyline::auth;
use storyline::backend::HttpBackend;
use storyline::credits::CreditGuard;
use storyline::session::SessionHandle;
use storyline::storage::ClientStorage;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let storage = ClientStorage::open_default();

    // The OAuth flow hands control back with a redirect query; accept it on
    // the command line so the token lands in storage before the first call.
    if let Some(query) = std::env::args()
        .nth(1)
        .and_then(|arg| arg.strip_prefix("--redirect=").map(str::to_string))
    {
        if let Some(credentials) = auth::parse_redirect_query(&query) {
            auth::store_credentials(&storage, &credentials).map_err(anyhow::Error::msg)?;
            tracing::info!("stored handed-off credentials");
        }
    }

    let backend = Arc::new(HttpBackend::from_env(storage.auth_token()));
    let coordinator = Arc::new(RequestCoordinator::new(
        backend,
        SessionHandle::new(),
        Arc::new(CreditGuard::default()),
    ));

    cli::run(coordinator, storage).await?;
    Ok(())
}
