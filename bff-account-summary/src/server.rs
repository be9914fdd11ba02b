use std::future::Future;

use tokio::net::TcpListener;

use crate::accounts::MockAccounts;
use crate::config::Config;
use crate::router;

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let accounts = MockAccounts::new(config.accounts_base_url.clone());
    tracing::info!(accounts = %accounts.base_url(), "using mock accounts datasource");

    let app = router::router(
        crate::time::SystemTime {},
        accounts,
        config.export_prometheus,
    );

    tracing::info!("listening on {:?}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
