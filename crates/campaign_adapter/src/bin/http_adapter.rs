#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};

use campaign_adapter::config::IntakeConfig;
use campaign_adapter::http::router;
use campaign_adapter::AdapterRuntime;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = IntakeConfig::default_from_env()?;
    info!(?config, "configuration loaded");
    if config.sendgrid.is_none() {
        warn!("CAMPAIGN_SENDGRID_API_KEY not set; one-time codes go to the log");
    }

    let runtime = Arc::new(Mutex::new(AdapterRuntime::from_config(&config)?));
    let app = router(runtime);

    let listener = TcpListener::bind(config.http_bind).await?;
    info!(addr = %config.http_bind, "campaign_adapter_http listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("campaign_adapter_http stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("received ctrl-c, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(err) => {
                warn!(error = %err, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
