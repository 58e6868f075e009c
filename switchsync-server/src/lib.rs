use std::sync::Arc;

use crate::app::AppContext;
use crate::configs::Settings;
use crate::services::scheduler::Clock;

pub mod app;
pub mod configs;
pub mod errors;
pub mod services;

pub async fn run(settings: &Settings, clock: Arc<dyn Clock>) -> anyhow::Result<()> {
    let address = settings.server_addr()?;
    let context = AppContext::create(settings, clock).await?;

    tracing::info!("listening on {:?}", address);

    tokio::select! {
        _ = services::serve(context.clone(), address, settings.accept_timeout()) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Received shutdown signal");
        }
    }

    context.shutdown().await;

    Ok(())
}
