use std::sync::Arc;

use switchsync_server::configs::Settings;
use switchsync_server::run;
use switchsync_server::services::scheduler::LocalClock;

fn main() -> anyhow::Result<()> {
    let settings = Settings::new().expect("Failed to load settings.");

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let app_name = env!("CARGO_PKG_NAME").replace('-', "_");
            let level = settings.logger.level.as_str();

            format!("{app_name}={level},switchsync_api={level}").into()
        }))
        .init();

    // The local offset can only be read while the process is single threaded
    let clock = Arc::new(LocalClock::detect());

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(&settings, clock))
}
