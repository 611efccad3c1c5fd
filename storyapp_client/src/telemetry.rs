use crate::utils::APP_NAME;
use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber, honouring `RUST_LOG` when set.
/// Later calls leave the first subscriber in place.
pub fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new(format!("{APP_NAME}=info")));
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
