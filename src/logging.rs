pub const LOG_ENV: &str = "PENNYBOOK_LOG";

/// Install the JSON tracing subscriber used by the standalone binaries.
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var(LOG_ENV).unwrap_or_else(|_| "pennybook=info,sqlx=warn".into()),
        )
        .json()
        .with_target(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .try_init();
}
