use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};
use std::env;

/// Initialize logging for the viewer binary.
pub fn init_logging() {
    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new(&log_level);
        filter = filter.add_directive("skinview_rust=debug".parse().unwrap());
        // wgpu is chatty at debug; keep it at warn unless asked for
        filter = filter.add_directive("wgpu_core=warn".parse().unwrap());
        filter = filter.add_directive("wgpu_hal=warn".parse().unwrap());
        filter
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .init();

    std::panic::set_hook(Box::new(|panic_info| {
        tracing::error!("Panic occurred: {}", panic_info);
        if let Some(location) = panic_info.location() {
            tracing::error!(
                "Panic location: {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        }
    }));

    tracing::info!("Logging initialized with level: {}", log_level);
}
