use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Install the stderr subscriber. `RUST_LOG` wins over `level`; stdout is
/// left alone for command output.
pub fn init_tracing(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    // A second init (tests, embedding) keeps the first subscriber
    let _ = Registry::default()
        .with(env_filter)
        .with(stderr_layer)
        .try_init();
}
