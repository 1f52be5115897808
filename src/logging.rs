use std::{env, sync::Once};
use tracing_subscriber::{
    self as ts,
    filter::{EnvFilter, LevelFilter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Set to `1` to disable ANSI colors in log output.
pub const NO_COLOR_LOG_ENV: &str = "NO_COLOR_LOG";

static INIT: Once = Once::new();

/// Installs the global logger once per process. Later calls are no-ops.
pub fn init() {
    let no_color_log = env::var(NO_COLOR_LOG_ENV)
        .ok()
        .map(|val| val == "1")
        .unwrap_or(false);

    INIT.call_once(|| install_logger(!no_color_log));
}

/// Installs the [`tracing_subscriber`] handlers. Uses level INFO when `RUST_LOG` is unset.
pub fn install_logger(with_color: bool) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let layer = ts::fmt::layer().with_ansi(with_color).with_target(false);

    // A subscriber may already be installed by a test harness.
    let _ = ts::registry().with(env_filter).with(layer).try_init();
}
