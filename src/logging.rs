use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    if config.is_production() {
        fmt().with_env_filter(filter).json().with_target(false).init();
    } else {
        fmt().with_env_filter(filter).with_target(false).compact().init();
    }
}
