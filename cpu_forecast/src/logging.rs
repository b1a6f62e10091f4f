//! Process-wide logger setup

use std::sync::Once;

use env_logger::Builder;
use log::LevelFilter;

static INIT: Once = Once::new();

/// Initialize `env_logger` once; `RUST_LOG` overrides the defaults
pub fn init_logger() {
    INIT.call_once_force(|_| {
        let mut builder = Builder::new();

        builder
            .filter_level(LevelFilter::Warn)
            .filter_module("cpu_forecast", LevelFilter::Info)
            .filter_module("cpu_forecast::pipeline", LevelFilter::Info)
            .filter_module("cpu_forecast::rollout", LevelFilter::Info)
            .format_timestamp_millis()
            .parse_default_env();

        // Another logger may already be installed by the host application
        let _ = builder.try_init();
    });
}

#[cfg(test)]
mod tests {
    use log::{debug, info};

    use super::*;

    #[test]
    fn test_init_logger_is_idempotent() {
        init_logger();
        init_logger();
        debug!("Debug message in test");
        info!("Info message in test");
    }
}
