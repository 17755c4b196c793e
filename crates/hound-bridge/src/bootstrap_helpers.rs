use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub(crate) fn default_log_level(debug: bool) -> LevelFilter {
    if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

/// `RUST_LOG` takes precedence over the config file's `debug` flag.
pub(crate) fn init_tracing(debug: bool) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_log_level(debug).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use tracing::level_filters::LevelFilter;

    use super::default_log_level;

    #[test]
    fn unit_debug_flag_selects_debug_level() {
        assert_eq!(default_log_level(true), LevelFilter::DEBUG);
        assert_eq!(default_log_level(false), LevelFilter::INFO);
    }
}
