use std::sync::Once;

/// Filter used when neither the config nor `RUST_LOG` provides one.
///
/// wgpu and naga are chatty at `info`; keep them at `warn` unless asked.
pub const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info", "warn",
/// "skyline_engine=debug,wgpu_core=warn").
///
/// `write_style` controls ANSI coloring behavior.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

impl LoggingConfig {
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self {
            env_filter: Some(filter.into()),
            ..Self::default()
        }
    }

    /// Explicit filter, then `env`, then [`DEFAULT_FILTER`].
    fn resolve_filter(&self, env: Option<String>) -> String {
        self.env_filter
            .clone()
            .filter(|f| !f.trim().is_empty())
            .or(env)
            .unwrap_or_else(|| DEFAULT_FILTER.to_string())
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once.
///
/// This function is idempotent; subsequent calls are ignored.
/// Intended usage is early in `main`.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = config.resolve_filter(std::env::var("RUST_LOG").ok());

        let mut builder = env_logger::Builder::new();
        builder.parse_filters(&filter);
        builder.write_style(config.write_style);
        // Another logger may already be installed (tests, embedding hosts).
        if builder.try_init().is_err() {
            return;
        }

        log::debug!("logging initialized with `{filter}`");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filter_wins() {
        let config = LoggingConfig::with_filter("debug");
        assert_eq!(config.resolve_filter(Some("warn".into())), "debug");
    }

    #[test]
    fn env_then_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.resolve_filter(Some("warn".into())), "warn");
        assert_eq!(config.resolve_filter(None), DEFAULT_FILTER);
        assert_eq!(LoggingConfig::with_filter("  ").resolve_filter(None), DEFAULT_FILTER);
    }

    #[test]
    fn repeated_init_is_harmless() {
        init_logging(LoggingConfig::default());
        init_logging(LoggingConfig::with_filter("trace"));
    }
}
