//! `tracing-subscriber` setup shared by the binary (spec §6 `-d` flag):
//! a single `fmt` layer gated by `RUST_LOG` or an explicit level name,
//! with `log` macros bridged in via `tracing-log`.

use tracing_log::LogTracer;
use tracing_subscriber::{fmt, EnvFilter};

/// `trace|info|warn|error|off`, defaulting to `RUST_LOG` when `level` is
/// `None` (matching the `-d` flag's absence meaning "use the environment").
pub fn init(level: Option<&str>) {
    let _ = LogTracer::init();
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let subscriber = fmt().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_level_parses_as_an_env_filter() {
        let filter = EnvFilter::new("off");
        assert_eq!(filter.to_string(), "off");
    }
}
