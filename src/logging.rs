//! Diagnostic output for sortify.
//!
//! Engine components log through [`log_event!`] and [`debug_event!`], which
//! prefix each line with the component tag (`[mover]`, `[watcher]`,
//! `[organize]`, ...). Moves are logged at `info`, suppressed echoes and
//! skipped files at `debug`. Everything goes to stderr; stdout carries only
//! command output and `--json` documents.
//!
//! Levels come from the `[logging]` table of `settings.toml`, which the
//! settings layer also fills from `SORTIFY_LOGGING__*` variables:
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! "sortify::watcher" = "debug"
//! notify = "error"
//! ```
//!
//! A set `RUST_LOG` replaces the table entirely:
//! ```bash
//! RUST_LOG=sortify::mover=debug sortify organize ~/Downloads
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Wall-clock `HH:MM:SS.mmm`; a watch session rarely spans days.
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// `default,module=level,...`, modules sorted so the result is stable.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();
    std::iter::once(config.default.clone())
        .chain(modules.into_iter().map(|(module, level)| format!("{module}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber for this process.
///
/// Later calls are no-ops, so tests and the CLI can both call it freely.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// Subscriber for commands that run before settings exist (`init`).
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// `info` line tagged with the engine component that produced it.
///
/// # Examples
/// ```ignore
/// log_event!("organize", "moved", "{} -> {}", from.display(), to.display());
/// log_event!("supervisor", "started");
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Same as [`log_event!`] at `debug`, for per-file noise.
///
/// # Examples
/// ```ignore
/// debug_event!("watcher", "suppressed", "{}", path.display());
/// ```
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives() {
        let mut config = LoggingConfig::default();
        assert_eq!(filter_directives(&config), "warn");

        config.modules.insert("sortify::watcher".into(), "debug".into());
        config.modules.insert("notify".into(), "error".into());
        assert_eq!(
            filter_directives(&config),
            "warn,notify=error,sortify::watcher=debug"
        );
    }
}
