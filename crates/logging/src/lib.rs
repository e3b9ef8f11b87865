use time::macros::format_description;
use tracing_subscriber::{EnvFilter, fmt::time::LocalTime};

/// Directive applied when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_DIRECTIVE: &str = "info,serenity=warn,songbird=warn";

pub fn initialize_logging() {
    let local_timer = LocalTime::new(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]+[offset_hour]:[offset_minute]"
    ));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_timer(local_timer)
        .with_target(true)
        .init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}
