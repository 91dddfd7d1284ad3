use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

const APP_TARGET: &str = "aurum";
// HTTP client chatter is useful when a source misbehaves, but only at info.
const HTTP_TARGETS: [&str; 2] = ["reqwest", "hyper_util"];

/// Installs the global subscriber. Fetch and scheduler events are only shown
/// with `--verbose` unless `RUST_LOG` says otherwise.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "off" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().pretty().without_time())
        .with(log_targets(verbose))
        .with(env_filter)
        .init();
}

fn log_targets(verbose: bool) -> Targets {
    if !verbose {
        return Targets::new().with_target(APP_TARGET, LevelFilter::OFF);
    }
    HTTP_TARGETS
        .iter()
        .fold(Targets::new().with_target(APP_TARGET, LevelFilter::DEBUG), |targets, t| {
            targets.with_target(*t, LevelFilter::INFO)
        })
}
