use std::borrow::Cow;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// Build a `tracing` dispatcher configured for:
/// - JSON logs to stdout
/// - EnvFilter that respects `RUST_LOG` (takes precedence) and falls back to `default_level`
///
/// The library itself only emits events; hosts decide whether to install
/// this dispatcher or their own subscriber.
pub fn build_dispatch(
    service_name: impl Into<Cow<'static, str>>,
    default_level: &str,
) -> tracing::Dispatch {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .json();

    let service_name = service_name.into();
    tracing::debug!(service = %service_name, "building tracing dispatch");

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    tracing::Dispatch::new(subscriber)
}
