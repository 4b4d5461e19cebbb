use tracing::Subscriber;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::{EnvFilter, Registry, fmt};

use crate::Result;
use crate::error::Error;

const FALLBACK_FILTER: &str = "info";

type Filtered = Layered<EnvFilter, Registry>;

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error when no filter candidate parses, when JSON output is
/// requested without the `json-logs` feature, or when a global subscriber is
/// already installed.
pub fn init_tracing(explicit_filter: Option<&str>, use_json: bool) -> Result<()> {
    let from_env = std::env::var("RUST_LOG").ok();
    let base = Registry::default().with(resolve_filter(explicit_filter, from_env.as_deref())?);

    if use_json {
        return install_json(base);
    }
    install(base.with(fmt::layer().with_target(true)))
}

/// First parseable candidate among the explicit filter, `RUST_LOG` and `info`.
fn resolve_filter(explicit: Option<&str>, from_env: Option<&str>) -> Result<EnvFilter> {
    explicit
        .into_iter()
        .chain(from_env)
        .chain(std::iter::once(FALLBACK_FILTER))
        .find_map(|candidate| EnvFilter::try_new(candidate).ok())
        .ok_or_else(|| Error::Telemetry("invalid log filter".to_string()))
}

#[cfg(feature = "json-logs")]
fn install_json(base: Filtered) -> Result<()> {
    install(
        base.with(
            fmt::layer()
                .json()
                .flatten_event(true)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        ),
    )
}

#[cfg(not(feature = "json-logs"))]
fn install_json(_base: Filtered) -> Result<()> {
    Err(Error::Telemetry(
        "JSON logs need the `json-logs` feature".to_string(),
    ))
}

fn install<S>(subscriber: S) -> Result<()>
where
    S: Subscriber + Send + Sync + 'static,
{
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| Error::Telemetry(err.to_string()))
}
