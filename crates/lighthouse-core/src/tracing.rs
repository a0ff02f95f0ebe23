use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize stdout tracing for one Lighthouse service.
///
/// Output is JSON so fleet log shippers can ingest it; set
/// `LIGHTHOUSE_LOG_FORMAT=text` for a compact human-readable format when
/// running a service by hand. Filtering comes from `RUST_LOG` and defaults
/// to `info`. The service name is stamped on the first event so interleaved
/// logs from co-located services stay attributable.
///
/// Safe to call multiple times — subsequent calls are silently ignored.
pub fn init_tracing(service: &'static str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let text = std::env::var("LIGHTHOUSE_LOG_FORMAT")
        .is_ok_and(|format| format.eq_ignore_ascii_case("text"));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if text {
        registry.with(fmt::layer().compact()).try_init().is_ok()
    } else {
        registry.with(fmt::layer().json()).try_init().is_ok()
    };
    if installed {
        info!(service, "tracing initialized");
    }
}
