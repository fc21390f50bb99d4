use std::fmt;

use tracing_subscriber::fmt::format::{FmtContext, FormatEvent, FormatFields, Writer};
use tracing_subscriber::registry::LookupSpan;

/// Initializes the global tracing subscriber.
///
/// `DEBUG` or `LOG` (any non-empty value) enables `debug`-level diagnostic
/// output; otherwise only `info` and above are shown. Every line carries the
/// `[dat-gateway]` prefix spec.md §6 requires, the same way the teacher's
/// `ando-server` binary configures `tracing_subscriber::fmt().with_env_filter`
/// at startup — this just swaps in a custom event formatter for the prefix.
pub fn init_tracing() {
    let default_level = if diagnostics_enabled() { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .event_format(PrefixedFormat)
        .init();
}

fn diagnostics_enabled() -> bool {
    non_empty_env("DEBUG") || non_empty_env("LOG")
}

fn non_empty_env(name: &str) -> bool {
    std::env::var(name).map(|v| !v.is_empty()).unwrap_or(false)
}

struct PrefixedFormat;

impl<S, N> FormatEvent<S, N> for PrefixedFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        write!(writer, "[dat-gateway] ")?;
        tracing_subscriber::fmt::format::Format::default().format_event(ctx, writer, event)
    }
}
