use crate::policy::current_policy;
use once_cell::sync::OnceCell;
use tracing::{span, Level, Span};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

static INIT: OnceCell<()> = OnceCell::new();

/// Installs the global subscriber once, writing to stderr. Later calls are
/// no-ops, as is the first call when the observe policy disables tracing.
pub fn init_tracing() {
    INIT.get_or_init(|| {
        let policy = current_policy();
        if !policy.enable_tracing {
            return;
        }
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(policy.default_filter.as_str()));
        let fmt_layer = if policy.log_json {
            fmt::layer()
                .json()
                .with_target(true)
                .with_writer(std::io::stderr)
                .boxed()
        } else {
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_thread_ids(true)
                .with_writer(std::io::stderr)
                .boxed()
        };
        let subscriber = Registry::default().with(filter).with(fmt_layer);
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

pub fn screen_span(screen: &str) -> Span {
    span!(Level::INFO, "screen", screen = %screen)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent_and_spans_enter() {
        init_tracing();
        init_tracing();
        let span = screen_span("unit_test");
        span.in_scope(|| tracing::debug!(frames = 3, "inside screen span"));
    }
}
