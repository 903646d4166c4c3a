//! Attaches exchange timings to profiler sessions

use tracing::debug;

use crate::config::RecorderConfig;
use crate::exchange::Exchange;
use crate::profiling::{Profiler, TimingRecord};

use super::diagnostic::build_diagnostic_text_with;
use super::ELASTICSEARCH_CATEGORY;

/// Turns completed exchanges into custom timings
///
/// Holds only configuration; every call is independent and infallible.
#[derive(Debug, Clone, Default)]
pub struct ResponseRecorder {
    config: RecorderConfig,
}

impl ResponseRecorder {
    /// Create a recorder
    #[must_use]
    pub fn new(config: RecorderConfig) -> Self {
        Self { config }
    }

    /// Record one completed exchange against `profiler`
    ///
    /// Nothing happens when there is no profiler, the profiler has no head
    /// node, or the exchange carries no metrics.
    pub fn handle_exchange<P>(&self, exchange: &Exchange, profiler: Option<&P>)
    where
        P: Profiler + ?Sized,
    {
        if !self.config.enabled {
            return;
        }

        let Some(profiler) = profiler else {
            return;
        };

        let Some(head) = profiler.head() else {
            debug!(url = %exchange.request_url, "No active timing node, skipping exchange");
            return;
        };

        let Some(metrics) = exchange.metrics.as_ref() else {
            debug!(url = %exchange.request_url, "Exchange has no metrics, skipping");
            return;
        };

        let timing = TimingRecord::new(
            ELASTICSEARCH_CATEGORY,
            metrics.total_elapsed_ms(),
            exchange.request_method.clone(),
            build_diagnostic_text_with(exchange, &self.config),
        );

        debug!(
            method = %exchange.request_method,
            status = exchange.status_code_or_zero(),
            retries = exchange.number_of_retries,
            duration_ms = timing.duration_ms,
            "Recorded exchange"
        );

        profiler.add_custom_timing(head, ELASTICSEARCH_CATEGORY, timing);
    }
}
