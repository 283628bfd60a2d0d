//! Prometheus metrics.
//!
//! All metrics live under the `mergefee` namespace and carry a constant
//! `service` label. Gauges reflect the last reconciliation sweep; counters
//! track events and actions since process start.

use std::collections::HashMap;

use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,

    /// Open pull requests seen by the last sweep.
    pub open_pull_requests: IntGauge,

    /// Open pull requests still expecting a payment, per the last sweep.
    pub pull_requests_awaiting_payment: IntGauge,

    /// PR-created notifications received.
    pub pull_requests_created: IntCounter,

    /// Incoming payments detected.
    pub payments_detected: IntCounter,
}

impl Metrics {
    pub fn new(service_name: &str) -> Result<Metrics, prometheus::Error> {
        let labels = HashMap::from([("service".to_string(), service_name.to_string())]);
        let registry = Registry::new_custom(Some("mergefee".to_string()), Some(labels))?;

        let open_pull_requests = IntGauge::with_opts(Opts::new(
            "state_pullrequests_open",
            "Current number of open pull requests",
        ))?;
        registry.register(Box::new(open_pull_requests.clone()))?;

        let pull_requests_awaiting_payment = IntGauge::with_opts(Opts::new(
            "state_pullrequests_to_pay",
            "Current number of pull requests expecting a payment",
        ))?;
        registry.register(Box::new(pull_requests_awaiting_payment.clone()))?;

        let pull_requests_created = IntCounter::with_opts(Opts::new(
            "event_pullrequests_created",
            "Number of PR created notifications received",
        ))?;
        registry.register(Box::new(pull_requests_created.clone()))?;

        let payments_detected = IntCounter::with_opts(Opts::new(
            "action_payments_detected",
            "Number of incoming payments detected so far",
        ))?;
        registry.register(Box::new(payments_detected.clone()))?;

        Ok(Metrics {
            registry,
            open_pull_requests,
            pull_requests_awaiting_payment,
            pull_requests_created,
            payments_detected,
        })
    }

    /// Renders the registry in the Prometheus text exposition format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| prometheus::Error::Msg(format!("metrics output is not UTF-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_and_export() {
        let metrics = Metrics::new("merge-fee-bot").unwrap();
        metrics.open_pull_requests.set(7);
        metrics.pull_requests_awaiting_payment.set(3);
        metrics.payments_detected.inc();

        let output = metrics.export().unwrap();
        assert!(output.contains("mergefee_state_pullrequests_open"));
        assert!(output.contains("mergefee_state_pullrequests_to_pay"));
        assert!(output.contains("mergefee_action_payments_detected"));
        assert!(output.contains("service=\"merge-fee-bot\""));
    }

    #[test]
    fn counters_accumulate() {
        let metrics = Metrics::new("test").unwrap();
        metrics.pull_requests_created.inc();
        metrics.pull_requests_created.inc();
        assert_eq!(metrics.pull_requests_created.get(), 2);
    }
}
