use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub imported_rows_total: IntCounterVec,
    pub sms_sent_total: IntCounterVec,
    pub status_transitions_total: IntCounterVec,
    pub products_total: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let imported_rows_total = IntCounterVec::new(
            Opts::new("imported_rows_total", "Spreadsheet rows processed by outcome"),
            &["outcome"],
        )
        .expect("valid imported_rows_total metric");

        let sms_sent_total = IntCounterVec::new(
            Opts::new("sms_sent_total", "SMS send attempts by outcome"),
            &["outcome"],
        )
        .expect("valid sms_sent_total metric");

        let status_transitions_total = IntCounterVec::new(
            Opts::new(
                "status_transitions_total",
                "Courier status confirmations by resulting status",
            ),
            &["status"],
        )
        .expect("valid status_transitions_total metric");

        let products_total = IntGauge::new("products_total", "Products currently stored")
            .expect("valid products_total metric");

        registry
            .register(Box::new(imported_rows_total.clone()))
            .expect("register imported_rows_total");
        registry
            .register(Box::new(sms_sent_total.clone()))
            .expect("register sms_sent_total");
        registry
            .register(Box::new(status_transitions_total.clone()))
            .expect("register status_transitions_total");
        registry
            .register(Box::new(products_total.clone()))
            .expect("register products_total");

        Self {
            registry,
            imported_rows_total,
            sms_sent_total,
            status_transitions_total,
            products_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
