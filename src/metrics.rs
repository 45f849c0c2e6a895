use fusionsolar_bridge::sink::Sink;
use fusionsolar_bridge::Error;
use prometheus::{Encoder, GaugeVec, IntCounterVec, TextEncoder};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

lazy_static! {
    static ref CHANNEL_GAUGE: GaugeVec = register_gauge_vec!(
        opts!(
            "fusionsolar_channel",
            "latest value published to a channel (W or %, see `unit`)",
        ),
        &["channel", "name", "unit"],
    )
    .unwrap();
    static ref POLL_CYCLES: IntCounterVec = register_int_counter_vec!(
        opts!("fusionsolar_poll_cycles", "number of poll cycles by result",),
        &["result"],
    )
    .unwrap();
}

/// Sink exposing every channel as a Prometheus gauge.
#[derive(Default)]
pub struct PrometheusSink {
    /// ident -> (display name, unit)
    channels: Mutex<HashMap<String, (String, String)>>,
}

impl Sink for PrometheusSink {
    fn register_channel(&self, ident: &str, name: &str, unit: &str) {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ident.to_owned(), (name.to_owned(), unit.to_owned()));
    }

    fn publish(&self, ident: &str, value: f64) {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);

        match channels.get(ident) {
            Some((name, unit)) => CHANNEL_GAUGE
                .with_label_values(&[ident, name.as_str(), unit.as_str()])
                .set(value),
            None => log::warn!("value {} for unregistered channel {}", value, ident),
        }
    }
}

pub fn record_cycle(success: bool) {
    POLL_CYCLES
        .with_label_values(&[if success { "ok" } else { "failed" }])
        .inc();
}

/// Read metrics from Prometheus exporter registry.
pub async fn read() -> Result<String, Error> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    encoder
        .encode(&metric_families, &mut buffer)
        .or(Err(Error::InternalError))?;
    String::from_utf8(buffer).or(Err(Error::InternalError))
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn published_channels_are_exported() {
        let sink = PrometheusSink::default();
        sink.register_channel("INV_42", "Inverter Roof", "W");
        sink.publish("INV_42", 1234.5);
        sink.publish("INV_unknown", 1.0);
        record_cycle(true);

        let text = read().await.unwrap();

        assert!(text.contains(
            r#"fusionsolar_channel{channel="INV_42",name="Inverter Roof",unit="W"} 1234.5"#
        ));
        assert!(!text.contains("INV_unknown"));
        assert!(text.contains(r#"fusionsolar_poll_cycles{result="ok"}"#));
    }
}
