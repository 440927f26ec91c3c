//! Prometheus-kompatible Metriken fuer den Relay
//!
//! Registrierte Metriken:
//! - `relay_active_cabins` – Gauge: Aktuell aktive Translation Cabins
//! - `relay_rtp_packets_total` – Counter: Verarbeitete RTP-Pakete (in/out)
//! - `relay_rtp_packet_loss_ratio` – Histogram: Paketverlust-Rate beim Senden
//! - `relay_pipeline_latency_seconds` – Histogram: STT+NMT+TTS Pipeline-Latenz
//! - `relay_transcript_index_latency_seconds` – Histogram: Indexierungs-Latenz
//! - `relay_cpu_usage_percent` – Gauge: CPU-Auslastung
//! - `relay_memory_usage_bytes` – Gauge: Speicherverbrauch
//! - `relay_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `relay_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit

use anyhow::Result;
use axum::{response::IntoResponse, routing::get, Router};
use prometheus::{
    Counter, Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Alle Relay-Prometheus-Metriken
#[derive(Clone)]
pub struct RelayMetrics {
    pub registry: Arc<Registry>,

    // Cabin/RTP-Metriken
    pub active_cabins: Gauge,
    pub rtp_packets_total: Counter,
    pub rtp_packet_loss_ratio: Histogram,
    pub pipeline_latency_seconds: Histogram,
    pub transcript_index_latency_seconds: Histogram,

    // System-Metriken
    pub cpu_usage_percent: Gauge,
    pub memory_usage_bytes: Gauge,

    // HTTP-Metriken
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

impl RelayMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Cabin/RTP-Metriken ---
        let active_cabins = Gauge::with_opts(Opts::new(
            "relay_active_cabins",
            "Anzahl aktuell aktiver Translation Cabins",
        ))?;
        registry.register(Box::new(active_cabins.clone()))?;

        let rtp_packets_total = Counter::with_opts(Opts::new(
            "relay_rtp_packets_total",
            "Gesamtanzahl verarbeiteter RTP-Pakete",
        ))?;
        registry.register(Box::new(rtp_packets_total.clone()))?;

        let rtp_packet_loss_ratio = Histogram::with_opts(
            HistogramOpts::new(
                "relay_rtp_packet_loss_ratio",
                "Anteil nicht zugestellter ausgehender RTP-Pakete pro Emission (0.0 bis 1.0)",
            )
            .buckets(vec![0.0, 0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0]),
        )?;
        registry.register(Box::new(rtp_packet_loss_ratio.clone()))?;

        let pipeline_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "relay_pipeline_latency_seconds",
                "End-to-end STT+NMT+TTS Latenz pro Sprachfenster in Sekunden",
            )
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.0, 3.0, 5.0, 8.0, 13.0]),
        )?;
        registry.register(Box::new(pipeline_latency_seconds.clone()))?;

        let transcript_index_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "relay_transcript_index_latency_seconds",
                "Latenz der Transkript-Indexierung in Sekunden",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0]),
        )?;
        registry.register(Box::new(transcript_index_latency_seconds.clone()))?;

        // --- System-Metriken ---
        let cpu_usage_percent = Gauge::with_opts(Opts::new(
            "relay_cpu_usage_percent",
            "CPU-Auslastung in Prozent (0-100)",
        ))?;
        registry.register(Box::new(cpu_usage_percent.clone()))?;

        let memory_usage_bytes = Gauge::with_opts(Opts::new(
            "relay_memory_usage_bytes",
            "Speicherverbrauch in Bytes",
        ))?;
        registry.register(Box::new(memory_usage_bytes.clone()))?;

        // --- HTTP-Metriken ---
        let http_requests_total = IntCounterVec::new(
            Opts::new("relay_http_requests_total", "Gesamtanzahl HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "relay_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
            ]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            active_cabins,
            rtp_packets_total,
            rtp_packet_loss_ratio,
            pipeline_latency_seconds,
            transcript_index_latency_seconds,
            cpu_usage_percent,
            memory_usage_bytes,
            http_requests_total,
            http_request_duration_seconds,
        })
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router() -> Router {
    use std::sync::OnceLock;
    static METRIKEN: OnceLock<RelayMetrics> = OnceLock::new();
    let metriken =
        METRIKEN.get_or_init(|| RelayMetrics::neu().expect("Metriken-Initialisierung fehlgeschlagen"));

    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken.clone())
}

async fn metrics_handler(
    axum::extract::State(metriken): axum::extract::State<RelayMetrics>,
) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
