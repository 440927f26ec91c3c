//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `RELAY_LOG_LEVEL`: Log-Level (trace/debug/info/warn/error), Standard: info
//! - `RELAY_LOG_FORMAT`: Format (text/json), Standard: text
//! - `LOG_TO_FILE`: "true"/"1" schaltet auf einen taeglich rotierenden
//!   Datei-Sink um (`LOG_DIR`, Standard "logs"; `LOG_FILE_PREFIX`, Standard
//!   "relay"), statt nach stdout zu schreiben.
//!
//! Request-IDs werden als Tracing-Span-Felder propagiert.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialisiert das Logging-System.
///
/// Liest `RELAY_LOG_LEVEL` und `RELAY_LOG_FORMAT` aus der Umgebung.
/// Faellt auf `info` / `text` zurueck falls nicht gesetzt. Wenn
/// `LOG_TO_FILE` gesetzt ist, wird statt stdout in eine rotierende Datei
/// geschrieben; der zugehoerige `WorkerGuard` wird fuer die Lebensdauer des
/// Prozesses geleakt, da diese Funktion nur einmal beim Start aufgerufen wird.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env("RELAY_LOG_LEVEL")
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format_env = std::env::var("RELAY_LOG_FORMAT").unwrap_or_else(|_| format.to_string());

    if log_to_file_aus_env() {
        let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());
        let log_prefix = std::env::var("LOG_FILE_PREFIX").unwrap_or_else(|_| "relay".to_string());
        let appender = tracing_appender::rolling::daily(&log_dir, &log_prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        // Kept alive for the process lifetime; dropping it would stop flushing.
        Box::leak(Box::new(guard));

        match format_env.as_str() {
            "json" => {
                fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_current_span(true)
                    .with_ansi(false)
                    .with_writer(non_blocking)
                    .init();
            }
            _ => {
                fmt()
                    .with_env_filter(filter)
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(non_blocking)
                    .init();
            }
        }
        return;
    }

    match format_env.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_current_span(true)
                .init();
        }
        _ => {
            fmt()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Liest `LOG_TO_FILE` aus der Umgebung. Akzeptiert "true" oder "1".
pub fn log_to_file_aus_env() -> bool {
    std::env::var("LOG_TO_FILE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

/// Gibt den konfigurierten Log-Level aus der Umgebung zurueck.
/// Fallback: "info"
pub fn log_level_aus_env() -> String {
    std::env::var("RELAY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}

/// Gibt das konfigurierte Log-Format aus der Umgebung zurueck.
/// Fallback: "text"
pub fn log_format_aus_env() -> String {
    std::env::var("RELAY_LOG_FORMAT").unwrap_or_else(|_| "text".to_string())
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
