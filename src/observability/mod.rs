//! Observability for the casting engine
//!
//! Structured JSON log lines for registry lifecycle and for input the
//! engine discards or rejects. Logging is read-only: it never changes a
//! casting outcome.
//!
//! # Usage
//!
//! ```ignore
//! use docschema::observability::{log_event_with_fields, Event, Logger, Severity};
//!
//! Logger::set_min_severity(Severity::Trace);
//! log_event_with_fields(Event::StrictDrop, &[("path", "nickname")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log an event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log an event with fields at its own severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        // This just verifies no panic
        log_event(Event::SchemaCompiled);
        log_event_with_fields(Event::StrictDrop, &[("path", "nickname")]);
    }
}
