//! Observable events emitted by the casting engine
//!
//! Events are explicit and typed.

use std::fmt;

use super::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Registry lifecycle
    /// Schema compiled from a definition
    SchemaCompiled,
    /// Path registered on a compiled schema
    PathAdded,
    /// Discriminator registered against a base schema
    DiscriminatorRegistered,
    /// Model name bound to a schema
    ModelRegistered,
    /// Schema definitions loaded from disk
    SchemasLoaded,

    // Casting
    /// Unknown path discarded under drop strictness
    StrictDrop,
    /// Change to an immutable path discarded
    ImmutableDrop,
    /// Value rejected by a caster
    CastRejected,
    /// Update produced no operations
    UpdateNoop,

    // Configuration
    /// Per-type configuration changed
    TypeConfigChanged,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::SchemaCompiled => "SCHEMA_COMPILED",
            Event::PathAdded => "PATH_ADDED",
            Event::DiscriminatorRegistered => "DISCRIMINATOR_REGISTERED",
            Event::ModelRegistered => "MODEL_REGISTERED",
            Event::SchemasLoaded => "SCHEMAS_LOADED",
            Event::StrictDrop => "STRICT_DROP",
            Event::ImmutableDrop => "IMMUTABLE_DROP",
            Event::CastRejected => "CAST_REJECTED",
            Event::UpdateNoop => "UPDATE_NOOP",
            Event::TypeConfigChanged => "TYPE_CONFIG_CHANGED",
        }
    }

    /// Severity the event is logged at.
    pub fn severity(&self) -> Severity {
        match self {
            Event::PathAdded | Event::CastRejected | Event::UpdateNoop => Severity::Trace,
            Event::SchemaCompiled
            | Event::DiscriminatorRegistered
            | Event::ModelRegistered
            | Event::SchemasLoaded
            | Event::TypeConfigChanged => Severity::Info,
            Event::StrictDrop | Event::ImmutableDrop => Severity::Warn,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::SchemaCompiled,
            Event::PathAdded,
            Event::DiscriminatorRegistered,
            Event::ModelRegistered,
            Event::SchemasLoaded,
            Event::StrictDrop,
            Event::ImmutableDrop,
            Event::CastRejected,
            Event::UpdateNoop,
            Event::TypeConfigChanged,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_discards_are_warnings() {
        assert_eq!(Event::StrictDrop.severity(), Severity::Warn);
        assert_eq!(Event::ImmutableDrop.severity(), Severity::Warn);
        assert_eq!(Event::PathAdded.severity(), Severity::Trace);
    }
}
