//! Strict-mode resolution for paths inside nested schemas

use crate::schema::{SchemaId, SchemaRegistry, StrictMode};

/// Which strict setting a lookup resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StrictScope {
    /// `strict`: documents and updates
    Write,
    /// `strictQuery`: query filters
    Query,
}

/// Strict mode for a path declared in `owner` while casting against `root`.
///
/// A caller override wins. Otherwise the root schema decides, unless it
/// sets `useNestedStrict` and `owner` declares its own mode.
pub(crate) fn effective_strict(
    registry: &SchemaRegistry,
    root: SchemaId,
    owner: SchemaId,
    scope: StrictScope,
    override_mode: Option<StrictMode>,
) -> StrictMode {
    if let Some(mode) = override_mode {
        return mode;
    }

    let root_schema = registry.schema(root);
    if owner != root && root_schema.use_nested_strict() {
        let options = registry.schema(owner).options();
        let declared = match scope {
            StrictScope::Write => options.strict,
            StrictScope::Query => options.strict_query,
        };
        if let Some(mode) = declared {
            return mode;
        }
    }

    match scope {
        StrictScope::Write => root_schema.strict(),
        StrictScope::Query => root_schema.strict_query(),
    }
}
