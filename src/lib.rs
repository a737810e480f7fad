//! docschema - Schema-driven casting for document databases
//!
//! Schemas declare typed paths; documents, query filters and update
//! operators are cast against them before they reach storage.

pub mod cast;
pub mod caster;
pub mod config;
pub mod document;
pub mod errors;
pub mod model;
pub mod observability;
pub mod schema;
pub mod schematype;
pub mod value;

pub use caster::{cast_filter, cast_update, CastUpdate, FilterOptions, UpdateOptions};
pub use config::OdmConfig;
pub use document::{Document, DocumentOptions, Projection};
pub use errors::{OdmError, OdmResult};
pub use model::Model;
pub use schema::{SchemaDefinition, SchemaId, SchemaOptions, SchemaRegistry, StrictMode};
pub use schematype::{PathKind, PathOptions, ScalarType, SchemaPath};
pub use value::{Map, Value};
