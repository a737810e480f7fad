//! Schemas and the schema registry
//!
//! A schema is an ordered set of typed paths compiled from a definition.
//! Schemas live in a `SchemaRegistry` and refer to one another through
//! `SchemaId` handles.
//!
//! # Design Principles
//!
//! - Compiled once, frozen behind an `Arc` before casting starts
//! - Options remember whether they were set explicitly
//! - Discriminators are full schemas merged from their base

mod definition;
mod discriminator;
mod loader;
mod registry;
mod search;
mod types;

pub use definition::{FieldDef, SchemaDefinition, TypeToken};
pub use discriminator::discriminator_value_string;
pub use loader::{register, DiscriminatorFile, SchemaFile, SchemaLoader};
pub use registry::{SchemaId, SchemaRegistry};
pub use search::{PathMatch, PathType, PathTypeInfo};
pub use types::{
    DiscriminatorEntry, DiscriminatorMapping, Schema, SchemaDefaults, SchemaOptions, StrictMode,
    TransformOptions,
};

pub(crate) use search::is_positional;
