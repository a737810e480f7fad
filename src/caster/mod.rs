//! Query filter and update casting
//!
//! Both walks resolve every key of the input against a schema, including
//! paths inside document arrays, sub-documents and embedded
//! discriminators, and cast the value with the `SchemaPath` found.
//!
//! # Error policy
//!
//! The first failure aborts a cast unless the update is cast with
//! `multiple_cast_error`, in which case failures are collected into one
//! `ValidationError` keyed by path.

mod embedded;
mod filter;
mod strict;
mod update;

pub use filter::{cast_filter, FilterOptions};
pub use update::{cast_update, CastUpdate, UpdateOptions};

pub(crate) use strict::{effective_strict, StrictScope};
