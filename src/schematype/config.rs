//! Process-wide per-type configuration
//!
//! Overrides here apply to every path of a scalar type, in every registry.
//! Path-level options always win over type-level defaults.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use super::ScalarType;
use crate::cast::{BooleanTokens, PrimitiveResult};
use crate::observability::{log_event_with_fields, Event};
use crate::value::Value;

/// Replacement primitive caster.
pub type CasterFn = Arc<dyn Fn(&Value) -> PrimitiveResult + Send + Sync>;

/// Caster override for a scalar type.
#[derive(Clone)]
pub enum CasterOverride {
    /// Use this function instead of the built-in caster.
    Custom(CasterFn),
    /// Accept only values already in the canonical representation.
    Disabled,
}

/// Option defaults applied to every path of a type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeDefaults {
    pub trim: bool,
    pub lowercase: bool,
    pub uppercase: bool,
    pub required: bool,
}

#[derive(Default)]
struct TypeConfig {
    casters: HashMap<ScalarType, CasterOverride>,
    defaults: HashMap<ScalarType, TypeDefaults>,
    boolean_tokens: BooleanTokens,
}

static TYPE_CONFIG: Lazy<RwLock<TypeConfig>> = Lazy::new(|| RwLock::new(TypeConfig::default()));

fn read<T>(f: impl FnOnce(&TypeConfig) -> T) -> T {
    let guard = TYPE_CONFIG.read().unwrap_or_else(|e| e.into_inner());
    f(&guard)
}

fn write(ty: Option<ScalarType>, setting: &str, f: impl FnOnce(&mut TypeConfig)) {
    {
        let mut guard = TYPE_CONFIG.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }
    let type_name = ty.map(|t| t.name()).unwrap_or("*");
    log_event_with_fields(
        Event::TypeConfigChanged,
        &[("type", type_name), ("setting", setting)],
    );
}

/// Overrides the caster for every path of `ty`.
pub fn set_caster(ty: ScalarType, caster: CasterOverride) {
    write(Some(ty), "caster", |c| {
        c.casters.insert(ty, caster);
    });
}

/// Restores the built-in caster for `ty`.
pub fn reset_caster(ty: ScalarType) {
    write(Some(ty), "caster", |c| {
        c.casters.remove(&ty);
    });
}

pub(crate) fn caster_override(ty: ScalarType) -> Option<CasterOverride> {
    read(|c| c.casters.get(&ty).cloned())
}

pub fn set_defaults(ty: ScalarType, defaults: TypeDefaults) {
    write(Some(ty), "defaults", |c| {
        c.defaults.insert(ty, defaults);
    });
}

pub fn type_defaults(ty: ScalarType) -> TypeDefaults {
    read(|c| c.defaults.get(&ty).copied().unwrap_or_default())
}

/// Replaces the token lists used by the Boolean caster.
pub fn set_boolean_tokens(tokens: BooleanTokens) {
    write(Some(ScalarType::Boolean), "tokens", |c| {
        c.boolean_tokens = tokens;
    });
}

pub fn boolean_tokens() -> BooleanTokens {
    read(|c| c.boolean_tokens.clone())
}

/// Clears every override.
pub fn reset() {
    write(None, "reset", |c| *c = TypeConfig::default());
}
