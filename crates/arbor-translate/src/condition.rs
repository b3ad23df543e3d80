//! Save-time predicates deciding whether a field is indexed, unindexed, or
//! skipped.
//!
//! A condition is satisfied when either [`Condition::matches_value`] or
//! [`Condition::matches_owner`] returns `true`. Conditions that need to know
//! the field they are attached to (default-value comparisons, type checks)
//! are bound once through [`Condition::initialize`] when the registry is
//! built; the bound instance is what the save path evaluates.

use std::fmt;
use std::sync::Arc;

use arbor_types::{Object, Value};

use crate::error::{ConfigError, ConfigResult};
use crate::meta::{ClassMeta, FieldMeta, TypeDesc};

/// A predicate over a field value and the object that owns it.
pub trait Condition: Send + Sync + fmt::Debug {
    /// Test the field's own value.
    fn matches_value(&self, value: &Value) -> bool;

    /// Test the owning object. Most conditions only look at the value.
    fn matches_owner(&self, _owner: &Object) -> bool {
        false
    }

    /// Bind the condition to the field it is attached to.
    ///
    /// Returns a replacement to use instead of `self`, or `None` when the
    /// condition needs no binding. Fails when the condition cannot apply to
    /// the field's declared type.
    fn initialize(
        &self,
        _owner: &ClassMeta,
        _field: &FieldMeta,
    ) -> ConfigResult<Option<Arc<dyn Condition>>> {
        Ok(None)
    }

    /// Combined test used by translators.
    fn matches(&self, value: &Value, owner: &Object) -> bool {
        self.matches_value(value) || self.matches_owner(owner)
    }
}

/// Bind `condition` to a field, keeping the original when no binding is
/// required.
pub fn bind(
    condition: &Arc<dyn Condition>,
    owner: &ClassMeta,
    field: &FieldMeta,
) -> ConfigResult<Arc<dyn Condition>> {
    Ok(condition
        .initialize(owner, field)?
        .unwrap_or_else(|| Arc::clone(condition)))
}

fn invalid(owner: &ClassMeta, field: &FieldMeta, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidCondition {
        class: owner.name.clone(),
        field: field.name.clone(),
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Value predicates
// ---------------------------------------------------------------------------

/// Always satisfied.
#[derive(Clone, Copy, Debug, Default)]
pub struct Always;

impl Condition for Always {
    fn matches_value(&self, _value: &Value) -> bool {
        true
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct IfNull;

impl Condition for IfNull {
    fn matches_value(&self, value: &Value) -> bool {
        value.is_null()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct IfNotNull;

impl Condition for IfNotNull {
    fn matches_value(&self, value: &Value) -> bool {
        !value.is_null()
    }
}

/// Null, or an empty string, binary, collection, or map.
#[derive(Clone, Copy, Debug, Default)]
pub struct IfEmpty;

impl Condition for IfEmpty {
    fn matches_value(&self, value: &Value) -> bool {
        value.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct IfNotEmpty;

impl Condition for IfNotEmpty {
    fn matches_value(&self, value: &Value) -> bool {
        !value.is_empty()
    }
}

/// Satisfied when a boolean field holds `true`. Only valid on `bool` fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct IfTrue;

impl Condition for IfTrue {
    fn matches_value(&self, value: &Value) -> bool {
        value.as_bool() == Some(true)
    }

    fn initialize(
        &self,
        owner: &ClassMeta,
        field: &FieldMeta,
    ) -> ConfigResult<Option<Arc<dyn Condition>>> {
        require_bool(owner, field)?;
        Ok(None)
    }
}

/// Satisfied when a boolean field holds `false`. Only valid on `bool` fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct IfFalse;

impl Condition for IfFalse {
    fn matches_value(&self, value: &Value) -> bool {
        value.as_bool() == Some(false)
    }

    fn initialize(
        &self,
        owner: &ClassMeta,
        field: &FieldMeta,
    ) -> ConfigResult<Option<Arc<dyn Condition>>> {
        require_bool(owner, field)?;
        Ok(None)
    }
}

fn require_bool(owner: &ClassMeta, field: &FieldMeta) -> ConfigResult<()> {
    match field.ty {
        TypeDesc::Bool => Ok(()),
        ref other => Err(invalid(owner, field, format!("needs a bool field, not {other}"))),
    }
}

/// Satisfied when a numeric field is zero. Only valid on numeric fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct IfZero;

impl Condition for IfZero {
    fn matches_value(&self, value: &Value) -> bool {
        value.is_zero()
    }

    fn initialize(
        &self,
        owner: &ClassMeta,
        field: &FieldMeta,
    ) -> ConfigResult<Option<Arc<dyn Condition>>> {
        require_numeric(owner, field)?;
        Ok(None)
    }
}

/// Satisfied when a numeric field is non-zero. Null is not a number and
/// does not match.
#[derive(Clone, Copy, Debug, Default)]
pub struct IfNotZero;

impl Condition for IfNotZero {
    fn matches_value(&self, value: &Value) -> bool {
        matches!(value, Value::Int(_) | Value::Float(_)) && !value.is_zero()
    }

    fn initialize(
        &self,
        owner: &ClassMeta,
        field: &FieldMeta,
    ) -> ConfigResult<Option<Arc<dyn Condition>>> {
        require_numeric(owner, field)?;
        Ok(None)
    }
}

fn require_numeric(owner: &ClassMeta, field: &FieldMeta) -> ConfigResult<()> {
    match field.ty {
        TypeDesc::Int(_) | TypeDesc::Float(_) => Ok(()),
        ref other => Err(invalid(owner, field, format!("needs a numeric field, not {other}"))),
    }
}

// ---------------------------------------------------------------------------
// Default-value predicates
// ---------------------------------------------------------------------------

/// Satisfied when the field holds the value a default-constructed owner
/// would hold.
///
/// Unbound, it compares against `Null`. Binding reads the point of
/// comparison once from the owner class's `defaults` object, falling back to
/// the natural default of the field type.
#[derive(Clone, Debug, Default)]
pub struct IfDefault {
    default: Option<Value>,
}

impl IfDefault {
    pub fn new() -> Self {
        Self::default()
    }

    /// The point of comparison, once bound.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

fn default_for(owner: &ClassMeta, field: &FieldMeta) -> Value {
    owner
        .default_of(&field.name)
        .cloned()
        .unwrap_or_else(|| field.ty.natural_default())
}

impl Condition for IfDefault {
    fn matches_value(&self, value: &Value) -> bool {
        match &self.default {
            Some(default) => value == default,
            None => value.is_null(),
        }
    }

    fn initialize(
        &self,
        owner: &ClassMeta,
        field: &FieldMeta,
    ) -> ConfigResult<Option<Arc<dyn Condition>>> {
        Ok(Some(Arc::new(IfDefault {
            default: Some(default_for(owner, field)),
        })))
    }
}

/// Negation of [`IfDefault`].
#[derive(Clone, Debug, Default)]
pub struct IfNotDefault {
    inner: IfDefault,
}

impl IfNotDefault {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Condition for IfNotDefault {
    fn matches_value(&self, value: &Value) -> bool {
        !self.inner.matches_value(value)
    }

    fn initialize(
        &self,
        owner: &ClassMeta,
        field: &FieldMeta,
    ) -> ConfigResult<Option<Arc<dyn Condition>>> {
        Ok(Some(Arc::new(IfNotDefault {
            inner: IfDefault {
                default: Some(default_for(owner, field)),
            },
        })))
    }
}

// ---------------------------------------------------------------------------
// Combinators
// ---------------------------------------------------------------------------

/// Satisfied when the wrapped condition is not.
#[derive(Debug)]
pub struct Not(pub Arc<dyn Condition>);

impl Not {
    pub fn new(inner: impl Condition + 'static) -> Self {
        Self(Arc::new(inner))
    }
}

impl Condition for Not {
    fn matches_value(&self, value: &Value) -> bool {
        !self.0.matches_value(value)
    }

    fn initialize(
        &self,
        owner: &ClassMeta,
        field: &FieldMeta,
    ) -> ConfigResult<Option<Arc<dyn Condition>>> {
        Ok(self
            .0
            .initialize(owner, field)?
            .map(|bound| Arc::new(Not(bound)) as Arc<dyn Condition>))
    }

    fn matches(&self, value: &Value, owner: &Object) -> bool {
        !self.0.matches(value, owner)
    }
}
