use arbor_types::Object;

use crate::error::SessionResult;
use crate::session::LoadScope;

/// An application type stored as an entity.
///
/// The conversion goes through the [`Object`] value model; the registry
/// decides how each field becomes part of the property tree. `to_object`
/// must produce an object of class [`Entity::KIND`] with the id and parent
/// fields set as the class metadata names them, and `from_object` must
/// accept what `to_object` produces.
pub trait Entity: Send + Sync + Sized + 'static {
    /// Entity kind, which is also the registered class name.
    const KIND: &'static str;

    fn to_object(&self) -> Object;

    /// Rebuild from a loaded object. Key-valued fields can be turned into
    /// live references with [`LoadScope::make_ref`].
    fn from_object(object: Object, scope: &LoadScope<'_>) -> SessionResult<Self>;
}
