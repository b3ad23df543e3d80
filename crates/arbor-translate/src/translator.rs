use std::fmt;
use std::sync::Arc;

use arbor_tree::Node;
use arbor_types::{Path, Value};

use crate::context::{CreateContext, LoadContext, SaveContext};
use crate::error::{ConfigResult, TranslateResult};
use crate::meta::{Annotations, TypeDesc};

/// Bidirectional converter between one declared type and a tree node.
///
/// Translators are built once per declared type when the registry is
/// frozen, then shared read-only across every save and load.
pub trait Translator: Send + Sync + fmt::Debug {
    /// Convert `value` into a node. `index` is the index flag inherited from
    /// the enclosing field.
    fn save(
        &self,
        value: &Value,
        index: bool,
        ctx: &mut SaveContext,
        path: &Path,
    ) -> TranslateResult<Node>;

    /// Convert a stored node back into a value.
    fn load(&self, node: &Node, ctx: &mut LoadContext, path: &Path) -> TranslateResult<Value>;
}

/// Produces translators for the declared types it understands.
///
/// Factories are consulted in order; the first that returns a translator
/// wins. Returning `Ok(None)` passes the type on to the next factory; an
/// error means the factory claims the type but cannot handle it safely.
pub trait TranslatorFactory: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn create(
        &self,
        ty: &TypeDesc,
        annotations: &Annotations,
        ctx: &mut CreateContext<'_>,
        path: &Path,
    ) -> ConfigResult<Option<Arc<dyn Translator>>>;
}
