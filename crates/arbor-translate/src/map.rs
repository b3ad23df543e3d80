//! Associative maps: one named child per entry.

use std::sync::Arc;

use arbor_tree::{MapNode, Node};
use arbor_types::{Path, Value};

use crate::context::{CreateContext, LoadContext, SaveContext};
use crate::error::{ConfigError, ConfigResult, TranslateError, TranslateResult};
use crate::meta::{Annotations, TypeDesc};
use crate::stringifier::{self, Stringifier};
use crate::translator::{Translator, TranslatorFactory};

/// Saves each map entry as a child named by the stringified key.
#[derive(Debug)]
pub struct MapTranslator {
    keys: Arc<dyn Stringifier>,
    values: Arc<dyn Translator>,
}

impl MapTranslator {
    pub fn new(keys: Arc<dyn Stringifier>, values: Arc<dyn Translator>) -> Self {
        Self { keys, values }
    }
}

fn check_name(name: &str, path: &Path) -> TranslateResult<()> {
    if name.is_empty() {
        return Err(TranslateError::shape(path, "map key is empty"));
    }
    if name.contains('.') || name.starts_with('^') {
        return Err(TranslateError::shape(
            path,
            format!("map key '{name}' cannot contain '.' or start with '^'"),
        ));
    }
    Ok(())
}

impl Translator for MapTranslator {
    fn save(
        &self,
        value: &Value,
        index: bool,
        ctx: &mut SaveContext,
        path: &Path,
    ) -> TranslateResult<Node> {
        let entries = match value {
            Value::Null => return Ok(MapNode::null().into()),
            Value::Map(entries) => entries,
            other => return Err(TranslateError::conversion(path, "map", other.type_name())),
        };
        let mut node = MapNode::new();
        for (key, entry) in entries {
            let name = self.keys.to_name(key, path)?;
            check_name(&name, path)?;
            let entry_path = path.extend(name.as_str());
            let child = self.values.save(entry, index, ctx, &entry_path)?;
            if node.insert(name, child).is_some() {
                return Err(TranslateError::shape(&entry_path, "duplicate map key"));
            }
        }
        Ok(node.into())
    }

    fn load(&self, node: &Node, ctx: &mut LoadContext, path: &Path) -> TranslateResult<Value> {
        let Node::Map(map) = node else {
            return Err(TranslateError::conversion(path, "map", "list"));
        };
        if map.is_null_leaf() {
            return Ok(Value::Null);
        }
        let mut entries = Vec::with_capacity(map.child_count());
        for (name, child) in map.children() {
            if name.starts_with('^') {
                continue;
            }
            let entry_path = path.extend(name);
            let key = self.keys.from_name(name, &entry_path)?;
            entries.push((key, self.values.load(child, ctx, &entry_path)?));
        }
        Ok(Value::Map(entries))
    }
}

pub struct MapFactory;

impl TranslatorFactory for MapFactory {
    fn name(&self) -> &str {
        "map"
    }

    fn create(
        &self,
        ty: &TypeDesc,
        annotations: &Annotations,
        ctx: &mut CreateContext<'_>,
        path: &Path,
    ) -> ConfigResult<Option<Arc<dyn Translator>>> {
        let TypeDesc::Map(key_ty, value_ty) = ty else {
            return Ok(None);
        };
        if ctx.in_collection() {
            return Err(ConfigError::IllegalNesting {
                path: path.clone(),
                reason: format!("{ty} inside a collection"),
            });
        }
        let keys = stringifier::select(key_ty, annotations, ctx, path)?;
        let values = ctx.create(value_ty, &Annotations::new(), path)?;
        Ok(Some(Arc::new(MapTranslator::new(keys, values))))
    }
}
