//! Embedded objects: one map-node per object, one child per field.

use std::sync::Arc;

use arbor_tree::{MapNode, Node};
use arbor_types::{Object, Path, Value};
use tracing::warn;

use crate::condition::{bind, Condition};
use crate::context::{CreateContext, LoadContext, SaveContext};
use crate::error::{ConfigResult, TranslateError, TranslateResult};
use crate::meta::{Annotations, ClassMeta, FieldMeta, IndexPolicy, LoadPolicy, TypeDesc};
use crate::translator::{Translator, TranslatorFactory};

/// Precomputed save/load plan for one field.
#[derive(Debug)]
struct FieldPlan {
    name: String,
    translator: Arc<dyn Translator>,
    index: IndexPolicy,
    index_if: Option<Arc<dyn Condition>>,
    unindex_if: Option<Arc<dyn Condition>>,
    ignore_save_if: Option<Arc<dyn Condition>>,
    ignore_load: bool,
    load_policy: LoadPolicy,
}

impl FieldPlan {
    fn build(
        owner: &ClassMeta,
        field: &FieldMeta,
        ctx: &mut CreateContext<'_>,
        path: &Path,
    ) -> ConfigResult<Self> {
        let field_path = path.extend(field.name.as_str());
        let translator = ctx.create(&field.ty, &field.annotations, &field_path)?;
        let bind_opt = |c: &Option<Arc<dyn Condition>>| -> ConfigResult<Option<Arc<dyn Condition>>> {
            c.as_ref().map(|c| bind(c, owner, field)).transpose()
        };
        Ok(Self {
            name: field.name.clone(),
            translator,
            index: field.index,
            index_if: bind_opt(&field.index_if)?,
            unindex_if: bind_opt(&field.unindex_if)?,
            ignore_save_if: bind_opt(&field.ignore_save_if)?,
            ignore_load: field.ignore_load,
            load_policy: field.load_policy,
        })
    }

    fn skips(&self, value: &Value, owner: &Object) -> bool {
        self.ignore_save_if
            .as_ref()
            .is_some_and(|c| c.matches(value, owner))
    }

    /// Static policy first, then `index_if`, then `unindex_if`.
    fn index_for(&self, inherited: bool, value: &Value, owner: &Object) -> bool {
        let mut index = match self.index {
            IndexPolicy::Inherit => inherited,
            IndexPolicy::Index => true,
            IndexPolicy::Unindex => false,
        };
        if let Some(cond) = &self.index_if {
            index = cond.matches(value, owner);
        }
        if let Some(cond) = &self.unindex_if {
            if cond.matches(value, owner) {
                index = false;
            } else if self.index_if.is_none() {
                index = true;
            }
        }
        index
    }
}

// ---------------------------------------------------------------------------
// ClassTranslator
// ---------------------------------------------------------------------------

/// Translator for instances of one registered class.
#[derive(Debug)]
pub struct ClassTranslator {
    class: String,
    fields: Vec<FieldPlan>,
    defaults: Option<Object>,
}

impl ClassTranslator {
    /// Build translators for every field of `meta`.
    ///
    /// Fails if the class (directly or through other embedded classes)
    /// contains itself.
    pub fn build(meta: &ClassMeta, ctx: &mut CreateContext<'_>, path: &Path) -> ConfigResult<Self> {
        ctx.enter_class(&meta.name, path)?;
        let fields = meta
            .fields
            .iter()
            .map(|f| FieldPlan::build(meta, f, ctx, path))
            .collect::<ConfigResult<Vec<_>>>();
        ctx.exit_class();
        Ok(Self {
            class: meta.name.clone(),
            fields: fields?,
            defaults: meta.defaults.clone(),
        })
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// Save the fields of `object` as children of a new map-node.
    pub fn save_object(
        &self,
        object: &Object,
        index: bool,
        ctx: &mut SaveContext,
        path: &Path,
    ) -> TranslateResult<MapNode> {
        if object.class() != self.class {
            return Err(TranslateError::conversion(
                path,
                format!("object of class {}", self.class),
                format!("object of class {}", object.class()),
            ));
        }
        let mut node = MapNode::new();
        for field in &self.fields {
            let value = object.get(&field.name);
            let field_path = path.extend(field.name.as_str());
            if field.skips(value, object) {
                ctx.skip(&field_path);
                continue;
            }
            let field_index = field.index_for(index, value, object);
            let child = field.translator.save(value, field_index, ctx, &field_path)?;
            node.insert(field.name.as_str(), child);
        }
        Ok(node)
    }

    /// Rebuild an object from the children of `node`.
    ///
    /// Children not mapped to any field are ignored. Fields with no child
    /// keep the class default, if any.
    pub fn load_object(
        &self,
        node: &MapNode,
        ctx: &mut LoadContext,
        path: &Path,
    ) -> TranslateResult<Object> {
        let mut object = self.defaults_object();
        for field in &self.fields {
            if field.ignore_load {
                continue;
            }
            let Some(child) = node.child(&field.name) else {
                continue;
            };
            let field_path = path.extend(field.name.as_str());
            match field.translator.load(child, ctx, &field_path) {
                Ok(value) => object.set(field.name.as_str(), value),
                Err(err) if field.load_policy == LoadPolicy::Lenient && err.is_conversion() => {
                    warn!(class = %self.class, path = %field_path, error = %err, "field load recovered");
                    match self.default_of(&field.name) {
                        Some(default) => object.set(field.name.as_str(), default.clone()),
                        None => {
                            object.remove(&field.name);
                        }
                    }
                    ctx.recover(err);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(object)
    }

    fn defaults_object(&self) -> Object {
        let mut object = Object::new(self.class.as_str());
        if let Some(defaults) = &self.defaults {
            for (name, value) in defaults.fields() {
                object.set(name, value.clone());
            }
        }
        object
    }

    fn default_of(&self, field: &str) -> Option<&Value> {
        self.defaults.as_ref().and_then(|d| d.get_present(field))
    }
}

impl Translator for ClassTranslator {
    fn save(
        &self,
        value: &Value,
        index: bool,
        ctx: &mut SaveContext,
        path: &Path,
    ) -> TranslateResult<Node> {
        match value {
            Value::Null => Ok(MapNode::null().into()),
            Value::Object(object) => Ok(self.save_object(object, index, ctx, path)?.into()),
            other => Err(TranslateError::conversion(
                path,
                format!("object of class {}", self.class),
                other.type_name(),
            )),
        }
    }

    fn load(&self, node: &Node, ctx: &mut LoadContext, path: &Path) -> TranslateResult<Value> {
        let Node::Map(map) = node else {
            return Err(TranslateError::conversion(path, "map", node.kind_name()));
        };
        if map.is_null_leaf() {
            return Ok(Value::Null);
        }
        if let (Some(stored), false) = (map.value(), map.has_children()) {
            if !stored.is_null() {
                return Err(TranslateError::conversion(
                    path,
                    format!("object of class {}", self.class),
                    stored.type_name(),
                ));
            }
        }
        Ok(Value::Object(self.load_object(map, ctx, path)?))
    }
}

pub struct EmbeddedFactory;

impl TranslatorFactory for EmbeddedFactory {
    fn name(&self) -> &str {
        "embedded"
    }

    fn create(
        &self,
        ty: &TypeDesc,
        _annotations: &Annotations,
        ctx: &mut CreateContext<'_>,
        path: &Path,
    ) -> ConfigResult<Option<Arc<dyn Translator>>> {
        let TypeDesc::Embedded(class) = ty else {
            return Ok(None);
        };
        let meta = ctx.class(class, path)?;
        Ok(Some(Arc::new(ClassTranslator::build(meta, ctx, path)?)))
    }
}
