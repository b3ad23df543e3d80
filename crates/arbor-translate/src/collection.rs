//! Homogeneous collections.
//!
//! Collections of scalars become a list-node with one leaf per element.
//! Collections of embedded objects are flattened: the store only holds
//! repeated scalars, so the collection at `P` becomes a map-node with one
//! list-node per leaf path of the element type, all index-aligned.
//!
//! Flattened layout for `pets: [Pet{tag:"x"}, null, Pet{tag:"z"}]`:
//!
//! ```text
//! pets
//!   ├── tag   : ["x", <empty>, "z"]
//!   └── ^null : [false, true, false]
//! ```
//!
//! An empty item (no scalar) means the element is null or lacks that path.
//! A stored `Null` means the element's sub-field was null. `^null` defines
//! the length and is written even for empty collections. An embedded object
//! with no leaves of its own is recorded as `true` under `<path>^present`.

use std::collections::BTreeMap;
use std::sync::Arc;

use arbor_tree::{ListNode, MapNode, Node, PropertyValue};
use arbor_types::{Path, Value};

use crate::context::{CreateContext, LoadContext, SaveContext};
use crate::error::{ConfigError, ConfigResult, TranslateError, TranslateResult};
use crate::meta::{Annotations, TypeDesc};
use crate::translator::{Translator, TranslatorFactory};

/// Child of a flattened collection holding the per-element null flags.
pub const NULL_MARKER: &str = "^null";

/// Suffix of a leaf path marking an embedded object that has no leaves.
pub const PRESENT_MARKER: &str = "^present";

fn expect_list<'v>(value: &'v Value, path: &Path) -> TranslateResult<Option<&'v [Value]>> {
    match value {
        Value::Null => Ok(None),
        Value::List(items) => Ok(Some(items)),
        other => Err(TranslateError::conversion(path, "list", other.type_name())),
    }
}

// ---------------------------------------------------------------------------
// ScalarListTranslator
// ---------------------------------------------------------------------------

/// A collection of scalars: a list-node of single-value map-nodes.
#[derive(Debug)]
pub struct ScalarListTranslator {
    element: Arc<dyn Translator>,
}

impl ScalarListTranslator {
    pub fn new(element: Arc<dyn Translator>) -> Self {
        Self { element }
    }
}

impl Translator for ScalarListTranslator {
    fn save(
        &self,
        value: &Value,
        index: bool,
        ctx: &mut SaveContext,
        path: &Path,
    ) -> TranslateResult<Node> {
        let Some(items) = expect_list(value, path)? else {
            return Ok(MapNode::null().into());
        };
        let mut list = ListNode::new();
        for (i, item) in items.iter().enumerate() {
            let item_path = path.extend_index(i);
            match self.element.save(item, index, ctx, &item_path)? {
                Node::Map(leaf) if !leaf.has_children() => list.push(leaf),
                _ => {
                    return Err(TranslateError::shape(
                        &item_path,
                        "collection element must save to a single value",
                    ))
                }
            }
        }
        Ok(list.into())
    }

    fn load(&self, node: &Node, ctx: &mut LoadContext, path: &Path) -> TranslateResult<Value> {
        match node {
            Node::List(list) => list
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    self.element
                        .load(&Node::Map(item.clone()), ctx, &path.extend_index(i))
                })
                .collect::<TranslateResult<Vec<_>>>()
                .map(Value::List),
            Node::Map(m) if m.is_null_leaf() => Ok(Value::Null),
            Node::Map(m) if m.is_empty() => Ok(Value::List(Vec::new())),
            // A single stored value where a collection is declared.
            Node::Map(m) if !m.has_children() => {
                Ok(Value::List(vec![self.element.load(node, ctx, &path.extend_index(0))?]))
            }
            Node::Map(_) => Err(TranslateError::conversion(path, "list", "map")),
        }
    }
}

// ---------------------------------------------------------------------------
// FlattenedListTranslator
// ---------------------------------------------------------------------------

/// A collection of embedded objects, flattened into parallel leaf lists.
#[derive(Debug)]
pub struct FlattenedListTranslator {
    element: Arc<dyn Translator>,
}

impl FlattenedListTranslator {
    pub fn new(element: Arc<dyn Translator>) -> Self {
        Self { element }
    }
}

/// Record every scalar below `node` under its dot-joined relative path.
fn collect_leaves(
    node: &MapNode,
    prefix: &str,
    out: &mut Vec<(String, MapNode)>,
    path: &Path,
) -> TranslateResult<()> {
    if !prefix.is_empty() {
        if let Some(value) = node.value() {
            out.push((prefix.to_string(), MapNode::scalar(value.clone(), node.is_indexed())));
        } else if !node.has_children() {
            out.push((
                format!("{prefix}{PRESENT_MARKER}"),
                MapNode::scalar(PropertyValue::Bool(true), false),
            ));
        }
    }
    for (name, child) in node.children() {
        let leaf = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        };
        match child {
            Node::Map(m) => collect_leaves(m, &leaf, out, path)?,
            Node::List(_) => {
                return Err(TranslateError::shape(
                    &path.extend(leaf),
                    "repeated value inside a flattened collection",
                ))
            }
        }
    }
    Ok(())
}

impl Translator for FlattenedListTranslator {
    fn save(
        &self,
        value: &Value,
        index: bool,
        ctx: &mut SaveContext,
        path: &Path,
    ) -> TranslateResult<Node> {
        let Some(items) = expect_list(value, path)? else {
            return Ok(MapNode::null().into());
        };
        let len = items.len();
        let mut leaves: BTreeMap<String, Vec<MapNode>> = BTreeMap::new();
        let mut nulls = ListNode::new();
        for (i, item) in items.iter().enumerate() {
            nulls.push(MapNode::scalar(PropertyValue::Bool(item.is_null()), false));
            if item.is_null() {
                continue;
            }
            let item_path = path.extend_index(i);
            let Node::Map(tree) = self.element.save(item, index, ctx, &item_path)? else {
                return Err(TranslateError::shape(&item_path, "element must save to a map"));
            };
            let mut found = Vec::new();
            collect_leaves(&tree, "", &mut found, &item_path)?;
            for (leaf, scalar) in found {
                leaves.entry(leaf).or_insert_with(|| vec![MapNode::new(); len])[i] = scalar;
            }
        }

        let mut node = MapNode::new();
        for (leaf, items) in leaves {
            node.insert(leaf, ListNode::from(items));
        }
        node.insert(NULL_MARKER, nulls);
        Ok(node.into())
    }

    fn load(&self, node: &Node, ctx: &mut LoadContext, path: &Path) -> TranslateResult<Value> {
        let Node::Map(map) = node else {
            return Err(TranslateError::conversion(path, "flattened collection", "list"));
        };
        if map.is_null_leaf() {
            return Ok(Value::Null);
        }
        let markers = map
            .child_list(NULL_MARKER)
            .ok_or_else(|| TranslateError::shape(path, "missing null marker list"))?;
        let len = markers.len();

        let mut leaves = Vec::new();
        for (name, child) in map.children() {
            if name == NULL_MARKER {
                continue;
            }
            let leaf_path = path.extend(name);
            let list = child
                .as_list()
                .ok_or_else(|| TranslateError::shape(&leaf_path, "expected a leaf list"))?;
            if list.len() != len {
                return Err(TranslateError::shape(
                    &leaf_path,
                    format!("leaf list has {} items, collection has {len}", list.len()),
                ));
            }
            let (name, presence) = match name.strip_suffix(PRESENT_MARKER) {
                Some(stripped) => (stripped, true),
                None => (name, false),
            };
            leaves.push((name.split('.').collect::<Vec<_>>(), presence, list));
        }

        let mut items = Vec::with_capacity(len);
        for (i, marker) in markers.iter().enumerate() {
            let item_path = path.extend_index(i);
            match marker.value() {
                Some(PropertyValue::Bool(true)) => {
                    items.push(Value::Null);
                    continue;
                }
                Some(PropertyValue::Bool(false)) => {}
                _ => return Err(TranslateError::shape(&item_path, "null marker must be a bool")),
            }
            let mut tree = MapNode::new();
            for (segments, presence, list) in &leaves {
                let Some(value) = list.get(i).and_then(MapNode::value) else {
                    continue;
                };
                let slot = tree
                    .map_at_mut(segments)
                    .ok_or_else(|| TranslateError::shape(&item_path, "conflicting leaf paths"))?;
                if !presence {
                    slot.set_value(value.clone(), false);
                }
            }
            items.push(self.element.load(&Node::Map(tree), ctx, &item_path)?);
        }
        Ok(Value::List(items))
    }
}

// ---------------------------------------------------------------------------
// CollectionFactory
// ---------------------------------------------------------------------------

pub struct CollectionFactory;

impl TranslatorFactory for CollectionFactory {
    fn name(&self) -> &str {
        "collection"
    }

    fn create(
        &self,
        ty: &TypeDesc,
        annotations: &Annotations,
        ctx: &mut CreateContext<'_>,
        path: &Path,
    ) -> ConfigResult<Option<Arc<dyn Translator>>> {
        let TypeDesc::List(element) = ty else {
            return Ok(None);
        };
        if ctx.in_collection() {
            return Err(ConfigError::IllegalNesting {
                path: path.clone(),
                reason: format!("{ty} inside another collection"),
            });
        }
        let element_translator = ctx.create_in_collection(element, annotations, path)?;
        Ok(Some(match element.as_ref() {
            TypeDesc::Embedded(_) => Arc::new(FlattenedListTranslator::new(element_translator)),
            _ => Arc::new(ScalarListTranslator::new(element_translator)),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use arbor_tree::FlatProperty;
    use arbor_types::Object;

    use super::*;
    use crate::chain::FactoryChain;
    use crate::condition::IfNull;
    use crate::meta::{ClassMeta, FieldMeta, IntKind};

    fn classes() -> BTreeMap<String, ClassMeta> {
        [
            ClassMeta::embedded("Pet").field(FieldMeta::new("tag", TypeDesc::String)),
            ClassMeta::embedded("Owner").field(FieldMeta::new("name", TypeDesc::String)),
            ClassMeta::embedded("Toy")
                .field(FieldMeta::new("label", TypeDesc::String))
                .field(FieldMeta::new("owner", TypeDesc::embedded("Owner"))),
            ClassMeta::embedded("Kennel")
                .field(FieldMeta::new("pets", TypeDesc::list(TypeDesc::embedded("Pet")))),
            ClassMeta::embedded("Badge")
                .field(FieldMeta::new("note", TypeDesc::String).ignore_save_if(IfNull)),
            ClassMeta::embedded("Collar")
                .field(FieldMeta::new("label", TypeDesc::String))
                .field(FieldMeta::new("badge", TypeDesc::embedded("Badge"))),
        ]
        .into_iter()
        .map(|c| (c.name.clone(), c))
        .collect()
    }

    fn create(ty: &TypeDesc) -> ConfigResult<Arc<dyn Translator>> {
        let classes = classes();
        let chain = FactoryChain::builtin();
        let stringifiers = HashMap::new();
        let mut ctx = CreateContext::new(&chain, &classes, &stringifiers);
        ctx.create(ty, &Annotations::new(), &Path::from_fields(["items"]))
    }

    fn save(t: &Arc<dyn Translator>, value: &Value) -> Node {
        t.save(value, false, &mut SaveContext::new(), &Path::from_fields(["items"]))
            .unwrap()
    }

    fn load(t: &Arc<dyn Translator>, node: &Node) -> TranslateResult<Value> {
        t.load(node, &mut LoadContext::new(), &Path::from_fields(["items"]))
    }

    fn pet(tag: impl Into<Value>) -> Value {
        Value::Object(Object::new("Pet").with("tag", tag))
    }

    #[test]
    fn scalar_lists() {
        let t = create(&TypeDesc::list(TypeDesc::Int(IntKind::I32))).unwrap();
        let value = Value::List(vec![Value::Int(1), Value::Null, Value::Int(3)]);
        let node = save(&t, &value);
        assert_eq!(node.as_list().map(ListNode::len), Some(3));
        assert_eq!(load(&t, &node).unwrap(), value);

        let empty = Value::List(vec![]);
        assert_eq!(load(&t, &save(&t, &empty)).unwrap(), empty);
        assert_eq!(load(&t, &save(&t, &Value::Null)).unwrap(), Value::Null);
    }

    #[test]
    fn single_value_loads_as_singleton() {
        let t = create(&TypeDesc::list(TypeDesc::String)).unwrap();
        let node: Node = MapNode::scalar(PropertyValue::from("solo"), false).into();
        assert_eq!(load(&t, &node).unwrap(), Value::List(vec![Value::from("solo")]));
    }

    #[test]
    fn scalar_list_element_errors_carry_index() {
        let t = create(&TypeDesc::list(TypeDesc::Int(IntKind::U8))).unwrap();
        let node: Node = ListNode::from(vec![
            MapNode::scalar(PropertyValue::Int(1), false),
            MapNode::scalar(PropertyValue::Int(999), false),
        ])
        .into();
        let err = load(&t, &node).unwrap_err();
        assert_eq!(err.path().map(ToString::to_string).as_deref(), Some("items.1"));
    }

    #[test]
    fn flattened_layout() {
        let t = create(&TypeDesc::list(TypeDesc::embedded("Pet"))).unwrap();
        let value = Value::List(vec![pet("x"), Value::Null, pet("z")]);
        let node = save(&t, &value);
        let mut root = MapNode::new();
        root.insert("pets", node.clone());
        let flat = root.flatten();
        assert_eq!(
            flat.get("pets.tag"),
            Some(&FlatProperty::List(vec![
                Some(PropertyValue::from("x")),
                None,
                Some(PropertyValue::from("z")),
            ]))
        );
        assert_eq!(
            flat.get("pets^null"),
            Some(&FlatProperty::List(vec![
                Some(PropertyValue::Bool(false)),
                Some(PropertyValue::Bool(true)),
                Some(PropertyValue::Bool(false)),
            ]))
        );
        assert_eq!(load(&t, &node).unwrap(), value);
    }

    #[test]
    fn null_subfields_keep_alignment() {
        let t = create(&TypeDesc::list(TypeDesc::embedded("Pet"))).unwrap();
        let value = Value::List(vec![
            pet(Value::Null),
            pet("b"),
            Value::Null,
            pet(Value::Null),
            pet("e"),
        ]);
        let loaded = load(&t, &save(&t, &value)).unwrap();
        assert_eq!(loaded, value);
    }

    #[test]
    fn all_null_and_empty_collections() {
        let t = create(&TypeDesc::list(TypeDesc::embedded("Pet"))).unwrap();
        let nulls = Value::List(vec![Value::Null, Value::Null]);
        let node = save(&t, &nulls);
        assert_eq!(node.as_map().unwrap().child_count(), 1);
        assert_eq!(load(&t, &node).unwrap(), nulls);

        let empty = Value::List(vec![]);
        let node = save(&t, &empty);
        assert_eq!(
            node.as_map().and_then(|m| m.child_list(NULL_MARKER)).map(ListNode::len),
            Some(0)
        );
        assert_eq!(load(&t, &node).unwrap(), empty);

        assert_eq!(load(&t, &save(&t, &Value::Null)).unwrap(), Value::Null);
    }

    #[test]
    fn nested_embedded_leaf_paths() {
        let t = create(&TypeDesc::list(TypeDesc::embedded("Toy"))).unwrap();
        let toy = |label: &str, owner: Value| {
            Value::Object(Object::new("Toy").with("label", label).with("owner", owner))
        };
        let value = Value::List(vec![
            toy("ball", Value::Object(Object::new("Owner").with("name", "Ann"))),
            toy("rope", Value::Null),
        ]);
        let node = save(&t, &value);
        let map = node.as_map().unwrap();
        assert!(map.child_list("owner").is_some());
        assert!(map.child_list("owner.name").is_some());
        assert_eq!(load(&t, &node).unwrap(), value);
    }

    #[test]
    fn empty_embedded_objects_stay_present() {
        let t = create(&TypeDesc::list(TypeDesc::embedded("Collar"))).unwrap();
        let collar = |label: &str, badge: Value| {
            Value::Object(Object::new("Collar").with("label", label).with("badge", badge))
        };
        let value = Value::List(vec![
            collar("red", Value::Object(Object::new("Badge"))),
            collar("blue", Value::Null),
            collar("green", Value::Object(Object::new("Badge").with("note", "x"))),
        ]);
        let node = save(&t, &value);
        let presence = node
            .as_map()
            .and_then(|m| m.child_list(&format!("badge{PRESENT_MARKER}")))
            .unwrap();
        let flags: Vec<_> = presence.iter().map(MapNode::value).collect();
        assert_eq!(flags, vec![Some(&PropertyValue::Bool(true)), None, None]);
        assert_eq!(load(&t, &node).unwrap(), value);
    }

    #[test]
    fn misaligned_lists_are_rejected() {
        let t = create(&TypeDesc::list(TypeDesc::embedded("Pet"))).unwrap();
        let mut map = MapNode::new();
        map.insert(
            "tag",
            ListNode::from(vec![MapNode::scalar(PropertyValue::from("x"), false)]),
        );
        map.insert(
            NULL_MARKER,
            ListNode::from(vec![
                MapNode::scalar(PropertyValue::Bool(false), false),
                MapNode::scalar(PropertyValue::Bool(false), false),
            ]),
        );
        assert!(matches!(
            load(&t, &map.into()),
            Err(TranslateError::Shape { .. })
        ));
        assert!(load(&t, &MapNode::new().into()).is_err());
    }

    #[test]
    fn unknown_leaf_lists_are_ignored() {
        let t = create(&TypeDesc::list(TypeDesc::embedded("Pet"))).unwrap();
        let mut node = save(&t, &Value::List(vec![pet("x")])).into_map().unwrap();
        node.insert(
            "legacy",
            ListNode::from(vec![MapNode::scalar(PropertyValue::Int(1), false)]),
        );
        assert_eq!(load(&t, &node.into()).unwrap(), Value::List(vec![pet("x")]));
    }

    #[test]
    fn nested_collections_are_illegal() {
        let err = create(&TypeDesc::list(TypeDesc::list(TypeDesc::String))).unwrap_err();
        assert!(matches!(err, ConfigError::IllegalNesting { .. }));

        let err = create(&TypeDesc::list(TypeDesc::embedded("Kennel"))).unwrap_err();
        match err {
            ConfigError::IllegalNesting { path, .. } => assert_eq!(path.to_string(), "items.pets"),
            other => panic!("unexpected {other}"),
        }

        let err = create(&TypeDesc::list(TypeDesc::map(TypeDesc::String, TypeDesc::String)))
            .unwrap_err();
        assert!(matches!(err, ConfigError::IllegalNesting { .. }));
    }

    #[test]
    fn non_list_value_is_conversion_error() {
        let t = create(&TypeDesc::list(TypeDesc::String)).unwrap();
        let err = t
            .save(&Value::from("x"), false, &mut SaveContext::new(), &Path::root())
            .unwrap_err();
        assert!(err.is_conversion());
    }
}
