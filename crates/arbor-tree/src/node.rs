use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{TreeError, TreeResult};
use crate::property::PropertyValue;

// ---------------------------------------------------------------------------
// MapNode
// ---------------------------------------------------------------------------

/// A node holding named children and, independently, an optional scalar
/// value at this exact path.
///
/// A map-node with neither children nor a value is *empty*. Inside a
/// list-node an empty item marks a position that has no value at all, which
/// is distinct from an item holding [`PropertyValue::Null`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MapNode {
    children: BTreeMap<String, Node>,
    value: Option<PropertyValue>,
    indexed: bool,
}

impl MapNode {
    /// An empty map-node.
    pub fn new() -> Self {
        Self::default()
    }

    /// A leaf map-node carrying a scalar value.
    pub fn scalar(value: PropertyValue, indexed: bool) -> Self {
        Self {
            children: BTreeMap::new(),
            value: Some(value),
            indexed,
        }
    }

    /// A leaf map-node carrying an unindexed `Null`.
    pub fn null() -> Self {
        Self::scalar(PropertyValue::Null, false)
    }

    pub fn value(&self) -> Option<&PropertyValue> {
        self.value.as_ref()
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn set_value(&mut self, value: PropertyValue, indexed: bool) {
        self.value = Some(value);
        self.indexed = indexed;
    }

    pub fn take_value(&mut self) -> Option<PropertyValue> {
        self.value.take()
    }

    /// Whether the scalar value is indexed. Only meaningful on save.
    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// `true` when the node carries a `Null` scalar and has no children.
    pub fn is_null_leaf(&self) -> bool {
        self.children.is_empty() && matches!(self.value, Some(PropertyValue::Null))
    }

    /// `true` when the node has neither children nor a value.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.value.is_none()
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.get(name)
    }

    pub fn child_map(&self, name: &str) -> Option<&MapNode> {
        self.children.get(name).and_then(Node::as_map)
    }

    pub fn child_list(&self, name: &str) -> Option<&ListNode> {
        self.children.get(name).and_then(Node::as_list)
    }

    /// Insert a child, returning the node previously at that name.
    pub fn insert(&mut self, name: impl Into<String>, node: impl Into<Node>) -> Option<Node> {
        self.children.insert(name.into(), node.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Node> {
        self.children.remove(name)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Walk (creating as needed) the chain of map-nodes named by `segments`.
    ///
    /// Returns `None` if a list-node sits on the way.
    pub fn map_at_mut(&mut self, segments: &[&str]) -> Option<&mut MapNode> {
        let mut current = self;
        for segment in segments {
            let child = current
                .children
                .entry((*segment).to_string())
                .or_insert_with(|| Node::Map(MapNode::new()));
            current = match child {
                Node::Map(m) => m,
                Node::List(_) => return None,
            };
        }
        Some(current)
    }

    /// Dotted-name view of the tree, the shape a flat property store sees.
    ///
    /// Child names beginning with `^` are marker paths and are appended
    /// without a separating dot (`pets^null`).
    pub fn flatten(&self) -> BTreeMap<String, FlatProperty> {
        let mut out = BTreeMap::new();
        flatten_into(self, "", &mut out);
        out
    }

    /// Encode the tree with bincode.
    pub fn to_bytes(&self) -> TreeResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| TreeError::Serialization(e.to_string()))
    }

    /// Decode a tree produced by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> TreeResult<Self> {
        bincode::deserialize(bytes).map_err(|e| TreeError::Serialization(e.to_string()))
    }
}

/// Join a parent property name with a child name.
pub(crate) fn join_name(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else if name.starts_with('^') {
        format!("{prefix}{name}")
    } else {
        format!("{prefix}.{name}")
    }
}

fn flatten_into(node: &MapNode, prefix: &str, out: &mut BTreeMap<String, FlatProperty>) {
    if let (Some(value), false) = (&node.value, prefix.is_empty()) {
        out.insert(
            prefix.to_string(),
            FlatProperty::Single {
                value: value.clone(),
                indexed: node.indexed,
            },
        );
    }
    for (name, child) in &node.children {
        let full = join_name(prefix, name);
        match child {
            Node::Map(m) => flatten_into(m, &full, out),
            Node::List(l) => {
                out.insert(
                    full,
                    FlatProperty::List(l.items.iter().map(|i| i.value.clone()).collect()),
                );
            }
        }
    }
}

/// One property in the dotted-name view of a tree.
#[derive(Clone, Debug, PartialEq)]
pub enum FlatProperty {
    Single { value: PropertyValue, indexed: bool },
    /// Repeated property; `None` marks an item with no value.
    List(Vec<Option<PropertyValue>>),
}

// ---------------------------------------------------------------------------
// ListNode
// ---------------------------------------------------------------------------

/// An ordered sequence of map-nodes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListNode {
    items: Vec<MapNode>,
}

impl ListNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: MapNode) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[MapNode] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&MapNode> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MapNode> {
        self.items.iter()
    }
}

impl From<Vec<MapNode>> for ListNode {
    fn from(items: Vec<MapNode>) -> Self {
        Self { items }
    }
}

impl FromIterator<MapNode> for ListNode {
    fn from_iter<I: IntoIterator<Item = MapNode>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Either kind of tree node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Map(MapNode),
    List(ListNode),
}

impl Node {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Map(_) => "map",
            Node::List(_) => "list",
        }
    }

    pub fn as_map(&self) -> Option<&MapNode> {
        match self {
            Node::Map(m) => Some(m),
            Node::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListNode> {
        match self {
            Node::List(l) => Some(l),
            Node::Map(_) => None,
        }
    }

    pub fn into_map(self) -> Option<MapNode> {
        match self {
            Node::Map(m) => Some(m),
            Node::List(_) => None,
        }
    }
}

impl From<MapNode> for Node {
    fn from(m: MapNode) -> Self {
        Node::Map(m)
    }
}

impl From<ListNode> for Node {
    fn from(l: ListNode) -> Self {
        Node::List(l)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> PropertyValue {
        PropertyValue::from(v)
    }

    #[test]
    fn value_and_children_coexist() {
        let mut b = MapNode::scalar(s("x"), true);
        b.insert("c", MapNode::scalar(s("y"), false));
        let mut a = MapNode::new();
        a.insert("b", b);

        let flat = a.flatten();
        assert_eq!(
            flat.get("b"),
            Some(&FlatProperty::Single {
                value: s("x"),
                indexed: true
            })
        );
        assert_eq!(
            flat.get("b.c"),
            Some(&FlatProperty::Single {
                value: s("y"),
                indexed: false
            })
        );
    }

    #[test]
    fn empty_versus_null() {
        assert!(MapNode::new().is_empty());
        assert!(!MapNode::new().is_null_leaf());
        assert!(MapNode::null().is_null_leaf());
        assert!(!MapNode::null().is_empty());
    }

    #[test]
    fn map_at_mut_creates_intermediates() {
        let mut root = MapNode::new();
        root.map_at_mut(&["a", "b"])
            .unwrap()
            .set_value(PropertyValue::Int(1), false);
        assert_eq!(
            root.child_map("a")
                .and_then(|a| a.child_map("b"))
                .and_then(MapNode::value),
            Some(&PropertyValue::Int(1))
        );
    }

    #[test]
    fn map_at_mut_stops_at_lists() {
        let mut root = MapNode::new();
        root.insert("items", ListNode::new());
        assert!(root.map_at_mut(&["items", "x"]).is_none());
    }

    #[test]
    fn flatten_lists_and_markers() {
        let mut pets = MapNode::new();
        pets.insert(
            "tag",
            ListNode::from(vec![
                MapNode::scalar(s("x"), false),
                MapNode::new(),
                MapNode::scalar(s("z"), false),
            ]),
        );
        pets.insert(
            "^null",
            ListNode::from(vec![
                MapNode::scalar(PropertyValue::Bool(false), false),
                MapNode::scalar(PropertyValue::Bool(true), false),
                MapNode::scalar(PropertyValue::Bool(false), false),
            ]),
        );
        let mut root = MapNode::new();
        root.insert("pets", pets);

        let flat = root.flatten();
        assert_eq!(
            flat.get("pets.tag"),
            Some(&FlatProperty::List(vec![Some(s("x")), None, Some(s("z"))]))
        );
        assert!(matches!(flat.get("pets^null"), Some(FlatProperty::List(v)) if v.len() == 3));
    }

    #[test]
    fn bincode_roundtrip() {
        let mut root = MapNode::new();
        root.insert("name", MapNode::scalar(s("Ann"), true));
        root.insert(
            "nums",
            ListNode::from(vec![MapNode::scalar(PropertyValue::Int(1), false)]),
        );
        let bytes = root.to_bytes().unwrap();
        assert_eq!(MapNode::from_bytes(&bytes).unwrap(), root);
        assert!(MapNode::from_bytes(&[0xff]).is_err());
    }

    #[test]
    fn node_accessors() {
        let node = Node::from(ListNode::new());
        assert_eq!(node.kind_name(), "list");
        assert!(node.as_map().is_none());
        assert!(node.as_list().is_some());
    }
}
