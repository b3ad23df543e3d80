use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};

const TAG_ID: u8 = 0x01;
const TAG_NAME: u8 = 0x02;

/// The identifying part of a single key element: a numeric id or a string
/// name.
///
/// All ids sort before all names; ids compare numerically and names
/// lexicographically by bytes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyId {
    /// Store-allocated or application-chosen positive integer id.
    Id(i64),
    /// Application-chosen string name.
    Name(String),
}

impl KeyId {
    fn validate(&self) -> TypeResult<()> {
        match self {
            KeyId::Id(id) if *id <= 0 => Err(TypeError::InvalidKey(format!(
                "numeric id must be positive, got {id}"
            ))),
            KeyId::Name(name) if name.is_empty() => {
                Err(TypeError::InvalidKey("name must not be empty".into()))
            }
            KeyId::Name(name) if name.len() > u16::MAX as usize => Err(TypeError::InvalidKey(
                format!("name is {} bytes, limit is {}", name.len(), u16::MAX),
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::Id(id) => write!(f, "{id}"),
            KeyId::Name(name) => write!(f, "{name:?}"),
        }
    }
}

impl From<i64> for KeyId {
    fn from(id: i64) -> Self {
        KeyId::Id(id)
    }
}

impl From<i32> for KeyId {
    fn from(id: i32) -> Self {
        KeyId::Id(id as i64)
    }
}

impl From<&str> for KeyId {
    fn from(name: &str) -> Self {
        KeyId::Name(name.to_string())
    }
}

impl From<String> for KeyId {
    fn from(name: String) -> Self {
        KeyId::Name(name)
    }
}

/// Hierarchical address of an entity in the remote store.
///
/// A `Key` is a kind plus a numeric id or string name, optionally under a
/// parent key. The chain of parents forms an ownership path from a root
/// entity down to this one. Keys are immutable values: equality, hashing,
/// and ordering are structural over the whole parent chain.
///
/// Ordering compares element by element from the root down (kind first, then
/// id-or-name); a key always sorts after its ancestors.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "KeyRepr", into = "KeyRepr")]
pub struct Key {
    parent: Option<Box<Key>>,
    kind: String,
    id: KeyId,
}

/// Transport shape of a key: `(parent chain, kind, id-or-name)`.
#[derive(Serialize, Deserialize)]
struct KeyRepr {
    #[serde(default)]
    parent: Option<Box<Key>>,
    kind: String,
    id: KeyId,
}

impl TryFrom<KeyRepr> for Key {
    type Error = TypeError;

    fn try_from(repr: KeyRepr) -> TypeResult<Self> {
        Key::new(repr.parent.map(|p| *p), repr.kind, repr.id)
    }
}

impl From<Key> for KeyRepr {
    fn from(key: Key) -> Self {
        KeyRepr {
            parent: key.parent,
            kind: key.kind,
            id: key.id,
        }
    }
}

impl Key {
    /// Create a key under an optional parent.
    pub fn new(parent: Option<Key>, kind: impl Into<String>, id: impl Into<KeyId>) -> TypeResult<Self> {
        let kind = kind.into();
        let id = id.into();
        if kind.is_empty() {
            return Err(TypeError::InvalidKey("kind must not be empty".into()));
        }
        if kind.len() > u16::MAX as usize {
            return Err(TypeError::InvalidKey(format!(
                "kind is {} bytes, limit is {}",
                kind.len(),
                u16::MAX
            )));
        }
        id.validate()?;
        Ok(Self {
            parent: parent.map(Box::new),
            kind,
            id,
        })
    }

    /// Create a root key (no parent).
    pub fn root(kind: impl Into<String>, id: impl Into<KeyId>) -> TypeResult<Self> {
        Self::new(None, kind, id)
    }

    /// Create a key whose parent is `self`.
    pub fn child(&self, kind: impl Into<String>, id: impl Into<KeyId>) -> TypeResult<Self> {
        Self::new(Some(self.clone()), kind, id)
    }

    /// The entity kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The id-or-name of this element.
    pub fn id(&self) -> &KeyId {
        &self.id
    }

    /// The numeric id, if this key is id-based.
    pub fn as_id(&self) -> Option<i64> {
        match self.id {
            KeyId::Id(id) => Some(id),
            KeyId::Name(_) => None,
        }
    }

    /// The string name, if this key is name-based.
    pub fn as_name(&self) -> Option<&str> {
        match &self.id {
            KeyId::Name(name) => Some(name),
            KeyId::Id(_) => None,
        }
    }

    /// The parent key, if any.
    pub fn parent(&self) -> Option<&Key> {
        self.parent.as_deref()
    }

    /// The same kind and id placed under another parent.
    pub fn with_parent(&self, parent: Option<Key>) -> Self {
        Self {
            parent: parent.map(Box::new),
            kind: self.kind.clone(),
            id: self.id.clone(),
        }
    }

    /// The root-most ancestor (or `self` for a root key).
    pub fn root_key(&self) -> &Key {
        let mut current = self;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Iterate over the ancestors of this key, nearest parent first.
    pub fn ancestors(&self) -> impl Iterator<Item = &Key> {
        std::iter::successors(self.parent(), |k| k.parent())
    }

    /// Number of elements in the chain (1 for a root key).
    pub fn depth(&self) -> usize {
        1 + self.ancestors().count()
    }

    /// Elements from the root down to this key.
    fn elements(&self) -> Vec<(&str, &KeyId)> {
        let mut elements: Vec<(&str, &KeyId)> = self
            .ancestors()
            .map(|k| (k.kind.as_str(), &k.id))
            .collect();
        elements.reverse();
        elements.push((&self.kind, &self.id));
        elements
    }

    // -----------------------------------------------------------------------
    // Stable encodings
    // -----------------------------------------------------------------------

    /// Stable binary form, root element first.
    ///
    /// Each element is `u16 kind length | kind | tag | payload` where the
    /// payload is a big-endian `i64` for ids or `u16 length | bytes` for names.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 * self.depth());
        for (kind, id) in self.elements() {
            out.extend_from_slice(&(kind.len() as u16).to_be_bytes());
            out.extend_from_slice(kind.as_bytes());
            match id {
                KeyId::Id(n) => {
                    out.push(TAG_ID);
                    out.extend_from_slice(&n.to_be_bytes());
                }
                KeyId::Name(name) => {
                    out.push(TAG_NAME);
                    out.extend_from_slice(&(name.len() as u16).to_be_bytes());
                    out.extend_from_slice(name.as_bytes());
                }
            }
        }
        out
    }

    /// Decode the binary form produced by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> TypeResult<Self> {
        if bytes.is_empty() {
            return Err(TypeError::InvalidKey("empty key encoding".into()));
        }
        let mut reader = ByteReader { bytes, offset: 0 };
        let mut key: Option<Key> = None;
        while !reader.is_done() {
            let kind_len = reader.read_u16()? as usize;
            let kind = reader.read_str(kind_len)?;
            let id = match reader.read_u8()? {
                TAG_ID => KeyId::Id(reader.read_i64()?),
                TAG_NAME => {
                    let len = reader.read_u16()? as usize;
                    KeyId::Name(reader.read_str(len)?)
                }
                other => return Err(TypeError::UnknownIdTag(other)),
            };
            key = Some(Key::new(key, kind, id)?);
        }
        key.ok_or_else(|| TypeError::InvalidKey("empty key encoding".into()))
    }

    /// Canonical string form: lowercase hex of [`Self::to_bytes`].
    pub fn to_encoded(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Parse the canonical string form.
    pub fn from_encoded(s: &str) -> TypeResult<Self> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn is_done(&self) -> bool {
        self.offset >= self.bytes.len()
    }

    fn take(&mut self, n: usize) -> TypeResult<&'a [u8]> {
        let remaining = self.bytes.len() - self.offset;
        if remaining < n {
            return Err(TypeError::Truncated {
                offset: self.offset,
                needed: n - remaining,
            });
        }
        let slice = &self.bytes[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> TypeResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> TypeResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_i64(&mut self) -> TypeResult<i64> {
        let mut arr = [0u8; 8];
        arr.copy_from_slice(self.take(8)?);
        Ok(i64::from_be_bytes(arr))
    }

    fn read_str(&mut self, len: usize) -> TypeResult<String> {
        let b = self.take(len)?;
        String::from_utf8(b.to_vec()).map_err(|e| TypeError::InvalidKey(e.to_string()))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = self.elements();
        let b = other.elements();
        for ((ka, ia), (kb, ib)) in a.iter().zip(b.iter()) {
            match ka.cmp(kb).then_with(|| ia.cmp(ib)) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        a.len().cmp(&b.len())
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = self.parent() {
            write!(f, "{parent}/")?;
        }
        write!(f, "{}({})", self.kind, self.id)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({self})")
    }
}

impl FromStr for Key {
    type Err = TypeError;

    fn from_str(s: &str) -> TypeResult<Self> {
        Self::from_encoded(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn person(id: i64) -> Key {
        Key::root("Person", id).unwrap()
    }

    #[test]
    fn root_key_accessors() {
        let key = person(42);
        assert_eq!(key.kind(), "Person");
        assert_eq!(key.as_id(), Some(42));
        assert_eq!(key.as_name(), None);
        assert!(key.parent().is_none());
        assert_eq!(key.depth(), 1);
        assert_eq!(key.root_key(), &key);
    }

    #[test]
    fn child_key_chain() {
        let parent = person(1);
        let child = parent.child("Pet", "rex").unwrap();
        assert_eq!(child.parent(), Some(&parent));
        assert_eq!(child.as_name(), Some("rex"));
        assert_eq!(child.depth(), 2);
        assert_eq!(child.root_key(), &parent);
        assert_eq!(child.ancestors().count(), 1);

        let moved = child.with_parent(Some(person(2)));
        assert_eq!(moved.parent(), Some(&person(2)));
        assert_eq!(moved.as_name(), Some("rex"));
        assert_eq!(child.with_parent(None).depth(), 1);
    }

    #[test]
    fn rejects_invalid_parts() {
        assert!(Key::root("", 1).is_err());
        assert!(Key::root("Person", 0).is_err());
        assert!(Key::root("Person", -5).is_err());
        assert!(Key::root("Person", "").is_err());
    }

    #[test]
    fn display_is_human_readable() {
        let key = person(7).child("Pet", "rex").unwrap();
        assert_eq!(key.to_string(), "Person(7)/Pet(\"rex\")");
        assert_eq!(format!("{key:?}"), "Key(Person(7)/Pet(\"rex\"))");
    }

    #[test]
    fn encoded_roundtrip_with_parent() {
        let key = person(7).child("Pet", "rex").unwrap().child("Toy", 3).unwrap();
        let encoded = key.to_encoded();
        let parsed: Key = encoded.parse().unwrap();
        assert_eq!(parsed, key);
        assert_eq!(Key::from_bytes(&key.to_bytes()).unwrap(), key);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Key::from_encoded("zz").is_err());
        assert!(Key::from_bytes(&[]).is_err());
        assert!(matches!(
            Key::from_bytes(&[0, 6, b'P']),
            Err(TypeError::Truncated { .. })
        ));
        let mut bytes = person(1).to_bytes();
        bytes[8] = 0x09;
        assert_eq!(Key::from_bytes(&bytes), Err(TypeError::UnknownIdTag(0x09)));
    }

    #[test]
    fn ordering_by_kind_then_id() {
        let a = Key::root("A", 5).unwrap();
        let b = Key::root("B", 1).unwrap();
        assert!(a < b);

        let id = Key::root("A", i64::MAX).unwrap();
        let name = Key::root("A", "a").unwrap();
        assert!(id < name, "ids sort before names");

        assert!(Key::root("A", 2).unwrap() < Key::root("A", 10).unwrap());
    }

    #[test]
    fn ordering_respects_parent_chain() {
        let p1 = person(1);
        let p2 = person(2);
        let c1 = p1.child("Pet", 99).unwrap();
        let c2 = p2.child("Pet", 1).unwrap();
        assert!(p1 < c1, "ancestor sorts before descendant");
        assert!(c1 < p2);
        assert!(c1 < c2);
    }

    #[test]
    fn serde_roundtrip_uses_transport_shape() {
        let key = person(3).child("Pet", "rex").unwrap();
        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(json["kind"], "Pet");
        assert_eq!(json["id"]["Name"], "rex");
        assert_eq!(json["parent"]["kind"], "Person");
        let back: Key = serde_json::from_value(json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn serde_rejects_invalid_key() {
        let json = r#"{"kind":"Person","id":{"Id":0}}"#;
        assert!(serde_json::from_str::<Key>(json).is_err());
    }

    fn arb_id() -> impl Strategy<Value = KeyId> {
        prop_oneof![
            (1i64..i64::MAX).prop_map(KeyId::Id),
            "[a-zA-Z0-9 _./-]{1,24}".prop_map(KeyId::Name),
        ]
    }

    fn arb_key() -> impl Strategy<Value = Key> {
        prop::collection::vec(("[A-Z][a-z]{0,8}", arb_id()), 1..4).prop_map(|elements| {
            let mut key: Option<Key> = None;
            for (kind, id) in elements {
                key = Some(Key::new(key, kind, id).unwrap());
            }
            key.unwrap()
        })
    }

    proptest! {
        #[test]
        fn encoded_form_roundtrips(key in arb_key()) {
            let parsed = Key::from_encoded(&key.to_encoded()).unwrap();
            prop_assert_eq!(&parsed, &key);
            prop_assert_eq!(parsed.cmp(&key), Ordering::Equal);
        }

        #[test]
        fn ordering_is_antisymmetric(a in arb_key(), b in arb_key()) {
            prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
            prop_assert_eq!(a.cmp(&b) == Ordering::Equal, a == b);
        }
    }
}
