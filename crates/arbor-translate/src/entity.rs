use arbor_tree::MapNode;
use arbor_types::{Key, KeyId, Object, Path, Value};

use crate::context::{LoadContext, SaveContext};
use crate::embedded::ClassTranslator;
use crate::error::{TranslateError, TranslateResult};
use crate::meta::{EntityIdentity, IdType};

/// An entity converted for the store: where it lives plus its property tree.
#[derive(Clone, Debug, PartialEq)]
pub struct SavedEntity {
    pub kind: String,
    pub parent: Option<Key>,
    /// `None` for a numeric-id entity whose id is not yet allocated.
    pub id: Option<KeyId>,
    pub node: MapNode,
}

impl SavedEntity {
    /// The complete key, once the id is known.
    pub fn key(&self) -> Option<Key> {
        let id = self.id.clone()?;
        Key::new(self.parent.clone(), self.kind.as_str(), id).ok()
    }

    /// The key this entity gets with an allocated numeric id.
    pub fn key_with_id(&self, id: i64) -> TranslateResult<Key> {
        Ok(Key::new(self.parent.clone(), self.kind.as_str(), id)?)
    }
}

/// Translator for the root of an entity.
///
/// The id and parent fields are not part of the property tree: they are
/// lifted into the key on save and put back from the key on load.
#[derive(Debug)]
pub struct EntityTranslator {
    class: ClassTranslator,
    identity: EntityIdentity,
    indexed_by_default: bool,
}

impl EntityTranslator {
    pub fn new(class: ClassTranslator, identity: EntityIdentity, indexed_by_default: bool) -> Self {
        Self {
            class,
            identity,
            indexed_by_default,
        }
    }

    pub fn kind(&self) -> &str {
        self.class.class()
    }

    pub fn identity(&self) -> &EntityIdentity {
        &self.identity
    }

    fn invalid(&self, reason: impl Into<String>) -> TranslateError {
        TranslateError::InvalidEntity {
            class: self.kind().to_string(),
            reason: reason.into(),
        }
    }

    fn extract_id(&self, object: &Object) -> TranslateResult<Option<KeyId>> {
        let field = &self.identity.id_field;
        match (self.identity.id_type, object.get(field)) {
            (IdType::Long, Value::Null) => Ok(None),
            (IdType::Long, Value::Int(n)) if *n > 0 => Ok(Some(KeyId::Id(*n))),
            (IdType::Long, Value::Int(n)) => Err(self.invalid(format!("id {n} is not positive"))),
            (IdType::Name, Value::String(s)) if !s.is_empty() => Ok(Some(KeyId::Name(s.clone()))),
            (IdType::Name, Value::Null) => Err(self.invalid(format!("name field '{field}' is not set"))),
            (IdType::Name, Value::String(_)) => Err(self.invalid("name is empty")),
            (_, other) => Err(self.invalid(format!(
                "id field '{field}' holds {}",
                other.type_name()
            ))),
        }
    }

    fn extract_parent(&self, object: &Object) -> TranslateResult<Option<Key>> {
        let Some(field) = &self.identity.parent_field else {
            return Ok(None);
        };
        match object.get(field) {
            Value::Null => Ok(None),
            Value::Key(k) => Ok(Some(k.clone())),
            other => Err(self.invalid(format!(
                "parent field '{field}' holds {}",
                other.type_name()
            ))),
        }
    }

    pub fn save(&self, object: &Object, ctx: &mut SaveContext) -> TranslateResult<SavedEntity> {
        if object.class() != self.kind() {
            return Err(self.invalid(format!("object is a {}", object.class())));
        }
        let id = self.extract_id(object)?;
        let parent = self.extract_parent(object)?;
        let node = self
            .class
            .save_object(object, self.indexed_by_default, ctx, &Path::root())?;
        Ok(SavedEntity {
            kind: self.kind().to_string(),
            parent,
            id,
            node,
        })
    }

    pub fn load(&self, key: &Key, node: &MapNode, ctx: &mut LoadContext) -> TranslateResult<Object> {
        if key.kind() != self.kind() {
            return Err(self.invalid(format!("key {key} has the wrong kind")));
        }
        let mut object = self.class.load_object(node, ctx, &Path::root())?;
        self.inject_key(&mut object, key);
        Ok(object)
    }

    /// Write the key's id and parent into the matching fields of `object`.
    pub fn inject_key(&self, object: &mut Object, key: &Key) {
        let id = match key.id() {
            KeyId::Id(n) => Value::Int(*n),
            KeyId::Name(s) => Value::String(s.clone()),
        };
        object.set(self.identity.id_field.as_str(), id);
        if let Some(field) = &self.identity.parent_field {
            object.set(field.as_str(), Value::from(key.parent().cloned()));
        }
    }
}
