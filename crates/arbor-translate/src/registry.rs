//! Registration of classes, factories, and stringifiers, and the frozen
//! registry built from them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use arbor_tree::MapNode;
use arbor_types::{Key, Object, Path};
use tracing::info;

use crate::chain::FactoryChain;
use crate::context::{CreateContext, LoadContext, SaveContext};
use crate::embedded::ClassTranslator;
use crate::entity::{EntityTranslator, SavedEntity};
use crate::error::{ConfigError, ConfigResult, TranslateError, TranslateResult};
use crate::meta::ClassMeta;
use crate::stringifier::Stringifier;
use crate::translator::TranslatorFactory;

// ---------------------------------------------------------------------------
// RegistryBuilder
// ---------------------------------------------------------------------------

/// Collects configuration during startup.
#[derive(Default)]
pub struct RegistryBuilder {
    factories: Vec<Arc<dyn TranslatorFactory>>,
    classes: BTreeMap<String, ClassMeta>,
    stringifiers: HashMap<String, Arc<dyn Stringifier>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a factory ahead of the built-ins. Earlier user factories win.
    pub fn add_factory(&mut self, factory: Arc<dyn TranslatorFactory>) {
        self.factories.push(factory);
    }

    /// Make a stringifier available to map fields under `name`.
    pub fn add_stringifier(&mut self, name: impl Into<String>, stringifier: Arc<dyn Stringifier>) {
        self.stringifiers.insert(name.into(), stringifier);
    }

    /// Register a class after checking its field metadata.
    pub fn register(&mut self, class: ClassMeta) -> ConfigResult<()> {
        if self.classes.contains_key(&class.name) {
            return Err(ConfigError::DuplicateClass(class.name));
        }
        validate(&class)?;
        self.classes.insert(class.name.clone(), class);
        Ok(())
    }

    pub fn is_registered(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    /// Build every translator and freeze the configuration.
    ///
    /// All configuration errors surface here.
    pub fn build(&self) -> ConfigResult<Registry> {
        let chain = FactoryChain::new(self.factories.clone());
        let mut entities = HashMap::new();
        let mut embedded = HashMap::new();
        for meta in self.classes.values() {
            let mut ctx = CreateContext::new(&chain, &self.classes, &self.stringifiers);
            let translator = ClassTranslator::build(meta, &mut ctx, &Path::root())?;
            match &meta.identity {
                Some(identity) => {
                    entities.insert(
                        meta.name.clone(),
                        EntityTranslator::new(translator, identity.clone(), meta.indexed_by_default),
                    );
                }
                None => {
                    embedded.insert(meta.name.clone(), Arc::new(translator));
                }
            }
        }
        info!(
            entities = entities.len(),
            embedded = embedded.len(),
            factories = chain.len(),
            "translator registry built"
        );
        Ok(Registry {
            entities,
            embedded,
            classes: self.classes.clone(),
        })
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("factories", &self.factories.len())
            .field("classes", &self.classes.keys().collect::<Vec<_>>())
            .field("stringifiers", &self.stringifiers.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn validate(class: &ClassMeta) -> ConfigResult<()> {
    let invalid = |field: &str, reason: &str| ConfigError::InvalidField {
        class: class.name.clone(),
        field: field.to_string(),
        reason: reason.to_string(),
    };
    if class.name.is_empty() {
        return Err(invalid("", "class name is empty"));
    }
    let mut key_fields = Vec::new();
    if let Some(identity) = &class.identity {
        if identity.id_field.is_empty() {
            return Err(invalid("", "id field name is empty"));
        }
        key_fields.push(identity.id_field.as_str());
        if let Some(parent) = &identity.parent_field {
            if parent == &identity.id_field {
                return Err(invalid(parent.as_str(), "parent field is also the id field"));
            }
            key_fields.push(parent.as_str());
        }
    }
    let mut seen = HashSet::new();
    for field in &class.fields {
        let name = field.name.as_str();
        if name.is_empty() {
            return Err(invalid(name, "field name is empty"));
        }
        if name.contains('.') || name.starts_with('^') {
            return Err(invalid(name, "field names cannot contain '.' or start with '^'"));
        }
        if key_fields.contains(&name) {
            return Err(invalid(name, "collides with a key field"));
        }
        if !seen.insert(name) {
            return Err(invalid(name, "declared twice"));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Frozen translator configuration, shared read-only by every session.
#[derive(Debug)]
pub struct Registry {
    entities: HashMap<String, EntityTranslator>,
    embedded: HashMap<String, Arc<ClassTranslator>>,
    classes: BTreeMap<String, ClassMeta>,
}

impl Registry {
    pub fn entity(&self, kind: &str) -> TranslateResult<&EntityTranslator> {
        self.entities
            .get(kind)
            .ok_or_else(|| TranslateError::UnknownKind(kind.to_string()))
    }

    pub fn embedded(&self, class: &str) -> Option<&Arc<ClassTranslator>> {
        self.embedded.get(class)
    }

    pub fn class(&self, name: &str) -> Option<&ClassMeta> {
        self.classes.get(name)
    }

    pub fn is_entity(&self, kind: &str) -> bool {
        self.entities.contains_key(kind)
    }

    /// Registered entity kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.entities.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Convert an entity object for the store.
    pub fn save(&self, object: &Object) -> TranslateResult<SavedEntity> {
        self.entity(object.class())?
            .save(object, &mut SaveContext::new())
    }

    /// Rebuild the entity stored at `key`.
    pub fn load(&self, key: &Key, node: &MapNode) -> TranslateResult<Object> {
        self.load_with(key, node, &mut LoadContext::new())
    }

    /// Like [`Self::load`], collecting errors recovered by lenient fields.
    pub fn load_with(
        &self,
        key: &Key,
        node: &MapNode,
        ctx: &mut LoadContext,
    ) -> TranslateResult<Object> {
        self.entity(key.kind())?.load(key, node, ctx)
    }
}
