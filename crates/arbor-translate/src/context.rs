//! Per-traversal state threaded through translators.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use arbor_types::Path;

use crate::chain::FactoryChain;
use crate::error::{ConfigError, ConfigResult, TranslateError};
use crate::meta::{Annotations, ClassMeta, TypeDesc};
use crate::stringifier::Stringifier;
use crate::translator::Translator;

// ---------------------------------------------------------------------------
// SaveContext / LoadContext
// ---------------------------------------------------------------------------

/// State of one save traversal.
#[derive(Debug, Default)]
pub struct SaveContext {
    skipped: Vec<Path>,
}

impl SaveContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a field omitted by its skip condition.
    pub fn skip(&mut self, path: &Path) {
        self.skipped.push(path.clone());
    }

    /// Paths of fields omitted from the saved tree.
    pub fn skipped(&self) -> &[Path] {
        &self.skipped
    }
}

/// State of one load traversal.
#[derive(Debug, Default)]
pub struct LoadContext {
    recovered: Vec<TranslateError>,
}

impl LoadContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a conversion error a lenient field recovered from.
    pub fn recover(&mut self, error: TranslateError) {
        self.recovered.push(error);
    }

    pub fn recovered(&self) -> &[TranslateError] {
        &self.recovered
    }

    pub fn into_recovered(self) -> Vec<TranslateError> {
        self.recovered
    }
}

// ---------------------------------------------------------------------------
// CreateContext
// ---------------------------------------------------------------------------

/// State available to factories while translators are being built.
pub struct CreateContext<'a> {
    chain: &'a FactoryChain,
    classes: &'a BTreeMap<String, ClassMeta>,
    stringifiers: &'a HashMap<String, Arc<dyn Stringifier>>,
    in_collection: bool,
    building: Vec<String>,
}

impl<'a> CreateContext<'a> {
    pub fn new(
        chain: &'a FactoryChain,
        classes: &'a BTreeMap<String, ClassMeta>,
        stringifiers: &'a HashMap<String, Arc<dyn Stringifier>>,
    ) -> Self {
        Self {
            chain,
            classes,
            stringifiers,
            in_collection: false,
            building: Vec::new(),
        }
    }

    /// Build the translator for a nested type through the full chain.
    pub fn create(
        &mut self,
        ty: &TypeDesc,
        annotations: &Annotations,
        path: &Path,
    ) -> ConfigResult<Arc<dyn Translator>> {
        let chain = self.chain;
        chain.create(ty, annotations, self, path)
    }

    /// Build the element translator of a collection. Any repetition found
    /// below this point is illegal nesting.
    pub fn create_in_collection(
        &mut self,
        ty: &TypeDesc,
        annotations: &Annotations,
        path: &Path,
    ) -> ConfigResult<Arc<dyn Translator>> {
        let outer = std::mem::replace(&mut self.in_collection, true);
        let result = self.create(ty, annotations, path);
        self.in_collection = outer;
        result
    }

    /// `true` while building the element type of a collection.
    pub fn in_collection(&self) -> bool {
        self.in_collection
    }

    pub fn class(&self, name: &str, path: &Path) -> ConfigResult<&'a ClassMeta> {
        self.classes.get(name).ok_or_else(|| ConfigError::UnknownClass {
            class: name.to_string(),
            path: path.clone(),
        })
    }

    pub fn stringifier(&self, name: &str) -> Option<Arc<dyn Stringifier>> {
        self.stringifiers.get(name).cloned()
    }

    /// Mark `class` as under construction, failing if it already is.
    pub fn enter_class(&mut self, class: &str, path: &Path) -> ConfigResult<()> {
        if self.building.iter().any(|c| c == class) {
            return Err(ConfigError::RecursiveEmbedding {
                class: class.to_string(),
                path: path.clone(),
            });
        }
        self.building.push(class.to_string());
        Ok(())
    }

    pub fn exit_class(&mut self) {
        self.building.pop();
    }
}
