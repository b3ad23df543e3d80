use std::sync::Arc;

use arbor_types::Path;
use tracing::debug;

use crate::collection::CollectionFactory;
use crate::context::CreateContext;
use crate::embedded::EmbeddedFactory;
use crate::error::{ConfigError, ConfigResult};
use crate::map::MapFactory;
use crate::meta::{Annotations, TypeDesc};
use crate::scalar::{EnumFactory, ScalarFactory};
use crate::translator::{Translator, TranslatorFactory};

/// Ordered list of translator factories.
///
/// User factories are tried first, in registration order, so they can
/// override any built-in codec. Built-ins follow: scalars, enums, embedded
/// objects, collections, maps.
pub struct FactoryChain {
    factories: Vec<Arc<dyn TranslatorFactory>>,
}

impl FactoryChain {
    /// A chain with `user` factories ahead of the built-ins.
    pub fn new(user: Vec<Arc<dyn TranslatorFactory>>) -> Self {
        let mut factories = user;
        factories.push(Arc::new(ScalarFactory));
        factories.push(Arc::new(EnumFactory));
        factories.push(Arc::new(EmbeddedFactory));
        factories.push(Arc::new(CollectionFactory));
        factories.push(Arc::new(MapFactory));
        Self { factories }
    }

    /// A chain of built-ins only.
    pub fn builtin() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Ask each factory in turn for a translator of `ty`.
    pub fn create(
        &self,
        ty: &TypeDesc,
        annotations: &Annotations,
        ctx: &mut CreateContext<'_>,
        path: &Path,
    ) -> ConfigResult<Arc<dyn Translator>> {
        for factory in &self.factories {
            if let Some(translator) = factory.create(ty, annotations, ctx, path)? {
                debug!(factory = factory.name(), ty = %ty, path = %path, "translator created");
                return Ok(translator);
            }
        }
        Err(ConfigError::NoTranslator {
            ty: ty.to_string(),
            path: path.clone(),
        })
    }
}
