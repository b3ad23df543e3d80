//! Lazy, key-addressed entity references.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use arbor_types::Key;
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use tokio::sync::OnceCell;

use crate::entity::Entity;
use crate::error::{SessionError, SessionResult};
use crate::session::{Session, SessionInner};

/// A handle to the entity at a key.
///
/// A *dead* reference is detached from any session: it carries a fixed
/// value, or none, and never performs I/O. A *live* reference resolves
/// through its session the first time [`Ref::get`] is awaited and keeps the
/// result. [`Ref::key`] never performs I/O.
///
/// Live references hold their session weakly, so reference cycles between
/// loaded entities keep nothing alive.
pub struct Ref<T> {
    key: Key,
    state: State<T>,
}

enum State<T> {
    Dead(Option<Arc<T>>),
    Live {
        session: Weak<SessionInner>,
        resolved: OnceCell<Option<Arc<T>>>,
    },
}

impl<T> Ref<T> {
    /// A reference that knows only its key.
    pub fn dead(key: Key) -> Self {
        Self {
            key,
            state: State::Dead(None),
        }
    }

    /// A reference to a value already in hand; resolution is skipped.
    pub fn with_value(key: Key, value: Arc<T>) -> Self {
        Self {
            key,
            state: State::Dead(Some(value)),
        }
    }

    pub(crate) fn live(key: Key, session: Weak<SessionInner>) -> Self {
        Self {
            key,
            state: State::Live {
                session,
                resolved: OnceCell::new(),
            },
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn into_key(self) -> Key {
        self.key
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, State::Live { .. })
    }

    /// Whether [`Ref::get`] would return without I/O.
    pub fn is_resolved(&self) -> bool {
        match &self.state {
            State::Dead(_) => true,
            State::Live { resolved, .. } => resolved.initialized(),
        }
    }

    /// The value, if it is known without I/O.
    pub fn peek(&self) -> Option<Arc<T>> {
        match &self.state {
            State::Dead(value) => value.clone(),
            State::Live { resolved, .. } => resolved.get().cloned().flatten(),
        }
    }

    /// Detach from the session, keeping whatever value is already known.
    pub fn detach(&self) -> Self {
        Self {
            key: self.key.clone(),
            state: State::Dead(self.peek()),
        }
    }
}

impl<T: Entity> Ref<T> {
    /// The referenced entity, or `None` if the store has no record.
    ///
    /// A dead reference returns its fixed value. A live reference asks its
    /// session once; later calls return the same result.
    pub async fn get(&self) -> SessionResult<Option<Arc<T>>> {
        match &self.state {
            State::Dead(value) => Ok(value.clone()),
            State::Live { session, resolved } => {
                let value = resolved.get_or_try_init(|| self.resolve(session)).await?;
                Ok(value.clone())
            }
        }
    }

    /// Like [`Ref::get`], but absence is an error.
    pub async fn require(&self) -> SessionResult<Arc<T>> {
        self.get()
            .await?
            .ok_or_else(|| SessionError::NotFound(self.key.clone()))
    }

    async fn resolve(&self, session: &Weak<SessionInner>) -> SessionResult<Option<Arc<T>>> {
        let inner = session
            .upgrade()
            .ok_or_else(|| SessionError::Closed(self.key.clone()))?;
        let session = Session::from_inner(inner);
        session.load::<T>(&self.key).await
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        let state = match &self.state {
            State::Dead(value) => State::Dead(value.clone()),
            State::Live { session, resolved } => State::Live {
                session: session.clone(),
                resolved: resolved.clone(),
            },
        };
        Self {
            key: self.key.clone(),
            state,
        }
    }
}

/// References are equal when their keys are.
impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for Ref<T> {}

impl<T> Hash for Ref<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<T> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("key", &self.key)
            .field("live", &self.is_live())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Wire shape: the key's canonical string, plus the value when it is known.
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
enum RefRepr<T> {
    Loaded { key: String, value: T },
    Key(String),
}

impl<T: Serialize> Serialize for Ref<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let key = self.key.to_encoded();
        match self.peek() {
            Some(value) => RefRepr::Loaded {
                key,
                value: value.as_ref(),
            }
            .serialize(serializer),
            None => RefRepr::<&T>::Key(key).serialize(serializer),
        }
    }
}

/// Always yields a dead reference.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Ref<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parse = |s: &str| Key::from_encoded(s).map_err(<D::Error as de::Error>::custom);
        match RefRepr::<T>::deserialize(deserializer)? {
            RefRepr::Loaded { key, value } => Ok(Ref::with_value(parse(&key)?, Arc::new(value))),
            RefRepr::Key(key) => Ok(Ref::dead(parse(&key)?)),
        }
    }
}
