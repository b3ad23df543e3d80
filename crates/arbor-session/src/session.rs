//! Sessions and the per-operation identity cache.
//!
//! A session is the scope of one logical operation. Once a key has been
//! read or written through a session, every later read of that key in the
//! same session returns the same instance; the identity cache is never
//! refreshed mid-operation. Absence is remembered too.

use std::any::{type_name, Any};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};

use arbor_store::{RemoteStore, StoreError};
use arbor_translate::{LoadContext, Registry};
use arbor_tree::{Limits, MapNode};
use arbor_types::{Key, Object};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::entity::Entity;
use crate::error::{SessionError, SessionResult};
use crate::reference::Ref;

type Instance = Arc<dyn Any + Send + Sync>;

/// Identity cache entry; `None` once the key is known to be absent.
type Slot = Arc<OnceCell<Option<Instance>>>;

pub(crate) struct SessionInner {
    registry: Arc<Registry>,
    store: Arc<dyn RemoteStore>,
    limits: Limits,
    identity: Mutex<HashMap<Key, Slot>>,
}

/// Handle to one logical operation.
///
/// Clones share the identity cache. A session must not be shared between
/// unrelated concurrent operations.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn new(registry: Arc<Registry>, store: Arc<dyn RemoteStore>, limits: Limits) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                registry,
                store,
                limits,
                identity: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<SessionInner>) -> Self {
        Self { inner }
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    // ---- Reads ----

    /// The entity at `key`, or `None` if the store has no record.
    pub async fn load<T: Entity>(&self, key: &Key) -> SessionResult<Option<Arc<T>>> {
        check_kind::<T>(key)?;
        let slot = self.slot(key);
        if slot.initialized() {
            debug!(key = %key, "identity cache hit");
        }
        let instance = slot.get_or_try_init(|| self.fetch::<T>(key)).await?;
        downcast::<T>(key, instance.clone())
    }

    /// Load several keys with at most one store round-trip. The result is
    /// aligned with `keys`.
    pub async fn load_many<T: Entity>(&self, keys: &[Key]) -> SessionResult<Vec<Option<Arc<T>>>> {
        for key in keys {
            check_kind::<T>(key)?;
        }
        let slots: Vec<Slot> = keys.iter().map(|k| self.slot(k)).collect();

        let mut seen = HashSet::new();
        let missing: Vec<Key> = keys
            .iter()
            .zip(&slots)
            .filter(|(key, slot)| !slot.initialized() && seen.insert(*key))
            .map(|(key, _)| key.clone())
            .collect();

        if !missing.is_empty() {
            debug!(kind = T::KIND, count = missing.len(), "identity cache batch miss");
            let found = self.inner.store.get_many(&missing).await?;
            for key in &missing {
                let instance = match found.get(key) {
                    Some(node) => Some(self.decode::<T>(key, node)?),
                    None => None,
                };
                // A concurrent resolution that got there first wins.
                let _ = self.slot(key).set(instance);
            }
        }

        let mut out = Vec::with_capacity(keys.len());
        for (key, slot) in keys.iter().zip(slots) {
            let instance = slot.get_or_try_init(|| self.fetch::<T>(key)).await?;
            out.push(downcast::<T>(key, instance.clone())?);
        }
        Ok(out)
    }

    /// A live reference resolved through this session.
    pub fn make_ref<T: Entity>(&self, key: Key) -> Ref<T> {
        Ref::live(key, Arc::downgrade(&self.inner))
    }

    /// Whether `key` has been read or written in this session.
    pub fn is_cached(&self, key: &Key) -> bool {
        self.inner
            .identity
            .lock()
            .expect("lock poisoned")
            .get(key)
            .is_some_and(|slot| slot.initialized())
    }

    /// Forget everything this session has read or written.
    pub fn clear(&self) {
        self.inner.identity.lock().expect("lock poisoned").clear();
    }

    // ---- Writes ----

    /// Save an entity and return its key.
    ///
    /// An entity without an id gets one from the store. The saved instance,
    /// with the allocated id filled in, becomes this session's instance for
    /// the key.
    pub async fn save<T: Entity>(&self, entity: T) -> SessionResult<Key> {
        let mut keys = self.save_many(vec![entity]).await?;
        keys.pop()
            .ok_or_else(|| StoreError::Backend("store returned no key".into()).into())
    }

    /// Save several entities of one kind in a single store write.
    pub async fn save_many<T: Entity>(&self, entities: Vec<T>) -> SessionResult<Vec<Key>> {
        let mut pending = Vec::with_capacity(entities.len());
        let mut unallocated: BTreeMap<Option<Key>, Vec<usize>> = BTreeMap::new();
        for entity in entities {
            let object = entity.to_object();
            if object.class() != T::KIND {
                return Err(SessionError::entity(
                    T::KIND,
                    format!("to_object produced a {}", object.class()),
                ));
            }
            let saved = self.inner.registry.save(&object)?;
            self.inner.limits.check(&saved.node)?;
            let key = saved.key();
            if key.is_none() {
                unallocated
                    .entry(saved.parent.clone())
                    .or_default()
                    .push(pending.len());
            }
            pending.push(Pending {
                entity,
                object,
                saved,
                key,
            });
        }

        for (parent, indices) in unallocated {
            let ids = self
                .inner
                .store
                .allocate_ids(T::KIND, parent.as_ref(), indices.len())
                .await?;
            if ids.len() != indices.len() {
                return Err(StoreError::Backend(format!(
                    "asked for {} ids, got {}",
                    indices.len(),
                    ids.len()
                ))
                .into());
            }
            for (index, id) in indices.into_iter().zip(ids) {
                let item = &mut pending[index];
                let key = item.saved.key_with_id(id)?;
                debug!(key = %key, "id allocated");
                item.key = Some(key);
            }
        }

        let mut records = Vec::with_capacity(pending.len());
        let mut instances = Vec::with_capacity(pending.len());
        for item in pending {
            let key = item
                .key
                .ok_or_else(|| SessionError::entity(T::KIND, "entity has no key"))?;
            let instance = if item.saved.id.is_some() {
                item.entity
            } else {
                let mut object = item.object;
                self.inner
                    .registry
                    .entity(T::KIND)?
                    .inject_key(&mut object, &key);
                T::from_object(object, &self.scope(&key))?
            };
            records.push((key, item.saved.node));
            instances.push(instance);
        }

        let keys = self.inner.store.put_many(records).await?;
        for (key, instance) in keys.iter().zip(instances) {
            self.remember(key, Some(Arc::new(instance)));
        }
        debug!(kind = T::KIND, count = keys.len(), "entities saved");
        Ok(keys)
    }

    pub async fn delete(&self, key: &Key) -> SessionResult<()> {
        self.delete_many(std::slice::from_ref(key)).await
    }

    /// Delete records; this session then sees them as absent.
    pub async fn delete_many(&self, keys: &[Key]) -> SessionResult<()> {
        self.inner.store.delete_many(keys).await?;
        for key in keys {
            self.remember(key, None);
        }
        debug!(count = keys.len(), "entities deleted");
        Ok(())
    }

    /// The key `entity` would be saved under, if it has an id.
    pub fn key_of<T: Entity>(&self, entity: &T) -> SessionResult<Option<Key>> {
        Ok(self.inner.registry.save(&entity.to_object())?.key())
    }

    // ---- Internals ----

    fn slot(&self, key: &Key) -> Slot {
        self.inner
            .identity
            .lock()
            .expect("lock poisoned")
            .entry(key.clone())
            .or_default()
            .clone()
    }

    fn remember(&self, key: &Key, instance: Option<Instance>) {
        let slot = Arc::new(OnceCell::new_with(Some(instance)));
        self.inner
            .identity
            .lock()
            .expect("lock poisoned")
            .insert(key.clone(), slot);
    }

    fn scope<'a>(&'a self, key: &'a Key) -> LoadScope<'a> {
        LoadScope { session: self, key }
    }

    async fn fetch<T: Entity>(&self, key: &Key) -> SessionResult<Option<Instance>> {
        debug!(key = %key, "identity cache miss");
        match self.inner.store.get(key).await? {
            Some(node) => Ok(Some(self.decode::<T>(key, &node)?)),
            None => Ok(None),
        }
    }

    fn decode<T: Entity>(&self, key: &Key, node: &MapNode) -> SessionResult<Instance> {
        let mut ctx = LoadContext::new();
        let object: Object = self.inner.registry.load_with(key, node, &mut ctx)?;
        if !ctx.recovered().is_empty() {
            warn!(key = %key, recovered = ctx.recovered().len(), "entity loaded with recovered fields");
        }
        let entity: Instance = Arc::new(T::from_object(object, &self.scope(key))?);
        Ok(entity)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cached = self.inner.identity.lock().map(|m| m.len()).unwrap_or(0);
        f.debug_struct("Session")
            .field("cached_keys", &cached)
            .field("limits", &self.inner.limits)
            .finish()
    }
}

struct Pending<T> {
    entity: T,
    object: Object,
    saved: arbor_translate::SavedEntity,
    key: Option<Key>,
}

fn check_kind<T: Entity>(key: &Key) -> SessionResult<()> {
    if key.kind() == T::KIND {
        Ok(())
    } else {
        Err(SessionError::KindMismatch {
            key: key.clone(),
            expected: T::KIND.to_string(),
        })
    }
}

fn downcast<T: Entity>(key: &Key, instance: Option<Instance>) -> SessionResult<Option<Arc<T>>> {
    instance
        .map(|any| {
            any.downcast::<T>().map_err(|_| SessionError::TypeMismatch {
                key: key.clone(),
                expected: type_name::<T>(),
            })
        })
        .transpose()
}

/// What [`Entity::from_object`] sees while an entity is being built.
pub struct LoadScope<'a> {
    session: &'a Session,
    key: &'a Key,
}

impl<'a> LoadScope<'a> {
    /// Key of the entity being built.
    pub fn key(&self) -> &Key {
        self.key
    }

    /// A live reference through the loading session.
    pub fn make_ref<T: Entity>(&self, key: Key) -> Ref<T> {
        self.session.make_ref(key)
    }
}

#[cfg(test)]
mod tests {
    use arbor_store::InMemoryRemoteStore;
    use arbor_translate::{ClassMeta, FieldMeta, IdType, RegistryBuilder, TypeDesc};

    use super::*;

    #[derive(Debug)]
    struct Person {
        id: Option<i64>,
        name: String,
        friend: Option<Ref<Person>>,
    }

    impl Person {
        fn new(id: Option<i64>, name: &str) -> Self {
            Self {
                id,
                name: name.to_string(),
                friend: None,
            }
        }

        fn befriend(mut self, key: Key) -> Self {
            self.friend = Some(Ref::dead(key));
            self
        }
    }

    impl Entity for Person {
        const KIND: &'static str = "Person";

        fn to_object(&self) -> Object {
            Object::new("Person")
                .with("id", self.id)
                .with("name", self.name.as_str())
                .with("friend", self.friend.as_ref().map(|r| r.key().clone()))
        }

        fn from_object(object: Object, scope: &LoadScope<'_>) -> SessionResult<Self> {
            let name = object
                .get("name")
                .as_str()
                .ok_or_else(|| SessionError::entity("Person", "name is not set"))?;
            Ok(Self {
                id: object.get("id").as_i64(),
                name: name.to_string(),
                friend: object.get("friend").as_key().map(|k| scope.make_ref(k.clone())),
            })
        }
    }

    struct Robot;

    impl Entity for Robot {
        const KIND: &'static str = "Robot";

        fn to_object(&self) -> Object {
            Object::new("Robot")
        }

        fn from_object(_: Object, _: &LoadScope<'_>) -> SessionResult<Self> {
            Ok(Robot)
        }
    }

    fn registry() -> Arc<Registry> {
        let mut b = RegistryBuilder::new();
        b.register(
            ClassMeta::entity("Person", "id", IdType::Long)
                .indexed_by_default(true)
                .field(FieldMeta::new("name", TypeDesc::String))
                .field(FieldMeta::new("friend", TypeDesc::reference("Person"))),
        )
        .unwrap();
        Arc::new(b.build().unwrap())
    }

    fn setup_with(limits: Limits) -> (Arc<InMemoryRemoteStore>, Session) {
        let store = Arc::new(InMemoryRemoteStore::new());
        let session = Session::new(registry(), store.clone(), limits);
        (store, session)
    }

    fn setup() -> (Arc<InMemoryRemoteStore>, Session) {
        setup_with(Limits::default())
    }

    fn person_key(id: i64) -> Key {
        Key::root("Person", id).unwrap()
    }

    #[tokio::test]
    async fn repeated_reads_share_one_instance() {
        let (store, writer) = setup();
        let key = writer.save(Person::new(Some(1), "Ann")).await.unwrap();

        let session = Session::new(registry(), store.clone(), Limits::default());
        store.reset_counters();
        let a = session.load::<Person>(&key).await.unwrap().unwrap();
        let b = session.load::<Person>(&key).await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name, "Ann");
        assert_eq!(a.id, Some(1));
        assert_eq!(store.round_trips(), 1);
    }

    #[tokio::test]
    async fn absence_is_remembered() {
        let (store, session) = setup();
        assert!(session.load::<Person>(&person_key(9)).await.unwrap().is_none());
        assert!(session.load::<Person>(&person_key(9)).await.unwrap().is_none());
        assert_eq!(store.key_lookups(), 1);
        assert!(session.is_cached(&person_key(9)));
    }

    #[tokio::test]
    async fn save_allocates_ids() {
        let (store, session) = setup();
        let key = session.save(Person::new(None, "Ann")).await.unwrap();
        assert!(key.as_id().is_some());
        assert!(store.peek(&key).is_some());

        store.reset_counters();
        let ann = session.load::<Person>(&key).await.unwrap().unwrap();
        assert_eq!(ann.id, key.as_id());
        assert_eq!(store.round_trips(), 0);
    }

    #[tokio::test]
    async fn save_many_batches() {
        let (store, session) = setup();
        let keys = session
            .save_many(vec![
                Person::new(None, "a"),
                Person::new(Some(50), "b"),
                Person::new(None, "c"),
            ])
            .await
            .unwrap();
        assert_eq!(keys.len(), 3);
        assert_eq!(keys[1], person_key(50));
        assert_ne!(keys[0], keys[2]);
        // One allocation and one write.
        assert_eq!(store.round_trips(), 2);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn load_many_is_one_round_trip() {
        let (store, writer) = setup();
        writer
            .save_many(vec![Person::new(Some(1), "a"), Person::new(Some(2), "b")])
            .await
            .unwrap();

        let session = Session::new(registry(), store.clone(), Limits::default());
        session.load::<Person>(&person_key(1)).await.unwrap();
        store.reset_counters();

        let keys = [person_key(1), person_key(2), person_key(3), person_key(2)];
        let found = session.load_many::<Person>(&keys).await.unwrap();
        assert_eq!(found.len(), 4);
        assert_eq!(found[0].as_ref().unwrap().name, "a");
        assert!(found[2].is_none());
        assert!(Arc::ptr_eq(found[1].as_ref().unwrap(), found[3].as_ref().unwrap()));
        assert_eq!(store.round_trips(), 1);
        assert_eq!(store.key_lookups(), 2);
    }

    #[tokio::test]
    async fn live_refs_resolve_once_through_the_session() {
        let (store, writer) = setup();
        writer.save(Person::new(Some(2), "Bob")).await.unwrap();
        writer
            .save(Person::new(Some(1), "Ann").befriend(person_key(2)))
            .await
            .unwrap();

        let session = Session::new(registry(), store.clone(), Limits::default());
        store.reset_counters();
        let ann = session.load::<Person>(&person_key(1)).await.unwrap().unwrap();
        let friend = ann.friend.as_ref().unwrap();
        assert!(friend.is_live());
        assert_eq!(friend.key(), &person_key(2));
        assert!(!friend.is_resolved());
        assert_eq!(store.round_trips(), 1);

        let bob = friend.get().await.unwrap().unwrap();
        assert_eq!(bob.name, "Bob");
        friend.get().await.unwrap();
        let direct = session.load::<Person>(&person_key(2)).await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&bob, &direct));
        assert_eq!(store.round_trips(), 2);
    }

    #[tokio::test]
    async fn cycles_resolve_lazily() {
        let (store, writer) = setup();
        writer
            .save_many(vec![
                Person::new(Some(1), "Ann").befriend(person_key(2)),
                Person::new(Some(2), "Bob").befriend(person_key(1)),
            ])
            .await
            .unwrap();

        let session = Session::new(registry(), store, Limits::default());
        let ann = session.load::<Person>(&person_key(1)).await.unwrap().unwrap();
        let bob = ann.friend.as_ref().unwrap().require().await.unwrap();
        let back = bob.friend.as_ref().unwrap().require().await.unwrap();
        assert!(Arc::ptr_eq(&ann, &back));
    }

    #[tokio::test]
    async fn dangling_refs() {
        let (_, session) = setup();
        let missing: Ref<Person> = session.make_ref(person_key(5));
        assert!(missing.get().await.unwrap().is_none());
        assert!(matches!(
            missing.require().await,
            Err(SessionError::NotFound(_))
        ));

        let orphan: Ref<Person> = {
            let (_, short_lived) = setup();
            short_lived.make_ref(person_key(1))
        };
        assert!(matches!(orphan.get().await, Err(SessionError::Closed(_))));
    }

    #[tokio::test]
    async fn oversized_records_never_reach_the_store() {
        let (store, session) = setup_with(Limits {
            max_value_bytes: 4,
            ..Limits::default()
        });
        let err = session
            .save(Person::new(Some(1), "Annabel"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Limit(_)));
        assert_eq!(store.round_trips(), 0);
        assert!(!session.is_cached(&person_key(1)));
    }

    #[tokio::test]
    async fn delete_is_seen_as_absent() {
        let (store, session) = setup();
        let key = session.save(Person::new(Some(1), "Ann")).await.unwrap();
        session.delete(&key).await.unwrap();
        store.reset_counters();
        assert!(session.load::<Person>(&key).await.unwrap().is_none());
        assert_eq!(store.round_trips(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn clear_forces_refetch() {
        let (store, session) = setup();
        let key = session.save(Person::new(Some(1), "Ann")).await.unwrap();
        session.clear();
        assert!(!session.is_cached(&key));
        store.reset_counters();
        session.load::<Person>(&key).await.unwrap();
        assert_eq!(store.round_trips(), 1);
    }

    #[tokio::test]
    async fn kinds_are_checked() {
        let (_, session) = setup();
        assert!(matches!(
            session.load::<Robot>(&person_key(1)).await,
            Err(SessionError::KindMismatch { .. })
        ));
        assert!(matches!(
            session.save(Robot).await,
            Err(SessionError::Translate(_))
        ));
    }

    #[tokio::test]
    async fn key_of_uses_identity_fields() {
        let (_, session) = setup();
        assert_eq!(
            session.key_of(&Person::new(Some(3), "x")).unwrap(),
            Some(person_key(3))
        );
        assert_eq!(session.key_of(&Person::new(None, "x")).unwrap(), None);
    }
}
