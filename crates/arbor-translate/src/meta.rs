//! The metadata table: declared types and per-field policies.
//!
//! Metadata is supplied up front for every class (entity or embedded) and
//! treated as read-only once the registry is built. Translators are derived
//! from it once; the save/load path never inspects types at runtime.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use arbor_types::{Object, Value};

use crate::condition::{Always, Condition};

// ---------------------------------------------------------------------------
// TypeDesc
// ---------------------------------------------------------------------------

/// Width of a declared integer type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntKind {
    /// Inclusive range representable both by this type and by the store's
    /// 64-bit signed integers.
    pub fn range(self) -> (i64, i64) {
        match self {
            IntKind::I8 => (i8::MIN as i64, i8::MAX as i64),
            IntKind::I16 => (i16::MIN as i64, i16::MAX as i64),
            IntKind::I32 => (i32::MIN as i64, i32::MAX as i64),
            IntKind::I64 => (i64::MIN, i64::MAX),
            IntKind::U8 => (0, u8::MAX as i64),
            IntKind::U16 => (0, u16::MAX as i64),
            IntKind::U32 => (0, u32::MAX as i64),
            IntKind::U64 => (0, i64::MAX),
        }
    }

    pub fn contains(self, n: i64) -> bool {
        let (min, max) = self.range();
        (min..=max).contains(&n)
    }
}

/// Width of a declared floating-point type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FloatKind {
    F32,
    F64,
}

/// An enumeration saved by constant name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnumDesc {
    pub name: String,
    pub variants: Vec<String>,
}

impl EnumDesc {
    pub fn contains(&self, variant: &str) -> bool {
        self.variants.iter().any(|v| v == variant)
    }
}

/// The declared type of a field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    Bool,
    Int(IntKind),
    Float(FloatKind),
    String,
    Bytes,
    Timestamp,
    Key,
    /// A reference to an entity of the named kind, stored as its key.
    Ref(String),
    Enum(EnumDesc),
    /// An embedded object of the named class.
    Embedded(String),
    /// A homogeneous collection.
    List(Box<TypeDesc>),
    /// An associative map from key type to value type.
    Map(Box<TypeDesc>, Box<TypeDesc>),
    /// An application type handled by a user-registered factory.
    Custom(String),
}

impl TypeDesc {
    pub fn list(element: TypeDesc) -> Self {
        TypeDesc::List(Box::new(element))
    }

    pub fn map(key: TypeDesc, value: TypeDesc) -> Self {
        TypeDesc::Map(Box::new(key), Box::new(value))
    }

    pub fn enumeration<I, S>(name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TypeDesc::Enum(EnumDesc {
            name: name.into(),
            variants: variants.into_iter().map(Into::into).collect(),
        })
    }

    pub fn embedded(class: impl Into<String>) -> Self {
        TypeDesc::Embedded(class.into())
    }

    pub fn reference(kind: impl Into<String>) -> Self {
        TypeDesc::Ref(kind.into())
    }

    /// `true` for types whose values save to a single scalar.
    pub fn is_scalar(&self) -> bool {
        !matches!(
            self,
            TypeDesc::Embedded(_) | TypeDesc::List(_) | TypeDesc::Map(..)
        )
    }

    /// The value a default-constructed field of this type holds.
    pub fn natural_default(&self) -> Value {
        match self {
            TypeDesc::Bool => Value::Bool(false),
            TypeDesc::Int(_) => Value::Int(0),
            TypeDesc::Float(_) => Value::Float(0.0),
            _ => Value::Null,
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Bool => f.write_str("bool"),
            TypeDesc::Int(k) => write!(f, "{}", format!("{k:?}").to_lowercase()),
            TypeDesc::Float(k) => write!(f, "{}", format!("{k:?}").to_lowercase()),
            TypeDesc::String => f.write_str("string"),
            TypeDesc::Bytes => f.write_str("bytes"),
            TypeDesc::Timestamp => f.write_str("timestamp"),
            TypeDesc::Key => f.write_str("key"),
            TypeDesc::Ref(kind) => write!(f, "ref<{kind}>"),
            TypeDesc::Enum(e) => write!(f, "enum {}", e.name),
            TypeDesc::Embedded(class) => write!(f, "embedded {class}"),
            TypeDesc::List(elem) => write!(f, "list<{elem}>"),
            TypeDesc::Map(k, v) => write!(f, "map<{k}, {v}>"),
            TypeDesc::Custom(name) => write!(f, "custom {name}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Annotations
// ---------------------------------------------------------------------------

/// Opaque name/value tags attached to a field, visible to factories.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Annotations(BTreeMap<String, String>);

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// Annotation naming a registered stringifier for a map field's keys.
pub const STRINGIFIER_ANNOTATION: &str = "stringifier";

// ---------------------------------------------------------------------------
// FieldMeta
// ---------------------------------------------------------------------------

/// Static index policy of a field, before conditions apply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IndexPolicy {
    /// Use the owner's index flag.
    #[default]
    Inherit,
    Index,
    Unindex,
}

/// What happens when a stored value cannot be converted to the field type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadPolicy {
    /// Abort the whole record load.
    #[default]
    Strict,
    /// Log, record the error on the load context, and fall back to the
    /// field's default.
    Lenient,
}

/// Metadata for one field of a class.
#[derive(Clone, Debug)]
pub struct FieldMeta {
    pub name: String,
    pub ty: TypeDesc,
    pub annotations: Annotations,
    pub index: IndexPolicy,
    /// Index the field when this condition holds, unindex it otherwise.
    pub index_if: Option<Arc<dyn Condition>>,
    /// Unindex the field when this condition holds, index it otherwise.
    pub unindex_if: Option<Arc<dyn Condition>>,
    /// Omit the field from the saved tree when this condition holds.
    pub ignore_save_if: Option<Arc<dyn Condition>>,
    /// Never read the field back from the store.
    pub ignore_load: bool,
    pub load_policy: LoadPolicy,
}

impl FieldMeta {
    pub fn new(name: impl Into<String>, ty: TypeDesc) -> Self {
        Self {
            name: name.into(),
            ty,
            annotations: Annotations::default(),
            index: IndexPolicy::Inherit,
            index_if: None,
            unindex_if: None,
            ignore_save_if: None,
            ignore_load: false,
            load_policy: LoadPolicy::Strict,
        }
    }

    pub fn indexed(mut self) -> Self {
        self.index = IndexPolicy::Index;
        self
    }

    pub fn unindexed(mut self) -> Self {
        self.index = IndexPolicy::Unindex;
        self
    }

    pub fn index_if(mut self, condition: impl Condition + 'static) -> Self {
        self.index_if = Some(Arc::new(condition));
        self
    }

    pub fn unindex_if(mut self, condition: impl Condition + 'static) -> Self {
        self.unindex_if = Some(Arc::new(condition));
        self
    }

    pub fn ignore_save_if(mut self, condition: impl Condition + 'static) -> Self {
        self.ignore_save_if = Some(Arc::new(condition));
        self
    }

    /// Never save the field.
    pub fn ignore_save(self) -> Self {
        self.ignore_save_if(Always)
    }

    pub fn ignore_load(mut self) -> Self {
        self.ignore_load = true;
        self
    }

    pub fn lenient(mut self) -> Self {
        self.load_policy = LoadPolicy::Lenient;
        self
    }

    pub fn annotate(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations = self.annotations.with(name, value);
        self
    }
}

// ---------------------------------------------------------------------------
// ClassMeta
// ---------------------------------------------------------------------------

/// How an entity's id field is typed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdType {
    /// Numeric id (`i64`), allocated by the store when absent.
    Long,
    /// String name, always supplied by the application.
    Name,
}

/// The fields that make up an entity's key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityIdentity {
    pub id_field: String,
    pub id_type: IdType,
    pub parent_field: Option<String>,
}

/// Metadata for a registered class.
///
/// A class with an [`EntityIdentity`] is an entity whose name is its kind;
/// any other class can only be embedded.
#[derive(Clone, Debug)]
pub struct ClassMeta {
    pub name: String,
    pub identity: Option<EntityIdentity>,
    pub fields: Vec<FieldMeta>,
    pub indexed_by_default: bool,
    /// A default-constructed instance, used for default-value comparisons
    /// and to fill fields that are absent on load.
    pub defaults: Option<Object>,
}

impl ClassMeta {
    pub fn entity(name: impl Into<String>, id_field: impl Into<String>, id_type: IdType) -> Self {
        Self {
            name: name.into(),
            identity: Some(EntityIdentity {
                id_field: id_field.into(),
                id_type,
                parent_field: None,
            }),
            fields: Vec::new(),
            indexed_by_default: false,
            defaults: None,
        }
    }

    pub fn embedded(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity: None,
            fields: Vec::new(),
            indexed_by_default: false,
            defaults: None,
        }
    }

    /// Name the field holding the parent key. Only meaningful for entities.
    pub fn parent(mut self, field: impl Into<String>) -> Self {
        if let Some(identity) = self.identity.as_mut() {
            identity.parent_field = Some(field.into());
        }
        self
    }

    pub fn field(mut self, field: FieldMeta) -> Self {
        self.fields.push(field);
        self
    }

    pub fn indexed_by_default(mut self, indexed: bool) -> Self {
        self.indexed_by_default = indexed;
        self
    }

    pub fn defaults(mut self, defaults: Object) -> Self {
        self.defaults = Some(defaults);
        self
    }

    pub fn is_entity(&self) -> bool {
        self.identity.is_some()
    }

    pub fn field_meta(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The value a default-constructed instance holds in `field`.
    pub fn default_of(&self, field: &str) -> Option<&Value> {
        self.defaults.as_ref().and_then(|d| d.get_present(field))
    }
}
