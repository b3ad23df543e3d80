//! Translators for single-valued types: primitives, timestamps, keys, refs,
//! and enumerations.

use std::sync::Arc;

use arbor_tree::{MapNode, Node, PropertyValue};
use arbor_types::{Path, Value};

use crate::context::{CreateContext, LoadContext, SaveContext};
use crate::error::{ConfigResult, TranslateError, TranslateResult};
use crate::meta::{Annotations, EnumDesc, FloatKind, IntKind, TypeDesc};
use crate::translator::{Translator, TranslatorFactory};

/// The scalar stored at a node, if any.
///
/// An empty map-node reads as no value. A list, or a map-node that only has
/// children, is the wrong shape for a scalar.
pub(crate) fn stored_scalar<'n>(
    node: &'n Node,
    path: &Path,
) -> TranslateResult<Option<&'n PropertyValue>> {
    match node {
        Node::List(_) => Err(TranslateError::conversion(path, "scalar", "list")),
        Node::Map(m) => match m.value() {
            Some(v) => Ok(Some(v)),
            None if m.has_children() => Err(TranslateError::conversion(path, "scalar", "map")),
            None => Ok(None),
        },
    }
}

fn out_of_range(path: &Path, value: impl ToString, target: impl ToString) -> TranslateError {
    TranslateError::OutOfRange {
        path: path.clone(),
        value: value.to_string(),
        target: target.to_string(),
    }
}

fn check_int(n: i64, kind: IntKind, path: &Path) -> TranslateResult<i64> {
    if kind.contains(n) {
        Ok(n)
    } else {
        Err(out_of_range(path, n, TypeDesc::Int(kind)))
    }
}

fn check_float(f: f64, kind: FloatKind, path: &Path) -> TranslateResult<f64> {
    if kind == FloatKind::F32 && f.is_finite() && f.abs() > f32::MAX as f64 {
        return Err(out_of_range(path, f, TypeDesc::Float(kind)));
    }
    Ok(f)
}

// ---------------------------------------------------------------------------
// ScalarTranslator
// ---------------------------------------------------------------------------

/// Saves a value as the scalar of a leaf map-node.
#[derive(Debug)]
pub struct ScalarTranslator {
    ty: TypeDesc,
}

impl ScalarTranslator {
    /// `None` when `ty` is not a built-in scalar type.
    pub fn new(ty: &TypeDesc) -> Option<Self> {
        match ty {
            TypeDesc::Bool
            | TypeDesc::Int(_)
            | TypeDesc::Float(_)
            | TypeDesc::String
            | TypeDesc::Bytes
            | TypeDesc::Timestamp
            | TypeDesc::Key
            | TypeDesc::Ref(_) => Some(Self { ty: ty.clone() }),
            _ => None,
        }
    }

    fn to_property(&self, value: &Value, path: &Path) -> TranslateResult<PropertyValue> {
        let mismatch = || TranslateError::conversion(path, self.ty.to_string(), value.type_name());
        Ok(match (&self.ty, value) {
            (_, Value::Null) => PropertyValue::Null,
            (TypeDesc::Bool, Value::Bool(b)) => PropertyValue::Bool(*b),
            (TypeDesc::Int(kind), Value::Int(n)) => PropertyValue::Int(check_int(*n, *kind, path)?),
            (TypeDesc::Float(kind), Value::Float(f)) => {
                PropertyValue::Float(check_float(*f, *kind, path)?)
            }
            (TypeDesc::Float(kind), Value::Int(n)) => {
                PropertyValue::Float(check_float(*n as f64, *kind, path)?)
            }
            (TypeDesc::String, Value::String(s)) => PropertyValue::String(s.clone()),
            (TypeDesc::Bytes, Value::Bytes(b)) => PropertyValue::Bytes(b.clone()),
            (TypeDesc::Timestamp, Value::Timestamp(t)) => PropertyValue::Timestamp(*t),
            (TypeDesc::Key, Value::Key(k)) => PropertyValue::Key(k.clone()),
            (TypeDesc::Ref(kind), Value::Key(k)) if k.kind() == kind => PropertyValue::Key(k.clone()),
            (TypeDesc::Ref(kind), Value::Key(k)) => {
                return Err(TranslateError::conversion(
                    path,
                    format!("key of kind {kind}"),
                    format!("key of kind {}", k.kind()),
                ))
            }
            _ => return Err(mismatch()),
        })
    }

    fn from_property(&self, stored: &PropertyValue, path: &Path) -> TranslateResult<Value> {
        let mismatch = || TranslateError::conversion(path, self.ty.to_string(), stored.type_name());
        Ok(match (&self.ty, stored) {
            (_, PropertyValue::Null) => Value::Null,
            (TypeDesc::Bool, PropertyValue::Bool(b)) => Value::Bool(*b),
            (TypeDesc::Int(kind), PropertyValue::Int(n)) => Value::Int(check_int(*n, *kind, path)?),
            (TypeDesc::Float(kind), PropertyValue::Float(f)) => {
                Value::Float(check_float(*f, *kind, path)?)
            }
            (TypeDesc::Float(kind), PropertyValue::Int(n)) => {
                Value::Float(check_float(*n as f64, *kind, path)?)
            }
            (TypeDesc::String, PropertyValue::String(s)) => Value::String(s.clone()),
            (TypeDesc::Bytes, PropertyValue::Bytes(b)) => Value::Bytes(b.clone()),
            (TypeDesc::Timestamp, PropertyValue::Timestamp(t)) => Value::Timestamp(*t),
            (TypeDesc::Key, PropertyValue::Key(k)) => Value::Key(k.clone()),
            (TypeDesc::Ref(kind), PropertyValue::Key(k)) if k.kind() == kind => Value::Key(k.clone()),
            _ => return Err(mismatch()),
        })
    }
}

impl Translator for ScalarTranslator {
    fn save(
        &self,
        value: &Value,
        index: bool,
        _ctx: &mut SaveContext,
        path: &Path,
    ) -> TranslateResult<Node> {
        Ok(MapNode::scalar(self.to_property(value, path)?, index).into())
    }

    fn load(&self, node: &Node, _ctx: &mut LoadContext, path: &Path) -> TranslateResult<Value> {
        match stored_scalar(node, path)? {
            Some(stored) => self.from_property(stored, path),
            None => Ok(Value::Null),
        }
    }
}

pub struct ScalarFactory;

impl TranslatorFactory for ScalarFactory {
    fn name(&self) -> &str {
        "scalar"
    }

    fn create(
        &self,
        ty: &TypeDesc,
        _annotations: &Annotations,
        _ctx: &mut CreateContext<'_>,
        _path: &Path,
    ) -> ConfigResult<Option<Arc<dyn Translator>>> {
        Ok(ScalarTranslator::new(ty).map(|t| Arc::new(t) as Arc<dyn Translator>))
    }
}

// ---------------------------------------------------------------------------
// EnumTranslator
// ---------------------------------------------------------------------------

/// Saves an enum constant by name.
#[derive(Debug)]
pub struct EnumTranslator {
    desc: EnumDesc,
}

impl EnumTranslator {
    pub fn new(desc: EnumDesc) -> Self {
        Self { desc }
    }

    fn check(&self, name: &str, path: &Path) -> TranslateResult<()> {
        if self.desc.contains(name) {
            Ok(())
        } else {
            Err(TranslateError::UnknownVariant {
                path: path.clone(),
                name: name.to_string(),
                enum_name: self.desc.name.clone(),
            })
        }
    }
}

impl Translator for EnumTranslator {
    fn save(
        &self,
        value: &Value,
        index: bool,
        _ctx: &mut SaveContext,
        path: &Path,
    ) -> TranslateResult<Node> {
        let stored = match value {
            Value::Null => PropertyValue::Null,
            Value::Enum(name) | Value::String(name) => {
                self.check(name, path)?;
                PropertyValue::String(name.clone())
            }
            other => {
                return Err(TranslateError::conversion(
                    path,
                    format!("enum {}", self.desc.name),
                    other.type_name(),
                ))
            }
        };
        Ok(MapNode::scalar(stored, index).into())
    }

    fn load(&self, node: &Node, _ctx: &mut LoadContext, path: &Path) -> TranslateResult<Value> {
        match stored_scalar(node, path)? {
            None | Some(PropertyValue::Null) => Ok(Value::Null),
            Some(PropertyValue::String(name)) => {
                self.check(name, path)?;
                Ok(Value::Enum(name.clone()))
            }
            Some(other) => Err(TranslateError::conversion(path, "string", other.type_name())),
        }
    }
}

pub struct EnumFactory;

impl TranslatorFactory for EnumFactory {
    fn name(&self) -> &str {
        "enum"
    }

    fn create(
        &self,
        ty: &TypeDesc,
        _annotations: &Annotations,
        _ctx: &mut CreateContext<'_>,
        _path: &Path,
    ) -> ConfigResult<Option<Arc<dyn Translator>>> {
        Ok(match ty {
            TypeDesc::Enum(desc) => Some(Arc::new(EnumTranslator::new(desc.clone()))),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use arbor_types::Key;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    use super::*;

    fn scalar(ty: TypeDesc) -> ScalarTranslator {
        ScalarTranslator::new(&ty).unwrap()
    }

    fn roundtrip(t: &dyn Translator, value: &Value) -> Value {
        let path = Path::from_fields(["f"]);
        let node = t.save(value, true, &mut SaveContext::new(), &path).unwrap();
        t.load(&node, &mut LoadContext::new(), &path).unwrap()
    }

    #[test]
    fn boundary_values_roundtrip() {
        let cases = vec![
            (TypeDesc::Bool, Value::Bool(false)),
            (TypeDesc::Int(IntKind::I64), Value::Int(i64::MIN)),
            (TypeDesc::Int(IntKind::I64), Value::Int(i64::MAX)),
            (TypeDesc::Int(IntKind::I8), Value::Int(-128)),
            (TypeDesc::Int(IntKind::U32), Value::Int(u32::MAX as i64)),
            (TypeDesc::Int(IntKind::I32), Value::Int(0)),
            (TypeDesc::Float(FloatKind::F64), Value::Float(f64::MAX)),
            (TypeDesc::Float(FloatKind::F64), Value::Float(0.0)),
            (TypeDesc::String, Value::from("")),
            (TypeDesc::Bytes, Value::Bytes(vec![])),
            (TypeDesc::Bytes, Value::Bytes(vec![0, 255])),
            (
                TypeDesc::Timestamp,
                Value::Timestamp(Utc.timestamp_opt(0, 0).unwrap()),
            ),
            (TypeDesc::Key, Value::Key(Key::root("Person", 1).unwrap())),
            (TypeDesc::String, Value::Null),
        ];
        for (ty, value) in cases {
            assert_eq!(roundtrip(&scalar(ty.clone()), &value), value, "type {ty}");
        }
    }

    #[test]
    fn index_flag_is_carried() {
        let t = scalar(TypeDesc::String);
        let node = t
            .save(&Value::from("a"), false, &mut SaveContext::new(), &Path::root())
            .unwrap();
        assert!(!node.as_map().unwrap().is_indexed());
    }

    #[test]
    fn out_of_range_reports_path() {
        let t = scalar(TypeDesc::Int(IntKind::U8));
        let path = Path::from_fields(["stats", "level"]);
        let node: Node = MapNode::scalar(PropertyValue::Int(300), false).into();
        let err = t.load(&node, &mut LoadContext::new(), &path).unwrap_err();
        assert!(matches!(err, TranslateError::OutOfRange { .. }));
        assert_eq!(err.path(), Some(&path));
        assert!(err.to_string().contains("stats.level"));

        let err = t
            .save(&Value::Int(-1), false, &mut SaveContext::new(), &path)
            .unwrap_err();
        assert!(matches!(err, TranslateError::OutOfRange { .. }));
    }

    #[test]
    fn float_widths() {
        let t = scalar(TypeDesc::Float(FloatKind::F32));
        let err = t
            .save(&Value::Float(1e300), false, &mut SaveContext::new(), &Path::root())
            .unwrap_err();
        assert!(matches!(err, TranslateError::OutOfRange { .. }));
        assert_eq!(roundtrip(&t, &Value::Int(3)), Value::Float(3.0));
    }

    #[test]
    fn wrong_shape_is_conversion_error() {
        let t = scalar(TypeDesc::Bool);
        let node: Node = MapNode::scalar(PropertyValue::from("yes"), false).into();
        let err = t.load(&node, &mut LoadContext::new(), &Path::root()).unwrap_err();
        assert!(err.is_conversion());

        let list: Node = arbor_tree::ListNode::new().into();
        assert!(t.load(&list, &mut LoadContext::new(), &Path::root()).is_err());
    }

    #[test]
    fn ref_checks_kind() {
        let t = scalar(TypeDesc::reference("Person"));
        let person = Value::Key(Key::root("Person", 5).unwrap());
        assert_eq!(roundtrip(&t, &person), person);
        let pet = Value::Key(Key::root("Pet", 5).unwrap());
        assert!(t
            .save(&pet, false, &mut SaveContext::new(), &Path::root())
            .is_err());
    }

    #[test]
    fn empty_node_loads_as_null() {
        let t = scalar(TypeDesc::String);
        let node: Node = MapNode::new().into();
        assert_eq!(
            t.load(&node, &mut LoadContext::new(), &Path::root()).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn enums_by_name() {
        let desc = EnumDesc {
            name: "Color".into(),
            variants: vec!["Red".into(), "Green".into()],
        };
        let t = EnumTranslator::new(desc);
        assert_eq!(roundtrip(&t, &Value::Enum("Red".into())), Value::Enum("Red".into()));
        assert_eq!(roundtrip(&t, &Value::Null), Value::Null);

        let path = Path::from_fields(["color"]);
        let node: Node = MapNode::scalar(PropertyValue::from("Blue"), true).into();
        let err = t.load(&node, &mut LoadContext::new(), &path).unwrap_err();
        assert!(
            matches!(err, TranslateError::UnknownVariant { ref name, ref enum_name, .. } if name == "Blue" && enum_name == "Color")
        );
        assert_eq!(err.path(), Some(&path));
    }

    proptest! {
        #[test]
        fn i32_roundtrip(n in any::<i32>()) {
            let t = scalar(TypeDesc::Int(IntKind::I32));
            prop_assert_eq!(roundtrip(&t, &Value::Int(n as i64)), Value::Int(n as i64));
        }

        #[test]
        fn u16_rejects_outside_range(n in any::<i64>()) {
            let t = scalar(TypeDesc::Int(IntKind::U16));
            let result = t.save(&Value::Int(n), false, &mut SaveContext::new(), &Path::root());
            prop_assert_eq!(result.is_ok(), (0..=u16::MAX as i64).contains(&n));
        }

        #[test]
        fn string_roundtrip(s in ".*") {
            let t = scalar(TypeDesc::String);
            prop_assert_eq!(roundtrip(&t, &Value::String(s.clone())), Value::String(s));
        }

        #[test]
        fn f64_roundtrip(f in proptest::num::f64::NORMAL | proptest::num::f64::ZERO) {
            let t = scalar(TypeDesc::Float(FloatKind::F64));
            prop_assert_eq!(roundtrip(&t, &Value::Float(f)), Value::Float(f));
        }
    }
}
