//! Conversion of map keys to and from property-tree child names.

use std::fmt;
use std::sync::Arc;

use arbor_types::{Key, Path, Value};

use crate::context::CreateContext;
use crate::error::{ConfigError, ConfigResult, TranslateError, TranslateResult};
use crate::meta::{Annotations, EnumDesc, IntKind, TypeDesc, STRINGIFIER_ANNOTATION};

/// Converts a map key to a child name and back.
pub trait Stringifier: Send + Sync + fmt::Debug {
    fn to_name(&self, key: &Value, path: &Path) -> TranslateResult<String>;
    fn from_name(&self, name: &str, path: &Path) -> TranslateResult<Value>;
}

#[derive(Debug)]
pub struct StringStringifier;

impl Stringifier for StringStringifier {
    fn to_name(&self, key: &Value, path: &Path) -> TranslateResult<String> {
        match key {
            Value::String(s) => Ok(s.clone()),
            other => Err(TranslateError::conversion(path, "string key", other.type_name())),
        }
    }

    fn from_name(&self, name: &str, _path: &Path) -> TranslateResult<Value> {
        Ok(Value::String(name.to_string()))
    }
}

/// Decimal form of an integer key.
#[derive(Debug)]
pub struct IntStringifier(pub IntKind);

impl Stringifier for IntStringifier {
    fn to_name(&self, key: &Value, path: &Path) -> TranslateResult<String> {
        match key {
            Value::Int(n) => Ok(n.to_string()),
            other => Err(TranslateError::conversion(path, "integer key", other.type_name())),
        }
    }

    fn from_name(&self, name: &str, path: &Path) -> TranslateResult<Value> {
        let n: i64 = name
            .parse()
            .map_err(|_| TranslateError::conversion(path, "integer key", name))?;
        if !self.0.contains(n) {
            return Err(TranslateError::OutOfRange {
                path: path.clone(),
                value: name.to_string(),
                target: TypeDesc::Int(self.0).to_string(),
            });
        }
        Ok(Value::Int(n))
    }
}

/// Enum keys by constant name.
#[derive(Debug)]
pub struct EnumStringifier(pub EnumDesc);

impl EnumStringifier {
    fn check(&self, name: &str, path: &Path) -> TranslateResult<()> {
        if self.0.contains(name) {
            Ok(())
        } else {
            Err(TranslateError::UnknownVariant {
                path: path.clone(),
                name: name.to_string(),
                enum_name: self.0.name.clone(),
            })
        }
    }
}

impl Stringifier for EnumStringifier {
    fn to_name(&self, key: &Value, path: &Path) -> TranslateResult<String> {
        match key {
            Value::Enum(name) | Value::String(name) => {
                self.check(name, path)?;
                Ok(name.clone())
            }
            other => Err(TranslateError::conversion(path, "enum key", other.type_name())),
        }
    }

    fn from_name(&self, name: &str, path: &Path) -> TranslateResult<Value> {
        self.check(name, path)?;
        Ok(Value::Enum(name.to_string()))
    }
}

/// Keys by their encoded string form.
#[derive(Debug)]
pub struct KeyStringifier;

impl Stringifier for KeyStringifier {
    fn to_name(&self, key: &Value, path: &Path) -> TranslateResult<String> {
        match key {
            Value::Key(k) => Ok(k.to_encoded()),
            other => Err(TranslateError::conversion(path, "key", other.type_name())),
        }
    }

    fn from_name(&self, name: &str, path: &Path) -> TranslateResult<Value> {
        Key::from_encoded(name)
            .map(Value::Key)
            .map_err(|_| TranslateError::conversion(path, "encoded key", name))
    }
}

/// Choose the stringifier for map keys of type `key_ty`.
///
/// A `stringifier` annotation names a registered stringifier and takes
/// precedence over the built-ins.
pub(crate) fn select(
    key_ty: &TypeDesc,
    annotations: &Annotations,
    ctx: &CreateContext<'_>,
    path: &Path,
) -> ConfigResult<Arc<dyn Stringifier>> {
    if let Some(name) = annotations.get(STRINGIFIER_ANNOTATION) {
        return ctx.stringifier(name).ok_or_else(|| ConfigError::NoStringifier {
            ty: format!("{key_ty} (stringifier '{name}' is not registered)"),
            path: path.clone(),
        });
    }
    Ok(match key_ty {
        TypeDesc::String => Arc::new(StringStringifier),
        TypeDesc::Int(kind) => Arc::new(IntStringifier(*kind)),
        TypeDesc::Enum(desc) => Arc::new(EnumStringifier(desc.clone())),
        TypeDesc::Key | TypeDesc::Ref(_) => Arc::new(KeyStringifier),
        other => {
            return Err(ConfigError::NoStringifier {
                ty: other.to_string(),
                path: path.clone(),
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_keys() {
        let s = IntStringifier(IntKind::U8);
        let path = Path::from_fields(["scores"]);
        assert_eq!(s.to_name(&Value::Int(7), &path).unwrap(), "7");
        assert_eq!(s.from_name("7", &path).unwrap(), Value::Int(7));
        assert!(matches!(
            s.from_name("300", &path),
            Err(TranslateError::OutOfRange { .. })
        ));
        assert!(s.from_name("seven", &path).unwrap_err().is_conversion());
    }

    #[test]
    fn enum_keys() {
        let s = EnumStringifier(EnumDesc {
            name: "Day".into(),
            variants: vec!["Mon".into(), "Tue".into()],
        });
        let path = Path::root();
        assert_eq!(s.to_name(&Value::Enum("Mon".into()), &path).unwrap(), "Mon");
        assert!(s.to_name(&Value::Enum("Sun".into()), &path).is_err());
        assert_eq!(s.from_name("Tue", &path).unwrap(), Value::Enum("Tue".into()));
    }

    #[test]
    fn key_keys() {
        let key = Key::root("Person", 9).unwrap().child("Pet", "rex").unwrap();
        let name = KeyStringifier.to_name(&Value::Key(key.clone()), &Path::root()).unwrap();
        assert_eq!(
            KeyStringifier.from_name(&name, &Path::root()).unwrap(),
            Value::Key(key)
        );
        assert!(KeyStringifier.from_name("zz", &Path::root()).is_err());
    }

    #[test]
    fn string_keys_reject_other_values() {
        assert!(StringStringifier
            .to_name(&Value::Int(1), &Path::root())
            .is_err());
    }
}
