use std::any::TypeId;
use std::fmt;

use uuid::Uuid;

use crate::error::{DiError, DiResult};

/// Identity of a resolvable value: a type, optionally qualified by a name or a group tag.
///
/// Keys carrying a group are multi-valued: any number of constructors may
/// contribute to them. All other keys are single-valued.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeKey {
    type_id: TypeId,
    type_name: &'static str,
    name: Option<String>,
    group: Option<String>,
}

impl TypeKey {
    /// Create a key for a type
    pub fn of<T: 'static + ?Sized>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            name: None,
            group: None,
        }
    }

    /// Create a named key for a type
    pub fn named<T: 'static + ?Sized>(name: impl Into<String>) -> Self {
        Self::of::<T>().with_name(name)
    }

    /// Create a grouped key for a type
    pub fn grouped<T: 'static + ?Sized>(group: impl Into<String>) -> Self {
        Self::of::<T>().in_group(group)
    }

    /// Create a key directly from a type id and its name
    pub fn by_ids(type_id: TypeId, type_name: &'static str) -> Self {
        Self {
            type_id,
            type_name,
            name: None,
            group: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Whether many providers may contribute to this key
    pub fn is_grouped(&self) -> bool {
        self.group.is_some()
    }

    /// Check that a key does not carry both a name and a group
    pub fn validate(&self) -> DiResult<()> {
        match (&self.name, &self.group) {
            (Some(name), Some(group)) => Err(DiError::invalid_argument(format!(
                "key for {} cannot be both named '{}' and grouped '{}'",
                self.type_name, name, group
            ))),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name)?;
        if let Some(name) = &self.name {
            write!(f, "[name=\"{}\"]", name)?;
        }
        if let Some(group) = &self.group {
            write!(f, "[group=\"{}\"]", group)?;
        }
        Ok(())
    }
}

/// Declared constructor parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub key: TypeKey,
    /// Optional parameters resolve to nothing when no provider exists
    pub optional: bool,
}

impl ParamSpec {
    pub fn required(key: TypeKey) -> Self {
        Self {
            key,
            optional: false,
        }
    }

    pub fn optional(key: TypeKey) -> Self {
        Self {
            key,
            optional: true,
        }
    }
}

/// Positional qualifier for a typed constructor parameter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamTag {
    pub name: Option<String>,
    pub group: Option<String>,
}

impl ParamTag {
    /// No qualifier: the parameter is looked up by type alone
    pub const NONE: ParamTag = ParamTag {
        name: None,
        group: None,
    };

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            group: None,
        }
    }

    pub fn group(group: impl Into<String>) -> Self {
        Self {
            name: None,
            group: Some(group.into()),
        }
    }

    /// Apply this tag to a bare type key
    pub fn qualify(&self, key: TypeKey) -> TypeKey {
        let key = match &self.name {
            Some(name) => key.with_name(name.clone()),
            None => key,
        };
        match &self.group {
            Some(group) => key.in_group(group.clone()),
            None => key,
        }
    }
}

/// Identity of a registered constructor.
///
/// Typed constructors are identified by the Rust type of the function item or
/// closure, so `remove(&new_service)` finds what `provide(new_service)` registered.
/// Raw providers and supplied values get a fresh random identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstructorId {
    Typed(TypeId),
    Dynamic(Uuid),
}

impl ConstructorId {
    pub fn of<F: 'static>() -> Self {
        ConstructorId::Typed(TypeId::of::<F>())
    }

    pub fn unique() -> Self {
        ConstructorId::Dynamic(Uuid::new_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Database;

    #[test]
    fn test_type_key_equality() {
        let plain = TypeKey::of::<Database>();
        let named = TypeKey::named::<Database>("primary");
        let grouped = TypeKey::grouped::<Database>("replicas");

        assert_eq!(plain, TypeKey::of::<Database>());
        assert_ne!(plain, named);
        assert_ne!(named, grouped);
        assert_eq!(named, TypeKey::named::<Database>("primary"));

        assert!(grouped.is_grouped());
        assert!(!named.is_grouped());
        assert_eq!(named.name(), Some("primary"));
    }

    #[test]
    fn test_type_name_capture() {
        let key = TypeKey::of::<Database>();
        assert!(key.type_name().contains("Database"));
        assert_eq!(TypeKey::of::<String>().type_name(), "alloc::string::String");
    }

    #[test]
    fn test_display_shows_qualifiers() {
        assert_eq!(TypeKey::named::<u8>("port").to_string(), "u8[name=\"port\"]");
        assert_eq!(TypeKey::grouped::<u8>("ports").to_string(), "u8[group=\"ports\"]");
    }

    #[test]
    fn test_named_and_grouped_is_rejected() {
        let key = TypeKey::named::<u8>("a").in_group("b");
        assert!(key.validate().unwrap_err().is_invalid_argument());
        assert!(TypeKey::grouped::<u8>("b").validate().is_ok());
    }

    #[test]
    fn test_param_tag_qualifies_keys() {
        let key = ParamTag::named("cache").qualify(TypeKey::of::<u8>());
        assert_eq!(key, TypeKey::named::<u8>("cache"));

        let key = ParamTag::NONE.qualify(TypeKey::of::<u8>());
        assert_eq!(key, TypeKey::of::<u8>());
    }

    #[test]
    fn test_constructor_identity_follows_function_type() {
        fn first() -> u8 {
            1
        }
        fn second() -> u8 {
            2
        }

        fn id_of<F: 'static>(_: &F) -> ConstructorId {
            ConstructorId::of::<F>()
        }

        assert_eq!(id_of(&first), id_of(&first));
        assert_ne!(id_of(&first), id_of(&second));
        assert_ne!(ConstructorId::unique(), ConstructorId::unique());
    }
}
