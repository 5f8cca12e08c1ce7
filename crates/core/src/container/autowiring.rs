//! Typed constructor support.
//!
//! Plain Rust functions and closures are turned into providers by reading
//! their parameter types. Each parameter type knows the key it asks for and
//! how to pull its value back out of the erased resolution results.

use std::ops::Deref;
use std::sync::Arc;

use crate::container::descriptor::{ParamSpec, ParamTag, TypeKey};
use crate::container::registry::Resolved;
use crate::error::{BoxError, DiError, DiResult};

/// A type usable as a constructor parameter
pub trait Param: Sized + 'static {
    /// The parameter declaration for this type under a positional tag
    fn spec(tag: &ParamTag) -> DiResult<ParamSpec>;

    /// Recover the typed value from a resolved slot
    fn extract(key: &TypeKey, value: Option<&Resolved>) -> DiResult<Self>;
}

/// Required dependency
impl<T: Send + Sync + 'static> Param for Arc<T> {
    fn spec(tag: &ParamTag) -> DiResult<ParamSpec> {
        reject_group_tag::<T>(tag)?;
        Ok(ParamSpec::required(tag.qualify(TypeKey::of::<T>())))
    }

    fn extract(key: &TypeKey, value: Option<&Resolved>) -> DiResult<Self> {
        value
            .ok_or_else(|| DiError::missing(key.clone()))?
            .downcast::<T>(key)
    }
}

/// Optional dependency, `None` when nothing in the scope chain provides it
impl<T: Send + Sync + 'static> Param for Option<Arc<T>> {
    fn spec(tag: &ParamTag) -> DiResult<ParamSpec> {
        reject_group_tag::<T>(tag)?;
        Ok(ParamSpec::optional(tag.qualify(TypeKey::of::<T>())))
    }

    fn extract(key: &TypeKey, value: Option<&Resolved>) -> DiResult<Self> {
        value.map(|value| value.downcast::<T>(key)).transpose()
    }
}

/// Every value contributed to a grouped key, in registration order
#[derive(Debug, Clone)]
pub struct Group<T>(Vec<Arc<T>>);

impl<T> Group<T> {
    pub fn into_inner(self) -> Vec<Arc<T>> {
        self.0
    }
}

impl<T> Deref for Group<T> {
    type Target = [Arc<T>];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> IntoIterator for Group<T> {
    type Item = Arc<T>;
    type IntoIter = std::vec::IntoIter<Arc<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<T: Send + Sync + 'static> Param for Group<T> {
    fn spec(tag: &ParamTag) -> DiResult<ParamSpec> {
        match (&tag.name, &tag.group) {
            (None, Some(group)) => Ok(ParamSpec::required(TypeKey::grouped::<T>(group.clone()))),
            _ => Err(DiError::invalid_argument(format!(
                "Group<{}> parameter needs a group tag and no name",
                std::any::type_name::<T>()
            ))),
        }
    }

    fn extract(key: &TypeKey, value: Option<&Resolved>) -> DiResult<Self> {
        match value {
            Some(value) => value.downcast_all::<T>(key).map(Group),
            None => Ok(Group(Vec::new())),
        }
    }
}

fn reject_group_tag<T>(tag: &ParamTag) -> DiResult<()> {
    match &tag.group {
        Some(group) => Err(DiError::invalid_argument(format!(
            "parameter {} is tagged with group '{}' but is not a Group<_>",
            std::any::type_name::<T>(),
            group
        ))),
        None => Ok(()),
    }
}

/// An ordered parameter list, implemented for tuples of [`Param`]
pub trait ParamList: Sized + 'static {
    fn specs(tags: &[ParamTag]) -> DiResult<Vec<ParamSpec>>;

    fn extract(specs: &[ParamSpec], values: &[Option<Resolved>]) -> DiResult<Self>;
}

macro_rules! define_param_list ({ $($param:ident)* } => {
    impl<$($param: Param,)*> ParamList for ($($param,)*) {
        #[allow(unused_mut, unused_variables)]
        fn specs(tags: &[ParamTag]) -> DiResult<Vec<ParamSpec>> {
            let declared = tags.len();
            let mut tags = tags.iter();
            let specs: Vec<ParamSpec> = vec![
                $(<$param as Param>::spec(tags.next().unwrap_or(&ParamTag::NONE))?),*
            ];
            if declared > specs.len() {
                return Err(DiError::invalid_argument(format!(
                    "{} parameter tags given for a constructor with {} parameters",
                    declared,
                    specs.len()
                )));
            }
            Ok(specs)
        }

        #[allow(unused_mut, unused_variables)]
        fn extract(specs: &[ParamSpec], values: &[Option<Resolved>]) -> DiResult<Self> {
            let mut slots = specs.iter().zip(values.iter());
            Ok(($(
                {
                    let (spec, value) = slots
                        .next()
                        .ok_or_else(|| DiError::invalid_argument("too few resolved parameters"))?;
                    <$param as Param>::extract(&spec.key, value.as_ref())?
                },
            )*))
        }
    }
});

define_param_list! {}
define_param_list! { T1 }
define_param_list! { T1 T2 }
define_param_list! { T1 T2 T3 }
define_param_list! { T1 T2 T3 T4 }
define_param_list! { T1 T2 T3 T4 T5 }
define_param_list! { T1 T2 T3 T4 T5 T6 }
define_param_list! { T1 T2 T3 T4 T5 T6 T7 }
define_param_list! { T1 T2 T3 T4 T5 T6 T7 T8 }

/// An infallible constructor function
pub trait Constructor<Args>: Send + Sync + 'static {
    /// The value this constructor produces
    type Output: Send + Sync + 'static;

    fn call(&self, args: Args) -> Self::Output;
}

/// A constructor that may fail with an application error
pub trait TryConstructor<Args>: Send + Sync + 'static {
    type Output: Send + Sync + 'static;
    type Error: Into<BoxError>;

    fn try_call(&self, args: Args) -> Result<Self::Output, Self::Error>;
}

macro_rules! define_constructor ({ $($param:ident)* } => {
    impl<F, R, $($param: Param,)*> Constructor<($($param,)*)> for F
    where
        F: Fn($($param),*) -> R + Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        type Output = R;

        #[inline]
        #[allow(non_snake_case)]
        fn call(&self, ($($param,)*): ($($param,)*)) -> Self::Output {
            (self)($($param),*)
        }
    }

    impl<F, R, E, $($param: Param,)*> TryConstructor<($($param,)*)> for F
    where
        F: Fn($($param),*) -> Result<R, E> + Send + Sync + 'static,
        R: Send + Sync + 'static,
        E: Into<BoxError>,
    {
        type Output = R;
        type Error = E;

        #[inline]
        #[allow(non_snake_case)]
        fn try_call(&self, ($($param,)*): ($($param,)*)) -> Result<Self::Output, Self::Error> {
            (self)($($param),*)
        }
    }
});

define_constructor! {}
define_constructor! { T1 }
define_constructor! { T1 T2 }
define_constructor! { T1 T2 T3 }
define_constructor! { T1 T2 T3 T4 }
define_constructor! { T1 T2 T3 T4 T5 }
define_constructor! { T1 T2 T3 T4 T5 T6 }
define_constructor! { T1 T2 T3 T4 T5 T6 T7 }
define_constructor! { T1 T2 T3 T4 T5 T6 T7 T8 }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::registry::instance;

    struct Config;
    struct Handler;

    fn specs_of<Args: ParamList>(tags: &[ParamTag]) -> DiResult<Vec<ParamSpec>> {
        Args::specs(tags)
    }

    #[test]
    fn test_param_specs_follow_types() {
        let specs = specs_of::<(Arc<Config>, Option<Arc<u8>>, Group<Handler>)>(&[
            ParamTag::NONE,
            ParamTag::named("port"),
            ParamTag::group("handlers"),
        ])
        .unwrap();

        assert_eq!(specs[0], ParamSpec::required(TypeKey::of::<Config>()));
        assert_eq!(specs[1], ParamSpec::optional(TypeKey::named::<u8>("port")));
        assert_eq!(specs[2], ParamSpec::required(TypeKey::grouped::<Handler>("handlers")));
    }

    #[test]
    fn test_group_param_requires_group_tag() {
        let error = specs_of::<(Group<Handler>,)>(&[]).unwrap_err();
        assert!(error.is_invalid_argument());
    }

    #[test]
    fn test_group_tag_on_plain_param_is_rejected() {
        let error = specs_of::<(Arc<Config>,)>(&[ParamTag::group("handlers")]).unwrap_err();
        assert!(error.is_invalid_argument());
    }

    #[test]
    fn test_too_many_tags_is_rejected() {
        let error = specs_of::<(Arc<Config>,)>(&[ParamTag::NONE, ParamTag::named("x")]).unwrap_err();
        assert!(error.is_invalid_argument());
    }

    #[test]
    fn test_extract_typed_values() {
        let specs = specs_of::<(Arc<u8>, Option<Arc<u16>>)>(&[]).unwrap();
        let values = vec![Some(Resolved::One(instance(4u8))), None];

        let (first, second) = <(Arc<u8>, Option<Arc<u16>>)>::extract(&specs, &values).unwrap();
        assert_eq!(*first, 4);
        assert!(second.is_none());
    }

    #[test]
    fn test_constructor_call_spreads_tuple() {
        fn call<Args, F: Constructor<Args>>(f: &F, args: Args) -> F::Output {
            f.call(args)
        }

        let sum = call(&|a: Arc<u8>, b: Arc<u8>| u16::from(*a) + u16::from(*b), (Arc::new(2), Arc::new(3)));
        assert_eq!(sum, 5);
        assert_eq!(call(&|| "ready", ()), "ready");
    }
}
