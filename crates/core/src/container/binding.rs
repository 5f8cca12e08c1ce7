use std::fmt;

use crate::container::autowiring::{Constructor, ParamList, TryConstructor};
use crate::container::descriptor::{ConstructorId, ParamSpec, ParamTag, TypeKey};
use crate::container::registry::{instance, invoker, Instance, Invoke, Resolved};
use crate::error::{BoxError, DiError, DiResult};

/// Registration options for typed constructors
#[derive(Debug, Clone, Default)]
pub struct ProvideOptions {
    /// Name qualifying the produced key
    pub name: Option<String>,
    /// Group the produced value is contributed to
    pub group: Option<String>,
    /// Positional qualifiers for the constructor's parameters
    pub param_tags: Vec<ParamTag>,
}

impl ProvideOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn param_tags(mut self, tags: impl IntoIterator<Item = ParamTag>) -> Self {
        self.param_tags = tags.into_iter().collect();
        self
    }

    /// Qualify a produced type with this registration's name or group
    pub fn result_key(&self, key: TypeKey) -> DiResult<TypeKey> {
        let tag = ParamTag {
            name: self.name.clone(),
            group: self.group.clone(),
        };
        let key = tag.qualify(key);
        key.validate()?;
        Ok(key)
    }
}

/// Options for decorating a single-valued key
#[derive(Debug, Clone, Default)]
pub struct DecorateOptions {
    /// Decorate the named key instead of the bare type
    pub name: Option<String>,
}

impl DecorateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub(crate) fn key<T: 'static>(&self) -> TypeKey {
        match &self.name {
            Some(name) => TypeKey::named::<T>(name.clone()),
            None => TypeKey::of::<T>(),
        }
    }
}

/// Modifiers for `get`; no options are defined yet
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct GetOptions {}

/// Modifiers for `remove`; no options are defined yet
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct RemoveOptions {}

/// A constructor erased to the uniform invocation signature, ready to register
pub struct Provider {
    pub(crate) id: ConstructorId,
    pub(crate) name: String,
    pub(crate) params: Vec<ParamSpec>,
    pub(crate) results: Vec<TypeKey>,
    pub(crate) invoke: Option<Invoke>,
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("params", &self.params)
            .field("results", &self.results)
            .field("callable", &self.invoke.is_some())
            .finish()
    }
}

impl Provider {
    /// Start describing a provider by hand
    pub fn builder(name: impl Into<String>) -> ProviderBuilder {
        ProviderBuilder {
            provider: Provider {
                id: ConstructorId::unique(),
                name: name.into(),
                params: Vec::new(),
                results: Vec::new(),
                invoke: None,
            },
        }
    }

    pub fn id(&self) -> ConstructorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn from_constructor<F, Args>(constructor: F, options: &ProvideOptions) -> DiResult<Self>
    where
        F: Constructor<Args>,
        Args: ParamList,
    {
        let params = Args::specs(&options.param_tags)?;
        let result = options.result_key(TypeKey::of::<F::Output>())?;

        let specs = params.clone();
        let invoke = invoker(move |values| {
            let args = Args::extract(&specs, values)?;
            Ok(vec![instance(constructor.call(args))])
        });

        Ok(Self {
            id: ConstructorId::of::<F>(),
            name: std::any::type_name::<F>().to_string(),
            params,
            results: vec![result],
            invoke: Some(invoke),
        })
    }

    pub(crate) fn from_try_constructor<F, Args>(constructor: F, options: &ProvideOptions) -> DiResult<Self>
    where
        F: TryConstructor<Args>,
        Args: ParamList,
    {
        let params = Args::specs(&options.param_tags)?;
        let result = options.result_key(TypeKey::of::<F::Output>())?;
        let name = std::any::type_name::<F>().to_string();

        let specs = params.clone();
        let label = name.clone();
        let invoke = invoker(move |values| {
            let args = Args::extract(&specs, values)?;
            let value = constructor.try_call(args).map_err(|error| DiError::Constructor {
                constructor: label.clone(),
                source: error.into(),
            })?;
            Ok(vec![instance(value)])
        });

        Ok(Self {
            id: ConstructorId::of::<F>(),
            name,
            params,
            results: vec![result],
            invoke: Some(invoke),
        })
    }

    /// A provider handing out an already built value
    pub(crate) fn from_value<T: Send + Sync + 'static>(value: T, name: Option<String>) -> Self {
        let key = match name {
            Some(name) => TypeKey::named::<T>(name),
            None => TypeKey::of::<T>(),
        };
        let value: Instance = instance(value);

        Self {
            id: ConstructorId::unique(),
            name: format!("supply({})", key),
            params: Vec::new(),
            results: vec![key],
            invoke: Some(invoker(move |_| Ok(vec![value.clone()]))),
        }
    }
}

/// Builder for providers with hand-declared keys, including multi-result constructors
#[derive(Debug)]
pub struct ProviderBuilder {
    provider: Provider,
}

impl ProviderBuilder {
    /// Declare a required parameter
    pub fn param(mut self, key: TypeKey) -> Self {
        self.provider.params.push(ParamSpec::required(key));
        self
    }

    /// Declare a parameter that resolves to `None` when unprovided
    pub fn optional_param(mut self, key: TypeKey) -> Self {
        self.provider.params.push(ParamSpec::optional(key));
        self
    }

    /// Declare a produced key; values are returned in declaration order
    pub fn result(mut self, key: TypeKey) -> Self {
        self.provider.results.push(key);
        self
    }

    /// Attach the callable
    pub fn call<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Option<Resolved>]) -> Result<Vec<Instance>, BoxError> + Send + Sync + 'static,
    {
        let label = self.provider.name.clone();
        self.provider.invoke = Some(invoker(move |values| {
            f(values).map_err(|source| DiError::Constructor {
                constructor: label.clone(),
                source,
            })
        }));
        self
    }

    pub fn build(self) -> Provider {
        self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Endpoint;

    fn new_endpoint() -> Endpoint {
        Endpoint
    }

    #[test]
    fn test_typed_provider_declares_keys() {
        let provider = Provider::from_constructor(new_endpoint, &ProvideOptions::new().group("routes")).unwrap();

        assert_eq!(provider.results, vec![TypeKey::grouped::<Endpoint>("routes")]);
        assert!(provider.params.is_empty());
        assert!(provider.name().contains("new_endpoint"));
        assert!(matches!(provider.id(), ConstructorId::Typed(_)));
    }

    #[test]
    fn test_name_and_group_together_is_rejected() {
        let options = ProvideOptions::new().name("primary").group("routes");
        let error = Provider::from_constructor(new_endpoint, &options).unwrap_err();
        assert!(error.is_invalid_argument());
    }

    #[test]
    fn test_builder_without_callable() {
        let provider = Provider::builder("pair").result(TypeKey::of::<u8>()).build();
        assert!(provider.invoke.is_none());
    }

    #[test]
    fn test_builder_wraps_callable_errors() {
        let provider = Provider::builder("failing")
            .result(TypeKey::of::<u8>())
            .call(|_| Err("not today".into()))
            .build();

        let invoke = provider.invoke.unwrap();
        let error = invoke(&[]).unwrap_err();
        assert!(error.is_constructor_error());
        assert!(error.to_string().contains("failing"));
    }

    #[test]
    fn test_supplied_value_is_shared() {
        let provider = Provider::from_value(5u32, Some("retries".to_string()));
        assert_eq!(provider.results, vec![TypeKey::named::<u32>("retries")]);

        let invoke = provider.invoke.unwrap();
        let first = invoke(&[]).unwrap();
        let second = invoke(&[]).unwrap();
        assert!(Arc::ptr_eq(&first[0], &second[0]));
    }
}
