//! Schema-checked resources

use super::{BoxResourceProvider, Resource, ResourceProvider};
use crate::error::{ProviderError, ValidationError};
use crate::provider::ProviderResult;
use crate::schema::Schema;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use url::Url;

/// Turns an untyped document into a typed value or a list of violations
pub trait Validator<T>: Send + Sync {
    fn validate(&self, value: Value) -> Result<T, ValidationError>;
}

/// Validates against a JSON Schema, then deserializes
pub struct SchemaValidator<T> {
    schema: Schema,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SchemaValidator<T> {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            _marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Validator<T> for SchemaValidator<T> {
    fn validate(&self, value: Value) -> Result<T, ValidationError> {
        self.schema.validate(&value)?;
        serde_json::from_value(value).map_err(|e| ValidationError::single("", e.to_string()))
    }
}

/// Runs resolved documents through a [`Validator`]
pub struct ValidatedProvider<T> {
    inner: BoxResourceProvider<Value>,
    validator: Box<dyn Validator<T>>,
}

impl<T> ValidatedProvider<T> {
    pub fn new(inner: BoxResourceProvider<Value>, validator: Box<dyn Validator<T>>) -> Self {
        Self { inner, validator }
    }
}

#[async_trait]
impl<T> ResourceProvider<T> for ValidatedProvider<T>
where
    T: Send,
{
    fn supports(&self, url: &Url) -> bool {
        self.inner.supports(url)
    }

    async fn get(&self, url: &Url) -> ProviderResult<Resource<T>> {
        let resource = self.inner.get(url).await?;
        let value = self
            .validator
            .validate(resource.value)
            .map_err(ProviderError::Invalid)?;
        Ok(Resource::new(resource.url, value))
    }
}
