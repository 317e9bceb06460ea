//! Schemas used by [`validate_options`](crate::combinators::validate_options).

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Validates a plain JSON value and produces a typed result.
pub trait Schema {
    type Output;

    /// Prepare the schema for repeated use. Called once, before the first
    /// validation.
    fn prime(&mut self) {}

    /// Check `value`, returning a human-readable message on failure.
    fn validate(&self, value: &Value) -> Result<Self::Output, String>;
}

/// Schema that accepts whatever deserializes into `T`.
pub struct TypedSchema<T>(PhantomData<fn() -> T>);

pub fn typed<T: DeserializeOwned>() -> TypedSchema<T> {
    TypedSchema(PhantomData)
}

impl<T: DeserializeOwned> Schema for TypedSchema<T> {
    type Output = T;

    fn validate(&self, value: &Value) -> Result<T, String> {
        T::deserialize(value).map_err(|e| e.to_string())
    }
}

/// Schema backed by a validation function.
pub struct FnSchema<F, T> {
    check: F,
    _output: PhantomData<fn() -> T>,
}

pub fn from_fn<F, T>(check: F) -> FnSchema<F, T>
where
    F: Fn(&Value) -> Result<T, String>,
{
    FnSchema {
        check,
        _output: PhantomData,
    }
}

impl<F, T> Schema for FnSchema<F, T>
where
    F: Fn(&Value) -> Result<T, String>,
{
    type Output = T;

    fn validate(&self, value: &Value) -> Result<T, String> {
        (self.check)(value)
    }
}
