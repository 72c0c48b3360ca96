use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::controller::{FormError, FormResult};

/// A failed validation outcome that can be shown to the user.
///
/// Anything with a `Display` impl qualifies, so plain strings and error types
/// such as `ParseIntError` can be returned from a validator directly.
pub trait ValidationError {
    fn message(&self) -> String;
}

impl<T> ValidationError for T
where
    T: Display + ?Sized,
{
    fn message(&self) -> String {
        self.to_string()
    }
}

/// Recognized failure raised by a [`Schema`]. Carries the message shown on the field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SchemaViolation {
    pub message: String,
    pub path: Option<String>,
}

impl SchemaViolation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
        }
    }

    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Displays the message alone; `path` stays available as data.
impl Display for SchemaViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SchemaError {
    /// The value was rejected. Surfaces as the field's error.
    Invalid(SchemaViolation),
    /// Anything else. Propagates out of the field as [`FormError::Schema`].
    Other(String),
}

impl From<SchemaViolation> for SchemaError {
    fn from(violation: SchemaViolation) -> Self {
        SchemaError::Invalid(violation)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ValidateOptions {
    pub abort_early: bool,
}

/// External validate-and-coerce collaborator.
///
/// Empty strings reach the schema as `Value::Null`, so a single "required" rule
/// covers both an empty input and a missing one.
pub trait Schema: Send + Sync {
    type Output;

    fn validate_sync(
        &self,
        value: &Value,
        options: ValidateOptions,
    ) -> Result<Self::Output, SchemaError>;
}

impl<S> Schema for Arc<S>
where
    S: Schema + ?Sized,
{
    type Output = S::Output;

    fn validate_sync(
        &self,
        value: &Value,
        options: ValidateOptions,
    ) -> Result<Self::Output, SchemaError> {
        (**self).validate_sync(value, options)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationStrategy {
    Unvalidated,
    Custom,
    Schema,
}

pub(super) enum Validated<P> {
    Parsed(P),
    Failed(String),
}

pub(super) type ValidateFn<V, P> = Arc<dyn Fn(&V) -> FormResult<Validated<P>> + Send + Sync>;

pub(super) fn unvalidated<V>() -> ValidateFn<V, V>
where
    V: Clone + Send + Sync + 'static,
{
    Arc::new(|value: &V| -> FormResult<Validated<V>> {
        Ok(Validated::Parsed(value.clone()))
    })
}

pub(super) fn custom<V, P, E, F>(validate: F) -> ValidateFn<V, P>
where
    V: 'static,
    P: 'static,
    E: ValidationError,
    F: Fn(&V) -> Result<P, E> + Send + Sync + 'static,
{
    Arc::new(move |value: &V| -> FormResult<Validated<P>> {
        Ok(match validate(value) {
            Ok(parsed) => Validated::Parsed(parsed),
            Err(error) => Validated::Failed(error.message()),
        })
    })
}

pub(super) fn schema<V, S>(field: String, schema: S) -> ValidateFn<V, S::Output>
where
    V: Serialize + 'static,
    S: Schema + 'static,
{
    let options = ValidateOptions { abort_early: true };
    Arc::new(move |value: &V| -> FormResult<Validated<S::Output>> {
        let input = schema_input(value).map_err(|error| FormError::Serialize {
            field: field.clone(),
            message: error.to_string(),
        })?;
        match schema.validate_sync(&input, options) {
            Ok(parsed) => Ok(Validated::Parsed(parsed)),
            Err(SchemaError::Invalid(violation)) => Ok(Validated::Failed(violation.message)),
            Err(SchemaError::Other(message)) => Err(FormError::Schema {
                field: field.clone(),
                message,
            }),
        }
    })
}

fn schema_input<V: Serialize>(value: &V) -> serde_json::Result<Value> {
    Ok(match serde_json::to_value(value)? {
        Value::String(text) if text.is_empty() => Value::Null,
        other => other,
    })
}
