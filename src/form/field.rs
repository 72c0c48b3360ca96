use std::any::Any;
use std::sync::{Arc, RwLock};

use log::trace;
use serde::Serialize;
use serde_json::Value;

use super::controller::{Form, FormError, FormResult, read_lock, write_lock};
use super::validation::{
    self, Schema, ValidateFn, Validated, ValidationError, ValidationStrategy,
};

/// Raw value a field can hold.
pub trait FieldValue: Clone + PartialEq + Serialize + Send + Sync + 'static {}

impl<T> FieldValue for T where T: Clone + PartialEq + Serialize + Send + Sync + 'static {}

/// Value a field produces once validation succeeds.
pub trait ParsedValue: Clone + Serialize + Send + Sync + 'static {}

impl<T> ParsedValue for T where T: Clone + Serialize + Send + Sync + 'static {}

pub(super) type EqualityFn<V> = Arc<dyn Fn(&V, &V) -> bool + Send + Sync>;

/// Type-erased view of a field, as stored by a [`Form`].
pub trait FormField: Send + Sync {
    fn id(&self) -> &str;
    fn error(&self) -> FormResult<Option<String>>;
    fn is_dirty(&self) -> FormResult<bool>;
    fn raw_value(&self) -> FormResult<Value>;
    fn parsed_value(&self) -> FormResult<Option<Value>>;
    /// Sets both interaction flags, as if the user had focused and left the field.
    fn mark_interacted(&self) -> FormResult<()>;
    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldState<V> {
    pub id: String,
    pub value: V,
    pub error_override: Option<String>,
    pub is_focused: bool,
    pub was_ever_focused: bool,
    pub was_ever_blurred: bool,
}

pub struct Field<V, P = V> {
    id: Arc<str>,
    initial_value: Arc<V>,
    strategy: ValidationStrategy,
    state: Arc<RwLock<FieldState<V>>>,
    validator: ValidateFn<V, P>,
    equality: EqualityFn<V>,
}

impl<V, P> Clone for Field<V, P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            initial_value: self.initial_value.clone(),
            strategy: self.strategy,
            state: self.state.clone(),
            validator: self.validator.clone(),
            equality: self.equality.clone(),
        }
    }
}

pub struct FieldBuilder<V, P> {
    id: String,
    initial_value: V,
    initial_error: Option<String>,
    strategy: ValidationStrategy,
    conflicting: bool,
    validator: ValidateFn<V, P>,
    equality: EqualityFn<V>,
}

impl<V> Field<V, V>
where
    V: FieldValue,
{
    pub fn builder(id: impl Into<String>, initial_value: V) -> FieldBuilder<V, V> {
        FieldBuilder {
            id: id.into(),
            initial_value,
            initial_error: None,
            strategy: ValidationStrategy::Unvalidated,
            conflicting: false,
            validator: validation::unvalidated(),
            equality: Arc::new(serialized_eq::<V>),
        }
    }
}

/// Compares the serialized forms, so values that encode identically (a NaN and
/// itself) count as equal. Falls back to `PartialEq` when either side cannot be
/// serialized.
fn serialized_eq<V: FieldValue>(left: &V, right: &V) -> bool {
    match (serde_json::to_value(left), serde_json::to_value(right)) {
        (Ok(left), Ok(right)) => left == right,
        _ => left == right,
    }
}

impl<V, P> FieldBuilder<V, P>
where
    V: FieldValue,
    P: ParsedValue,
{
    pub fn initial_error(mut self, message: impl Into<String>) -> Self {
        self.initial_error = Some(message.into());
        self
    }

    /// Replaces the default dirty check, which compares serialized values.
    pub fn equality<F>(mut self, equality: F) -> Self
    where
        F: Fn(&V, &V) -> bool + Send + Sync + 'static,
    {
        self.equality = Arc::new(equality);
        self
    }

    pub fn validate<Q, E, F>(self, validate: F) -> FieldBuilder<V, Q>
    where
        Q: ParsedValue,
        E: ValidationError,
        F: Fn(&V) -> Result<Q, E> + Send + Sync + 'static,
    {
        self.with_strategy(ValidationStrategy::Custom, validation::custom(validate))
    }

    pub fn schema<S>(self, schema: S) -> FieldBuilder<V, S::Output>
    where
        S: Schema + 'static,
        S::Output: ParsedValue,
    {
        let validator = validation::schema(self.id.clone(), schema);
        self.with_strategy(ValidationStrategy::Schema, validator)
    }

    /// Builds the field and registers it into `form`, replacing any field with
    /// the same id.
    pub fn build<R>(self, form: &Form<R>) -> FormResult<Field<V, P>>
    where
        R: Send + 'static,
    {
        if self.id.is_empty() {
            return Err(FormError::EmptyFieldId);
        }
        if self.conflicting {
            return Err(FormError::ConflictingValidation { field: self.id });
        }

        let field = Field {
            id: Arc::from(self.id.as_str()),
            initial_value: Arc::new(self.initial_value.clone()),
            strategy: self.strategy,
            state: Arc::new(RwLock::new(FieldState {
                id: self.id,
                value: self.initial_value,
                error_override: self.initial_error,
                is_focused: false,
                was_ever_focused: false,
                was_ever_blurred: false,
            })),
            validator: self.validator,
            equality: self.equality,
        };
        form.add(Arc::new(field.clone()))?;
        Ok(field)
    }

    fn with_strategy<Q>(
        self,
        strategy: ValidationStrategy,
        validator: ValidateFn<V, Q>,
    ) -> FieldBuilder<V, Q> {
        FieldBuilder {
            id: self.id,
            initial_value: self.initial_value,
            initial_error: self.initial_error,
            strategy,
            conflicting: self.conflicting || self.strategy != ValidationStrategy::Unvalidated,
            validator,
            equality: self.equality,
        }
    }
}

impl<V, P> Field<V, P>
where
    V: FieldValue,
    P: ParsedValue,
{
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn initial_value(&self) -> &V {
        &self.initial_value
    }

    pub fn strategy(&self) -> ValidationStrategy {
        self.strategy
    }

    pub fn state(&self) -> FormResult<FieldState<V>> {
        Ok(read_lock(&self.state, "reading field state")?.clone())
    }

    pub fn value(&self) -> FormResult<V> {
        Ok(read_lock(&self.state, "reading field value")?.value.clone())
    }

    pub fn error_override(&self) -> FormResult<Option<String>> {
        Ok(read_lock(&self.state, "reading error override")?
            .error_override
            .clone())
    }

    pub fn is_focused(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading focus state")?.is_focused)
    }

    pub fn was_ever_focused(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading focus history")?.was_ever_focused)
    }

    pub fn was_ever_blurred(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading blur history")?.was_ever_blurred)
    }

    pub fn on_focus(&self) -> FormResult<()> {
        let mut state = write_lock(&self.state, "focusing field")?;
        state.is_focused = true;
        state.was_ever_focused = true;
        trace!("field `{}` focused", self.id);
        Ok(())
    }

    pub fn on_blur(&self) -> FormResult<()> {
        let mut state = write_lock(&self.state, "blurring field")?;
        state.is_focused = false;
        state.was_ever_blurred = true;
        trace!("field `{}` blurred", self.id);
        Ok(())
    }

    /// Replaces the value. Any error override is dropped first.
    pub fn on_change(&self, value: V) -> FormResult<()> {
        let mut state = write_lock(&self.state, "changing field value")?;
        state.error_override = None;
        state.value = value;
        trace!("field `{}` changed", self.id);
        Ok(())
    }

    pub fn set_error(&self, message: Option<String>) -> FormResult<()> {
        write_lock(&self.state, "setting error override")?.error_override = message;
        Ok(())
    }

    pub fn parsed(&self) -> FormResult<Option<P>> {
        let value = self.value()?;
        Ok(match (self.validator)(&value)? {
            Validated::Parsed(parsed) => Some(parsed),
            Validated::Failed(_) => None,
        })
    }

    /// The override when one is set, otherwise the validation message.
    pub fn error(&self) -> FormResult<Option<String>> {
        let (value, error_override) = {
            let state = read_lock(&self.state, "reading field for validation")?;
            (state.value.clone(), state.error_override.clone())
        };
        let outcome = (self.validator)(&value)?;
        if let Some(message) = error_override.filter(|message| !message.is_empty()) {
            return Ok(Some(message));
        }
        Ok(match outcome {
            Validated::Parsed(_) => None,
            Validated::Failed(message) => Some(message),
        })
    }

    pub fn is_dirty(&self) -> FormResult<bool> {
        let value = self.value()?;
        Ok(!(self.equality)(&value, self.initial_value.as_ref()))
    }

    pub fn if_was_ever_focused_then_error(&self) -> FormResult<Option<String>> {
        if !self.was_ever_focused()? {
            return Ok(None);
        }
        self.error()
    }

    pub fn if_was_ever_blurred_then_error(&self) -> FormResult<Option<String>> {
        if !self.was_ever_blurred()? {
            return Ok(None);
        }
        self.error()
    }

    fn serialize<T: Serialize>(&self, value: &T) -> FormResult<Value> {
        serde_json::to_value(value).map_err(|error| FormError::Serialize {
            field: self.id.to_string(),
            message: error.to_string(),
        })
    }
}

impl<V, P> FormField for Field<V, P>
where
    V: FieldValue,
    P: ParsedValue,
{
    fn id(&self) -> &str {
        Field::id(self)
    }

    fn error(&self) -> FormResult<Option<String>> {
        Field::error(self)
    }

    fn is_dirty(&self) -> FormResult<bool> {
        Field::is_dirty(self)
    }

    fn raw_value(&self) -> FormResult<Value> {
        self.serialize(&self.value()?)
    }

    fn parsed_value(&self) -> FormResult<Option<Value>> {
        self.parsed()?
            .map(|parsed| self.serialize(&parsed))
            .transpose()
    }

    fn mark_interacted(&self) -> FormResult<()> {
        let mut state = write_lock(&self.state, "marking field interacted")?;
        state.was_ever_focused = true;
        state.was_ever_blurred = true;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
