use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use log::{debug, trace};
use serde_json::Value;

use super::field::{Field, FieldValue, FormField, ParsedValue};
use super::submit::{SubmitArgs, SubmitFn, SubmitReturn, Submission, SubmittingGuard};

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

impl Display for FormId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "form#{}", self.0)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FormError {
    StatePoisoned(&'static str),
    EmptyFieldId,
    ConflictingValidation { field: String },
    Schema { field: String, message: String },
    Serialize { field: String, message: String },
    Deserialize(String),
}

impl Display for FormError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FormError::StatePoisoned(context) => {
                write!(f, "form state lock poisoned while {context}")
            }
            FormError::EmptyFieldId => f.write_str("field id must not be empty"),
            FormError::ConflictingValidation { field } => write!(
                f,
                "field `{field}` was given more than one validation strategy"
            ),
            FormError::Schema { field, message } => {
                write!(f, "schema for field `{field}` failed unexpectedly: {message}")
            }
            FormError::Serialize { field, message } => {
                write!(f, "failed to serialize value of field `{field}`: {message}")
            }
            FormError::Deserialize(error) => {
                write!(f, "failed to deserialize submitted values: {error}")
            }
        }
    }
}

impl std::error::Error for FormError {}

pub type FormResult<T> = Result<T, FormError>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FormSnapshot {
    pub id: FormId,
    pub is_submitting: bool,
    pub submit_count: u32,
    pub values_at_last_submit: Option<String>,
    pub is_dirty: bool,
    pub is_valid: bool,
    pub error_list: Vec<String>,
    pub value_list: String,
    pub is_changed_since_last_submit: bool,
}

impl FormSnapshot {
    pub fn is_error(&self) -> bool {
        !self.is_valid
    }
}

pub(super) struct FormState {
    pub(super) is_submitting: bool,
    pub(super) submit_count: u32,
    pub(super) values_at_last_submit: Option<String>,
}

pub(super) type FieldMap = IndexMap<String, Arc<dyn FormField>>;

/// Aggregate of registered fields plus the submission lifecycle.
///
/// Every derived property is recomputed from the fields on each call. Cloning a
/// `Form` yields another handle to the same state.
pub struct Form<R = ()> {
    id: FormId,
    state: Arc<RwLock<FormState>>,
    fields: Arc<RwLock<FieldMap>>,
    on_submit: Arc<RwLock<SubmitFn<R>>>,
}

impl<R> Clone for Form<R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            state: self.state.clone(),
            fields: self.fields.clone(),
            on_submit: self.on_submit.clone(),
        }
    }
}

impl<R> Form<R>
where
    R: Send + 'static,
{
    pub fn new<F>(on_submit: F) -> Self
    where
        F: Fn(SubmitArgs) -> SubmitReturn<R> + Send + Sync + 'static,
    {
        let id = FormId::next();
        let on_submit: SubmitFn<R> = Arc::new(on_submit);
        debug!("{id} created");
        Self {
            id,
            state: Arc::new(RwLock::new(FormState {
                is_submitting: false,
                submit_count: 0,
                values_at_last_submit: None,
            })),
            fields: Arc::new(RwLock::new(IndexMap::new())),
            on_submit: Arc::new(RwLock::new(on_submit)),
        }
    }

    pub fn id(&self) -> FormId {
        self.id
    }

    /// Registers `field` under its id, replacing any field already registered
    /// with the same id. The replaced entry keeps its position.
    pub fn add(&self, field: Arc<dyn FormField>) -> FormResult<()> {
        let id = field.id().to_owned();
        let replaced = write_lock(&self.fields, "registering field")?
            .insert(id.clone(), field)
            .is_some();
        debug!("{} registered field `{id}` (replaced: {replaced})", self.id);
        Ok(())
    }

    /// Swaps the submission callback. The next `submit` invokes `on_submit`.
    pub fn replace_on_submit<F>(&self, on_submit: F) -> FormResult<()>
    where
        F: Fn(SubmitArgs) -> SubmitReturn<R> + Send + Sync + 'static,
    {
        let on_submit: SubmitFn<R> = Arc::new(on_submit);
        *write_lock(&self.on_submit, "replacing submit callback")? = on_submit;
        trace!("{} submit callback replaced", self.id);
        Ok(())
    }

    pub fn field(&self, id: &str) -> FormResult<Option<Arc<dyn FormField>>> {
        Ok(read_lock(&self.fields, "looking up field")?.get(id).cloned())
    }

    pub fn typed_field<V, P>(&self, id: &str) -> FormResult<Option<Field<V, P>>>
    where
        V: FieldValue,
        P: ParsedValue,
    {
        Ok(self
            .field(id)?
            .and_then(|field| field.as_any().downcast_ref::<Field<V, P>>().cloned()))
    }

    pub fn field_ids(&self) -> FormResult<Vec<String>> {
        Ok(read_lock(&self.fields, "listing field ids")?
            .keys()
            .cloned()
            .collect())
    }

    pub fn len(&self) -> FormResult<usize> {
        Ok(read_lock(&self.fields, "counting fields")?.len())
    }

    pub fn is_empty(&self) -> FormResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn is_submitting(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading submitting flag")?.is_submitting)
    }

    pub fn submit_count(&self) -> FormResult<u32> {
        Ok(read_lock(&self.state, "reading submit count")?.submit_count)
    }

    pub fn values_at_last_submit(&self) -> FormResult<Option<String>> {
        Ok(read_lock(&self.state, "reading last submitted values")?
            .values_at_last_submit
            .clone())
    }

    pub fn is_dirty(&self) -> FormResult<bool> {
        for field in self.registered_fields()?.values() {
            if field.is_dirty()? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn error_list(&self) -> FormResult<Vec<String>> {
        let mut errors = Vec::new();
        for field in self.registered_fields()?.values() {
            if let Some(error) = field.error()? {
                errors.push(error);
            }
        }
        Ok(errors)
    }

    /// True when any field reports a non-empty error. An empty message still
    /// appears in [`Form::error_list`] but does not block submission.
    pub fn is_error(&self) -> FormResult<bool> {
        for field in self.registered_fields()?.values() {
            if field.error()?.is_some_and(|message| !message.is_empty()) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn is_valid(&self) -> FormResult<bool> {
        Ok(!self.is_error()?)
    }

    /// Serialized snapshot of every raw field value, in registration order.
    pub fn value_list(&self) -> FormResult<String> {
        let values = self
            .registered_fields()?
            .values()
            .map(|field| field.raw_value())
            .collect::<FormResult<Vec<_>>>()?;
        Ok(Value::Array(values).to_string())
    }

    pub fn is_changed_since_last_submit(&self) -> FormResult<bool> {
        let (submit_count, last) = {
            let state = read_lock(&self.state, "reading last submit snapshot")?;
            (state.submit_count, state.values_at_last_submit.clone())
        };
        if submit_count == 0 {
            return self.is_dirty();
        }
        let current = self.value_list()?;
        Ok(last.as_deref() != Some(current.as_str()))
    }

    pub fn snapshot(&self) -> FormResult<FormSnapshot> {
        let (is_submitting, submit_count, values_at_last_submit) = {
            let state = read_lock(&self.state, "creating form snapshot")?;
            (
                state.is_submitting,
                state.submit_count,
                state.values_at_last_submit.clone(),
            )
        };
        let error_list = self.error_list()?;
        Ok(FormSnapshot {
            id: self.id,
            is_submitting,
            submit_count,
            values_at_last_submit,
            is_dirty: self.is_dirty()?,
            is_valid: error_list.iter().all(|message| message.is_empty()),
            error_list,
            value_list: self.value_list()?,
            is_changed_since_last_submit: self.is_changed_since_last_submit()?,
        })
    }

    /// Marks every field as interacted with, then hands the field values to the
    /// submission callback when no field reports an error.
    ///
    /// Overlapping calls are not rejected: each call bumps the counter and
    /// overwrites the last-submit snapshot.
    pub fn submit(&self) -> FormResult<Submission<R>> {
        let value_list = self.value_list()?;
        let submit_count = {
            let mut state = write_lock(&self.state, "starting submit")?;
            state.is_submitting = true;
            state.submit_count = state.submit_count.saturating_add(1);
            state.values_at_last_submit = Some(value_list);
            state.submit_count
        };
        let guard = SubmittingGuard::new(self.id, self.state.clone());
        debug!("{} submit #{submit_count} started", self.id);

        let fields = self.registered_fields()?;
        for field in fields.values() {
            field.mark_interacted()?;
        }

        if self.is_error()? {
            guard.finish("rejected by validation");
            return Ok(Submission::Rejected);
        }

        let args = SubmitArgs::collect(fields)?;
        let on_submit = read_lock(&self.on_submit, "reading submit callback")?.clone();
        let result = on_submit(args);
        trace!(
            "{} submit #{submit_count} callback returned (deferred: {})",
            self.id,
            result.is_deferred()
        );
        match result {
            SubmitReturn::Ready(value) => {
                guard.finish("completed");
                Ok(Submission::Completed(value))
            }
            SubmitReturn::Deferred(future) => Ok(Submission::pending(future, guard)),
        }
    }

    fn registered_fields(&self) -> FormResult<FieldMap> {
        Ok(read_lock(&self.fields, "reading registered fields")?.clone())
    }
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
