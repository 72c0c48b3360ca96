use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};

use indexmap::IndexMap;
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::controller::{FieldMap, FormError, FormId, FormResult, FormState};
use super::field::{Field, FieldValue, FormField, ParsedValue};
use crate::util::{map_values, try_map_values};

pub type BoxedSubmitFuture<R> = Pin<Box<dyn Future<Output = R> + Send + 'static>>;

pub(super) type SubmitFn<R> = Arc<dyn Fn(SubmitArgs) -> SubmitReturn<R> + Send + Sync>;

/// What a submission callback hands back: a value now, or one later.
pub enum SubmitReturn<R> {
    Ready(R),
    Deferred(BoxedSubmitFuture<R>),
}

impl<R> SubmitReturn<R> {
    pub fn ready(value: R) -> Self {
        SubmitReturn::Ready(value)
    }

    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = R> + Send + 'static,
    {
        SubmitReturn::Deferred(Box::pin(future))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, SubmitReturn::Deferred(_))
    }
}

impl<R> From<R> for SubmitReturn<R> {
    fn from(value: R) -> Self {
        SubmitReturn::Ready(value)
    }
}

/// The three views of a valid form passed to the submission callback.
/// All maps are keyed by field id in registration order.
pub struct SubmitArgs {
    pub fields: IndexMap<String, Arc<dyn FormField>>,
    pub raw_values: IndexMap<String, Value>,
    pub values: IndexMap<String, Value>,
}

impl SubmitArgs {
    pub(super) fn collect(fields: FieldMap) -> FormResult<Self> {
        let raw_values = try_map_values(&fields, |field| field.raw_value())?;
        let parsed = try_map_values(&fields, |field| field.parsed_value())?;
        let values = map_values(&parsed, |value| value.clone().unwrap_or(Value::Null));
        Ok(Self {
            fields,
            raw_values,
            values,
        })
    }

    pub fn field<V, P>(&self, id: &str) -> Option<Field<V, P>>
    where
        V: FieldValue,
        P: ParsedValue,
    {
        self.fields
            .get(id)?
            .as_any()
            .downcast_ref::<Field<V, P>>()
            .cloned()
    }

    /// Deserializes the parsed values into `T`, one struct field per form field.
    pub fn values_as<T: DeserializeOwned>(&self) -> FormResult<T> {
        let object = self
            .values
            .iter()
            .map(|(id, value)| (id.clone(), value.clone()))
            .collect::<Map<String, Value>>();
        serde_json::from_value(Value::Object(object))
            .map_err(|error| FormError::Deserialize(error.to_string()))
    }
}

/// Result of [`Form::submit`](super::Form::submit).
#[must_use]
pub enum Submission<R> {
    /// A field reported an error; the callback was not called.
    Rejected,
    Completed(R),
    Pending(PendingSubmit<R>),
}

impl<R> Submission<R> {
    pub(super) fn pending(future: BoxedSubmitFuture<R>, guard: SubmittingGuard) -> Self {
        Submission::Pending(PendingSubmit {
            future,
            guard: Some(guard),
        })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Submission::Rejected)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Submission::Pending(_))
    }

    /// Waits for a pending callback. `None` when the submission was rejected.
    pub async fn settle(self) -> Option<R> {
        match self {
            Submission::Rejected => None,
            Submission::Completed(value) => Some(value),
            Submission::Pending(pending) => Some(pending.await),
        }
    }
}

/// Deferred callback result. Clears the form's submitting flag once the
/// callback's future completes, or when this value is dropped before that.
#[must_use = "the submitting flag stays set until this future completes or is dropped"]
pub struct PendingSubmit<R> {
    future: BoxedSubmitFuture<R>,
    guard: Option<SubmittingGuard>,
}

impl<R> Future for PendingSubmit<R> {
    type Output = R;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<R> {
        let this = self.get_mut();
        match this.future.as_mut().poll(cx) {
            Poll::Ready(value) => {
                if let Some(guard) = this.guard.take() {
                    guard.finish("settled");
                }
                Poll::Ready(value)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

pub(super) struct SubmittingGuard {
    form: FormId,
    state: Arc<RwLock<FormState>>,
    outcome: &'static str,
}

impl SubmittingGuard {
    pub(super) fn new(form: FormId, state: Arc<RwLock<FormState>>) -> Self {
        Self {
            form,
            state,
            outcome: "dropped before settling",
        }
    }

    pub(super) fn finish(mut self, outcome: &'static str) {
        self.outcome = outcome;
    }
}

impl Drop for SubmittingGuard {
    fn drop(&mut self) {
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.is_submitting = false;
        debug!("{} submit {}", self.form, self.outcome);
    }
}
