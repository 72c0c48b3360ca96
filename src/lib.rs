//! Pull-based form state: fields with validation and interaction history,
//! aggregated into a form with a submission lifecycle.

pub mod form;
pub mod prelude;
pub mod util;

pub use form::{Field, Form, FormError, FormResult, SubmitReturn, Submission};
