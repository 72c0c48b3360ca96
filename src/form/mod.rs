mod controller;
mod field;
mod submit;
mod validation;


pub use controller::{Form, FormError, FormId, FormResult, FormSnapshot};
pub use field::{Field, FieldBuilder, FieldState, FieldValue, FormField, ParsedValue};
pub use submit::{BoxedSubmitFuture, PendingSubmit, SubmitArgs, SubmitReturn, Submission};
pub use validation::{
    Schema, SchemaError, SchemaViolation, ValidateOptions, ValidationError, ValidationStrategy,
};
