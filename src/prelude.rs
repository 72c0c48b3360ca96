pub use crate::form::{
    Field, FieldBuilder, FieldState, FieldValue, Form, FormError, FormField, FormResult,
    FormSnapshot, ParsedValue, PendingSubmit, Schema, SchemaError, SchemaViolation, SubmitArgs,
    SubmitReturn, Submission, ValidateOptions, ValidationError, ValidationStrategy,
};
pub use crate::util::map_values;
