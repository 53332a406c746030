pub type BindResult<T> = Result<T, BindError>;

/// Every failure the binding layer can report.
///
/// Variants are structured so callers can branch on the failure kind without matching on message
/// text. Nothing that fails before the native call has touched native state.
#[derive(thiserror::Error, Debug)]
pub enum BindError {
    #[error("operation '{0}' is not known to the native library")]
    UnknownOperation(String),

    #[error("operation '{operation}' has no optional input named '{parameter}'")]
    UnknownParameter { operation: String, parameter: String },

    #[error("operation '{operation}' takes {expected} positional inputs, {got} supplied")]
    ArityMismatch {
        operation: String,
        expected: usize,
        got: usize,
    },

    #[error("cast error: parameter '{parameter}' expects {variant}: {reason}")]
    Cast {
        parameter: String,
        variant: &'static str,
        reason: String,
    },

    #[error("parameter '{parameter}' ({variant}) has no default value")]
    UnsupportedDefault {
        parameter: String,
        variant: &'static str,
    },

    #[error("native type '{tag}' is not implemented (parameter '{parameter}')")]
    NotImplemented { tag: String, parameter: String },

    #[error("native error: {message}")]
    Native { message: String },

    #[error("image handle is already borrowed by an open transaction")]
    AlreadyBorrowed,

    #[error("field '{field}' expects {expected}, found {found}")]
    InvalidFieldType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("operation '{0}' modifies its input in place and must run inside a transaction")]
    RequiresTransaction(String),

    #[error("transaction duplicate still has {0} outstanding aliases")]
    OutstandingAlias(usize),

    #[error("native call did not complete within the requested timeout")]
    Timeout,

    #[error("introspection error: {0}")]
    Introspection(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BindError {
    pub fn cast(
        parameter: impl Into<String>,
        variant: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::Cast {
            parameter: parameter.into(),
            variant,
            reason: reason.into(),
        }
    }

    pub fn native(message: impl Into<String>) -> Self {
        Self::Native {
            message: message.into(),
        }
    }

    pub fn introspection(msg: impl Into<String>) -> Self {
        Self::Introspection(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// `true` for failures caused by the caller's arguments rather than by native state.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownOperation(_)
                | Self::UnknownParameter { .. }
                | Self::ArityMismatch { .. }
                | Self::Cast { .. }
                | Self::RequiresTransaction(_)
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
