use crate::native::ElementKind;

/// A value at the boundary that cannot be represented on the other side.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("{value} is out of range for '{target}'")]
    OutOfRange { value: String, target: String },

    #[error("invalid string: {0}")]
    InvalidString(String),

    #[error("handle {0} does not refer to a live object")]
    InvalidHandle(usize),

    #[error("handle to '{found}' cannot be used as '{expected}'")]
    IncompatibleHandle { expected: String, found: String },

    #[error("array of {found} cannot be used as an array of {expected}")]
    ElementMismatch { expected: ElementKind, found: ElementKind },

    #[error("null is not a valid '{0}'")]
    NullNotAllowed(String),

    #[error("enum '{0}' is not bound")]
    UnknownEnum(String),
}

impl ConversionError {
    pub(crate) fn mismatch(expected: impl ToString, found: impl ToString) -> Self {
        ConversionError::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub(crate) fn out_of_range(value: impl ToString, target: impl ToString) -> Self {
        ConversionError::OutOfRange {
            value: value.to_string(),
            target: target.to_string(),
        }
    }
}

/// Raised by managed code. Never reported as a successful call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ManagedFailure {
    #[error("{0}")]
    Exception(String),

    #[error("argument {0} does not exist")]
    ArgumentIndex(usize),

    #[error("argument {index} is not {expected}")]
    ArgumentType { index: usize, expected: &'static str },

    #[error("instance member called without an instance")]
    NoInstance,
}

impl ManagedFailure {
    pub fn exception(message: impl Into<String>) -> Self {
        ManagedFailure::Exception(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallError {
    #[error("unknown native symbol '{0}'")]
    UnknownSymbol(String),

    #[error("{symbol} takes {expected} native arguments, {found} given")]
    Arity {
        symbol: String,
        expected: usize,
        found: usize,
    },

    #[error("{symbol}: cannot convert '{parameter}': {source}")]
    Conversion {
        symbol: String,
        parameter: String,
        source: ConversionError,
    },

    #[error("{symbol}: {source}")]
    Managed {
        symbol: String,
        source: ManagedFailure,
    },

    #[error("{symbol}: no managed implementation registered for '{signature}'")]
    MissingImplementation { symbol: String, signature: String },
}

impl CallError {
    /// Status code reported through `m2n_invoke`.
    pub fn status(&self) -> i32 {
        use crate::ffi::*;
        match self {
            CallError::UnknownSymbol(_) => M2N_UNKNOWN_SYMBOL,
            CallError::Arity { .. } => M2N_ARITY,
            CallError::Conversion { .. } => M2N_CONVERSION,
            CallError::Managed { .. } => M2N_MANAGED_FAILURE,
            CallError::MissingImplementation { .. } => M2N_MISSING_IMPLEMENTATION,
        }
    }
}
