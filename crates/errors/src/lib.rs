//! The error taxonomy shared by every component of the runtime, plus the
//! handful of numeric constants that bound resource usage (iterator
//! expansion, recursion depth, argument counts, ...).
//!
//! Every fallible public call across the workspace returns a `Result<T,
//! Error>`. `Error` pairs one [`ErrorCode`] from the fixed taxonomy with a
//! human-readable message and, where the failure can be correlated back to a
//! position in an input document, an event-count position.

pub mod constants;

use thiserror::Error as ThisError;

/// The fixed set of failure domains a caller can react to programmatically.
/// Components never invent new variants; they pick the closest fit from this
/// list the way the original C ABI maps every failure into one enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    LogicError,
    NoMemError,
    TypeError,
    EncodingError,
    BufferOverflowError,
    OutOfRangeError,
    NofArgsError,
    MissingSelf,
    InvalidAccess,
    UnexpectedEof,
    NotImplemented,
    ValueUndefined,
    MixedConstruction,
    DuplicateDefinition,
    SyntaxError,
    UncaughtException,
    ExecutionOrder,
    AtomicValueExpected,
    NotAllowed,
    IteratorFailed,
    AddressedItemNotFound,
    HostObjectError,
    AmbiguousReference,
    MaxRecursionDepthReached,
    ComplexityOfProblem,
    InvalidRequest,
    AttributeNotAtomic,
    UnknownContentType,
    UnknownSchema,
    MissingStructureDescription,
    DelegateRequestFailed,
    ServiceImplementationError,
    BindingLanguageError,
}

impl ErrorCode {
    /// A short machine-stable name, suitable for logs or wire responses.
    pub fn as_str(&self) -> &'static str {
        use ErrorCode::*;
        match self {
            LogicError => "LogicError",
            NoMemError => "NoMemError",
            TypeError => "TypeError",
            EncodingError => "EncodingError",
            BufferOverflowError => "BufferOverflowError",
            OutOfRangeError => "OutOfRangeError",
            NofArgsError => "NofArgsError",
            MissingSelf => "MissingSelf",
            InvalidAccess => "InvalidAccess",
            UnexpectedEof => "UnexpectedEof",
            NotImplemented => "NotImplemented",
            ValueUndefined => "ValueUndefined",
            MixedConstruction => "MixedConstruction",
            DuplicateDefinition => "DuplicateDefinition",
            SyntaxError => "SyntaxError",
            UncaughtException => "UncaughtException",
            ExecutionOrder => "ExecutionOrder",
            AtomicValueExpected => "AtomicValueExpected",
            NotAllowed => "NotAllowed",
            IteratorFailed => "IteratorFailed",
            AddressedItemNotFound => "AddressedItemNotFound",
            HostObjectError => "HostObjectError",
            AmbiguousReference => "AmbiguousReference",
            MaxRecursionDepthReached => "MaxRecursionDepthReached",
            ComplexityOfProblem => "ComplexityOfProblem",
            InvalidRequest => "InvalidRequest",
            AttributeNotAtomic => "AttributeNotAtomic",
            UnknownContentType => "UnknownContentType",
            UnknownSchema => "UnknownSchema",
            MissingStructureDescription => "MissingStructureDescription",
            DelegateRequestFailed => "DelegateRequestFailed",
            ServiceImplementationError => "ServiceImplementationError",
            BindingLanguageError => "BindingLanguageError",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caller-visible failure: an [`ErrorCode`], a formatted message, and
/// (for execution failures) the event-count position within the document
/// that the failure can be correlated to.
#[derive(Debug, Clone, ThisError)]
#[error("{code}: {message}")]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub position: Option<u64>,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Error {
            code,
            message: message.into(),
            position: None,
        }
    }

    /// Attach the event-count position at which this failure was observed.
    pub fn at(mut self, position: u64) -> Self {
        self.position = Some(position);
        self
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

#[macro_export]
macro_rules! bail {
    ($code:expr, $($arg:tt)*) => {
        return Err($crate::Error::new($code, format!($($arg)*)))
    };
}
