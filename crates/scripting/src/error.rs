//! Converts an `mlua::Error` into the engine's own error taxonomy, per
//! spec.md §4.J's failure mode: script syntax errors surface as
//! `SyntaxError`; memory exhaustion as `NoMemError`; runtime errors as
//! `ServiceImplementationError`; anything else as `LogicError`. `mlua`'s
//! safe API never lets a Lua-side panic unwind into Rust on its own, so
//! there is no `longjmp`-equivalent to install here -- every failure path
//! already surfaces as a plain `Result`, which is the "safer alternative"
//! spec.md §9's design note recommends.

use ligature_errors::{Error, ErrorCode};

/// `http_error(code_name, message)` raises a Lua runtime error formatted as
/// `"CodeName: message"`, reusing `Error`'s own `Display` impl; recognize
/// that shape here so a script's explicit error still maps back to the
/// taxonomy it named instead of flattening to `ServiceImplementationError`.
fn code_from_str(name: &str) -> Option<ErrorCode> {
    use ErrorCode::*;
    [
        LogicError, NoMemError, TypeError, EncodingError, BufferOverflowError, OutOfRangeError, NofArgsError,
        MissingSelf, InvalidAccess, UnexpectedEof, NotImplemented, ValueUndefined, MixedConstruction,
        DuplicateDefinition, SyntaxError, UncaughtException, ExecutionOrder, AtomicValueExpected, NotAllowed,
        IteratorFailed, AddressedItemNotFound, HostObjectError, AmbiguousReference, MaxRecursionDepthReached,
        ComplexityOfProblem, InvalidRequest, AttributeNotAtomic, UnknownContentType, UnknownSchema,
        MissingStructureDescription, DelegateRequestFailed, ServiceImplementationError, BindingLanguageError,
    ]
    .into_iter()
    .find(|code| code.as_str() == name)
}

fn parse_tagged_message(message: &str) -> Error {
    if let Some((code_name, rest)) = message.split_once(": ") {
        if let Some(code) = code_from_str(code_name) {
            return Error::new(code, rest.to_string());
        }
    }
    Error::new(ErrorCode::ServiceImplementationError, message.to_string())
}

pub fn from_mlua(err: &mlua::Error) -> Error {
    match err {
        mlua::Error::SyntaxError { message, .. } => Error::new(ErrorCode::SyntaxError, message.clone()),
        mlua::Error::MemoryError(message) => Error::new(ErrorCode::NoMemError, message.clone()),
        mlua::Error::RuntimeError(message) => parse_tagged_message(message),
        // A callback's own error is already the most specific cause; unwrap
        // through the wrapper mlua adds rather than flattening to LogicError.
        mlua::Error::CallbackError { cause, .. } => from_mlua(cause),
        other => Error::new(ErrorCode::LogicError, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_a_tagged_runtime_error() {
        let err = from_mlua(&mlua::Error::RuntimeError("ValueUndefined: item missing".to_string()));
        assert_eq!(err.code, ErrorCode::ValueUndefined);
        assert_eq!(err.message, "item missing");
    }

    #[test]
    fn untagged_runtime_errors_become_service_implementation_errors() {
        let err = from_mlua(&mlua::Error::RuntimeError("boom".to_string()));
        assert_eq!(err.code, ErrorCode::ServiceImplementationError);
    }

    #[test]
    fn syntax_errors_map_directly() {
        let err = from_mlua(&mlua::Error::SyntaxError { message: "unexpected symbol".to_string(), incomplete_input: false });
        assert_eq!(err.code, ErrorCode::SyntaxError);
    }
}
