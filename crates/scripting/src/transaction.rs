//! `transaction(type, self)` / `counter(type)`: two of the scripted
//! handler's built-ins that defer to an embedder-supplied resource, the
//! same optional-hook pattern the original's `m_transactionHandler`
//! function-pointer table uses -- absent a hook, the call fails with
//! `NotImplemented` rather than silently no-opping.

use ligature_errors::{Error, ErrorCode, Result};

use crate::value_bridge::ScriptValue;

/// Host-provided transaction/counter resource a scripted handler may call
/// into. Both methods are optional in the sense that an embedder with
/// nothing to offer simply does not implement this trait at all (the
/// handler is built without one), producing `NotImplemented`.
pub trait TransactionHandler {
    /// Begin a `type`-named transaction seeded with `self_value`, returning
    /// an opaque transaction id the script can hold onto.
    fn create(&self, type_name: &str, self_value: &ScriptValue) -> Result<String>;

    /// Allocate the next value of a named counter (e.g. an id sequence).
    fn counter(&self, type_name: &str) -> Result<i64>;
}

pub fn not_implemented(what: &str) -> Error {
    Error::new(ErrorCode::NotImplemented, format!("no transaction handler is registered for '{what}'"))
}
