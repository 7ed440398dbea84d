//! `HostMethodTable`: the embedder-implemented dispatch surface the
//! Executor calls into for every scheduled `CallDef`. Spec.md §1 describes
//! "host objects implemented in a systems language" invoked across an FFI
//! boundary; this Rust rendition has no ABI of its own to cross, so the
//! boundary becomes a plain trait object the embedding application
//! implements.

use ligature_alloc::Allocator;
use ligature_errors::Result;
use ligature_value::{ClassId, HostObject, ValueVariant};

/// Up to `MAX_NOF_RETURNS` values a method call produced, marshaled by
/// [`crate::execute_request`] into the call's `resultVar` (spec.md §4.H).
pub struct CallResult<'a>(pub Vec<ValueVariant<'a>>);

impl<'a> CallResult<'a> {
    pub fn void() -> Self {
        CallResult(Vec::new())
    }

    pub fn one(value: ValueVariant<'a>) -> Self {
        CallResult(vec![value])
    }
}

/// Dispatches one `(classid, funcid)` call. `funcid == 0` is the
/// constructor convention [`ligature_automaton::CallDef::is_constructor`]
/// names: `self_obj` is always `None` for a constructor invocation and
/// always `Some` otherwise. `alloc` is the call's fresh scratch allocator
/// (spec.md §4.H step 1); a returned value may simply borrow from it, since
/// it only needs to live until the executor has deep-copied the result into
/// the context.
pub trait HostMethodTable {
    fn invoke<'call>(
        &self,
        classid: ClassId,
        funcid: u32,
        self_obj: Option<&HostObject>,
        args: &[ValueVariant<'call>],
        alloc: &'call Allocator,
    ) -> Result<CallResult<'call>>;
}
