//! `ligature-coroutines`: the `Init -> Running -> WaitForDelegates ->
//! Running -> Done` state machine `ligature-scripting` drives around one
//! Lua request script's run (spec.md §4.J / §9). `mlua` itself provides the
//! Lua-side coroutine (via `Thread::resume`); this crate only tracks what
//! that coroutine is waiting on and what it produced.

pub mod delegate;
pub mod state;

pub use delegate::{DelegateRequest, DelegateStatus};
pub use state::{Coroutine, CoroutineState};
