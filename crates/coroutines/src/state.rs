//! `Coroutine`: the host-side bookkeeping around one Lua request script's
//! run, modeled as the explicit `Init -> Running -> WaitForDelegates ->
//! Running -> Done` state machine spec.md §9's design note recommends in
//! place of a first-class coroutine primitive at this layer. The actual
//! Lua-side suspension is `mlua`'s own coroutine; this type only tracks
//! which delegate requests a `yield` is waiting on and what the script
//! eventually produced.

use ligature_errors::constants::MAX_NOF_DELEGATES;
use ligature_errors::{Error, ErrorCode, Result};
use ligature_value::ValueVariant;

use crate::delegate::DelegateRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineState {
    Init,
    Running,
    WaitForDelegates,
    Done,
}

pub struct Coroutine<'a> {
    state: CoroutineState,
    delegates: Vec<DelegateRequest<'a>>,
    result: Option<ValueVariant<'a>>,
    error: Option<Error>,
}

impl<'a> Coroutine<'a> {
    pub fn new() -> Self {
        Coroutine { state: CoroutineState::Init, delegates: Vec::new(), result: None, error: None }
    }

    pub fn state(&self) -> CoroutineState {
        self.state
    }

    /// The script body starts executing.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            CoroutineState::Init => {
                self.state = CoroutineState::Running;
                Ok(())
            }
            _ => Err(Error::new(ErrorCode::ExecutionOrder, "coroutine already started")),
        }
    }

    /// `send(method, url, value)`: enqueue a delegate request without
    /// suspending. Returns its index, used later to query its result.
    pub fn enqueue_delegate(&mut self, request: DelegateRequest<'a>) -> Result<usize> {
        if self.state != CoroutineState::Running {
            return Err(Error::new(ErrorCode::ExecutionOrder, "send called outside a running coroutine"));
        }
        if self.delegates.len() >= MAX_NOF_DELEGATES {
            return Err(Error::new(
                ErrorCode::NofArgsError,
                format!("more than {MAX_NOF_DELEGATES} delegate requests enqueued"),
            ));
        }
        let idx = self.delegates.len();
        self.delegates.push(request);
        Ok(idx)
    }

    /// `yield()`: suspend until every delegate request enqueued so far is
    /// resolved. Yielding with nothing enqueued is a plain suspension the
    /// host may resume immediately.
    pub fn suspend(&mut self) -> Result<()> {
        match self.state {
            CoroutineState::Running => {
                self.state = CoroutineState::WaitForDelegates;
                Ok(())
            }
            _ => Err(Error::new(ErrorCode::ExecutionOrder, "yield outside a running coroutine")),
        }
    }

    pub fn nof_delegate_requests(&self) -> usize {
        self.delegates.len()
    }

    pub fn delegate_request(&self, idx: usize) -> Option<&DelegateRequest<'a>> {
        self.delegates.get(idx)
    }

    pub fn init_result(&mut self, idx: usize, value: ValueVariant<'a>) -> Result<()> {
        let delegate = self
            .delegates
            .get_mut(idx)
            .ok_or_else(|| Error::new(ErrorCode::OutOfRangeError, format!("no delegate request at index {idx}")))?;
        delegate.resolve_ok(value);
        Ok(())
    }

    pub fn init_error(&mut self, idx: usize, code: ErrorCode, message: impl Into<String>) -> Result<()> {
        let delegate = self
            .delegates
            .get_mut(idx)
            .ok_or_else(|| Error::new(ErrorCode::OutOfRangeError, format!("no delegate request at index {idx}")))?;
        delegate.resolve_err(Error::new(code, message));
        Ok(())
    }

    pub fn all_delegates_resolved(&self) -> bool {
        self.delegates.iter().all(DelegateRequest::is_resolved)
    }

    /// Resume the script once every delegate request it is waiting on has
    /// been answered.
    pub fn resume(&mut self) -> Result<()> {
        match self.state {
            CoroutineState::WaitForDelegates if self.all_delegates_resolved() => {
                self.state = CoroutineState::Running;
                Ok(())
            }
            CoroutineState::WaitForDelegates => {
                Err(Error::new(ErrorCode::DelegateRequestFailed, "not every delegate request is resolved yet"))
            }
            _ => Err(Error::new(ErrorCode::ExecutionOrder, "resume called outside WaitForDelegates")),
        }
    }

    pub fn finish(&mut self, result: ValueVariant<'a>) -> Result<()> {
        match self.state {
            CoroutineState::Running => {
                self.result = Some(result);
                self.state = CoroutineState::Done;
                Ok(())
            }
            _ => Err(Error::new(ErrorCode::ExecutionOrder, "finish called outside a running coroutine")),
        }
    }

    /// The script's `error`/panic path, or any host-observed failure, ends
    /// the coroutine regardless of which state it was in.
    pub fn fail(&mut self, error: Error) {
        self.error = Some(error);
        self.state = CoroutineState::Done;
    }

    pub fn is_done(&self) -> bool {
        self.state == CoroutineState::Done
    }

    /// Consume the finished coroutine, yielding its result or the error
    /// that ended it. Panics if called before [`Self::is_done`].
    pub fn take_result(self) -> Result<ValueVariant<'a>> {
        debug_assert!(self.is_done(), "take_result called before the coroutine finished");
        match self.error {
            Some(e) => Err(e),
            None => self.result.ok_or_else(|| Error::new(ErrorCode::LogicError, "coroutine finished without a result")),
        }
    }
}

impl Default for Coroutine<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::DelegateRequest;

    #[test]
    fn starts_in_init_and_moves_to_running() {
        let mut co = Coroutine::new();
        assert_eq!(co.state(), CoroutineState::Init);
        co.start().unwrap();
        assert_eq!(co.state(), CoroutineState::Running);
    }

    #[test]
    fn yield_waits_until_every_delegate_resolves() {
        let mut co = Coroutine::new();
        co.start().unwrap();
        co.enqueue_delegate(DelegateRequest::new("GET", "/a", ValueVariant::Void)).unwrap();
        co.enqueue_delegate(DelegateRequest::new("GET", "/b", ValueVariant::Void)).unwrap();
        co.suspend().unwrap();
        assert_eq!(co.state(), CoroutineState::WaitForDelegates);

        assert!(co.resume().is_err());
        co.init_result(0, ValueVariant::Int(1)).unwrap();
        assert!(co.resume().is_err());
        co.init_result(1, ValueVariant::Int(2)).unwrap();
        co.resume().unwrap();
        assert_eq!(co.state(), CoroutineState::Running);
    }

    #[test]
    fn enqueue_delegate_caps_at_the_configured_limit() {
        let mut co = Coroutine::new();
        co.start().unwrap();
        for _ in 0..ligature_errors::constants::MAX_NOF_DELEGATES {
            co.enqueue_delegate(DelegateRequest::new("GET", "/x", ValueVariant::Void)).unwrap();
        }
        let err = co.enqueue_delegate(DelegateRequest::new("GET", "/over", ValueVariant::Void)).unwrap_err();
        assert_eq!(err.code, ErrorCode::NofArgsError);
    }

    #[test]
    fn finish_then_take_result_round_trips() {
        let mut co = Coroutine::new();
        co.start().unwrap();
        co.finish(ValueVariant::Int(42)).unwrap();
        assert!(co.is_done());
        assert_eq!(co.take_result().unwrap().toint().unwrap(), 42);
    }

    #[test]
    fn fail_ends_the_coroutine_from_any_state() {
        let mut co = Coroutine::new();
        co.fail(Error::new(ErrorCode::ServiceImplementationError, "boom"));
        assert!(co.is_done());
        assert_eq!(co.take_result().unwrap_err().code, ErrorCode::ServiceImplementationError);
    }
}
