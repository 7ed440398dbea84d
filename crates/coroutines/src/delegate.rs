//! `DelegateRequest`: one outgoing sub-request a script enqueues with
//! `send(method, url, value)`, mirroring `papuga_DelegateRequest`. The host
//! supplies its outcome via [`crate::Coroutine::init_result`] /
//! [`crate::Coroutine::init_error`] before resuming the coroutine.

use ligature_errors::Error;
use ligature_value::ValueVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegateStatus {
    Pending,
    Ok,
    Failed,
}

pub struct DelegateRequest<'a> {
    pub method: String,
    pub url: String,
    pub content: ValueVariant<'a>,
    result: Option<Result<ValueVariant<'a>, Error>>,
}

impl<'a> DelegateRequest<'a> {
    pub fn new(method: impl Into<String>, url: impl Into<String>, content: ValueVariant<'a>) -> Self {
        DelegateRequest { method: method.into(), url: url.into(), content, result: None }
    }

    pub fn status(&self) -> DelegateStatus {
        match &self.result {
            None => DelegateStatus::Pending,
            Some(Ok(_)) => DelegateStatus::Ok,
            Some(Err(_)) => DelegateStatus::Failed,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.result.is_some()
    }

    pub fn resolve_ok(&mut self, value: ValueVariant<'a>) {
        self.result = Some(Ok(value));
    }

    pub fn resolve_err(&mut self, error: Error) {
        self.result = Some(Err(error));
    }

    pub fn result(&self) -> Option<&Result<ValueVariant<'a>, Error>> {
        self.result.as_ref()
    }
}
