//! `ligature-executor`: drives one compiled [`Request`]'s schedule, per
//! spec.md §4.H. For each scheduled call this resolves its arguments
//! (`args`), dispatches to the embedder's [`HostMethodTable`], marshals the
//! result, and assigns (or appends) it into the request's [`RequestContext`];
//! [`serialize_request_result`] then collects what survives into the
//! response structure.

pub mod args;
pub mod method;
pub mod result;

pub use method::{CallResult, HostMethodTable};
pub use result::serialize_request_result;

use ligature_alloc::Allocator;
use ligature_automaton::Request;
use ligature_context::RequestContext;
use ligature_errors::constants::MAX_NOF_RETURNS;
use ligature_errors::{Error, ErrorCode, Result};
use ligature_value::{HostObject, Serialization, ValueVariant};

/// Marshal a call's up-to-`MAX_NOF_RETURNS` return values into one
/// `ValueVariant`, per spec.md §4.H step 4.
fn marshal_result<'call>(result: CallResult<'call>, alloc: &'call Allocator) -> Result<ValueVariant<'call>> {
    if result.0.len() > MAX_NOF_RETURNS {
        return Err(Error::new(
            ErrorCode::NofArgsError,
            format!("call produced {} return values, more than the {MAX_NOF_RETURNS} limit", result.0.len()),
        ));
    }
    let mut values = result.0;
    match values.len() {
        0 => Ok(ValueVariant::Void),
        1 => Ok(values.pop().unwrap()),
        _ => {
            let ser = alloc.retain(Serialization::new());
            for v in values {
                ser.push_value(v);
            }
            Ok(ValueVariant::Serialization(ser))
        }
    }
}

/// Resolve the `selfVar` of a method call (spec.md §4.H step 2): a
/// constructor (`funcid == 0`) always invokes with no self object; any
/// other call requires a context variable bound to a `HostObject` of the
/// declared class.
fn resolve_self(
    call: &ligature_automaton::CallDef,
    context: &RequestContext,
    scope_from: u64,
) -> Result<Option<HostObject>> {
    if call.is_constructor() {
        return Ok(None);
    }
    let name = call
        .self_var
        .as_deref()
        .ok_or_else(|| Error::new(ErrorCode::MissingSelf, "method call declares no self variable").at(scope_from))?;
    let var = context
        .get_variable(name)
        .ok_or_else(|| Error::new(ErrorCode::MissingSelf, format!("self variable '{name}' is not defined")).at(scope_from))?;
    match var {
        ValueVariant::HostObject(ho) if ho.class_id() == call.classid => Ok(Some(ho.clone())),
        ValueVariant::HostObject(_) => {
            Err(Error::new(ErrorCode::TypeError, format!("self variable '{name}' is bound to the wrong class")).at(scope_from))
        }
        _ => Err(Error::new(ErrorCode::TypeError, format!("self variable '{name}' is not a host object")).at(scope_from)),
    }
}

/// Drive `request`'s schedule to completion against `context`, dispatching
/// every call through `methods`. Execution stops at the first failing
/// call, as spec.md §4.H describes; everything committed to `context` by
/// earlier calls in the schedule remains.
pub fn execute_request(context: &RequestContext, request: &Request<'_>, methods: &dyn HostMethodTable) -> Result<()> {
    let schedule = request.schedule()?;
    for scheduled in schedule {
        let call = request
            .automaton()
            .call_def(scheduled.call_index)
            .ok_or_else(|| Error::new(ErrorCode::LogicError, "scheduled call index out of range"))?;

        let call_alloc = Allocator::new();
        let call_args = args::resolve_call_args(call, scheduled.scope, request, context, &call_alloc)
            .map_err(|e| if e.position.is_none() { e.at(scheduled.scope.to) } else { e })?;
        let self_obj = resolve_self(call, context, scheduled.scope.from)?;

        let class_name = request.automaton().classes.name_of(call.classid).unwrap_or("?");
        tracing::debug!(class = class_name, funcid = call.funcid, result_var = %call.result_var, "invoking request call");

        let result = methods
            .invoke(call.classid, call.funcid, self_obj.as_ref(), &call_args, &call_alloc)
            .map_err(|e| if e.position.is_none() { e.at(scheduled.scope.from) } else { e })?;

        let value = marshal_result(result, &call_alloc)?;
        if call.append {
            context.append_to_serialization(&call.result_var, &value)?;
        } else {
            context.define_variable(&call.result_var, &value)?;
        }

        tracing::debug!(result_var = %call.result_var, append = call.append, "committed request call result");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ligature_alloc::Allocator as DocAllocator;
    use ligature_automaton::{ClassId, RequestAutomaton, ResolveType};
    use ligature_document::{DocumentParser, EventKind};

    struct Counter;
    impl HostMethodTable for Counter {
        fn invoke<'call>(
            &self,
            _classid: ClassId,
            funcid: u32,
            self_obj: Option<&HostObject>,
            args: &[ValueVariant<'call>],
            _alloc: &'call Allocator,
        ) -> Result<CallResult<'call>> {
            match funcid {
                0 => Ok(CallResult::one(ValueVariant::HostObject(HostObject::new(ClassId(1), 0i64)))),
                1 => {
                    let obj = self_obj.expect("method call always carries self");
                    let n = *obj.downcast_ref::<i64>().unwrap();
                    let add = args[0].toint().unwrap_or(0);
                    Ok(CallResult::one(ValueVariant::Int(n + add)))
                }
                _ => Err(Error::new(ErrorCode::NotImplemented, "no such function")),
            }
        }
    }

    fn drive<'a>(automaton: &'a RequestAutomaton, alloc: &'a DocAllocator, json: &'static [u8]) -> Request<'a> {
        let mut parser = DocumentParser::new(alloc, json, None, None).unwrap();
        let mut request = Request::new(automaton);
        loop {
            let (kind, value) = parser.next();
            if kind == EventKind::None {
                break;
            }
            request.feed(kind, value).unwrap();
        }
        request.finish().unwrap();
        request
    }

    #[test]
    fn constructor_then_method_commits_into_the_context() {
        let mut builder = RequestAutomaton::builder();
        builder.add_value("/Doc", "/Doc/n", 1).unwrap();
        builder.add_call("/Doc", ClassId(1), 0, None, "obj", 0).unwrap();
        let add_call = builder.add_call("/Doc", ClassId(1), 1, Some("obj"), "result", 1).unwrap();
        builder.set_call_arg_item(add_call, 0, 1, ResolveType::Required, None).unwrap();
        let automaton = builder.done().unwrap();

        let alloc = DocAllocator::new();
        let request = drive(&automaton, &alloc, br#"{"Doc":{"n":5}}"#);
        let context = RequestContext::new();

        execute_request(&context, &request, &Counter).unwrap();

        assert_eq!(context.get_variable("result").unwrap().toint().unwrap(), 5);
    }

    #[test]
    fn missing_self_is_reported_and_stops_execution() {
        let mut builder = RequestAutomaton::builder();
        builder.add_call("/Doc", ClassId(1), 1, Some("missing"), "result", 0).unwrap();
        let automaton = builder.done().unwrap();

        let alloc = DocAllocator::new();
        let request = drive(&automaton, &alloc, br#"{"Doc":{}}"#);
        let context = RequestContext::new();

        let err = execute_request(&context, &request, &Counter).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingSelf);
    }
}
