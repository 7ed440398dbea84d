//! Wires the non-scripted request path spec.md §4 describes end to end:
//! parse a document (D), feed it into a [`Request`] over a compiled
//! [`RequestAutomaton`] (F), execute the resulting schedule against a
//! [`RequestContext`] (H, via an embedder's [`HostMethodTable`]), and
//! render what survives (I). A scripted handler's own request path
//! (J, `ligature_scripting::LuaRequestHandler::run`) does not go through
//! this function -- it drives the same D/H/I pieces itself around its
//! Lua coroutine, and negotiates output independently.

use std::collections::HashMap;

use ligature_alloc::{Allocator, Encoding};
use ligature_automaton::{Request, RequestAutomaton};
use ligature_context::RequestContext;
use ligature_document::{ContentType, DocumentParser, EventKind};
use ligature_encoder::{encode, EncoderOptions, OutputFormat};
use ligature_errors::{Error, Result};
use ligature_executor::{execute_request, serialize_request_result, HostMethodTable};
use ligature_value::StructInterface;

/// The rendering choices a caller picks up front: what the input document's
/// encoding/content-type are (or `None` to sniff them), and the negotiated
/// output style -- the handful of `RequestAttributes` (spec.md §6) knobs
/// that decide response shape once content negotiation has already run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub input_encoding: Option<Encoding>,
    pub input_content_type: Option<ContentType>,
    pub output_format: OutputFormat,
    pub output_root_name: String,
    pub output_encoding: Encoding,
    pub beautify: bool,
    pub deterministic: bool,
    pub html_head: Option<String>,
}

impl PipelineOptions {
    pub fn new(output_format: OutputFormat, root_name: impl Into<String>) -> Self {
        PipelineOptions {
            input_encoding: None,
            input_content_type: None,
            output_format,
            output_root_name: root_name.into(),
            output_encoding: Encoding::Utf8,
            beautify: false,
            deterministic: false,
            html_head: None,
        }
    }
}

/// Attach the document position a parse-time failure was observed at, for
/// an error that does not already carry one of its own (execution-time
/// failures already tag themselves against the request's own event count).
fn tag_position(err: Error, parser: &DocumentParser<'_>) -> Error {
    if err.position.is_none() {
        err.at(parser.position() as u64)
    } else {
        err
    }
}

/// Drive one request end to end: parse `input` into events, feed them into
/// a fresh [`Request`] over `automaton`, execute its schedule against
/// `context` via `methods`, and encode whatever variables survive into
/// `opts.output_format`. `structs` names positional members for any
/// struct-tagged response block, passed straight through to
/// `ligature_encoder::encode`.
pub fn handle_request(
    automaton: &RequestAutomaton,
    context: &RequestContext,
    methods: &dyn HostMethodTable,
    input: &[u8],
    structs: &HashMap<u32, StructInterface>,
    opts: &PipelineOptions,
) -> Result<Vec<u8>> {
    let doc_alloc = Allocator::new();
    let mut parser = DocumentParser::new(&doc_alloc, input, opts.input_encoding, opts.input_content_type)?;

    let mut request = Request::new(automaton);
    loop {
        let (kind, value) = parser.next();
        if kind == EventKind::None {
            break;
        }
        request.feed(kind, value).map_err(|e| tag_position(e, &parser))?;
    }
    request.finish().map_err(|e| tag_position(e, &parser))?;

    execute_request(context, &request, methods)?;

    let result_alloc = Allocator::new();
    let ser = serialize_request_result(context, &result_alloc)?;

    let mut enc_opts = EncoderOptions::new(opts.output_format, opts.output_root_name.clone());
    enc_opts.encoding = opts.output_encoding;
    enc_opts.beautify = opts.beautify;
    enc_opts.deterministic = opts.deterministic;
    enc_opts.html_head = opts.html_head.clone();

    encode(ser, &result_alloc, structs, &enc_opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ligature_alloc::Allocator as DocAllocator;
    use ligature_automaton::{ClassId, ResolveType};
    use ligature_errors::ErrorCode;
    use ligature_executor::CallResult;
    use ligature_value::{HostObject, ValueVariant};

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

    fn doc_automaton() -> RequestAutomaton {
        let mut builder = RequestAutomaton::builder();
        builder.add_value("/Doc", "/Doc/n", 1).unwrap();
        builder.add_call("/Doc", ClassId(1), 0, None, "obj", 0).unwrap();
        let add_call = builder.add_call("/Doc", ClassId(1), 1, Some("obj"), "sum", 1).unwrap();
        builder.set_call_arg_item(add_call, 0, 1, ResolveType::Required, None).unwrap();
        builder.done().unwrap()
    }

    #[test]
    fn a_json_request_produces_a_json_response() {
        let automaton = doc_automaton();
        let context = RequestContext::new();
        let opts = PipelineOptions::new(OutputFormat::Json, "result");

        let body = handle_request(&automaton, &context, &Counter, br#"{"Doc":{"n":5}}"#, &HashMap::new(), &opts).unwrap();
        assert_eq!(String::from_utf8(body).unwrap(), r#"{"result":{"sum":5}}"#);
    }

    #[test]
    fn a_required_value_missing_from_the_document_is_reported_with_a_position() {
        let automaton = doc_automaton();
        let context = RequestContext::new();
        let opts = PipelineOptions::new(OutputFormat::Json, "result");

        let err = handle_request(&automaton, &context, &Counter, br#"{"Doc":{}}"#, &HashMap::new(), &opts).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValueUndefined);
        assert!(err.position.is_some());
    }

    #[test]
    fn a_malformed_document_is_tagged_with_its_own_fault_position() {
        let automaton = doc_automaton();
        let context = RequestContext::new();
        let opts = PipelineOptions::new(OutputFormat::Json, "result");

        let err = handle_request(&automaton, &context, &Counter, br#"{"Doc": {"#, &HashMap::new(), &opts).unwrap_err();
        assert!(err.position.is_some());
    }
}
