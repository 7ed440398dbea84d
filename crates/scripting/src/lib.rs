//! `ligature-scripting`: the embedded scripted request handler spec.md
//! §4.J describes. A [`LuaRequestHandler`] compiles one Lua source once
//! (per service object) and records the sorted list of uppercase-named
//! functions it exposes; [`LuaRequestHandler::run`] then drives one request
//! through a fresh `mlua::Lua` state per spec.md §4.J's "fresh Lua state
//! created at request time", resuming the script's own Lua-level coroutine
//! across `yield` calls until it returns a final result.

pub mod builtins;
pub mod error;
pub mod negotiation;
pub mod result;
pub mod slab;
pub mod transaction;
pub mod value_bridge;

use std::sync::{Arc, Mutex};

use mlua::{IntoLuaMulti, Lua, ThreadStatus, Value as LuaValue};

use ligature_coroutines::CoroutineState;
use ligature_errors::{Error, ErrorCode, Result};
use ligature_schema::SchemaMap;

pub use builtins::{PendingDelegate, RuntimeState};
pub use negotiation::{
    doctype_from_name, encoding_from_name, parse_http_accept, ContentNegotiation, DoctypeSet, Negotiated,
    RequestAttributes,
};
pub use result::{RenderOptions, ScriptResult};
pub use slab::{SizeClass, SlabStats};
pub use transaction::TransactionHandler;
pub use value_bridge::ScriptValue;

/// One outbound call a script enqueued with `send(method, url, value)`, and
/// the embedder's job at a `yield` boundary: answer every pending delegate
/// request by index, in the order they were enqueued (spec.md §5's ordering
/// guarantee).
pub trait DelegatePerformer {
    fn perform(&mut self, method: &str, url: &str, content: &ScriptValue) -> std::result::Result<ScriptValue, Error>;
}

/// A `DelegatePerformer` built from a plain closure, for callers who would
/// rather not name a type.
impl<F> DelegatePerformer for F
where
    F: FnMut(&str, &str, &ScriptValue) -> std::result::Result<ScriptValue, Error>,
{
    fn perform(&mut self, method: &str, url: &str, content: &ScriptValue) -> std::result::Result<ScriptValue, Error> {
        self(method, url, content)
    }
}

/// A compiled scripted request handler: the Lua source, its exposed
/// (uppercase, REST-ish) method names, and the fixed per-service
/// configuration every request it serves shares.
pub struct LuaRequestHandler {
    source: String,
    methods: Vec<String>,
    attrs: Arc<RequestAttributes>,
    schemas: Option<Arc<SchemaMap>>,
    transactions: Option<Arc<dyn TransactionHandler + Send + Sync>>,
}

/// The outcome of one full `run`: the rendered response body plus the
/// negotiated content type it was rendered in, so an embedder can set a
/// response header from it.
pub struct HandlerOutcome {
    pub body: Vec<u8>,
    pub negotiated: Negotiated,
    pub logs: Vec<(tracing::Level, String, String)>,
}

impl LuaRequestHandler {
    /// Compile `source` once, validating its syntax and extracting its
    /// exposed method list: every global bound to a function whose name is
    /// all uppercase letters/underscores, sorted, per spec.md §4.J.
    pub fn compile(source: &str, attrs: RequestAttributes) -> Result<Self> {
        let lua = Lua::new();
        lua.load(source).exec().map_err(|e| error::from_mlua(&e))?;

        let mut methods = Vec::new();
        for pair in lua.globals().pairs::<String, LuaValue>() {
            let (name, value) = pair.map_err(|e| error::from_mlua(&e))?;
            if !name.is_empty()
                && name.chars().all(|c| c.is_ascii_uppercase() || c == '_')
                && matches!(value, LuaValue::Function(_))
            {
                methods.push(name);
            }
        }
        methods.sort();

        Ok(LuaRequestHandler { source: source.to_string(), methods, attrs: Arc::new(attrs), schemas: None, transactions: None })
    }

    pub fn with_schemas(mut self, schemas: SchemaMap) -> Self {
        self.schemas = Some(Arc::new(schemas));
        self
    }

    pub fn with_transaction_handler(mut self, handler: Arc<dyn TransactionHandler + Send + Sync>) -> Self {
        self.transactions = Some(handler);
        self
    }

    /// The sorted, uppercase-named methods this script exposes.
    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    /// Run `method` against `content`/`path`/`context_name`, per spec.md
    /// §4.J's yield/resume cycle: the script runs on a Lua coroutine;
    /// `send` enqueues without suspending, `yield` suspends until
    /// `delegates` has answered every request enqueued so far.
    ///
    /// `delegates` stands in for "the host observes `nof_DelegateRequests`,
    /// performs them, then resumes" -- every pending delegate is answered
    /// synchronously, in enqueue order, each time the script yields.
    pub fn run(
        &self,
        method: &str,
        content: &str,
        path: &str,
        context_name: &str,
        delegates: &mut dyn DelegatePerformer,
    ) -> Result<HandlerOutcome> {
        if !self.methods.iter().any(|m| m == method) {
            return Err(Error::new(ErrorCode::AddressedItemNotFound, format!("script exposes no method '{method}'")));
        }

        let lua = Lua::new();
        let state = Arc::new(Mutex::new(RuntimeState::default()));
        builtins::register(&lua, Arc::clone(&state), Arc::clone(&self.attrs), self.schemas.clone(), self.transactions.clone())
            .map_err(|e| error::from_mlua(&e))?;
        lua.load(&self.source).exec().map_err(|e| error::from_mlua(&e))?;

        let func: mlua::Function = lua
            .globals()
            .get(method)
            .map_err(|e| error::from_mlua(&e))?;
        let thread = lua.create_thread(func).map_err(|e| error::from_mlua(&e))?;

        let mut coroutine_state = CoroutineState::Running;
        let mut resume_args: mlua::MultiValue =
            (content.to_string(), path.to_string(), context_name.to_string()).into_lua_multi(&lua).map_err(|e| error::from_mlua(&e))?;

        let final_value: LuaValue = loop {
            let step: mlua::MultiValue = thread.resume(resume_args).map_err(|e| error::from_mlua(&e))?;

            match thread.status() {
                ThreadStatus::Resumable => {
                    // The script called `yield()`; answer every delegate
                    // request enqueued (but not yet answered) so far.
                    coroutine_state = CoroutineState::WaitForDelegates;
                    tracing::debug!(?coroutine_state, "script yielded, resolving pending delegates");
                    let pending: Vec<(usize, String, String, ScriptValue)> = {
                        let st = state.lock().expect("runtime state mutex poisoned");
                        st.pending
                            .iter()
                            .enumerate()
                            .filter(|(idx, _)| st.results.get(*idx).map(Option::is_none).unwrap_or(true))
                            .map(|(idx, d)| (idx, d.method.clone(), d.url.clone(), d.content.clone()))
                            .collect()
                    };
                    for (idx, dmethod, durl, dcontent) in pending {
                        let outcome = delegates.perform(&dmethod, &durl, &dcontent);
                        let mut st = state.lock().expect("runtime state mutex poisoned");
                        st.results[idx] = Some(outcome);
                    }
                    coroutine_state = CoroutineState::Running;
                    resume_args = mlua::MultiValue::new();
                }
                // A dead thread that did not error: the script returned.
                ThreadStatus::Unresumable => {
                    coroutine_state = CoroutineState::Done;
                    break step.into_iter().next().unwrap_or(LuaValue::Nil);
                }
                ThreadStatus::Error => {
                    // `thread.resume` above already returned the `mlua::Error`
                    // on this path; reaching here only happens if a script
                    // error was swallowed by a pcall and the thread was left
                    // dead without a final value.
                    return Err(Error::new(ErrorCode::ServiceImplementationError, "script thread ended in an error state"));
                }
                ThreadStatus::Running => {
                    return Err(Error::new(ErrorCode::LogicError, "script thread unexpectedly still running"));
                }
            }
        };
        tracing::debug!(?coroutine_state, "script run finished");

        let result = match &final_value {
            LuaValue::String(s) => ScriptResult::Raw(s.to_str().map_err(|e| error::from_mlua(&e))?.to_string()),
            other => ScriptResult::Value(value_bridge::from_lua(other)?),
        };

        let (logs, negotiated) = {
            let st = state.lock().expect("runtime state mutex poisoned");
            (st.logs.clone(), st.negotiation.resolve(&self.attrs))
        };

        let opts = RenderOptions {
            format: negotiated.format,
            encoding: negotiated.encoding,
            beautify: self.attrs.beautified_output,
            deterministic: self.attrs.deterministic_output,
            html_head: self.attrs.html_head.clone(),
        };
        let body = result::render(result, &opts)?;

        Ok(HandlerOutcome { body, negotiated, logs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;
    impl DelegatePerformer for Echo {
        fn perform(&mut self, method: &str, url: &str, _content: &ScriptValue) -> std::result::Result<ScriptValue, Error> {
            assert_eq!(method, "GET");
            assert_eq!(url, "/sub");
            Ok(ScriptValue::struct1("v", ScriptValue::Int(7)))
        }
    }

    struct NoDelegates;
    impl DelegatePerformer for NoDelegates {
        fn perform(&mut self, _method: &str, _url: &str, _content: &ScriptValue) -> std::result::Result<ScriptValue, Error> {
            panic!("no delegate expected")
        }
    }

    #[test]
    fn exposes_sorted_uppercase_methods_only() {
        let src = r#"
            function GET(content, path, ctx) return "ok" end
            function post(content, path, ctx) return "ignored: lowercase" end
            local x = 1
        "#;
        let handler = LuaRequestHandler::compile(src, RequestAttributes::new()).unwrap();
        assert_eq!(handler.methods(), &["GET".to_string()]);
    }

    #[test]
    fn a_plain_string_result_is_used_verbatim() {
        let src = r#"function GET(content, path, ctx) return "hello" end"#;
        let handler = LuaRequestHandler::compile(src, RequestAttributes::new()).unwrap();
        let outcome = handler.run("GET", "", "/", "ctx", &mut NoDelegates).unwrap();
        assert_eq!(String::from_utf8(outcome.body).unwrap(), "hello");
    }

    #[test]
    fn a_single_key_table_names_the_response_root() {
        let src = r#"function GET(content, path, ctx) return {root = {v = 7}} end"#;
        let handler = LuaRequestHandler::compile(src, RequestAttributes::new().with_accept_header("application/json")).unwrap();
        let outcome = handler.run("GET", "", "/", "ctx", &mut NoDelegates).unwrap();
        assert_eq!(String::from_utf8(outcome.body).unwrap(), r#"{"root":{"v":7}}"#);
    }

    #[test]
    fn send_then_yield_resumes_with_the_delegate_result() {
        // spec.md §8 scenario 5: a script calls send, yields, the host
        // supplies the delegate result, and the script resumes and returns
        // a table built from it.
        let src = r#"
            function GET(content, path, ctx)
                local req = send("GET", "/sub", {})
                yield()
                return {root = {v = req.result.v}}
            end
        "#;
        let handler = LuaRequestHandler::compile(src, RequestAttributes::new()).unwrap();
        let outcome = handler.run("GET", "", "/", "ctx", &mut Echo).unwrap();
        assert_eq!(String::from_utf8(outcome.body).unwrap(), r#"{"root":{"v":7}}"#);
    }

    #[test]
    fn running_an_unexposed_method_is_rejected() {
        let src = r#"function GET(content, path, ctx) return "ok" end"#;
        let handler = LuaRequestHandler::compile(src, RequestAttributes::new()).unwrap();
        let err = handler.run("DELETE", "", "/", "ctx", &mut NoDelegates).unwrap_err();
        assert_eq!(err.code, ErrorCode::AddressedItemNotFound);
    }

    #[test]
    fn http_error_builtin_maps_back_to_its_named_code() {
        let src = r#"function GET(content, path, ctx) http_error("ValueUndefined", "missing field") end"#;
        let handler = LuaRequestHandler::compile(src, RequestAttributes::new()).unwrap();
        let err = handler.run("GET", "", "/", "ctx", &mut NoDelegates).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValueUndefined);
    }
}
