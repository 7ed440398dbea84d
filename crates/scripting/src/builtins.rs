//! Registers the scripted handler's global built-ins (spec.md §4.J): all of
//! them close over an [`Arc<Mutex<RuntimeState>>`] rather than the request's
//! own `Allocator`/`ValueVariant`s, since `mlua`'s `send` feature requires
//! every registered function to be `'static + Send` and those types are
//! not (see `value_bridge`'s module doc). Per-call use of `ValueVariant`
//! or an `Allocator` (in `schema`, for instance) stays entirely local to
//! one closure invocation and never crosses that boundary.

use std::sync::{Arc, Mutex};

use mlua::{Lua, Table, Value as LuaValue};

use ligature_alloc::Encoding;
use ligature_alloc::Allocator as ArenaAllocator;
use ligature_document::sniff;
use ligature_errors::{constants::MAX_NOF_DELEGATES, Error, ErrorCode};
use ligature_schema::SchemaMap;

use crate::negotiation::{doctype_from_name, encoding_from_name, ContentNegotiation, RequestAttributes};
use crate::result::render_tree;
use crate::slab::SlabStats;
use crate::transaction::{not_implemented, TransactionHandler};
use crate::value_bridge::{from_lua, to_lua, ScriptValue};

/// One `send(method, url, value)` call the script has not yet received an
/// answer for.
#[derive(Debug, Clone)]
pub struct PendingDelegate {
    pub method: String,
    pub url: String,
    pub content: ScriptValue,
}

/// Cross-call state every builtin closure shares, guarded by a `Mutex` so
/// the registered functions satisfy `mlua`'s `Send` bound.
#[derive(Default)]
pub struct RuntimeState {
    pub negotiation: ContentNegotiation,
    pub pending: Vec<PendingDelegate>,
    pub results: Vec<Option<std::result::Result<ScriptValue, Error>>>,
    pub slab: SlabStats,
    pub logs: Vec<(tracing::Level, String, String)>,
}

fn runtime_error(err: Error) -> mlua::Error {
    mlua::Error::RuntimeError(err.to_string())
}

fn sniff_content_type(bytes: &[u8]) -> Option<ligature_document::ContentType> {
    match sniff::guess_content_type(bytes) {
        ligature_document::ContentType::Unknown => None,
        other => Some(other),
    }
}

fn content_type_name(ct: ligature_document::ContentType) -> &'static str {
    match ct {
        ligature_document::ContentType::Xml => "xml",
        ligature_document::ContentType::Json => "json",
        ligature_document::ContentType::Unknown => "unknown",
    }
}

fn output_format_of(ct: ligature_document::ContentType) -> Option<ligature_encoder::OutputFormat> {
    match ct {
        ligature_document::ContentType::Xml => Some(ligature_encoder::OutputFormat::Xml),
        ligature_document::ContentType::Json => Some(ligature_encoder::OutputFormat::Json),
        ligature_document::ContentType::Unknown => None,
    }
}

/// Build the Lua "request object" `send` returns: a table whose `result`
/// and `status` fields are computed on demand from the shared state, since
/// neither is known until the host resolves the delegate and resumes the
/// script.
fn make_delegate_handle(lua: &Lua, state: Arc<Mutex<RuntimeState>>, idx: usize) -> mlua::Result<Table> {
    let handle = lua.create_table()?;
    handle.set("index", idx as i64)?;
    let meta = lua.create_table()?;
    let index_fn = lua.create_function(move |lua, (_table, key): (Table, String)| match key.as_str() {
        "result" => {
            let st = state.lock().expect("runtime state mutex poisoned");
            match st.results.get(idx).and_then(|r| r.as_ref()) {
                Some(Ok(v)) => to_lua(lua, v),
                Some(Err(e)) => Err(runtime_error(e.clone())),
                None => Ok(LuaValue::Nil),
            }
        }
        "status" => {
            let st = state.lock().expect("runtime state mutex poisoned");
            let status = match st.results.get(idx) {
                Some(Some(Ok(_))) => "ok",
                Some(Some(Err(_))) => "failed",
                _ => "pending",
            };
            Ok(LuaValue::String(lua.create_string(status)?))
        }
        _ => Ok(LuaValue::Nil),
    })?;
    meta.set("__index", index_fn)?;
    handle.set_metatable(Some(meta));
    Ok(handle)
}

/// Register every global the scripted handler exposes, per spec.md §4.J.
/// `transactions` is the optional embedder hook `transaction`/`counter`
/// defer to; without one, both builtins fail with `NotImplemented`.
pub fn register(
    lua: &Lua,
    state: Arc<Mutex<RuntimeState>>,
    attrs: Arc<RequestAttributes>,
    schemas: Option<Arc<SchemaMap>>,
    transactions: Option<Arc<dyn TransactionHandler + Send + Sync>>,
) -> mlua::Result<()> {
    let globals = lua.globals();

    globals.set(
        "http_error",
        lua.create_function(|_, (code, message): (String, String)| -> mlua::Result<()> {
            Err(mlua::Error::RuntimeError(format!("{code}: {message}")))
        })?,
    )?;

    // `yield` must be a genuine Lua-level yield so the embedding coroutine
    // suspends; a Rust callback cannot suspend the VM on its own, so this
    // is plain Lua glue rather than a registered function.
    lua.load("function yield(...) return coroutine.yield(...) end").exec()?;

    {
        let state = Arc::clone(&state);
        globals.set(
            "send",
            lua.create_function(move |lua, (method, url, value): (String, String, LuaValue)| {
                let content = from_lua(&value).map_err(runtime_error)?;
                let idx = {
                    let mut st = state.lock().expect("runtime state mutex poisoned");
                    if st.pending.len() >= MAX_NOF_DELEGATES {
                        return Err(runtime_error(Error::new(
                            ErrorCode::NofArgsError,
                            format!("more than {MAX_NOF_DELEGATES} delegate requests enqueued"),
                        )));
                    }
                    st.pending.push(PendingDelegate { method, url, content });
                    st.results.push(None);
                    st.pending.len() - 1
                };
                make_delegate_handle(lua, Arc::clone(&state), idx)
            })?,
        )?;
    }

    globals.set(
        "document",
        lua.create_function(move |lua, (doctype_name, encoding_name, value): (String, String, LuaValue)| {
            let format = doctype_from_name(&doctype_name)
                .ok_or_else(|| runtime_error(Error::new(ErrorCode::UnknownContentType, format!("unknown doctype '{doctype_name}'"))))?;
            let encoding = encoding_from_name(&encoding_name)
                .ok_or_else(|| runtime_error(Error::new(ErrorCode::EncodingError, format!("unknown encoding '{encoding_name}'"))))?;
            let node = from_lua(&value).map_err(runtime_error)?.into_enc_node();
            let rendered = render_tree(&node, format, None, encoding, false, None);
            let bytes = ligature_value::transcode::tostring_enc(rendered.as_bytes(), Encoding::Utf8, encoding).map_err(runtime_error)?;
            lua.create_string(&bytes).map(LuaValue::String)
        })?,
    )?;

    {
        let state = Arc::clone(&state);
        globals.set(
            "log",
            lua.create_function(move |_, (level, tag, value): (String, String, LuaValue)| {
                let rendered = match &value {
                    LuaValue::String(s) => s.to_str().map(|s| s.to_string()).unwrap_or_default(),
                    other => from_lua(other).map(|v| format!("{v:?}")).unwrap_or_default(),
                };
                let parsed_level = match level.to_ascii_lowercase().as_str() {
                    "error" => tracing::Level::ERROR,
                    "warn" | "warning" => tracing::Level::WARN,
                    "info" => tracing::Level::INFO,
                    "debug" => tracing::Level::DEBUG,
                    _ => tracing::Level::TRACE,
                };
                tracing::event!(tracing::Level::INFO, level = %level, tag = %tag, message = %rendered, "script log");
                state.lock().expect("runtime state mutex poisoned").logs.push((parsed_level, tag, rendered));
                Ok(())
            })?,
        )?;
    }

    {
        let transactions = transactions.clone();
        globals.set(
            "transaction",
            lua.create_function(move |_, (type_name, self_value): (String, LuaValue)| {
                let handler = transactions.as_ref().ok_or_else(|| runtime_error(not_implemented("transaction")))?;
                let self_value = from_lua(&self_value).map_err(runtime_error)?;
                handler.create(&type_name, &self_value).map_err(runtime_error)
            })?,
        )?;
    }

    {
        let transactions = transactions.clone();
        globals.set(
            "counter",
            lua.create_function(move |_, type_name: String| {
                let handler = transactions.as_ref().ok_or_else(|| runtime_error(not_implemented("counter")))?;
                handler.counter(&type_name).map_err(runtime_error)
            })?,
        )?;
    }

    {
        let base = attrs.html_base_href.clone();
        globals.set(
            "link",
            lua.create_function(move |_, path: String| Ok(format!("{}/{}", base.as_deref().unwrap_or(""), path.trim_start_matches('/'))))?,
        )?;
    }

    {
        let attrs = Arc::clone(&attrs);
        globals.set(
            "http_accept",
            lua.create_function(move |lua, ()| {
                let table = lua.create_table()?;
                let mut i = 1;
                for format in [
                    ligature_encoder::OutputFormat::Xml,
                    ligature_encoder::OutputFormat::Json,
                    ligature_encoder::OutputFormat::Html5,
                    ligature_encoder::OutputFormat::Text,
                ] {
                    if attrs.accepted_doctype_set.contains(format) {
                        table.set(i, format!("{format:?}").to_ascii_lowercase())?;
                        i += 1;
                    }
                }
                Ok(table)
            })?,
        )?;
    }

    globals.set(
        "doctype",
        lua.create_function(|_, raw: mlua::String| {
            let bytes = raw.as_bytes();
            match sniff_content_type(&bytes) {
                Some(ct) => Ok(Some(content_type_name(ct).to_string())),
                None => Ok(None),
            }
        })?,
    )?;

    globals.set(
        "encoding",
        lua.create_function(|_, raw: mlua::String| {
            let bytes = raw.as_bytes();
            let encoding = sniff::guess_string_encoding(&bytes);
            if encoding == Encoding::Binary {
                Ok(None)
            } else {
                Ok(Some(encoding.canonical_name().to_string()))
            }
        })?,
    )?;

    {
        let state = Arc::clone(&state);
        let attrs = Arc::clone(&attrs);
        globals.set(
            "content",
            lua.create_function(move |_, raw: mlua::String| {
                let bytes = raw.as_bytes();
                let ct = sniff_content_type(&bytes)
                    .ok_or_else(|| runtime_error(Error::new(ErrorCode::UnknownContentType, "content is neither well-formed XML nor JSON")))?;
                let encoding = sniff::guess_string_encoding(&bytes);
                if encoding == Encoding::Binary {
                    return Err(runtime_error(Error::new(ErrorCode::EncodingError, "content encoding could not be determined")));
                }
                let format = output_format_of(ct).expect("sniff_content_type excludes Unknown");
                let mut st = state.lock().expect("runtime state mutex poisoned");
                st.negotiation.observe_doctype(&attrs, format);
                st.negotiation.observe_encoding(encoding);
                Ok((content_type_name(ct).to_string(), encoding.canonical_name().to_string()))
            })?,
        )?;
    }

    if let Some(schemas) = schemas {
        globals.set(
            "schema",
            lua.create_function(move |lua, (name, content, with_root): (String, mlua::String, Option<bool>)| {
                let bytes = content.as_bytes();
                let alloc = ArenaAllocator::new();
                let dest = ligature_value::Serialization::new();
                ligature_schema::schema_parse(&schemas, &name, with_root.unwrap_or(true), None, None, &bytes, &alloc, &dest)
                    .map_err(runtime_error)?;
                let structs = std::collections::HashMap::new();
                let tree = ligature_encoder::tree::build_tree(&dest, &alloc, &structs, ligature_errors::constants::MAX_RECURSION_DEPTH)
                    .map_err(runtime_error)?;
                to_lua(lua, &enc_node_to_script_value(tree))
            })?,
        )?;
    }

    Ok(())
}

/// `build_tree`'s `EncNode` is the encoder's own intermediate shape; the
/// `schema()` builtin needs it as a [`ScriptValue`] instead so it can cross
/// back into Lua via [`to_lua`].
fn enc_node_to_script_value(node: ligature_encoder::EncNode) -> ScriptValue {
    use ligature_encoder::{Atomic, EncNode};
    match node {
        EncNode::Atomic(Atomic::Void) => ScriptValue::Void,
        EncNode::Atomic(Atomic::Bool(b)) => ScriptValue::Bool(b),
        EncNode::Atomic(Atomic::Int(i)) => ScriptValue::Int(i),
        EncNode::Atomic(Atomic::Double(d)) => ScriptValue::Double(d),
        EncNode::Atomic(Atomic::String(s)) => ScriptValue::String(s),
        EncNode::Struct(children) => {
            if children.iter().all(|(name, _)| name.is_none()) {
                ScriptValue::Array(children.into_iter().map(|(_, child)| enc_node_to_script_value(child)).collect())
            } else {
                ScriptValue::Struct(
                    children
                        .into_iter()
                        .map(|(name, child)| (name.unwrap_or_default(), enc_node_to_script_value(child)))
                        .collect(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_name_covers_both_document_shapes() {
        assert_eq!(content_type_name(ligature_document::ContentType::Xml), "xml");
        assert_eq!(content_type_name(ligature_document::ContentType::Json), "json");
    }
}
