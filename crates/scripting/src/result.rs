//! Render a scripted handler's final value, per spec.md §4.J's three result
//! shapes: (a) a string, used verbatim with the negotiated content type;
//! (b) a single-key table, whose key names the root element; (c) any other
//! table, rendered without a script-provided root name.

use ligature_alloc::Encoding;
use ligature_encoder::canonicalize::canonicalize;
use ligature_encoder::{html, json, text, xml, EncNode, OutputFormat};
use ligature_errors::Result;

use crate::value_bridge::ScriptValue;

/// The name a non-JSON sink falls back to when a script's result carries no
/// root name of its own (shape (c)) -- only JSON can render a rootless
/// value, every other format needs some element name to hang the tree off.
pub const DEFAULT_ROOT_NAME: &str = "result";

#[derive(Debug, Clone)]
pub enum ScriptResult {
    /// Shape (a): used verbatim, with no encoding applied a second time --
    /// a script producing a string is assumed to have already formatted it.
    Raw(String),
    /// Shapes (b) and (c), still holding the full Lua table the script
    /// returned; [`render`] decides which shape it is at render time.
    Value(ScriptValue),
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub format: OutputFormat,
    pub encoding: Encoding,
    pub beautify: bool,
    pub deterministic: bool,
    pub html_head: Option<String>,
}

/// If `value` is a single-key struct (shape (b)), its key becomes the root
/// element and its value the tree to render; any other shape (including an
/// array, or a struct with zero or more-than-one keys) is shape (c): the
/// whole value becomes the tree with no script-provided root name.
fn split_root(value: ScriptValue) -> (Option<String>, EncNode) {
    if let ScriptValue::Struct(mut fields) = value {
        if fields.len() == 1 {
            let (name, inner) = fields.remove(0);
            return (Some(name), inner.into_enc_node());
        }
        return (None, ScriptValue::Struct(fields).into_enc_node());
    }
    (None, value.into_enc_node())
}

pub fn render_tree(
    node: &EncNode,
    format: OutputFormat,
    root_name: Option<&str>,
    encoding: Encoding,
    beautify: bool,
    html_head: Option<&str>,
) -> String {
    match format {
        OutputFormat::Xml => xml::render(node, root_name.unwrap_or(DEFAULT_ROOT_NAME), encoding, beautify),
        OutputFormat::Json => json::render(node, root_name, beautify),
        OutputFormat::Html5 => html::render(node, root_name.unwrap_or(DEFAULT_ROOT_NAME), encoding, html_head),
        OutputFormat::Text => text::render(node, Some(root_name.unwrap_or(DEFAULT_ROOT_NAME))),
    }
}

/// Render one script result to a complete response body in `opts.format`,
/// encoded per `opts.encoding`.
pub fn render(result: ScriptResult, opts: &RenderOptions) -> Result<Vec<u8>> {
    let rendered = match result {
        ScriptResult::Raw(text) => text,
        ScriptResult::Value(value) => {
            let (root_name, mut node) = split_root(value);
            if opts.deterministic {
                node = canonicalize(node);
            }
            render_tree(&node, opts.format, root_name.as_deref(), opts.encoding, opts.beautify, opts.html_head.as_deref())
        }
    };
    ligature_value::transcode::tostring_enc(rendered.as_bytes(), Encoding::Utf8, opts.encoding)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(format: OutputFormat) -> RenderOptions {
        RenderOptions { format, encoding: Encoding::Utf8, beautify: false, deterministic: false, html_head: None }
    }

    #[test]
    fn single_key_table_names_the_root_element() {
        let value = ScriptValue::struct1("root", ScriptValue::struct1("v", ScriptValue::Int(7)));
        let bytes = render(ScriptResult::Value(value), &opts(OutputFormat::Json)).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"root":{"v":7}}"#);
    }

    #[test]
    fn multi_key_table_renders_without_a_synthetic_root_in_json() {
        let value = ScriptValue::Struct(vec![("a".to_string(), ScriptValue::Int(1)), ("b".to_string(), ScriptValue::Int(2))]);
        let bytes = render(ScriptResult::Value(value), &opts(OutputFormat::Json)).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn multi_key_table_falls_back_to_a_default_root_in_xml() {
        let value = ScriptValue::Struct(vec![("a".to_string(), ScriptValue::Int(1)), ("b".to_string(), ScriptValue::Int(2))]);
        let bytes = render(ScriptResult::Value(value), &opts(OutputFormat::Xml)).unwrap();
        let xml = String::from_utf8(bytes).unwrap();
        assert!(xml.contains(&format!("<{DEFAULT_ROOT_NAME}>")));
    }

    #[test]
    fn a_raw_string_result_is_used_verbatim() {
        let bytes = render(ScriptResult::Raw("already-formatted".to_string()), &opts(OutputFormat::Text)).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "already-formatted");
    }

    #[test]
    fn deterministic_rendering_sorts_keys() {
        let value = ScriptValue::struct1(
            "root",
            ScriptValue::Struct(vec![
                ("b".to_string(), ScriptValue::Int(1)),
                ("a".to_string(), ScriptValue::Int(2)),
                ("c".to_string(), ScriptValue::Int(3)),
            ]),
        );
        let mut o = opts(OutputFormat::Json);
        o.deterministic = true;
        let bytes = render(ScriptResult::Value(value), &o).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"root":{"a":2,"b":1,"c":3}}"#);
    }
}
