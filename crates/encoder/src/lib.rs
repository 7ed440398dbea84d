//! `ligature-encoder`: the four response style sinks (XML, JSON, HTML5,
//! plain text) spec.md §4.I describes, sharing one recursive walker
//! ([`tree::build_tree`]) that flattens a [`Serialization`] into an
//! intermediate [`tree::EncNode`] tree before any style-specific rendering
//! happens.

pub mod canonicalize;
pub mod escape;
pub mod html;
pub mod json;
pub mod text;
pub mod tree;
pub mod xml;

use std::collections::HashMap;

use ligature_alloc::{Allocator, Encoding};
use ligature_errors::{constants::MAX_RECURSION_DEPTH, Result};
use ligature_value::{Serialization, StructInterface};

pub use tree::{Atomic, EncNode};

/// The four output styles spec.md §4.I / §6 name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Xml,
    Json,
    Html5,
    Text,
}

/// Per-request rendering options, carrying the pieces of `RequestAttributes`
/// (spec.md §6) that affect output shape.
#[derive(Debug, Clone)]
pub struct EncoderOptions {
    pub format: OutputFormat,
    pub root_name: String,
    pub encoding: Encoding,
    pub beautify: bool,
    pub deterministic: bool,
    pub max_recursion_depth: usize,
    pub html_head: Option<String>,
}

impl EncoderOptions {
    pub fn new(format: OutputFormat, root_name: impl Into<String>) -> Self {
        EncoderOptions {
            format,
            root_name: root_name.into(),
            encoding: Encoding::Utf8,
            beautify: false,
            deterministic: false,
            max_recursion_depth: MAX_RECURSION_DEPTH,
            html_head: None,
        }
    }
}

/// Render `ser` as a complete response body in `opts.format`. `structs`
/// names positional members for any struct-tagged block that carries no
/// `Name` nodes of its own; a block whose structid is not found there is a
/// `MissingStructureDescription` error (spec.md §4.I).
pub fn encode<'a>(
    ser: &Serialization<'a>,
    alloc: &'a Allocator,
    structs: &HashMap<u32, StructInterface>,
    opts: &EncoderOptions,
) -> Result<Vec<u8>> {
    let mut tree = tree::build_tree(ser, alloc, structs, opts.max_recursion_depth)?;
    if opts.deterministic {
        tree = canonicalize::canonicalize(tree);
    }

    let rendered = match opts.format {
        OutputFormat::Xml => xml::render(&tree, &opts.root_name, opts.encoding, opts.beautify),
        OutputFormat::Json => {
            let root = if opts.root_name.is_empty() { None } else { Some(opts.root_name.as_str()) };
            json::render(&tree, root, opts.beautify)
        }
        OutputFormat::Html5 => html::render(&tree, &opts.root_name, opts.encoding, opts.html_head.as_deref()),
        OutputFormat::Text => text::render(&tree, Some(&opts.root_name)),
    };

    let bytes = ligature_value::transcode::tostring_enc(rendered.as_bytes(), Encoding::Utf8, opts.encoding)?;
    Ok(alloc.copy_bytes(&bytes).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ligature_value::ValueVariant;

    #[test]
    fn encodes_a_flat_struct_as_json() {
        let alloc = Allocator::new();
        let ser = Serialization::new();
        ser.push_name(alloc.copy_string("title"));
        ser.push_value(ValueVariant::String(ligature_value::StringValue::new(b"Hi", Encoding::Utf8)));

        let opts = EncoderOptions::new(OutputFormat::Json, "result");
        let bytes = encode(&ser, &alloc, &HashMap::new(), &opts).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"result":{"title":"Hi"}}"#);
    }

    #[test]
    fn encodes_the_same_struct_as_xml() {
        let alloc = Allocator::new();
        let ser = Serialization::new();
        ser.push_name(alloc.copy_string("title"));
        ser.push_value(ValueVariant::String(ligature_value::StringValue::new(b"Hi", Encoding::Utf8)));

        let opts = EncoderOptions::new(OutputFormat::Xml, "result");
        let bytes = encode(&ser, &alloc, &HashMap::new(), &opts).unwrap();
        let xml = String::from_utf8(bytes).unwrap();
        assert!(xml.contains("<result>"));
        assert!(xml.contains("<title>Hi</title>"));
    }

    #[test]
    fn missing_structure_description_surfaces_through_encode() {
        let alloc = Allocator::new();
        let ser = Serialization::new();
        ser.push_open_struct(3);
        ser.push_value(ValueVariant::Int(1));
        ser.push_close();

        let opts = EncoderOptions::new(OutputFormat::Json, "result");
        let err = encode(&ser, &alloc, &HashMap::new(), &opts).unwrap_err();
        assert_eq!(err.code, ligature_errors::ErrorCode::MissingStructureDescription);
    }
}
