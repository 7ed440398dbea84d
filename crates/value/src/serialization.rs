//! `Serialization`: an append-only, bracket-structured node list used both
//! as the parsed form of a document and as the wire format the executor
//! builds call results in. A well-formed serialization is a sequence of
//! `Name` nodes (each immediately followed by either a `Value` node or an
//! `Open ... Close` bracket pair) possibly nested inside outer
//! `Open ... Close` pairs. Well-formedness is never checked eagerly; it is
//! the caller's responsibility, and a consumer walking a malformed sequence
//! with a [`SerializationIter`] is expected to surface `SyntaxError` itself.

use std::cell::RefCell;

use ligature_alloc::Allocator;
use ligature_errors::{Error, ErrorCode, Result};

use crate::value::ValueVariant;

/// The four node kinds a `Serialization` is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Open,
    Close,
    Name,
    Value,
}

#[derive(Debug, Clone)]
pub struct Node<'a> {
    pub tag: Tag,
    pub name: Option<&'a str>,
    pub value: Option<ValueVariant<'a>>,
    /// Set only on `Open` nodes that open a struct-tagged block (spec.md
    /// §4.C): selects a [`StructInterface`] from an out-of-band table that
    /// names this block's positional members when it carries no `Name`
    /// nodes of its own.
    pub structid: Option<u32>,
}

impl<'a> Node<'a> {
    pub fn open() -> Self {
        Node { tag: Tag::Open, name: None, value: None, structid: None }
    }
    pub fn open_struct(structid: u32) -> Self {
        Node { tag: Tag::Open, name: None, value: None, structid: Some(structid) }
    }
    pub fn close() -> Self {
        Node { tag: Tag::Close, name: None, value: None, structid: None }
    }
    pub fn name(name: &'a str) -> Self {
        Node { tag: Tag::Name, name: Some(name), value: None, structid: None }
    }
    pub fn value(value: ValueVariant<'a>) -> Self {
        Node { tag: Tag::Value, name: None, value: Some(value), structid: None }
    }
}

/// Growth is reserved in chunks of this size, mirroring the source's
/// linked-chunk node pool without needing an unsafe self-referential chain:
/// `Vec`'s amortized growth already gives the same allocation profile.
pub const NODE_CHUNK_SIZE: usize = ligature_errors::constants::NODE_CHUNK_SIZE;

/// An append-only list of [`Node`]s. Allocation of the string and value
/// payloads a node carries is always the caller's (via an [`Allocator`]);
/// the `Serialization` itself only owns the `Vec` spine.
#[derive(Debug, Default)]
pub struct Serialization<'a> {
    nodes: RefCell<Vec<Node<'a>>>,
}

impl<'a> Serialization<'a> {
    pub fn new() -> Self {
        Serialization { nodes: RefCell::new(Vec::with_capacity(NODE_CHUNK_SIZE)) }
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&self, node: Node<'a>) {
        let mut nodes = self.nodes.borrow_mut();
        if nodes.len() == nodes.capacity() {
            nodes.reserve(NODE_CHUNK_SIZE);
        }
        nodes.push(node);
    }

    pub fn push_open(&self) {
        self.push(Node::open());
    }

    /// Open a struct-tagged block: see [`Node::open_struct`].
    pub fn push_open_struct(&self, structid: u32) {
        self.push(Node::open_struct(structid));
    }

    pub fn push_close(&self) {
        self.push(Node::close());
    }

    pub fn push_name(&self, name: &'a str) {
        self.push(Node::name(name));
    }

    pub fn push_value(&self, value: ValueVariant<'a>) {
        self.push(Node::value(value));
    }

    pub fn iter(&self) -> SerializationIter<'_, 'a> {
        SerializationIter { nodes: self.nodes.borrow(), pos: 0 }
    }

    /// Rewrite the tail starting at `start_index`, inserting a synthetic
    /// integer `Name` node (`"0"`, `"1"`, ...) before each top-level
    /// unnamed element, turning an anonymous array into an associative one.
    pub fn convert_array_assoc(&self, start_index: usize, alloc: &'a Allocator) -> Result<()> {
        let mut nodes = self.nodes.borrow_mut();
        let mut i = start_index;
        let mut index = 0u64;

        while i < nodes.len() {
            match nodes[i].tag {
                Tag::Name => {
                    i += 1;
                    skip_element(&nodes, &mut i)?;
                }
                Tag::Value | Tag::Open => {
                    let label = alloc.copy_string(&index.to_string());
                    nodes.insert(i, Node::name(label));
                    index += 1;
                    i += 1;
                    skip_element(&nodes, &mut i)?;
                }
                Tag::Close => {
                    return Err(Error::new(ErrorCode::SyntaxError, "unmatched Close in array tail"));
                }
            }
        }
        Ok(())
    }

    /// A newline-delimited debug dump of every node, for diagnostics and
    /// test assertions. Not used for wire output; see the result encoder
    /// for that.
    pub fn tostring(&self) -> String {
        let nodes = self.nodes.borrow();
        let mut out = String::new();
        for node in nodes.iter() {
            out.push_str(&print_node(node));
            out.push('\n');
        }
        out
    }
}

/// Advance `i` past the single element starting there: a lone `Value`, or
/// a balanced `Open ... Close` subtree.
fn skip_element(nodes: &[Node<'_>], i: &mut usize) -> Result<()> {
    match nodes.get(*i).map(|n| n.tag) {
        Some(Tag::Value) => {
            *i += 1;
            Ok(())
        }
        Some(Tag::Open) => {
            let mut depth = 1;
            *i += 1;
            while depth > 0 {
                match nodes.get(*i) {
                    Some(n) if n.tag == Tag::Open => depth += 1,
                    Some(n) if n.tag == Tag::Close => depth -= 1,
                    Some(_) => {}
                    None => return Err(Error::new(ErrorCode::SyntaxError, "unterminated Open bracket")),
                }
                *i += 1;
            }
            Ok(())
        }
        Some(Tag::Name) => Err(Error::new(ErrorCode::SyntaxError, "unexpected Name following Name")),
        Some(Tag::Close) => Err(Error::new(ErrorCode::SyntaxError, "Name not followed by a value")),
        None => Err(Error::new(ErrorCode::UnexpectedEof, "Name not followed by a value")),
    }
}

/// A one-line rendering of a single node, used by [`Serialization::tostring`]
/// and by error messages that need to show the node at a fault position.
pub fn print_node(node: &Node<'_>) -> String {
    match node.tag {
        Tag::Open => "Open".to_string(),
        Tag::Close => "Close".to_string(),
        Tag::Name => format!("Name({})", node.name.unwrap_or("")),
        Tag::Value => match &node.value {
            Some(v) => format!("Value({:?})", v),
            None => "Value(<missing>)".to_string(),
        },
    }
}

/// A cursor over a [`Serialization`]'s node list. Advancing past the last
/// node is defined: `tag()` reports `Close` and `value()` reports `None`,
/// so a caller can treat exhaustion as an implicit closing bracket without
/// a separate eof check on every step.
pub struct SerializationIter<'s, 'a> {
    nodes: std::cell::Ref<'s, Vec<Node<'a>>>,
    pos: usize,
}

impl<'s, 'a> SerializationIter<'s, 'a> {
    pub fn tag(&self) -> Tag {
        self.nodes.get(self.pos).map(|n| n.tag).unwrap_or(Tag::Close)
    }

    pub fn name(&self) -> Option<&'a str> {
        self.nodes.get(self.pos).and_then(|n| n.name)
    }

    pub fn value(&self) -> Option<&ValueVariant<'a>> {
        self.nodes.get(self.pos).and_then(|n| n.value.as_ref())
    }

    /// The struct-interface id this `Open` node carries, if any.
    pub fn structid(&self) -> Option<u32> {
        self.nodes.get(self.pos).and_then(|n| n.structid)
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.nodes.len()
    }

    pub fn last(&self) -> bool {
        !self.nodes.is_empty() && self.pos == self.nodes.len() - 1
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Advance exactly one node regardless of its tag -- unlike [`Self::skip`],
    /// an `Open` node only steps onto its first child, not past the whole
    /// subtree. Used by consumers (e.g. the result encoder) that need to
    /// recurse into a bracketed block themselves.
    pub fn advance_one(&mut self) {
        self.pos += 1;
    }

    /// Advance one step; for an `Open` node, advances past its entire
    /// matching `Close` in one call, skipping the whole subtree.
    pub fn skip(&mut self) -> Result<()> {
        match self.tag() {
            Tag::Open => {
                let mut depth = 1;
                self.pos += 1;
                while depth > 0 {
                    if self.pos >= self.nodes.len() {
                        return Err(Error::new(ErrorCode::SyntaxError, "unterminated Open bracket"));
                    }
                    match self.nodes[self.pos].tag {
                        Tag::Open => depth += 1,
                        Tag::Close => depth -= 1,
                        _ => {}
                    }
                    self.pos += 1;
                }
            }
            _ => self.pos += 1,
        }
        Ok(())
    }

    /// A detached cursor over the same underlying list at the same
    /// position; advancing the copy does not affect `self`.
    pub fn copy(&self) -> Self {
        SerializationIter { nodes: std::cell::Ref::clone(&self.nodes), pos: self.pos }
    }

    pub fn is_equal(&self, other: &Self) -> bool {
        self.pos == other.pos && std::ptr::eq(self.nodes.as_ptr(), other.nodes.as_ptr())
    }
}

/// Names positional members of a struct-tagged block, used by the result
/// encoder when a `Serialization` carries no `Name` nodes of its own.
#[derive(Debug, Clone)]
pub struct StructInterface {
    members: Vec<String>,
}

impl StructInterface {
    pub fn new(members: Vec<String>) -> Self {
        StructInterface { members }
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.members.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_iterate_round_trips_tags() {
        let ser = Serialization::new();
        ser.push_open();
        ser.push_name("a");
        ser.push_value(ValueVariant::Int(1));
        ser.push_close();

        let mut it = ser.iter();
        assert_eq!(it.tag(), Tag::Open);
        it.skip().unwrap();
        assert_eq!(it.tag(), Tag::Name);
        assert_eq!(it.name(), Some("a"));
        it.skip().unwrap();
        assert_eq!(it.tag(), Tag::Value);
        it.skip().unwrap();
        assert_eq!(it.tag(), Tag::Close);
        it.skip().unwrap();
        assert!(it.eof());
        // Past-eof reads degrade to an implicit Close/None, not a panic.
        assert_eq!(it.tag(), Tag::Close);
        assert!(it.value().is_none());
    }

    #[test]
    fn skip_jumps_over_a_whole_subtree() {
        let ser = Serialization::new();
        ser.push_open();
        ser.push_open();
        ser.push_value(ValueVariant::Int(1));
        ser.push_close();
        ser.push_close();
        ser.push_value(ValueVariant::Int(2));

        let mut it = ser.iter();
        assert_eq!(it.tag(), Tag::Open);
        it.skip().unwrap(); // jumps past the nested Open/Value/Close/Close
        assert_eq!(it.tag(), Tag::Value);
    }

    #[test]
    fn convert_array_assoc_numbers_unnamed_elements() {
        let alloc = Allocator::new();
        let ser = Serialization::new();
        ser.push_value(ValueVariant::Int(10));
        ser.push_value(ValueVariant::Int(20));
        ser.convert_array_assoc(0, &alloc).unwrap();

        let mut it = ser.iter();
        assert_eq!(it.tag(), Tag::Name);
        assert_eq!(it.name(), Some("0"));
        it.skip().unwrap();
        assert_eq!(it.tag(), Tag::Value);
        it.skip().unwrap();
        assert_eq!(it.tag(), Tag::Name);
        assert_eq!(it.name(), Some("1"));
    }

    #[test]
    fn copy_detaches_cursor_position() {
        let ser = Serialization::new();
        ser.push_value(ValueVariant::Int(1));
        ser.push_value(ValueVariant::Int(2));

        let mut it = ser.iter();
        let snapshot = it.copy();
        it.skip().unwrap();
        assert!(!it.is_equal(&snapshot));
        assert_eq!(snapshot.position(), 0);
        assert_eq!(it.position(), 1);
    }
}
