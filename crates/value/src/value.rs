//! `ValueVariant`: the tagged union every field of a request or response
//! tuple is built from. Atomic variants (`Void`, `Double`, `Int`, `Bool`,
//! `String`, `HostObject`) are self-contained; the two composite variants,
//! `Serialization` and `Iterator`, defer to a nested node tree or a
//! host-driven stream respectively and must be expanded by a caller before
//! their contents can be inspected as atoms.

use std::fmt;

use ligature_alloc::{Allocator, Encoding};
use ligature_errors::{Error, ErrorCode, Result};

use crate::host::{HostObject, IteratorHandle};
use crate::number::{self, Number};
use crate::serialization::Serialization;
use crate::transcode;

/// A string value: bytes borrowed from some `Allocator`, tagged with the
/// encoding they were written in.
#[derive(Clone, Copy)]
pub struct StringValue<'a> {
    pub bytes: &'a [u8],
    pub encoding: Encoding,
}

impl<'a> StringValue<'a> {
    pub fn new(bytes: &'a [u8], encoding: Encoding) -> Self {
        StringValue { bytes, encoding }
    }
}

impl fmt::Debug for StringValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encoding {
            Encoding::Utf8 => write!(f, "{:?}", String::from_utf8_lossy(self.bytes)),
            other => write!(f, "StringValue({other:?}, {} bytes)", self.bytes.len()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ValueVariant<'a> {
    Void,
    Double(f64),
    Int(i64),
    Bool(bool),
    String(StringValue<'a>),
    HostObject(HostObject),
    /// A reference into a serialized node tree rooted elsewhere (e.g. a
    /// parsed document fragment, or a struct field built by the automaton).
    Serialization(&'a Serialization<'a>),
    Iterator(IteratorHandle),
}

impl<'a> ValueVariant<'a> {
    pub fn defined(&self) -> bool {
        !matches!(self, ValueVariant::Void)
    }

    pub fn isnumeric(&self) -> bool {
        matches!(self, ValueVariant::Double(_) | ValueVariant::Int(_))
    }

    pub fn isstring(&self) -> bool {
        matches!(self, ValueVariant::String(_))
    }

    /// Self-contained values that do not require expansion to inspect.
    /// `Serialization` and `Iterator` are composite and excluded.
    pub fn isatomic(&self) -> bool {
        !matches!(self, ValueVariant::Serialization(_) | ValueVariant::Iterator(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ValueVariant::Void => "void",
            ValueVariant::Double(_) => "double",
            ValueVariant::Int(_) => "int",
            ValueVariant::Bool(_) => "bool",
            ValueVariant::String(_) => "string",
            ValueVariant::HostObject(_) => "host-object",
            ValueVariant::Serialization(_) => "serialization",
            ValueVariant::Iterator(_) => "iterator",
        }
    }

    fn type_error(&self, wanted: &str) -> Error {
        Error::new(
            ErrorCode::TypeError,
            format!("cannot convert a {} to {wanted}", self.type_name()),
        )
    }

    /// The ASCII (lossily, if needed) form used to parse numbers and
    /// booleans out of a string-typed value.
    fn ascii_form(&self) -> Result<String> {
        match self {
            ValueVariant::String(s) => {
                let utf8 = transcode::tostring_enc(s.bytes, s.encoding, Encoding::Utf8)?;
                String::from_utf8(utf8).map_err(|e| Error::new(ErrorCode::EncodingError, e.to_string()))
            }
            other => Err(other.type_error("string")),
        }
    }

    pub fn toint(&self) -> Result<i64> {
        match self {
            ValueVariant::Int(i) => Ok(*i),
            ValueVariant::Double(d) => number::double_to_int(*d),
            ValueVariant::Bool(b) => Ok(if *b { 1 } else { 0 }),
            ValueVariant::String(_) => match number::parse(&self.ascii_form()?)? {
                Number::Int(i) => Ok(i),
                Number::Double(d) => number::double_to_int(d),
            },
            other => Err(other.type_error("int")),
        }
    }

    pub fn touint(&self) -> Result<u64> {
        let i = self.toint()?;
        u64::try_from(i).map_err(|_| Error::new(ErrorCode::OutOfRangeError, format!("{i} is negative")))
    }

    pub fn todouble(&self) -> Result<f64> {
        match self {
            ValueVariant::Double(d) => Ok(*d),
            ValueVariant::Int(i) => Ok(*i as f64),
            ValueVariant::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            ValueVariant::String(_) => match number::parse(&self.ascii_form()?)? {
                Number::Int(i) => Ok(i as f64),
                Number::Double(d) => Ok(d),
            },
            other => Err(other.type_error("double")),
        }
    }

    /// Parse this value as either an `Int` or a `Double`, picking whichever
    /// the source representation (or grammar, for strings) implies.
    pub fn tonumeric(&self) -> Result<Number> {
        match self {
            ValueVariant::Int(i) => Ok(Number::Int(*i)),
            ValueVariant::Double(d) => Ok(Number::Double(*d)),
            ValueVariant::Bool(b) => Ok(Number::Int(if *b { 1 } else { 0 })),
            ValueVariant::String(_) => number::parse(&self.ascii_form()?),
            other => Err(other.type_error("numeric")),
        }
    }

    pub fn tobool(&self) -> Result<bool> {
        match self {
            ValueVariant::Bool(b) => Ok(*b),
            ValueVariant::Int(i) => Ok(*i != 0),
            ValueVariant::Double(d) => Ok(*d != 0.0),
            ValueVariant::String(_) => number::parse_bool(&self.ascii_form()?),
            other => Err(other.type_error("bool")),
        }
    }

    /// Render this value as a UTF-8 string copied into `alloc`.
    pub fn tostring(&self, alloc: &'a Allocator) -> Result<&'a str> {
        let owned = match self {
            ValueVariant::Void => String::new(),
            ValueVariant::Bool(b) => b.to_string(),
            ValueVariant::Int(i) => i.to_string(),
            ValueVariant::Double(d) => d.to_string(),
            ValueVariant::String(s) => {
                let utf8 = transcode::tostring_enc(s.bytes, s.encoding, Encoding::Utf8)?;
                String::from_utf8(utf8).map_err(|e| Error::new(ErrorCode::EncodingError, e.to_string()))?
            }
            other => return Err(other.type_error("string")),
        };
        Ok(alloc.copy_string(&owned))
    }

    /// Render this value as a string in a specific target encoding, copied
    /// into `alloc`.
    pub fn tostring_enc(&self, alloc: &'a Allocator, dest: Encoding) -> Result<&'a [u8]> {
        match self {
            ValueVariant::String(s) => {
                let converted = transcode::tostring_enc(s.bytes, s.encoding, dest)?;
                Ok(alloc.copy_bytes(&converted))
            }
            _ => {
                let as_utf8 = self.tostring(alloc)?;
                let converted = transcode::tostring_enc(as_utf8.as_bytes(), Encoding::Utf8, dest)?;
                Ok(alloc.copy_bytes(&converted))
            }
        }
    }

    /// Render this value's bytes as a host-endian blob, copied into `alloc`.
    pub fn toblob(&self, alloc: &'a Allocator) -> Result<&'a [u8]> {
        match self {
            ValueVariant::String(s) => Ok(alloc.copy_bytes(&transcode::toblob(s.bytes, s.encoding))),
            other => Err(other.type_error("blob")),
        }
    }

    /// Render this value as ASCII, substituting `subst_char` for
    /// unrepresentable codepoints, or failing with `EncodingError` if none
    /// was supplied and loss would occur.
    pub fn toascii(&self, alloc: &'a Allocator, subst_char: Option<u8>) -> Result<&'a [u8]> {
        let as_utf8 = self.tostring(alloc)?;
        transcode::toascii(as_utf8, subst_char)
            .map(|bytes| alloc.copy_bytes(&bytes))
            .ok_or_else(|| Error::new(ErrorCode::EncodingError, "string is not representable as ASCII"))
    }

    /// Decode one codepoint from a string value at byte offset `pos`.
    pub fn nextchar(&self, pos: usize) -> Result<(char, usize)> {
        match self {
            ValueVariant::String(s) => transcode::nextchar(s.bytes, s.encoding, pos),
            other => Err(other.type_error("string")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_predicate_excludes_composite_variants() {
        assert!(ValueVariant::Int(1).isatomic());
        assert!(ValueVariant::Void.defined() == false);
        assert!(ValueVariant::Bool(true).defined());
    }

    #[test]
    fn numeric_conversions_follow_the_grammar() {
        let alloc = Allocator::new();
        let s = ValueVariant::String(StringValue::new(alloc.copy_string("3.5").as_bytes(), Encoding::Utf8));
        assert_eq!(s.todouble().unwrap(), 3.5);
        assert_eq!(s.toint().unwrap(), 3);
        assert_eq!(s.tonumeric().unwrap(), Number::Double(3.5));
    }

    #[test]
    fn tostring_renders_atoms() {
        let alloc = Allocator::new();
        assert_eq!(ValueVariant::Int(42).tostring(&alloc).unwrap(), "42");
        assert_eq!(ValueVariant::Bool(false).tostring(&alloc).unwrap(), "false");
    }

    #[test]
    fn toascii_requires_a_substitute_for_lossy_input() {
        let alloc = Allocator::new();
        let bytes = alloc.copy_string("héllo").as_bytes();
        let s = ValueVariant::String(StringValue::new(bytes, Encoding::Utf8));
        assert!(s.toascii(&alloc, None).is_err());
        assert_eq!(s.toascii(&alloc, Some(b'?')).unwrap(), b"h?llo");
    }

    #[test]
    fn bool_and_int_cross_convert() {
        assert_eq!(ValueVariant::Bool(true).toint().unwrap(), 1);
        assert_eq!(ValueVariant::Int(0).tobool().unwrap(), false);
        assert_eq!(ValueVariant::Int(7).tobool().unwrap(), true);
    }
}
