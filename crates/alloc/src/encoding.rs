/// Character encodings a `String` value may carry. The unit size drives how
/// the allocator zero-terminates a copied buffer and how byte-swaps are
/// applied when the destination is host-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Utf8,
    Utf16BE,
    Utf16LE,
    Utf16Host,
    Utf32BE,
    Utf32LE,
    Utf32Host,
    /// Opaque bytes carrying no textual interpretation.
    Binary,
}

impl Encoding {
    /// Size in bytes of one code unit ("char") of this encoding. `Utf8` and
    /// `Binary` are single-byte units; the UTF-16 family is 2 bytes; the
    /// UTF-32 family is 4 bytes.
    pub fn unit_size(self) -> usize {
        match self {
            Encoding::Utf8 | Encoding::Binary => 1,
            Encoding::Utf16BE | Encoding::Utf16LE | Encoding::Utf16Host => 2,
            Encoding::Utf32BE | Encoding::Utf32LE | Encoding::Utf32Host => 4,
        }
    }

    /// True if this is one of the three `*Host` encodings, whose byte order
    /// matches the running CPU rather than a pinned endianness.
    pub fn is_host_endian(self) -> bool {
        matches!(self, Encoding::Utf16Host | Encoding::Utf32Host)
    }

    /// True if this encoding is little-endian, after resolving `*Host`
    /// variants against the target's native byte order.
    pub fn is_little_endian(self) -> bool {
        match self {
            Encoding::Utf16LE | Encoding::Utf32LE => true,
            Encoding::Utf16BE | Encoding::Utf32BE => false,
            Encoding::Utf16Host | Encoding::Utf32Host => cfg!(target_endian = "little"),
            Encoding::Utf8 | Encoding::Binary => true,
        }
    }

    /// The IANA-ish name used in an XML/HTML `encoding="..."`/`<meta
    /// charset>` declaration. `*Host` variants resolve to their concrete
    /// byte order, since a document declaration must name one.
    pub fn canonical_name(self) -> &'static str {
        match self {
            Encoding::Utf8 | Encoding::Binary => "UTF-8",
            Encoding::Utf16BE => "UTF-16BE",
            Encoding::Utf16LE => "UTF-16LE",
            Encoding::Utf16Host => {
                if cfg!(target_endian = "little") {
                    "UTF-16LE"
                } else {
                    "UTF-16BE"
                }
            }
            Encoding::Utf32BE => "UTF-32BE",
            Encoding::Utf32LE => "UTF-32LE",
            Encoding::Utf32Host => {
                if cfg!(target_endian = "little") {
                    "UTF-32LE"
                } else {
                    "UTF-32BE"
                }
            }
        }
    }
}
