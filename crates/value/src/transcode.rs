//! Codepoint-wise transcoding between the string encodings a `ValueVariant`
//! may carry. UTF-8 is the hub: any encoding can transcode to or from
//! UTF-8, but transcoding directly between two non-UTF-8 encodings is
//! `NotImplemented` (round-trip through UTF-8 instead).

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use ligature_alloc::Encoding;
use ligature_errors::{Error, ErrorCode, Result};

/// Decode one codepoint at unit offset `pos` within `bytes` (declared as
/// `encoding`), returning the codepoint and the byte offset just past it.
pub fn nextchar(bytes: &[u8], encoding: Encoding, pos: usize) -> Result<(char, usize)> {
    match encoding {
        Encoding::Utf8 | Encoding::Binary => {
            let s = std::str::from_utf8(&bytes[pos..])
                .map_err(|e| Error::new(ErrorCode::EncodingError, e.to_string()))?;
            let c = s
                .chars()
                .next()
                .ok_or_else(|| Error::new(ErrorCode::UnexpectedEof, "no codepoint at position"))?;
            Ok((c, pos + c.len_utf8()))
        }
        Encoding::Utf16BE | Encoding::Utf16LE | Encoding::Utf16Host => {
            let little = resolved_little_endian(encoding);
            let unit = |i: usize| -> Result<u16> {
                let chunk = bytes.get(i..i + 2).ok_or_else(|| {
                    Error::new(ErrorCode::UnexpectedEof, "truncated utf-16 code unit")
                })?;
                Ok(if little {
                    LittleEndian::read_u16(chunk)
                } else {
                    BigEndian::read_u16(chunk)
                })
            };
            let hi = unit(pos)?;
            if (0xD800..=0xDBFF).contains(&hi) {
                let lo = unit(pos + 2)?;
                let c = decode_surrogate_pair(hi, lo)?;
                Ok((c, pos + 4))
            } else {
                let c = char::from_u32(hi as u32)
                    .ok_or_else(|| Error::new(ErrorCode::EncodingError, "invalid utf-16 unit"))?;
                Ok((c, pos + 2))
            }
        }
        Encoding::Utf32BE | Encoding::Utf32LE | Encoding::Utf32Host => {
            let little = resolved_little_endian(encoding);
            let chunk = bytes
                .get(pos..pos + 4)
                .ok_or_else(|| Error::new(ErrorCode::UnexpectedEof, "truncated utf-32 code unit"))?;
            let scalar = if little {
                LittleEndian::read_u32(chunk)
            } else {
                BigEndian::read_u32(chunk)
            };
            let c = char::from_u32(scalar)
                .ok_or_else(|| Error::new(ErrorCode::EncodingError, "invalid utf-32 scalar"))?;
            Ok((c, pos + 4))
        }
    }
}

fn resolved_little_endian(encoding: Encoding) -> bool {
    encoding.is_little_endian()
}

fn decode_surrogate_pair(hi: u16, lo: u16) -> Result<char> {
    if !(0xDC00..=0xDFFF).contains(&lo) {
        return Err(Error::new(ErrorCode::EncodingError, "unpaired surrogate"));
    }
    let scalar = 0x10000u32 + (((hi as u32) - 0xD800) << 10) + ((lo as u32) - 0xDC00);
    char::from_u32(scalar).ok_or_else(|| Error::new(ErrorCode::EncodingError, "invalid surrogate pair"))
}

/// Decode an entire buffer into codepoints.
pub fn decode_all(bytes: &[u8], encoding: Encoding) -> Result<Vec<char>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let (c, next) = nextchar(bytes, encoding, pos)?;
        out.push(c);
        pos = next;
    }
    Ok(out)
}

/// Encode codepoints into `encoding`'s byte representation. No terminator is
/// appended; callers needing one should use `Allocator::copy_string_enc`.
pub fn encode_all(chars: &[char], encoding: Encoding) -> Vec<u8> {
    match encoding {
        Encoding::Utf8 | Encoding::Binary => chars.iter().collect::<String>().into_bytes(),
        Encoding::Utf16BE | Encoding::Utf16LE | Encoding::Utf16Host => {
            let little = resolved_little_endian(encoding);
            let mut out = Vec::with_capacity(chars.len() * 2);
            for c in chars {
                let mut buf = [0u16; 2];
                for unit in c.encode_utf16(&mut buf).iter() {
                    let mut tmp = [0u8; 2];
                    if little {
                        LittleEndian::write_u16(&mut tmp, *unit);
                    } else {
                        BigEndian::write_u16(&mut tmp, *unit);
                    }
                    out.extend_from_slice(&tmp);
                }
            }
            out
        }
        Encoding::Utf32BE | Encoding::Utf32LE | Encoding::Utf32Host => {
            let little = resolved_little_endian(encoding);
            let mut out = Vec::with_capacity(chars.len() * 4);
            for c in chars {
                let mut tmp = [0u8; 4];
                if little {
                    LittleEndian::write_u32(&mut tmp, *c as u32);
                } else {
                    BigEndian::write_u32(&mut tmp, *c as u32);
                }
                out.extend_from_slice(&tmp);
            }
            out
        }
    }
}

/// Transcode `bytes` (declared as `src`) into `dest`'s representation.
/// A no-op copy when `src == dest`. UTF-8 is the hub encoding: transcoding
/// directly between two distinct non-UTF-8 encodings is `NotImplemented`.
pub fn tostring_enc(bytes: &[u8], src: Encoding, dest: Encoding) -> Result<Vec<u8>> {
    if src == dest {
        return Ok(bytes.to_vec());
    }
    if src != Encoding::Utf8 && dest != Encoding::Utf8 {
        return Err(Error::new(
            ErrorCode::NotImplemented,
            format!("direct transcoding from {src:?} to {dest:?} is not supported; round-trip through UTF-8"),
        ));
    }
    let chars = decode_all(bytes, src)?;
    Ok(encode_all(&chars, dest))
}

/// Produce a blob representation of a string's bytes, byte-swapping 2- or
/// 4-byte code units when the encoding is pinned to an endianness that
/// differs from the host's.
pub fn toblob(bytes: &[u8], encoding: Encoding) -> Vec<u8> {
    if encoding.is_host_endian() || encoding == Encoding::Utf8 || encoding == Encoding::Binary {
        return bytes.to_vec();
    }
    let host_little = cfg!(target_endian = "little");
    if encoding.is_little_endian() == host_little {
        return bytes.to_vec();
    }
    let unit = encoding.unit_size();
    let mut out = bytes.to_vec();
    for chunk in out.chunks_mut(unit) {
        chunk.reverse();
    }
    out
}

/// Map a UTF-8 string to an ASCII byte buffer, replacing codepoints outside
/// `[0, 127]` with `subst_char` if provided, or returning `None` to signal
/// unrepresentable loss.
pub fn toascii(s: &str, subst_char: Option<u8>) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(s.len());
    for c in s.chars() {
        if (c as u32) <= 127 {
            out.push(c as u8);
        } else if let Some(subst) = subst_char {
            out.push(subst);
        } else {
            return None;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_to_utf16le_round_trips_through_utf8() {
        let original = "héllo";
        let utf16le = tostring_enc(original.as_bytes(), Encoding::Utf8, Encoding::Utf16LE).unwrap();
        // 5 codepoints, all within the BMP => 10 bytes, no BOM.
        assert_eq!(utf16le.len(), 10);

        let back = tostring_enc(&utf16le, Encoding::Utf16LE, Encoding::Utf8).unwrap();
        assert_eq!(back, original.as_bytes());
    }

    #[test]
    fn direct_non_utf8_transcode_is_not_implemented() {
        let err = tostring_enc(&[0, 0, 0, 0], Encoding::Utf32BE, Encoding::Utf16LE).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotImplemented);
    }

    #[test]
    fn toascii_reports_loss_without_a_substitute() {
        assert_eq!(toascii("abc", None), Some(b"abc".to_vec()));
        assert_eq!(toascii("abc", Some(b'?')), Some(b"abc".to_vec()));
        assert_eq!(toascii("héllo", None), None);
        assert_eq!(toascii("héllo", Some(b'?')), Some(b"h?llo".to_vec()));
    }

    #[test]
    fn nextchar_decodes_surrogate_pairs() {
        let s = "\u{1F600}"; // outside the BMP
        let utf16 = tostring_enc(s.as_bytes(), Encoding::Utf8, Encoding::Utf16LE).unwrap();
        let (c, next) = nextchar(&utf16, Encoding::Utf16LE, 0).unwrap();
        assert_eq!(c, '\u{1F600}');
        assert_eq!(next, 4);
    }
}
