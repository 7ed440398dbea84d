//! Content-type and encoding sniffing, applied before a document is handed
//! to either the XML or JSON event producer.

use ligature_alloc::Encoding;

/// The three shapes a document body can take. `Unknown` is returned when
/// neither a `<`/`<?` nor a `{`/`['/`"`/`'` lead byte is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Xml,
    Json,
    Unknown,
}

/// Strip a byte-order mark, if present, returning the encoding it implies
/// and how many leading bytes it occupies.
pub fn detect_bom(bytes: &[u8]) -> Option<(Encoding, usize)> {
    if bytes.len() >= 3 && bytes[0] == 0xEF && bytes[1] == 0xBB && bytes[2] == 0xBF {
        return Some((Encoding::Utf8, 3));
    }
    if bytes.len() >= 4 && bytes[0] == 0x00 && bytes[1] == 0x00 && bytes[2] == 0xFE && bytes[3] == 0xFF {
        return Some((Encoding::Utf32BE, 4));
    }
    if bytes.len() >= 4 && bytes[0] == 0xFF && bytes[1] == 0xFE && bytes[2] == 0x00 && bytes[3] == 0x00 {
        return Some((Encoding::Utf32LE, 4));
    }
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        return Some((Encoding::Utf16BE, 2));
    }
    if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xFE {
        return Some((Encoding::Utf16LE, 2));
    }
    None
}

/// Detect whether `bytes` (with any BOM already stripped) is XML or JSON by
/// its first non-whitespace byte, as spec.md §4.D describes.
pub fn guess_content_type(bytes: &[u8]) -> ContentType {
    for &b in bytes {
        if b <= 32 {
            continue;
        }
        return match b {
            b'<' => ContentType::Xml,
            b'{' | b'[' | b'"' | b'\'' => ContentType::Json,
            _ => ContentType::Unknown,
        };
    }
    ContentType::Unknown
}

/// Pull the `encoding="..."` attribute out of a leading `<?xml ... ?>`
/// header, if present, normalizing away spaces/dashes/case before matching
/// against the known encoding names.
fn xml_header_encoding(bytes: &[u8]) -> Option<Encoding> {
    let head_end = bytes.windows(2).position(|w| w == b"?>")?;
    let head = std::str::from_utf8(&bytes[..head_end]).ok()?;
    if !head.trim_start().starts_with("<?xml") {
        return None;
    }
    let idx = head.find("encoding")?;
    let rest = &head[idx + "encoding".len()..];
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('=')?.trim_start();
    let quote = rest.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let rest = &rest[quote.len_utf8()..];
    let end = rest.find(quote)?;
    let name: String = rest[..end]
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    match name.as_str() {
        "utf8" => Some(Encoding::Utf8),
        "utf16" | "utf16be" => Some(Encoding::Utf16BE),
        "utf16le" => Some(Encoding::Utf16LE),
        "utf32" | "utf32be" => Some(Encoding::Utf32BE),
        "utf32le" => Some(Encoding::Utf32LE),
        _ => None,
    }
}

/// Guess a document's string encoding when the caller did not pin one down:
/// BOM first, then an XML header's `encoding` attribute, then a structural
/// heuristic counting zero-byte positions modulo 2 and modulo 4 over the
/// first kilobyte, which distinguishes UTF-16/32 and their endianness for
/// content with no BOM and no declared charset.
pub fn guess_string_encoding(bytes: &[u8]) -> Encoding {
    if let Some((enc, _)) = detect_bom(bytes) {
        return enc;
    }
    if let Some(enc) = xml_header_encoding(bytes) {
        return enc;
    }

    let window = &bytes[..bytes.len().min(1024)];
    let mut mcnt = [0u32; 4];
    for (i, &b) in window.iter().enumerate() {
        if b == 0 {
            mcnt[i % 4] += 1;
        }
    }
    if mcnt.iter().all(|&c| c == 0) {
        return Encoding::Utf8;
    }
    if mcnt[0] > mcnt[1] && mcnt[1] > mcnt[2] && mcnt[2] > mcnt[3] && mcnt[3] == 0 {
        return Encoding::Utf32BE;
    }
    if mcnt[0] == 0 && mcnt[0] < mcnt[1] && mcnt[1] < mcnt[2] && mcnt[2] < mcnt[3] {
        return Encoding::Utf32LE;
    }
    if mcnt[0] > mcnt[1] && mcnt[2] > mcnt[3] && mcnt[1] == 0 && mcnt[3] == 0 {
        return Encoding::Utf16BE;
    }
    if mcnt[0] == 0 && mcnt[2] == 0 && mcnt[0] < mcnt[1] && mcnt[2] < mcnt[3] {
        return Encoding::Utf16LE;
    }
    Encoding::Binary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_utf8_bom() {
        let bytes = [0xEF, 0xBB, 0xBF, b'<', b'a', b'>'];
        assert_eq!(detect_bom(&bytes), Some((Encoding::Utf8, 3)));
    }

    #[test]
    fn guesses_xml_and_json_by_lead_byte() {
        assert_eq!(guess_content_type(b"  <root/>"), ContentType::Xml);
        assert_eq!(guess_content_type(b"  {\"a\":1}"), ContentType::Json);
        assert_eq!(guess_content_type(b"   "), ContentType::Unknown);
    }

    #[test]
    fn reads_charset_from_xml_header() {
        let doc = b"<?xml version=\"1.0\" encoding=\"UTF-16LE\"?><a/>";
        assert_eq!(guess_string_encoding(doc), Encoding::Utf16LE);
    }

    #[test]
    fn falls_back_to_utf8_for_plain_ascii() {
        assert_eq!(guess_string_encoding(b"{\"a\":1}"), Encoding::Utf8);
    }
}
