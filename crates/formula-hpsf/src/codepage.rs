//! Codepage ids and the text encodings behind them.
//!
//! UTF-16 (1200/1201), US-ASCII (20127) and ISO-8859-1 (28591) are handled here directly;
//! everything else goes through `encoding_rs`, whose WHATWG labels fold the last two into
//! windows-1252.

use std::collections::BTreeSet;
use std::sync::{Mutex, OnceLock};

use encoding_rs::{
    Encoding, BIG5, EUC_JP, EUC_KR, GB18030, GBK, IBM866, ISO_2022_JP, ISO_8859_10, ISO_8859_13,
    ISO_8859_14, ISO_8859_15, ISO_8859_16, ISO_8859_2, ISO_8859_3, ISO_8859_4, ISO_8859_5,
    ISO_8859_6, ISO_8859_7, ISO_8859_8, KOI8_R, KOI8_U, MACINTOSH, SHIFT_JIS, UTF_16BE,
    UTF_16LE, UTF_8, WINDOWS_1250, WINDOWS_1251, WINDOWS_1252, WINDOWS_1253, WINDOWS_1254,
    WINDOWS_1255, WINDOWS_1256, WINDOWS_1257, WINDOWS_1258, WINDOWS_874, X_MAC_CYRILLIC,
};

use crate::{Error, Result};

pub const CP_UTF16: u16 = 1200;
pub const CP_UTF16_BE: u16 = 1201;
pub const CP_WINDOWS_1252: u16 = 1252;
pub const CP_MAC_ROMAN: u16 = 10000;
pub const CP_US_ASCII: u16 = 20127;
pub const CP_ISO_8859_1: u16 = 28591;
pub const CP_UTF8: u16 = 65001;

/// Codepage assumed for sections without a codepage property.
pub const DEFAULT_CODEPAGE: u16 = CP_WINDOWS_1252;

pub fn encoding_for_codepage(codepage: u16) -> Option<&'static Encoding> {
    Some(match codepage {
        866 => IBM866,
        874 => WINDOWS_874,
        932 => SHIFT_JIS,
        936 => GBK,
        949 => EUC_KR,
        950 => BIG5,
        1200 => UTF_16LE,
        1201 => UTF_16BE,
        1250 => WINDOWS_1250,
        1251 => WINDOWS_1251,
        1252 => WINDOWS_1252,
        1253 => WINDOWS_1253,
        1254 => WINDOWS_1254,
        1255 => WINDOWS_1255,
        1256 => WINDOWS_1256,
        1257 => WINDOWS_1257,
        1258 => WINDOWS_1258,
        10000 => MACINTOSH,
        10007 => X_MAC_CYRILLIC,
        20866 => KOI8_R,
        20932 | 51932 => EUC_JP,
        21866 => KOI8_U,
        28592 => ISO_8859_2,
        28593 => ISO_8859_3,
        28594 => ISO_8859_4,
        28595 => ISO_8859_5,
        28596 => ISO_8859_6,
        28597 => ISO_8859_7,
        28598 => ISO_8859_8,
        28600 => ISO_8859_10,
        28603 => ISO_8859_13,
        28604 => ISO_8859_14,
        28605 => ISO_8859_15,
        28606 => ISO_8859_16,
        50220 => ISO_2022_JP,
        54936 => GB18030,
        65001 => UTF_8,
        _ => return None,
    })
}

pub fn is_supported(codepage: u16) -> bool {
    matches!(codepage, CP_US_ASCII | CP_ISO_8859_1) || encoding_for_codepage(codepage).is_some()
}

pub fn is_utf16(codepage: u16) -> bool {
    matches!(codepage, CP_UTF16 | CP_UTF16_BE)
}

/// Width in bytes of one code unit, and so of the string terminator.
pub fn unit_width(codepage: u16) -> usize {
    if is_utf16(codepage) {
        2
    } else {
        1
    }
}

/// Decode `bytes` without interpreting terminators.
///
/// Unsupported codepages are mapped byte-to-char (ISO-8859-1 style) after a one-time warning, so
/// ASCII text survives.
pub fn decode(codepage: u16, bytes: &[u8]) -> String {
    match codepage {
        CP_US_ASCII | CP_ISO_8859_1 => return bytes.iter().copied().map(char::from).collect(),
        _ => {}
    }
    if let Some(encoding) = encoding_for_codepage(codepage) {
        let (cow, _) = encoding.decode_without_bom_handling(bytes);
        return cow.into_owned();
    }

    warn_unsupported_codepage(codepage);
    bytes.iter().copied().map(char::from).collect()
}

/// Encode `text` without a terminator, failing instead of substituting characters.
pub fn encode(codepage: u16, text: &str) -> Result<Vec<u8>> {
    let unrepresentable = || Error::Unrepresentable {
        codepage,
        text: text.to_string(),
    };
    match codepage {
        CP_UTF16 => return Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
        CP_UTF16_BE => return Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
        CP_US_ASCII => {
            return text
                .chars()
                .map(|c| if c.is_ascii() { Some(c as u8) } else { None })
                .collect::<Option<Vec<u8>>>()
                .ok_or_else(unrepresentable);
        }
        CP_ISO_8859_1 => {
            return text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).ok())
                .collect::<Option<Vec<u8>>>()
                .ok_or_else(unrepresentable);
        }
        _ => {}
    }

    let encoding = encoding_for_codepage(codepage).ok_or(Error::UnsupportedCodepage(codepage))?;
    let (bytes, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(unrepresentable());
    }
    Ok(bytes.into_owned())
}

fn warn_unsupported_codepage(codepage: u16) {
    static WARNED: OnceLock<Mutex<BTreeSet<u16>>> = OnceLock::new();

    let warned = WARNED.get_or_init(|| Mutex::new(BTreeSet::new()));
    let mut warned = match warned.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    if warned.insert(codepage) {
        log::warn!(
            "unsupported property-set codepage {codepage}; decoding 8-bit strings using lossless byte-to-Unicode mapping"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn narrow_codepage_rejects_unmappable_text() {
        assert!(matches!(
            encode(CP_WINDOWS_1252, "日本"),
            Err(Error::Unrepresentable { codepage: 1252, .. })
        ));
        assert_eq!(encode(CP_WINDOWS_1252, "€uro").unwrap(), b"\x80uro");
    }

    #[test]
    fn unknown_codepage_is_a_distinct_error() {
        assert!(matches!(
            encode(437, "abc"),
            Err(Error::UnsupportedCodepage(437))
        ));
        assert!(!is_supported(437));
        assert_eq!(decode(437, b"abc"), "abc");
    }

    #[test]
    fn unicode_codepages_round_trip() {
        for codepage in [CP_UTF16, CP_UTF16_BE, CP_UTF8] {
            let bytes = encode(codepage, "日本 Ω").unwrap();
            assert_eq!(decode(codepage, &bytes), "日本 Ω");
        }
        assert_eq!(encode(CP_UTF16, "A").unwrap(), vec![0x41, 0x00]);
        assert_eq!(unit_width(CP_UTF16), 2);
        assert_eq!(unit_width(CP_UTF8), 1);
    }

    #[test]
    fn latin1_and_ascii_are_exact() {
        assert_eq!(encode(CP_ISO_8859_1, "\u{80}é").unwrap(), vec![0x80, 0xE9]);
        assert_eq!(decode(CP_ISO_8859_1, &[0x80, 0xE9]), "\u{80}é");
        assert!(encode(CP_US_ASCII, "é").is_err());
        assert_eq!(encode(CP_US_ASCII, "ok").unwrap(), b"ok");
    }
}
