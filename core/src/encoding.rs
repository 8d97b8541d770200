//! Decoding of corpus sources and dictionaries in a configurable encoding.

use encoding_rs::Encoding;
use std::path::Path;

use crate::error::{Result, WvError};

pub const DEFAULT_ENCODING: &str = "utf-8";

/// Looks up an encoding by WHATWG label (`utf-8`, `gbk`, `gb18030`, ...).
pub fn resolve(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| WvError::config(format!("unknown encoding `{label}`")))
}

/// Like [`resolve`], restricted to encodings where `\n` is a line break byte.
pub fn resolve_line_oriented(label: &str) -> Result<&'static Encoding> {
    let encoding = resolve(label)?;
    if !encoding.is_ascii_compatible() {
        return Err(WvError::config(format!(
            "encoding `{}` cannot be read line by line",
            encoding.name()
        )));
    }
    Ok(encoding)
}

/// Decodes `bytes`, honouring a byte order mark. Malformed sequences become
/// U+FFFD and are counted in a warning.
pub fn decode(bytes: &[u8], encoding: &'static Encoding, source: &Path) -> String {
    let (text, actual, had_errors) = encoding.decode(bytes);
    if had_errors {
        let replaced = text.matches('\u{FFFD}').count();
        tracing::warn!(
            source = %source.display(),
            encoding = actual.name(),
            replaced,
            "malformed byte sequences replaced while decoding"
        );
    }
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GBK_ZHONGWEN: &[u8] = &[0xD6, 0xD0, 0xCE, 0xC4];

    #[test]
    fn decodes_gbk() {
        let gbk = resolve("GBK").unwrap();
        assert_eq!(decode(GBK_ZHONGWEN, gbk, Path::new("x")), "中文");
    }

    #[test]
    fn invalid_bytes_are_replaced_not_dropped() {
        let utf8 = resolve(DEFAULT_ENCODING).unwrap();
        let text = decode(GBK_ZHONGWEN, utf8, Path::new("x"));
        assert!(!text.is_empty());
        assert!(text.contains('\u{FFFD}'));
    }

    #[test]
    fn unknown_label_is_config_error() {
        assert!(matches!(resolve("klingon-8"), Err(WvError::Configuration(_))));
        assert!(matches!(resolve_line_oriented("utf-16le"), Err(WvError::Configuration(_))));
        assert!(resolve_line_oriented("gb18030").is_ok());
    }
}
