use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::error::DaliError;

lazy_static! {
    // First group captures quoted strings (double or single), second group
    // captures comments (// single-line or /* multi-line */). Matching the
    // quoted alternative first keeps comment syntax inside strings intact.
    static ref COMMENT_RX: Regex =
        Regex::new(r#"(?ms)(".*?"|'.*?')|(/\*.*?\*/|//[^\r\n]*$)"#).unwrap();
}

/// Removes `//` and `/* */` comments from the document text while leaving
/// quoted strings untouched.
pub fn strip_comments(text: &str) -> String {
    COMMENT_RX
        .replace_all(text, |caps: &regex::Captures| {
            match caps.get(1) {
                // Quoted string, keep it verbatim.
                Some(m) => m.as_str().to_string(),
                // Real comment, drop it.
                None => String::new(),
            }
        })
        .into_owned()
}

/// Reads the register document from disk, strips comments and decodes the
/// remaining text into a generic json tree.
pub fn load_document(path: &Path) -> Result<Value, DaliError> {
    let content = fs::read_to_string(path)?;
    let stripped = strip_comments(&content);

    serde_json::from_str(&stripped).map_err(|e| DaliError::Decode {
        path: path.display().to_string(),
        msg:  e.to_string(),
    })
}
