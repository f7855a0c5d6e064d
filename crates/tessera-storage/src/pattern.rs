//! LIKE pattern compilation.

use regex::Regex;
use tessera_common::{Result, TesseraError, Value};

/// Compiles a LIKE pattern into an anchored regex.
///
/// `%` matches any run of characters (including none); every other
/// character, `_` included, matches itself. The whole cell must match.
pub fn like_regex(pattern: &Value) -> Result<Regex> {
    let text = pattern.as_str().ok_or_else(|| TesseraError::TypeMismatch {
        expected: "str".to_string(),
        actual: pattern.type_name().to_string(),
    })?;

    let mut source = String::with_capacity(text.len() + 8);
    source.push_str("^(?s:");
    for (i, literal) in text.split('%').enumerate() {
        if i > 0 {
            source.push_str(".*");
        }
        source.push_str(&regex::escape(literal));
    }
    source.push_str(")$");

    Regex::new(&source).map_err(|e| TesseraError::InvalidPattern(e.to_string()))
}
