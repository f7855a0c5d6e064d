//! Program result envelope.

use serde::{Deserialize, Serialize};
use tessera_common::{Row, TesseraError};

/// Outcome of running one program.
///
/// On success `content` is the final table register (empty when the program
/// only mutates). On failure `content` is empty and `error_message` carries
/// the error text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub success: bool,
    pub content: Vec<Row>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ResultEnvelope {
    pub fn success(content: Vec<Row>) -> Self {
        Self {
            success: true,
            content,
            error_message: None,
        }
    }

    pub fn failure(error: &TesseraError) -> Self {
        Self {
            success: false,
            content: Vec::new(),
            error_message: Some(error.to_string()),
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.success
    }
}
