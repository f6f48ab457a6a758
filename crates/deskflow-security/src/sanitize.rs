// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound message sanitization.

use deskflow_core::DeskflowError;

/// Longest accepted message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4_000;

/// Trims the message and strips control characters other than newlines and tabs.
///
/// Empty results and messages over [`MAX_MESSAGE_CHARS`] are validation errors.
pub fn sanitize_message(input: &str) -> Result<String, DeskflowError> {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(DeskflowError::validation("message is empty"));
    }
    let chars = cleaned.chars().count();
    if chars > MAX_MESSAGE_CHARS {
        return Err(DeskflowError::validation(format!(
            "message is {chars} characters, the limit is {MAX_MESSAGE_CHARS}"
        )));
    }
    Ok(cleaned.to_string())
}
