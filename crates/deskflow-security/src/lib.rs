// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Security boundary of the Deskflow support engine.
//!
//! Tool-call requests are validated and scoped to the caller before any
//! record lookup, results are filtered to the caller's own records, inbound
//! messages are sanitized, and outgoing text is redacted.

pub mod redact;
pub mod sanitize;
pub mod tool_call;

pub use redact::{RedactingWriter, redact};
pub use sanitize::{MAX_MESSAGE_CHARS, sanitize_message};
pub use tool_call::{
    ScopedToolCall, authorize, is_valid_email, isolate_records, owned_by, validate_request,
};
