// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record source trait backing validated tool calls.

use async_trait::async_trait;

use crate::error::DeskflowError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{RecordIdentifier, RecordKind};

/// Customer, product, order and ticket lookups.
///
/// Returned records are JSON objects. Customer-owned records carry the
/// owner's address in an `email` or `customer_email` field.
#[async_trait]
pub trait RecordSource: PluginAdapter {
    async fn fetch(
        &self,
        kind: RecordKind,
        identifier: &RecordIdentifier,
    ) -> Result<Vec<serde_json::Value>, DeskflowError>;
}
