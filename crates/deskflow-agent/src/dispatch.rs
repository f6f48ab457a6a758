// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool-call dispatch against the record source.
//!
//! A request is authorized before any lookup runs, every identifier is
//! fetched concurrently, and the combined records pass through isolation
//! so only the caller's own records come back.

use std::sync::Arc;

use futures::future::try_join_all;
use serde_json::{Value, json};
use tracing::{debug, warn};

use deskflow_core::state::ToolCallResult;
use deskflow_core::types::{RecordKind, ToolCallRequest};
use deskflow_core::{DeskflowError, RecordSource};
use deskflow_security::{authorize, isolate_records};

/// Records returned by one authorized tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub kind: RecordKind,
    pub user_email: String,
    pub records: Vec<Value>,
    /// Records removed because another user owns them.
    pub dropped: usize,
}

impl ToolOutcome {
    /// Tool name recorded in conversation state, e.g. `lookup_order`.
    pub fn tool_name(&self) -> String {
        tool_name(self.kind)
    }

    /// The result appended to conversation state.
    pub fn to_result(&self) -> ToolCallResult {
        ToolCallResult::ok(
            self.tool_name(),
            json!({
                "kind": self.kind,
                "count": self.records.len(),
                "records": self.records,
            }),
        )
    }
}

pub(crate) fn tool_name(kind: RecordKind) -> String {
    format!("lookup_{kind}")
}

/// Runs validated tool calls.
pub struct ToolCallDispatcher {
    records: Arc<dyn RecordSource>,
}

impl ToolCallDispatcher {
    pub fn new(records: Arc<dyn RecordSource>) -> Self {
        Self { records }
    }

    /// Authorizes `request`, fetches every identifier, and isolates the records.
    ///
    /// Validation and authorization failures happen before the record
    /// source is contacted.
    pub async fn dispatch(&self, request: &ToolCallRequest) -> Result<ToolOutcome, DeskflowError> {
        let scoped = authorize(request)?;
        debug!(
            kind = %scoped.kind,
            identifiers = scoped.identifiers.len(),
            "dispatching tool call"
        );

        let fetches = scoped
            .identifiers
            .iter()
            .map(|id| self.records.fetch(scoped.kind, id));
        let batches = try_join_all(fetches).await.inspect_err(|e| {
            warn!(kind = %scoped.kind, error = %e, "record lookup failed");
        })?;

        let mut fetched: Vec<Value> = Vec::new();
        for record in batches.into_iter().flatten() {
            if !fetched.contains(&record) {
                fetched.push(record);
            }
        }

        let (records, dropped) = isolate_records(&scoped.user_email, fetched);
        Ok(ToolOutcome {
            kind: scoped.kind,
            user_email: scoped.user_email,
            records,
            dropped,
        })
    }

    /// Like [`dispatch`](Self::dispatch), but never fails: errors become a
    /// failed [`ToolCallResult`] carrying the sanitized message.
    pub async fn dispatch_to_result(&self, request: &ToolCallRequest) -> ToolCallResult {
        match self.dispatch(request).await {
            Ok(outcome) => outcome.to_result(),
            Err(e) => ToolCallResult::failed(tool_name(request.kind), e.user_message()),
        }
    }
}
