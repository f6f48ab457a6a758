// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intent to agent routing table.

use deskflow_core::state::{AgentKind, Intent, IntentClassification};

/// The agent that handles `intent`. Absent classifications go to the formatter.
pub fn route(intent: Option<Intent>) -> AgentKind {
    match intent {
        Some(Intent::RefundRequest | Intent::TicketCreate) => AgentKind::Refund,
        Some(Intent::OrderInquiry | Intent::ProductSearch) => AgentKind::Retrieval,
        Some(Intent::GeneralSupport) | None => AgentKind::Formatter,
    }
}

/// Routes on a full classification.
pub fn route_classification(classification: Option<&IntentClassification>) -> AgentKind {
    route(classification.map(|c| c.intent))
}
