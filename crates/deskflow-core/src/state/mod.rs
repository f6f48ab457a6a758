// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation state model shared by the router and every workflow.

pub mod conversation;
pub mod intent;
pub mod refund;
pub mod retrieval;

pub use conversation::{
    AgentKind, ChatMessage, ConversationState, DateRange, FormattingState, OutputShape,
    QueryContext, Role, StateMetadata, StateUpdate, ToolCallResult, WorkflowState,
};
pub use intent::{ExtractedEntities, Intent, IntentClassification};
pub use refund::{
    AmountValidation, EligibilityCheck, PaymentDetails, RefundNode, RefundReason, RefundState,
    RefundStatus, RefundSummary, RefundUpdate, format_amount,
};
pub use retrieval::{
    RetrievalState, RetrievalTimings, RoutingDecision, ScoredHit, SourceFailure,
};
