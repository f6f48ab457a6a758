// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation state shared by every workflow, and its typed update model.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::intent::{ExtractedEntities, IntentClassification};
use super::refund::RefundState;
use super::retrieval::RetrievalState;

/// The agents a conversation can be handed to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentKind {
    Router,
    Refund,
    Retrieval,
    Formatter,
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// One message in a conversation. Messages are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Rough token estimate used for the conversation's token counter.
    pub fn approx_tokens(&self) -> u64 {
        self.content.split_whitespace().count() as u64
    }
}

/// Inclusive date range mentioned by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Query context extracted from the conversation so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryContext {
    pub order_id: Option<String>,
    pub product_id: Option<String>,
    pub customer_email: Option<String>,
    pub query: Option<String>,
    pub date_range: Option<DateRange>,
}

impl QueryContext {
    /// Deep merge: every field present in `other` replaces the current value.
    pub fn merge(&mut self, other: QueryContext) {
        if other.order_id.is_some() {
            self.order_id = other.order_id;
        }
        if other.product_id.is_some() {
            self.product_id = other.product_id;
        }
        if other.customer_email.is_some() {
            self.customer_email = other.customer_email;
        }
        if other.query.is_some() {
            self.query = other.query;
        }
        if other.date_range.is_some() {
            self.date_range = other.date_range;
        }
    }

    /// Builds a context delta from classifier/extractor entities.
    pub fn from_entities(entities: &ExtractedEntities) -> Self {
        Self {
            order_id: entities.order_id.clone(),
            product_id: entities.product_id.clone(),
            customer_email: entities.customer_email.clone(),
            query: entities.query.clone(),
            date_range: None,
        }
    }
}

/// Outcome of one tool call made on behalf of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub tool: String,
    pub success: bool,
    pub data: serde_json::Value,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ToolCallResult {
    pub fn ok(tool: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            tool: tool.into(),
            success: true,
            data,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(tool: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            success: false,
            data: serde_json::Value::Null,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

/// Display shapes the formatter can render.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutputShape {
    /// Free text / markdown.
    #[default]
    Markdown,
    /// Pretty-printed structured data.
    Structured,
    /// Chart-ready tabular data.
    Chart,
}

/// What the formatter last produced for the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattingState {
    pub shape: OutputShape,
    /// Agent whose result was rendered.
    pub source: AgentKind,
    pub rendered: String,
    pub chunk_count: usize,
}

/// The single active workflow sub-state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Idle,
    Refund(RefundState),
    Retrieval(RetrievalState),
    Formatting(FormattingState),
}

/// Bookkeeping about the thread itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMetadata {
    pub thread_id: String,
    pub user_id: Option<String>,
    pub session_start: DateTime<Utc>,
    /// How many times each node has run in this thread.
    pub node_visits: BTreeMap<String, u32>,
    pub token_count: u64,
}

/// Full conversation state checkpointed after every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub messages: Vec<ChatMessage>,
    pub intent: Option<IntentClassification>,
    pub query_context: QueryContext,
    pub tool_results: Vec<ToolCallResult>,
    pub workflow: WorkflowState,
    pub current_agent: AgentKind,
    pub metadata: StateMetadata,
}

impl ConversationState {
    /// Initial state for a brand-new thread.
    pub fn new(thread_id: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            messages: Vec::new(),
            intent: None,
            query_context: QueryContext::default(),
            tool_results: Vec::new(),
            workflow: WorkflowState::Idle,
            current_agent: AgentKind::Router,
            metadata: StateMetadata {
                thread_id: thread_id.into(),
                user_id,
                session_start: Utc::now(),
                node_visits: BTreeMap::new(),
                token_count: 0,
            },
        }
    }

    /// Applies a partial update.
    ///
    /// | field          | rule                                   |
    /// |----------------|----------------------------------------|
    /// | messages       | append                                 |
    /// | intent         | replace when present                   |
    /// | query_context  | field-wise merge, present fields win   |
    /// | tool_results   | append                                 |
    /// | workflow       | replace when present                   |
    /// | current_agent  | replace when present                   |
    /// | visited_node   | increment that node's visit counter    |
    /// | token_count    | += appended messages + `extra_tokens`  |
    pub fn apply(&mut self, update: StateUpdate) {
        let appended_tokens: u64 = update.messages.iter().map(ChatMessage::approx_tokens).sum();
        self.messages.extend(update.messages);
        self.metadata.token_count += appended_tokens + update.extra_tokens;

        if let Some(intent) = update.intent {
            self.intent = Some(intent);
        }
        if let Some(ctx) = update.query_context {
            self.query_context.merge(ctx);
        }
        self.tool_results.extend(update.tool_results);
        if let Some(workflow) = update.workflow {
            self.workflow = workflow;
        }
        if let Some(agent) = update.current_agent {
            self.current_agent = agent;
        }
        if let Some(node) = update.visited_node {
            *self.metadata.node_visits.entry(node).or_insert(0) += 1;
        }
    }

    /// The last `n` messages, oldest first.
    pub fn recent_messages(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn refund_state(&self) -> Option<&RefundState> {
        match &self.workflow {
            WorkflowState::Refund(state) => Some(state),
            _ => None,
        }
    }

    pub fn last_assistant_message(&self) -> Option<&ChatMessage> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }
}

/// A partial update to [`ConversationState`]. See [`ConversationState::apply`].
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub messages: Vec<ChatMessage>,
    pub intent: Option<IntentClassification>,
    pub query_context: Option<QueryContext>,
    pub tool_results: Vec<ToolCallResult>,
    pub workflow: Option<WorkflowState>,
    pub current_agent: Option<AgentKind>,
    pub visited_node: Option<String>,
    pub extra_tokens: u64,
}

impl StateUpdate {
    /// An update that only records a node visit and hands control to `agent`.
    pub fn visit(node: impl Into<String>, agent: AgentKind) -> Self {
        Self {
            visited_node: Some(node.into()),
            current_agent: Some(agent),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_starts_at_router() {
        let state = ConversationState::new("thread-1", Some("user-1".into()));
        assert_eq!(state.current_agent, AgentKind::Router);
        assert_eq!(state.workflow, WorkflowState::Idle);
        assert!(state.messages.is_empty());
        assert_eq!(state.metadata.thread_id, "thread-1");
    }

    #[test]
    fn apply_appends_messages_and_counts_tokens() {
        let mut state = ConversationState::new("t", None);
        state.apply(StateUpdate {
            messages: vec![ChatMessage::user("where is my order")],
            ..StateUpdate::default()
        });
        state.apply(StateUpdate {
            messages: vec![ChatMessage::assistant("it shipped")],
            extra_tokens: 10,
            ..StateUpdate::default()
        });
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].content, "where is my order");
        assert_eq!(state.metadata.token_count, 4 + 2 + 10);
    }

    #[test]
    fn empty_update_never_shrinks_messages() {
        let mut state = ConversationState::new("t", None);
        state.apply(StateUpdate {
            messages: vec![ChatMessage::user("hi")],
            ..StateUpdate::default()
        });
        state.apply(StateUpdate::default());
        assert_eq!(state.messages.len(), 1);
    }

    #[test]
    fn query_context_merge_keeps_existing_fields() {
        let mut state = ConversationState::new("t", None);
        state.apply(StateUpdate {
            query_context: Some(QueryContext {
                order_id: Some("1234".into()),
                customer_email: Some("a@example.com".into()),
                ..QueryContext::default()
            }),
            ..StateUpdate::default()
        });
        state.apply(StateUpdate {
            query_context: Some(QueryContext {
                order_id: Some("5678".into()),
                ..QueryContext::default()
            }),
            ..StateUpdate::default()
        });
        assert_eq!(state.query_context.order_id.as_deref(), Some("5678"));
        assert_eq!(
            state.query_context.customer_email.as_deref(),
            Some("a@example.com")
        );
    }

    #[test]
    fn node_visits_accumulate() {
        let mut state = ConversationState::new("t", None);
        state.apply(StateUpdate::visit("router", AgentKind::Router));
        state.apply(StateUpdate::visit("router", AgentKind::Refund));
        state.apply(StateUpdate::visit("refund", AgentKind::Refund));
        assert_eq!(state.metadata.node_visits["router"], 2);
        assert_eq!(state.metadata.node_visits["refund"], 1);
        assert_eq!(state.current_agent, AgentKind::Refund);
    }

    #[test]
    fn workflow_replacement_is_exclusive() {
        let mut state = ConversationState::new("t", None);
        state.apply(StateUpdate {
            workflow: Some(WorkflowState::Formatting(FormattingState {
                shape: OutputShape::Markdown,
                source: AgentKind::Formatter,
                rendered: "hello".into(),
                chunk_count: 2,
            })),
            ..StateUpdate::default()
        });
        assert!(matches!(state.workflow, WorkflowState::Formatting(_)));
        assert!(state.refund_state().is_none());
    }

    #[test]
    fn recent_messages_window() {
        let mut state = ConversationState::new("t", None);
        for i in 0..5 {
            state.apply(StateUpdate {
                messages: vec![ChatMessage::user(format!("m{i}"))],
                ..StateUpdate::default()
            });
        }
        let recent = state.recent_messages(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "m3");
        assert_eq!(state.recent_messages(50).len(), 5);
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut state = ConversationState::new("t", Some("u".into()));
        state.apply(StateUpdate {
            messages: vec![ChatMessage::user("refund order #1234")],
            tool_results: vec![ToolCallResult::ok("lookup", serde_json::json!({"a": 1}))],
            visited_node: Some("router".into()),
            ..StateUpdate::default()
        });
        let json = serde_json::to_string(&state).unwrap();
        let back: ConversationState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
