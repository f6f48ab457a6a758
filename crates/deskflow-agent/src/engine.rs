// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The support engine: one message in, one checkpointed response out.
//!
//! Per request the engine:
//! 1. sanitizes the message and loads the thread's latest checkpoint
//!    (or starts a fresh state),
//! 2. classifies the message and merges the extracted entities into the
//!    shared query context,
//! 3. dispatches to the refund workflow, the retrieval pipeline, or
//!    straight to the formatter,
//! 4. renders the workflow result and records the assistant reply,
//! 5. writes a new checkpoint before returning.
//!
//! Validation and authorization failures end the request without a
//! checkpoint. Checkpoint read and write failures are logged and never
//! reach the caller.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use deskflow_config::DeskflowConfig;
use deskflow_core::state::{
    AgentKind, ChatMessage, ConversationState, Intent, IntentClassification, OutputShape,
    QueryContext, StateUpdate, ToolCallResult, WorkflowState,
};
use deskflow_core::types::{RecordIdentifier, RecordKind, SearchContext, ToolCallRequest};
use deskflow_core::{
    CheckpointStore, DeskflowError, PaymentGateway, PluginAdapter, RecordSource, SearchBackend,
    TextClassifier,
};
use deskflow_format::{Chunks, FormattedResponse, ResponseFormatter, WorkflowResult};
use deskflow_refund::{RefundPolicy, RefundWorkflow};
use deskflow_retrieval::HybridSearchRouter;
use deskflow_router::{IntentClassifier, route_classification};
use deskflow_security::sanitize_message;

use crate::dispatch::{ToolCallDispatcher, tool_name};
use crate::threads::ThreadManager;

const REFUND_TOOL: &str = "refund";
const TICKET_TOOL: &str = "create_ticket";
const SEARCH_TOOL: &str = "hybrid_search";

const MISSING_ORDER_PROMPT: &str = "I can help with that refund. Which order is it for? \
Please reply with the order number, for example #1234.";

const GENERAL_REPLY: &str = "I can help with refunds, order status, product questions and \
support tickets. What would you like to do?";

const UNSURE_REPLY: &str = "I'm not sure I understood that. I can help with refunds, order \
status, product questions and support tickets. Could you tell me a bit more?";

const RECOMMENDATION_WORDS: &[&str] = &["recommend", "suggest", "similar", "alternative"];

/// External collaborators the engine talks to.
#[derive(Clone)]
pub struct EngineAdapters {
    pub store: Arc<dyn CheckpointStore>,
    pub classifier: Arc<dyn TextClassifier>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub lexical: Arc<dyn SearchBackend>,
    pub semantic: Arc<dyn SearchBackend>,
    pub records: Arc<dyn RecordSource>,
}

/// One inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRequest {
    pub thread_id: String,
    pub message: String,
    pub user_id: Option<String>,
    /// Authenticated address of the caller. Record lookups need it.
    pub user_email: Option<String>,
    /// Output shape; the formatter default when `None`.
    pub shape: Option<OutputShape>,
}

impl EngineRequest {
    pub fn new(thread_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            message: message.into(),
            user_id: None,
            user_email: None,
            shape: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.user_email = Some(email.into());
        self
    }

    pub fn with_shape(mut self, shape: OutputShape) -> Self {
        self.shape = Some(shape);
        self
    }
}

/// The engine's answer to one message.
#[derive(Debug, Clone)]
pub struct EngineResponse {
    pub thread_id: String,
    /// `None` when the checkpoint write failed.
    pub checkpoint_id: Option<String>,
    pub intent: IntentClassification,
    pub agent: AgentKind,
    pub response: FormattedResponse,
}

impl EngineResponse {
    pub fn content(&self) -> &str {
        &self.response.content
    }

    /// A fresh chunk sequence over the rendered content.
    pub fn chunks(&self) -> Chunks {
        self.response.chunks()
    }
}

/// What a workflow handed to the formatter.
struct Dispatched {
    result: WorkflowResult,
    tool_results: Vec<ToolCallResult>,
    /// Sub-state to keep instead of the formatting state.
    workflow: Option<WorkflowState>,
}

impl Dispatched {
    fn message(text: impl Into<String>) -> Self {
        Self {
            result: WorkflowResult::Message(text.into()),
            tool_results: Vec::new(),
            workflow: None,
        }
    }
}

/// Orchestrates classification, workflows, formatting and checkpointing.
pub struct SupportEngine {
    store: Arc<dyn CheckpointStore>,
    classifier: IntentClassifier,
    refunds: RefundWorkflow,
    search: HybridSearchRouter,
    formatter: ResponseFormatter,
    tools: ToolCallDispatcher,
}

impl SupportEngine {
    pub fn new(config: &DeskflowConfig, adapters: EngineAdapters) -> Self {
        info!(
            agent_name = config.agent.name.as_str(),
            store = adapters.store.name(),
            classifier = adapters.classifier.name(),
            "support engine initialized"
        );
        Self {
            store: adapters.store,
            classifier: IntentClassifier::new(adapters.classifier, &config.router),
            refunds: RefundWorkflow::new(
                adapters.gateway,
                RefundPolicy::from_config(&config.refund),
            ),
            search: HybridSearchRouter::new(adapters.lexical, adapters.semantic, &config.retrieval),
            formatter: ResponseFormatter::new(&config.formatter),
            tools: ToolCallDispatcher::new(adapters.records),
        }
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// Thread operations over the engine's store.
    pub fn threads(&self) -> ThreadManager {
        ThreadManager::new(Arc::clone(&self.store))
    }

    /// Handles one message end to end.
    ///
    /// Errors are terminal for the request: a blank thread id, an invalid
    /// message, or an authorization failure during a record lookup. Every
    /// other failure is recorded in state and rendered as reply text.
    pub async fn handle_message(
        &self,
        request: &EngineRequest,
    ) -> Result<EngineResponse, DeskflowError> {
        let thread_id = request.thread_id.trim();
        if thread_id.is_empty() {
            return Err(DeskflowError::validation("thread id is required"));
        }
        let message = sanitize_message(&request.message)?;

        let mut state = self.load_state(thread_id, request.user_id.as_deref()).await;
        state.apply(StateUpdate {
            messages: vec![ChatMessage::user(message.clone())],
            ..StateUpdate::visit(AgentKind::Router.to_string(), AgentKind::Router)
        });

        let history = &state.messages[..state.messages.len() - 1];
        let classification = self
            .classifier
            .classify(&message, history, &state.query_context)
            .await;
        let agent = route_classification(Some(&classification));
        info!(
            thread_id,
            intent = %classification.intent,
            confidence = classification.confidence,
            fallback = classification.fallback,
            %agent,
            "message routed"
        );
        state.apply(StateUpdate {
            intent: Some(classification.clone()),
            query_context: Some(QueryContext::from_entities(&classification.entities)),
            current_agent: Some(agent),
            ..StateUpdate::default()
        });

        let dispatched = match agent {
            AgentKind::Refund => self.run_refund(&state, &classification, &message).await?,
            AgentKind::Retrieval => {
                self.run_retrieval(
                    &state,
                    &classification,
                    &message,
                    request.user_email.as_deref(),
                )
                .await?
            }
            AgentKind::Router | AgentKind::Formatter => general_reply(&classification),
        };
        if agent != AgentKind::Formatter {
            state.apply(StateUpdate::visit(agent.to_string(), agent));
        }

        let response = self.formatter.format(&dispatched.result, request.shape);
        let workflow = dispatched.workflow.unwrap_or_else(|| {
            WorkflowState::Formatting(self.formatter.state_for(&dispatched.result, &response))
        });
        state.apply(StateUpdate {
            messages: vec![ChatMessage::assistant(response.content.to_string())],
            tool_results: dispatched.tool_results,
            workflow: Some(workflow),
            ..StateUpdate::visit(AgentKind::Formatter.to_string(), AgentKind::Formatter)
        });

        let metadata = json!({
            "intent": classification.intent,
            "agent": agent,
            "shape": response.shape,
            "fallback": classification.fallback,
        });
        let checkpoint_id = self.persist(thread_id, &state, metadata).await;

        Ok(EngineResponse {
            thread_id: thread_id.to_string(),
            checkpoint_id,
            intent: classification,
            agent,
            response,
        })
    }

    /// Runs a tool call on behalf of a thread and records its result.
    ///
    /// Validation and authorization failures are returned and leave the
    /// thread untouched. Record-source failures are recorded as a failed
    /// result.
    pub async fn call_tool(
        &self,
        thread_id: &str,
        request: &ToolCallRequest,
    ) -> Result<ToolCallResult, DeskflowError> {
        let result = match self.tools.dispatch(request).await {
            Ok(outcome) => outcome.to_result(),
            Err(e) if e.is_terminal() => return Err(e),
            Err(e) => ToolCallResult::failed(tool_name(request.kind), e.user_message()),
        };

        let mut state = self.load_state(thread_id, None).await;
        state.apply(StateUpdate {
            tool_results: vec![result.clone()],
            ..StateUpdate::default()
        });
        self.persist(thread_id, &state, json!({ "tool": result.tool }))
            .await;
        Ok(result)
    }

    async fn load_state(&self, thread_id: &str, user_id: Option<&str>) -> ConversationState {
        match self.store.load(thread_id, None).await {
            Ok(Some(mut state)) => {
                debug!(thread_id, messages = state.messages.len(), "checkpoint loaded");
                if state.metadata.user_id.is_none() {
                    state.metadata.user_id = user_id.map(str::to_string);
                }
                state
            }
            Ok(None) => ConversationState::new(thread_id, user_id.map(str::to_string)),
            Err(e) => {
                warn!(thread_id, error = %e, "checkpoint read failed, starting a fresh state");
                ConversationState::new(thread_id, user_id.map(str::to_string))
            }
        }
    }

    async fn persist(
        &self,
        thread_id: &str,
        state: &ConversationState,
        metadata: Value,
    ) -> Option<String> {
        let checkpoint_id = Uuid::new_v4().to_string();
        match self
            .store
            .save(thread_id, &checkpoint_id, state, metadata, None)
            .await
        {
            Ok(record) => {
                debug!(thread_id, checkpoint_id = %record.checkpoint_id, "checkpoint saved");
                Some(record.checkpoint_id)
            }
            Err(e) => {
                warn!(thread_id, error = %e, "checkpoint write failed");
                None
            }
        }
    }

    async fn run_refund(
        &self,
        state: &ConversationState,
        classification: &IntentClassification,
        message: &str,
    ) -> Result<Dispatched, DeskflowError> {
        if classification.intent == Intent::TicketCreate {
            return Ok(escalate(state, message));
        }
        let Some(order_id) = state.query_context.order_id.as_deref() else {
            return Ok(Dispatched::message(MISSING_ORDER_PROMPT));
        };

        let attempt = self.refunds.resume_or_start(
            state.refund_state(),
            order_id,
            classification.entities.amount,
            None,
            Utc::now(),
        );
        let (refund, summary) = self.refunds.run_with_summary(attempt).await;
        if !summary.is_success() {
            warn!(order_id, %summary, "refund not completed");
        }

        let mut tool = if summary.is_success() {
            ToolCallResult::ok(REFUND_TOOL, Value::Null)
        } else {
            ToolCallResult::failed(REFUND_TOOL, summary.to_string())
        };
        tool.data = serde_json::to_value(&summary)?;

        Ok(Dispatched {
            result: WorkflowResult::Refund(refund.clone()),
            tool_results: vec![tool],
            workflow: Some(WorkflowState::Refund(refund)),
        })
    }

    async fn run_retrieval(
        &self,
        state: &ConversationState,
        classification: &IntentClassification,
        message: &str,
        user_email: Option<&str>,
    ) -> Result<Dispatched, DeskflowError> {
        if classification.intent == Intent::OrderInquiry {
            let order_id = state.query_context.order_id.as_deref();
            if let (Some(email), Some(order_id)) = (user_email, order_id) {
                let mentioned = classification.entities.customer_email.clone();
                return self.lookup_order(email, order_id, mentioned).await;
            }
        }

        let context = search_context(classification.intent, message);
        let query = classification
            .entities
            .query
            .clone()
            .unwrap_or_else(|| message.to_string());
        let retrieval = self.search.search(&query, context).await;
        let tool = if retrieval.all_failed() {
            ToolCallResult::failed(SEARCH_TOOL, "every search strategy failed")
        } else {
            ToolCallResult::ok(
                SEARCH_TOOL,
                json!({
                    "query": retrieval.query,
                    "strategy": retrieval.decision.strategy_label(),
                    "sources": retrieval.used_sources,
                    "results": retrieval.combined,
                }),
            )
        };
        Ok(Dispatched {
            result: WorkflowResult::Retrieval(retrieval),
            tool_results: vec![tool],
            workflow: None,
        })
    }

    /// Looks up an order through the tool-call path so ownership checks apply.
    async fn lookup_order(
        &self,
        user_email: &str,
        order_id: &str,
        mentioned_email: Option<String>,
    ) -> Result<Dispatched, DeskflowError> {
        let request = ToolCallRequest {
            kind: RecordKind::Order,
            user_email: user_email.to_string(),
            identifiers: vec![RecordIdentifier {
                email: mentioned_email,
                order_id: Some(order_id.to_string()),
                ..RecordIdentifier::default()
            }],
        };
        match self.tools.dispatch(&request).await {
            Ok(outcome) => Ok(Dispatched {
                tool_results: vec![outcome.to_result()],
                result: WorkflowResult::Records {
                    kind: outcome.kind,
                    records: outcome.records,
                },
                workflow: None,
            }),
            Err(e) if e.is_terminal() => Err(e),
            Err(e) => {
                let mut dispatched = Dispatched::message(e.user_message());
                dispatched.tool_results.push(ToolCallResult::failed(
                    tool_name(RecordKind::Order),
                    e.user_message(),
                ));
                Ok(dispatched)
            }
        }
    }
}

fn general_reply(classification: &IntentClassification) -> Dispatched {
    if classification.fallback {
        Dispatched::message(UNSURE_REPLY)
    } else {
        Dispatched::message(GENERAL_REPLY)
    }
}

/// Opens a support ticket for the conversation.
fn escalate(state: &ConversationState, message: &str) -> Dispatched {
    let mut ticket_id = Uuid::new_v4().simple().to_string();
    ticket_id.truncate(8);
    let ticket_id = format!("T-{}", ticket_id.to_uppercase());
    let order_id = state.query_context.order_id.clone();
    info!(ticket_id = %ticket_id, "support ticket opened");

    let about = order_id
        .as_deref()
        .map(|id| format!(" about order {id}"))
        .unwrap_or_default();
    let text = format!(
        "I've opened support ticket **{ticket_id}**{about}. A member of our team will follow up \
         with you shortly."
    );
    Dispatched {
        result: WorkflowResult::Message(text),
        tool_results: vec![ToolCallResult::ok(
            TICKET_TOOL,
            json!({
                "ticket_id": ticket_id,
                "order_id": order_id,
                "description": message,
            }),
        )],
        workflow: None,
    }
}

fn search_context(intent: Intent, message: &str) -> SearchContext {
    match intent {
        Intent::OrderInquiry => SearchContext::OrderInquiry,
        Intent::ProductSearch => {
            let lower = message.to_lowercase();
            if RECOMMENDATION_WORDS.iter().any(|w| lower.contains(w)) {
                SearchContext::Recommendation
            } else {
                SearchContext::ProductSearch
            }
        }
        Intent::RefundRequest | Intent::TicketCreate | Intent::GeneralSupport => {
            SearchContext::General
        }
    }
}
