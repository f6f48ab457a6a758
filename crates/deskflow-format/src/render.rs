// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rendering of workflow results into display shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use deskflow_core::state::{
    AgentKind, OutputShape, RefundState, RefundSummary, RetrievalState, format_amount,
};
use deskflow_core::types::RecordKind;

/// Raw output of a workflow, before shaping.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowResult {
    Refund(RefundState),
    Retrieval(RetrievalState),
    /// Records returned by a validated tool call.
    Records {
        kind: RecordKind,
        records: Vec<Value>,
    },
    /// Plain assistant text (general support, prompts, escalations).
    Message(String),
}

impl WorkflowResult {
    /// The agent that produced this result.
    pub fn source(&self) -> AgentKind {
        match self {
            WorkflowResult::Refund(_) => AgentKind::Refund,
            WorkflowResult::Retrieval(_) | WorkflowResult::Records { .. } => AgentKind::Retrieval,
            WorkflowResult::Message(_) => AgentKind::Formatter,
        }
    }
}

/// One series of a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
}

/// Chart-ready tabular data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

/// Renders a result in the requested shape.
pub fn render(result: &WorkflowResult, shape: OutputShape) -> String {
    match shape {
        OutputShape::Markdown => markdown(result),
        OutputShape::Structured => pretty(&structured(result)),
        OutputShape::Chart => match serde_json::to_value(chart(result)) {
            Ok(value) => pretty(&value),
            Err(_) => markdown(result),
        },
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

// --- markdown ---

/// Free-text rendering.
pub fn markdown(result: &WorkflowResult) -> String {
    match result {
        WorkflowResult::Refund(state) => refund_markdown(state),
        WorkflowResult::Retrieval(state) => retrieval_markdown(state),
        WorkflowResult::Records { kind, records } => records_markdown(*kind, records),
        WorkflowResult::Message(text) => text.clone(),
    }
}

fn refund_markdown(state: &RefundState) -> String {
    match state.summary() {
        RefundSummary::Completed {
            order_id,
            refund_id,
            amount,
            currency,
            status,
            history_count,
        } => {
            let mut out = format!(
                "**Refund processed** for order {order_id}.\n\n- Refund: {refund_id}\n- Amount: {}\n- Status: {status}",
                format_amount(amount, &currency)
            );
            if history_count > 1 {
                out.push_str(&format!("\n- Refunds on this order: {history_count}"));
            }
            out
        }
        RefundSummary::Failed {
            order_id, reasons, ..
        } => {
            let mut out = format!("**Refund not processed** for order {order_id}.");
            if !reasons.is_empty() {
                out.push('\n');
                for reason in reasons {
                    out.push_str(&format!("\n- {reason}"));
                }
            }
            out
        }
        summary @ RefundSummary::InProgress { .. } => summary.to_string(),
    }
}

fn retrieval_markdown(state: &RetrievalState) -> String {
    if state.all_failed() {
        return "Search is temporarily unavailable. Please try again later.".to_string();
    }
    if state.combined.is_empty() {
        return format!("No results found for \"{}\".", state.query);
    }
    let mut out = format!(
        "Found {} result{} for \"{}\":\n",
        state.combined.len(),
        if state.combined.len() == 1 { "" } else { "s" },
        state.query
    );
    for (i, hit) in state.combined.iter().enumerate() {
        out.push_str(&format!("\n{}. **{}** ({:.2})", i + 1, hit.title, hit.score));
        if !hit.content.is_empty() {
            out.push_str(&format!("\n   {}", hit.content));
        }
    }
    out
}

fn records_markdown(kind: RecordKind, records: &[Value]) -> String {
    if records.is_empty() {
        return format!("No {kind} records found.");
    }
    let mut out = format!(
        "Found {} {kind} record{}:\n",
        records.len(),
        if records.len() == 1 { "" } else { "s" }
    );
    for record in records {
        out.push_str(&format!("\n- {}", inline_record(record)));
    }
    out
}

fn inline_record(record: &Value) -> String {
    match record {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}: {}", scalar(v)))
            .collect::<Vec<_>>()
            .join(", "),
        other => scalar(other),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

// --- structured ---

/// Machine-readable rendering of the result.
pub fn structured(result: &WorkflowResult) -> Value {
    match result {
        WorkflowResult::Refund(state) => json!({
            "kind": "refund",
            "order_id": state.order_id,
            "status": state.status,
            "node": state.node,
            "summary": state.summary(),
            "violations": state.violations(),
        }),
        WorkflowResult::Retrieval(state) => json!({
            "kind": "retrieval",
            "query": state.query,
            "strategy": state.decision.strategy_label(),
            "used_sources": state.used_sources,
            "results": state.combined.iter().map(|hit| json!({
                "id": hit.id,
                "title": hit.title,
                "score": hit.score,
                "sources": hit.sources,
            })).collect::<Vec<_>>(),
            "failures": state.failures,
            "timings": state.timings,
        }),
        WorkflowResult::Records { kind, records } => json!({
            "kind": kind,
            "count": records.len(),
            "records": records,
        }),
        WorkflowResult::Message(text) => json!({ "kind": "message", "message": text }),
    }
}

// --- chart ---

/// Tabular rendering with numeric series.
pub fn chart(result: &WorkflowResult) -> ChartData {
    match result {
        WorkflowResult::Refund(state) => refund_chart(state),
        WorkflowResult::Retrieval(state) => ChartData {
            columns: vec!["id".into(), "title".into(), "score".into()],
            rows: state
                .combined
                .iter()
                .map(|hit| vec![json!(hit.id), json!(hit.title), json!(hit.score)])
                .collect(),
            labels: state.combined.iter().map(|hit| hit.title.clone()).collect(),
            datasets: vec![Dataset {
                label: "score".into(),
                data: state.combined.iter().map(|hit| hit.score).collect(),
            }],
        },
        WorkflowResult::Records { records, .. } => records_chart(records),
        WorkflowResult::Message(text) => ChartData {
            columns: vec!["message".into()],
            rows: vec![vec![json!(text)]],
            ..ChartData::default()
        },
    }
}

fn refund_chart(state: &RefundState) -> ChartData {
    let Some(payment) = &state.payment else {
        return ChartData::default();
    };
    let refunded_now = state.refund.as_ref().map_or(0, |r| r.amount);
    let labels = vec![
        "charged".to_string(),
        "previously refunded".to_string(),
        "refunded now".to_string(),
    ];
    let values = [payment.amount, payment.amount_refunded, refunded_now];
    ChartData {
        columns: vec!["label".into(), "amount".into()],
        rows: labels
            .iter()
            .zip(values)
            .map(|(label, value)| vec![json!(label), json!(value)])
            .collect(),
        labels,
        datasets: vec![Dataset {
            label: format!("amount ({})", payment.currency.to_uppercase()),
            data: values.iter().map(|v| *v as f64 / 100.0).collect(),
        }],
    }
}

/// Columns are the sorted union of object keys. Every column
/// whose values are all numbers becomes a dataset; the first other column
/// labels the rows.
fn records_chart(records: &[Value]) -> ChartData {
    let objects: Vec<&Map<String, Value>> = records.iter().filter_map(Value::as_object).collect();
    let mut columns: Vec<String> = Vec::new();
    for object in &objects {
        for key in object.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    columns.sort();
    let rows: Vec<Vec<Value>> = objects
        .iter()
        .map(|o| {
            columns
                .iter()
                .map(|c| o.get(c).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    let numeric = |idx: usize| !rows.is_empty() && rows.iter().all(|r| r[idx].is_number());
    let datasets = (0..columns.len())
        .filter(|&i| numeric(i))
        .map(|i| Dataset {
            label: columns[i].clone(),
            data: rows.iter().filter_map(|r| r[i].as_f64()).collect(),
        })
        .collect();
    let labels = match (0..columns.len()).find(|&i| !numeric(i)) {
        Some(i) => rows.iter().map(|r| scalar(&r[i])).collect(),
        None => (1..=rows.len()).map(|n| n.to_string()).collect(),
    };

    ChartData {
        columns,
        rows,
        labels,
        datasets,
    }
}
