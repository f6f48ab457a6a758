// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The response formatter used by the engine.

use std::sync::Arc;

use tracing::debug;

use deskflow_config::model::FormatterConfig;
use deskflow_core::state::{FormattingState, OutputShape};

use crate::chunk::{Chunks, chunk};
use crate::render::{WorkflowResult, render};

/// A rendered response, ready to be returned whole or streamed.
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedResponse {
    pub shape: OutputShape,
    pub content: Arc<str>,
    chunk_size: usize,
}

impl FormattedResponse {
    /// A fresh chunk sequence over the content. Each call starts over.
    pub fn chunks(&self) -> Chunks {
        chunk(self.content.clone(), self.chunk_size)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks().filter(|event| !event.is_complete()).count()
    }
}

/// Shapes workflow results with a configured chunk size and default shape.
#[derive(Debug, Clone)]
pub struct ResponseFormatter {
    chunk_size: usize,
    default_shape: OutputShape,
}

impl ResponseFormatter {
    pub fn new(config: &FormatterConfig) -> Self {
        Self {
            chunk_size: config.chunk_size.max(1),
            default_shape: config.default_shape,
        }
    }

    pub fn default_shape(&self) -> OutputShape {
        self.default_shape
    }

    /// Renders `result` in `shape`, or in the default shape when `None`.
    pub fn format(
        &self,
        result: &WorkflowResult,
        shape: Option<OutputShape>,
    ) -> FormattedResponse {
        let shape = shape.unwrap_or(self.default_shape);
        let content: Arc<str> = render(result, shape).into();
        debug!(%shape, source = %result.source(), bytes = content.len(), "response formatted");
        FormattedResponse {
            shape,
            content,
            chunk_size: self.chunk_size,
        }
    }

    /// The formatting sub-state recorded in the conversation.
    pub fn state_for(
        &self,
        result: &WorkflowResult,
        response: &FormattedResponse,
    ) -> FormattingState {
        FormattingState {
            shape: response.shape,
            source: result.source(),
            rendered: response.content.to_string(),
            chunk_count: response.chunk_count(),
        }
    }
}

impl Default for ResponseFormatter {
    fn default() -> Self {
        Self::new(&FormatterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::reassemble;
    use deskflow_core::state::AgentKind;

    #[test]
    fn default_shape_applies_when_unspecified() {
        let formatter = ResponseFormatter::new(&FormatterConfig {
            chunk_size: 2,
            default_shape: OutputShape::Structured,
        });
        let response = formatter.format(&WorkflowResult::Message("hello there".into()), None);
        assert_eq!(response.shape, OutputShape::Structured);
        assert!(response.content.contains("\"message\""));
    }

    #[test]
    fn chunks_restart_on_every_call() {
        let formatter = ResponseFormatter::new(&FormatterConfig {
            chunk_size: 2,
            default_shape: OutputShape::Markdown,
        });
        let response = formatter.format(
            &WorkflowResult::Message("one two three four five".into()),
            Some(OutputShape::Markdown),
        );
        let first: Vec<_> = response.chunks().collect();
        let second: Vec<_> = response.chunks().collect();
        assert_eq!(first, second);
        assert_eq!(reassemble(&first), "one two three four five");
        assert_eq!(response.chunk_count(), 3);
    }

    #[test]
    fn formatting_state_records_source_and_count() {
        let formatter = ResponseFormatter::default();
        let result = WorkflowResult::Message("a b c d e f".into());
        let response = formatter.format(&result, None);
        let state = formatter.state_for(&result, &response);
        assert_eq!(state.source, AgentKind::Formatter);
        assert_eq!(state.chunk_count, 2);
        assert_eq!(state.rendered, "a b c d e f");
    }
}
