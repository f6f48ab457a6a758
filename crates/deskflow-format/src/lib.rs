// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response formatting for the Deskflow support engine.
//!
//! Workflow results are rendered as markdown, structured JSON or chart data
//! and delivered whole or as a chunk sequence (iterator, `futures` stream,
//! or SSE frames).

pub mod chunk;
pub mod formatter;
pub mod render;

pub use chunk::{Chunks, StreamEvent, chunk, chunk_stream, reassemble};
pub use formatter::{FormattedResponse, ResponseFormatter};
pub use render::{ChartData, Dataset, WorkflowResult, render};
