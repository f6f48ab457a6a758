// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request orchestration for the Deskflow support engine.
//!
//! [`SupportEngine`] wires the intent router, the refund workflow, hybrid
//! retrieval and the response formatter around a checkpoint store:
//! - Loads the thread's latest checkpoint, or starts a fresh state
//! - Classifies each message and dispatches it to one workflow
//! - Renders the result and checkpoints the new state before replying
//!
//! [`ToolCallDispatcher`] runs validated record lookups, and
//! [`ThreadManager`] inspects and maintains checkpointed threads.

pub mod dispatch;
pub mod engine;
pub mod threads;

pub use dispatch::{ToolCallDispatcher, ToolOutcome};
pub use engine::{EngineAdapters, EngineRequest, EngineResponse, SupportEngine};
pub use threads::{ThreadManager, ThreadView};
