// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text classifier trait used by the intent router.

use async_trait::async_trait;

use crate::error::DeskflowError;
use crate::traits::adapter::PluginAdapter;
use crate::types::ClassifierRequest;

/// An external classifier that turns a message into raw text output.
///
/// The router expects the output to be a JSON object and treats anything
/// else as a classifier failure.
#[async_trait]
pub trait TextClassifier: PluginAdapter {
    async fn classify(&self, request: &ClassifierRequest) -> Result<String, DeskflowError>;
}
