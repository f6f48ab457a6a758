// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Search backend trait for lexical and semantic retrieval.

use async_trait::async_trait;

use crate::error::DeskflowError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{SearchHit, SearchQuery, SearchSource};

/// A single retrieval strategy.
#[async_trait]
pub trait SearchBackend: PluginAdapter {
    /// Which strategy this backend implements.
    fn source(&self) -> SearchSource;

    /// Runs the query. Hit scores are expected in `[0, 1]`.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, DeskflowError>;
}
