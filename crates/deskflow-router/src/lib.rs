// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intent classification and routing for the Deskflow support engine.
//!
//! This crate provides:
//! - [`IntentClassifier`]: wraps an external [`TextClassifier`](deskflow_core::TextClassifier),
//!   bounds its history and time, parses its output and falls back deterministically
//! - [`KeywordClassifier`]: heuristic classifier with zero cost and zero latency
//! - [`extract_entities`]: regex extraction of order ids, SKUs, emails and amounts
//! - [`route`]: the total intent to agent routing table

pub mod classifier;
pub mod entities;
pub mod keyword;
pub mod parse;
pub mod routing;

pub use classifier::{CLASSIFIER_INSTRUCTIONS, IntentClassifier};
pub use entities::extract_entities;
pub use keyword::KeywordClassifier;
pub use parse::{
    ClassifierOutputError, ParsedClassification, normalize_intent, parse_classifier_output,
};
pub use routing::{route, route_classification};
