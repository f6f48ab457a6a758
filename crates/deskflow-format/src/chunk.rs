// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Word-group chunking for incremental delivery.
//!
//! A chunk sequence is a run of [`StreamEvent::Partial`] events followed by
//! exactly one [`StreamEvent::Complete`]. Each partial carries `chunk_size`
//! words, every word keeping the whitespace that follows it, so joining
//! the partial contents gives back the input byte for byte.
//!
//! SSE framing:
//! ```text
//! event: text_delta
//! data: {"text":"partial content ","index":0}
//!
//! event: message_stop
//! data: {"total_chunks":1}
//! ```

use std::sync::Arc;

use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// One event of a chunk sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Partial { content: String, index: usize },
    Complete { total_chunks: usize },
}

impl StreamEvent {
    /// SSE event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamEvent::Partial { .. } => "text_delta",
            StreamEvent::Complete { .. } => "message_stop",
        }
    }

    /// Renders the event as one SSE frame, blank-line terminated.
    pub fn to_sse(&self) -> String {
        let data = match self {
            StreamEvent::Partial { content, index } => json!({ "text": content, "index": index }),
            StreamEvent::Complete { total_chunks } => json!({ "total_chunks": total_chunks }),
        };
        format!("event: {}\ndata: {data}\n\n", self.event_name())
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. })
    }
}

/// Lazy, finite chunk sequence over shared content.
///
/// Clone a fresh sequence before iterating it to replay it later.
#[derive(Debug, Clone)]
pub struct Chunks {
    content: Arc<str>,
    offset: usize,
    words: usize,
    index: usize,
    done: bool,
}

/// Splits `content` into groups of `chunk_size` words. A size of zero is treated as one.
pub fn chunk(content: impl Into<Arc<str>>, chunk_size: usize) -> Chunks {
    Chunks {
        content: content.into(),
        offset: 0,
        words: chunk_size.max(1),
        index: 0,
        done: false,
    }
}

/// The same sequence as a `futures` stream.
pub fn chunk_stream(
    content: impl Into<Arc<str>>,
    chunk_size: usize,
) -> impl Stream<Item = StreamEvent> {
    stream::iter(chunk(content, chunk_size))
}

/// Joins the partial contents of a finished sequence.
pub fn reassemble<'a>(events: impl IntoIterator<Item = &'a StreamEvent>) -> String {
    events
        .into_iter()
        .filter_map(|event| match event {
            StreamEvent::Partial { content, .. } => Some(content.as_str()),
            StreamEvent::Complete { .. } => None,
        })
        .collect()
}

/// Byte offset where the `(words + 1)`th word of `s` starts, or `s.len()`.
fn split_point(s: &str, words: usize) -> usize {
    let mut seen = 0;
    let mut prev_whitespace = true;
    for (i, c) in s.char_indices() {
        let whitespace = c.is_whitespace();
        if !whitespace && prev_whitespace {
            if seen == words {
                return i;
            }
            seen += 1;
        }
        prev_whitespace = whitespace;
    }
    s.len()
}

impl Iterator for Chunks {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<StreamEvent> {
        let rest = &self.content[self.offset..];
        if !rest.is_empty() {
            let end = split_point(rest, self.words);
            let piece = rest[..end].to_string();
            self.offset += end;
            let index = self.index;
            self.index += 1;
            return Some(StreamEvent::Partial {
                content: piece,
                index,
            });
        }
        if self.done {
            return None;
        }
        self.done = true;
        Some(StreamEvent::Complete {
            total_chunks: self.index,
        })
    }
}

impl std::iter::FusedIterator for Chunks {}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use proptest::prelude::*;

    fn contents(events: &[StreamEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Partial { content, .. } => Some(content.as_str()),
                StreamEvent::Complete { .. } => None,
            })
            .collect()
    }

    #[test]
    fn groups_words_with_trailing_whitespace() {
        let events: Vec<_> = chunk("one two three four five", 2).collect();
        assert_eq!(contents(&events), vec!["one two ", "three four ", "five"]);
        assert_eq!(events.last(), Some(&StreamEvent::Complete { total_chunks: 3 }));
    }

    #[test]
    fn leading_whitespace_stays_in_first_chunk() {
        let events: Vec<_> = chunk("  hi\n\nthere  ", 1).collect();
        assert_eq!(contents(&events), vec!["  hi\n\n", "there  "]);
    }

    #[test]
    fn empty_content_is_only_a_completion() {
        let events: Vec<_> = chunk("", 5).collect();
        assert_eq!(events, vec![StreamEvent::Complete { total_chunks: 0 }]);
    }

    #[test]
    fn zero_chunk_size_means_one_word() {
        let events: Vec<_> = chunk("a b", 0).collect();
        assert_eq!(contents(&events), vec!["a ", "b"]);
    }

    #[test]
    fn sequence_is_finite_and_fused() {
        let mut chunks = chunk("a b c", 5);
        assert!(chunks.next().is_some());
        assert!(chunks.next().is_some_and(|e| e.is_complete()));
        assert!(chunks.next().is_none());
        assert!(chunks.next().is_none());
    }

    #[test]
    fn sequence_is_restartable_by_cloning() {
        let fresh = chunk("a b c d", 2);
        let first: Vec<_> = fresh.clone().collect();
        let second: Vec<_> = fresh.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let partial = StreamEvent::Partial {
            content: "hi ".into(),
            index: 0,
        };
        assert_eq!(
            serde_json::to_string(&partial).unwrap(),
            r#"{"type":"partial","content":"hi ","index":0}"#
        );
        let complete = StreamEvent::Complete { total_chunks: 1 };
        assert_eq!(
            serde_json::to_string(&complete).unwrap(),
            r#"{"type":"complete","total_chunks":1}"#
        );
    }

    #[test]
    fn sse_frames() {
        let partial = StreamEvent::Partial {
            content: "hi".into(),
            index: 0,
        };
        let frame = partial.to_sse();
        assert!(frame.starts_with("event: text_delta\ndata: "));
        assert!(frame.ends_with("\n\n"));
        assert!(frame.contains(r#""text":"hi""#));
        assert_eq!(
            StreamEvent::Complete { total_chunks: 2 }.to_sse(),
            "event: message_stop\ndata: {\"total_chunks\":2}\n\n"
        );
    }

    #[tokio::test]
    async fn stream_matches_iterator() {
        let streamed: Vec<StreamEvent> = chunk_stream("the quick brown fox", 3).collect().await;
        let iterated: Vec<StreamEvent> = chunk("the quick brown fox", 3).collect();
        assert_eq!(streamed, iterated);
    }

    proptest! {
        #[test]
        fn chunks_reassemble_exactly(content in "\\PC{0,200}", size in 0usize..8) {
            let events: Vec<_> = chunk(content.as_str(), size).collect();
            prop_assert_eq!(reassemble(&events), content.clone());

            let last = events.last().cloned();
            let partials = events.len() - 1;
            prop_assert_eq!(last, Some(StreamEvent::Complete { total_chunks: partials }));
            for (i, event) in events[..partials].iter().enumerate() {
                match event {
                    StreamEvent::Partial { index, content } => {
                        prop_assert_eq!(*index, i);
                        prop_assert!(!content.is_empty());
                        if i + 1 < partials {
                            prop_assert_eq!(content.split_whitespace().count(), size.max(1));
                        }
                    }
                    StreamEvent::Complete { .. } => {
                        prop_assert!(false, "completion before the end");
                    }
                }
            }
        }

        #[test]
        fn mixed_whitespace_survives(
            words in prop::collection::vec(("[a-z]{1,5}", "[ \\t\\n]{1,3}"), 0..30),
            size in 1usize..6,
        ) {
            let content: String = words.iter().map(|(w, s)| format!("{w}{s}")).collect();
            let events: Vec<_> = chunk(content.as_str(), size).collect();
            prop_assert_eq!(reassemble(&events), content);
        }
    }
}
