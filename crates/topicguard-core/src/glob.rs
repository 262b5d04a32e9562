//! Topic pattern matching
//!
//! Patterns are matched segment by segment, with `/` as the separator:
//! - a segment that is exactly `**` matches zero or more whole segments
//! - `*` matches any run of characters within a single segment
//! - `?` matches exactly one character within a single segment
//!
//! An empty topic segment is only matched by an empty pattern segment, so
//! `sensors/*` does not match `sensors/`. A topic segment starting with `.`
//! is hidden: only a pattern segment that itself starts with a literal `.`
//! matches it, and `**` never spans it. MQTT wildcards (`+`, `#`) carry no
//! special meaning and are compared literally.
//!
//! Wildcards inside a segment are matched in linear time. Only `**`
//! backtracking across segments is charged against the iteration cap.

use std::fmt;

use thiserror::Error;
use tracing::warn;

/// Maximum `**` backtracking steps allowed for a single match
const MAX_MATCH_ITERATIONS: usize = 10000;

/// Pattern that matches every topic
pub const MATCH_ALL: &str = "**";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,

    #[error("pattern contains invalid character {0:?}")]
    InvalidCharacter(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// `**` spanning any number of segments
    Globstar,
    /// A single segment built from literal text and wildcards
    Parts(Vec<PatternPart>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternPart {
    /// A character that must match exactly
    Literal(char),
    /// Any run of characters within a segment (*)
    AnyRun,
    /// Exactly one character (?)
    AnyChar,
}

/// A compiled glob pattern for topic names and topic filters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
    pattern: String,
    segments: Vec<Segment>,
}

impl TopicPattern {
    /// Compile a glob pattern
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        if pattern.contains('\0') {
            return Err(PatternError::InvalidCharacter('\0'));
        }

        let segments = pattern
            .split('/')
            .map(|segment| {
                if segment == MATCH_ALL {
                    Segment::Globstar
                } else {
                    Segment::Parts(compile_segment(segment))
                }
            })
            .collect();

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
        })
    }

    /// The source text of this pattern
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Check whether a topic matches this pattern
    pub fn matches(&self, topic: &str) -> bool {
        let topic_segments: Vec<&str> = topic.split('/').collect();
        let mut iterations = 0;
        match_segments(&self.segments, &topic_segments, &mut iterations)
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

fn compile_segment(segment: &str) -> Vec<PatternPart> {
    let mut parts = Vec::new();

    for ch in segment.chars() {
        match ch {
            '?' => parts.push(PatternPart::AnyChar),
            // Consecutive stars inside a segment collapse into one
            '*' if parts.last() == Some(&PatternPart::AnyRun) => {}
            '*' => parts.push(PatternPart::AnyRun),
            _ => parts.push(PatternPart::Literal(ch)),
        }
    }

    parts
}

fn is_hidden(segment: &str) -> bool {
    segment.starts_with('.')
}

/// Count one `**` backtracking step, returning false once the budget is spent
fn step(iterations: &mut usize) -> bool {
    *iterations += 1;
    if *iterations == MAX_MATCH_ITERATIONS + 1 {
        warn!(
            "Pattern matching exceeded {} iterations, aborting",
            MAX_MATCH_ITERATIONS
        );
    }
    *iterations <= MAX_MATCH_ITERATIONS
}

fn match_segments(segments: &[Segment], topic: &[&str], iterations: &mut usize) -> bool {
    match segments.split_first() {
        None => topic.is_empty(),
        Some((Segment::Globstar, rest)) => {
            // ** spans any run of segments that are not hidden
            let span = topic
                .iter()
                .position(|segment| is_hidden(segment))
                .unwrap_or(topic.len());

            if rest.is_empty() {
                return span == topic.len();
            }

            for skip in 0..=span {
                if !step(iterations) {
                    return false;
                }
                if match_segments(rest, &topic[skip..], iterations) {
                    return true;
                }
            }
            false
        }
        Some((Segment::Parts(parts), rest)) => match topic.split_first() {
            Some((first, remaining)) => {
                match_segment(parts, first) && match_segments(rest, remaining, iterations)
            }
            None => false,
        },
    }
}

fn match_segment(parts: &[PatternPart], segment: &str) -> bool {
    if segment.is_empty() {
        return parts.is_empty();
    }
    if is_hidden(segment) && parts.first() != Some(&PatternPart::Literal('.')) {
        return false;
    }
    match_parts(parts, segment)
}

/// Greedy wildcard match within one segment
///
/// Only the most recent `*` is ever retried, which keeps the match linear
/// in the length of the text for each pattern position.
fn match_parts(parts: &[PatternPart], text: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let mut p = 0;
    let mut t = 0;
    // Position after the last `*` and the text index it is currently anchored at
    let mut retry: Option<(usize, usize)> = None;

    while t < text.len() {
        match parts.get(p) {
            Some(PatternPart::AnyRun) => {
                retry = Some((p + 1, t));
                p += 1;
                continue;
            }
            Some(PatternPart::AnyChar) => {
                p += 1;
                t += 1;
                continue;
            }
            Some(PatternPart::Literal(ch)) if *ch == text[t] => {
                p += 1;
                t += 1;
                continue;
            }
            _ => {}
        }

        match retry {
            Some((after_star, anchor)) => {
                p = after_star;
                t = anchor + 1;
                retry = Some((after_star, anchor + 1));
            }
            None => return false,
        }
    }

    parts[p..].iter().all(|part| *part == PatternPart::AnyRun)
}
