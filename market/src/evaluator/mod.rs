//! Submission verification and task parsing via an external evaluator.
//!
//! This module defines a trait [`Evaluator`] that abstracts over the
//! external large-language-model evaluator, together with:
//!
//! - the structured results it produces ([`VerificationResult`],
//!   [`ParsedTask`]),
//! - the deterministic mock fallbacks used when the evaluator is
//!   unavailable, and
//! - the tolerant extract-JSON-from-prose step (`extract`).
//!
//! The adapter is infallible by contract: any transport failure, missing
//! credential, or unparseable response collapses into the mock result so
//! the ledger is never blocked by evaluator unavailability.

use std::future::Future;

mod extract;
mod http;

pub use extract::extract_json_object;
pub use http::{EvaluatorClient, EvaluatorError};

/// Score at or above which a submission is approved.
pub const APPROVAL_THRESHOLD: f64 = 90.0;

/// Default reward in KAS when parsing finds no figure in the text.
pub const DEFAULT_REWARD: f64 = 0.5;

/// Outcome of verifying a worker submission against a task description.
#[derive(Clone, Debug)]
pub struct VerificationResult {
    /// Quality score in `[0, 100]`.
    pub score: f64,
    /// Short human-readable explanation.
    pub feedback: String,
    /// `true` iff `score >= APPROVAL_THRESHOLD`.
    pub approved: bool,
}

impl VerificationResult {
    /// Builds a result from a score and feedback, deriving approval from
    /// the threshold. Approval is never taken from the evaluator's own
    /// boolean; the threshold here is the single source of truth.
    pub fn from_score(score: f64, feedback: String) -> Self {
        Self {
            score,
            feedback,
            approved: score >= APPROVAL_THRESHOLD,
        }
    }
}

/// A task draft extracted from natural-language text.
#[derive(Clone, Debug)]
pub struct ParsedTask {
    pub title: String,
    pub description: String,
    /// Reward in KAS.
    pub reward: f64,
    pub estimated_time: Option<String>,
    pub requirements: Vec<String>,
}

/// Abstract evaluator used by the marketplace.
///
/// Implementations contact the external model (e.g. via HTTP) and absorb
/// every failure mode into the deterministic fallbacks below; neither
/// method returns an error.
pub trait Evaluator: Send + Sync {
    /// Scores a submission against a task description.
    ///
    /// `image` is an optional data-URI payload carried through to the
    /// evaluator unmodified. Its absence is communicated explicitly (it
    /// affects scoring policy), never silently omitted.
    fn verify(
        &self,
        description: &str,
        submission: &str,
        image: Option<&str>,
    ) -> impl Future<Output = VerificationResult> + Send;

    /// Parses natural-language text into a task draft.
    fn parse(&self, input: &str) -> impl Future<Output = ParsedTask> + Send;
}

/// Deterministic verification fallback.
///
/// Used when no credential is configured or the evaluator call fails; the
/// submission is waved through so a demo deployment without credentials
/// still exercises the full settlement path.
pub fn mock_verification() -> VerificationResult {
    VerificationResult::from_score(
        95.0,
        "Mock verification passed (evaluator unavailable)".to_string(),
    )
}

/// Deterministic parse fallback.
///
/// Takes a reward figure from a `<number> KAS` pattern in the text when
/// present, else [`DEFAULT_REWARD`]; the title is the truncated input.
pub fn mock_parse(input: &str) -> ParsedTask {
    ParsedTask {
        title: truncate(input, 30),
        description: input.to_string(),
        reward: reward_figure(input).unwrap_or(DEFAULT_REWARD),
        estimated_time: Some("5m".to_string()),
        requirements: vec!["Manual Check".to_string()],
    }
}

/// Truncates a string to at most `max` characters on a char boundary.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Scans the text for a numeric amount followed by the `KAS` unit, e.g.
/// `"pay 2.5 KAS"` or `"0.75KAS"`. Returns the first match.
fn reward_figure(text: &str) -> Option<f64> {
    let lower = text.to_ascii_lowercase();
    let mut rest = lower.as_str();
    let mut offset = 0usize;

    while let Some(pos) = rest.find("kas") {
        let abs = offset + pos;
        // Skip over prose words that merely contain "kas".
        let followed_ok = lower[abs + 3..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_ascii_alphanumeric());
        if followed_ok {
            let before = lower[..abs].trim_end();
            let digits: String = before
                .chars()
                .rev()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            if let Ok(value) = digits.parse::<f64>() {
                return Some(value);
            }
        }
        offset = abs + 3;
        rest = &lower[offset..];
    }

    None
}
