// Evaluation harness
// Scores answers against a labelled dataset of question/expected pairs


use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::conversation::InMemoryConversationStore;
use crate::engine::AnswerEngine;
use crate::service::QaService;
use crate::{QaError, Result};

const FALLBACK_PHRASES: [&str; 2] = ["don't know", "do not know"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationCase {
    pub question: String,
    pub expected: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseResult {
    pub question: String,
    pub expected: String,
    pub answer: String,
    pub exact_match: bool,
    pub contains_expected: bool,
    pub fallback: bool,
    pub latency_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub total: usize,
    pub exact_matches: usize,
    /// Share of answers equal to the expected text after trimming and lowercasing
    pub accuracy: f64,
    /// Share of answers containing the expected text
    pub containment_rate: f64,
    /// Mean seconds per answer
    pub average_latency: f64,
    /// Share of answers admitting the context was insufficient
    pub fallback_rate: f64,
    pub cases: Vec<CaseResult>,
}

/// Read a JSON array of `{question, expected}` objects
#[inline]
pub fn load_dataset(path: &Path) -> Result<Vec<EvaluationCase>> {
    let contents = fs::read_to_string(path)?;
    let cases: Vec<EvaluationCase> = serde_json::from_str(&contents).map_err(|e| {
        QaError::InvalidConfig(format!(
            "Invalid evaluation dataset {}: {}",
            path.display(),
            e
        ))
    })?;
    debug!("Loaded {} evaluation cases from {}", cases.len(), path.display());
    Ok(cases)
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[inline]
pub fn is_fallback(answer: &str) -> bool {
    let answer = answer.to_lowercase().replace('\u{2019}', "'");
    FALLBACK_PHRASES.iter().any(|phrase| answer.contains(phrase))
}

fn score_case(case: &EvaluationCase, answer: String, latency_secs: f64) -> CaseResult {
    let normalized_answer = normalize(&answer);
    let normalized_expected = normalize(&case.expected);

    CaseResult {
        question: case.question.clone(),
        expected: case.expected.clone(),
        exact_match: normalized_answer == normalized_expected,
        contains_expected: normalized_answer.contains(&normalized_expected),
        fallback: is_fallback(&answer),
        answer,
        latency_secs,
    }
}

fn rate(count: usize, total: usize) -> f64 {
    count as f64 / total as f64
}

/// Ask every case on its own fresh thread and aggregate the scores.
///
/// Cases run against the service's active index and backends, but their
/// threads live in a scratch store, so the service's conversation history is
/// left untouched. Stops at the first failing question.
#[inline]
pub async fn evaluate(service: &QaService, cases: &[EvaluationCase]) -> Result<EvaluationReport> {
    if cases.is_empty() {
        return Err(QaError::InvalidConfig(
            "evaluation dataset is empty".to_string(),
        ));
    }

    let index = service.active_index().await;
    let scratch = InMemoryConversationStore::new();
    let engine = AnswerEngine::new(service.embedder(), service.generator(), &scratch);

    let mut results = Vec::with_capacity(cases.len());
    for (position, case) in cases.iter().enumerate() {
        let thread_id = format!("eval-{}", Uuid::new_v4());
        let started = Instant::now();
        let answer = engine
            .answer(&thread_id, &case.question, index.as_deref(), service.top_k())
            .await?;
        let latency = started.elapsed().as_secs_f64();

        debug!(
            "Case {}/{} answered in {:.3}s",
            position + 1,
            cases.len(),
            latency
        );
        results.push(score_case(case, answer.content, latency));
    }

    let total = results.len();
    let exact_matches = results.iter().filter(|r| r.exact_match).count();
    let contained = results.iter().filter(|r| r.contains_expected).count();
    let fallbacks = results.iter().filter(|r| r.fallback).count();
    let latency_sum: f64 = results.iter().map(|r| r.latency_secs).sum();

    let report = EvaluationReport {
        total,
        exact_matches,
        accuracy: rate(exact_matches, total),
        containment_rate: rate(contained, total),
        average_latency: latency_sum / total as f64,
        fallback_rate: rate(fallbacks, total),
        cases: results,
    };

    info!(
        "Evaluated {} cases: accuracy {:.2}, containment {:.2}, fallback {:.2}",
        report.total, report.accuracy, report.containment_rate, report.fallback_rate
    );
    Ok(report)
}
