//! Semantic flow augmentation: cached, batched, retried and deadline-bounded.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio::time::Instant;

use super::batch::{candidate_pairs, plan_batches, ParameterUsage, PathPair, PlannedBatch};
use super::service::{MatchCandidate, SemanticService};
use crate::cache::{SemanticCache, Verdict};
use crate::error::ApigraphError;
use crate::graph::{ApiGraph, EdgeKind, ParameterPath, SemanticFlow};

/// Stand-in for a deadline too large to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365);

/// Tuning for [`augment`].
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticOptions {
    /// Maximum parameters (outputs + inputs) per request.
    pub max_batch_items: usize,
    /// Maximum concurrent requests after the first.
    pub max_in_flight: usize,
    /// Retries per batch on transient failures.
    pub max_retries: usize,
    /// First backoff delay; doubled per retry.
    pub initial_backoff: Duration,
    pub request_timeout: Duration,
    /// Overall budget for the whole augmentation step.
    pub deadline: Duration,
    /// Verdicts below this confidence produce no edge.
    pub min_confidence: f64,
}

impl Default for SemanticOptions {
    fn default() -> Self {
        Self {
            max_batch_items: 40,
            max_in_flight: 4,
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            request_timeout: Duration::from_secs(60),
            deadline: Duration::from_secs(600),
            min_confidence: 0.8,
        }
    }
}

/// What a semantic run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SemanticReport {
    pub candidate_pairs: usize,
    pub cache_hits: usize,
    /// Service calls issued, retries included.
    pub requests: usize,
    pub batches_skipped: usize,
    pub edges_added: usize,
    /// Service absent or rejected the first request.
    pub disabled: bool,
    pub deadline_expired: bool,
}

enum BatchResult {
    Answered(Vec<MatchCandidate>),
    Skipped,
    Rejected(ApigraphError),
}

struct BatchOutcome {
    batch: PlannedBatch,
    attempts: usize,
    result: BatchResult,
}

/// Submit one batch, retrying transient failures with exponential backoff.
async fn run_batch(service: &dyn SemanticService, batch: PlannedBatch, options: &SemanticOptions) -> BatchOutcome {
    let mut attempts = 0;
    let mut delay = options.initial_backoff;

    loop {
        attempts += 1;
        let response = match tokio::time::timeout(options.request_timeout, service.submit(&batch.request)).await {
            Ok(response) => response,
            Err(_) => Err(ApigraphError::ServiceUnavailable(format!(
                "request timed out after {:?}",
                options.request_timeout
            ))),
        };

        let result = match response {
            Ok(candidates) => BatchResult::Answered(candidates),
            Err(e) if e.is_transient() && attempts <= options.max_retries => {
                log::warn!("Retry {}/{} after error: {}", attempts, options.max_retries, e);
                tokio::time::sleep(delay).await;
                delay *= 2;
                continue;
            }
            Err(e @ ApigraphError::ServiceRejected(_)) => BatchResult::Rejected(e),
            Err(e) => {
                log::warn!(
                    "Skipping semantic batch of {} parameters after {} attempt(s): {}",
                    batch.request.len(),
                    attempts,
                    e
                );
                BatchResult::Skipped
            }
        };

        return BatchOutcome { batch, attempts, result };
    }
}

/// Keep candidates that name parameters from this batch and a pair it settles.
fn accept_candidates(batch: &PlannedBatch, candidates: Vec<MatchCandidate>) -> HashMap<PathPair, Verdict> {
    let mut accepted = HashMap::new();
    for candidate in candidates {
        if !batch.request.has_output(&candidate.output_param) || !batch.request.has_input(&candidate.input_param) {
            log::warn!(
                "Rejecting semantic match {} -> {}: parameter not in submitted batch",
                candidate.output_param,
                candidate.input_param
            );
            continue;
        }
        if !candidate.confidence.is_finite() || !(0.0..=1.0).contains(&candidate.confidence) {
            log::warn!(
                "Rejecting semantic match {} -> {}: confidence {} outside [0, 1]",
                candidate.output_param,
                candidate.input_param,
                candidate.confidence
            );
            continue;
        }
        let pair = PathPair::new(candidate.output_param, candidate.input_param);
        if !batch.pairs.contains(&pair) {
            log::debug!("Ignoring semantic match {} -> {}: pair not requested", pair.output, pair.input);
            continue;
        }
        accepted.entry(pair).or_insert(Verdict {
            confidence: candidate.confidence,
            reasoning: candidate.reasoning,
        });
    }
    accepted
}

struct Run<'a> {
    cache: &'a SemanticCache,
    verdicts: BTreeMap<PathPair, Option<Verdict>>,
    report: SemanticReport,
}

impl Run<'_> {
    /// Record a batch outcome. Returns the rejection, if any, for the caller to judge.
    fn apply(&mut self, outcome: BatchOutcome) -> Option<ApigraphError> {
        self.report.requests += outcome.attempts;
        match outcome.result {
            BatchResult::Answered(candidates) => {
                let mut accepted = accept_candidates(&outcome.batch, candidates);
                for pair in &outcome.batch.pairs {
                    let verdict = accepted.remove(pair);
                    let stored = self.cache.insert_if_absent(&pair.output, &pair.input, verdict);
                    self.verdicts.insert(pair.clone(), stored);
                }
                None
            }
            BatchResult::Skipped => {
                self.report.batches_skipped += 1;
                None
            }
            BatchResult::Rejected(e) => {
                self.report.batches_skipped += 1;
                Some(e)
            }
        }
    }
}

/// Add `semantic_flow` edges judged by `service`.
///
/// Cached pairs are answered without a request. The first request runs alone:
/// if the service rejects it the phase is disabled for the run. Later batches
/// run with bounded concurrency; transient failures are retried then skipped.
/// When the deadline passes, in-flight batches are abandoned and whatever was
/// already answered is still turned into edges. Without a service this is a
/// no-op.
pub async fn augment(
    graph: &mut ApiGraph,
    service: Option<&dyn SemanticService>,
    cache: &SemanticCache,
    options: &SemanticOptions,
) -> SemanticReport {
    let Some(service) = service else {
        log::warn!("Semantic service not configured. Skipping semantic analysis.");
        return SemanticReport {
            disabled: true,
            ..SemanticReport::default()
        };
    };

    let usage = ParameterUsage::from_graph(graph);
    let candidates = candidate_pairs(graph, &usage);

    let mut run = Run {
        cache,
        verdicts: BTreeMap::new(),
        report: SemanticReport {
            candidate_pairs: candidates.len(),
            ..SemanticReport::default()
        },
    };

    cache.ensure_capacity(candidates.len());

    let mut pending = Vec::new();
    for candidate in candidates {
        match cache.get(&candidate.pair.output, &candidate.pair.input) {
            Some(verdict) => {
                run.report.cache_hits += 1;
                run.verdicts.insert(candidate.pair, verdict);
            }
            None => pending.push(candidate),
        }
    }

    let batches = plan_batches(graph, &usage, &pending, options.max_batch_items);
    log::info!(
        "Semantic analysis: {} candidate pairs, {} cached, {} batches to submit",
        run.report.candidate_pairs,
        run.report.cache_hits,
        batches.len()
    );

    let now = Instant::now();
    let deadline = now.checked_add(options.deadline).unwrap_or(now + FAR_FUTURE);
    let mut batches = batches.into_iter();

    if let Some(first) = batches.next() {
        match tokio::time::timeout_at(deadline, run_batch(service, first, options)).await {
            Ok(outcome) => {
                if let Some(e) = run.apply(outcome) {
                    log::error!("Semantic service rejected the first request, disabling semantic matching: {}", e);
                    run.report.disabled = true;
                    return run.report;
                }
            }
            Err(_) => run.report.deadline_expired = true,
        }
    }

    if !run.report.deadline_expired {
        let mut outcomes = stream::iter(batches.map(|batch| run_batch(service, batch, options)))
            .buffer_unordered(options.max_in_flight.max(1));

        loop {
            match tokio::time::timeout_at(deadline, outcomes.next()).await {
                Ok(Some(outcome)) => {
                    if let Some(e) = run.apply(outcome) {
                        log::warn!("Skipping semantic batch rejected by service: {}", e);
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    run.report.deadline_expired = true;
                    break;
                }
            }
        }
    }

    if run.report.deadline_expired {
        log::warn!(
            "Semantic analysis deadline of {:?} expired; keeping {} answered pairs",
            options.deadline,
            run.verdicts.len()
        );
    }

    let Run { verdicts, mut report, .. } = run;
    report.edges_added = emit_edges(graph, &usage, &verdicts, options.min_confidence);
    log::info!(
        "Added {} semantic_flow edges ({} requests, {} batches skipped)",
        report.edges_added,
        report.requests,
        report.batches_skipped
    );
    report
}

/// One edge per (producer, consumer) of every positive verdict, in pair order.
fn emit_edges(
    graph: &mut ApiGraph,
    usage: &ParameterUsage,
    verdicts: &BTreeMap<PathPair, Option<Verdict>>,
    min_confidence: f64,
) -> usize {
    let before = graph.edge_count();
    for (pair, verdict) in verdicts {
        let Some(verdict) = verdict else { continue };
        if verdict.confidence < min_confidence {
            continue;
        }
        let (Some(producers), Some(consumers)) = (usage.producers.get(&pair.output), usage.consumers.get(&pair.input))
        else {
            continue;
        };
        for &producer in producers {
            for &consumer in consumers {
                if producer == consumer {
                    continue;
                }
                let kind = EdgeKind::SemanticFlow(SemanticFlow {
                    output_path: ParameterPath::parse(&pair.output),
                    input_path: ParameterPath::parse(&pair.input),
                    confidence: verdict.confidence,
                    reasoning: verdict.reasoning.clone(),
                });
                if let Err(e) = graph.add_edge(producer, consumer, kind) {
                    log::warn!("Dropping semantic edge: {}", e);
                }
            }
        }
    }
    graph.edge_count() - before
}
