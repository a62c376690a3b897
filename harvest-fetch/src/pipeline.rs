//! Acquisition pipeline for executing strategies in order.
//!
//! The pipeline takes an ordered list of acquisition strategies and runs
//! them one at a time, in insertion order, until one succeeds. Several
//! strategies trigger the same download action on the portal, so they
//! never run concurrently and nothing after the first success runs at all.

use std::time::{Duration, Instant};

use harvest_core::ReportArtifact;
use tracing::{debug, info, instrument, warn};

use crate::context::AcquireContext;
use crate::error::{AttemptReason, FetchError};
use crate::strategy::{AcquisitionKind, AcquisitionStrategy, StrategyOutcome};

// ============================================================================
// Acquisition Attempt
// ============================================================================

/// How one attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The strategy produced the artifact.
    Success,
    /// The strategy ran and failed.
    Failure(String),
    /// The strategy's precondition did not hold.
    Skipped(String),
}

/// Record of a single strategy attempt. Never changed after creation.
#[derive(Debug, Clone)]
pub struct AcquisitionAttempt {
    /// One-based position in the pipeline.
    pub ordinal: usize,
    /// The strategy ID that was attempted.
    pub strategy_id: String,
    /// The mechanism used.
    pub kind: AcquisitionKind,
    /// How it ended.
    pub outcome: AttemptOutcome,
    /// How long the attempt took.
    pub duration: Duration,
}

impl AcquisitionAttempt {
    fn reason(&self) -> Option<AttemptReason> {
        let (reason, skipped) = match &self.outcome {
            AttemptOutcome::Success => return None,
            AttemptOutcome::Failure(r) => (r.clone(), false),
            AttemptOutcome::Skipped(r) => (r.clone(), true),
        };
        Some(AttemptReason {
            strategy_id: self.strategy_id.clone(),
            reason,
            skipped,
        })
    }
}

// ============================================================================
// Acquisition Outcome
// ============================================================================

/// The outcome of a pipeline execution.
#[derive(Debug)]
pub struct AcquisitionOutcome {
    /// The artifact, or why none was obtained.
    pub result: Result<ReportArtifact, FetchError>,
    /// All attempts made, in order.
    pub attempts: Vec<AcquisitionAttempt>,
    /// Total duration of all attempts.
    pub duration: Duration,
}

impl AcquisitionOutcome {
    /// Returns true if an artifact was obtained.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Returns the number of strategies that were tried.
    pub fn attempts_count(&self) -> usize {
        self.attempts.len()
    }

    /// Returns the successful strategy ID, if any.
    pub fn successful_strategy(&self) -> Option<&str> {
        self.result.as_ref().ok().map(|a| a.strategy_id.as_str())
    }
}

// ============================================================================
// Acquisition Pipeline
// ============================================================================

/// An ordered cascade of acquisition strategies.
#[derive(Default)]
pub struct AcquisitionPipeline {
    strategies: Vec<Box<dyn AcquisitionStrategy>>,
}

impl AcquisitionPipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pipeline that runs `strategies` in the given order.
    pub fn with_strategies(strategies: Vec<Box<dyn AcquisitionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Appends a strategy after the existing ones.
    pub fn add_strategy(&mut self, strategy: Box<dyn AcquisitionStrategy>) {
        self.strategies.push(strategy);
    }

    /// Returns the number of strategies in the pipeline.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Returns true if the pipeline is empty.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Strategy identifiers, in execution order.
    pub fn strategy_ids(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.id()).collect()
    }

    /// Runs strategies in order until one succeeds.
    #[instrument(skip(self, ctx), fields(account = %ctx.account_label, strategies = self.strategies.len()))]
    pub async fn execute(&self, ctx: &AcquireContext<'_>) -> AcquisitionOutcome {
        let start = Instant::now();
        let mut attempts = Vec::with_capacity(self.strategies.len());

        if self.strategies.is_empty() {
            return AcquisitionOutcome {
                result: Err(FetchError::NoStrategies),
                attempts,
                duration: start.elapsed(),
            };
        }

        info!(count = self.strategies.len(), "Executing acquisition pipeline");

        for (index, strategy) in self.strategies.iter().enumerate() {
            let strategy_id = strategy.id();
            let kind = strategy.kind();
            let attempt_start = Instant::now();
            debug!(strategy = %strategy_id, kind = %kind, "Attempting strategy");

            let outcome = strategy.attempt(ctx).await;
            let duration = attempt_start.elapsed();

            let recorded = match outcome {
                StrategyOutcome::Success(artifact) => {
                    info!(
                        strategy = %strategy_id,
                        bytes = artifact.len(),
                        duration = ?duration,
                        "Strategy succeeded"
                    );
                    attempts.push(AcquisitionAttempt {
                        ordinal: index + 1,
                        strategy_id: strategy_id.to_string(),
                        kind,
                        outcome: AttemptOutcome::Success,
                        duration,
                    });
                    return AcquisitionOutcome {
                        result: Ok(artifact),
                        attempts,
                        duration: start.elapsed(),
                    };
                }
                StrategyOutcome::Failure(reason) => {
                    warn!(strategy = %strategy_id, reason = %reason, duration = ?duration, "Strategy failed");
                    AttemptOutcome::Failure(reason)
                }
                StrategyOutcome::Skipped(reason) => {
                    debug!(strategy = %strategy_id, reason = %reason, "Strategy skipped");
                    AttemptOutcome::Skipped(reason)
                }
            };

            attempts.push(AcquisitionAttempt {
                ordinal: index + 1,
                strategy_id: strategy_id.to_string(),
                kind,
                outcome: recorded,
                duration,
            });
        }

        warn!("All acquisition strategies failed");
        let reasons = attempts.iter().filter_map(AcquisitionAttempt::reason).collect();
        AcquisitionOutcome {
            result: Err(FetchError::AcquisitionExhausted { reasons }),
            attempts,
            duration: start.elapsed(),
        }
    }

    /// Runs the pipeline and returns only the artifact or the final error.
    pub async fn acquire(&self, ctx: &AcquireContext<'_>) -> Result<ReportArtifact, FetchError> {
        self.execute(ctx).await.result
    }
}

impl std::fmt::Debug for AcquisitionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionPipeline")
            .field("strategies", &self.strategy_ids())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
