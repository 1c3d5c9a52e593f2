//! Test suite orchestration
//!
//! A [`Suite`] is constructed by its own setup function (the suite-level
//! setup), then driven by [`SuiteRunner`]: cases run one after another,
//! `teardown_test` runs after every case whatever its outcome, and
//! `teardown_suite` runs once at the end.

pub mod block_create;
pub mod cleanup;
pub mod smoke;

pub use block_create::BlockImageCreateSuite;
pub use cleanup::{sweep_block_images, sweep_tracked_resources, CleanupReport};
pub use smoke::{KubernetesHarness, SmokeSuite, StandAloneHarness, StorageHarness};

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Debug;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, Instrument, Span};

// =============================================================================
// Suite Trait
// =============================================================================

#[async_trait]
pub trait Suite: Send + Sync {
    fn name(&self) -> &str;

    /// Case names in execution order
    fn cases(&self) -> Vec<&'static str>;

    /// Span the suite was constructed with; case spans are its children
    fn span(&self) -> &Span;

    async fn run_case(&self, case: &str) -> Result<()>;

    /// Runs after every case, passed or failed
    async fn teardown_test(&self, case: &str) -> CleanupReport;

    async fn teardown_suite(&self) -> CleanupReport;
}

/// Error for a case name the suite does not define
pub fn unknown_case(suite: &str, case: &str) -> Error {
    Error::Internal(format!("suite {} has no case {}", suite, case))
}

// =============================================================================
// Assertions
// =============================================================================

pub fn ensure(condition: bool, message: impl Into<String>) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::AssertionFailed(message.into()))
    }
}

pub fn ensure_eq<T: PartialEq + Debug>(actual: T, expected: T, what: &str) -> Result<()> {
    ensure(
        actual == expected,
        format!("{}: expected {:?}, got {:?}", what, expected, actual),
    )
}

pub fn ensure_contains(haystack: &str, needle: &str, what: &str) -> Result<()> {
    ensure(
        haystack.contains(needle),
        format!("{}: {:?} does not contain {:?}", what, haystack, needle),
    )
}

// =============================================================================
// Reports
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum CaseOutcome {
    Passed,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub name: String,
    pub outcome: CaseOutcome,
    pub duration: Duration,
    pub cleanup: CleanupReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub suite: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cases: Vec<CaseReport>,
    pub teardown: CleanupReport,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.cases
            .iter()
            .filter(|c| c.outcome == CaseOutcome::Passed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.cases.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {} passed, {} failed in {}s",
            self.suite,
            self.passed(),
            self.failed(),
            (self.finished_at - self.started_at).num_seconds()
        )
    }
}

// =============================================================================
// Runner
// =============================================================================

/// Runs the cases of a suite sequentially
#[derive(Debug, Clone, Default)]
pub struct SuiteRunner {
    /// Only run cases whose name contains this substring
    filter: Option<String>,
}

impl SuiteRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }

    fn selected(&self, case: &str) -> bool {
        self.filter
            .as_deref()
            .map(|f| case.contains(f))
            .unwrap_or(true)
    }

    pub async fn run(&self, suite: &dyn Suite) -> SuiteReport {
        let started_at = Utc::now();
        let mut cases = Vec::new();

        for case in suite.cases().into_iter().filter(|c| self.selected(c)) {
            let span = info_span!(parent: suite.span(), "case", name = case);
            let start = Instant::now();

            let outcome = match suite.run_case(case).instrument(span.clone()).await {
                Ok(()) => {
                    info!(parent: &span, "PASS {}", case);
                    CaseOutcome::Passed
                }
                Err(e) => {
                    error!(parent: &span, "FAIL {}: {}", case, e);
                    CaseOutcome::Failed(e.to_string())
                }
            };
            let cleanup = suite.teardown_test(case).instrument(span).await;

            cases.push(CaseReport {
                name: case.to_string(),
                outcome,
                duration: start.elapsed(),
                cleanup,
            });
        }

        let teardown = suite
            .teardown_suite()
            .instrument(suite.span().clone())
            .await;

        SuiteReport {
            suite: suite.name().to_string(),
            started_at,
            finished_at: Utc::now(),
            cases,
            teardown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;

    struct Recording {
        span: Span,
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Suite for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn cases(&self) -> Vec<&'static str> {
            vec!["first_passes", "second_fails", "third_passes"]
        }

        fn span(&self) -> &Span {
            &self.span
        }

        async fn run_case(&self, case: &str) -> Result<()> {
            self.events.lock().push(format!("run {}", case));
            ensure(case != "second_fails", "intentional failure")
        }

        async fn teardown_test(&self, case: &str) -> CleanupReport {
            self.events.lock().push(format!("teardown {}", case));
            CleanupReport::default()
        }

        async fn teardown_suite(&self) -> CleanupReport {
            self.events.lock().push("teardown suite".into());
            CleanupReport::default()
        }
    }

    fn recording() -> Recording {
        Recording {
            span: Span::none(),
            events: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_teardown_runs_after_failing_case() {
        let suite = recording();
        let report = SuiteRunner::new().run(&suite).await;

        assert_eq!(report.passed(), 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.all_passed());
        assert_matches!(
            &report.cases[1].outcome,
            CaseOutcome::Failed(reason) if reason.contains("intentional failure")
        );
        assert_eq!(
            *suite.events.lock(),
            vec![
                "run first_passes",
                "teardown first_passes",
                "run second_fails",
                "teardown second_fails",
                "run third_passes",
                "teardown third_passes",
                "teardown suite",
            ]
        );
    }

    #[tokio::test]
    async fn test_filter_selects_cases() {
        let suite = recording();
        let report = SuiteRunner::new()
            .with_filter(Some("passes".into()))
            .run(&suite)
            .await;
        assert_eq!(report.cases.len(), 2);
        assert!(report.all_passed());
        assert!(report.summary().starts_with("recording: 2 passed, 0 failed"));
    }

    #[test]
    fn test_assertion_helpers() {
        assert!(ensure_eq(3, 3, "count").is_ok());
        assert_matches!(
            ensure_eq(3, 4, "image count"),
            Err(Error::AssertionFailed(msg)) if msg == "image count: expected 4, got 3"
        );
        assert!(ensure_contains("succeeded created image testImage", "succeeded created image", "message").is_ok());
        assert!(ensure_contains("boom", "succeeded", "message").is_err());
    }
}
