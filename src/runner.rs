use crate::{error::Error, suite::E2ETestSuite};
use std::{
    error::Error as StdError,
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{error, info, warn};

/// What a scenario returns. Any error fails the scenario.
pub type TestResult = Result<(), Box<dyn StdError + Send + Sync>>;

/// Handed to each scenario: the shared suite and the scenario's unique name.
#[derive(Clone)]
pub struct TestContext {
    pub suite: Arc<E2ETestSuite>,
    pub name: String,
}

/// The result of one scenario.
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub name: String,
    pub description: String,
    pub elapsed: Duration,
    pub error: Option<String>,
}

impl TestOutcome {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/**
   Runs scenarios one after another against a shared suite and reports which
   of them failed.

   A failing scenario does not stop the run. [`TestRunner::join`] fails if
   any scenario did.
*/
pub struct TestRunner {
    suite: Arc<E2ETestSuite>,
    /// Only scenarios whose name contains this run.
    filter: Option<String>,
    outcomes: Vec<TestOutcome>,
    started: Option<Instant>,
}

impl TestRunner {
    pub fn new(suite: Arc<E2ETestSuite>, filter: Option<String>) -> Self {
        Self {
            suite,
            filter,
            outcomes: Vec::new(),
            started: None,
        }
    }

    pub fn start(&mut self) -> Result<&mut Self, Error> {
        let chain_ids = self
            .suite
            .chains()
            .iter()
            .map(|chain| chain.chain_id())
            .collect::<Vec<_>>();

        if chain_ids.is_empty() {
            return Err(Error::Assertion("the suite has no chains".to_owned()));
        }

        info!("running tests against {}", itertools::join(chain_ids, ", "));
        self.started = Some(Instant::now());

        Ok(self)
    }

    pub fn suite(&self) -> &Arc<E2ETestSuite> {
        &self.suite
    }

    pub fn outcomes(&self) -> &[TestOutcome] {
        &self.outcomes
    }

    fn selected(&self, name: &str) -> bool {
        self.filter.as_ref().map_or(true, |filter| name.contains(filter.as_str()))
    }

    /// Runs `scenario` as the test `name`, then writes its diagnostics.
    pub async fn run<F, Fut>(&mut self, scenario: F, name: &str, description: &str) -> Result<&mut Self, Error>
    where
        F: FnOnce(TestContext) -> Fut,
        Fut: Future<Output = TestResult>,
    {
        if !self.selected(name) {
            info!("skipping {name}");
            return Ok(self);
        }

        info!("-- {name}: {description}");

        let ctx = TestContext {
            suite: self.suite.clone(),
            name: name.to_owned(),
        };

        let start = Instant::now();
        let result = scenario(ctx).await;
        let elapsed = start.elapsed();

        let error = match result {
            Ok(()) => {
                info!("PASS {name} ({:.1}s)", elapsed.as_secs_f64());
                None
            }
            Err(err) => {
                error!("FAIL {name} ({:.1}s): {err}", elapsed.as_secs_f64());
                Some(err.to_string())
            }
        };

        if let Err(err) = self.suite.finish_test(name, error.is_some()).await {
            warn!("failed cleaning up after {name}: {err}");
        }

        self.outcomes.push(TestOutcome {
            name: name.to_owned(),
            description: description.to_owned(),
            elapsed,
            error,
        });

        Ok(self)
    }

    /// Logs a summary and fails if any scenario failed.
    pub fn join(&mut self) -> Result<(), Error> {
        let failed = self
            .outcomes
            .iter()
            .filter(|outcome| !outcome.passed())
            .collect::<Vec<_>>();

        let elapsed = self.started.map(|started| started.elapsed()).unwrap_or_default();
        info!(
            "{} passed, {} failed in {:.1}s",
            self.outcomes.len() - failed.len(),
            failed.len(),
            elapsed.as_secs_f64()
        );

        if failed.is_empty() {
            return Ok(());
        }

        for outcome in &failed {
            error!(
                "{} ({}): {}",
                outcome.name,
                outcome.description,
                outcome.error.as_deref().unwrap_or_default()
            );
        }

        Err(Error::Assertion(format!(
            "failed tests: {}",
            itertools::join(failed.iter().map(|outcome| outcome.name.as_str()), ", ")
        )))
    }
}
