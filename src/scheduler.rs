//! Interval loop: run the suite, report it, sleep, repeat until shutdown

use crate::{executor::SuiteRunner, logging::Logger, output::Reporter};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

pub struct Scheduler {
    suite: Arc<dyn SuiteRunner>,
    reporter: Reporter,
    logger: Arc<Logger>,
    interval: Duration,
    max_runs: Option<u32>,
}

impl Scheduler {
    pub fn new(suite: Arc<dyn SuiteRunner>, reporter: Reporter, logger: Arc<Logger>, interval: Duration) -> Self {
        Self {
            suite,
            reporter,
            logger,
            interval,
            max_runs: None,
        }
    }

    /// Stop on its own after `runs` completed runs
    pub fn with_max_runs(mut self, runs: u32) -> Self {
        self.max_runs = Some(runs);
        self
    }

    /// Loop until `shutdown` resolves. A run still in flight at that point
    /// is dropped and not counted. Returns the number of completed runs.
    pub async fn run_until<F>(&self, shutdown: F) -> u32
    where
        F: Future,
    {
        tokio::pin!(shutdown);
        let mut completed = 0u32;

        loop {
            let run_number = completed + 1;
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    self.logger.warning(format!("Run {} interrupted", run_number)).log();
                    break;
                }
                summary = self.suite.run_suite() => {
                    self.reporter.report(&summary, run_number);
                    completed = run_number;
                }
            }

            if self.max_runs.is_some_and(|max| completed >= max) {
                break;
            }

            self.logger
                .info(format!("Next run in {}", describe_interval(self.interval)))
                .log();
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = sleep(self.interval) => {}
            }
        }

        self.logger
            .info(format!("Monitoring stopped - {} run(s) completed", completed))
            .log();
        completed
    }
}

fn describe_interval(interval: Duration) -> String {
    let secs = interval.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        format!("{} minute(s)", secs / 60)
    } else {
        format!("{} second(s)", secs)
    }
}
