// src/health/registry.rs
use super::checker::{CheckResult, Checker};
use super::runner::PeriodicRunner;
use arc_swap::ArcSwap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::info;

/// Point-in-time view of every registered check, keyed by name.
pub type Snapshot = BTreeMap<String, CheckResult>;

type RunnerMap = HashMap<String, Arc<PeriodicRunner>>;

/// Named collection of running checks.
///
/// The map is copy-on-write: writers build a new map and publish it with a
/// compare-and-swap, so a reader always sees either the old map or the new one.
pub struct Registry {
    runners: ArcSwap<RunnerMap>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            runners: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Install `runner` under `name`, replacing any runner already there.
    ///
    /// A replaced runner is stopped before this returns and handed back to
    /// the caller.
    pub fn register(
        &self,
        name: impl Into<String>,
        runner: PeriodicRunner,
    ) -> Option<Arc<PeriodicRunner>> {
        let name = name.into();
        let runner = Arc::new(runner);

        let previous = self.runners.rcu(|current| {
            let mut next = RunnerMap::clone(current);
            next.insert(name.clone(), runner.clone());
            next
        });

        let replaced = previous.get(&name).cloned();
        match &replaced {
            Some(old) => {
                old.stop();
                info!(check = %name, kind = runner.kind(), "replaced health check");
            }
            None => {
                info!(
                    check = %name,
                    kind = runner.kind(),
                    interval = ?runner.interval(),
                    "registered health check"
                );
            }
        }
        replaced
    }

    /// Wrap `checker` in a [`PeriodicRunner`] and register it.
    pub fn register_periodic(
        &self,
        name: impl Into<String>,
        checker: Arc<dyn Checker>,
        interval: Duration,
    ) -> Option<Arc<PeriodicRunner>> {
        self.register(name, PeriodicRunner::new(checker, interval))
    }

    /// Latest cached result of every registered check.
    ///
    /// Reads only cached state; never runs a check and never waits on one.
    pub fn snapshot(&self) -> Snapshot {
        let runners = self.runners.load();
        runners
            .iter()
            .map(|(name, runner)| (name.clone(), runner.latest()))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<PeriodicRunner>> {
        self.runners.load().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.runners.load().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.runners.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.load().is_empty()
    }

    /// Stop every registered runner. Cached results stay readable.
    pub fn shutdown(&self) {
        let runners = self.runners.load();
        for runner in runners.values() {
            runner.stop();
        }
        info!("Stopped {} health check runner(s)", runners.len());
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
