//! Suite and scenario descriptors.

use std::panic::Location;
use std::sync::Arc;

use crate::Variation;

pub type ScenarioFn = Arc<dyn Fn(&mut Variation) + Send + Sync>;

/// A registered scenario body. The name doubles as the entry-point name the
/// call-site walk stops at, so it must match how the body refers to itself.
#[derive(Clone)]
pub struct Scenario {
    name: &'static str,
    entry: ScenarioFn,
    registered_file: &'static str,
    registered_line: u32,
}

impl Scenario {
    #[track_caller]
    pub fn new(name: &'static str, entry: impl Fn(&mut Variation) + Send + Sync + 'static) -> Self {
        let location = Location::caller();
        Self {
            name,
            entry: Arc::new(entry),
            registered_file: location.file(),
            registered_line: location.line(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn entry(&self) -> ScenarioFn {
        Arc::clone(&self.entry)
    }

    pub(crate) fn registered_at(&self) -> (&'static str, u32) {
        (self.registered_file, self.registered_line)
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("registered_file", &self.registered_file)
            .field("registered_line", &self.registered_line)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Suite {
    pub name: &'static str,
    pub scenarios: Vec<Scenario>,
}

#[derive(Debug, Default)]
pub struct SuiteRegistry {
    suites: Vec<Suite>,
}

impl SuiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, suite: Suite) {
        self.suites.push(suite);
    }

    pub fn suites(&self) -> &[Suite] {
        &self.suites
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }
}
