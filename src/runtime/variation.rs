//! Run records and the variation resolver.
//!
//! A [`Variation`] is one concrete execution of a scenario body. The body
//! calls [`Variation::pick`] (and friends) at each point where multiple legal
//! values exist; the first execution of a path answers with the first option
//! and asks the scheduler to enqueue one sibling run per remaining option,
//! while replayed runs answer from their seeded choice log.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe, Location};
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    AccountHandle, CallSites, ChoiceLog, Finding, FindingKind, FindingLocation, PathTrie,
    ResourceHandle, Scenario, TraversalOperation, VariationQueue,
};

/// Exploratory passes map variation points and validate combinations without
/// real side effects; real passes replay a mapped log and do the work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Exploratory,
    Real,
}

/// Panic payload used to end a run. Caught by the scheduler; never user-visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunExit {
    Failed,
    Skipped,
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Pass/fail/soft-fail/log/skip surface handed to scenario bodies, cleanup
/// closures, and resource deletion.
pub trait Asserter {
    fn test_name(&self) -> String;

    fn log(&mut self, message: &str);

    /// Soft failure: marks the run invalid but lets it continue.
    fn assert(&mut self, comment: &str, ok: bool);

    /// Hard failure: marks the run invalid and ends it immediately.
    fn assert_now(&mut self, comment: &str, ok: bool);

    /// Hard failure with an explicit reason.
    fn error(&mut self, reason: &str);

    /// Ends the run without failing it.
    fn skip(&mut self, reason: &str);

    fn failed(&self) -> bool;
}

pub type CleanupFn = Box<dyn FnOnce(&mut dyn Asserter)>;

enum TrackedEntry {
    Account(Arc<dyn AccountHandle>),
    Resource(Arc<dyn ResourceHandle>),
}

/// One concrete run of a scenario: choice log, call-site table, validity
/// flag, run mode, resource ledger, and registered cleanup closures.
pub struct Variation {
    suite: String,
    scenario: String,
    mode: RunMode,
    run_id: Uuid,
    invalid: bool,
    choices: ChoiceLog,
    sites: CallSites,
    queue: VariationQueue,
    ledger: PathTrie<TrackedEntry>,
    cleanups: Vec<CleanupFn>,
    findings: Vec<Finding>,
    log_lines: Vec<String>,
}

impl Variation {
    pub(crate) fn new(
        suite: &str,
        scenario: &Scenario,
        mode: RunMode,
        choices: ChoiceLog,
        queue: VariationQueue,
    ) -> Self {
        let mut sites = CallSites::new(scenario.name());
        let (file, line) = scenario.registered_at();
        sites.push_frame(&format!("{suite}::{}", scenario.name()), file, line);

        Self {
            suite: suite.to_string(),
            scenario: scenario.name().to_string(),
            mode,
            run_id: Uuid::new_v4(),
            invalid: false,
            choices,
            sites,
            queue,
            ledger: PathTrie::new('/'),
            cleanups: Vec::new(),
            findings: Vec::new(),
            log_lines: Vec::new(),
        }
    }

    pub fn is_exploratory(&self) -> bool {
        self.mode == RunMode::Exploratory
    }

    pub fn run_id(&self) -> String {
        self.run_id.to_string()
    }

    pub fn variation_name(&self) -> String {
        self.choices.run_name()
    }

    /// Marks this run as one that cannot succeed. Pending variation points
    /// reached afterwards still answer, but spawn nothing.
    pub fn invalidate(&mut self) {
        self.invalid = true;
    }

    pub(crate) fn into_choices(self) -> ChoiceLog {
        self.choices
    }

    pub(crate) fn take_findings(&mut self) -> Vec<Finding> {
        std::mem::take(&mut self.findings)
    }

    pub(crate) fn take_log(&mut self) -> Vec<String> {
        std::mem::take(&mut self.log_lines)
    }

    pub(crate) fn record_panic(&mut self, message: String) {
        self.invalid = true;
        self.findings.push(Finding {
            kind: FindingKind::Panic,
            title: "scenario body panicked".to_string(),
            message,
            location: None,
        });
    }

    // ========== variation handling ==========

    /// Resolves among `options` using the current call-site identity. The
    /// first option is this path's answer on discovery; authors order the
    /// canonical/baseline option first.
    #[track_caller]
    pub fn pick<T: Clone + fmt::Display>(&mut self, options: Vec<T>) -> T {
        let id = self.caller_site_id();
        self.resolve_at(id, options)
    }

    /// Same as [`Variation::pick`], but keyed by a caller-supplied identity
    /// instead of the call stack. For call sites whose stack shape is not
    /// stable enough (e.g. invoked generically).
    pub fn pick_with_id<T: Clone + fmt::Display>(&mut self, id: &str, options: Vec<T>) -> T {
        self.resolve_at(id.to_string(), options)
    }

    /// Resolves among named options; the selected name becomes the label fed
    /// into the generated run name.
    #[track_caller]
    pub fn pick_named<T: Clone>(&mut self, options: Vec<(&str, T)>) -> T {
        let id = self.caller_site_id();
        if options.is_empty() {
            self.usage_violation("pick_named requires at least one option", None);
        }
        let labels = options.iter().map(|(name, _)| name.to_string()).collect();
        let index = self.decide(id, labels);
        match options.into_iter().nth(index) {
            Some((_, value)) => value,
            None => self.usage_violation("seeded choice does not match the presented options", None),
        }
    }

    /// Single-option resolution used purely to inject a naming token.
    /// Never branches.
    #[track_caller]
    pub fn insert_separator(&mut self, sep: &str) {
        let id = self.caller_site_id();
        let _ = self.decide(id, vec![sep.to_string()]);
    }

    /// Builds the incremented call-site identity from the live scope stack.
    #[track_caller]
    pub fn caller_site_id(&mut self) -> String {
        let location = Location::caller();
        match self.sites.identify(location.file(), location.line()) {
            Ok(id) => id,
            Err(err) => {
                let at = FindingLocation {
                    file: location.file().to_string(),
                    line: location.line(),
                };
                self.usage_violation(&err.to_string(), Some(at))
            }
        }
    }

    /// Declares a helper scope so calls made inside `f` carry this frame in
    /// their identities. Pass [`crate::function_path!`] as the name.
    #[track_caller]
    pub fn in_scope<R>(&mut self, qualified_name: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        let location = Location::caller();
        self.sites.push_frame(qualified_name, location.file(), location.line());
        let out = f(self);
        self.sites.pop_frame();
        out
    }

    fn resolve_at<T: Clone + fmt::Display>(&mut self, id: String, options: Vec<T>) -> T {
        if options.is_empty() {
            self.usage_violation("variation points require at least one option", None);
        }
        let labels = options.iter().map(|o| o.to_string()).collect();
        let index = self.decide(id, labels);
        match options.into_iter().nth(index) {
            Some(value) => value,
            None => self.usage_violation("seeded choice does not match the presented options", None),
        }
    }

    /// Core decision primitive: pure replay when the log already answers
    /// `id`; otherwise discovery — answer with the first option, and (unless
    /// this run is already invalid) ask the scheduler for one sibling run per
    /// remaining option, each seeded to answer `id` differently.
    fn decide(&mut self, id: String, labels: Vec<String>) -> usize {
        if let Some(index) = self.choices.lookup(&id) {
            return index;
        }

        if !self.invalid {
            self.queue.spawn(&self.choices, &id, &labels[1..]);
        }

        self.choices = self.choices.insert(&id, 0, &labels[0]);
        0
    }

    fn usage_violation(&mut self, message: &str, location: Option<FindingLocation>) -> ! {
        self.invalid = true;
        tracing::error!("{message}");
        self.findings.push(Finding {
            kind: FindingKind::Usage,
            title: "usage contract violation".to_string(),
            message: message.to_string(),
            location,
        });
        std::panic::panic_any(RunExit::Failed)
    }

    // ========== assertions ==========

    pub fn no_error<T, E: fmt::Display>(&mut self, comment: &str, result: &Result<T, E>, fail_now: bool) {
        if self.is_exploratory() {
            return;
        }
        if let Err(err) = result {
            self.fail_soft(comment, &format!("error was not nil: {err}"));
            if fail_now {
                std::panic::panic_any(RunExit::Failed);
            }
        }
    }

    fn fail_soft(&mut self, title: &str, message: &str) {
        self.invalid = true;
        tracing::warn!("{}: {title}: {message}", self.test_name());
        self.findings.push(Finding {
            kind: FindingKind::Assertion,
            title: title.to_string(),
            message: message.to_string(),
            location: None,
        });
    }

    // ========== cleanup and resources ==========

    /// Registers a closure to run at run exit, before ledger teardown.
    /// Rejected during exploratory passes: no real side effect may occur
    /// while only mapping the variation tree.
    pub fn defer_cleanup(&mut self, cleanup: impl FnOnce(&mut dyn Asserter) + 'static) {
        if self.is_exploratory() {
            self.usage_violation(
                "cleanup registration is not allowed during an exploratory pass",
                None,
            );
        }
        self.cleanups.push(Box::new(cleanup));
    }

    pub fn track_resource(&mut self, resource: Arc<dyn ResourceHandle>) {
        if self.is_exploratory() {
            return;
        }
        let canon = resource.canon();
        self.ledger.insert(&canon, TrackedEntry::Resource(resource));
    }

    pub fn track_account(&mut self, account: Arc<dyn AccountHandle>) {
        if self.is_exploratory() {
            return;
        }
        let name = account.account_name();
        self.ledger.insert(&name, TrackedEntry::Account(account));
    }

    /// Tears down tracked resources, parents first. Accounts and
    /// delete-capable resources take their whole subtree with them; resources
    /// without a delete operation are descended and each child attempted
    /// independently. Idempotent.
    pub fn delete_created_resources(&mut self) {
        let mut ledger = std::mem::replace(&mut self.ledger, PathTrie::new('/'));
        if ledger.is_empty() {
            return;
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut guard = CleanupAsserter { run: &mut *self };
            ledger.traverse(|entry| match entry {
                TrackedEntry::Account(account) => {
                    account.delete_account(&mut guard);
                    TraversalOperation::Remove
                }
                TrackedEntry::Resource(resource) => {
                    if resource.supports_delete() {
                        resource.delete(&mut guard);
                        TraversalOperation::Remove
                    } else {
                        TraversalOperation::Continue
                    }
                }
            });
        }));

        if let Err(payload) = outcome {
            if payload.downcast_ref::<RunExit>().is_none() {
                tracing::warn!("resource teardown panicked: {}", panic_message(&*payload));
            }
        }
    }

    /// Runs registered cleanups (newest first), then ledger teardown. Always
    /// best-effort: a failing step is logged and never masks the run outcome.
    pub(crate) fn run_teardown(&mut self) {
        let cleanups = std::mem::take(&mut self.cleanups);
        for cleanup in cleanups.into_iter().rev() {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                let mut guard = CleanupAsserter { run: &mut *self };
                cleanup(&mut guard);
            }));
            if let Err(payload) = outcome {
                if payload.downcast_ref::<RunExit>().is_none() {
                    let message = panic_message(&*payload);
                    tracing::warn!("cleanup step panicked: {message}");
                    self.findings.push(Finding {
                        kind: FindingKind::Cleanup,
                        title: "cleanup step panicked".to_string(),
                        message,
                        location: None,
                    });
                }
            }
        }
        self.delete_created_resources();
    }
}

impl Asserter for Variation {
    fn test_name(&self) -> String {
        let variation = self.choices.run_name();
        if variation.is_empty() {
            format!("{}/{}", self.suite, self.scenario)
        } else {
            format!("{}/{}/{}", self.suite, self.scenario, variation)
        }
    }

    fn log(&mut self, message: &str) {
        if self.is_exploratory() {
            return;
        }
        tracing::info!("{}: {message}", self.test_name());
        self.log_lines.push(message.to_string());
    }

    fn assert(&mut self, comment: &str, ok: bool) {
        if self.is_exploratory() || ok {
            return;
        }
        self.fail_soft(comment, "assertion failed");
    }

    fn assert_now(&mut self, comment: &str, ok: bool) {
        if self.is_exploratory() || ok {
            return;
        }
        self.fail_soft(comment, "assertion failed");
        std::panic::panic_any(RunExit::Failed)
    }

    fn error(&mut self, reason: &str) {
        if self.is_exploratory() {
            return;
        }
        self.fail_soft("error", reason);
        std::panic::panic_any(RunExit::Failed)
    }

    fn skip(&mut self, reason: &str) {
        if self.is_exploratory() {
            return;
        }
        tracing::info!("{}: skipped: {reason}", self.test_name());
        self.log_lines.push(format!("skipped: {reason}"));
        std::panic::panic_any(RunExit::Skipped)
    }

    fn failed(&self) -> bool {
        self.invalid
    }
}

/// Wraps a run for cleanup steps and resource deletion: failures are logged
/// as findings and end the step early, but never flip the run's validity —
/// teardown must not mask or override the original outcome.
pub struct CleanupAsserter<'a> {
    run: &'a mut Variation,
}

impl CleanupAsserter<'_> {
    fn record(&mut self, title: &str, message: &str) {
        tracing::warn!("{}: cleanup: {title}: {message}", self.run.test_name());
        self.run.findings.push(Finding {
            kind: FindingKind::Cleanup,
            title: title.to_string(),
            message: message.to_string(),
            location: None,
        });
    }
}

impl Asserter for CleanupAsserter<'_> {
    fn test_name(&self) -> String {
        self.run.test_name()
    }

    fn log(&mut self, message: &str) {
        self.run.log(message);
    }

    fn assert(&mut self, comment: &str, ok: bool) {
        if !ok {
            self.record(comment, "assertion failed");
        }
    }

    fn assert_now(&mut self, comment: &str, ok: bool) {
        if !ok {
            self.record(comment, "assertion failed");
            std::panic::panic_any(RunExit::Failed)
        }
    }

    fn error(&mut self, reason: &str) {
        self.record("failed cleanup step", reason);
        std::panic::panic_any(RunExit::Failed)
    }

    fn skip(&mut self, reason: &str) {
        self.run.log(&format!("cleanup step skipped: {reason}"));
        std::panic::panic_any(RunExit::Skipped)
    }

    fn failed(&self) -> bool {
        self.run.failed()
    }
}
