//! Variation scheduling: the pending-run queue and scenario dispatch.

use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore as _, SeedableRng as _};
use serde::{Deserialize, Serialize};

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, Once, PoisonError};
use std::sync::Arc;
use std::time::Instant;

use crate::variation::{panic_message, RunExit};
use crate::{Asserter as _, ChoiceLog, RunMode, RunStatus, Scenario, Variation, VariationReport};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunOrder {
    Fifo,
    Shuffled,
}

impl clap::ValueEnum for RunOrder {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Fifo, Self::Shuffled]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::Fifo => clap::builder::PossibleValue::new("fifo"),
            Self::Shuffled => clap::builder::PossibleValue::new("shuffled"),
        })
    }
}

/// A run waiting to execute: a choice-log prefix, usually seeded one node
/// past its parent's discovery point.
#[derive(Debug, Clone)]
pub struct PendingVariation {
    pub choices: ChoiceLog,
}

impl PendingVariation {
    pub fn root() -> Self {
        Self {
            choices: ChoiceLog::default(),
        }
    }
}

#[derive(Debug)]
struct QueueState {
    pending: VecDeque<PendingVariation>,
    order: RunOrder,
    rng: ChaCha20Rng,
}

/// Pending-run queue shared between the dispatcher and every live run.
/// Guarded by its own mutex, like any non-reentrant resource the framework
/// touches from concurrently-running scenarios.
#[derive(Debug, Clone)]
pub struct VariationQueue {
    inner: Arc<Mutex<QueueState>>,
}

impl VariationQueue {
    pub fn new(order: RunOrder, seed: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueState {
                pending: VecDeque::new(),
                order,
                rng: rng_from_seed(seed),
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, pending: PendingVariation) {
        self.lock().pending.push_back(pending);
    }

    /// Clones `source`'s full choice-log prefix and schedules one new run per
    /// remaining option, each seeded to answer `id` with its assigned option.
    /// Fire-and-forget: the discovering run never blocks on siblings.
    pub fn spawn(&self, source: &ChoiceLog, id: &str, remaining: &[String]) {
        let mut state = self.lock();
        for (offset, label) in remaining.iter().enumerate() {
            state.pending.push_back(PendingVariation {
                choices: source.insert(id, offset + 1, label),
            });
        }
    }

    pub fn pop(&self) -> Option<PendingVariation> {
        let mut state = self.lock();
        if state.pending.is_empty() {
            return None;
        }
        let idx = match state.order {
            RunOrder::Fifo => 0,
            RunOrder::Shuffled => (state.rng.next_u64() as usize) % state.pending.len(),
        };
        state.pending.remove(idx)
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }
}

pub fn gen_seed() -> u64 {
    let mut seed = [0u8; 8];
    rand_core::OsRng.fill_bytes(&mut seed);
    u64::from_le_bytes(seed)
}

fn rng_from_seed(seed: u64) -> ChaCha20Rng {
    let seed_bytes = blake3::hash(&seed.to_le_bytes()).as_bytes().to_owned();
    let mut seed32 = [0u8; 32];
    seed32.copy_from_slice(&seed_bytes[..32]);
    ChaCha20Rng::from_seed(seed32)
}

enum PassOutcome {
    Completed,
    Failed,
    Skipped,
}

fn execute_pass(run: &mut Variation, scenario: &Scenario) -> PassOutcome {
    let entry = scenario.entry();
    let outcome = catch_unwind(AssertUnwindSafe(|| (*entry)(&mut *run)));
    match outcome {
        Ok(()) => PassOutcome::Completed,
        Err(payload) => match payload.downcast_ref::<RunExit>() {
            Some(RunExit::Failed) => PassOutcome::Failed,
            Some(RunExit::Skipped) => PassOutcome::Skipped,
            None => {
                run.record_panic(panic_message(&*payload));
                PassOutcome::Failed
            }
        },
    }
}

/// Run-ending panics are harness control flow; keep the default hook from
/// printing a backtrace for each one.
fn install_panic_silencer() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if info.payload().downcast_ref::<RunExit>().is_none() {
                previous(info);
            }
        }));
    });
}

/// Executes every concrete variation of `scenario` and reports one outcome
/// per real run.
///
/// Each pending variation is first dispatched as an exploratory pass that
/// maps the remaining variation points (spawning siblings as it discovers
/// them) and validates the combination. Valid combinations are then executed
/// for real by replaying the completed log; teardown runs whether or not the
/// real pass succeeded.
pub fn run_scenario(
    suite_name: &str,
    scenario: &Scenario,
    order: RunOrder,
    seed: u64,
) -> Vec<VariationReport> {
    install_panic_silencer();

    let queue = VariationQueue::new(order, seed);
    queue.push(PendingVariation::root());

    let mut reports = Vec::new();
    while let Some(pending) = queue.pop() {
        let started = Instant::now();

        let mut mapping = Variation::new(
            suite_name,
            scenario,
            RunMode::Exploratory,
            pending.choices,
            queue.clone(),
        );
        let mapping_outcome = execute_pass(&mut mapping, scenario);

        match mapping_outcome {
            PassOutcome::Failed => {
                // The mapping pass itself broke (usage violation or panic):
                // surface it instead of running anything for real.
                reports.push(VariationReport {
                    name: mapping.test_name(),
                    run_id: mapping.run_id(),
                    status: RunStatus::Fail,
                    duration_ms: duration_ms(started),
                    findings: mapping.take_findings(),
                    log: mapping.take_log(),
                });
                continue;
            }
            PassOutcome::Skipped | PassOutcome::Completed if mapping.failed() => {
                tracing::debug!(
                    "variation {} invalidated while mapping; nothing to run",
                    mapping.test_name()
                );
                continue;
            }
            PassOutcome::Skipped => continue,
            PassOutcome::Completed => {}
        }

        let mut run = Variation::new(
            suite_name,
            scenario,
            RunMode::Real,
            mapping.into_choices(),
            queue.clone(),
        );
        let outcome = execute_pass(&mut run, scenario);
        run.run_teardown();

        let status = match outcome {
            PassOutcome::Skipped => RunStatus::Skip,
            PassOutcome::Failed => RunStatus::Fail,
            PassOutcome::Completed if run.failed() => RunStatus::Fail,
            PassOutcome::Completed => RunStatus::Pass,
        };

        reports.push(VariationReport {
            name: run.test_name(),
            run_id: run.run_id(),
            status,
            duration_ms: duration_ms(started),
            findings: run.take_findings(),
            log: run.take_log(),
        });
    }

    reports
}

fn duration_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_enqueues_one_run_per_remaining_option() {
        let queue = VariationQueue::new(RunOrder::Fifo, 0);
        let base = ChoiceLog::default().insert("first", 0, "A");
        queue.spawn(&base, "second", &["Y".to_string(), "Z".to_string()]);
        assert_eq!(queue.len(), 2);

        let y = queue.pop().expect("first sibling");
        assert_eq!(y.choices.lookup("second"), Some(1));
        assert_eq!(y.choices.lookup("first"), Some(0));
        let z = queue.pop().expect("second sibling");
        assert_eq!(z.choices.lookup("second"), Some(2));
    }

    #[test]
    fn shuffled_pop_drains_everything() {
        let queue = VariationQueue::new(RunOrder::Shuffled, 42);
        for i in 0..5 {
            queue.push(PendingVariation {
                choices: ChoiceLog::default().insert("site", i, "x"),
            });
        }
        let mut seen = 0;
        while queue.pop().is_some() {
            seen += 1;
        }
        assert_eq!(seen, 5);
        assert!(queue.is_empty());
    }
}
