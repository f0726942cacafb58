//! Kaleido core library: variation engine, suite registry, and harness surface.

#[path = "runtime/callsite.rs"]
mod callsite;
#[path = "model/choices.rs"]
mod choices;
#[path = "cmd/cli.rs"]
mod cli;
#[path = "platform/config.rs"]
mod config;
#[path = "platform/error.rs"]
mod error;
#[path = "runtime/ledger.rs"]
mod ledger;
#[path = "runtime/mock_resources.rs"]
mod mock_resources;
#[path = "model/reporting.rs"]
mod reporting;
#[path = "model/resources.rs"]
mod resources;
#[path = "cmd/runner.rs"]
mod runner;
#[path = "runtime/scheduler.rs"]
mod scheduler;
#[path = "model/suite.rs"]
mod suite;
#[path = "runtime/variation.rs"]
mod variation;

pub use callsite::*;
pub use choices::*;
pub use cli::*;
pub use config::*;
pub use error::*;
pub use ledger::*;
pub use mock_resources::*;
pub use reporting::*;
pub use resources::*;
pub use runner::*;
pub use scheduler::*;
pub use suite::*;
pub use variation::*;
