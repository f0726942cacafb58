//! Boundary contracts for resources handed to the ledger.
//!
//! Resource managers, the copy tool, and remote management clients are opaque
//! to the engine. The only contract required of anything tracked for teardown
//! is a canonical hierarchical path and, optionally, a delete operation.

use crate::Asserter;

pub trait ResourceHandle {
    /// Canonical hierarchical path, e.g. `account/container/object`.
    fn canon(&self) -> String;

    /// Whether [`ResourceHandle::delete`] does anything for this handle.
    fn supports_delete(&self) -> bool {
        false
    }

    fn delete(&self, a: &mut dyn Asserter) {
        let _ = a;
    }
}

pub trait AccountHandle {
    fn account_name(&self) -> String;

    fn delete_account(&self, a: &mut dyn Asserter);
}
