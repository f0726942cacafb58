//! Demo suite run through the harness entry point (`harness = false`).

use std::fmt;
use std::process::ExitCode;

use kaleido::{
    function_path, harness_main, Asserter, MockContainer, MockStore, Scenario, Suite,
    SuiteRegistry, Variation,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Local,
    Blob,
    Files,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Location::Local => "Local",
            Location::Blob => "Blob",
            Location::Files => "Files",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Copy,
    Sync,
}

fn provision_container(
    v: &mut Variation,
    store: &MockStore,
    account: &str,
    location: Location,
) -> MockContainer {
    v.in_scope(function_path!(), |v| {
        let container = store.account(account).container("data");
        let container = if location == Location::Local {
            // Local roots are never deleted by the harness.
            container.without_delete()
        } else {
            container
        };
        container.create(v);
        container
    })
}

/// Stands in for invoking the external storage-copy tool.
fn run_copy_tool(v: &mut Variation, src: &MockContainer, dst: &MockContainer) {
    if v.is_exploratory() {
        return;
    }
    let objects = src.objects();
    for (name, body) in &objects {
        dst.object(name).put(body);
    }
    v.log(&format!("copied {} objects", objects.len()));
}

fn copy_single_object(v: &mut Variation) {
    let store = MockStore::default();

    let src_location = v.pick(vec![Location::Local, Location::Blob, Location::Files]);
    v.insert_separator("->");
    let dst_location = v.pick(vec![Location::Local, Location::Blob, Location::Files]);

    if src_location == Location::Local && dst_location == Location::Local {
        v.invalidate();
        return;
    }

    let src = provision_container(v, &store, "srcacct", src_location);
    let dst = provision_container(v, &store, "dstacct", dst_location);

    let body = b"kaleido demo payload";
    src.object("payload.bin").create(v, body);

    run_copy_tool(v, &src, &dst);

    let copied = dst.object("payload.bin");
    v.assert("copied object exists", copied.exists());
    v.assert(
        "copied object body matches",
        copied.body().as_deref() == Some(body.as_slice()),
    );
}

fn copy_object_tree(v: &mut Variation) {
    let store = MockStore::default();
    let verb = v.pick_named(vec![("Copy", Verb::Copy), ("Sync", Verb::Sync)]);

    let src = provision_container(v, &store, "srcacct", Location::Blob);
    let dst = provision_container(v, &store, "dstacct", Location::Files);

    let names = ["abc", "def", "foobar"];
    for name in names {
        src.object(name).create(v, name.as_bytes());
    }
    if verb == Verb::Sync {
        // Sync requires an existing destination set to reconcile.
        for name in names {
            dst.object(name).create(v, b"");
        }
    }

    if !v.is_exploratory() {
        v.defer_cleanup(|a| a.log("demo cleanup step"));
    }

    run_copy_tool(v, &src, &dst);

    for name in names {
        v.assert(
            "object body matches after transfer",
            dst.object(name).body().as_deref() == Some(name.as_bytes()),
        );
    }
}

fn main() -> ExitCode {
    let mut registry = SuiteRegistry::new();
    registry.register(Suite {
        name: "BasicCopy",
        scenarios: vec![
            Scenario::new("copy_single_object", copy_single_object),
            Scenario::new("copy_object_tree", copy_object_tree),
        ],
    });
    harness_main(registry)
}
