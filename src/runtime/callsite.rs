//! Call-site identities for variation points.
//!
//! A variation point's identity is an ordered list of `file:line` tokens from
//! the resolving call outward to the scenario's registered entry point, joined
//! with `;` and suffixed with a per-run `;calls=N` occurrence counter. The
//! outward walk runs over an explicit scope stack: the scheduler pushes the
//! root frame when it dispatches a scenario body, and author helpers may
//! declare their own frames via [`crate::Variation::in_scope`] with
//! [`function_path!`]. Identity is a pure function of the frames that actually
//! executed, so loops and conditionals need no manual bookkeeping.

use std::collections::HashMap;

use crate::{KaleidoError, KaleidoResult};

/// Internal plumbing names. Frames carrying these names never contribute
/// tokens, so call sites routed through different resolver entry points still
/// compare equal.
const EXCLUDED_CALLERS: &[&str] = &[
    "pick",
    "pick_with_id",
    "pick_named",
    "insert_separator",
    "caller_site_id",
    "decide",
];

/// Captures the fully qualified path of the enclosing function, e.g.
/// `my_harness::scenarios::copy_single_object`.
#[macro_export]
macro_rules! function_path {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        name.strip_suffix("::f").unwrap_or(name)
    }};
}

/// A fully qualified function path split into package/scope/name, with any
/// generic-instantiation suffix discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScopedName {
    pub package: String,
    pub scope: Vec<String>,
    pub name: String,
}

impl ScopedName {
    pub(crate) fn parse(qualified: &str) -> KaleidoResult<ScopedName> {
        let trimmed = match qualified.find('<') {
            Some(idx) => &qualified[..idx],
            None => qualified,
        };

        let mut segments: Vec<&str> = trimmed.split("::").collect();
        while segments.last().is_some_and(|s| *s == "{{closure}}") {
            segments.pop();
        }

        if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
            return Err(KaleidoError::Usage(format!(
                "function path {qualified:?} is missing a package prefix"
            )));
        }

        let name = segments.pop().map(str::to_string).unwrap_or_default();
        let package = segments.remove(0).to_string();
        Ok(ScopedName {
            package,
            scope: segments.iter().map(|s| s.to_string()).collect(),
            name,
        })
    }
}

#[derive(Debug, Clone)]
struct Frame {
    qualified: String,
    file: String,
    line: u32,
}

/// Per-run call-site state: the explicit scope stack plus the occurrence
/// table that disambiguates repeated source locations.
#[derive(Debug)]
pub struct CallSites {
    entry_point: String,
    frames: Vec<Frame>,
    counts: HashMap<String, u32>,
}

impl CallSites {
    pub fn new(entry_point: &str) -> Self {
        Self {
            entry_point: entry_point.to_string(),
            frames: Vec::new(),
            counts: HashMap::new(),
        }
    }

    pub fn push_frame(&mut self, qualified: &str, file: &str, line: u32) {
        self.frames.push(Frame {
            qualified: qualified.to_string(),
            file: file.to_string(),
            line,
        });
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// Builds the incremented identity for a resolution made at
    /// `caller_file:caller_line`. Fails if the walk exhausts the stack before
    /// reaching the registered entry point: that is a resolver call outside a
    /// recognized scenario body, not a data error.
    pub fn identify(&mut self, caller_file: &str, caller_line: u32) -> KaleidoResult<String> {
        let mut tokens = vec![format!("{caller_file}:{caller_line}")];
        let mut reached_entry = false;

        for frame in self.frames.iter().rev() {
            let scoped = ScopedName::parse(&frame.qualified)?;
            if !EXCLUDED_CALLERS.contains(&scoped.name.as_str()) {
                tokens.push(format!("{}:{}", frame.file, frame.line));
            }
            if scoped.name.eq_ignore_ascii_case(&self.entry_point) {
                reached_entry = true;
                break;
            }
        }

        if !reached_entry {
            return Err(KaleidoError::Usage(format!(
                "{} must be on the scope stack prior to resolving a variation",
                self.entry_point
            )));
        }

        let base = tokens.join(";");
        let count = self.counts.entry(base.clone()).or_insert(0);
        *count += 1;
        Ok(format!("{base};calls={count}"))
    }
}
