//! Immutable, structurally-shared record of resolved choices for one run.

use std::sync::Arc;

/// One resolved choice. Nodes are created once and never mutated; forking a
/// run shares the entire prefix chain by reference and adds a single node.
#[derive(Debug)]
pub struct ChoiceNode {
    previous: Option<Arc<ChoiceNode>>,
    site: String,
    index: usize,
    label: String,
}

impl ChoiceNode {
    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Head of a choice chain. Cloning is cheap: only the head reference moves.
#[derive(Debug, Clone, Default)]
pub struct ChoiceLog {
    head: Option<Arc<ChoiceNode>>,
}

impl ChoiceLog {
    /// Stored answer for `site`, if this run was seeded or has already
    /// resolved there. A site occurs at most once per chain.
    pub fn lookup(&self, site: &str) -> Option<usize> {
        let mut current = self.head.as_deref();
        while let Some(node) = current {
            if node.site == site {
                return Some(node.index);
            }
            current = node.previous.as_deref();
        }
        None
    }

    /// New log sharing `self` as its prefix plus one appended choice.
    #[must_use]
    pub fn insert(&self, site: &str, index: usize, label: &str) -> ChoiceLog {
        ChoiceLog {
            head: Some(Arc::new(ChoiceNode {
                previous: self.head.clone(),
                site: site.to_string(),
                index,
                label: label.to_string(),
            })),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn len(&self) -> usize {
        let mut n = 0;
        let mut current = self.head.as_deref();
        while let Some(node) = current {
            n += 1;
            current = node.previous.as_deref();
        }
        n
    }

    /// Choice labels concatenated in resolution order. Separator labels are
    /// injected by scenarios themselves, so no joiner is added here.
    pub fn run_name(&self) -> String {
        let mut labels = Vec::new();
        let mut current = self.head.as_deref();
        while let Some(node) = current {
            labels.push(node.label.as_str());
            current = node.previous.as_deref();
        }
        labels.reverse();
        labels.concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_seeded_choice() {
        let log = ChoiceLog::default().insert("a;calls=1", 2, "Blob");
        assert_eq!(log.lookup("a;calls=1"), Some(2));
        assert_eq!(log.lookup("a;calls=2"), None);
    }

    #[test]
    fn forks_share_the_prefix_by_reference() {
        let base = ChoiceLog::default().insert("a;calls=1", 0, "Local");
        let left = base.insert("b;calls=1", 0, "Copy");
        let right = base.insert("b;calls=1", 1, "Sync");

        let left_prev = left.head.as_ref().and_then(|n| n.previous.as_ref()).expect("prefix");
        let right_prev = right.head.as_ref().and_then(|n| n.previous.as_ref()).expect("prefix");
        assert!(Arc::ptr_eq(left_prev, right_prev));
        assert_eq!(left.lookup("b;calls=1"), Some(0));
        assert_eq!(right.lookup("b;calls=1"), Some(1));
    }

    #[test]
    fn run_name_concatenates_labels_in_resolution_order() {
        let log = ChoiceLog::default()
            .insert("a;calls=1", 1, "Blob")
            .insert("sep;calls=1", 0, "->")
            .insert("b;calls=1", 0, "Local");
        assert_eq!(log.run_name(), "Blob->Local");
        assert_eq!(log.len(), 3);
    }
}
