use std::collections::BTreeSet;

/// Changes needed to turn the current association set into the requested one.
///
/// `requested` is filtered against `existing` first, so ids that do not
/// resolve to a row are dropped rather than rejected.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LinkDiff {
    pub to_remove: Vec<i32>,
    pub to_add: Vec<i32>,
}

impl LinkDiff {
    pub fn compute(current: &[i32], requested: &[i32], existing: &[i32]) -> Self {
        let current: BTreeSet<i32> = current.iter().copied().collect();
        let existing: BTreeSet<i32> = existing.iter().copied().collect();
        let target: BTreeSet<i32> = requested
            .iter()
            .copied()
            .filter(|id| existing.contains(id))
            .collect();

        LinkDiff {
            to_remove: current.difference(&target).copied().collect(),
            to_add: target.difference(&current).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_request_clears_everything() {
        let diff = LinkDiff::compute(&[1, 2, 3], &[], &[1, 2, 3, 4]);
        assert_eq!(diff.to_remove, vec![1, 2, 3]);
        assert!(diff.to_add.is_empty());
    }

    #[test]
    fn unknown_ids_are_dropped() {
        let diff = LinkDiff::compute(&[], &[5, 9999], &[5]);
        assert!(diff.to_remove.is_empty());
        assert_eq!(diff.to_add, vec![5]);
    }

    #[test]
    fn only_changes_are_emitted() {
        let diff = LinkDiff::compute(&[1, 2, 3], &[2, 3, 4], &[1, 2, 3, 4]);
        assert_eq!(diff.to_remove, vec![1]);
        assert_eq!(diff.to_add, vec![4]);
    }

    #[test]
    fn same_set_is_a_noop() {
        let diff = LinkDiff::compute(&[7, 8], &[8, 7, 8], &[7, 8]);
        assert!(diff.is_empty());
    }

    #[test]
    fn existing_link_to_vanished_row_is_removed_when_not_requested() {
        let diff = LinkDiff::compute(&[3], &[3], &[]);
        assert_eq!(diff.to_remove, vec![3]);
        assert!(diff.to_add.is_empty());
    }
}
