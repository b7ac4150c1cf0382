//! Load balancing of extraction targets across workers.
//!
//! Targets are handed out largest first, each to whichever group currently
//! carries the least weight (longest-processing-time-first scheduling).
//! Files that are unchanged since a previous run weigh nothing, because the
//! client will skip them.

use time::OffsetDateTime;

use crate::inventory::{Inventory, empty_dirs};

/// Worker count used when none is configured.
pub const DEFAULT_WORKERS: usize = 10;

/// A path to request from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub size: u64,
    /// `None` for empty directories, which are never discounted
    pub modified_at: Option<OffsetDateTime>,
}

impl Target {
    /// Size, or zero if `previous` holds an identical entry.
    pub fn effective_weight(&self, previous: Option<&Inventory>) -> u64 {
        match (previous, self.modified_at) {
            (Some(previous), Some(modified_at))
                if previous.is_unchanged(&self.name, self.size, modified_at) =>
            {
                0
            }
            _ => self.size,
        }
    }
}

/// Files for one worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Group {
    pub files: Vec<String>,
    /// Sum of the members' effective weights
    pub weight: u64,
}

impl Group {
    pub fn add(&mut self, name: String, weight: u64) {
        self.files.push(name);
        self.weight = self.weight.saturating_add(weight);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Every file in the inventory plus the directories that would not be
/// recreated by extracting those files.
pub fn extraction_targets(inventory: &Inventory) -> Vec<Target> {
    let mut targets: Vec<Target> = inventory
        .files()
        .map(|entry| Target {
            name: entry.name.clone(),
            size: entry.size,
            modified_at: Some(entry.modified_at),
        })
        .collect();

    let dirs = empty_dirs(
        inventory.files().map(|e| e.name.as_str()),
        inventory.directories().map(|e| e.name.as_str()),
    );
    targets.extend(dirs.into_iter().map(|name| Target {
        name,
        size: 0,
        modified_at: None,
    }));

    targets
}

/// Split `targets` into at most `workers` groups of balanced weight.
///
/// A worker count of zero means [`DEFAULT_WORKERS`]. Groups that receive no
/// targets are left out, so fewer groups than workers may be returned.
pub fn partition(
    mut targets: Vec<Target>,
    workers: usize,
    previous: Option<&Inventory>,
) -> Vec<Group> {
    let workers = if workers == 0 { DEFAULT_WORKERS } else { workers };
    let mut groups = vec![Group::default(); workers];

    // Stable, so equal sizes keep their incoming order.
    targets.sort_by(|a, b| b.size.cmp(&a.size));

    for target in targets {
        let weight = target.effective_weight(previous);
        let lightest = lightest_group(&groups);
        groups[lightest].add(target.name, weight);
    }

    groups.retain(|g| !g.is_empty());
    groups
}

/// Index of the group with the least weight; the first one wins ties.
fn lightest_group(groups: &[Group]) -> usize {
    let mut lightest = 0;
    for (idx, group) in groups.iter().enumerate() {
        if group.weight < groups[lightest].weight {
            lightest = idx;
        }
    }
    lightest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::Entry;
    use rstest::rstest;
    use std::collections::BTreeSet;
    use time::macros::datetime;

    const WHEN: OffsetDateTime = datetime!(2025-06-01 08:30 UTC);

    fn file(name: &str, size: u64) -> Target {
        Target {
            name: name.to_string(),
            size,
            modified_at: Some(WHEN),
        }
    }

    fn entry(name: &str, size: u64) -> Entry {
        Entry {
            name: name.to_string(),
            size,
            modified_at: WHEN,
        }
    }

    fn sample() -> Vec<Target> {
        vec![file("big", 100), file("a", 10), file("b", 10), file("c", 10)]
    }

    #[test]
    fn test_largest_first_scenario() {
        let groups = partition(sample(), 2, None);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].files, ["big"]);
        assert_eq!(groups[0].weight, 100);
        assert_eq!(groups[1].files, ["a", "b", "c"]);
        assert_eq!(groups[1].weight, 30);
    }

    #[test]
    fn test_unchanged_file_goes_to_lightest_group() {
        let previous: Inventory = [entry("big", 100)].into_iter().collect();
        let groups = partition(sample(), 2, Some(&previous));
        assert_eq!(groups[0].files, ["big", "a", "c"]);
        assert_eq!(groups[0].weight, 20);
        assert_eq!(groups[1].files, ["b"]);
        assert_eq!(groups[1].weight, 10);
    }

    #[test]
    fn test_changed_file_is_not_discounted() {
        let previous: Inventory = [
            entry("big", 99),
            Entry {
                modified_at: datetime!(2025-06-01 08:31 UTC),
                ..entry("a", 10)
            },
        ]
        .into_iter()
        .collect();
        let with_previous = partition(sample(), 2, Some(&previous));
        assert_eq!(with_previous, partition(sample(), 2, None));
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(3)]
    #[case(10)]
    #[case(64)]
    fn test_every_target_assigned_once(#[case] workers: usize) {
        let targets: Vec<Target> = (0..37u64)
            .map(|i| file(&format!("f{i}"), (i * 7919) % 101))
            .collect();
        let expected: BTreeSet<String> = targets.iter().map(|t| t.name.clone()).collect();

        let groups = partition(targets, workers, None);
        assert!(groups.len() <= workers);
        assert!(groups.iter().all(|g| !g.is_empty()));

        let assigned: Vec<String> = groups
            .iter()
            .flat_map(|g| g.files.iter().cloned())
            .collect();
        assert_eq!(assigned.len(), expected.len());
        assert_eq!(assigned.into_iter().collect::<BTreeSet<_>>(), expected);
    }

    #[test]
    fn test_single_worker_gets_everything() {
        let groups = partition(sample(), 1, None);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 4);
        assert_eq!(groups[0].weight, 130);
    }

    #[test]
    fn test_zero_workers_uses_default() {
        let targets: Vec<Target> = (0..25).map(|i| file(&format!("f{i}"), 5)).collect();
        assert_eq!(partition(targets, 0, None).len(), DEFAULT_WORKERS);
    }

    #[test]
    fn test_small_inventory_drops_empty_groups() {
        let groups = partition(vec![file("only", 1)], 4, None);
        assert_eq!(groups.len(), 1);
        assert!(partition(Vec::new(), 4, None).is_empty());
    }

    #[rstest]
    #[case(17, 4)]
    #[case(40, 10)]
    #[case(9, 9)]
    #[case(3, 5)]
    fn test_equal_sizes_stay_within_one_item(#[case] count: usize, #[case] workers: usize) {
        let targets: Vec<Target> = (0..count).map(|i| file(&format!("f{i}"), 64)).collect();
        let groups = partition(targets, workers, None);
        let max = groups.iter().map(|g| g.weight).max().unwrap();
        let min = groups.iter().map(|g| g.weight).min().unwrap();
        assert!(max - min <= 64);
    }

    #[test]
    fn test_huge_sizes_saturate_instead_of_overflowing() {
        let huge = i64::MAX as u64;
        let targets = vec![file("x", huge), file("y", huge), file("z", huge)];

        let single = partition(targets.clone(), 1, None);
        assert_eq!(single[0].len(), 3);
        assert_eq!(single[0].weight, u64::MAX);

        let spread = partition(targets, 3, None);
        assert!(spread.iter().all(|g| g.len() == 1 && g.weight == huge));
    }

    #[test]
    fn test_discount_never_increases_weight() {
        let previous: Inventory = (0..20).map(|i| entry(&format!("f{i}"), i * 3)).collect();
        let targets: Vec<Target> = (0..40).map(|i| file(&format!("f{i}"), i * 3)).collect();
        let total_weight = |groups: Vec<Group>| groups.iter().map(|g| g.weight).sum::<u64>();
        let total_plain = total_weight(partition(targets.clone(), 3, None));
        let total_discounted = total_weight(partition(targets, 3, Some(&previous)));
        assert_eq!(total_plain, (0..40).map(|i| i * 3).sum::<u64>());
        assert_eq!(total_discounted, (20..40).map(|i| i * 3).sum::<u64>());
    }

    #[test]
    fn test_extraction_targets_include_empty_dirs() {
        let inventory: Inventory = [
            entry("a/", 0),
            entry("a/b/", 0),
            entry("a/b/c.txt", 12),
            entry("empty/", 0),
            entry("top.txt", 4),
        ]
        .into_iter()
        .collect();
        let targets = extraction_targets(&inventory);
        let names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["a/b/c.txt", "top.txt", "empty/"]);
        assert_eq!(targets[2].size, 0);
        assert_eq!(targets[2].modified_at, None);
    }

    #[test]
    fn test_empty_dir_is_never_discounted() {
        let previous: Inventory = [entry("empty/", 0)].into_iter().collect();
        let target = Target {
            name: "empty/".to_string(),
            size: 0,
            modified_at: None,
        };
        assert_eq!(target.effective_weight(Some(&previous)), 0);
        assert_eq!(file("x", 5).effective_weight(Some(&previous)), 5);
    }
}
