use std::collections::BTreeMap;

/// Partitions `items` by `key_fn`, preserving input order within each group.
///
/// Keys iterate in sorted order, so anything derived from the grouping
/// (filenames, output order) is reproducible across runs.
pub fn group_by<K, T, I, F>(items: I, key_fn: F) -> BTreeMap<K, Vec<T>>
where
    K: Ord,
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> K,
{
    let mut groups: BTreeMap<K, Vec<T>> = BTreeMap::new();
    for item in items {
        groups.entry(key_fn(&item)).or_default().push(item);
    }
    groups
}
