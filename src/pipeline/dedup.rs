//! Name Deduplicator.

use std::collections::HashMap;
use std::collections::HashSet;

/// Makes every name unique by suffixing `_1`, `_2`, … to repeated occurrences, scanning
/// left to right. First occurrences are never renamed and an already-unique list is
/// returned unchanged. A suffixed name that collides with a later literal name is skipped
/// over, so `["a", "a", "a_1"]` becomes `["a", "a_1", "a_1_1"]`.
pub fn deduplicate<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut assigned = HashSet::<String>::with_capacity(names.len());
    let mut counters = HashMap::<&str, usize>::new();
    let mut unique = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_ref();
        let candidate = if assigned.contains(name) {
            let counter = counters.entry(name).or_insert(0);
            loop {
                *counter += 1;
                let candidate = format!("{name}_{counter}");
                if !assigned.contains(&candidate) {
                    break candidate;
                }
            }
        } else {
            name.to_owned()
        };
        assigned.insert(candidate.clone());
        unique.push(candidate);
    }
    unique
}
