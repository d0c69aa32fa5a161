//! Distinctness ("diff") conditions between variables.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::term::Term;

/// Unordered pairs of names that must stay apart. Each pair is stored once, under its
/// smaller member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSet(BTreeMap<String, BTreeSet<String>>);

impl DiffSet {
    /// All pairwise combinations within each declared group.
    pub fn from_groups(groups: &[Vec<String>]) -> Self {
        let mut set = DiffSet::default();
        for group in groups {
            for (i, a) in group.iter().enumerate() {
                for b in &group[i + 1..] {
                    set.insert(a, b);
                }
            }
        }
        set
    }

    pub fn insert(&mut self, a: &str, b: &str) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        self.0.entry(lo.to_owned()).or_default().insert(hi.to_owned());
    }

    pub fn contains(&self, a: &str, b: &str) -> bool {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        self.0.get(lo).is_some_and(|set| set.contains(hi))
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .flat_map(|(a, bs)| bs.iter().map(move |b| (a.as_str(), b.as_str())))
    }
}

/// Rewrites declared groups in terms of the variables that end up at the leaves of
/// the bound values, then takes every cross pair within each group.
pub fn propagate(groups: &[Vec<String>], bindings: &HashMap<String, Term>) -> DiffSet {
    let mut set = DiffSet::default();
    if groups.is_empty() {
        return set;
    }
    let leaf_sets: HashMap<&str, BTreeSet<String>> = bindings
        .iter()
        .map(|(name, value)| (name.as_str(), value.leaves()))
        .filter(|(_, leaves)| !leaves.is_empty())
        .collect();
    for group in groups {
        let group: Vec<BTreeSet<String>> = group
            .iter()
            .filter_map(|name| {
                if bindings.contains_key(name) {
                    leaf_sets.get(name.as_str()).cloned()
                } else {
                    Some(BTreeSet::from([name.clone()]))
                }
            })
            .collect();
        for (i, left) in group.iter().enumerate() {
            for right in &group[i + 1..] {
                for a in left {
                    for b in right {
                        set.insert(a, b);
                    }
                }
            }
        }
    }
    set
}

/// Pairs of `required` that break the enclosing theorem's own conditions. Only pairs
/// where both members are parameters of the theorem are checked, apart from a variable
/// required distinct from itself, which is always a violation.
pub fn violations(
    required: &DiffSet,
    declared: &DiffSet,
    params: &HashSet<&str>,
) -> Vec<(String, String)> {
    let mut acc = vec![];
    for (a, bs) in &required.0 {
        if bs.contains(a) {
            acc.push((a.clone(), a.clone()));
        }
        if !params.contains(a.as_str()) {
            continue;
        }
        if let Some(b) = bs
            .iter()
            .filter(|b| *b != a && params.contains(b.as_str()))
            .find(|b| !declared.contains(a, b))
        {
            acc.push((a.clone(), b.clone()));
        }
    }
    acc
}
