//! Transitive group membership.

use std::collections::{BTreeSet, HashMap, VecDeque};

/// Parent links between groups: a member group inherits every group that
/// contains it.
#[derive(Debug, Clone, Default)]
pub struct GroupGraph {
    parents: HashMap<String, Vec<String>>,
}

impl GroupGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `child` is a member of `parent`.
    pub fn add_edge(&mut self, parent: impl Into<String>, child: impl Into<String>) {
        self.parents
            .entry(child.into())
            .or_default()
            .push(parent.into());
    }

    /// Every group reachable upwards from `direct`, including `direct`.
    /// Cycles in the nesting are tolerated.
    pub fn closure<I, S>(&self, direct: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = direct.into_iter().map(Into::into).collect();
        while let Some(group) = queue.pop_front() {
            if !seen.insert(group.clone()) {
                continue;
            }
            if let Some(parents) = self.parents.get(&group) {
                queue.extend(parents.iter().filter(|p| !seen.contains(*p)).cloned());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_follows_nested_groups() {
        let mut g = GroupGraph::new();
        g.add_edge("g-all-staff", "g-finance");
        g.add_edge("g-everyone", "g-all-staff");
        let groups = g.closure(["g-finance"]);
        assert_eq!(
            groups.into_iter().collect::<Vec<_>>(),
            vec!["g-all-staff", "g-everyone", "g-finance"]
        );
    }

    #[test]
    fn closure_survives_cycles() {
        let mut g = GroupGraph::new();
        g.add_edge("a", "b");
        g.add_edge("b", "a");
        assert_eq!(g.closure(["a"]).len(), 2);
    }
}
