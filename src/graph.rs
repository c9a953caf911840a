// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Dependency graph and round scheduling for epic tickets

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use thiserror::Error;

/// The ticket graph could not be ordered because of a dependency cycle
#[derive(Debug, Clone, Error)]
#[error("dependency cycle detected involving: {}", .tickets.join(", "))]
pub struct CycleError {
    /// Tickets that could not be placed in any round
    pub tickets: Vec<String>,
}

/// A directed dependency graph over ticket keys.
///
/// An edge runs from a blocker to the ticket it blocks; the blocker must
/// close before the blocked ticket can start. All iteration orders are
/// deterministic: tickets sort lexicographically by key.
#[derive(Debug, Clone, Default)]
pub struct TicketGraph {
    /// Direct blockers per ticket
    preds: BTreeMap<String, BTreeSet<String>>,
    /// Directly blocked tickets per ticket
    succs: BTreeMap<String, BTreeSet<String>>,
}

impl TicketGraph {
    /// Create an empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a ticket with no dependencies yet
    pub fn add_ticket(&mut self, key: &str) {
        self.preds.entry(key.to_string()).or_default();
        self.succs.entry(key.to_string()).or_default();
    }

    /// Record that `blocker` must complete before `blocked` can start.
    ///
    /// Both tickets are added if missing. Self-dependencies are ignored.
    pub fn add_dependency(&mut self, blocker: &str, blocked: &str) {
        if blocker == blocked {
            return;
        }
        self.add_ticket(blocker);
        self.add_ticket(blocked);
        if let Some(set) = self.preds.get_mut(blocked) {
            set.insert(blocker.to_string());
        }
        if let Some(set) = self.succs.get_mut(blocker) {
            set.insert(blocked.to_string());
        }
    }

    /// True when the ticket is in the graph
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.preds.contains_key(key)
    }

    /// Number of tickets
    #[must_use]
    pub fn len(&self) -> usize {
        self.preds.len()
    }

    /// True when the graph has no tickets
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.preds.is_empty()
    }

    /// All ticket keys, sorted
    pub fn tickets(&self) -> impl Iterator<Item = &str> {
        self.preds.keys().map(String::as_str)
    }

    /// Direct blockers of a ticket, sorted
    #[must_use]
    pub fn direct_predecessors(&self, key: &str) -> BTreeSet<String> {
        self.preds.get(key).cloned().unwrap_or_default()
    }

    /// All blockers of a ticket, direct and indirect, sorted
    #[must_use]
    pub fn transitive_predecessors(&self, key: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = match self.preds.get(key) {
            Some(direct) => direct.iter().map(String::as_str).collect(),
            None => return seen,
        };
        while let Some(current) = stack.pop() {
            if !seen.insert(current.to_string()) {
                continue;
            }
            if let Some(more) = self.preds.get(current) {
                stack.extend(more.iter().map(String::as_str));
            }
        }
        seen
    }

    /// Blockers reachable only through other tickets, sorted.
    ///
    /// This is the transitive closure minus the direct blockers; useful
    /// for showing which upstream work a ticket inherits without listing
    /// its immediate dependencies twice.
    #[must_use]
    pub fn transitive_only_predecessors(&self, key: &str) -> BTreeSet<String> {
        let mut closure = self.transitive_predecessors(key);
        if let Some(direct) = self.preds.get(key) {
            for dep in direct {
                closure.remove(dep);
            }
        }
        closure
    }

    /// Group tickets into execution rounds.
    ///
    /// Round 1 holds every ticket with no blockers; each later ticket
    /// lands one round past its latest blocker. The layering is minimal
    /// and independent of insertion order, and tickets within a round
    /// sort lexicographically. An empty graph yields no rounds.
    ///
    /// # Errors
    ///
    /// Returns [`CycleError`] naming every ticket caught in or behind a
    /// dependency cycle.
    pub fn rounds(&self) -> Result<Vec<Vec<String>>, CycleError> {
        let mut remaining: BTreeMap<&str, usize> = self
            .preds
            .iter()
            .map(|(key, deps)| (key.as_str(), deps.len()))
            .collect();

        let mut frontier: Vec<&str> = remaining
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&key, _)| key)
            .collect();

        let mut rounds = Vec::new();
        let mut placed = 0;
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for &key in &frontier {
                if let Some(blocked) = self.succs.get(key) {
                    for succ in blocked {
                        if let Some(degree) = remaining.get_mut(succ.as_str()) {
                            *degree -= 1;
                            if *degree == 0 {
                                next.push(succ.as_str());
                            }
                        }
                    }
                }
            }
            next.sort_unstable();
            placed += frontier.len();
            rounds.push(frontier.iter().map(|&key| key.to_string()).collect());
            frontier = next;
        }

        if placed < self.preds.len() {
            let tickets = remaining
                .iter()
                .filter(|(_, &degree)| degree > 0)
                .map(|(&key, _)| key.to_string())
                .collect();
            return Err(CycleError { tickets });
        }
        Ok(rounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn graph_of(edges: &[(&str, &str)]) -> TicketGraph {
        let mut graph = TicketGraph::new();
        for (blocker, blocked) in edges {
            graph.add_dependency(blocker, blocked);
        }
        graph
    }

    #[test]
    fn test_empty_graph_has_no_rounds() {
        let graph = TicketGraph::new();
        assert_eq!(graph.rounds().unwrap(), Vec::<Vec<String>>::new());
    }

    #[test]
    fn test_single_ticket() {
        let mut graph = TicketGraph::new();
        graph.add_ticket("PROJ-1");
        assert_eq!(graph.rounds().unwrap(), vec![vec!["PROJ-1".to_string()]]);
    }

    #[test]
    fn test_chain_orders_one_per_round() {
        let graph = graph_of(&[("PROJ-1", "PROJ-2"), ("PROJ-2", "PROJ-3")]);
        assert_eq!(
            graph.rounds().unwrap(),
            vec![
                vec!["PROJ-1".to_string()],
                vec!["PROJ-2".to_string()],
                vec!["PROJ-3".to_string()],
            ]
        );
    }

    #[test]
    fn test_diamond_shares_middle_round() {
        let graph = graph_of(&[
            ("PROJ-1", "PROJ-2"),
            ("PROJ-1", "PROJ-3"),
            ("PROJ-2", "PROJ-4"),
            ("PROJ-3", "PROJ-4"),
        ]);
        assert_eq!(
            graph.rounds().unwrap(),
            vec![
                vec!["PROJ-1".to_string()],
                vec!["PROJ-2".to_string(), "PROJ-3".to_string()],
                vec!["PROJ-4".to_string()],
            ]
        );
    }

    #[test]
    fn test_ticket_lands_past_its_latest_blocker() {
        // PROJ-3 is blocked by both PROJ-1 (round 1) and PROJ-2 (round 2),
        // so it must land in round 3 even though one blocker is early.
        let graph = graph_of(&[
            ("PROJ-1", "PROJ-2"),
            ("PROJ-1", "PROJ-3"),
            ("PROJ-2", "PROJ-3"),
        ]);
        assert_eq!(
            graph.rounds().unwrap(),
            vec![
                vec!["PROJ-1".to_string()],
                vec!["PROJ-2".to_string()],
                vec!["PROJ-3".to_string()],
            ]
        );
    }

    #[test]
    fn test_unrelated_tickets_share_the_first_round() {
        let mut graph = graph_of(&[("PROJ-1", "PROJ-2")]);
        graph.add_ticket("PROJ-9");
        assert_eq!(
            graph.rounds().unwrap(),
            vec![
                vec!["PROJ-1".to_string(), "PROJ-9".to_string()],
                vec!["PROJ-2".to_string()],
            ]
        );
    }

    #[test]
    fn test_rounds_sort_lexicographically() {
        let graph = graph_of(&[
            ("PROJ-1", "PROJ-30"),
            ("PROJ-1", "PROJ-2"),
            ("PROJ-1", "PROJ-10"),
        ]);
        assert_eq!(
            graph.rounds().unwrap()[1],
            vec![
                "PROJ-10".to_string(),
                "PROJ-2".to_string(),
                "PROJ-30".to_string(),
            ]
        );
    }

    #[test]
    fn test_self_dependency_ignored() {
        let mut graph = TicketGraph::new();
        graph.add_dependency("PROJ-1", "PROJ-1");
        assert_eq!(graph.rounds().unwrap(), vec![vec!["PROJ-1".to_string()]]);
        assert!(graph.direct_predecessors("PROJ-1").is_empty());
    }

    #[test]
    fn test_duplicate_dependency_idempotent() {
        let graph = graph_of(&[
            ("PROJ-1", "PROJ-2"),
            ("PROJ-1", "PROJ-2"),
            ("PROJ-1", "PROJ-2"),
        ]);
        assert_eq!(graph.direct_predecessors("PROJ-2").len(), 1);
        assert_eq!(graph.rounds().unwrap().len(), 2);
    }

    #[test]
    fn test_cycle_reports_stuck_tickets() {
        let mut graph = graph_of(&[("PROJ-1", "PROJ-2"), ("PROJ-2", "PROJ-1")]);
        graph.add_ticket("PROJ-3");
        let err = graph.rounds().unwrap_err();
        assert_eq!(
            err.tickets,
            vec!["PROJ-1".to_string(), "PROJ-2".to_string()]
        );
        let message = err.to_string();
        assert!(message.contains("PROJ-1"));
        assert!(message.contains("PROJ-2"));
        assert!(!message.contains("PROJ-3"));
    }

    #[test]
    fn test_cycle_traps_downstream_tickets() {
        // PROJ-3 is acyclic itself but waits on the cycle, so it is stuck too.
        let graph = graph_of(&[
            ("PROJ-1", "PROJ-2"),
            ("PROJ-2", "PROJ-1"),
            ("PROJ-2", "PROJ-3"),
        ]);
        let err = graph.rounds().unwrap_err();
        assert_eq!(
            err.tickets,
            vec![
                "PROJ-1".to_string(),
                "PROJ-2".to_string(),
                "PROJ-3".to_string(),
            ]
        );
    }

    #[test]
    fn test_transitive_only_excludes_direct() {
        let graph = graph_of(&[
            ("PROJ-1", "PROJ-2"),
            ("PROJ-2", "PROJ-3"),
            ("PROJ-3", "PROJ-4"),
        ]);
        let only: Vec<String> = graph
            .transitive_only_predecessors("PROJ-4")
            .into_iter()
            .collect();
        assert_eq!(only, vec!["PROJ-1".to_string(), "PROJ-2".to_string()]);
    }

    #[test]
    fn test_transitive_only_keeps_roots_behind_direct_blockers() {
        let graph = graph_of(&[
            ("PROJ-1", "PROJ-2"),
            ("PROJ-1", "PROJ-3"),
            ("PROJ-2", "PROJ-4"),
            ("PROJ-3", "PROJ-4"),
        ]);
        let only: Vec<String> = graph
            .transitive_only_predecessors("PROJ-4")
            .into_iter()
            .collect();
        assert_eq!(only, vec!["PROJ-1".to_string()]);
    }

    #[test]
    fn test_insertion_order_does_not_change_rounds() {
        let forward = graph_of(&[
            ("PROJ-1", "PROJ-2"),
            ("PROJ-1", "PROJ-3"),
            ("PROJ-3", "PROJ-4"),
        ]);
        let reversed = graph_of(&[
            ("PROJ-3", "PROJ-4"),
            ("PROJ-1", "PROJ-3"),
            ("PROJ-1", "PROJ-2"),
        ]);
        assert_eq!(forward.rounds().unwrap(), reversed.rounds().unwrap());
    }

    // Edges always point from a lower index to a higher one, so the
    // generated graphs are acyclic by construction.
    fn indexed_edges(
        nodes: usize,
        max_edges: usize,
    ) -> impl Strategy<Value = Vec<(usize, usize)>> {
        proptest::collection::vec((0..nodes, 0..nodes), 0..max_edges)
    }

    fn key(index: usize) -> String {
        format!("T-{index:02}")
    }

    fn build_indexed(nodes: usize, edges: &[(usize, usize)]) -> TicketGraph {
        let mut graph = TicketGraph::new();
        for index in 0..nodes {
            graph.add_ticket(&key(index));
        }
        for &(a, b) in edges {
            if a != b {
                graph.add_dependency(&key(a.min(b)), &key(a.max(b)));
            }
        }
        graph
    }

    proptest! {
        #[test]
        fn prop_rounds_cover_every_ticket_once(edges in indexed_edges(12, 40)) {
            let graph = build_indexed(12, &edges);
            let rounds = graph.rounds().expect("acyclic by construction");
            let flat: Vec<&String> = rounds.iter().flatten().collect();
            prop_assert_eq!(flat.len(), graph.len());
            let unique: BTreeSet<&String> = flat.into_iter().collect();
            prop_assert_eq!(unique.len(), graph.len());
        }

        #[test]
        fn prop_every_blocker_lands_in_an_earlier_round(edges in indexed_edges(12, 40)) {
            let graph = build_indexed(12, &edges);
            let rounds = graph.rounds().expect("acyclic by construction");
            let mut round_of = BTreeMap::new();
            for (index, round) in rounds.iter().enumerate() {
                for ticket in round {
                    round_of.insert(ticket.clone(), index);
                }
            }
            for ticket in graph.tickets() {
                for blocker in graph.direct_predecessors(ticket) {
                    prop_assert!(round_of[&blocker] < round_of[ticket]);
                }
            }
        }

        #[test]
        fn prop_edge_order_is_irrelevant(edges in indexed_edges(10, 30)) {
            let forward = build_indexed(10, &edges);
            let mut shuffled = edges.clone();
            shuffled.reverse();
            let backward = build_indexed(10, &shuffled);
            prop_assert_eq!(forward.rounds().unwrap(), backward.rounds().unwrap());
        }
    }
}
