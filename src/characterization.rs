use itertools::Itertools;
use tracing::debug;

use crate::fsm::tables::TableChain;
use crate::fsm::Fsm;
use crate::math;
use crate::trace::{IOListContainer, InputTrace};
use crate::tree::Tree;
use crate::{Input, StateId};

/// True iff applying `word` from `s` and from `t` can be told apart by the
/// produced outputs.
pub fn distinguishes(fsm: &Fsm, word: &[Input], s: StateId, t: StateId) -> bool {
    let trace = InputTrace::new(word.to_vec());
    fsm.apply_from(s, &trace) != fsm.apply_from(t, &trace)
}

/// Computes a characterisation set `W`: a set of input sequences such that
/// every pair of distinct states produces different outputs on some member.
///
/// For each pair one shortest distinguishing trace is taken from the table
/// chain; a pair that is already told apart by a previously collected
/// sequence contributes nothing, which keeps the set small and closed under
/// shared prefixes. Panics when handed a machine with indistinguishable
/// states.
pub fn characterisation_set(fsm: &Fsm, chain: &TableChain) -> IOListContainer {
    assert!(
        chain.is_discrete(),
        "the characterisation set requires a minimal machine"
    );
    let mut w_tree = Tree::new();
    for (s, t) in fsm.states().tuple_combinations() {
        let covered = w_tree
            .leaves()
            .map(|leaf| w_tree.path_to(leaf))
            .any(|path| distinguishes(fsm, &path, s, t));
        if covered {
            continue;
        }
        let trace = chain.distinguishing_trace(fsm, s, t);
        debug_assert!(!trace.is_empty());
        w_tree.add(trace.as_slice());
    }
    // a single-state machine needs no distinguishing sequences at all
    if w_tree.is_empty() {
        return IOListContainer::empty(fsm.max_input());
    }
    let w = w_tree.test_cases().sorted_lexicographic();
    debug!(members = w.len(), "characterisation set");
    w
}

/// Computes for every state `qᵢ` a minimal subset `Wᵢ` of `w` that still
/// distinguishes `qᵢ` from every other state.
///
/// Greedy cover: repeatedly pick the member of `w` that discriminates `qᵢ`
/// from the largest number of remaining competitors, drop the settled ones
/// and continue.
pub fn state_identification_sets(fsm: &Fsm, w: &IOListContainer) -> Vec<IOListContainer> {
    fsm.states()
        .map(|i| {
            let mut remaining: Vec<StateId> = fsm.states().filter(|&j| j != i).collect();
            let mut picked: Vec<Vec<Input>> = Vec::new();
            while !remaining.is_empty() {
                let mut best: Option<(&Vec<Input>, usize)> = None;
                for candidate in w.lists() {
                    let settled = remaining
                        .iter()
                        .filter(|&&j| distinguishes(fsm, candidate, i, j))
                        .count();
                    // strictly-greater keeps the first maximum, so the
                    // outcome does not depend on later ties
                    if settled > best.map_or(0, |(_, n)| n) {
                        best = Some((candidate, settled));
                    }
                }
                let (sequence, _) = best.expect("W distinguishes every pair");
                picked.push(sequence.clone());
                remaining.retain(|&j| !distinguishes(fsm, sequence, i, j));
            }
            IOListContainer::new(picked, w.max_input())
        })
        .collect()
}

/// Computes harmonised per-state identification sets: for any two states
/// `qᵢ ≠ qⱼ` the sets `Hᵢ` and `Hⱼ` share a sequence that separates the
/// pair. Produced by pruning `w` — for each pair its first separating
/// member is placed in both sets.
pub fn harmonised_identification_sets(fsm: &Fsm, w: &IOListContainer) -> Vec<IOListContainer> {
    let mut sets: Vec<math::Set<Vec<Input>>> = vec![math::Set::default(); fsm.size()];
    for (i, j) in fsm.states().tuple_combinations() {
        let member = w
            .lists()
            .iter()
            .find(|m| distinguishes(fsm, m, i, j))
            .expect("W distinguishes every pair");
        sets[i as usize].insert(member.clone());
        sets[j as usize].insert(member.clone());
    }
    sets.into_iter()
        .map(|set| IOListContainer::new(set.into_iter().collect(), w.max_input()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;
    use itertools::Itertools;

    fn three_state_dfsm() -> Fsm {
        FsmBuilder::default()
            .with_transitions([
                (0, 0, 0, 1),
                (0, 1, 1, 0),
                (1, 0, 0, 2),
                (1, 1, 0, 0),
                (2, 0, 1, 2),
                (2, 1, 1, 1),
            ])
            .initial(0)
            .build()
            .unwrap()
    }

    // 0 and 1 only split through their successors, so W needs a trace of
    // length two
    fn deep_split_dfsm() -> Fsm {
        FsmBuilder::default()
            .with_transitions([
                (0, 0, 0, 2),
                (0, 1, 0, 0),
                (1, 0, 0, 3),
                (1, 1, 0, 0),
                (2, 0, 1, 0),
                (2, 1, 0, 2),
                (3, 0, 1, 1),
                (3, 1, 1, 3),
            ])
            .initial(0)
            .build()
            .unwrap()
    }

    fn assert_characterises(fsm: &Fsm, w: &IOListContainer) {
        for (s, t) in fsm.states().tuple_combinations() {
            assert!(
                w.lists().iter().any(|m| distinguishes(fsm, m, s, t)),
                "W fails to separate {s} and {t}"
            );
        }
    }

    #[test]
    fn characterisation_set_separates_every_pair() {
        for fsm in [three_state_dfsm(), deep_split_dfsm()] {
            let chain = TableChain::for_fsm(&fsm);
            let w = characterisation_set(&fsm, &chain);
            assert!(w.min_len() >= 1);
            assert_characterises(&fsm, &w);
        }
    }

    #[test]
    fn characterisation_set_survives_minimisation() {
        // minimise a machine with redundant and unreachable states first
        let mut fsm = FsmBuilder::default()
            .with_transitions([
                (0, 0, 0, 1),
                (0, 1, 0, 0),
                (1, 0, 1, 2),
                (1, 1, 0, 0),
                (2, 0, 1, 3),
                (2, 1, 1, 0),
                (3, 0, 1, 2),
                (3, 1, 1, 0),
                (4, 0, 0, 5),
                (4, 1, 0, 4),
                (5, 0, 1, 4),
                (5, 1, 1, 5),
            ])
            .initial(0)
            .build()
            .unwrap();
        let removed = fsm.remove_unreachable();
        assert_eq!(removed, vec![4, 5]);
        let minimal = fsm.minimise();
        assert!(minimal.is_prime());
        let chain = TableChain::for_fsm(&minimal);
        let w = characterisation_set(&minimal, &chain);
        assert_characterises(&minimal, &w);
    }

    #[test]
    fn identification_sets_cover_their_state() {
        let fsm = deep_split_dfsm();
        let chain = TableChain::for_fsm(&fsm);
        let w = characterisation_set(&fsm, &chain);
        let wis = state_identification_sets(&fsm, &w);
        assert_eq!(wis.len(), fsm.size());
        for i in fsm.states() {
            let wi = &wis[i as usize];
            for j in fsm.states().filter(|&j| j != i) {
                assert!(wi.lists().iter().any(|m| distinguishes(&fsm, m, i, j)));
            }
            for member in wi.lists() {
                assert!(w.contains(member), "Wᵢ must be a subset of W");
            }
        }
    }

    #[test]
    fn harmonised_sets_share_a_separating_sequence() {
        let fsm = deep_split_dfsm();
        let chain = TableChain::for_fsm(&fsm);
        let w = characterisation_set(&fsm, &chain);
        let his = harmonised_identification_sets(&fsm, &w);
        for (i, j) in fsm.states().tuple_combinations() {
            let shared = his[i as usize]
                .lists()
                .iter()
                .filter(|m| his[j as usize].contains(m))
                .any(|m| distinguishes(&fsm, m, i, j));
            assert!(shared, "H{i} and H{j} share no separating sequence");
        }
    }
}
