use std::collections::VecDeque;

use tracing::debug;

use crate::fsm::Fsm;
use crate::math;
use crate::trace::InputTrace;
use crate::{Input, Output, StateId};

/// A search vertex: the current partition of the still-unidentified states
/// by equal output history. Blocks hold the *current* states of the walk;
/// singleton blocks are dropped since their start state is identified.
/// Blocks and the block list are kept sorted so that equal partitions
/// compare equal.
type Vertex = Vec<Vec<StateId>>;

/// Refines every block of `vertex` by the outputs produced on `x`. Returns
/// `None` when `x` is invalid on this vertex, i.e. when two states of one
/// block emit the same output but collapse onto one successor — such states
/// could never be told apart afterwards.
fn refine(fsm: &Fsm, vertex: &Vertex, x: Input) -> Option<Vertex> {
    let mut next: Vertex = Vec::new();
    for block in vertex {
        let mut by_output: math::OrderedMap<Output, Vec<StateId>> = math::OrderedMap::new();
        for &q in block {
            let t = fsm.transition(q, x)?;
            by_output.entry(t.output).or_default().push(t.target);
        }
        for (_, mut successors) in by_output {
            successors.sort_unstable();
            let total = successors.len();
            successors.dedup();
            if successors.len() < total {
                return None;
            }
            if successors.len() >= 2 {
                next.push(successors);
            }
        }
    }
    next.sort_unstable();
    Some(next)
}

/// Searches for a preset distinguishing sequence: a single input word whose
/// output identifies the start state among all states of the machine.
///
/// The search is a BFS over partitions of the state set by equal output
/// history, starting from the one-block partition. It gives up beyond depth
/// `n·(n−1)/2` and returns `None`; absence of a PDS is a normal outcome,
/// not an error.
pub fn preset_distinguishing_sequence(fsm: &Fsm) -> Option<InputTrace> {
    assert!(
        fsm.is_deterministic() && fsm.is_completely_defined(),
        "the PDS search requires a completely specified deterministic machine"
    );
    let n = fsm.size();
    if n <= 1 {
        return Some(InputTrace::empty());
    }
    let bound = n * (n - 1) / 2;

    let initial: Vertex = vec![fsm.states().collect()];
    let mut visited: math::Set<Vertex> = math::Set::from_iter([initial.clone()]);
    let mut queue: VecDeque<(Vertex, Vec<Input>)> = VecDeque::from([(initial, Vec::new())]);

    while let Some((vertex, word)) = queue.pop_front() {
        for x in 0..=fsm.max_input() {
            let Some(next) = refine(fsm, &vertex, x) else {
                continue;
            };
            let mut extended = word.clone();
            extended.push(x);
            if next.is_empty() {
                debug!(len = extended.len(), "found preset distinguishing sequence");
                return Some(InputTrace::new(extended));
            }
            if extended.len() < bound && visited.insert(next.clone()) {
                queue.push_back((next, extended));
            }
        }
    }
    debug!(bound, "no preset distinguishing sequence");
    None
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

    // every input merges a pair right at the start, so neither a preset nor
    // an adaptive distinguishing sequence exists
    fn merging_dfsm() -> Fsm {
        FsmBuilder::default()
            .with_transitions([
                (0, 0, 0, 1),
                (0, 1, 0, 2),
                (1, 0, 0, 1),
                (1, 1, 1, 0),
                (2, 0, 1, 0),
                (2, 1, 0, 2),
            ])
            .initial(0)
            .build()
            .unwrap()
    }

    // the machine splits on input 0, after which the two blocks require
    // different continuations — adaptively resolvable, but preset-dead
    fn adaptive_only_dfsm() -> Fsm {
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

    #[test]
    fn pds_output_identifies_every_state() {
        let fsm = three_state_dfsm();
        let w = preset_distinguishing_sequence(&fsm).expect("this machine has a PDS");
        assert_eq!(w, InputTrace::new(vec![0, 0]));
        let responses: Vec<_> = fsm
            .states()
            .map(|q| fsm.apply_from(q, &w).output_traces())
            .collect();
        assert_eq!(responses.iter().unique().count(), fsm.size());
    }

    #[test]
    fn merging_machine_has_no_pds() {
        assert!(merging_dfsm().is_prime());
        assert_eq!(preset_distinguishing_sequence(&merging_dfsm()), None);
    }

    #[test]
    fn adaptive_only_machine_has_no_pds() {
        assert!(adaptive_only_dfsm().is_prime());
        assert_eq!(preset_distinguishing_sequence(&adaptive_only_dfsm()), None);
    }

    #[test]
    fn trivial_machine_has_the_empty_pds() {
        let fsm = FsmBuilder::default()
            .with_transitions([(0, 0, 0, 0)])
            .build()
            .unwrap();
        assert_eq!(
            preset_distinguishing_sequence(&fsm),
            Some(InputTrace::empty())
        );
    }
}
