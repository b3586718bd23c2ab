use tracing::debug;

use crate::fsm::Fsm;
use crate::math;
use crate::trace::IOTrace;
use crate::{Input, Output, StateId};

use super::splitting_tree::SplittingTree;

#[derive(Debug, Clone)]
struct AdsNode {
    input: Option<Input>,
    children: Vec<(Output, u32)>,
    state: Option<StateId>,
}

/// An adaptive distinguishing sequence in tree form: every internal node
/// carries the input to apply next, every edge the output that was
/// observed, and every leaf the start state the observations pin down.
#[derive(Debug, Clone)]
pub struct InputOutputTree {
    nodes: Vec<AdsNode>,
    root: u32,
}

impl InputOutputTree {
    /// The root node.
    pub fn root(&self) -> u32 {
        self.root
    }

    /// The input applied at `node`, absent on leaves.
    pub fn input_at(&self, node: u32) -> Option<Input> {
        self.nodes[node as usize].input
    }

    /// The start state identified at a leaf.
    pub fn state_at(&self, node: u32) -> Option<StateId> {
        self.nodes[node as usize].state
    }

    /// Follows the edge labelled with the observed output.
    pub fn child_on(&self, node: u32, output: Output) -> Option<u32> {
        self.nodes[node as usize]
            .children
            .iter()
            .find(|&&(y, _)| y == output)
            .map(|&(_, child)| child)
    }

    /// Walks the tree against the machine started in `state`: applies the
    /// node inputs, follows the edges matching the outputs the machine
    /// produces and stops at a leaf. Returns the input/output history
    /// together with the identified start state.
    pub fn traverse(&self, fsm: &Fsm, state: StateId) -> (IOTrace, StateId) {
        let mut io = IOTrace::empty();
        let mut node = self.root;
        let mut current = state;
        while let Some(x) = self.input_at(node) {
            let t = fsm
                .transition(current, x)
                .expect("machine is completely specified");
            io.push(x, t.output);
            current = t.target;
            node = self
                .child_on(node, t.output)
                .expect("the tree branches on every producible output");
        }
        let identified = self.state_at(node).expect("leaves carry their state");
        (io, identified)
    }

    /// The input/output history that identifies `state`.
    pub fn trace_for_state(&self, fsm: &Fsm, state: StateId) -> IOTrace {
        self.traverse(fsm, state).0
    }

    fn push_leaf(&mut self, state: StateId) -> u32 {
        let id = self.nodes.len() as u32;
        self.nodes.push(AdsNode {
            input: None,
            children: Vec::new(),
            state: Some(state),
        });
        id
    }

    fn push_internal(&mut self, input: Input, children: Vec<(Output, u32)>) -> u32 {
        let id = self.nodes.len() as u32;
        self.nodes.push(AdsNode {
            input: Some(input),
            children,
            state: None,
        });
        id
    }
}

fn apply_word(
    tree: &mut InputOutputTree,
    fsm: &Fsm,
    st: &SplittingTree,
    word: &[Input],
    pairs: Vec<(StateId, StateId)>,
) -> u32 {
    if let [(origin, _)] = pairs[..] {
        return tree.push_leaf(origin);
    }
    let [x, rest @ ..] = word else {
        return descend(tree, fsm, st, pairs);
    };
    let mut groups: math::OrderedMap<Output, Vec<(StateId, StateId)>> = math::OrderedMap::new();
    for (origin, current) in pairs {
        let t = fsm
            .transition(current, *x)
            .expect("machine is completely specified");
        groups.entry(t.output).or_default().push((origin, t.target));
    }
    let children = groups
        .into_iter()
        .map(|(y, sub)| (y, apply_word(tree, fsm, st, rest, sub)))
        .collect();
    tree.push_internal(*x, children)
}

/// Recursion step of the export: look up the deepest splitting-tree node
/// covering the current states and spell out its word. The Lee–Yannakakis
/// invariant guarantees that the word is valid on the set and splits it, so
/// every step strictly shrinks the candidate groups.
fn descend(
    tree: &mut InputOutputTree,
    fsm: &Fsm,
    st: &SplittingTree,
    pairs: Vec<(StateId, StateId)>,
) -> u32 {
    if let [(origin, _)] = pairs[..] {
        return tree.push_leaf(origin);
    }
    let currents: Vec<StateId> = pairs.iter().map(|&(_, current)| current).collect();
    let node = st.deepest_node_containing(&currents);
    let word = st.node(node).trace().clone();
    debug_assert!(!word.is_empty(), "non-singleton sets sit below a split node");
    let symbols: Vec<Input> = word.symbols().collect();
    apply_word(tree, fsm, st, &symbols, pairs)
}

/// Computes an adaptive distinguishing sequence via the Lee–Yannakakis
/// splitting tree, or `None` when the machine has none. Absence is a
/// normal outcome; the D-method falls back to an empty suite.
///
/// Whenever a preset distinguishing sequence exists an ADS exists as well;
/// the converse does not hold.
pub fn adaptive_distinguishing_sequence(fsm: &Fsm) -> Option<InputOutputTree> {
    let st = SplittingTree::build(fsm)?;
    let mut tree = InputOutputTree {
        nodes: Vec::new(),
        root: 0,
    };
    let pairs: Vec<(StateId, StateId)> = fsm.states().map(|q| (q, q)).collect();
    let root = descend(&mut tree, fsm, &st, pairs);
    tree.root = root;
    debug!(nodes = tree.nodes.len(), "exported adaptive distinguishing sequence");
    Some(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distinguishing::preset_distinguishing_sequence;
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
            .build()
            .unwrap()
    }

    fn assert_identifies_every_state(fsm: &Fsm, ads: &InputOutputTree) {
        let mut histories = Vec::new();
        for q in fsm.states() {
            let (io, identified) = ads.traverse(fsm, q);
            assert_eq!(identified, q, "traversal from {q} ends at the wrong leaf");
            histories.push(io);
        }
        assert_eq!(histories.iter().unique().count(), fsm.size());
    }

    #[test]
    fn ads_identifies_every_state() {
        let fsm = adaptive_only_dfsm();
        let ads = adaptive_distinguishing_sequence(&fsm).expect("this machine has an ADS");
        assert_identifies_every_state(&fsm, &ads);
    }

    #[test]
    fn machine_without_pds_can_still_have_an_ads() {
        let fsm = adaptive_only_dfsm();
        assert_eq!(preset_distinguishing_sequence(&fsm), None);
        assert!(adaptive_distinguishing_sequence(&fsm).is_some());
    }

    #[test]
    fn a_pds_implies_an_ads() {
        for fsm in [three_state_dfsm(), adaptive_only_dfsm(), merging_dfsm()] {
            if preset_distinguishing_sequence(&fsm).is_some() {
                let ads = adaptive_distinguishing_sequence(&fsm)
                    .expect("a machine with a PDS always has an ADS");
                assert_identifies_every_state(&fsm, &ads);
            }
        }
    }

    #[test]
    fn merging_machine_has_no_ads() {
        assert!(adaptive_distinguishing_sequence(&merging_dfsm()).is_none());
    }

    #[test]
    fn trivial_machine_is_identified_by_the_empty_history() {
        let fsm = FsmBuilder::default()
            .with_transitions([(0, 0, 0, 0)])
            .build()
            .unwrap();
        let ads = adaptive_distinguishing_sequence(&fsm).unwrap();
        let (io, identified) = ads.traverse(&fsm, 0);
        assert!(io.is_empty());
        assert_eq!(identified, 0);
    }
}
