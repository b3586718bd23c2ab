use tracing::{debug, trace};

use crate::fsm::Fsm;
use crate::math;
use crate::trace::{InputTrace, OutputTrace};
use crate::{Input, StateId};

use super::partition_graph::PartitionGraph;

/// Dense index of a splitting-tree node.
pub type NodeId = u32;

/// A node of the splitting tree: a block of states together with the input
/// word that splits it. Unresolved leaves carry an empty word and no
/// children; the leaf blocks form the current partition of the state set.
#[derive(Debug, Clone)]
pub struct SplittingTreeNode {
    block: Vec<StateId>,
    trace: InputTrace,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl SplittingTreeNode {
    /// The block of states this node stands for, in ascending order.
    pub fn block(&self) -> &[StateId] {
        &self.block
    }

    /// The input word that splits the block by outputs. Empty on leaves.
    pub fn trace(&self) -> &InputTrace {
        &self.trace
    }

    /// The parent node, absent at the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// True once the node has been split.
    pub fn is_resolved(&self) -> bool {
        !self.children.is_empty()
    }
}

/// The Lee–Yannakakis splitting tree. Built by repeatedly splitting the
/// largest leaf blocks with a-valid inputs, b-valid words or c-valid
/// partition-graph paths; an adaptive distinguishing sequence exists iff
/// the construction drives every leaf down to a singleton.
#[derive(Debug, Clone)]
pub struct SplittingTree {
    nodes: Vec<SplittingTreeNode>,
}

/// An input is valid on a block iff it merges no two states of the block
/// that agree on the output; merged states could never be told apart by
/// any continuation.
fn is_valid_input(fsm: &Fsm, block: &[StateId], x: Input) -> bool {
    let mut seen: math::Set<(crate::Output, StateId)> = math::Set::default();
    block.iter().all(|&q| {
        let t = fsm.transition(q, x).expect("machine is completely specified");
        seen.insert((t.output, t.target))
    })
}

fn splits_by_output(fsm: &Fsm, block: &[StateId], x: Input) -> bool {
    let mut outputs = block
        .iter()
        .map(|&q| fsm.transition(q, x).expect("machine is completely specified").output);
    let first = outputs.next();
    outputs.any(|y| Some(y) != first)
}

/// The image of a block under an output-uniform valid input, in ascending
/// order. Validity makes the map injective, so the image has the block's
/// cardinality.
fn image(fsm: &Fsm, block: &[StateId], x: Input) -> Vec<StateId> {
    let mut successors: Vec<StateId> = block
        .iter()
        .map(|&q| fsm.transition(q, x).expect("machine is completely specified").target)
        .collect();
    successors.sort_unstable();
    successors
}

fn output_word(fsm: &Fsm, state: StateId, word: &InputTrace) -> OutputTrace {
    let mut outputs = OutputTrace::empty();
    let mut current = state;
    for x in word.symbols() {
        let t = fsm.transition(current, x).expect("machine is completely specified");
        outputs.push(t.output);
        current = t.target;
    }
    outputs
}

impl SplittingTree {
    fn with_root(fsm: &Fsm) -> Self {
        Self {
            nodes: vec![SplittingTreeNode {
                block: fsm.states().collect(),
                trace: InputTrace::empty(),
                children: Vec::new(),
                parent: None,
            }],
        }
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> &SplittingTreeNode {
        &self.nodes[id as usize]
    }

    /// All leaf ids in insertion order; their blocks form the current
    /// partition.
    pub fn leaves(&self) -> Vec<NodeId> {
        (0..self.nodes.len() as NodeId)
            .filter(|&id| self.nodes[id as usize].children.is_empty())
            .collect()
    }

    /// True iff every leaf block is a singleton.
    pub fn is_discrete(&self) -> bool {
        self.leaves()
            .into_iter()
            .all(|leaf| self.node(leaf).block.len() == 1)
    }

    /// The deepest node whose block contains all given states. Falls back
    /// to the root, which contains everything.
    pub fn deepest_node_containing(&self, states: &[StateId]) -> NodeId {
        let mut current = 0;
        'descend: loop {
            for &child in &self.nodes[current as usize].children {
                if states
                    .iter()
                    .all(|s| self.nodes[child as usize].block.binary_search(s).is_ok())
                {
                    current = child;
                    continue 'descend;
                }
            }
            return current;
        }
    }

    /// Splits `leaf` by the outputs its block produces on `word`. The
    /// children are created in ascending order of their output word.
    fn split(&mut self, leaf: NodeId, word: InputTrace, fsm: &Fsm) {
        let block = self.nodes[leaf as usize].block.clone();
        let mut groups: math::OrderedMap<OutputTrace, Vec<StateId>> = math::OrderedMap::new();
        for &q in &block {
            groups
                .entry(output_word(fsm, q, &word))
                .or_default()
                .push(q);
        }
        debug_assert!(groups.len() >= 2, "a splitting word separates its block");
        trace!(leaf, word = %word, blocks = groups.len(), "split block");
        self.nodes[leaf as usize].trace = word;
        for (_, sub_block) in groups {
            let id = self.nodes.len() as NodeId;
            self.nodes.push(SplittingTreeNode {
                block: sub_block,
                trace: InputTrace::empty(),
                children: Vec::new(),
                parent: Some(leaf),
            });
            self.nodes[leaf as usize].children.push(id);
        }
    }

    /// Runs the Lee–Yannakakis construction on a completely specified
    /// deterministic machine. Each round works on the leaves of maximal
    /// block size:
    ///
    /// 1. an *a-valid* input splits the block by outputs directly;
    /// 2. a *b-valid* input keeps the block whole but maps it across an
    ///    already-split part of the tree, whose word finishes the job;
    /// 3. remaining blocks go through the partition graph: a shortest path
    ///    of output-uniform valid inputs into an a-/b-valid block yields a
    ///    *c-valid* label.
    ///
    /// Returns `None` as soon as a round cannot split any maximal block,
    /// which is exactly the case in which no adaptive distinguishing
    /// sequence exists.
    pub fn build(fsm: &Fsm) -> Option<Self> {
        assert!(
            fsm.is_deterministic() && fsm.is_completely_defined(),
            "the splitting tree requires a completely specified deterministic machine"
        );
        let mut st = Self::with_root(fsm);
        loop {
            let Some(largest) = st
                .leaves()
                .into_iter()
                .map(|leaf| st.node(leaf).block.len())
                .filter(|&len| len > 1)
                .max()
            else {
                debug!(nodes = st.nodes.len(), "splitting tree is discrete");
                return Some(st);
            };
            let pending: Vec<NodeId> = st
                .leaves()
                .into_iter()
                .filter(|&leaf| st.node(leaf).block.len() == largest)
                .collect();

            let mut progressed = false;
            let mut graph = PartitionGraph::new();
            let mut candidates = Vec::new();
            for leaf in pending {
                let block = st.node(leaf).block.clone();
                if let Some(x) = (0..=fsm.max_input())
                    .find(|&x| is_valid_input(fsm, &block, x) && splits_by_output(fsm, &block, x))
                {
                    st.split(leaf, InputTrace::new(vec![x]), fsm);
                    progressed = true;
                    continue;
                }

                let uniform: Vec<Input> = (0..=fsm.max_input())
                    .filter(|&x| is_valid_input(fsm, &block, x))
                    .collect();
                let b_label = uniform.iter().find_map(|&x| {
                    let img = image(fsm, &block, x);
                    let node = st.deepest_node_containing(&img);
                    st.node(node)
                        .is_resolved()
                        .then(|| InputTrace::new(vec![x]).concat(st.node(node).trace()))
                });
                if let Some(label) = b_label {
                    st.split(leaf, label, fsm);
                    progressed = true;
                    continue;
                }

                for &x in &uniform {
                    let img = image(fsm, &block, x);
                    let target = st.deepest_node_containing(&img);
                    graph.add_edge(leaf, target, x);
                }
                candidates.push(leaf);
            }

            for leaf in candidates {
                let Some((word, target)) =
                    graph.find_path_to_valid(leaf, |v| st.node(v).is_resolved())
                else {
                    continue;
                };
                let label = InputTrace::new(word).concat(st.node(target).trace());
                st.split(leaf, label, fsm);
                progressed = true;
            }

            if !progressed {
                debug!(largest, "no rule applies, machine has no ADS");
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;

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

    #[test_log::test]
    fn tree_becomes_discrete_when_an_ads_exists() {
        let fsm = adaptive_only_dfsm();
        let st = SplittingTree::build(&fsm).expect("this machine has an ADS");
        assert!(st.is_discrete());
        // the root is split by input 0 into the two output groups
        assert_eq!(st.node(0).trace(), &InputTrace::new(vec![0]));
        assert_eq!(st.node(0).block(), &[0, 1, 2, 3]);
    }

    #[test]
    fn blocks_that_merge_under_every_input_stop_the_construction() {
        let fsm = FsmBuilder::default()
            .with_transitions([
                (0, 0, 0, 1),
                (0, 1, 0, 2),
                (1, 0, 0, 1),
                (1, 1, 1, 0),
                (2, 0, 1, 0),
                (2, 1, 0, 2),
            ])
            .build()
            .unwrap();
        assert!(SplittingTree::build(&fsm).is_none());
    }

    #[test]
    fn deepest_containing_node_descends_past_the_root() {
        let fsm = adaptive_only_dfsm();
        let st = SplittingTree::build(&fsm).unwrap();
        let node = st.deepest_node_containing(&[2, 3]);
        assert_eq!(st.node(node).block(), &[2, 3]);
        assert_eq!(st.deepest_node_containing(&[0, 3]), 0);
    }
}
