use crate::math;
use crate::trace::{IOTrace, InputTrace, OutputTrace};
use crate::Symbol;

use super::Tree;

/// The tree of output sequences a machine can produce when a fixed input
/// trace is applied from some start state. Edges carry output symbols; a
/// root-to-leaf path is one complete response. Paths may be shorter than
/// the input trace when the walk runs into an undefined transition.
#[derive(Debug, Clone)]
pub struct OutputTree {
    inputs: InputTrace,
    tree: Tree,
}

impl OutputTree {
    pub(crate) fn new(inputs: InputTrace, tree: Tree) -> Self {
        Self { inputs, tree }
    }

    /// The input trace this tree is the response to.
    pub fn input_trace(&self) -> &InputTrace {
        &self.inputs
    }

    /// All complete output sequences, one per leaf.
    pub fn output_traces(&self) -> Vec<OutputTrace> {
        self.tree
            .leaves()
            .map(|leaf| OutputTrace::new(self.tree.path_to(leaf)))
            .collect()
    }

    /// The responses as I/O traces, each aligned with the consumed input
    /// prefix.
    pub fn io_traces(&self) -> Vec<IOTrace> {
        self.output_traces()
            .into_iter()
            .map(|outputs| IOTrace::new(self.inputs.prefix(outputs.len()), outputs))
            .collect()
    }

    /// True iff both trees stem from the same input trace and every
    /// response in `other` is also a response of `self`.
    pub fn contains(&self, other: &OutputTree) -> bool {
        if self.inputs != other.inputs {
            return false;
        }
        let ours: math::Set<OutputTrace> = self.output_traces().into_iter().collect();
        other.output_traces().iter().all(|o| ours.contains(o))
    }
}

impl PartialEq for OutputTree {
    /// Two output trees are equal iff they originate from the same input
    /// trace and their sets of complete output paths coincide. Comparing
    /// path sets rather than shapes matters for responses of
    /// non-observable machines, where distinct branches can spell the same
    /// output sequence.
    fn eq(&self, other: &Self) -> bool {
        self.contains(other) && other.contains(self)
    }
}
impl Eq for OutputTree {}

impl std::fmt::Display for OutputTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for io in self.io_traces() {
            writeln!(f, "{io}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_of(paths: &[&[Symbol]]) -> Tree {
        let mut tree = Tree::new();
        for path in paths {
            tree.add(path);
        }
        tree
    }

    #[test]
    fn equality_is_per_path_set() {
        let a = OutputTree::new(InputTrace::new(vec![0, 0]), tree_of(&[&[0, 1], &[1, 1]]));
        let b = OutputTree::new(InputTrace::new(vec![0, 0]), tree_of(&[&[1, 1], &[0, 1]]));
        assert_eq!(a, b);

        let different_inputs =
            OutputTree::new(InputTrace::new(vec![0, 1]), tree_of(&[&[0, 1], &[1, 1]]));
        assert_ne!(a, different_inputs);

        let superset = OutputTree::new(
            InputTrace::new(vec![0, 0]),
            tree_of(&[&[0, 1], &[1, 1], &[1, 0]]),
        );
        assert_ne!(a, superset);
        assert!(superset.contains(&a));
        assert!(!a.contains(&superset));
    }

    #[test]
    fn io_traces_align_with_the_consumed_prefix() {
        // one response ends early, as if the second input were undefined
        let ot = OutputTree::new(InputTrace::new(vec![1, 0]), tree_of(&[&[2], &[0, 0]]));
        let ios = ot.io_traces();
        assert_eq!(ios.len(), 2);
        assert!(ios
            .iter()
            .any(|io| io.len() == 1 && io.inputs() == &InputTrace::new(vec![1])));
        assert!(ios
            .iter()
            .any(|io| io.len() == 2 && io.outputs() == &OutputTrace::new(vec![0, 0])));
    }
}
