/// Export of an adaptive distinguishing sequence as an input/output
/// decision tree.
pub mod ads;
/// The auxiliary digraph resolving c-valid labels.
pub mod partition_graph;
/// BFS search for preset distinguishing sequences.
pub mod pds;
/// The Lee–Yannakakis splitting tree.
pub mod splitting_tree;

pub use ads::{adaptive_distinguishing_sequence, InputOutputTree};
pub use pds::preset_distinguishing_sequence;
pub use splitting_tree::SplittingTree;
