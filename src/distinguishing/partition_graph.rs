use std::collections::VecDeque;

use crate::math;
use crate::Input;

use super::splitting_tree::NodeId;

/// Auxiliary digraph for resolving c-valid labels during splitting-tree
/// construction. Vertices are (the splitting-tree nodes of) current
/// partition blocks; an edge `B --x--> B'` records that `x` is valid on `B`,
/// keeps its output uniform and maps the block into `B'`.
#[derive(Debug, Clone, Default)]
pub struct PartitionGraph {
    edges: math::Map<NodeId, Vec<(Input, NodeId)>>,
}

impl PartitionGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the edge `from --input--> to`, creating the vertices as needed.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, input: Input) {
        self.edges.entry(from).or_default().push((input, to));
    }

    /// Searches for a shortest path from `start` to any vertex satisfying
    /// `is_valid` (an a- or b-valid block). Returns the input word labelling
    /// the path together with the reached vertex.
    pub fn find_path_to_valid(
        &self,
        start: NodeId,
        is_valid: impl Fn(NodeId) -> bool,
    ) -> Option<(Vec<Input>, NodeId)> {
        let mut visited: math::Set<NodeId> = math::Set::from_iter([start]);
        let mut queue: VecDeque<(NodeId, Vec<Input>)> = VecDeque::from([(start, Vec::new())]);
        while let Some((vertex, word)) = queue.pop_front() {
            for &(input, next) in self.edges.get(&vertex).into_iter().flatten() {
                let mut extended = word.clone();
                extended.push(input);
                if is_valid(next) {
                    return Some((extended, next));
                }
                if visited.insert(next) {
                    queue.push_back((next, extended));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortest_path_wins() {
        let mut graph = PartitionGraph::new();
        graph.add_edge(0, 1, 0);
        graph.add_edge(1, 2, 1);
        graph.add_edge(0, 2, 1);
        let (word, target) = graph.find_path_to_valid(0, |n| n == 2).unwrap();
        assert_eq!(target, 2);
        assert_eq!(word, vec![1]);
    }

    #[test]
    fn cycles_do_not_diverge() {
        let mut graph = PartitionGraph::new();
        graph.add_edge(0, 1, 0);
        graph.add_edge(1, 0, 0);
        assert!(graph.find_path_to_valid(0, |n| n == 7).is_none());
    }
}
