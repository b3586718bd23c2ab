use std::cell::OnceCell;
use std::collections::VecDeque;

use tracing::debug;

use crate::fsm::tables::TableChain;
use crate::fsm::{Fsm, FsmTransition};
use crate::math;
use crate::trace::IOListContainer;
use crate::StateId;

impl Fsm {
    /// The intersection automaton: the product over reachable state pairs,
    /// keeping exactly the transitions on which both machines agree on
    /// input and output.
    ///
    /// For two prime machines the languages coincide iff the intersection
    /// is completely defined.
    pub fn intersect(&self, other: &Fsm) -> Fsm {
        let mut index: math::Map<(StateId, StateId), StateId> =
            math::Map::from_iter([((self.initial(), other.initial()), 0)]);
        let mut queue = VecDeque::from([(self.initial(), other.initial())]);
        let mut transitions = Vec::new();
        while let Some((a, b)) = queue.pop_front() {
            let source = index[&(a, b)];
            for ta in self.transitions_from(a) {
                for tb in other
                    .transitions_from(b)
                    .filter(|tb| tb.input == ta.input && tb.output == ta.output)
                {
                    let pair = (ta.target, tb.target);
                    let target = match index.get(&pair) {
                        Some(&id) => id,
                        None => {
                            let id = index.len() as StateId;
                            index.insert(pair, id);
                            queue.push_back(pair);
                            id
                        }
                    };
                    transitions.push(FsmTransition {
                        source,
                        input: ta.input,
                        output: ta.output,
                        target,
                    });
                }
            }
        }
        let mut product = Fsm::with_capacity(
            index.len(),
            0,
            self.max_input().max(other.max_input()),
            self.max_output().max(other.max_output()),
        );
        for t in transitions {
            product.add_transition(t);
        }
        debug!(states = product.size(), "built intersection automaton");
        product
    }

    /// True iff both machines accept the same input/output language. Only
    /// meaningful for prime machines, where it reduces to the intersection
    /// being completely defined.
    pub fn language_equivalent(&self, other: &Fsm) -> bool {
        self.intersect(other).is_completely_defined()
    }
}

/// Applies every sequence of `suite` to both machines and compares the
/// responses: the implementation passes iff it reproduces the reference
/// output on every test case.
pub fn passes_suite(reference: &Fsm, implementation: &Fsm, suite: &IOListContainer) -> bool {
    suite.traces().all(|trace| {
        let expected = reference.apply_det(&trace);
        implementation.pass(&expected)
    })
}

/// The distinguishability oracle: answers whether two states of a machine
/// produce different output languages. The underlying `n × n` matrix is
/// computed from the table chain on first use and cached.
pub struct Distinguishability<'a> {
    fsm: &'a Fsm,
    matrix: OnceCell<Vec<bool>>,
}

impl<'a> Distinguishability<'a> {
    /// Creates the oracle without computing anything yet.
    pub fn new(fsm: &'a Fsm) -> Self {
        Self {
            fsm,
            matrix: OnceCell::new(),
        }
    }

    fn matrix(&self) -> &[bool] {
        self.matrix.get_or_init(|| {
            let n = self.fsm.size();
            let chain = TableChain::for_fsm(self.fsm);
            let mut matrix = vec![false; n * n];
            for s in self.fsm.states() {
                for t in self.fsm.states() {
                    matrix[s as usize * n + t as usize] = chain.distinguishable(s, t);
                }
            }
            debug!(states = n, "computed distinguishability matrix");
            matrix
        })
    }

    /// True iff some input sequence tells the two states apart.
    pub fn distinguishable(&self, s: StateId, t: StateId) -> bool {
        s != t && self.matrix()[s as usize * self.fsm.size() + t as usize]
    }
}
