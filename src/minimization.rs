use std::collections::VecDeque;

use bit_set::BitSet;
use tracing::debug;

use crate::fsm::tables::{ofsm_table_chain, pk_table_chain};
use crate::fsm::{Fsm, FsmTransition};
use crate::math;
use crate::StateId;

impl Fsm {
    /// Removes every state that is not reachable from the initial state and
    /// relabels the remaining states densely, preserving their relative
    /// order. Returns the removed states under their old ids. Idempotent.
    pub fn remove_unreachable(&mut self) -> Vec<StateId> {
        let mut reachable = BitSet::with_capacity(self.size());
        reachable.insert(self.initial() as usize);
        let mut queue = VecDeque::from([self.initial()]);
        while let Some(q) = queue.pop_front() {
            for t in self.transitions_from(q) {
                if reachable.insert(t.target as usize) {
                    queue.push_back(t.target);
                }
            }
        }

        let removed: Vec<StateId> = self
            .states()
            .filter(|&q| !reachable.contains(q as usize))
            .collect();
        if removed.is_empty() {
            return removed;
        }

        let mut remap = vec![0 as StateId; self.size()];
        for (new_id, old_id) in reachable.iter().enumerate() {
            remap[old_id] = new_id as StateId;
        }
        let mut pruned = Fsm::with_capacity(
            reachable.len(),
            remap[self.initial() as usize],
            self.max_input(),
            self.max_output(),
        );
        for t in self.transitions() {
            if reachable.contains(t.source as usize) {
                pruned.add_transition(FsmTransition {
                    source: remap[t.source as usize],
                    input: t.input,
                    output: t.output,
                    target: remap[t.target as usize],
                });
            }
        }
        debug!(removed = removed.len(), "pruned unreachable states");
        *self = pruned;
        removed
    }

    /// The observable transform: a subset construction where each new state
    /// is labelled by the set of original states reachable under one
    /// input/output history. Merges subset states with coinciding labels and
    /// preserves the machine's language.
    pub fn transform_to_observable(&self) -> Fsm {
        let mut labels: math::Map<math::OrderedSet<StateId>, StateId> = math::Map::default();
        let initial_label: math::OrderedSet<StateId> = [self.initial()].into();
        labels.insert(initial_label.clone(), 0);
        let mut worklist = VecDeque::from([initial_label]);
        let mut transitions = Vec::new();

        while let Some(label) = worklist.pop_front() {
            let source = labels[&label];
            let mut by_pair: math::OrderedMap<(u16, u16), math::OrderedSet<StateId>> =
                math::OrderedMap::new();
            for &q in &label {
                for t in self.transitions_from(q) {
                    by_pair
                        .entry((t.input, t.output))
                        .or_default()
                        .insert(t.target);
                }
            }
            for ((input, output), targets) in by_pair {
                let target = match labels.get(&targets) {
                    Some(&id) => id,
                    None => {
                        let id = labels.len() as StateId;
                        labels.insert(targets.clone(), id);
                        worklist.push_back(targets);
                        id
                    }
                };
                transitions.push(FsmTransition {
                    source,
                    input,
                    output,
                    target,
                });
            }
        }

        let mut observable = Fsm::with_capacity(labels.len(), 0, self.max_input(), self.max_output());
        for t in transitions {
            observable.add_transition(t);
        }
        debug!(
            from = self.size(),
            to = observable.size(),
            "observable transform"
        );
        observable
    }

    /// Minimises a deterministic machine by quotienting the reachable part
    /// through the Pk-table fixpoint. Minimising an already minimal machine
    /// reproduces it. Undefined `(state, input)` slots are preserved.
    pub fn minimise(&self) -> Fsm {
        assert!(
            self.is_deterministic(),
            "Pk-table minimisation requires a deterministic machine"
        );
        let mut reachable = self.clone();
        reachable.remove_unreachable();
        let chain = pk_table_chain(&reachable);
        let table = chain.last().expect("non-empty chain");
        Self::quotient(&reachable, |q| table.class_of(q), table.num_classes())
    }

    /// Minimises a (possibly nondeterministic) machine: applies the
    /// observable transform if necessary, then quotients through the
    /// OFSM-table fixpoint.
    pub fn minimise_observable(&self) -> Fsm {
        let mut observable = if self.is_observable() {
            self.clone()
        } else {
            self.transform_to_observable()
        };
        observable.remove_unreachable();
        let chain = ofsm_table_chain(&observable);
        let table = chain.last().expect("non-empty chain");
        Self::quotient(&observable, |q| table.class_of(q), table.num_classes())
    }

    fn quotient(
        fsm: &Fsm,
        class_of: impl Fn(StateId) -> u32,
        num_classes: usize,
    ) -> Fsm {
        let mut minimal = Fsm::with_capacity(
            num_classes,
            class_of(fsm.initial()),
            fsm.max_input(),
            fsm.max_output(),
        );
        // first state of each class is its representative
        let mut seen = BitSet::with_capacity(num_classes);
        for q in fsm.states() {
            let class = class_of(q);
            if !seen.insert(class as usize) {
                continue;
            }
            for t in fsm.transitions_from(q) {
                minimal.add_transition(FsmTransition {
                    source: class,
                    input: t.input,
                    output: t.output,
                    target: class_of(t.target),
                });
            }
        }
        debug!(from = fsm.size(), to = minimal.size(), "quotiented machine");
        minimal
    }

    /// True iff every state is reachable from the initial state and any two
    /// distinct states are distinguishable by some input sequence.
    pub fn is_minimal(&self) -> bool {
        let mut probe = self.clone();
        if !probe.remove_unreachable().is_empty() {
            return false;
        }
        let chain = crate::fsm::tables::TableChain::for_fsm(self);
        chain.is_discrete()
    }

    /// True iff the machine is deterministic, completely defined, observable
    /// and minimal — the precondition of the W, Wp, H and D generators.
    pub fn is_prime(&self) -> bool {
        self.is_deterministic()
            && self.is_observable()
            && self.is_completely_defined()
            && self.is_minimal()
    }
}

impl PartialEq for Fsm {
    fn eq(&self, other: &Self) -> bool {
        let mut ours: Vec<_> = self.transitions().collect();
        let mut theirs: Vec<_> = other.transitions().collect();
        ours.sort();
        theirs.sort();
        self.size() == other.size()
            && self.initial() == other.initial()
            && self.max_input() == other.max_input()
            && self.max_output() == other.max_output()
            && ours == theirs
    }
}
impl Eq for Fsm {}
