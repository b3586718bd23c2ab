pub mod tables;

use itertools::Itertools;
use tracing::debug;

use crate::math;
use crate::trace::{IOTrace, InputTrace, OutputTrace};
use crate::tree::output_tree::OutputTree;
use crate::tree::Tree;
use crate::{Error, Input, Output, StateId, Symbol};

/// A single transition of a machine: reading `input` in `source` emits
/// `output` and moves to `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FsmTransition {
    /// State the transition leaves from.
    pub source: StateId,
    /// Input symbol consumed.
    pub input: Input,
    /// Output symbol emitted.
    pub output: Output,
    /// State the transition moves to.
    pub target: StateId,
}

#[derive(Debug, Clone, Default)]
struct FsmState {
    // out-transition ids, in insertion order
    transitions: Vec<u32>,
}

/// A finite-state machine in Mealy form: a tuple `(Q, q₀, Σᵢ, Σₒ, Δ)` with
/// `Δ ⊆ Q × Σᵢ × Σₒ × Q`.
///
/// States and transitions live in arenas indexed by dense 32-bit ids, which
/// are stable within one instance. Machines are immutable after
/// construction; canonicalisation produces new machines.
#[derive(Debug, Clone)]
pub struct Fsm {
    states: Vec<FsmState>,
    transitions: Vec<FsmTransition>,
    initial: StateId,
    max_input: Input,
    max_output: Output,
}

/// Helper struct for the construction of machines from a transition list.
///
/// # Example
///
/// ```
/// use conformance::prelude::*;
///
/// let fsm = FsmBuilder::default()
///     .with_transitions([(0, 0, 1, 1), (0, 1, 0, 0), (1, 0, 0, 0), (1, 1, 1, 1)])
///     .initial(0)
///     .build()
///     .unwrap();
/// assert_eq!(fsm.size(), 2);
/// assert!(fsm.is_deterministic());
/// ```
#[derive(Debug, Clone, Default)]
pub struct FsmBuilder {
    transitions: Vec<(usize, usize, usize, usize)>,
    initial: Option<usize>,
    num_states: Option<usize>,
    max_input: Option<usize>,
    max_output: Option<usize>,
}

impl FsmBuilder {
    /// Adds a list of transitions given as `(source, input, output, target)`
    /// quadruples.
    pub fn with_transitions<I>(mut self, iter: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize, usize, usize)>,
    {
        self.transitions.extend(iter);
        self
    }

    /// Sets the initial state. Defaults to state `0`.
    pub fn initial(mut self, state: usize) -> Self {
        self.initial = Some(state);
        self
    }

    /// Forces the number of states. By default the state count is inferred
    /// as one past the largest transition endpoint; this admits trailing
    /// states without any outgoing transition.
    pub fn with_num_states(mut self, num_states: usize) -> Self {
        self.num_states = Some(num_states);
        self
    }

    /// Forces the input alphabet to span `0..=max_input` even when no
    /// transition carries the extremal symbol.
    pub fn with_max_input(mut self, max_input: usize) -> Self {
        self.max_input = Some(max_input);
        self
    }

    /// Forces the output alphabet to span `0..=max_output`.
    pub fn with_max_output(mut self, max_output: usize) -> Self {
        self.max_output = Some(max_output);
        self
    }

    /// Finalises the machine. Duplicate transitions (identical source,
    /// input, output and target) are silently dropped.
    pub fn build(self) -> Result<Fsm, Error> {
        let symbol_max = Symbol::MAX as usize;
        for &(_, input, output, _) in &self.transitions {
            for value in [input, output] {
                if value > symbol_max {
                    return Err(Error::SymbolRange {
                        value,
                        max: symbol_max,
                    });
                }
            }
        }

        let inferred_states = self
            .transitions
            .iter()
            .flat_map(|&(src, _, _, tgt)| [src, tgt])
            .chain(self.initial)
            .map(|q| q + 1)
            .max()
            .unwrap_or(0);
        let num_states = self.num_states.unwrap_or(inferred_states);
        if num_states == 0 {
            return Err(Error::EmptyMachine);
        }
        for &(src, _, _, tgt) in &self.transitions {
            for state in [src, tgt] {
                if state >= num_states {
                    return Err(Error::StateRange {
                        state: state as StateId,
                        num_states,
                    });
                }
            }
        }

        let max_input = self
            .transitions
            .iter()
            .map(|&(_, x, _, _)| x)
            .chain(self.max_input)
            .max()
            .unwrap_or(0) as Input;
        let max_output = self
            .transitions
            .iter()
            .map(|&(_, _, y, _)| y)
            .chain(self.max_output)
            .max()
            .unwrap_or(0) as Output;

        let mut fsm = Fsm {
            states: vec![FsmState::default(); num_states],
            transitions: Vec::with_capacity(self.transitions.len()),
            initial: self.initial.unwrap_or(0) as StateId,
            max_input,
            max_output,
        };
        for (src, input, output, tgt) in self.transitions {
            fsm.add_transition(FsmTransition {
                source: src as StateId,
                input: input as Input,
                output: output as Output,
                target: tgt as StateId,
            });
        }
        debug!(
            states = fsm.size(),
            transitions = fsm.transitions.len(),
            max_input = fsm.max_input,
            max_output = fsm.max_output,
            "built machine"
        );
        Ok(fsm)
    }
}

impl Fsm {
    pub(crate) fn with_capacity(
        num_states: usize,
        initial: StateId,
        max_input: Input,
        max_output: Output,
    ) -> Self {
        Self {
            states: vec![FsmState::default(); num_states],
            transitions: Vec::new(),
            initial,
            max_input,
            max_output,
        }
    }

    pub(crate) fn add_transition(&mut self, transition: FsmTransition) {
        let duplicate = self.states[transition.source as usize]
            .transitions
            .iter()
            .any(|&t| self.transitions[t as usize] == transition);
        if duplicate {
            return;
        }
        let id = self.transitions.len() as u32;
        self.transitions.push(transition);
        self.states[transition.source as usize].transitions.push(id);
    }

    /// Number of states.
    pub fn size(&self) -> usize {
        self.states.len()
    }

    /// Iterates over all state ids in ascending order.
    pub fn states(&self) -> impl Iterator<Item = StateId> + Clone {
        0..self.states.len() as StateId
    }

    /// The initial state.
    pub fn initial(&self) -> StateId {
        self.initial
    }

    /// Largest input symbol; the input alphabet is `0..=max_input`.
    pub fn max_input(&self) -> Input {
        self.max_input
    }

    /// Largest output symbol; the output alphabet is `0..=max_output`.
    pub fn max_output(&self) -> Output {
        self.max_output
    }

    /// Iterates over all transitions in arena order.
    pub fn transitions(&self) -> impl Iterator<Item = &FsmTransition> {
        self.transitions.iter()
    }

    /// Iterates over the transitions leaving `state` in insertion order.
    pub fn transitions_from(&self, state: StateId) -> impl Iterator<Item = &FsmTransition> {
        self.states[state as usize]
            .transitions
            .iter()
            .map(move |&t| &self.transitions[t as usize])
    }

    /// The unique transition for `(state, input)` of a deterministic
    /// machine, or `None` when the pair is undefined.
    pub fn transition(&self, state: StateId, input: Input) -> Option<&FsmTransition> {
        self.transitions_from(state).find(|t| t.input == input)
    }

    /// The unique target of `(state, input, output)` in an observable
    /// machine.
    pub fn transition_on(
        &self,
        state: StateId,
        input: Input,
        output: Output,
    ) -> Option<StateId> {
        self.transitions_from(state)
            .find(|t| t.input == input && t.output == output)
            .map(|t| t.target)
    }

    /// All `(output, target)` pairs reachable from `state` on `input`.
    pub fn successors(
        &self,
        state: StateId,
        input: Input,
    ) -> impl Iterator<Item = (Output, StateId)> + '_ {
        self.transitions_from(state)
            .filter(move |t| t.input == input)
            .map(|t| (t.output, t.target))
    }

    /// All outputs `state` can emit on `input`, deduplicated, in transition
    /// insertion order.
    pub fn possible_outputs(&self, state: StateId, input: Input) -> Vec<Output> {
        self.successors(state, input)
            .map(|(y, _)| y)
            .unique()
            .collect()
    }

    /// Applies the input trace starting in the initial state and returns
    /// the tree of all producible output sequences. A path ends early at
    /// states where the next input is undefined.
    pub fn apply(&self, inputs: &InputTrace) -> OutputTree {
        self.apply_from(self.initial, inputs)
    }

    /// As [`Fsm::apply`], but starting in `state`.
    pub fn apply_from(&self, state: StateId, inputs: &InputTrace) -> OutputTree {
        let mut tree = Tree::new();
        let mut frontier: Vec<(u32, Vec<StateId>)> = vec![(Tree::ROOT, vec![state])];
        for x in inputs.symbols() {
            let mut next = Vec::new();
            for (node, states) in frontier {
                let mut by_output: math::Map<Output, math::Set<StateId>> = math::Map::default();
                for q in states {
                    for (y, target) in self.successors(q, x) {
                        by_output.entry(y).or_default().insert(target);
                    }
                }
                for (y, targets) in by_output {
                    let child = tree.ensure_child(node, y);
                    next.push((child, targets.into_iter().collect()));
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        OutputTree::new(inputs.clone(), tree)
    }

    /// Walks a deterministic machine over the input trace and returns the
    /// consumed I/O prefix, stopping at the first undefined transition.
    pub fn apply_det(&self, inputs: &InputTrace) -> IOTrace {
        let mut io = IOTrace::empty();
        let mut current = self.initial;
        for x in inputs.symbols() {
            let Some(t) = self.transition(current, x) else {
                break;
            };
            io.push(x, t.output);
            current = t.target;
        }
        io
    }

    /// The set of states reachable from the initial state by the input
    /// trace under any output.
    pub fn after(&self, inputs: &InputTrace) -> math::Set<StateId> {
        self.after_from(self.initial, inputs)
    }

    /// As [`Fsm::after`], but starting in `state`.
    pub fn after_from(&self, state: StateId, inputs: &InputTrace) -> math::Set<StateId> {
        let mut current: math::Set<StateId> = math::Set::from_iter([state]);
        for x in inputs.symbols() {
            current = current
                .into_iter()
                .flat_map(|q| self.successors(q, x).map(|(_, target)| target))
                .collect();
        }
        current
    }

    /// The state a deterministic machine reaches on `inputs`, or `None`
    /// when the walk runs into an undefined transition.
    pub fn state_after_det(&self, inputs: &[Input]) -> Option<StateId> {
        let mut current = self.initial;
        for &x in inputs {
            current = self.transition(current, x)?.target;
        }
        Some(current)
    }

    /// True iff every `(state, input)` pair has at most one transition.
    pub fn is_deterministic(&self) -> bool {
        self.states().all(|q| {
            self.transitions_from(q)
                .map(|t| t.input)
                .duplicates()
                .next()
                .is_none()
        })
    }

    /// True iff every `(state, input, output)` triple has at most one
    /// target.
    pub fn is_observable(&self) -> bool {
        self.states().all(|q| {
            self.transitions_from(q)
                .map(|t| (t.input, t.output))
                .duplicates()
                .next()
                .is_none()
        })
    }

    /// True iff every `(state, input)` pair has at least one transition.
    pub fn is_completely_defined(&self) -> bool {
        self.states().all(|q| {
            (0..=self.max_input).all(|x| self.transitions_from(q).any(|t| t.input == x))
        })
    }

    /// Test verdict for an observed I/O trace: true iff the machine can
    /// reproduce the output trace as a prefix-match when the input trace is
    /// applied. Never fails.
    pub fn pass(&self, io: &IOTrace) -> bool {
        let response = self.apply(io.inputs());
        response
            .output_traces()
            .iter()
            .any(|produced| produced == &io.outputs().prefix(produced.len()))
    }
}

impl std::fmt::Display for Fsm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "fsm with {} states over inputs 0..={} and outputs 0..={}",
            self.size(),
            self.max_input,
            self.max_output
        )?;
        for t in &self.transitions {
            writeln!(f, "  {} --{}/{}--> {}", t.source, t.input, t.output, t.target)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

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

    #[test]
    fn builder_drops_duplicate_transitions() {
        let fsm = FsmBuilder::default()
            .with_transitions([(0, 0, 0, 1), (0, 0, 0, 1), (1, 0, 1, 0)])
            .build()
            .unwrap();
        assert_eq!(fsm.transitions().count(), 2);
        // a transition differing only in its output is kept
        let fsm = FsmBuilder::default()
            .with_transitions([(0, 0, 0, 1), (0, 0, 1, 1), (1, 0, 1, 0)])
            .build()
            .unwrap();
        assert_eq!(fsm.transitions().count(), 3);
        assert!(!fsm.is_deterministic());
        assert!(fsm.is_observable());
    }

    #[test]
    fn builder_rejects_out_of_range_states() {
        let err = FsmBuilder::default()
            .with_transitions([(0, 0, 0, 5)])
            .with_num_states(2)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            Error::StateRange {
                state: 5,
                num_states: 2
            }
        );
        assert_eq!(FsmBuilder::default().build().unwrap_err(), Error::EmptyMachine);
    }

    #[test]
    fn builder_rejects_symbol_overflow() {
        let err = FsmBuilder::default()
            .with_transitions([(0, 1 << 20, 0, 0)])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::SymbolRange { .. }));
    }

    #[test]
    fn predicates() {
        let fsm = three_state_dfsm();
        assert!(fsm.is_deterministic());
        assert!(fsm.is_observable());
        assert!(fsm.is_completely_defined());

        let partial = FsmBuilder::default()
            .with_transitions([(0, 0, 0, 1), (1, 1, 0, 0)])
            .build()
            .unwrap();
        assert!(!partial.is_completely_defined());
    }

    #[test]
    fn apply_det_stops_at_undefined_transition() {
        // five-state chain, undefined on the final input
        let fsm = FsmBuilder::default()
            .with_transitions([
                (0, 1, 2, 1),
                (1, 0, 0, 2),
                (2, 0, 2, 3),
                (3, 0, 2, 4),
                (4, 0, 0, 4),
            ])
            .initial(0)
            .build()
            .unwrap();
        let io = fsm.apply_det(&InputTrace::new(vec![1, 0, 0, 0, 1]));
        assert_eq!(io.len(), 4);
        assert_eq!(io.outputs(), &OutputTrace::new(vec![2, 0, 2, 2]));
        assert_eq!(io.inputs(), &InputTrace::new(vec![1, 0, 0, 0]));
    }

    #[test]
    fn apply_collects_all_outputs() {
        let fsm = FsmBuilder::default()
            .with_transitions([
                (0, 0, 0, 1),
                (0, 0, 1, 2),
                (1, 0, 0, 1),
                (2, 0, 1, 2),
            ])
            .build()
            .unwrap();
        let tree = fsm.apply(&InputTrace::new(vec![0, 0]));
        let traces = tree.output_traces();
        assert_eq!(traces.len(), 2);
        assert!(traces.contains(&OutputTrace::new(vec![0, 0])));
        assert!(traces.contains(&OutputTrace::new(vec![1, 1])));
    }

    #[test]
    fn after_follows_all_outputs() {
        let fsm = FsmBuilder::default()
            .with_transitions([
                (0, 0, 0, 1),
                (0, 0, 1, 2),
                (1, 0, 0, 0),
                (2, 0, 1, 2),
            ])
            .build()
            .unwrap();
        let reached = fsm.after(&InputTrace::new(vec![0]));
        assert_eq!(reached.len(), 2);
        assert!(reached.contains(&1) && reached.contains(&2));
        let reached = fsm.after(&InputTrace::new(vec![0, 0]));
        assert!(reached.contains(&0) && reached.contains(&2));
    }

    #[test]
    fn pass_is_a_prefix_match() {
        let fsm = three_state_dfsm();
        let io = fsm.apply_det(&InputTrace::new(vec![0, 0, 1]));
        assert!(fsm.pass(&io));

        let wrong = IOTrace::new(
            InputTrace::new(vec![0, 0]),
            OutputTrace::new(vec![0, 1]),
        );
        assert!(!fsm.pass(&wrong));
    }
}
