use crate::StateId;

/// Errors reported by builders and generators.
///
/// Absence of a distinguishing construct (PDS/ADS) is *not* an error; the
/// search operations return `Option`/empty suites for that. Errors are
/// reserved for violated preconditions and malformed construction input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A generator that requires a prime machine (deterministic, completely
    /// defined, observable, minimal) was handed something else.
    #[error("machine is not prime: {reason}")]
    NotPrime {
        /// Which of the primality requirements failed.
        reason: &'static str,
    },
    /// A symbol handed to the builder does not fit the symbol range.
    #[error("symbol {value} exceeds the representable range 0..={max}")]
    SymbolRange {
        /// The offending value.
        value: usize,
        /// Largest representable symbol.
        max: usize,
    },
    /// A transition references a state beyond the declared state count.
    #[error("transition endpoint {state} out of range for {num_states} states")]
    StateRange {
        /// The offending state id.
        state: StateId,
        /// Number of states the machine was declared with.
        num_states: usize,
    },
    /// The builder was finalised without any state.
    #[error("machine has no states")]
    EmptyMachine,
}
