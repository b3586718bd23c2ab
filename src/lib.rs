#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Defines some mathematical objects that are used such as sets, mappings
/// and partitions of the state set.
pub mod math;

/// Input, output and input/output traces together with the I/O-list
/// container that test suites are exchanged in.
pub mod trace;

/// The FSM kernel: the arena-backed machine representation, its builder and
/// the Pk-/OFSM-table chains used to compute state equivalence.
pub mod fsm;

/// Canonicalisation of machines: reachability, the observable transform and
/// minimisation for the deterministic and the nondeterministic case.
pub mod minimization;

/// A prefix tree over input sequences with union and set-difference, plus
/// the output tree produced by applying an input trace to a machine.
pub mod tree;

/// Characterisation sets and per-state identification sets.
pub mod characterization;

/// Preset and adaptive distinguishing sequences, built over splitting trees
/// and the partition graph.
pub mod distinguishing;

/// The test-suite generators: W, Wp, H, T, D and Hierons' D method.
pub mod generators;

/// Intersection products, language equivalence and the distinguishability
/// oracle.
pub mod product;

/// Generation of random machines and mutants from an explicit seed.
pub mod random;

mod error;
pub use error::Error;

/// Symbols are dense non-negative integers. Inputs and outputs share the
/// same representation; a machine carries the respective maxima.
pub type Symbol = u16;
/// An input symbol in the range `0..=max_input` of its machine.
pub type Input = Symbol;
/// An output symbol in the range `0..=max_output` of its machine.
pub type Output = Symbol;
/// States are dense 32-bit arena indices, stable within one machine.
pub type StateId = u32;

/// The prelude is supposed to make using this package easier. Importing
/// everything, i.e. `use conformance::prelude::*;`, should be enough to use
/// the package.
pub mod prelude {
    pub use crate::characterization::{
        characterisation_set, harmonised_identification_sets, state_identification_sets,
    };
    pub use crate::distinguishing::{
        adaptive_distinguishing_sequence, preset_distinguishing_sequence, InputOutputTree,
    };
    pub use crate::fsm::{
        tables::{OfsmTable, PkTable, TableChain},
        Fsm, FsmBuilder, FsmTransition,
    };
    pub use crate::generators::{
        d_method, h_method, hierons_d_method, state_cover, t_method, transition_cover, w_method,
        wp_method, DistinguishingMode,
    };
    pub use crate::math;
    pub use crate::product::{passes_suite, Distinguishability};
    pub use crate::trace::{IOListContainer, IOTrace, InputTrace, OutputTrace};
    pub use crate::tree::{output_tree::OutputTree, Tree};
    pub use crate::{Error, Input, Output, StateId, Symbol};
}
