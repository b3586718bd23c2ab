use std::fmt;
use std::str::FromStr;

use itertools::Itertools;

use crate::{Input, Symbol};

macro_rules! symbol_trace {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Vec<Symbol>);

        impl $name {
            /// Creates a trace from the given symbols.
            pub fn new(symbols: impl Into<Vec<Symbol>>) -> Self {
                Self(symbols.into())
            }

            /// The empty trace.
            pub fn empty() -> Self {
                Self(Vec::new())
            }

            /// Appends a symbol at the end of the trace.
            pub fn push(&mut self, symbol: Symbol) {
                self.0.push(symbol);
            }

            /// Number of symbols in the trace.
            pub fn len(&self) -> usize {
                self.0.len()
            }

            /// True iff the trace holds no symbols.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Iterates over the symbols of the trace.
            pub fn symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
                self.0.iter().copied()
            }

            /// Borrow the underlying symbol slice.
            pub fn as_slice(&self) -> &[Symbol] {
                &self.0
            }

            /// The prefix consisting of the first `len` symbols. Saturates at
            /// the full trace.
            pub fn prefix(&self, len: usize) -> Self {
                Self(self.0[..len.min(self.0.len())].to_vec())
            }

            /// True iff `self` is a (not necessarily proper) prefix of `other`.
            pub fn is_prefix_of(&self, other: &Self) -> bool {
                other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
            }

            /// Returns the concatenation `self · other`.
            pub fn concat(&self, other: &Self) -> Self {
                Self(self.symbols().chain(other.symbols()).collect())
            }
        }

        impl From<Vec<Symbol>> for $name {
            fn from(symbols: Vec<Symbol>) -> Self {
                Self(symbols)
            }
        }

        impl FromIterator<Symbol> for $name {
            fn from_iter<I: IntoIterator<Item = Symbol>>(iter: I) -> Self {
                Self(iter.into_iter().collect())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.iter().join("."))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self)
            }
        }
    };
}

symbol_trace!(
    /// A sequence of input symbols. Prints its tokens separated by `.`, the
    /// empty trace printing as the empty string.
    InputTrace
);
symbol_trace!(
    /// A sequence of output symbols.
    OutputTrace
);

/// A trace of aligned input/output pairs, as produced by walking a
/// deterministic machine.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct IOTrace {
    inputs: InputTrace,
    outputs: OutputTrace,
}

impl IOTrace {
    /// Creates an I/O trace from aligned projections. Panics if the two
    /// traces have different lengths.
    pub fn new(inputs: InputTrace, outputs: OutputTrace) -> Self {
        assert_eq!(
            inputs.len(),
            outputs.len(),
            "input and output projection must be aligned"
        );
        Self { inputs, outputs }
    }

    /// The empty I/O trace.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Appends an aligned input/output pair.
    pub fn push(&mut self, input: Symbol, output: Symbol) {
        self.inputs.push(input);
        self.outputs.push(output);
    }

    /// Number of aligned pairs.
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// True iff the trace holds no pairs.
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// The input projection.
    pub fn inputs(&self) -> &InputTrace {
        &self.inputs
    }

    /// The output projection.
    pub fn outputs(&self) -> &OutputTrace {
        &self.outputs
    }

    /// Iterates over the aligned pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (Symbol, Symbol)> + '_ {
        self.inputs.symbols().zip(self.outputs.symbols())
    }
}

impl fmt::Display for IOTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.pairs().map(|(x, y)| format!("{x}/{y}")).join(".")
        )
    }
}

impl fmt::Debug for IOTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IOTrace({})", self)
    }
}

/// Error reported when parsing a serialised I/O-list container fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid symbol `{token}` in line {line}")]
pub struct ParseIOListError {
    line: usize,
    token: String,
}

/// A set of input sequences together with the bounds `(max_input, min_len,
/// max_len)` of its content. This is the exchange format of all test-suite
/// generators.
///
/// Equality compares the sequences only; the bounds are derived data.
#[derive(Clone)]
pub struct IOListContainer {
    lists: Vec<Vec<Input>>,
    max_input: Input,
    min_len: usize,
    max_len: usize,
}

impl IOListContainer {
    /// Creates a container holding the given lists over the input alphabet
    /// `0..=max_input`.
    pub fn new(lists: Vec<Vec<Input>>, max_input: Input) -> Self {
        let min_len = lists.iter().map(Vec::len).min().unwrap_or(0);
        let max_len = lists.iter().map(Vec::len).max().unwrap_or(0);
        Self {
            lists,
            max_input,
            min_len,
            max_len,
        }
    }

    /// A container without any sequences.
    pub fn empty(max_input: Input) -> Self {
        Self::new(Vec::new(), max_input)
    }

    /// The full input enumeration: every sequence over `0..=max_input` with
    /// length in `min_len..=max_len`, in lexicographic order per length.
    pub fn enumerate(max_input: Input, min_len: usize, max_len: usize) -> Self {
        let mut lists = Vec::new();
        for len in min_len..=max_len {
            if len == 0 {
                lists.push(Vec::new());
                continue;
            }
            lists.extend((0..len).map(|_| 0..=max_input).multi_cartesian_product());
        }
        Self::new(lists, max_input)
    }

    /// Borrow the sequences.
    pub fn lists(&self) -> &[Vec<Input>] {
        &self.lists
    }

    /// Number of sequences in the container.
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    /// True iff the container holds no sequence.
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Largest input symbol of the alphabet the sequences range over.
    pub fn max_input(&self) -> Input {
        self.max_input
    }

    /// Length of the shortest sequence (0 for an empty container).
    pub fn min_len(&self) -> usize {
        self.min_len
    }

    /// Length of the longest sequence (0 for an empty container).
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Appends a sequence, widening the bounds as necessary.
    pub fn push(&mut self, list: Vec<Input>) {
        if self.lists.is_empty() {
            self.min_len = list.len();
            self.max_len = list.len();
        } else {
            self.min_len = self.min_len.min(list.len());
            self.max_len = self.max_len.max(list.len());
        }
        self.lists.push(list);
    }

    /// True iff the container holds the given sequence.
    pub fn contains(&self, list: &[Input]) -> bool {
        self.lists.iter().any(|l| l == list)
    }

    /// Iterates over the sequences as [`InputTrace`]s.
    pub fn traces(&self) -> impl Iterator<Item = InputTrace> + '_ {
        self.lists.iter().map(|l| InputTrace::new(l.clone()))
    }

    /// Sorts the sequences lexicographically. Generators emit their suites
    /// through this to keep output stable across runs.
    pub fn sorted_lexicographic(mut self) -> Self {
        self.lists.sort();
        self
    }
}

impl PartialEq for IOListContainer {
    fn eq(&self, other: &Self) -> bool {
        self.lists == other.lists
    }
}
impl Eq for IOListContainer {}

impl fmt::Display for IOListContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for list in &self.lists {
            writeln!(f, "{}", list.iter().join("."))?;
        }
        Ok(())
    }
}

impl fmt::Debug for IOListContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IOListContainer[{}]",
            self.lists.iter().map(|l| l.iter().join(".")).join(", ")
        )
    }
}

impl FromStr for IOListContainer {
    type Err = ParseIOListError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lists = Vec::new();
        let mut max_input = 0;
        for (idx, line) in s.lines().enumerate() {
            if line.is_empty() {
                lists.push(Vec::new());
                continue;
            }
            let mut list = Vec::new();
            for token in line.split('.') {
                let symbol: Input = token.parse().map_err(|_| ParseIOListError {
                    line: idx + 1,
                    token: token.to_string(),
                })?;
                max_input = max_input.max(symbol);
                list.push(symbol);
            }
            lists.push(list);
        }
        Ok(Self::new(lists, max_input))
    }
}
