//! Pk-tables (deterministic) and OFSM-tables (nondeterministic observable)
//! and the refinement chains computing k-equivalence of states. The chains
//! drive minimisation, the characterisation set and the distinguishability
//! oracle.

use std::hash::Hash;

use tracing::trace;

use crate::fsm::Fsm;
use crate::math::{self, Partition};
use crate::trace::InputTrace;
use crate::{Output, StateId};

/// Dense index of a k-equivalence class.
pub type ClassId = u32;

/// Maps arbitrary refinement keys to class ids in order of first occurrence,
/// so that equal key vectors yield identical class vectors.
fn canonical_classes<K: Hash + Eq>(keys: impl IntoIterator<Item = K>) -> Vec<ClassId> {
    let mut ids: math::Map<K, ClassId> = math::Map::default();
    keys.into_iter()
        .map(|key| {
            let next = ids.len() as ClassId;
            *ids.entry(key).or_insert(next)
        })
        .collect()
}

fn partition_from_classes(s2c: &[ClassId]) -> Partition<StateId> {
    let num_classes = s2c.iter().map(|&c| c as usize + 1).max().unwrap_or(0);
    let mut blocks = vec![Vec::new(); num_classes];
    for (q, &c) in s2c.iter().enumerate() {
        blocks[c as usize].push(q as StateId);
    }
    Partition::new(blocks)
}

/// One table of the Pk chain: states of a deterministic machine mapped to
/// their k-equivalence class. Two states are k-equivalent iff every input
/// produces the same output on both and leads to (k−1)-equivalent
/// successors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkTable {
    k: usize,
    s2c: Vec<ClassId>,
}

impl PkTable {
    /// The refinement depth of this table.
    pub fn k(&self) -> usize {
        self.k
    }

    /// The k-equivalence class of `state`.
    pub fn class_of(&self, state: StateId) -> ClassId {
        self.s2c[state as usize]
    }

    /// Number of k-equivalence classes.
    pub fn num_classes(&self) -> usize {
        self.s2c.iter().map(|&c| c as usize + 1).max().unwrap_or(0)
    }

    /// The state partition induced by this table.
    pub fn classes(&self) -> Partition<StateId> {
        partition_from_classes(&self.s2c)
    }
}

/// Computes the chain `P1, P2, …, Pm` for a deterministic machine, stopping
/// at the fixpoint `Pm = Pm+1`. The chain is reached in at most `n`
/// iterations.
pub fn pk_table_chain(fsm: &Fsm) -> Vec<PkTable> {
    debug_assert!(fsm.is_deterministic());
    let inputs = 0..=fsm.max_input();

    // per-state row of the underlying DFSM table
    let io: Vec<Vec<Option<Output>>> = fsm
        .states()
        .map(|q| {
            inputs
                .clone()
                .map(|x| fsm.transition(q, x).map(|t| t.output))
                .collect()
        })
        .collect();
    let i2p: Vec<Vec<Option<StateId>>> = fsm
        .states()
        .map(|q| {
            inputs
                .clone()
                .map(|x| fsm.transition(q, x).map(|t| t.target))
                .collect()
        })
        .collect();

    // P1 groups by the output row alone
    let mut chain = vec![PkTable {
        k: 1,
        s2c: canonical_classes(io.iter()),
    }];
    loop {
        let cur = chain.last().expect("chain starts non-empty");
        let keys = fsm.states().map(|q| {
            let succ_classes: Vec<Option<ClassId>> = i2p[q as usize]
                .iter()
                .map(|succ| succ.map(|p| cur.class_of(p)))
                .collect();
            (cur.class_of(q), succ_classes)
        });
        let s2c = canonical_classes(keys);
        if s2c == cur.s2c {
            break;
        }
        trace!(
            k = chain.len() + 1,
            classes = s2c.iter().map(|&c| c as usize + 1).max().unwrap_or(0),
            "refined Pk table"
        );
        chain.push(PkTable {
            k: chain.len() + 1,
            s2c,
        });
    }
    chain
}

/// One table of the OFSM chain for a nondeterministic observable machine:
/// rows are indexed by `(input, output)` pairs and hold the unique successor
/// reached under that pair, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfsmTable {
    k: usize,
    s2c: Vec<ClassId>,
}

impl OfsmTable {
    /// The refinement depth of this table; depth 0 is the trivial partition.
    pub fn k(&self) -> usize {
        self.k
    }

    /// The k-equivalence class of `state`.
    pub fn class_of(&self, state: StateId) -> ClassId {
        self.s2c[state as usize]
    }

    /// Number of k-equivalence classes.
    pub fn num_classes(&self) -> usize {
        self.s2c.iter().map(|&c| c as usize + 1).max().unwrap_or(0)
    }

    /// The state partition induced by this table.
    pub fn classes(&self) -> Partition<StateId> {
        partition_from_classes(&self.s2c)
    }
}

fn ofsm_rows(fsm: &Fsm) -> Vec<Vec<Option<StateId>>> {
    let width = (fsm.max_input() as usize + 1) * (fsm.max_output() as usize + 1);
    fsm.states()
        .map(|q| {
            let mut row = vec![None; width];
            for t in fsm.transitions_from(q) {
                let idx = t.input as usize * (fsm.max_output() as usize + 1) + t.output as usize;
                row[idx] = Some(t.target);
            }
            row
        })
        .collect()
}

/// Computes the chain `O0, O1, …, Om` for an observable machine, stopping
/// at the fixpoint.
pub fn ofsm_table_chain(fsm: &Fsm) -> Vec<OfsmTable> {
    debug_assert!(fsm.is_observable());
    let rows = ofsm_rows(fsm);

    let mut chain = vec![OfsmTable {
        k: 0,
        s2c: vec![0; fsm.size()],
    }];
    loop {
        let cur = chain.last().expect("chain starts non-empty");
        let keys = fsm.states().map(|q| {
            let succ_classes: Vec<Option<ClassId>> = rows[q as usize]
                .iter()
                .map(|succ| succ.map(|p| cur.class_of(p)))
                .collect();
            (cur.class_of(q), succ_classes)
        });
        let s2c = canonical_classes(keys);
        if s2c == cur.s2c {
            break;
        }
        trace!(
            k = chain.len(),
            classes = s2c.iter().map(|&c| c as usize + 1).max().unwrap_or(0),
            "refined OFSM table"
        );
        chain.push(OfsmTable {
            k: chain.len(),
            s2c,
        });
    }
    chain
}

/// The table chain of a machine, tagged by determinism. Generators and the
/// characterisation-set construction switch on this tag instead of
/// dispatching dynamically.
#[derive(Debug, Clone)]
pub enum TableChain {
    /// Pk chain of a deterministic machine.
    Pk(Vec<PkTable>),
    /// OFSM chain of a nondeterministic observable machine.
    Ofsm(Vec<OfsmTable>),
}

impl TableChain {
    /// Computes the appropriate chain for the machine. Nondeterministic
    /// machines must be observable; transform them first.
    pub fn for_fsm(fsm: &Fsm) -> Self {
        if fsm.is_deterministic() {
            Self::Pk(pk_table_chain(fsm))
        } else {
            assert!(
                fsm.is_observable(),
                "OFSM tables require an observable machine"
            );
            Self::Ofsm(ofsm_table_chain(fsm))
        }
    }

    /// The partition of the state set at the fixpoint.
    pub fn classes(&self) -> Partition<StateId> {
        match self {
            Self::Pk(tables) => tables.last().expect("non-empty chain").classes(),
            Self::Ofsm(tables) => tables.last().expect("non-empty chain").classes(),
        }
    }

    /// True iff the fixpoint partition is discrete, i.e. all states are
    /// pairwise distinguishable.
    pub fn is_discrete(&self) -> bool {
        self.classes().is_discrete()
    }

    /// True iff `s` and `t` produce different output languages.
    pub fn distinguishable(&self, s: StateId, t: StateId) -> bool {
        match self {
            Self::Pk(tables) => {
                let last = tables.last().expect("non-empty chain");
                last.class_of(s) != last.class_of(t)
            }
            Self::Ofsm(tables) => {
                let last = tables.last().expect("non-empty chain");
                last.class_of(s) != last.class_of(t)
            }
        }
    }

    /// A shortest input sequence producing different outputs from `s` and
    /// `t`, or the empty trace when the two states are equivalent. The trace
    /// is reconstructed by walking the chain backwards from the first table
    /// where the rows of the pair diverge.
    pub fn distinguishing_trace(&self, fsm: &Fsm, s: StateId, t: StateId) -> InputTrace {
        match self {
            Self::Pk(tables) => pk_distinguishing_trace(fsm, tables, s, t),
            Self::Ofsm(tables) => ofsm_distinguishing_trace(fsm, tables, s, t),
        }
    }
}

fn pk_distinguishing_trace(fsm: &Fsm, chain: &[PkTable], s: StateId, t: StateId) -> InputTrace {
    let mut trace = InputTrace::empty();
    let (mut a, mut b) = (s, t);
    loop {
        let Some(level) = chain
            .iter()
            .position(|tbl| tbl.class_of(a) != tbl.class_of(b))
        else {
            // only reachable on the first round: the pair is equivalent
            return InputTrace::empty();
        };
        if level == 0 {
            // the output rows themselves differ
            let x = (0..=fsm.max_input())
                .find(|&x| {
                    fsm.transition(a, x).map(|t| t.output)
                        != fsm.transition(b, x).map(|t| t.output)
                })
                .expect("P1 classes differ, so some output entry differs");
            trace.push(x);
            return trace;
        }
        // equivalent one level down, so some pair of successors splits there
        let prev = &chain[level - 1];
        let x = (0..=fsm.max_input())
            .find(|&x| match (fsm.transition(a, x), fsm.transition(b, x)) {
                (Some(ta), Some(tb)) => prev.class_of(ta.target) != prev.class_of(tb.target),
                _ => false,
            })
            .expect("tables diverge at this level, so some successor pair splits");
        trace.push(x);
        a = fsm.transition(a, x).expect("checked above").target;
        b = fsm.transition(b, x).expect("checked above").target;
    }
}

fn ofsm_distinguishing_trace(
    fsm: &Fsm,
    chain: &[OfsmTable],
    s: StateId,
    t: StateId,
) -> InputTrace {
    let rows = ofsm_rows(fsm);
    let width_out = fsm.max_output() as usize + 1;
    let mut trace = InputTrace::empty();
    let (mut a, mut b) = (s, t);
    loop {
        let Some(level) = chain
            .iter()
            .position(|tbl| tbl.class_of(a) != tbl.class_of(b))
        else {
            return InputTrace::empty();
        };
        debug_assert!(level >= 1, "the depth-0 table has a single class");
        if level == 1 {
            // some (input, output) pair is defined for one state only
            let (idx, _) = rows[a as usize]
                .iter()
                .zip(&rows[b as usize])
                .enumerate()
                .map(|(idx, (ra, rb))| (idx, (ra.is_some(), rb.is_some())))
                .find(|&(_, (da, db))| da != db)
                .expect("depth-1 classes differ, so definedness differs");
            trace.push((idx / width_out) as crate::Input);
            return trace;
        }
        let prev = &chain[level - 1];
        let (idx, succs) = rows[a as usize]
            .iter()
            .zip(&rows[b as usize])
            .enumerate()
            .find_map(|(idx, (ra, rb))| match (ra, rb) {
                (Some(pa), Some(pb)) if prev.class_of(*pa) != prev.class_of(*pb) => {
                    Some((idx, (*pa, *pb)))
                }
                _ => None,
            })
            .expect("tables diverge at this level, so some successor pair splits");
        trace.push((idx / width_out) as crate::Input);
        (a, b) = succs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;

    // states 2 and 3 are equivalent, everything else is distinguishable
    fn dfsm_with_equivalent_pair() -> Fsm {
        FsmBuilder::default()
            .with_transitions([
                (0, 0, 0, 1),
                (0, 1, 0, 0),
                (1, 0, 1, 2),
                (1, 1, 0, 0),
                (2, 0, 1, 3),
                (2, 1, 1, 0),
                (3, 0, 1, 2),
                (3, 1, 1, 0),
            ])
            .initial(0)
            .build()
            .unwrap()
    }

    #[test]
    fn pk_chain_reaches_expected_partition() {
        let fsm = dfsm_with_equivalent_pair();
        let chain = pk_table_chain(&fsm);
        let classes = chain.last().unwrap().classes();
        assert_eq!(
            classes,
            math::Partition::new([vec![0], vec![1], vec![2, 3]])
        );
        assert!(!classes.is_discrete());
    }

    #[test]
    fn equivalent_states_have_no_distinguishing_trace() {
        let fsm = dfsm_with_equivalent_pair();
        let chain = TableChain::for_fsm(&fsm);
        assert!(!chain.distinguishable(2, 3));
        assert!(chain.distinguishing_trace(&fsm, 2, 3).is_empty());
    }

    #[test]
    fn distinguishing_trace_is_shortest() {
        let fsm = dfsm_with_equivalent_pair();
        let chain = TableChain::for_fsm(&fsm);
        // 0 and 1 differ on their immediate outputs
        assert_eq!(chain.distinguishing_trace(&fsm, 0, 1).len(), 1);
        // 0 and 2 also differ at depth one (input 0: output 0 vs 1)
        let w = chain.distinguishing_trace(&fsm, 0, 2);
        let out0 = fsm.apply_from(0, &w).output_traces();
        let out2 = fsm.apply_from(2, &w).output_traces();
        assert_ne!(out0, out2);
    }

    #[test]
    fn deep_distinguishing_trace_walks_the_chain() {
        // 0 and 1 agree on all immediate outputs and only split through
        // their successors
        let fsm = FsmBuilder::default()
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
            .unwrap();
        let chain = TableChain::for_fsm(&fsm);
        let w = chain.distinguishing_trace(&fsm, 0, 1);
        assert_eq!(w, InputTrace::new(vec![0, 1]));
        assert_ne!(
            fsm.apply_from(0, &w).output_traces(),
            fsm.apply_from(1, &w).output_traces()
        );
    }

    #[test]
    fn ofsm_chain_distinguishes_by_definedness() {
        let fsm = FsmBuilder::default()
            .with_transitions([
                (0, 0, 0, 1),
                (0, 0, 1, 2),
                (0, 1, 0, 0),
                (1, 0, 0, 1),
                (1, 1, 1, 0),
                (2, 0, 1, 2),
                (2, 1, 0, 2),
            ])
            .build()
            .unwrap();
        assert!(!fsm.is_deterministic());
        assert!(fsm.is_observable());
        let chain = TableChain::for_fsm(&fsm);
        assert!(chain.is_discrete());
        let w = chain.distinguishing_trace(&fsm, 1, 2);
        assert!(!w.is_empty());
        assert_ne!(
            fsm.apply_from(1, &w).output_traces(),
            fsm.apply_from(2, &w).output_traces()
        );
    }
}
