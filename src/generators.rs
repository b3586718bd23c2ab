use std::collections::VecDeque;

use tracing::debug;

use crate::characterization::{
    characterisation_set, harmonised_identification_sets, state_identification_sets,
};
use crate::distinguishing::{
    adaptive_distinguishing_sequence, preset_distinguishing_sequence, InputOutputTree,
};
use crate::fsm::tables::TableChain;
use crate::fsm::Fsm;
use crate::math;
use crate::trace::IOListContainer;
use crate::tree::{NodeId, Tree};
use crate::{Error, Input, StateId};

/// Which distinguishing construct the D-method applies. The flag is
/// authoritative: neither mode substitutes the other construct when its own
/// is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistinguishingMode {
    /// A single preset input word.
    Preset,
    /// The adaptive decision tree.
    Adaptive,
}

fn check_prime(fsm: &Fsm) -> Result<(), Error> {
    if !fsm.is_deterministic() {
        return Err(Error::NotPrime {
            reason: "the machine is nondeterministic",
        });
    }
    if !fsm.is_completely_defined() {
        return Err(Error::NotPrime {
            reason: "the machine is not completely defined",
        });
    }
    if !fsm.is_minimal() {
        return Err(Error::NotPrime {
            reason: "the machine is not minimal",
        });
    }
    Ok(())
}

fn finish(fsm: &Fsm, tree: &Tree) -> IOListContainer {
    IOListContainer::new(tree.test_cases().lists().to_vec(), fsm.max_input())
        .sorted_lexicographic()
}

/// The state cover `V`: a prefix-closed tree of input sequences reaching
/// every state, built by BFS from the initial state with inputs tried in
/// ascending order. The empty sequence covers the initial state.
pub fn state_cover(fsm: &Fsm) -> Tree {
    let mut tree = Tree::new();
    let mut seen: math::Set<StateId> = math::Set::from_iter([fsm.initial()]);
    let mut queue: VecDeque<(StateId, NodeId)> = VecDeque::from([(fsm.initial(), Tree::ROOT)]);
    while let Some((q, node)) = queue.pop_front() {
        for x in 0..=fsm.max_input() {
            for (_, target) in fsm.successors(q, x) {
                if seen.insert(target) {
                    let child = tree.ensure_child(node, x);
                    queue.push_back((target, child));
                }
            }
        }
    }
    tree
}

/// The transition cover `T = V ∪ V·Σ`: the state cover with every single
/// input appended at every node.
pub fn transition_cover(fsm: &Fsm) -> Tree {
    let mut tree = state_cover(fsm);
    tree.add_container(&IOListContainer::enumerate(fsm.max_input(), 1, 1));
    tree
}

/// Appends at every node the identification set of the state the node path
/// reaches — the `⊙` (distribute-and-concatenate) operator. Covering every
/// node, not just the leaves, keeps the empty extension of each prefix in
/// the product.
fn append_state_identification(fsm: &Fsm, tree: &mut Tree, sets: &[IOListContainer]) {
    let nodes: Vec<NodeId> = tree.node_ids().collect();
    for node in nodes {
        let path = tree.path_to(node);
        let state = fsm
            .state_after_det(&path)
            .expect("prime machines are completely defined");
        for list in sets[state as usize].lists() {
            tree.insert_at(node, list);
        }
    }
}

/// Appends at every node the adaptive input word that identifies the state
/// the node path reaches.
fn append_adaptive(fsm: &Fsm, tree: &mut Tree, ads: &InputOutputTree) {
    let nodes: Vec<NodeId> = tree.node_ids().collect();
    for node in nodes {
        let path = tree.path_to(node);
        let state = fsm
            .state_after_det(&path)
            .expect("prime machines are completely defined");
        let tail = ads.trace_for_state(fsm, state);
        tree.insert_at(node, tail.inputs().as_slice());
    }
}

/// The W-method: `V · Σᵢ^(≤k+1) · W` for a prime machine and up to `k`
/// additional states in the implementation. Complete in the fault domain of
/// machines with at most `n + k` states.
pub fn w_method(fsm: &Fsm, k: usize) -> Result<IOListContainer, Error> {
    check_prime(fsm)?;
    let chain = TableChain::for_fsm(fsm);
    let w = characterisation_set(fsm, &chain);
    let mut tree = state_cover(fsm);
    tree.add_container(&IOListContainer::enumerate(fsm.max_input(), 1, k + 1));
    tree.add_container(&w);
    let suite = finish(fsm, &tree);
    debug!(k, cases = suite.len(), "assembled W-method suite");
    Ok(suite)
}

/// The Wp-method: the union
/// `V · W  ∪  R · Σᵢ^(≤k) · W  ∪  R · Σᵢ^(≤k) ⊙ {W_{δ(q₀, r·σ)}}`, where
/// `R = T \ V` holds the proper transition-cover extensions and both
/// enumerations include the empty extension. Same fault domain as the
/// W-method with smaller suites.
pub fn wp_method(fsm: &Fsm, k: usize) -> Result<IOListContainer, Error> {
    check_prime(fsm)?;
    let chain = TableChain::for_fsm(fsm);
    let w = characterisation_set(fsm, &chain);
    let wis = state_identification_sets(fsm, &w);

    let scov = state_cover(fsm);
    let mut r = transition_cover(fsm);
    r.remove(&scov);
    if k > 0 {
        r.add_container(&IOListContainer::enumerate(fsm.max_input(), 1, k));
    }

    // V·W
    let mut suite_tree = scov;
    suite_tree.add_container(&w);

    // R·Σᵢ^(≤k)·W
    let mut identified_by_w = r.clone();
    identified_by_w.add_container(&w);
    suite_tree.union_tree(&identified_by_w);

    // R·Σᵢ^(≤k) ⊙ W_{δ(q₀, ·)}
    append_state_identification(fsm, &mut r, &wis);
    suite_tree.union_tree(&r);

    let suite = finish(fsm, &suite_tree);
    debug!(k, cases = suite.len(), "assembled Wp-method suite");
    Ok(suite)
}

/// The H-method: harmonised state identification. Like Wp, but every
/// sequence of `V · Σᵢ^(≤k+1)` is followed by the harmonised set `Hᵢ` of the
/// state it reaches; the harmonised sets are pruned from `W` so that any
/// two states share a separating member.
pub fn h_method(fsm: &Fsm, k: usize) -> Result<IOListContainer, Error> {
    check_prime(fsm)?;
    let chain = TableChain::for_fsm(fsm);
    let w = characterisation_set(fsm, &chain);
    let his = harmonised_identification_sets(fsm, &w);

    let mut tree = state_cover(fsm);
    tree.add_container(&IOListContainer::enumerate(fsm.max_input(), 1, k + 1));
    append_state_identification(fsm, &mut tree, &his);
    let suite = finish(fsm, &tree);
    debug!(k, cases = suite.len(), "assembled H-method suite");
    Ok(suite)
}

/// The T-method: the transition cover alone. A baseline without any state
/// identification, guaranteeing transition reachability only; it has no
/// preconditions beyond a well-formed machine.
pub fn t_method(fsm: &Fsm) -> IOListContainer {
    let suite = finish(fsm, &transition_cover(fsm));
    debug!(cases = suite.len(), "assembled T-method suite");
    suite
}

/// The D-method: `V · Σᵢ^(≤k)` followed by the distinguishing construct
/// selected by `mode`. Returns the empty suite when the machine lacks the
/// construct — callers must check and fall back to Wp or H.
pub fn d_method(
    fsm: &Fsm,
    k: usize,
    mode: DistinguishingMode,
) -> Result<IOListContainer, Error> {
    check_prime(fsm)?;
    let mut tree = state_cover(fsm);
    if k > 0 {
        tree.add_container(&IOListContainer::enumerate(fsm.max_input(), 1, k));
    }
    match mode {
        DistinguishingMode::Preset => {
            let Some(pds) = preset_distinguishing_sequence(fsm) else {
                debug!("no PDS, returning the empty suite");
                return Ok(IOListContainer::empty(fsm.max_input()));
            };
            tree.add_container(&IOListContainer::new(
                vec![pds.as_slice().to_vec()],
                fsm.max_input(),
            ));
        }
        DistinguishingMode::Adaptive => {
            let Some(ads) = adaptive_distinguishing_sequence(fsm) else {
                debug!("no ADS, returning the empty suite");
                return Ok(IOListContainer::empty(fsm.max_input()));
            };
            append_adaptive(fsm, &mut tree, &ads);
        }
    }
    let suite = finish(fsm, &tree);
    debug!(k, ?mode, cases = suite.len(), "assembled D-method suite");
    Ok(suite)
}

/// Longest proper border of `word`: the longest prefix that is also a
/// suffix.
fn longest_proper_border(word: &[Input]) -> usize {
    if word.is_empty() {
        return 0;
    }
    let mut fail = vec![0usize; word.len()];
    for i in 1..word.len() {
        let mut j = fail[i - 1];
        while j > 0 && word[i] != word[j] {
            j = fail[j - 1];
        }
        if word[i] == word[j] {
            j += 1;
        }
        fail[i] = j;
    }
    fail[word.len() - 1]
}

/// Hierons' variant of the preset D-method. When the distinguishing
/// sequence `w` overlaps itself — it has a non-empty border `b` — the
/// appended tail becomes `w[.. |w|−|b|] · w`, which applies `w` at two
/// overlapping positions and thereby also verifies the state reached
/// halfway through, at the cost of `|w|−|b|` extra symbols instead of a
/// separate full-length sequence. Without an overlap the method behaves
/// exactly as the preset D-method.
pub fn hierons_d_method(fsm: &Fsm, k: usize) -> Result<IOListContainer, Error> {
    check_prime(fsm)?;
    let Some(pds) = preset_distinguishing_sequence(fsm) else {
        debug!("no PDS, returning the empty suite");
        return Ok(IOListContainer::empty(fsm.max_input()));
    };
    let word = pds.as_slice();
    let border = longest_proper_border(word);
    let tail: Vec<Input> = if border == 0 {
        word.to_vec()
    } else {
        word[..word.len() - border]
            .iter()
            .chain(word)
            .copied()
            .collect()
    };

    let mut tree = state_cover(fsm);
    if k > 0 {
        tree.add_container(&IOListContainer::enumerate(fsm.max_input(), 1, k));
    }
    tree.add_container(&IOListContainer::new(vec![tail], fsm.max_input()));
    let suite = finish(fsm, &tree);
    debug!(k, border, cases = suite.len(), "assembled Hierons-D suite");
    Ok(suite)
}
