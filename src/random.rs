use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::fsm::{Fsm, FsmBuilder};

/// Draws a completely specified deterministic machine: for every state and
/// input, output and successor are sampled uniformly. The machine is not
/// necessarily minimal. Everything is derived from the explicit seed, so
/// equal seeds give equal machines.
pub fn random_dfsm(seed: u64, num_states: usize, max_input: usize, max_output: usize) -> Fsm {
    assert!(num_states > 0);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut transitions = Vec::with_capacity(num_states * (max_input + 1));
    for q in 0..num_states {
        for x in 0..=max_input {
            let y = rng.gen_range(0..=max_output);
            let target = rng.gen_range(0..num_states);
            transitions.push((q, x, y, target));
        }
    }
    let fsm = FsmBuilder::default()
        .with_transitions(transitions)
        .with_num_states(num_states)
        .with_max_input(max_input)
        .with_max_output(max_output)
        .initial(0)
        .build()
        .expect("drawn transitions are well-formed");
    debug!(seed, states = fsm.size(), "drew random machine");
    fsm
}

/// Draws a random machine as [`random_dfsm`] and minimises it, yielding a
/// prime machine. Minimisation may shrink the machine below the requested
/// state count.
pub fn random_prime_dfsm(
    seed: u64,
    num_states: usize,
    max_input: usize,
    max_output: usize,
) -> Fsm {
    random_dfsm(seed, num_states, max_input, max_output).minimise()
}

/// Derives a mutant of `fsm` by perturbing `output_faults` transition
/// outputs and `target_faults` transition targets at seeded random
/// positions. The mutant keeps the signature and state count of the
/// original; with at least one effective fault on a prime machine it is
/// guaranteed to be inequivalent.
pub fn mutant(seed: u64, fsm: &Fsm, output_faults: usize, target_faults: usize) -> Fsm {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut transitions: Vec<(usize, usize, usize, usize)> = fsm
        .transitions()
        .map(|t| {
            (
                t.source as usize,
                t.input as usize,
                t.output as usize,
                t.target as usize,
            )
        })
        .collect();
    for _ in 0..output_faults {
        let idx = rng.gen_range(0..transitions.len());
        let shift = rng.gen_range(0..=fsm.max_output() as usize);
        transitions[idx].2 = (transitions[idx].2 + shift.max(1)) % (fsm.max_output() as usize + 1);
    }
    for _ in 0..target_faults {
        let idx = rng.gen_range(0..transitions.len());
        let shift = rng.gen_range(1..fsm.size().max(2));
        transitions[idx].3 = (transitions[idx].3 + shift) % fsm.size();
    }
    FsmBuilder::default()
        .with_transitions(transitions)
        .with_num_states(fsm.size())
        .with_max_input(fsm.max_input() as usize)
        .with_max_output(fsm.max_output() as usize)
        .initial(fsm.initial() as usize)
        .build()
        .expect("mutating outputs and targets keeps the machine well-formed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_seeds_give_equal_machines() {
        let a = random_dfsm(42, 6, 2, 1);
        let b = random_dfsm(42, 6, 2, 1);
        assert_eq!(a, b);
        let c = random_dfsm(43, 6, 2, 1);
        assert_ne!(a, c);
    }

    #[test]
    fn drawn_machines_are_complete_and_deterministic() {
        for seed in 0..8 {
            let fsm = random_dfsm(seed, 5, 1, 1);
            assert!(fsm.is_deterministic());
            assert!(fsm.is_completely_defined());
            assert_eq!(fsm.size(), 5);
        }
    }

    #[test]
    fn minimised_draws_are_prime() {
        for seed in 0..8 {
            let fsm = random_prime_dfsm(seed, 6, 1, 1);
            assert!(fsm.is_prime());
            assert!(fsm.size() <= 6);
        }
    }

    #[test]
    fn mutants_differ_from_the_original() {
        let fsm = random_prime_dfsm(7, 5, 1, 1);
        let m = mutant(7, &fsm, 1, 0);
        assert_ne!(fsm, m);
        assert!(!fsm.language_equivalent(&m));
    }
}
