//! Differential evolution over the unit box ("differential evolution").
//!
//! Strategy `best1bin`: each trial vector is `best + F·(x_r0 - x_r1)` with
//! binomial crossover against the current member. The whole trial population
//! is built first and then scored in parallel; the solver call itself still
//! blocks until the search is done.
//!
//! The search samples the whole box and never looks at an initial guess.
//! Without a seed the RNG is seeded from the OS, so runs differ.

use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::fit::solve::SolverOutcome;
use crate::fit::tnc::{TncOptions, minimize_tnc};

#[derive(Debug, Clone, Copy)]
pub struct EvolutionOptions {
    /// Population size is `popsize · n_params`.
    pub popsize: usize,
    pub max_generations: usize,
    /// Per-generation mutation factor is drawn from `[lo, hi)`.
    pub mutation: (f64, f64),
    pub recombination: f64,
    /// Relative spread of the population energies at convergence.
    pub tol: f64,
    pub atol: f64,
    /// Refine the best member with the truncated-Newton solver.
    pub polish: bool,
    pub seed: Option<u64>,
}

impl Default for EvolutionOptions {
    fn default() -> Self {
        Self {
            popsize: 15,
            max_generations: 1000,
            mutation: (0.5, 1.0),
            recombination: 0.7,
            tol: 0.01,
            atol: 0.0,
            polish: true,
            seed: None,
        }
    }
}

pub fn differential_evolution<F>(f: F, n_params: usize, opts: &EvolutionOptions) -> SolverOutcome
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    let mut rng = match opts.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let np = (opts.popsize * n_params).max(5);
    let mut population = latin_hypercube(&mut rng, np, n_params);
    let mut energies = score(&f, &population);
    let mut evaluations = np;
    let mut best = argmin(&energies);

    let mut generations = 0;
    let mut converged = false;

    while generations < opts.max_generations {
        generations += 1;
        let scale = rng.gen_range(opts.mutation.0..opts.mutation.1);

        let trials: Vec<Vec<f64>> = (0..np)
            .map(|i| {
                let (r0, r1) = pick_two(&mut rng, np, i);
                let jrand = rng.gen_range(0..n_params);
                (0..n_params)
                    .map(|j| {
                        if j == jrand || rng.r#gen::<f64>() < opts.recombination {
                            let v = population[best][j] + scale * (population[r0][j] - population[r1][j]);
                            // Out-of-box coordinates are resampled uniformly.
                            if (0.0..=1.0).contains(&v) { v } else { rng.r#gen::<f64>() }
                        } else {
                            population[i][j]
                        }
                    })
                    .collect()
            })
            .collect();

        let trial_energies = score(&f, &trials);
        evaluations += np;

        for (i, (trial, energy)) in trials.into_iter().zip(trial_energies).enumerate() {
            if energy <= energies[i] {
                population[i] = trial;
                energies[i] = energy;
            }
        }
        best = argmin(&energies);

        if population_converged(&energies, opts.tol, opts.atol) {
            converged = true;
            break;
        }
    }

    let mut u = population[best].clone();
    let mut loss = energies[best];
    let mut message = if converged {
        "population energies converged".to_string()
    } else {
        "generation limit reached".to_string()
    };

    tracing::debug!(generations, evaluations, loss, converged, "differential evolution finished");

    if opts.polish && loss.is_finite() {
        let polished = minimize_tnc(&f, &u, &TncOptions::default());
        evaluations += polished.evaluations;
        if polished.loss < loss {
            u = polished.u;
            loss = polished.loss;
            message.push_str("; polished with truncated Newton");
        }
    }

    SolverOutcome {
        u,
        loss,
        iterations: generations,
        evaluations,
        converged,
        message,
    }
}

fn score<F>(f: &F, members: &[Vec<f64>]) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    members
        .par_iter()
        .map(|u| {
            let e = f(u);
            if e.is_nan() { f64::INFINITY } else { e }
        })
        .collect()
}

/// One point per stratum in every dimension, strata shuffled independently.
fn latin_hypercube(rng: &mut StdRng, np: usize, n_params: usize) -> Vec<Vec<f64>> {
    let mut population = vec![vec![0.0; n_params]; np];
    let mut strata: Vec<usize> = (0..np).collect();
    for j in 0..n_params {
        strata.shuffle(rng);
        for (member, &k) in population.iter_mut().zip(strata.iter()) {
            member[j] = (k as f64 + rng.r#gen::<f64>()) / np as f64;
        }
    }
    population
}

fn pick_two(rng: &mut StdRng, np: usize, exclude: usize) -> (usize, usize) {
    let mut r0 = rng.gen_range(0..np);
    while r0 == exclude {
        r0 = rng.gen_range(0..np);
    }
    let mut r1 = rng.gen_range(0..np);
    while r1 == exclude || r1 == r0 {
        r1 = rng.gen_range(0..np);
    }
    (r0, r1)
}

fn argmin(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v < values[best] {
            best = i;
        }
    }
    best
}

fn population_converged(energies: &[f64], tol: f64, atol: f64) -> bool {
    if energies.iter().any(|e| !e.is_finite()) {
        return false;
    }
    let n = energies.len() as f64;
    let mean = energies.iter().sum::<f64>() / n;
    let var = energies.iter().map(|e| (e - mean) * (e - mean)).sum::<f64>() / n;
    var.sqrt() <= atol + tol * mean.abs()
}
