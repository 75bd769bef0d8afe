//! Brute-force convolution oracle for small networks.
//!
//! Computes normalizing constants by folding per-station population
//! generating terms over every sub-population, with no shared code with the
//! recursion under test. Exponential in population, fine for the sizes
//! exercised here.

use std::collections::HashMap;

use num_bigint::BigInt;
use num_traits::{One, Zero};
use qn_core::Rational;
use qn_model::{QueueingNetworkModel, StationKind};

/// All population vectors `v` with `v[r] <= limit[r]`.
fn sub_populations(limit: &[u32]) -> Vec<Vec<u32>> {
    let mut out = vec![Vec::new()];
    for &cap in limit {
        let mut next = Vec::with_capacity(out.len() * (cap as usize + 1));
        for prefix in &out {
            for value in 0..=cap {
                let mut v = prefix.clone();
                v.push(value);
                next.push(v);
            }
        }
        out = next;
    }
    out
}

fn factorial(n: u32) -> BigInt {
    (1..=n).map(BigInt::from).product()
}

fn pow(base: &Rational, exp: u32) -> Rational {
    let mut acc = Rational::one();
    for _ in 0..exp {
        acc *= base;
    }
    acc
}

/// Single load-independent queue copy: multinomial over class orderings.
fn queue_term(demands: &[Rational], v: &[u32]) -> Rational {
    let total: u32 = v.iter().sum();
    let mut coeff = Rational::from_integer(factorial(total));
    for &count in v {
        coeff /= Rational::from_integer(factorial(count));
    }
    for (d, &count) in demands.iter().zip(v) {
        coeff *= pow(d, count);
    }
    coeff
}

/// Infinite-server aggregate.
fn delay_term(think: &[Rational], v: &[u32]) -> Rational {
    let mut acc = Rational::one();
    for (z, &count) in think.iter().zip(v) {
        acc *= pow(z, count) / Rational::from_integer(factorial(count));
    }
    acc
}

fn convolve(
    f: HashMap<Vec<u32>, Rational>,
    demands: &[Rational],
    limit: &[u32],
) -> HashMap<Vec<u32>, Rational> {
    let mut out = HashMap::new();
    for v in sub_populations(limit) {
        let mut acc = Rational::zero();
        for u in sub_populations(&v) {
            let rest: Vec<u32> = v.iter().zip(&u).map(|(a, b)| a - b).collect();
            acc += &f[&u] * queue_term(demands, &rest);
        }
        out.insert(v, acc);
    }
    out
}

/// Model flattened for the oracle: every station copy listed individually.
pub struct OracleNetwork {
    /// Demand row per single queue copy.
    pub queue_copies: Vec<Vec<Rational>>,
    /// Aggregate multiplicity-weighted delay demand per class.
    pub think: Vec<Rational>,
}

impl OracleNetwork {
    pub fn from_model(model: &QueueingNetworkModel) -> Self {
        let classes = model.class_count();
        let mut queue_copies = Vec::new();
        let mut think = vec![Rational::zero(); classes];
        for (s, station) in model.stations().iter().enumerate() {
            let row: Vec<Rational> = (0..classes).map(|r| model.demand(s, r).clone()).collect();
            match station.kind {
                StationKind::LoadIndependent => {
                    for _ in 0..station.multiplicity {
                        queue_copies.push(row.clone());
                    }
                }
                StationKind::Delay => {
                    let m = Rational::from_integer(BigInt::from(station.multiplicity));
                    for (acc, d) in think.iter_mut().zip(&row) {
                        *acc += d * &m;
                    }
                }
                StationKind::LoadDependent { .. } => {
                    panic!("oracle only covers load-independent and delay stations")
                }
            }
        }
        Self { queue_copies, think }
    }

    /// Normalizing constant at `population`, optionally with one extra copy
    /// of the given queue copy appended to the network.
    pub fn g(&self, population: &[u32], extra_copy: Option<usize>) -> Rational {
        let mut f: HashMap<Vec<u32>, Rational> = sub_populations(population)
            .into_iter()
            .map(|v| {
                let term = delay_term(&self.think, &v);
                (v, term)
            })
            .collect();
        for row in &self.queue_copies {
            f = convolve(f, row, population);
        }
        if let Some(i) = extra_copy {
            f = convolve(f, &self.queue_copies[i], population);
        }
        f[population].clone()
    }

    /// Exact mean throughput of `class`.
    pub fn throughput(&self, population: &[u32], class: usize) -> Rational {
        if population[class] == 0 {
            return Rational::zero();
        }
        let mut removed = population.to_vec();
        removed[class] -= 1;
        self.g(&removed, None) / self.g(population, None)
    }

    /// Exact mean class population at one queue copy.
    pub fn queue_length(&self, population: &[u32], copy: usize, class: usize) -> Rational {
        if population[class] == 0 {
            return Rational::zero();
        }
        let mut removed = population.to_vec();
        removed[class] -= 1;
        &self.queue_copies[copy][class] * self.g(&removed, Some(copy)) / self.g(population, None)
    }
}
