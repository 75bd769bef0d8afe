//! Population basis: enumeration, total ordering and value storage.
//!
//! The unknowns of the recursion are indexed by pairs of a population-change
//! vector `t` (how many customers of each class are removed relative to the
//! target population) and an optional queue selector: `(t, None)` is the
//! plain normalizing constant at the shifted population, `(t, Some(k))` the
//! constant of the network with one extra copy of queue `k`. Vectors carry
//! support only in the first R−1 classes and remove at most M customers in
//! total, which gives the closed-form basis size (M+1)·C(M+R−1, M).
//!
//! The total order groups vectors by number of non-zero entries, then by the
//! rightmost non-zero class, then lexicographically. That grouping is what
//! lets the per-class systems select their sub-blocks as contiguous spans.

use std::cmp::Ordering;
use std::collections::HashMap;

use num_traits::{One, Zero};
use qn_core::{Rational, binomial, bounded_vectors};

use crate::error::{SolverError, SolverResult};

/// Integer vector recording, per class, how many customers have been removed
/// relative to the target population.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PopulationChangeVector(Vec<u32>);

impl PopulationChangeVector {
    pub fn zero(classes: usize) -> Self {
        Self(vec![0; classes])
    }

    pub fn from_entries(entries: Vec<u32>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[u32] {
        &self.0
    }

    pub fn entry(&self, class: usize) -> u32 {
        self.0[class]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of non-zero entries.
    pub fn nonzero_count(&self) -> usize {
        self.0.iter().filter(|&&v| v > 0).count()
    }

    /// Class index of the rightmost non-zero entry, if any.
    pub fn rightmost_nonzero(&self) -> Option<usize> {
        self.0.iter().rposition(|&v| v > 0)
    }

    /// Sum of all entries (total customers removed).
    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    /// Copy with one more customer of `class` removed.
    pub fn plus(&self, class: usize) -> Self {
        let mut entries = self.0.clone();
        entries[class] += 1;
        Self(entries)
    }

    /// Copy with one customer of `class` restored, or `None` if the entry is
    /// already zero.
    pub fn minus(&self, class: usize) -> Option<Self> {
        if self.0[class] == 0 {
            return None;
        }
        let mut entries = self.0.clone();
        entries[class] -= 1;
        Some(Self(entries))
    }
}

impl Ord for PopulationChangeVector {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.nonzero_count().cmp(&other.nonzero_count()))
            .then_with(|| self.rightmost_nonzero().cmp(&other.rightmost_nonzero()))
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for PopulationChangeVector {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Contiguous run of basis vectors sharing a non-zero count and rightmost
/// non-zero class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MicroSpan {
    pub rightmost: Option<usize>,
    pub start: usize,
    pub len: usize,
}

impl MicroSpan {
    pub fn positions(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }
}

/// All micro spans with the same non-zero count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroSpan {
    pub nonzeros: usize,
    pub micros: Vec<MicroSpan>,
}

/// Ordered basis with double-buffered exact values.
///
/// `current` holds the values of the population step being computed,
/// `previous` the completed step before it; [`Basis::start_step`] swaps the
/// two and clears the new write target, so a read of a slot the step has not
/// yet produced fails instead of observing stale history.
#[derive(Debug, Clone)]
pub struct Basis {
    queues: usize,
    classes: usize,
    vectors: Vec<PopulationChangeVector>,
    position: HashMap<PopulationChangeVector, usize>,
    macros: Vec<MacroSpan>,
    current: Vec<Option<Rational>>,
    previous: Vec<Option<Rational>>,
}

impl Basis {
    /// Enumerate and order the basis for `queues` queueing stations and
    /// `classes` customer classes, and verify the closed-form size.
    pub fn new(queues: usize, classes: usize) -> SolverResult<Self> {
        if classes == 0 {
            return Err(SolverError::Internal {
                what: "basis requested for zero classes".into(),
            });
        }

        // Support in the first R−1 classes, at most M removals in total.
        let mut vectors: Vec<PopulationChangeVector> = bounded_vectors(classes - 1, queues as u32)
            .into_iter()
            .map(|mut entries| {
                entries.push(0);
                PopulationChangeVector::from_entries(entries)
            })
            .collect();
        vectors.sort();

        let expected = binomial((queues + classes - 1) as u64, queues as u64);
        if vectors.len() as u128 != expected {
            return Err(SolverError::Internal {
                what: format!(
                    "basis enumeration produced {} vectors, closed form says {}",
                    vectors.len(),
                    expected
                ),
            });
        }

        let position: HashMap<_, _> = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), i))
            .collect();
        let macros = group_spans(&vectors);

        let slots = vectors.len() * (queues + 1);
        Ok(Self {
            queues,
            classes,
            vectors,
            position,
            macros,
            current: vec![None; slots],
            previous: vec![None; slots],
        })
    }

    pub fn queues(&self) -> usize {
        self.queues
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    /// Number of value slots: one per (vector, queue-selector) pair.
    pub fn size(&self) -> usize {
        self.vectors.len() * (self.queues + 1)
    }

    pub fn vector_count(&self) -> usize {
        self.vectors.len()
    }

    pub fn vector(&self, position: usize) -> &PopulationChangeVector {
        &self.vectors[position]
    }

    pub fn vectors(&self) -> &[PopulationChangeVector] {
        &self.vectors
    }

    pub fn macros(&self) -> &[MacroSpan] {
        &self.macros
    }

    /// Position of a vector in the total order.
    pub fn position_of(&self, vector: &PopulationChangeVector) -> SolverResult<usize> {
        self.position
            .get(vector)
            .copied()
            .ok_or_else(|| SolverError::Internal {
                what: format!("vector {:?} is not part of the basis ordering", vector.0),
            })
    }

    /// Flat index of a (vector, queue-selector) pair.
    pub fn index_of(
        &self,
        vector: &PopulationChangeVector,
        queue: Option<usize>,
    ) -> SolverResult<usize> {
        let position = self.position_of(vector)?;
        self.slot(position, queue)
    }

    /// Flat index from a known vector position.
    pub fn slot(&self, position: usize, queue: Option<usize>) -> SolverResult<usize> {
        if position >= self.vectors.len() {
            return Err(SolverError::Internal {
                what: format!("vector position {position} out of range"),
            });
        }
        let offset = match queue {
            None => 0,
            Some(k) if k < self.queues => k + 1,
            Some(k) => {
                return Err(SolverError::Internal {
                    what: format!("queue index {k} out of range for {} queues", self.queues),
                });
            }
        };
        Ok(position * (self.queues + 1) + offset)
    }

    /// Seed the current buffer with the empty-population values: 1 at the
    /// zero vector for every queue selector, 0 everywhere else.
    pub fn seed(&mut self) -> SolverResult<()> {
        for value in &mut self.current {
            *value = Some(Rational::zero());
        }
        let zero_vec = PopulationChangeVector::zero(self.classes);
        let base = self.index_of(&zero_vec, None)?;
        for offset in 0..=self.queues {
            self.current[base + offset] = Some(Rational::one());
        }
        Ok(())
    }

    /// Swap current and previous buffers and clear the new write target.
    /// Must be called exactly once per population step, before any write.
    pub fn start_step(&mut self) {
        std::mem::swap(&mut self.current, &mut self.previous);
        for value in &mut self.current {
            *value = None;
        }
    }

    /// Write a slot of the step in progress. Double writes are defects.
    pub fn set_current(&mut self, index: usize, value: Rational) -> SolverResult<()> {
        match self.current.get_mut(index) {
            None => Err(SolverError::Internal {
                what: format!("basis write at {index} beyond size {}", self.size()),
            }),
            Some(slot @ None) => {
                *slot = Some(value);
                Ok(())
            }
            Some(Some(_)) => Err(SolverError::Internal {
                what: format!("basis slot {index} written twice in one step"),
            }),
        }
    }

    /// Read a slot already produced by the step in progress.
    pub fn get_current(&self, index: usize) -> SolverResult<&Rational> {
        self.current
            .get(index)
            .and_then(|v| v.as_ref())
            .ok_or(SolverError::UndefinedValue { index })
    }

    /// Read a slot of the completed previous step.
    pub fn get_previous(&self, index: usize) -> SolverResult<&Rational> {
        self.previous
            .get(index)
            .and_then(|v| v.as_ref())
            .ok_or(SolverError::UndefinedValue { index })
    }
}

fn group_spans(vectors: &[PopulationChangeVector]) -> Vec<MacroSpan> {
    let mut macros: Vec<MacroSpan> = Vec::new();
    for (i, v) in vectors.iter().enumerate() {
        let h = v.nonzero_count();
        let rm = v.rightmost_nonzero();
        match macros.last_mut() {
            Some(m) if m.nonzeros == h => {}
            _ => macros.push(MacroSpan {
                nonzeros: h,
                micros: Vec::new(),
            }),
        }
        if let Some(m) = macros.last_mut() {
            match m.micros.last_mut() {
                Some(micro) if micro.rightmost == rm => micro.len += 1,
                _ => m.micros.push(MicroSpan {
                    rightmost: rm,
                    start: i,
                    len: 1,
                }),
            }
        }
    }
    macros
}
