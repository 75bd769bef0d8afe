//! Exact normalizing-constant solver driver.
//!
//! Populates the network one class at a time and, within a class, one
//! customer at a time. Each class gets its diagonal block assembled and
//! decomposed once; every population step then re-solves the decomposition
//! against a fresh right-hand side. All arithmetic is exact, so two solves
//! of the same model produce bit-identical results.

use num_bigint::BigInt;
use num_traits::Zero;
use qn_core::{Rational, rational_to_f64};
use qn_model::{ModelError, QueueingNetworkModel};
use tracing::{debug, trace};

use crate::NetworkSolver;
use crate::basis::{Basis, PopulationChangeVector};
use crate::blocks::ClassSystem;
use crate::error::{SolverError, SolverResult};
use crate::workload::Workload;

/// Internal state kept between the normalizing-constant pass and the
/// performance-measure pass.
struct SolveState {
    g: Rational,
    throughputs: Vec<Rational>,
    queue_lengths: Option<Vec<Vec<Rational>>>,
    basis: Basis,
    load: Workload,
    /// Highest-index populated class, if any.
    last_class: Option<usize>,
}

/// Exact solver for closed multiclass product-form networks with
/// load-independent and delay stations.
#[derive(Default)]
pub struct ComomSolver {
    state: Option<SolveState>,
}

impl ComomSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact normalizing constant of the last solve.
    pub fn normalizing_constant(&self) -> Option<&Rational> {
        self.state.as_ref().map(|s| &s.g)
    }

    /// Exact per-class mean throughputs of the last solve.
    pub fn exact_mean_throughputs(&self) -> Option<&[Rational]> {
        self.state.as_ref().map(|s| s.throughputs.as_slice())
    }

    /// Exact per-station, per-class mean queue lengths, available after
    /// [`NetworkSolver::compute_performance_measures`].
    pub fn exact_mean_queue_lengths(&self) -> Option<&[Vec<Rational>]> {
        self.state.as_ref().and_then(|s| s.queue_lengths.as_deref())
    }

    /// Value of a basis slot at the full population shifted by one customer
    /// of `class`. Reads the previous buffer when `class` received the final
    /// recursion step, the current buffer otherwise.
    fn shifted_value<'a>(
        basis: &'a Basis,
        last_class: Option<usize>,
        class: usize,
        queue: Option<usize>,
    ) -> SolverResult<&'a Rational> {
        if last_class == Some(class) {
            let zero = PopulationChangeVector::zero(basis.classes());
            basis.get_previous(basis.index_of(&zero, queue)?)
        } else {
            let removal = PopulationChangeVector::zero(basis.classes()).plus(class);
            basis.get_current(basis.index_of(&removal, queue)?)
        }
    }
}

impl NetworkSolver for ComomSolver {
    fn compute_normalizing_constant(
        &mut self,
        model: &mut QueueingNetworkModel,
    ) -> SolverResult<()> {
        self.state = None;
        model.clear_results();

        let load = Workload::from_model(model)?;
        let queues = load.queue_count();
        let classes = load.class_count();
        debug!(queues, classes, "starting exact recursion");

        let mut basis = Basis::new(queues, classes)?;
        basis.seed()?;

        let mut last_class = None;
        for class in 0..classes {
            let target = load.population()[class];
            if target == 0 {
                trace!(class, "class is unpopulated, skipped");
                continue;
            }
            let system = ClassSystem::build(&basis, &load, class)?;
            debug!(class, target, dim = system.dim(), "class system assembled");
            for level in 1..=target {
                system.advance(&mut basis, level)?;
            }
            last_class = Some(class);
        }

        let zero = PopulationChangeVector::zero(classes);
        let g = basis.get_current(basis.index_of(&zero, None)?)?.clone();
        debug!("normalizing constant computed");

        // Mean throughput of class r is the ratio of the normalizing
        // constant with one class-r customer removed to the full one.
        let mut throughputs = Vec::with_capacity(classes);
        for r in 0..classes {
            let n_r = load.population()[r];
            if n_r == 0 {
                throughputs.push(Rational::zero());
            } else if queues == 0 {
                // Pure delay network: every customer is always in service.
                throughputs.push(Rational::from_integer(BigInt::from(n_r)) / load.delay(r));
            } else {
                let shifted = Self::shifted_value(&basis, last_class, r, None)?;
                throughputs.push(shifted / &g);
            }
        }

        model.set_normalizing_constant(g.clone());
        self.state = Some(SolveState {
            g,
            throughputs,
            queue_lengths: None,
            basis,
            load,
            last_class,
        });
        Ok(())
    }

    fn compute_performance_measures(
        &mut self,
        model: &mut QueueingNetworkModel,
    ) -> SolverResult<()> {
        let state = self
            .state
            .as_mut()
            .ok_or(SolverError::Model(ModelError::NotSolved))?;
        let load = &state.load;
        let classes = load.class_count();

        let mut lengths = vec![vec![Rational::zero(); classes]; load.station_count()];
        for r in 0..classes {
            if load.population()[r] == 0 {
                continue;
            }
            for k in 0..load.queue_count() {
                // Mean queue length at a queueing station follows from the
                // one-extra-copy constant at the shifted population.
                let plus =
                    Self::shifted_value(&state.basis, state.last_class, r, Some(k))?;
                lengths[load.queue_station(k)][r] =
                    load.weighted_demand(k, r) * plus / &state.g;
            }
            for delay in load.delay_stations() {
                // Delay stations never queue: residents equal demand times
                // throughput.
                lengths[delay.station][r] =
                    &delay.weighted_demands[r] * &state.throughputs[r];
            }
        }

        let throughputs_f64: Vec<f64> = state.throughputs.iter().map(rational_to_f64).collect();
        let lengths_f64: Vec<Vec<f64>> = lengths
            .iter()
            .map(|row| row.iter().map(rational_to_f64).collect())
            .collect();
        model.set_measures(throughputs_f64, lengths_f64);
        state.queue_lengths = Some(lengths);
        Ok(())
    }
}
