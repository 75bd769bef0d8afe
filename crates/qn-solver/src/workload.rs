//! Model preprocessing for the exact recursion.
//!
//! Splits a validated [`QueueingNetworkModel`] into the shape the recursion
//! works on: the list of load-independent queueing stations with their
//! demands and multiplicities, and the per-class delay aggregate over all
//! infinite-server stations.

use num_traits::Zero;
use qn_core::Rational;
use qn_model::{ModelError, QueueingNetworkModel, StationKind};

use crate::error::{SolverError, SolverResult};

/// A delay station kept around for per-station queue-length reporting.
#[derive(Debug, Clone)]
pub struct DelayStation {
    /// Index of the station in the original model.
    pub station: usize,
    /// Multiplicity-weighted demand per class.
    pub weighted_demands: Vec<Rational>,
}

/// Recursion-ready view of a model.
#[derive(Debug, Clone)]
pub struct Workload {
    classes: usize,
    population: Vec<u32>,
    /// Per queueing station: original station index.
    queue_station: Vec<usize>,
    /// Per queueing station: demand per class.
    demands: Vec<Vec<Rational>>,
    /// Per queueing station: multiplicity-weighted demand per class.
    weighted_demands: Vec<Vec<Rational>>,
    delay_stations: Vec<DelayStation>,
    /// Aggregate delay demand per class.
    delay: Vec<Rational>,
    /// Station count of the original model (queueing + delay).
    station_count: usize,
}

impl Workload {
    pub fn from_model(model: &QueueingNetworkModel) -> SolverResult<Self> {
        let classes = model.class_count();
        let mut queue_station = Vec::new();
        let mut demands = Vec::new();
        let mut weighted_demands = Vec::new();
        let mut delay_stations = Vec::new();
        let mut delay = vec![Rational::zero(); classes];

        for (s, station) in model.stations().iter().enumerate() {
            let multiplicity =
                Rational::from_integer(num_bigint::BigInt::from(station.multiplicity));
            let row: Vec<Rational> = (0..classes).map(|r| model.demand(s, r).clone()).collect();
            let weighted: Vec<Rational> = row.iter().map(|d| d * &multiplicity).collect();
            match &station.kind {
                StationKind::LoadIndependent => {
                    queue_station.push(s);
                    demands.push(row);
                    weighted_demands.push(weighted);
                }
                StationKind::Delay => {
                    for (r, w) in weighted.iter().enumerate() {
                        delay[r] += w;
                    }
                    delay_stations.push(DelayStation {
                        station: s,
                        weighted_demands: weighted,
                    });
                }
                StationKind::LoadDependent { .. } => {
                    return Err(SolverError::Model(ModelError::InvalidModel {
                        what: format!(
                            "station '{}' is load-dependent; the normalizing-constant \
                             recursion covers load-independent and delay stations",
                            station.name
                        ),
                    }));
                }
            }
        }

        // Every populated class needs service capacity somewhere, otherwise
        // the normalizing constant degenerates to zero. And when queueing
        // stations exist, each populated class must visit at least one of
        // them: a class seen only by delay stations leaves the queue-
        // augmented constants with no recoverable relation.
        for r in 0..classes {
            if model.population()[r] == 0 {
                continue;
            }
            let total_queue: Rational = demands.iter().map(|row| row[r].clone()).sum();
            if total_queue.is_zero() && delay[r].is_zero() {
                return Err(SolverError::Model(ModelError::InvalidModel {
                    what: format!(
                        "class '{}' has zero demand at every station",
                        model.class_names()[r]
                    ),
                }));
            }
            if total_queue.is_zero() && !queue_station.is_empty() {
                return Err(SolverError::Model(ModelError::InvalidModel {
                    what: format!(
                        "class '{}' has delay demand only; every populated class \
                         must visit a queueing station",
                        model.class_names()[r]
                    ),
                }));
            }
        }

        Ok(Self {
            classes,
            population: model.population().to_vec(),
            queue_station,
            demands,
            weighted_demands,
            delay_stations,
            delay,
            station_count: model.station_count(),
        })
    }

    pub fn class_count(&self) -> usize {
        self.classes
    }

    /// Number of queueing stations (M in the recursion).
    pub fn queue_count(&self) -> usize {
        self.queue_station.len()
    }

    pub fn station_count(&self) -> usize {
        self.station_count
    }

    pub fn population(&self) -> &[u32] {
        &self.population
    }

    /// Original model station index of queue `k`.
    pub fn queue_station(&self, k: usize) -> usize {
        self.queue_station[k]
    }

    /// Demand of `class` at queue `k`.
    pub fn demand(&self, k: usize, class: usize) -> &Rational {
        &self.demands[k][class]
    }

    /// Multiplicity-weighted demand of `class` at queue `k`.
    pub fn weighted_demand(&self, k: usize, class: usize) -> &Rational {
        &self.weighted_demands[k][class]
    }

    pub fn delay_stations(&self) -> &[DelayStation] {
        &self.delay_stations
    }

    /// Aggregate delay demand of `class`.
    pub fn delay(&self, class: usize) -> &Rational {
        &self.delay[class]
    }
}
