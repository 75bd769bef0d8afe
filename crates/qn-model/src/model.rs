//! Closed multiclass queueing network description.

use num_traits::Signed;
use qn_core::{Rational, decimal_string, rational_from_f64};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Service discipline of a station.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StationKind {
    /// Queueing station whose service rate does not vary with the number of
    /// jobs present.
    LoadIndependent,
    /// Queueing station with a per-queue-length service rate table
    /// (`rates[j]` is the rate multiplier with `j + 1` jobs present).
    LoadDependent { rates: Vec<f64> },
    /// Infinite-server (think-time) station.
    Delay,
}

/// One service station of the network.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Station {
    pub name: String,
    pub kind: StationKind,
    /// Number of identical copies of this station (>= 1).
    pub multiplicity: u32,
}

impl Station {
    /// Load-independent queueing station with the given multiplicity.
    pub fn queue(name: &str, multiplicity: u32) -> Self {
        Self {
            name: name.to_string(),
            kind: StationKind::LoadIndependent,
            multiplicity,
        }
    }

    /// Infinite-server station.
    pub fn delay(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: StationKind::Delay,
            multiplicity: 1,
        }
    }

    /// Load-dependent queueing station with a rate table.
    pub fn load_dependent(name: &str, rates: Vec<f64>) -> Self {
        Self {
            name: name.to_string(),
            kind: StationKind::LoadDependent { rates },
            multiplicity: 1,
        }
    }
}

/// Closed multiclass product-form network: stations, classes, exact service
/// demands and the target population vector.
///
/// The description is immutable after construction; only the result slots
/// are written later, by a solver. Result accessors fail with
/// [`ModelError::NotSolved`] until then.
#[derive(Debug, Clone)]
pub struct QueueingNetworkModel {
    stations: Vec<Station>,
    class_names: Vec<String>,
    /// Service demand per station and class, `demands[station][class]`.
    demands: Vec<Vec<Rational>>,
    /// Customers of each class circulating in the network.
    population: Vec<u32>,

    // Result slots, written by a solver.
    normalizing_constant: Option<Rational>,
    mean_throughputs: Option<Vec<f64>>,
    mean_queue_lengths: Option<Vec<Vec<f64>>>,
}

impl QueueingNetworkModel {
    /// Build a model from exact demands, validating every dimension and
    /// sign. `demands[station][class]`.
    pub fn new(
        stations: Vec<Station>,
        class_names: Vec<String>,
        demands: Vec<Vec<Rational>>,
        population: Vec<u32>,
    ) -> ModelResult<Self> {
        if class_names.is_empty() {
            return Err(ModelError::InvalidModel {
                what: "at least one customer class is required".into(),
            });
        }
        let classes = class_names.len();
        let station_count = stations.len();
        if population.len() != classes {
            return Err(ModelError::InvalidModel {
                what: format!(
                    "population length {} does not match class count {}",
                    population.len(),
                    classes
                ),
            });
        }
        if demands.len() != station_count {
            return Err(ModelError::InvalidModel {
                what: format!(
                    "demand matrix has {} rows for {} stations",
                    demands.len(),
                    station_count
                ),
            });
        }
        for (k, row) in demands.iter().enumerate() {
            if row.len() != classes {
                return Err(ModelError::InvalidModel {
                    what: format!(
                        "demand row for station '{}' has {} entries for {} classes",
                        stations[k].name,
                        row.len(),
                        classes
                    ),
                });
            }
            for (r, d) in row.iter().enumerate() {
                if d.is_negative() {
                    return Err(ModelError::InvalidModel {
                        what: format!(
                            "negative demand for station '{}', class '{}'",
                            stations[k].name, class_names[r]
                        ),
                    });
                }
            }
        }
        for station in &stations {
            if station.multiplicity == 0 {
                return Err(ModelError::InvalidModel {
                    what: format!("station '{}' has zero multiplicity", station.name),
                });
            }
            if let StationKind::LoadDependent { rates } = &station.kind {
                if rates.is_empty() || rates.iter().any(|r| !r.is_finite() || *r <= 0.0) {
                    return Err(ModelError::InvalidModel {
                        what: format!(
                            "station '{}' has an empty or non-positive rate table",
                            station.name
                        ),
                    });
                }
            }
        }
        Ok(Self {
            stations,
            class_names,
            demands,
            population,
            normalizing_constant: None,
            mean_throughputs: None,
            mean_queue_lengths: None,
        })
    }

    /// Convenience constructor converting `f64` demands exactly.
    pub fn from_f64_demands(
        stations: Vec<Station>,
        class_names: Vec<String>,
        demands: &[Vec<f64>],
        population: Vec<u32>,
    ) -> ModelResult<Self> {
        let exact = demands
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&d| {
                        rational_from_f64(d, "service demand").map_err(|e| {
                            ModelError::InvalidModel {
                                what: e.to_string(),
                            }
                        })
                    })
                    .collect::<ModelResult<Vec<_>>>()
            })
            .collect::<ModelResult<Vec<_>>>()?;
        Self::new(stations, class_names, exact, population)
    }

    /// Number of customer classes (R).
    pub fn class_count(&self) -> usize {
        self.class_names.len()
    }

    /// Number of stations of any kind (M).
    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn population(&self) -> &[u32] {
        &self.population
    }

    /// Service demand of `class` at `station`.
    pub fn demand(&self, station: usize, class: usize) -> &Rational {
        &self.demands[station][class]
    }

    pub fn demands(&self) -> &[Vec<Rational>] {
        &self.demands
    }

    /// Exact normalizing constant G, available after a solve.
    pub fn normalizing_constant(&self) -> ModelResult<&Rational> {
        self.normalizing_constant
            .as_ref()
            .ok_or(ModelError::NotSolved)
    }

    /// G rendered as a truncated decimal string, for display.
    pub fn normalizing_constant_decimal(&self, digits: u32) -> ModelResult<String> {
        Ok(decimal_string(self.normalizing_constant()?, digits))
    }

    /// Mean throughput per class, available after performance measures were
    /// computed.
    pub fn mean_throughputs(&self) -> ModelResult<&[f64]> {
        self.mean_throughputs
            .as_deref()
            .ok_or(ModelError::NotSolved)
    }

    /// Mean queue length per station and class
    /// (`lengths[station][class]`), available after performance measures
    /// were computed.
    pub fn mean_queue_lengths(&self) -> ModelResult<&[Vec<f64>]> {
        self.mean_queue_lengths
            .as_deref()
            .ok_or(ModelError::NotSolved)
    }

    /// Record the normalizing constant. Called by solvers.
    pub fn set_normalizing_constant(&mut self, g: Rational) {
        self.normalizing_constant = Some(g);
    }

    /// Record derived measures. Called by solvers.
    pub fn set_measures(&mut self, throughputs: Vec<f64>, queue_lengths: Vec<Vec<f64>>) {
        self.mean_throughputs = Some(throughputs);
        self.mean_queue_lengths = Some(queue_lengths);
    }

    /// Drop any previously written results.
    pub fn clear_results(&mut self) {
        self.normalizing_constant = None;
        self.mean_throughputs = None;
        self.mean_queue_lengths = None;
    }
}
