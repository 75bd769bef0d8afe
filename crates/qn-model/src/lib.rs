//! qn-model: network description layer for queuenet.
//!
//! Provides:
//! - `QueueingNetworkModel`: validated, immutable-after-construction
//!   description of a closed multiclass network (stations, classes, exact
//!   service demands, population)
//! - result slots written by solvers (normalizing constant, throughputs,
//!   mean queue lengths), guarded until a solve has completed
//!
//! # Example
//!
//! ```
//! use qn_model::{QueueingNetworkModel, Station};
//!
//! let stations = vec![Station::queue("cpu", 1), Station::delay("think")];
//! let model = QueueingNetworkModel::from_f64_demands(
//!     stations,
//!     vec!["batch".into()],
//!     &[vec![0.05], vec![2.0]],
//!     vec![4],
//! )
//! .unwrap();
//!
//! assert_eq!(model.class_count(), 1);
//! assert!(model.normalizing_constant().is_err()); // not solved yet
//! ```

pub mod error;
pub mod model;

pub use error::{ModelError, ModelResult};
pub use model::{QueueingNetworkModel, Station, StationKind};
