//! Exact solver for closed multiclass product-form queueing networks.
//!
//! Computes the normalizing constant and the derived mean performance
//! measures with arbitrary-precision rational arithmetic. The recursion
//! adds one customer class at a time; each class contributes a dense linear
//! system whose coefficients depend only on service demands, so it is
//! LUP-decomposed once and re-solved at every population step of that
//! class.
//!
//! ```
//! use qn_model::{QueueingNetworkModel, Station};
//! use qn_solver::{ComomSolver, NetworkSolver};
//!
//! let mut model = QueueingNetworkModel::from_f64_demands(
//!     vec![Station::queue("cpu", 1), Station::delay("think")],
//!     vec!["batch".into()],
//!     &[vec![0.05], vec![2.0]],
//!     vec![4],
//! )
//! .unwrap();
//!
//! let mut solver = ComomSolver::new();
//! solver.compute_normalizing_constant(&mut model).unwrap();
//! solver.compute_performance_measures(&mut model).unwrap();
//! println!("G = {}", model.normalizing_constant_decimal(6).unwrap());
//! ```

pub mod basis;
pub mod blocks;
pub mod comom;
pub mod error;
pub mod lup;
pub mod workload;

pub use blocks::BlockFamily;
pub use comom::ComomSolver;
pub use error::{SolverError, SolverResult};

use qn_model::QueueingNetworkModel;

/// A solver that writes its results into the model it solves.
pub trait NetworkSolver {
    /// Compute the exact normalizing constant at the model's population and
    /// record it in the model.
    fn compute_normalizing_constant(
        &mut self,
        model: &mut QueueingNetworkModel,
    ) -> SolverResult<()>;

    /// Derive mean throughputs and queue lengths from a completed
    /// normalizing-constant pass and record them in the model.
    fn compute_performance_measures(
        &mut self,
        model: &mut QueueingNetworkModel,
    ) -> SolverResult<()>;
}
