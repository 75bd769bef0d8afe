//! Per-class block structure of the recursion's linear system.
//!
//! For the class currently being populated, the basis splits into three
//! span-selected groups:
//!
//! - vectors whose rightmost removal class lies beyond the current class,
//!   or that remove from a class holding no customers, are pinned to zero
//!   (their shifted population is not reachable);
//! - vectors whose rightmost removal class equals the current class are
//!   carry-forward copies of the previous population step;
//! - the remaining "active" vectors carry the step's real work: their plain
//!   constants follow from the current class's population constraint applied
//!   to previous-step values, and their queue-augmented constants form a
//!   square dense system whose coefficients depend only on demands and
//!   multiplicities. That diagonal block is LUP-decomposed once per class
//!   and re-solved at every population step.
//!
//! The dense rows are of two kinds: convolution identities (one per queue
//! per active vector that can still absorb a removal) and the population
//! constraints of the already-completed classes. Everything those rows
//! couple to outside the unknowns is accumulated into the right-hand side,
//! from either the current buffer (plain constants produced earlier in the
//! same step) or the previous buffer.

use std::fmt;

use num_bigint::BigInt;
use num_traits::Zero;
use qn_core::Rational;

use crate::basis::Basis;
use crate::error::{SolverError, SolverResult};
use crate::lup::{LupDecomposition, SquareMatrix};
use crate::workload::Workload;

/// Structural families of the per-class system, named in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFamily {
    /// Convolution identity rows (adding one station copy).
    GlobalBalanceA,
    /// Population-constraint rows of already-completed classes.
    GlobalBalanceB,
    /// Literal copies and previous-buffer lookups.
    CarryForward,
    /// Population constraint of the class in progress.
    LocalBalance,
    /// The dense decomposed block itself.
    Diagonal,
}

impl fmt::Display for BlockFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockFamily::GlobalBalanceA => "global balance A",
            BlockFamily::GlobalBalanceB => "global balance B",
            BlockFamily::CarryForward => "carry-forward",
            BlockFamily::LocalBalance => "local balance",
            BlockFamily::Diagonal => "diagonal",
        };
        f.write_str(name)
    }
}

/// Which buffer a right-hand-side term reads from.
#[derive(Debug, Clone, Copy)]
enum Source {
    Current(usize),
    Previous(usize),
}

#[derive(Debug, Clone)]
struct RhsTerm {
    source: Source,
    coeff: Rational,
}

/// Population-constraint row producing one plain constant directly from
/// previous-step values (after division by the class population level).
#[derive(Debug, Clone)]
struct BalanceRow {
    target: usize,
    terms: Vec<(usize, Rational)>,
}

/// Solvable system for one class: built at the class's first population
/// step, reused for every further step of the same class.
#[derive(Debug, Clone)]
pub struct ClassSystem {
    class: usize,
    /// Basis slot of each dense-system column.
    unknown_slots: Vec<usize>,
    lup: LupDecomposition,
    /// Right-hand-side accumulation recipe per dense row.
    rows: Vec<Vec<RhsTerm>>,
    balance: Vec<BalanceRow>,
    /// (destination, source) slot pairs copied from the previous step.
    carries: Vec<(usize, usize)>,
    /// Slots pinned to zero (removal classes beyond the current one).
    zero_slots: Vec<usize>,
}

impl ClassSystem {
    /// Select sub-blocks for `class`, assemble the dense diagonal block and
    /// decompose it.
    pub fn build(basis: &Basis, load: &Workload, class: usize) -> SolverResult<Self> {
        let queues = basis.queues();
        let per = queues + 1;
        let population = load.population();

        // A removal from a class holding no customers pushes the shifted
        // population negative; every constant there is identically zero.
        let reachable = |pos: usize| {
            basis
                .vector(pos)
                .entries()
                .iter()
                .enumerate()
                .all(|(r, &removed)| removed == 0 || population[r] > 0)
        };

        let mut active: Vec<usize> = Vec::new();
        let mut carry_positions: Vec<usize> = Vec::new();
        let mut zero_positions: Vec<usize> = Vec::new();
        for macro_span in basis.macros() {
            for micro in &macro_span.micros {
                match micro.rightmost {
                    Some(j) if j == class => carry_positions.extend(micro.positions()),
                    Some(j) if j > class => zero_positions.extend(micro.positions()),
                    _ => {
                        for pos in micro.positions() {
                            if reachable(pos) {
                                active.push(pos);
                            } else {
                                zero_positions.push(pos);
                            }
                        }
                    }
                }
            }
        }

        // Dense columns: queue-augmented entries of the active vectors.
        let mut column_of: Vec<Option<usize>> = vec![None; basis.size()];
        let mut unknown_slots = Vec::with_capacity(active.len() * queues);
        for &pos in &active {
            for k in 0..queues {
                let slot = basis.slot(pos, Some(k))?;
                column_of[slot] = Some(unknown_slots.len());
                unknown_slots.push(slot);
            }
        }
        let dim = unknown_slots.len();

        let column = |basis: &Basis, pos: usize, k: usize| -> SolverResult<usize> {
            let slot = basis.slot(pos, Some(k))?;
            column_of[slot].ok_or_else(|| SolverError::Internal {
                what: format!(
                    "slot {slot} is not a {} column at class {class}",
                    BlockFamily::Diagonal
                ),
            })
        };

        let mut matrix = SquareMatrix::zeros(dim);
        let mut rows: Vec<Vec<RhsTerm>> = Vec::with_capacity(dim);

        // Convolution rows: only vectors that can still absorb one more
        // removal have all their couplings inside the basis.
        for &pos in &active {
            let vector = basis.vector(pos).clone();
            if vector.total() as usize >= queues {
                continue;
            }
            for k in 0..queues {
                let row = rows.len();
                if row >= dim {
                    return Err(block_count_defect(class, dim));
                }
                *matrix.at_mut(row, column(basis, pos, k)?) += Rational::from_integer(1.into());
                for s in 0..class {
                    if population[s] == 0 {
                        continue;
                    }
                    let demand = load.demand(k, s);
                    if demand.is_zero() {
                        continue;
                    }
                    let deeper = basis.position_of(&vector.plus(s))?;
                    *matrix.at_mut(row, column(basis, deeper, k)?) -= demand;
                }

                let mut terms = vec![RhsTerm {
                    source: Source::Current(basis.slot(pos, None)?),
                    coeff: Rational::from_integer(1.into()),
                }];
                let own_demand = load.demand(k, class);
                if !own_demand.is_zero() {
                    terms.push(RhsTerm {
                        source: Source::Previous(basis.slot(pos, Some(k))?),
                        coeff: own_demand.clone(),
                    });
                }
                rows.push(terms);
            }
        }

        // Population constraints of completed classes. Unpopulated classes
        // contribute no constraint: their customers never entered.
        for completed in 0..class {
            if population[completed] == 0 {
                continue;
            }
            for &pos in &active {
                let vector = basis.vector(pos).clone();
                if vector.total() as usize >= queues {
                    continue;
                }
                let row = rows.len();
                if row >= dim {
                    return Err(block_count_defect(class, dim));
                }
                let deeper = basis.position_of(&vector.plus(completed))?;
                for k in 0..queues {
                    let weighted = load.weighted_demand(k, completed);
                    if weighted.is_zero() {
                        continue;
                    }
                    *matrix.at_mut(row, column(basis, deeper, k)?) += weighted;
                }

                let remaining = i64::from(load.population()[completed])
                    - i64::from(vector.entry(completed));
                let mut terms = vec![RhsTerm {
                    source: Source::Current(basis.slot(pos, None)?),
                    coeff: Rational::from_integer(BigInt::from(remaining)),
                }];
                let think = load.delay(completed);
                if !think.is_zero() {
                    terms.push(RhsTerm {
                        source: Source::Current(basis.slot(deeper, None)?),
                        coeff: -think.clone(),
                    });
                }
                rows.push(terms);
            }
        }

        if rows.len() != dim {
            return Err(block_count_defect(class, dim));
        }

        let lup = LupDecomposition::decompose(matrix).map_err(|_| {
            SolverError::InconsistentLinearSystem {
                class,
                population: 1,
                family: BlockFamily::Diagonal,
            }
        })?;

        // Population constraint of the class in progress: produces every
        // plain constant of the step from previous-step values.
        let mut balance = Vec::with_capacity(active.len());
        for &pos in &active {
            let mut terms = Vec::new();
            let think = load.delay(class);
            if !think.is_zero() {
                terms.push((basis.slot(pos, None)?, think.clone()));
            }
            for k in 0..queues {
                let weighted = load.weighted_demand(k, class);
                if !weighted.is_zero() {
                    terms.push((basis.slot(pos, Some(k))?, weighted.clone()));
                }
            }
            balance.push(BalanceRow {
                target: basis.slot(pos, None)?,
                terms,
            });
        }

        // Carry-forward copies: one fewer removal of the current class at
        // the previous population level is the same shifted population.
        let mut carries = Vec::with_capacity(carry_positions.len() * per);
        for &pos in &carry_positions {
            let shallower = basis
                .vector(pos)
                .minus(class)
                .ok_or_else(|| SolverError::Internal {
                    what: format!(
                        "{} selection chose a vector without class-{class} removals",
                        BlockFamily::CarryForward
                    ),
                })?;
            let src = basis.position_of(&shallower)?;
            for q in 0..per {
                carries.push((pos * per + q, src * per + q));
            }
        }

        let mut zero_slots = Vec::with_capacity(zero_positions.len() * per);
        for &pos in &zero_positions {
            for q in 0..per {
                zero_slots.push(pos * per + q);
            }
        }

        Ok(Self {
            class,
            unknown_slots,
            lup,
            rows,
            balance,
            carries,
            zero_slots,
        })
    }

    /// Dimension of the dense diagonal block.
    pub fn dim(&self) -> usize {
        self.unknown_slots.len()
    }

    pub fn class(&self) -> usize {
        self.class
    }

    /// Advance the recursion by one customer of the system's class.
    ///
    /// `level` is the class population after this step (1-based).
    pub fn advance(&self, basis: &mut Basis, level: u32) -> SolverResult<()> {
        basis.start_step();
        let level_value = Rational::from_integer(BigInt::from(level));

        // Plain constants from the previous step.
        for row in &self.balance {
            let mut acc = Rational::zero();
            for (slot, coeff) in &row.terms {
                acc += coeff * basis.get_previous(*slot)?;
            }
            basis.set_current(row.target, acc / &level_value)?;
        }

        // Carry-forward copies and unreachable-population zeros.
        for &(dst, src) in &self.carries {
            let value = basis.get_previous(src)?.clone();
            basis.set_current(dst, value)?;
        }
        for &slot in &self.zero_slots {
            basis.set_current(slot, Rational::zero())?;
        }

        // Right-hand side, then the dense solve.
        let mut rhs = Vec::with_capacity(self.rows.len());
        for terms in &self.rows {
            let mut acc = Rational::zero();
            for term in terms {
                let value = match term.source {
                    Source::Current(slot) => basis.get_current(slot)?,
                    Source::Previous(slot) => basis.get_previous(slot)?,
                };
                acc += &term.coeff * value;
            }
            rhs.push(acc);
        }
        let solution = self.lup.solve(&rhs)?;
        for (value, &slot) in solution.into_iter().zip(&self.unknown_slots) {
            basis.set_current(slot, value)?;
        }
        Ok(())
    }
}

fn block_count_defect(class: usize, dim: usize) -> SolverError {
    SolverError::Internal {
        what: format!(
            "{} block at class {class} is not square (dimension {dim})",
            BlockFamily::Diagonal
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qn_core::{binomial, rational_from_ratio};
    use qn_model::{QueueingNetworkModel, Station};

    fn r(n: i64, d: i64) -> Rational {
        rational_from_ratio(n, d).unwrap()
    }

    /// Hand-picked patternless demands. Linear structure across the class
    /// columns (affine or proportional) lands on the singular variety of
    /// the later classes' diagonal blocks, so the values avoid any such
    /// relation.
    fn generic_workload(queues: usize, classes: usize, population: u32) -> Workload {
        const DEMANDS: [[(i64, i64); 4]; 3] = [
            [(1, 13), (3, 29), (7, 43), (11, 59)],
            [(2, 17), (5, 31), (1, 47), (13, 61)],
            [(3, 19), (7, 37), (9, 53), (4, 67)],
        ];
        let stations: Vec<Station> = (0..queues)
            .map(|k| Station::queue(&format!("q{k}"), 1))
            .collect();
        let demands: Vec<Vec<Rational>> = (0..queues)
            .map(|k| {
                (0..classes)
                    .map(|c| {
                        let (numer, denom) = DEMANDS[k][c];
                        r(numer, denom)
                    })
                    .collect()
            })
            .collect();
        let model = QueueingNetworkModel::new(
            stations,
            (0..classes).map(|c| format!("c{c}")).collect(),
            demands,
            vec![population; classes],
        )
        .unwrap();
        Workload::from_model(&model).unwrap()
    }

    #[test]
    fn diagonal_block_is_square_and_decomposes() {
        for queues in 1..4usize {
            for classes in 1..4usize {
                let load = generic_workload(queues, classes, 3);
                let basis = Basis::new(queues, classes).unwrap();
                for class in 0..classes {
                    let system = ClassSystem::build(&basis, &load, class).unwrap();
                    // Unknowns: queue-augmented entries of vectors whose
                    // removals stay within the completed classes.
                    let active = basis
                        .vectors()
                        .iter()
                        .filter(|v| v.rightmost_nonzero().is_none_or(|j| j < class))
                        .count();
                    assert_eq!(system.dim(), active * queues);
                }
            }
        }
    }

    #[test]
    fn first_class_block_spans_only_the_zero_vector() {
        let load = generic_workload(3, 2, 2);
        let basis = Basis::new(3, 2).unwrap();
        let system = ClassSystem::build(&basis, &load, 0).unwrap();
        assert_eq!(system.dim(), 3);
    }

    #[test]
    fn active_vector_count_matches_binomial_form() {
        // Active vectors for class c remove from c classes only:
        // C(M + c, c) of them.
        let queues = 3usize;
        let classes = 4usize;
        let load = generic_workload(queues, classes, 2);
        let basis = Basis::new(queues, classes).unwrap();
        for class in 0..classes {
            let system = ClassSystem::build(&basis, &load, class).unwrap();
            let expected = binomial((queues + class) as u64, class as u64) as usize;
            assert_eq!(system.dim(), expected * queues);
        }
    }

    #[test]
    fn zero_demand_column_makes_the_block_singular() {
        // A class that never visits one of the stations leaves a
        // queue-augmented unknown unreachable at the next class.
        let model = QueueingNetworkModel::new(
            vec![Station::queue("q0", 1), Station::queue("q1", 1)],
            vec!["a".into(), "b".into()],
            vec![vec![r(0, 1), r(1, 5)], vec![r(1, 4), r(1, 5)]],
            vec![2, 2],
        )
        .unwrap();
        let load = Workload::from_model(&model).unwrap();
        let basis = Basis::new(2, 2).unwrap();
        assert!(ClassSystem::build(&basis, &load, 0).is_ok());
        assert!(matches!(
            ClassSystem::build(&basis, &load, 1),
            Err(SolverError::InconsistentLinearSystem {
                class: 1,
                family: BlockFamily::Diagonal,
                ..
            })
        ));
    }

    #[test]
    fn affine_class_columns_make_a_later_block_singular() {
        // Demand columns in arithmetic progression (class c demand is
        // 1 + 3k + 7c) satisfy col2 = 2*col1 - col0, which degenerates the
        // class-2 block even though all entries are distinct and positive.
        let demands: Vec<Vec<Rational>> = (0..2i64)
            .map(|k| (0..3i64).map(|c| r(1 + 3 * k + 7 * c, 100)).collect())
            .collect();
        let model = QueueingNetworkModel::new(
            vec![Station::queue("q0", 1), Station::queue("q1", 1)],
            vec!["a".into(), "b".into(), "c".into()],
            demands,
            vec![2, 2, 2],
        )
        .unwrap();
        let load = Workload::from_model(&model).unwrap();
        let basis = Basis::new(2, 3).unwrap();
        assert!(ClassSystem::build(&basis, &load, 1).is_ok());
        assert!(matches!(
            ClassSystem::build(&basis, &load, 2),
            Err(SolverError::InconsistentLinearSystem { class: 2, .. })
        ));
    }

    #[test]
    fn empty_leading_class_shrinks_the_block() {
        // Class 0 holds no customers: removals from it are unreachable, so
        // only the zero vector stays active and the block still decomposes
        // despite the idle class's all-zero demands.
        let model = QueueingNetworkModel::new(
            vec![Station::queue("q0", 1), Station::queue("q1", 1)],
            vec!["idle".into(), "busy".into()],
            vec![vec![r(0, 1), r(1, 10)], vec![r(0, 1), r(1, 6)]],
            vec![0, 2],
        )
        .unwrap();
        let load = Workload::from_model(&model).unwrap();
        let basis = Basis::new(2, 2).unwrap();
        let system = ClassSystem::build(&basis, &load, 1).unwrap();
        assert_eq!(system.dim(), 2);
    }

    #[test]
    fn coinciding_demands_make_the_block_singular() {
        // Equal first-class demands at both stations are the classic
        // degenerate case for the dense block of the second class.
        let model = QueueingNetworkModel::new(
            vec![Station::queue("q0", 1), Station::queue("q1", 1)],
            vec!["a".into(), "b".into()],
            vec![vec![r(1, 4), r(1, 5)], vec![r(1, 4), r(1, 7)]],
            vec![2, 2],
        )
        .unwrap();
        let load = Workload::from_model(&model).unwrap();
        let basis = Basis::new(2, 2).unwrap();
        assert!(matches!(
            ClassSystem::build(&basis, &load, 1),
            Err(SolverError::InconsistentLinearSystem { .. })
        ));
    }
}
