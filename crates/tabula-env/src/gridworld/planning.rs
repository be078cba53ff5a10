//! Dynamic-programming planners over the known gridworld model
//!
//! Synchronous sweeps: each sweep reads the previous value grid and writes a
//! fresh one. Terminal cells always hold value 0.

use ndarray::Array2;
use serde::Serialize;
use tracing::debug;

use tabula_core::DiscreteAction;

use super::{Cell, GridWorld, Move};

/// State-value function indexed by `[row, col]`
pub type ValueGrid = Array2<f64>;

/// Backed-up values closer than this are treated as ties
pub const TIE_TOLERANCE: f64 = 1e-6;

/// Policy that picks uniformly among a set of moves per cell.
///
/// Terminal cells carry no moves.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPolicy {
    moves: Array2<Vec<Move>>,
}

impl GridPolicy {
    pub fn empty(rows: usize, cols: usize) -> Self {
        Self {
            moves: Array2::from_elem((rows, cols), Vec::new()),
        }
    }

    /// Equiprobable random policy
    pub fn uniform(world: &GridWorld) -> Self {
        let mut policy = Self::empty(world.rows(), world.cols());
        for cell in world.open_cells() {
            policy.set(cell, Move::ALL.to_vec());
        }
        policy
    }

    pub fn set(&mut self, cell: Cell, moves: Vec<Move>) {
        self.moves[[cell.row, cell.col]] = moves;
    }

    pub fn moves(&self, cell: Cell) -> &[Move] {
        &self.moves[[cell.row, cell.col]]
    }

    pub fn probability(&self, cell: Cell, mv: Move) -> f64 {
        let moves = self.moves(cell);
        if moves.contains(&mv) {
            1.0 / moves.len() as f64
        } else {
            0.0
        }
    }

    /// One line per row, cells separated by spaces, `.` for terminal cells
    pub fn render(&self) -> String {
        self.moves
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .map(|moves| {
                        if moves.is_empty() {
                            ".".to_string()
                        } else {
                            moves.iter().map(|mv| mv.symbol()).collect()
                        }
                    })
                    .collect::<Vec<String>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One-step lookahead value of taking `mv` in `cell`
pub fn backup(world: &GridWorld, values: &ValueGrid, cell: Cell, mv: Move) -> f64 {
    let next = world.neighbor(cell, mv);
    let next_value = if world.is_terminal(&next) {
        0.0
    } else {
        values[[next.row, next.col]]
    };
    world.step_penalty() + next_value
}

fn max_abs_diff(a: &ValueGrid, b: &ValueGrid) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

/// Result of a run of synchronous sweeps
#[derive(Debug, Clone)]
pub struct Sweeps {
    pub values: ValueGrid,
    pub sweeps: usize,
    /// Whether the last sweep changed no value by more than `theta`
    pub converged: bool,
}

/// Iterative policy evaluation.
///
/// Stops once no value changes by more than `theta` or `max_sweeps` is
/// reached.
pub fn policy_evaluation(
    world: &GridWorld,
    policy: &GridPolicy,
    initial: ValueGrid,
    theta: f64,
    max_sweeps: Option<usize>,
) -> Sweeps {
    let mut values = initial;
    let mut sweeps = 0;
    loop {
        let mut next = values.clone();
        for cell in world.open_cells() {
            let moves = policy.moves(cell);
            if moves.is_empty() {
                continue;
            }
            let p = 1.0 / moves.len() as f64;
            next[[cell.row, cell.col]] = moves
                .iter()
                .map(|&mv| p * backup(world, &values, cell, mv))
                .sum();
        }
        sweeps += 1;
        let delta = max_abs_diff(&values, &next);
        values = next;
        let converged = delta <= theta;
        if converged || max_sweeps.is_some_and(|max| sweeps >= max) {
            debug!(sweeps, delta, converged, "Policy evaluation finished");
            return Sweeps {
                values,
                sweeps,
                converged,
            };
        }
    }
}

/// Value iteration with the Bellman optimality backup
pub fn value_iteration(
    world: &GridWorld,
    initial: ValueGrid,
    theta: f64,
    max_sweeps: Option<usize>,
) -> Sweeps {
    let mut values = initial;
    let mut sweeps = 0;
    loop {
        let mut next = values.clone();
        for cell in world.open_cells() {
            next[[cell.row, cell.col]] = Move::ALL
                .iter()
                .map(|&mv| backup(world, &values, cell, mv))
                .fold(f64::NEG_INFINITY, f64::max);
        }
        sweeps += 1;
        let delta = max_abs_diff(&values, &next);
        values = next;
        let converged = delta <= theta;
        if converged || max_sweeps.is_some_and(|max| sweeps >= max) {
            debug!(sweeps, delta, converged, "Value iteration finished");
            return Sweeps {
                values,
                sweeps,
                converged,
            };
        }
    }
}

/// Greedy policy w.r.t. `values`; tied moves share probability equally
pub fn greedy_policy(world: &GridWorld, values: &ValueGrid) -> GridPolicy {
    let mut policy = GridPolicy::empty(world.rows(), world.cols());
    for cell in world.open_cells() {
        let backups: Vec<(Move, f64)> = Move::ALL
            .iter()
            .map(|&mv| (mv, backup(world, values, cell, mv)))
            .collect();
        let best = backups
            .iter()
            .map(|(_, v)| *v)
            .fold(f64::NEG_INFINITY, f64::max);
        let moves = backups
            .into_iter()
            .filter(|(_, v)| best - v <= TIE_TOLERANCE)
            .map(|(mv, _)| mv)
            .collect();
        policy.set(cell, moves);
    }
    policy
}

/// Policy iteration from the equiprobable random policy.
///
/// Returns the final policy and values, and whether the policy was stable
/// before `max_iterations` improvements.
pub fn policy_iteration(
    world: &GridWorld,
    theta: f64,
    max_iterations: Option<usize>,
) -> (GridPolicy, ValueGrid, bool) {
    let mut solver = PolicyIteration::new(world);
    let (stable, _) = solver.exec(theta, max_iterations);
    (solver.policy, solver.values, stable)
}

/// Optimal-control solver over a known model
pub trait MdpSolver {
    fn v_star(&self, cell: Cell) -> f64;

    fn q_star(&self, cell: Cell, mv: Move) -> Option<f64>;

    fn pi_star(&self, cell: Cell) -> Option<Move>;

    fn policy(&self) -> GridPolicy;

    /// Run until stable (or `num_iterations`); returns (stable, iterations)
    fn exec(&mut self, theta: f64, num_iterations: Option<usize>) -> (bool, usize);
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub solver: String,
    pub stable: bool,
    pub iterations: usize,
    pub values: Vec<Vec<f64>>,
    pub policy: String,
}

impl PlanSummary {
    pub fn from_solver(
        name: &str,
        solver: &dyn MdpSolver,
        world: &GridWorld,
        stable: bool,
        iterations: usize,
    ) -> Self {
        let values = (0..world.rows())
            .map(|row| {
                (0..world.cols())
                    .map(|col| solver.v_star(Cell::new(row, col)))
                    .collect()
            })
            .collect();
        Self {
            solver: name.to_string(),
            stable,
            iterations,
            values,
            policy: solver.policy().render(),
        }
    }
}

fn q_value(world: &GridWorld, values: &ValueGrid, cell: Cell, mv: Move) -> Option<f64> {
    if world.is_terminal(&cell) || !world.contains(cell) {
        return None;
    }
    Some(backup(world, values, cell, mv))
}

/// Alternating policy evaluation and greedy improvement
pub struct PolicyIteration<'a> {
    world: &'a GridWorld,
    values: ValueGrid,
    policy: GridPolicy,
    max_sweeps: Option<usize>,
}

impl<'a> PolicyIteration<'a> {
    /// Starts from the equiprobable random policy and zero values
    pub fn new(world: &'a GridWorld) -> Self {
        Self {
            world,
            values: Array2::zeros((world.rows(), world.cols())),
            policy: GridPolicy::uniform(world),
            max_sweeps: None,
        }
    }

    /// Cap the sweeps of each evaluation phase
    pub fn with_max_sweeps(mut self, max_sweeps: usize) -> Self {
        self.max_sweeps = Some(max_sweeps);
        self
    }

    pub fn values(&self) -> &ValueGrid {
        &self.values
    }
}

impl MdpSolver for PolicyIteration<'_> {
    fn v_star(&self, cell: Cell) -> f64 {
        self.values[[cell.row, cell.col]]
    }

    fn q_star(&self, cell: Cell, mv: Move) -> Option<f64> {
        q_value(self.world, &self.values, cell, mv)
    }

    fn pi_star(&self, cell: Cell) -> Option<Move> {
        self.policy.moves(cell).first().copied()
    }

    fn policy(&self) -> GridPolicy {
        self.policy.clone()
    }

    fn exec(&mut self, theta: f64, num_iterations: Option<usize>) -> (bool, usize) {
        let mut iterations = 0;
        loop {
            let evaluation = policy_evaluation(
                self.world,
                &self.policy,
                self.values.clone(),
                theta,
                self.max_sweeps,
            );
            self.values = evaluation.values;
            let improved = greedy_policy(self.world, &self.values);
            iterations += 1;
            let stable = improved == self.policy;
            self.policy = improved;
            if stable {
                return (true, iterations);
            }
            if num_iterations.is_some_and(|max| iterations >= max) {
                return (false, iterations);
            }
        }
    }
}

/// Value iteration followed by greedy policy extraction
pub struct ValueIteration<'a> {
    world: &'a GridWorld,
    values: ValueGrid,
}

impl<'a> ValueIteration<'a> {
    pub fn new(world: &'a GridWorld) -> Self {
        Self {
            world,
            values: Array2::zeros((world.rows(), world.cols())),
        }
    }

    pub fn values(&self) -> &ValueGrid {
        &self.values
    }
}

impl MdpSolver for ValueIteration<'_> {
    fn v_star(&self, cell: Cell) -> f64 {
        self.values[[cell.row, cell.col]]
    }

    fn q_star(&self, cell: Cell, mv: Move) -> Option<f64> {
        q_value(self.world, &self.values, cell, mv)
    }

    fn pi_star(&self, cell: Cell) -> Option<Move> {
        self.policy().moves(cell).first().copied()
    }

    fn policy(&self) -> GridPolicy {
        greedy_policy(self.world, &self.values)
    }

    fn exec(&mut self, theta: f64, num_iterations: Option<usize>) -> (bool, usize) {
        let result = value_iteration(self.world, self.values.clone(), theta, num_iterations);
        self.values = result.values;
        (result.converged, result.sweeps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gridworld::GridSpec;
    use float_eq::assert_float_eq;

    fn classic_4x4() -> GridWorld {
        GridWorld::new(GridSpec::default()).unwrap()
    }

    #[test]
    fn test_random_policy_evaluation_matches_known_values() {
        let world = classic_4x4();
        let policy = GridPolicy::uniform(&world);
        let result = policy_evaluation(&world, &policy, Array2::zeros((4, 4)), 1e-10, None);
        assert!(result.converged);
        let values = result.values;

        let expected = [
            [0.0, -14.0, -20.0, -22.0],
            [-14.0, -18.0, -20.0, -20.0],
            [-20.0, -20.0, -18.0, -14.0],
            [-22.0, -20.0, -14.0, 0.0],
        ];
        for (r, row) in expected.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                assert_float_eq!(values[[r, c]], *v, abs <= 1e-3);
            }
        }
    }

    #[test]
    fn test_value_iteration_gives_negative_distance() {
        let world = classic_4x4();
        let values = value_iteration(&world, Array2::zeros((4, 4)), 1e-10, None).values;
        for cell in world.open_cells() {
            let to_a = cell.row + cell.col;
            let to_b = (3 - cell.row) + (3 - cell.col);
            let distance = to_a.min(to_b) as f64;
            assert_float_eq!(values[[cell.row, cell.col]], -distance, abs <= 1e-9);
        }
    }

    #[test]
    fn test_greedy_policy_splits_ties() {
        let world = classic_4x4();
        let values = value_iteration(&world, Array2::zeros((4, 4)), 1e-10, None).values;
        let policy = greedy_policy(&world, &values);

        assert_eq!(policy.moves(Cell::new(0, 1)), &[Move::Left]);
        assert_eq!(policy.moves(Cell::new(1, 1)), &[Move::Up, Move::Left]);
        assert_float_eq!(policy.probability(Cell::new(1, 1), Move::Up), 0.5, abs <= 1e-12);
        assert_float_eq!(policy.probability(Cell::new(1, 1), Move::Right), 0.0, abs <= 1e-12);
        assert!(policy.moves(Cell::new(0, 0)).is_empty());
    }

    #[test]
    fn test_policy_and_value_iteration_agree() {
        let spec = GridSpec {
            rows: 3,
            cols: 3,
            terminals: vec![Cell::new(0, 0), Cell::new(3, 3), Cell::new(5, 5)],
            ..GridSpec::default()
        };
        let world = GridWorld::new(spec).unwrap();

        let mut pi = PolicyIteration::new(&world);
        let (stable, _) = pi.exec(1e-9, Some(100));
        assert!(stable);

        let mut vi = ValueIteration::new(&world);
        let (stable, _) = vi.exec(1e-9, None);
        assert!(stable);

        assert_eq!(pi.policy(), vi.policy());
        assert_eq!(vi.pi_star(Cell::new(2, 2)), Some(Move::Up));
        assert_eq!(vi.q_star(Cell::new(0, 0), Move::Up), None);
        assert_float_eq!(vi.q_star(Cell::new(0, 1), Move::Left).unwrap(), -1.0, abs <= 1e-9);
    }

    #[test]
    fn test_policy_iteration_matches_value_iteration_policy() {
        let world = classic_4x4();
        let (policy, values, stable) = policy_iteration(&world, 1e-9, Some(100));
        assert!(stable);

        let optimal = value_iteration(&world, Array2::zeros((4, 4)), 1e-9, None);
        assert_eq!(policy, greedy_policy(&world, &optimal.values));
        assert_float_eq!(values[[3, 0]], -3.0, abs <= 1e-6);
    }

    #[test]
    fn test_render() {
        let world = GridWorld::new(GridSpec {
            rows: 1,
            cols: 3,
            terminals: vec![Cell::new(0, 0)],
            ..GridSpec::default()
        })
        .unwrap();
        let values = value_iteration(&world, Array2::zeros((1, 3)), 1e-10, None).values;
        assert_eq!(greedy_policy(&world, &values).render(), ". L L");
    }
}
