//! Deterministic gridworld
//!
//! Four moves; bumping into the boundary leaves the agent in place. Every
//! transition out of a non-terminal cell costs `step_penalty`, and terminal
//! cells have no outgoing transitions.

pub mod planning;

use std::collections::HashSet;
use std::fmt;

use rand::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use tabula_core::{DiscreteAction, Environment, FiniteEnvironment, Result, TabulaError, Transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    /// (row, col) offset
    pub fn delta(self) -> (isize, isize) {
        match self {
            Move::Up => (-1, 0),
            Move::Down => (1, 0),
            Move::Left => (0, -1),
            Move::Right => (0, 1),
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Move::Up => 'U',
            Move::Down => 'D',
            Move::Left => 'L',
            Move::Right => 'R',
        }
    }
}

impl DiscreteAction for Move {
    const ALL: &'static [Self] = &[Move::Up, Move::Down, Move::Left, Move::Right];

    fn to_index(self) -> usize {
        match self {
            Move::Up => 0,
            Move::Down => 1,
            Move::Left => 2,
            Move::Right => 3,
        }
    }
}

/// Where episodes begin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Start {
    /// Uniformly drawn non-terminal cell
    Random,
    Fixed(Cell),
}

/// Grid layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSpec {
    pub rows: usize,
    pub cols: usize,
    pub terminals: Vec<Cell>,
    pub step_penalty: f64,
    pub start: Start,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            rows: 4,
            cols: 4,
            terminals: vec![Cell::new(0, 0), Cell::new(3, 3)],
            step_penalty: -1.0,
            start: Start::Random,
        }
    }
}

pub struct GridWorld {
    spec: GridSpec,
    terminals: HashSet<Cell>,
    open_cells: Vec<Cell>,
    rng: StdRng,
}

impl GridWorld {
    pub fn new(spec: GridSpec) -> Result<Self> {
        Self::with_rng(spec, StdRng::from_entropy())
    }

    pub fn seeded(spec: GridSpec, seed: u64) -> Result<Self> {
        Self::with_rng(spec, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(spec: GridSpec, rng: StdRng) -> Result<Self> {
        if spec.rows == 0 || spec.cols == 0 {
            return Err(TabulaError::InvalidParameter(format!(
                "grid must be non-empty, got {}x{}",
                spec.rows, spec.cols
            )));
        }

        let mut terminals = HashSet::new();
        for cell in &spec.terminals {
            if cell.row < spec.rows && cell.col < spec.cols {
                terminals.insert(*cell);
            } else {
                warn!(%cell, "Ignoring terminal cell outside the {}x{} grid", spec.rows, spec.cols);
            }
        }

        let open_cells: Vec<Cell> = (0..spec.rows)
            .flat_map(|row| (0..spec.cols).map(move |col| Cell::new(row, col)))
            .filter(|cell| !terminals.contains(cell))
            .collect();
        if open_cells.is_empty() {
            return Err(TabulaError::InvalidParameter(
                "grid has no non-terminal cells".to_string(),
            ));
        }

        if let Start::Fixed(cell) = &spec.start {
            if !open_cells.contains(cell) {
                return Err(TabulaError::InvalidParameter(format!(
                    "start cell {cell} is terminal or off the grid"
                )));
            }
        }

        Ok(Self {
            spec,
            terminals,
            open_cells,
            rng,
        })
    }

    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    pub fn rows(&self) -> usize {
        self.spec.rows
    }

    pub fn cols(&self) -> usize {
        self.spec.cols
    }

    pub fn step_penalty(&self) -> f64 {
        self.spec.step_penalty
    }

    pub fn is_terminal(&self, cell: &Cell) -> bool {
        self.terminals.contains(cell)
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.row < self.spec.rows && cell.col < self.spec.cols
    }

    /// Non-terminal cells in row-major order
    pub fn open_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.open_cells.iter().copied()
    }

    pub fn on_grid(&self, row: isize, col: isize) -> bool {
        row >= 0 && col >= 0 && (row as usize) < self.spec.rows && (col as usize) < self.spec.cols
    }

    /// Cell reached by `mv`, or `cell` itself when the move leaves the grid
    pub fn neighbor(&self, cell: Cell, mv: Move) -> Cell {
        let (dr, dc) = mv.delta();
        let row = cell.row as isize + dr;
        let col = cell.col as isize + dc;
        if self.on_grid(row, col) {
            Cell::new(row as usize, col as usize)
        } else {
            cell
        }
    }
}

impl Environment for GridWorld {
    type State = Cell;
    type Action = Move;

    fn name(&self) -> &str {
        "gridworld"
    }

    fn reset(&mut self) -> Cell {
        match &self.spec.start {
            Start::Fixed(cell) => *cell,
            Start::Random => {
                let i = self.rng.gen_range(0..self.open_cells.len());
                self.open_cells[i]
            }
        }
    }

    fn step(&mut self, state: &Cell, action: Move) -> Result<Transition<Cell>> {
        if self.is_terminal(state) {
            return Err(TabulaError::TerminalTransition(state.to_string()));
        }
        let next = self.neighbor(*state, action);
        if self.is_terminal(&next) {
            Ok(Transition::terminal(self.spec.step_penalty))
        } else {
            Ok(Transition::to(next, self.spec.step_penalty))
        }
    }
}

impl FiniteEnvironment for GridWorld {
    fn states(&self) -> Vec<Cell> {
        self.open_cells.clone()
    }
}
