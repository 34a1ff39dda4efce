//! Exact search over the tile lattice.
//!
//! Every feasible placement sits on multiples of `gcd(tile.w, tile.h)`
//! without loss of generality, so the container is reduced to a grid of
//! lattice cells and filled in scan order: the first free cell is either
//! covered by a tile anchored there or left empty for good.

use std::time::Instant;

use crate::config::SolverConfig;
use crate::deadline::Deadline;
use crate::error::SolveError;
use crate::geometry;
use crate::solver::{MathematicalSolver, PackingSolver, infeasible_answer};
use crate::symmetry::SignatureSet;
use crate::types::{Orientation, Placement, Problem, ProofStatus, Rect, Solution, SolverKind};

/// Largest lattice the search will allocate.
const MAX_LATTICE_CELLS: usize = 4_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    Free,
    Covered,
    /// Deliberately left empty on the current branch.
    Blocked,
}

#[derive(Debug, Clone, Copy)]
struct Shape {
    orientation: Orientation,
    extent: Rect,
    cols: usize,
    rows: usize,
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    /// Find the largest count.
    Optimize,
    /// Collect distinct arrangements of exactly `target` tiles.
    Enumerate { target: usize, max: usize },
}

/// One decision point: the frontier cell and the next choice to try there.
/// Choices `0..shapes.len()` place a shape, `shapes.len()` blocks the cell.
#[derive(Debug, Clone, Copy)]
struct Frame {
    cell: usize,
    next: usize,
    applied: Option<usize>,
}

struct Search<'a> {
    problem: &'a Problem,
    unit: u32,
    cols: usize,
    cells: Vec<Cell>,
    shapes: Vec<Shape>,
    tile_cells: usize,
    free_cells: usize,
    /// Count no arrangement can exceed.
    ceiling: usize,
    mode: Mode,
    deadline: Deadline,
    frames: Vec<Frame>,
    placed: Vec<(usize, usize)>,
    best: Vec<(usize, usize)>,
    found: Vec<Vec<Placement>>,
    seen: SignatureSet,
    symmetry_breaking: bool,
    nodes: u64,
    stop: bool,
    timed_out: bool,
}

impl<'a> Search<'a> {
    /// Number of lattice cells the search would allocate for `problem`.
    fn lattice_cells(problem: &Problem) -> usize {
        let container = problem.container();
        let unit = geometry::lattice_unit(problem.tile());
        (container.w / unit) as usize * (container.h / unit) as usize
    }

    fn new(problem: &'a Problem, mode: Mode, deadline: Deadline, symmetry_breaking: bool) -> Self {
        let container = problem.container();
        let unit = geometry::lattice_unit(problem.tile());
        let cols = (container.w / unit) as usize;
        let rows = (container.h / unit) as usize;
        let total = cols * rows;
        debug_assert!(total <= MAX_LATTICE_CELLS);

        let shapes: Vec<Shape> = problem
            .fitting_orientations()
            .into_iter()
            .map(|(orientation, extent)| Shape {
                orientation,
                extent,
                cols: (extent.w / unit) as usize,
                rows: (extent.h / unit) as usize,
            })
            .collect();
        let tile_cells = ((problem.tile().w / unit) * (problem.tile().h / unit)) as usize;
        let ceiling = problem.theoretical_max_tiles().min(total / tile_cells);

        Self {
            problem,
            unit,
            cols,
            cells: vec![Cell::Free; total],
            shapes,
            tile_cells,
            free_cells: total,
            ceiling,
            mode,
            deadline,
            frames: Vec::new(),
            placed: Vec::new(),
            best: Vec::new(),
            found: Vec::new(),
            seen: SignatureSet::default(),
            symmetry_breaking,
            nodes: 0,
            stop: false,
            timed_out: false,
        }
    }

    fn fits(&self, cell: usize, shape: usize) -> bool {
        let s = self.shapes[shape];
        let (row, col) = (cell / self.cols, cell % self.cols);
        let rows = self.cells.len() / self.cols;
        if col + s.cols > self.cols || row + s.rows > rows {
            return false;
        }
        (row..row + s.rows).all(|r| {
            let start = r * self.cols + col;
            self.cells[start..start + s.cols]
                .iter()
                .all(|&c| c == Cell::Free)
        })
    }

    fn mark(&mut self, cell: usize, shape: usize, value: Cell) {
        let s = self.shapes[shape];
        let (row, col) = (cell / self.cols, cell % self.cols);
        for r in row..row + s.rows {
            let start = r * self.cols + col;
            self.cells[start..start + s.cols].fill(value);
        }
    }

    fn apply(&mut self, cell: usize, choice: usize) {
        if choice < self.shapes.len() {
            self.mark(cell, choice, Cell::Covered);
            self.free_cells -= self.tile_cells;
            self.placed.push((cell, choice));
        } else {
            self.cells[cell] = Cell::Blocked;
            self.free_cells -= 1;
        }
    }

    fn undo(&mut self, cell: usize, choice: usize) {
        if choice < self.shapes.len() {
            self.mark(cell, choice, Cell::Free);
            self.free_cells += self.tile_cells;
            self.placed.pop();
        } else {
            self.cells[cell] = Cell::Free;
            self.free_cells += 1;
        }
    }

    /// Placements in container coordinates, centred when the problem asks.
    fn placements(&self, placed: &[(usize, usize)]) -> Vec<Placement> {
        let raw: Vec<Placement> = placed
            .iter()
            .map(|&(cell, shape)| {
                let s = self.shapes[shape];
                let x = (cell % self.cols) as u32 * self.unit;
                let y = (cell / self.cols) as u32 * self.unit;
                Placement::new(x, y, s.extent, s.orientation)
            })
            .collect();
        debug_assert!(raw.iter().all(|p| geometry::contains(self.problem.container(), p)));
        if self.problem.center() {
            geometry::center(&raw, self.problem.container())
        } else {
            raw
        }
    }

    /// First-fit pass along the leftmost branch, giving the optimizer an
    /// incumbent before the deadline is consulted at all.
    fn seed(&mut self) {
        let mut applied = Vec::new();
        let mut cell = 0;
        while cell < self.cells.len() && self.placed.len() < self.ceiling {
            if self.cells[cell] == Cell::Free {
                let choice = (0..self.shapes.len())
                    .find(|&s| self.fits(cell, s))
                    .unwrap_or(self.shapes.len());
                self.apply(cell, choice);
                applied.push((cell, choice));
            }
            cell += 1;
        }
        self.best = self.placed.clone();
        for (cell, choice) in applied.into_iter().rev() {
            self.undo(cell, choice);
        }
        if self.best.len() >= self.ceiling {
            self.stop = true;
        }
    }

    /// Visit the node reached after the choices so far, scanning for the
    /// frontier from `from`. Pushes a frame when the node has children.
    fn enter(&mut self, from: usize) {
        self.nodes += 1;
        let count = self.placed.len();
        let bound = (count + self.free_cells / self.tile_cells).min(self.ceiling);

        match self.mode {
            Mode::Optimize => {
                if bound <= self.best.len() {
                    return;
                }
                if count >= self.ceiling {
                    self.record_best();
                    return;
                }
            }
            Mode::Enumerate { target, .. } => {
                if bound < target {
                    return;
                }
                if count == target {
                    self.record_found();
                    return;
                }
            }
        }

        match (from..self.cells.len()).find(|&i| self.cells[i] == Cell::Free) {
            Some(cell) => self.frames.push(Frame {
                cell,
                next: 0,
                applied: None,
            }),
            None => {
                if let Mode::Optimize = self.mode {
                    self.record_best();
                }
            }
        }
    }

    fn record_best(&mut self) {
        if self.placed.len() > self.best.len() {
            self.best = self.placed.clone();
            tracing::trace!(count = self.best.len(), nodes = self.nodes, "new incumbent");
            if self.best.len() >= self.ceiling {
                self.stop = true;
            }
        }
    }

    fn record_found(&mut self) {
        let Mode::Enumerate { max, .. } = self.mode else {
            return;
        };
        let placements = self.placements(&self.placed);
        if self.symmetry_breaking && !self.seen.insert(&placements, self.problem.container()) {
            return;
        }
        self.found.push(placements);
        if self.found.len() >= max {
            self.stop = true;
        }
    }

    fn run(&mut self) {
        if let Mode::Optimize = self.mode {
            self.seed();
        }
        if self.stop {
            return;
        }
        self.enter(0);

        while let Some(top) = self.frames.len().checked_sub(1) {
            if self.stop {
                break;
            }
            if self.deadline.expired() {
                self.timed_out = true;
                break;
            }
            let Frame {
                cell,
                next,
                applied,
            } = self.frames[top];
            if let Some(choice) = applied {
                self.undo(cell, choice);
                self.frames[top].applied = None;
            }

            let mut choice = next;
            while choice < self.shapes.len() && !self.fits(cell, choice) {
                choice += 1;
            }
            if choice > self.shapes.len() {
                self.frames.pop();
                continue;
            }
            self.frames[top].next = choice + 1;
            self.frames[top].applied = Some(choice);
            self.apply(cell, choice);
            self.enter(cell + 1);
        }
    }

    /// The tree was fully explored, or a count at the ceiling was reached.
    fn complete(&self) -> bool {
        !self.timed_out
    }
}

/// Depth-first exact solver with an area bound. Proves optimality when the
/// tree is exhausted before the deadline.
pub struct BacktrackSolver {
    config: SolverConfig,
}

impl BacktrackSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Answer for containers whose lattice is too large to allocate: the best
    /// closed-form layout, reported as an unfinished search.
    fn oversized(
        &self,
        problem: &Problem,
        cells: usize,
        deadline: Deadline,
        started: Instant,
    ) -> Result<Solution, SolveError> {
        tracing::debug!(
            cells,
            limit = MAX_LATTICE_CELLS,
            "lattice too large, using a closed-form layout"
        );
        let layout = MathematicalSolver::new(self.config.clone()).solve(problem, deadline)?;
        let proof = if layout.tile_count() >= problem.theoretical_max_tiles() {
            ProofStatus::ProvenOptimal
        } else {
            ProofStatus::FeasibleUnproven
        };
        Ok(Solution::new(layout.placements, problem.container(), self.kind())
            .with_proof(proof)
            .with_time_limit_reached(proof != ProofStatus::ProvenOptimal)
            .with_meta(
                "reason",
                format!("lattice of {cells} cells exceeds the search limit of {MAX_LATTICE_CELLS}"),
            )
            .with_solve_time(started.elapsed()))
    }
}

impl PackingSolver for BacktrackSolver {
    fn kind(&self) -> SolverKind {
        SolverKind::Backtrack
    }

    fn solve(&self, problem: &Problem, deadline: Deadline) -> Result<Solution, SolveError> {
        let started = Instant::now();
        if let Some(answer) = infeasible_answer(problem, self.kind()) {
            return Ok(answer);
        }

        let cells = Search::lattice_cells(problem);
        if cells > MAX_LATTICE_CELLS {
            return self.oversized(problem, cells, deadline, started);
        }

        let mut search = Search::new(problem, Mode::Optimize, deadline, false);
        search.run();
        let count = search.best.len();
        let proven = search.complete() || count >= problem.theoretical_max_tiles();
        tracing::debug!(
            count,
            nodes = search.nodes,
            timed_out = search.timed_out,
            "backtracking search finished"
        );

        let placements = search.placements(&search.best);
        Ok(Solution::new(placements, problem.container(), self.kind())
            .with_proof(if proven {
                ProofStatus::ProvenOptimal
            } else {
                ProofStatus::FeasibleUnproven
            })
            .with_time_limit_reached(search.timed_out)
            .with_meta("nodes", search.nodes)
            .with_meta("lattice_unit", search.unit)
            .with_solve_time(started.elapsed()))
    }

    fn solve_all_with_target(
        &self,
        problem: &Problem,
        target: Option<usize>,
        max_solutions: usize,
        deadline: Deadline,
    ) -> Result<Vec<Solution>, SolveError> {
        let started = Instant::now();
        if max_solutions == 0 || problem.feasibility_issue().is_some() {
            return Ok(Vec::new());
        }

        let (target, incumbent, proven) = match target {
            Some(t) => (t, None, t >= problem.theoretical_max_tiles()),
            None => {
                let best = self.solve(problem, deadline)?;
                let proven = best.proof == ProofStatus::ProvenOptimal;
                (best.tile_count(), Some(best), proven)
            }
        };
        if target == 0 {
            return Ok(Vec::new());
        }
        if Search::lattice_cells(problem) > MAX_LATTICE_CELLS {
            return Ok(incumbent
                .filter(|s| s.tile_count() == target)
                .into_iter()
                .map(|s| s.with_meta("search_exhausted", false))
                .collect());
        }

        let mode = Mode::Enumerate {
            target,
            max: max_solutions,
        };
        let mut search = Search::new(problem, mode, deadline, self.config.symmetry_breaking);
        search.run();
        let timed_out = search.timed_out
            || incumbent.as_ref().is_some_and(|s| s.time_limit_reached);
        let exhausted = search.complete() && search.found.len() < max_solutions;
        tracing::debug!(
            target,
            found = search.found.len(),
            nodes = search.nodes,
            exhausted,
            "backtracking enumeration finished"
        );

        let mut found = std::mem::take(&mut search.found);
        if found.is_empty() {
            if let Some(best) = incumbent.filter(|s| s.tile_count() == target) {
                found.push(best.placements);
            }
        }

        let elapsed = started.elapsed();
        Ok(found
            .into_iter()
            .map(|placements| {
                Solution::new(placements, problem.container(), SolverKind::Backtrack)
                    .with_proof(if proven {
                        ProofStatus::ProvenOptimal
                    } else {
                        ProofStatus::FeasibleUnproven
                    })
                    .with_time_limit_reached(timed_out)
                    .with_meta("search_exhausted", exhausted)
                    .with_solve_time(elapsed)
            })
            .collect())
    }

    fn enumerates(&self) -> bool {
        true
    }
}
