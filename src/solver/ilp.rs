//! Set-packing model over lattice candidates, solved with `good_lp`.
//!
//! One binary variable per (anchor, orientation) candidate, one constraint
//! per lattice cell covered by more than one candidate. The objective counts
//! tiles first and breaks ties by a small penalty on each tile's distance
//! from the container centre.

#[cfg(feature = "ilp")]
use std::time::Instant;

use crate::config::SolverConfig;
use crate::deadline::Deadline;
use crate::error::SolveError;
use crate::types::{Orientation, Placement, Problem, Rect, Solution, SolverKind};
#[cfg(feature = "ilp")]
use crate::{
    geometry,
    solver::infeasible_answer,
    symmetry::{self, SignatureSet},
    types::ProofStatus,
};

#[cfg(feature = "ilp")]
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution as _, SolutionStatus, SolverModel,
    Variable, WithTimeLimit, constraint, default_solver, variable,
};
#[cfg(feature = "ilp")]
use rustc_hash::FxHashMap;

use crate::solver::PackingSolver;

#[derive(Debug, Clone, Copy)]
struct Candidate {
    x: u32,
    y: u32,
    orientation: Orientation,
    extent: Rect,
}

impl Candidate {
    fn placement(&self) -> Placement {
        Placement::new(self.x, self.y, self.extent, self.orientation)
    }
}

/// Result of one backend run, as candidate index sets.
#[cfg(feature = "ilp")]
#[derive(Debug)]
enum Outcome {
    Optimal(Vec<usize>),
    /// The time limit stopped the backend after it found a feasible selection.
    Incumbent(Vec<usize>),
    /// The time limit stopped the backend before any feasible selection.
    TimedOut,
    Infeasible,
}

/// Number of candidates [`candidates`] would build, without building them.
fn candidate_count(problem: &Problem) -> u64 {
    let container = problem.container();
    let unit = crate::geometry::lattice_unit(problem.tile());
    let (cols, rows) = ((container.w / unit) as u64, (container.h / unit) as u64);
    problem
        .fitting_orientations()
        .iter()
        .map(|(_, e)| (cols + 1 - (e.w / unit) as u64) * (rows + 1 - (e.h / unit) as u64))
        .sum()
}

/// All lattice-aligned anchors for every fitting orientation, plus, for each
/// lattice cell, the candidates covering it.
fn candidates(problem: &Problem) -> (Vec<Candidate>, Vec<Vec<usize>>) {
    let container = problem.container();
    let unit = crate::geometry::lattice_unit(problem.tile());
    let cols = container.w / unit;
    let rows = container.h / unit;

    let mut out = Vec::new();
    let mut covering = vec![Vec::new(); (cols * rows) as usize];
    for (orientation, extent) in problem.fitting_orientations() {
        let (sc, sr) = (extent.w / unit, extent.h / unit);
        for row in 0..=rows - sr {
            for col in 0..=cols - sc {
                let idx = out.len();
                out.push(Candidate {
                    x: col * unit,
                    y: row * unit,
                    orientation,
                    extent,
                });
                for r in row..row + sr {
                    for c in col..col + sc {
                        covering[(r * cols + c) as usize].push(idx);
                    }
                }
            }
        }
    }
    (out, covering)
}

/// Exact solver. Proves optimality whenever the backend finishes before the
/// deadline.
pub struct IlpSolver {
    config: SolverConfig,
}

impl IlpSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Whether the crate was built with a MILP backend.
    pub fn is_available() -> bool {
        cfg!(feature = "ilp")
    }

    /// Objective coefficient per candidate: one per tile minus a spread
    /// penalty small enough that it never outweighs a whole tile.
    #[cfg(feature = "ilp")]
    fn coefficients(&self, problem: &Problem, candidates: &[Candidate]) -> Vec<f64> {
        let container = problem.container();
        let weight = self.config.compactness_weight;
        let spread_max = (container.w as f64) + (container.h as f64);
        let tiles_max = problem.theoretical_max_tiles() as f64 + 1.0;
        let epsilon = weight / (spread_max * tiles_max);
        candidates
            .iter()
            .map(|c| {
                // Doubled coordinates keep the distance integral
                let dx = (2 * c.x + c.extent.w).abs_diff(container.w);
                let dy = (2 * c.y + c.extent.h).abs_diff(container.h);
                1.0 - epsilon * (dx + dy) as f64 / 2.0
            })
            .collect()
    }

    fn check_size(&self, problem: &Problem) -> Result<(), SolveError> {
        let count = candidate_count(problem);
        if count > self.config.ilp_max_candidates as u64 {
            return Err(SolveError::ModelTooLarge {
                candidates: usize::try_from(count).unwrap_or(usize::MAX),
                limit: self.config.ilp_max_candidates,
            });
        }
        Ok(())
    }

    /// Solve once, stopping the backend at `deadline`.
    #[cfg(feature = "ilp")]
    fn optimize(
        &self,
        problem: &Problem,
        candidates: &[Candidate],
        covering: &[Vec<usize>],
        target: Option<usize>,
        cuts: &[Vec<usize>],
        deadline: Deadline,
    ) -> Result<Outcome, SolveError> {
        let mut vars = ProblemVariables::new();
        let x: Vec<Variable> = candidates
            .iter()
            .map(|_| vars.add(variable().binary()))
            .collect();
        let objective: Expression = self
            .coefficients(problem, candidates)
            .into_iter()
            .zip(&x)
            .map(|(coef, &v)| coef * v)
            .sum();

        let mut model = vars
            .maximise(objective)
            .using(default_solver)
            .with_time_limit(deadline.remaining().as_secs_f64());
        for cell in covering.iter().filter(|c| c.len() > 1) {
            let sum: Expression = cell.iter().map(|&i| Expression::from(x[i])).sum();
            model = model.with(constraint!(sum <= 1.0));
        }
        let total: Expression = x.iter().map(|&v| Expression::from(v)).sum();
        if let Some(target) = target {
            model = model.with(constraint!(total == target as f64));
        } else if let Some(cap) = problem.max_tiles() {
            model = model.with(constraint!(total <= cap as f64));
        }
        for cut in cuts {
            let sum: Expression = cut.iter().map(|&i| Expression::from(x[i])).sum();
            model = model.with(constraint!(sum <= (cut.len() - 1) as f64));
        }

        match model.solve() {
            Ok(solution) => {
                let selected = x
                    .iter()
                    .enumerate()
                    .filter(|&(_, &v)| solution.value(v) > 0.5)
                    .map(|(i, _)| i)
                    .collect();
                Ok(match solution.status() {
                    SolutionStatus::Optimal => Outcome::Optimal(selected),
                    SolutionStatus::TimeLimit | SolutionStatus::GapLimit => {
                        Outcome::Incumbent(selected)
                    }
                })
            }
            Err(ResolutionError::Infeasible) => Ok(Outcome::Infeasible),
            // microlp reports a time limit hit before any feasible point this way
            Err(ResolutionError::Other(reason)) => {
                tracing::debug!(reason, "ILP backend stopped without a selection");
                Ok(Outcome::TimedOut)
            }
            Err(e) => Err(SolveError::Backend(e.to_string())),
        }
    }

    #[cfg(feature = "ilp")]
    fn finish(problem: &Problem, placements: Vec<Placement>) -> Vec<Placement> {
        if problem.center() {
            geometry::center(&placements, problem.container())
        } else {
            placements
        }
    }

    /// The selection and each of its symmetric images that lands on the
    /// lattice, as candidate index sets.
    #[cfg(feature = "ilp")]
    fn cuts_for(
        problem: &Problem,
        selected: &[usize],
        candidates: &[Candidate],
        index: &FxHashMap<(u32, u32, u32, u32), usize>,
    ) -> Vec<Vec<usize>> {
        let container = problem.container();
        let placements: Vec<Placement> =
            selected.iter().map(|&i| candidates[i].placement()).collect();
        symmetry::group(container)
            .iter()
            .filter_map(|s| {
                s.apply(&placements, container)
                    .iter()
                    .map(|p| index.get(&(p.x, p.y, p.rect.w, p.rect.h)).copied())
                    .collect::<Option<Vec<usize>>>()
            })
            .collect()
    }
}

#[cfg(feature = "ilp")]
impl PackingSolver for IlpSolver {
    fn kind(&self) -> SolverKind {
        SolverKind::Ilp
    }

    fn solve(&self, problem: &Problem, deadline: Deadline) -> Result<Solution, SolveError> {
        let started = Instant::now();
        if let Some(answer) = infeasible_answer(problem, self.kind()) {
            return Ok(answer);
        }
        if deadline.expired() {
            return Ok(Solution::empty(problem, self.kind()).with_time_limit_reached(true));
        }

        self.check_size(problem)?;
        let (candidates, covering) = candidates(problem);
        tracing::debug!(candidates = candidates.len(), "building ILP model");

        let (selected, proven) =
            match self.optimize(problem, &candidates, &covering, None, &[], deadline)? {
                Outcome::Optimal(selected) => (selected, true),
                Outcome::Incumbent(selected) => (selected, false),
                Outcome::TimedOut => (Vec::new(), false),
                Outcome::Infeasible => (Vec::new(), true),
            };
        let placements = selected.iter().map(|&i| candidates[i].placement()).collect();
        let placements = Self::finish(problem, placements);
        let proven = proven || placements.len() >= problem.theoretical_max_tiles();
        tracing::debug!(count = placements.len(), proven, "ILP finished");

        Ok(Solution::new(placements, problem.container(), self.kind())
            .with_proof(if proven {
                ProofStatus::ProvenOptimal
            } else {
                ProofStatus::FeasibleUnproven
            })
            .with_time_limit_reached(!proven)
            .with_meta("candidates", candidates.len())
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

        let (target, proven) = match target {
            Some(t) => (t, t >= problem.theoretical_max_tiles()),
            None => {
                let best = self.solve(problem, deadline)?;
                (best.tile_count(), best.proof == ProofStatus::ProvenOptimal)
            }
        };
        if target == 0 {
            return Ok(Vec::new());
        }

        self.check_size(problem)?;
        let (candidates, covering) = candidates(problem);
        let index: FxHashMap<(u32, u32, u32, u32), usize> = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| ((c.x, c.y, c.extent.w, c.extent.h), i))
            .collect();

        let mut cuts: Vec<Vec<usize>> = Vec::new();
        let mut seen = SignatureSet::default();
        let mut found: Vec<Vec<Placement>> = Vec::new();
        let mut exhausted = false;
        let mut timed_out = false;

        while found.len() < max_solutions {
            if deadline.expired() {
                timed_out = true;
                break;
            }
            let outcome =
                self.optimize(problem, &candidates, &covering, Some(target), &cuts, deadline)?;
            let selected = match outcome {
                Outcome::Optimal(selected) => selected,
                Outcome::Incumbent(selected) => {
                    // Any selection meeting the target is an arrangement
                    timed_out = true;
                    selected
                }
                Outcome::TimedOut => {
                    timed_out = true;
                    break;
                }
                Outcome::Infeasible => {
                    exhausted = true;
                    break;
                }
            };
            cuts.extend(Self::cuts_for(problem, &selected, &candidates, &index));
            let placements = Self::finish(
                problem,
                selected.iter().map(|&i| candidates[i].placement()).collect(),
            );
            if seen.insert(&placements, problem.container()) {
                found.push(placements);
            }
            if timed_out {
                break;
            }
        }
        tracing::debug!(
            target,
            found = found.len(),
            cuts = cuts.len(),
            exhausted,
            timed_out,
            "ILP enumeration"
        );

        let elapsed = started.elapsed();
        Ok(found
            .into_iter()
            .map(|placements| {
                Solution::new(placements, problem.container(), SolverKind::Ilp)
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

#[cfg(not(feature = "ilp"))]
impl PackingSolver for IlpSolver {
    fn kind(&self) -> SolverKind {
        SolverKind::Ilp
    }

    fn solve(&self, _problem: &Problem, _deadline: Deadline) -> Result<Solution, SolveError> {
        tracing::warn!("ILP solver not available (compile with the `ilp` feature)");
        Err(SolveError::BackendUnavailable)
    }

    fn solve_all_with_target(
        &self,
        _problem: &Problem,
        _target: Option<usize>,
        _max_solutions: usize,
        _deadline: Deadline,
    ) -> Result<Vec<Solution>, SolveError> {
        Err(SolveError::BackendUnavailable)
    }
}
