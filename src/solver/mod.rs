//! Solving strategies and the orchestrator that escalates between them.

pub mod backtrack;
pub mod greedy;
pub mod hybrid;
pub mod ilp;
pub mod mathematical;

pub use backtrack::BacktrackSolver;
pub use greedy::GreedySolver;
pub use hybrid::HybridSolver;
pub use ilp::IlpSolver;
pub use mathematical::MathematicalSolver;

use crate::config::SolverConfig;
use crate::deadline::Deadline;
use crate::error::SolveError;
use crate::types::{Problem, Solution, SolverKind};

/// The capability every tier offers. Implementors keep no state between
/// calls; all search state lives on the stack of one invocation.
pub trait PackingSolver {
    fn kind(&self) -> SolverKind;

    /// Best arrangement found before `deadline`.
    fn solve(&self, problem: &Problem, deadline: Deadline) -> Result<Solution, SolveError>;

    /// Up to `max_solutions` symmetry-distinct arrangements of the best count.
    fn solve_all_optimal(
        &self,
        problem: &Problem,
        max_solutions: usize,
        deadline: Deadline,
    ) -> Result<Vec<Solution>, SolveError> {
        self.solve_all_with_target(problem, None, max_solutions, deadline)
    }

    /// Like [`PackingSolver::solve_all_optimal`], but when `target` is known
    /// only arrangements with exactly that many tiles are collected.
    fn solve_all_with_target(
        &self,
        problem: &Problem,
        target: Option<usize>,
        max_solutions: usize,
        deadline: Deadline,
    ) -> Result<Vec<Solution>, SolveError> {
        let solution = self.solve(problem, deadline)?;
        let keep = max_solutions > 0
            && !solution.is_empty()
            && target.is_none_or(|t| solution.tile_count() == t);
        Ok(if keep { vec![solution] } else { Vec::new() })
    }

    /// Whether the tier can produce more than one arrangement per call.
    fn enumerates(&self) -> bool {
        false
    }
}

/// Build the tier named by `kind` with `config`.
pub fn for_kind(kind: SolverKind, config: &SolverConfig) -> Box<dyn PackingSolver> {
    match kind {
        SolverKind::Mathematical => Box::new(MathematicalSolver::new(config.clone())),
        SolverKind::Greedy => Box::new(GreedySolver::new(config.clone())),
        SolverKind::Backtrack => Box::new(BacktrackSolver::new(config.clone())),
        SolverKind::Ilp => Box::new(IlpSolver::new(config.clone())),
        SolverKind::Hybrid => Box::new(HybridSolver::new(config.clone())),
    }
}

/// Answer for a problem that cannot hold a tile, if `problem` is one.
pub(crate) fn infeasible_answer(problem: &Problem, kind: SolverKind) -> Option<Solution> {
    problem.feasibility_issue().map(|reason| {
        tracing::debug!(solver = %kind, %reason, "infeasible problem");
        Solution::infeasible(problem, kind, reason)
    })
}
