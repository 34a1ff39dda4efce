use std::time::Instant;

use crate::config::SolverConfig;
use crate::deadline::Deadline;
use crate::error::SolveError;
use crate::solver::{
    BacktrackSolver, GreedySolver, IlpSolver, MathematicalSolver, PackingSolver, infeasible_answer,
};
use crate::symmetry;
use crate::types::{Problem, ProofStatus, Solution, SolverKind};

/// Runs the tiers from cheapest to most exhaustive against one shared
/// deadline and keeps the best result.
pub struct HybridSolver {
    config: SolverConfig,
    tiers: Vec<Box<dyn PackingSolver>>,
}

impl HybridSolver {
    pub fn new(config: SolverConfig) -> Self {
        let tiers: Vec<Box<dyn PackingSolver>> = vec![
            Box::new(MathematicalSolver::new(config.clone())),
            Box::new(GreedySolver::new(config.clone())),
            Box::new(BacktrackSolver::new(config.clone())),
            Box::new(IlpSolver::new(config.clone())),
        ];
        Self { config, tiers }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn deadline_for(&self, problem: &Problem) -> Deadline {
        Deadline::after(problem.time_limit().unwrap_or_else(|| self.config.time_limit()))
    }

    /// Good enough to stop escalating.
    fn satisfied(&self, problem: &Problem, best: &Solution) -> bool {
        best.tile_count() >= problem.theoretical_max_tiles()
            || best.proof == ProofStatus::ProvenOptimal
            || best.efficiency() >= self.config.early_stop_efficiency
    }

    fn finish(problem: &Problem, solution: Solution) -> Solution {
        if problem.center() {
            solution.centered()
        } else {
            solution
        }
    }
}

impl PackingSolver for HybridSolver {
    fn kind(&self) -> SolverKind {
        SolverKind::Hybrid
    }

    fn solve(&self, problem: &Problem, deadline: Deadline) -> Result<Solution, SolveError> {
        let started = Instant::now();
        if let Some(answer) = infeasible_answer(problem, self.kind()) {
            return Ok(answer);
        }
        let deadline = deadline.min(self.deadline_for(problem));

        let mut best: Option<Solution> = None;
        let mut time_limit_reached = false;
        for tier in &self.tiers {
            if deadline.expired() {
                time_limit_reached = true;
                break;
            }
            let tier_started = Instant::now();
            let result = match tier.solve(problem, deadline) {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(tier = %tier.kind(), error = %e, "tier skipped");
                    continue;
                }
            };
            time_limit_reached |= result.time_limit_reached;
            tracing::info!(
                tier = %tier.kind(),
                count = result.tile_count(),
                proof = %result.proof,
                elapsed_ms = tier_started.elapsed().as_millis() as u64,
                "tier finished"
            );

            let improves = best.as_ref().is_none_or(|b| {
                result.tile_count() > b.tile_count()
                    || (result.tile_count() == b.tile_count()
                        && result.proof == ProofStatus::ProvenOptimal
                        && b.proof != ProofStatus::ProvenOptimal)
            });
            if improves {
                best = Some(result);
            }
            if let Some(b) = &best
                && self.satisfied(problem, b)
            {
                break;
            }
        }

        let best = best.unwrap_or_else(|| Solution::empty(problem, self.kind()));
        let tier = best.solver;
        let mut solution = Self::finish(problem, best)
            .with_time_limit_reached(time_limit_reached)
            .with_meta("tier", tier)
            .with_meta("orchestrator", SolverKind::Hybrid)
            .with_solve_time(started.elapsed());
        if solution.tile_count() >= problem.theoretical_max_tiles() {
            solution.proof = ProofStatus::ProvenOptimal;
        }
        Ok(solution)
    }

    fn solve_all_with_target(
        &self,
        problem: &Problem,
        target: Option<usize>,
        max_solutions: usize,
        deadline: Deadline,
    ) -> Result<Vec<Solution>, SolveError> {
        let started = Instant::now();
        if max_solutions == 0 {
            return Ok(Vec::new());
        }
        if let Some(answer) = infeasible_answer(problem, self.kind()) {
            return Ok(vec![answer]);
        }
        let deadline = deadline.min(self.deadline_for(problem));

        let best = self.solve(problem, deadline)?;
        let target = target.unwrap_or(best.tile_count());
        if target == 0 {
            return Ok(vec![best]);
        }

        let mut pool: Vec<Solution> = Vec::new();
        for tier in self.tiers.iter().filter(|t| t.enumerates()) {
            if deadline.expired() || pool.len() >= max_solutions {
                break;
            }
            match tier.solve_all_with_target(problem, Some(target), max_solutions, deadline) {
                Ok(found) => {
                    let exhausted = found
                        .first()
                        .and_then(|s| s.metadata.get("search_exhausted"))
                        .is_some_and(|v| v == "true");
                    tracing::info!(
                        tier = %tier.kind(),
                        found = found.len(),
                        exhausted,
                        "enumeration"
                    );
                    pool.extend(found);
                    pool = symmetry::deduplicate(pool);
                    if exhausted {
                        break;
                    }
                }
                Err(e) => tracing::warn!(tier = %tier.kind(), error = %e, "enumeration skipped"),
            }
        }

        pool.retain(|s| s.tile_count() == target);
        if pool.is_empty() && best.tile_count() == target {
            pool.push(best.clone());
        }

        let elapsed = started.elapsed();
        let mut pool: Vec<Solution> = pool
            .into_iter()
            .map(|s| {
                let tier = s.solver;
                let mut s = Self::finish(problem, s)
                    .with_meta("tier", tier)
                    .with_meta("orchestrator", SolverKind::Hybrid)
                    .with_solve_time(elapsed);
                if best.proof == ProofStatus::ProvenOptimal && s.tile_count() == best.tile_count() {
                    s.proof = ProofStatus::ProvenOptimal;
                }
                s.time_limit_reached |= best.time_limit_reached;
                s
            })
            .collect();
        pool = symmetry::deduplicate(pool);
        pool.truncate(max_solutions);
        Ok(pool)
    }

    fn enumerates(&self) -> bool {
        true
    }
}
