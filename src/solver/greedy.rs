use std::time::Instant;

use crate::config::{GreedyStrategy, SolverConfig};
use crate::deadline::Deadline;
use crate::error::SolveError;
use crate::geometry;
use crate::guillotine::{Anchor, GuillotineBin};
use crate::solver::{PackingSolver, infeasible_answer};
use crate::types::{Problem, ProofStatus, Solution, SolverKind};

/// Single-pass free-rectangle heuristic. Fast, never backtracks, not
/// guaranteed optimal; the orchestrator uses it as a quick lower bound.
pub struct GreedySolver {
    config: SolverConfig,
}

impl GreedySolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn with_strategy(strategy: GreedyStrategy) -> Self {
        Self::new(SolverConfig::default().with_greedy_strategy(strategy))
    }

    pub fn strategy(&self) -> GreedyStrategy {
        self.config.greedy_strategy
    }

    /// Fills until nothing fits, the cap is met, or the deadline passes.
    /// Returns the bin and whether the deadline cut the fill short.
    fn fill(&self, problem: &Problem, deadline: Deadline) -> (GuillotineBin, bool) {
        let container = problem.container();
        let orientations = problem.fitting_orientations();
        let cap = problem.theoretical_max_tiles();
        let strategy = self.strategy();
        let mut bin = GuillotineBin::new(container);

        while bin.placements.len() < cap {
            if !bin.placements.is_empty() && deadline.expired() {
                return (bin, true);
            }
            let mut order: Vec<usize> = (0..bin.free_rects.len()).collect();
            match strategy {
                GreedyStrategy::BottomLeft => {
                    order.sort_by_key(|&i| (bin.free_rects[i].y, bin.free_rects[i].x));
                }
                GreedyStrategy::CenterOut => {
                    order.sort_by_key(|&i| {
                        let f = bin.free_rects[i];
                        (f.center_distance_sq(container), f.y, f.x)
                    });
                }
            }

            let scored = order.into_iter().find_map(|i| {
                let anchor = match strategy {
                    GreedyStrategy::BottomLeft => Anchor::LowerLeft,
                    GreedyStrategy::CenterOut => {
                        Anchor::toward_center(&bin.free_rects[i], container)
                    }
                };
                bin.find_best(i, &orientations, anchor)
            });

            match scored {
                Some(scored) => {
                    bin.place(scored);
                }
                None => break,
            }
        }

        (bin, false)
    }
}

impl PackingSolver for GreedySolver {
    fn kind(&self) -> SolverKind {
        SolverKind::Greedy
    }

    fn solve(&self, problem: &Problem, deadline: Deadline) -> Result<Solution, SolveError> {
        let started = Instant::now();
        if let Some(answer) = infeasible_answer(problem, self.kind()) {
            return Ok(answer);
        }

        let (bin, timed_out) = self.fill(problem, deadline);
        let count = bin.placements.len();
        tracing::debug!(count, strategy = %self.strategy(), timed_out, "greedy fill");

        let proof = if count >= problem.theoretical_max_tiles() {
            ProofStatus::ProvenOptimal
        } else {
            ProofStatus::FeasibleUnproven
        };
        let placements = if problem.center() {
            geometry::center(&bin.placements, problem.container())
        } else {
            bin.placements
        };
        Ok(
            Solution::new(placements, problem.container(), self.kind())
                .with_proof(proof)
                .with_time_limit_reached(timed_out)
                .with_meta("strategy", self.strategy())
                .with_solve_time(started.elapsed()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rect;
    use crate::validation;
    use std::time::Duration;

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(10))
    }

    fn assert_valid(sol: &Solution, problem: &Problem) {
        let (ok, violations) = validation::valid(sol, problem);
        assert!(ok, "invalid solution: {violations:?}");
    }

    #[test]
    fn test_bottom_left_exact_fit() {
        let problem = Problem::new(Rect::new(20, 20), Rect::new(5, 5)).with_centering(false);
        let sol = GreedySolver::with_strategy(GreedyStrategy::BottomLeft)
            .solve(&problem, deadline())
            .unwrap();
        assert_valid(&sol, &problem);
        assert_eq!(sol.tile_count(), 16);
        assert_eq!(sol.placements[0].x, 0);
        assert_eq!(sol.placements[0].y, 0);
    }

    #[test]
    fn test_center_out_fills_most_of_container() {
        let problem = Problem::new(Rect::new(40, 48), Rect::new(10, 10));
        let sol = GreedySolver::with_strategy(GreedyStrategy::CenterOut)
            .solve(&problem, deadline())
            .unwrap();
        assert_valid(&sol, &problem);
        assert!(sol.tile_count() >= 12);
    }

    #[test]
    fn test_centers_when_requested() {
        let problem = Problem::new(Rect::new(29, 29), Rect::new(10, 10));
        let sol = GreedySolver::with_strategy(GreedyStrategy::BottomLeft)
            .solve(&problem, deadline())
            .unwrap();
        assert_valid(&sol, &problem);
        assert_eq!(sol.tile_count(), 4);
        assert!(sol.is_centered());
        let bb = sol.bounding_box().unwrap();
        assert_eq!((bb.min_x, bb.min_y, bb.max_x, bb.max_y), (4, 4, 24, 24));

        let raw = GreedySolver::with_strategy(GreedyStrategy::BottomLeft)
            .solve(&problem.with_centering(false), deadline())
            .unwrap();
        assert_eq!((raw.placements[0].x, raw.placements[0].y), (0, 0));
    }

    #[test]
    fn test_center_out_starts_near_middle() {
        let problem = Problem::new(Rect::new(30, 30), Rect::new(10, 10))
            .with_max_tiles(Some(1))
            .with_centering(false);
        let sol = GreedySolver::with_strategy(GreedyStrategy::CenterOut)
            .solve(&problem, deadline())
            .unwrap();
        assert_valid(&sol, &problem);
        assert_eq!(sol.tile_count(), 1);
        // Every corner of the whole container is equally central; ties go
        // to the upper-right one
        assert_eq!((sol.placements[0].x, sol.placements[0].y), (20, 20));
    }

    #[test]
    fn test_both_strategies_valid_on_awkward_sizes() {
        for (cw, ch, tw, th) in [(30, 20, 6, 8), (35, 25, 7, 8), (50, 50, 7, 11), (17, 13, 3, 5)] {
            let problem = Problem::new(Rect::new(cw, ch), Rect::new(tw, th));
            for strategy in [GreedyStrategy::BottomLeft, GreedyStrategy::CenterOut] {
                let sol = GreedySolver::with_strategy(strategy)
                    .solve(&problem, deadline())
                    .unwrap();
                assert_valid(&sol, &problem);
                assert!(sol.tile_count() > 0);
                assert!(sol.tile_count() <= problem.theoretical_max_tiles());
            }
        }
    }

    #[test]
    fn test_expired_deadline_keeps_first_tile() {
        let problem = Problem::new(Rect::new(500, 500), Rect::new(3, 7));
        let sol = GreedySolver::new(SolverConfig::default())
            .solve(&problem, Deadline::after(Duration::ZERO))
            .unwrap();
        assert_valid(&sol, &problem);
        assert_eq!(sol.tile_count(), 1);
        assert!(sol.time_limit_reached);
        assert_eq!(sol.proof, ProofStatus::FeasibleUnproven);
    }

    #[test]
    fn test_rotation_only_fit() {
        let problem = Problem::new(Rect::new(100, 50), Rect::new(50, 100));
        let sol = GreedySolver::new(SolverConfig::default())
            .solve(&problem, deadline())
            .unwrap();
        assert_valid(&sol, &problem);
        assert_eq!(sol.tile_count(), 1);
        assert_eq!(sol.proof, ProofStatus::ProvenOptimal);
    }

    #[test]
    fn test_solve_all_returns_at_most_one() {
        let problem = Problem::new(Rect::new(30, 20), Rect::new(6, 8));
        let all = GreedySolver::new(SolverConfig::default())
            .solve_all_optimal(&problem, 5, deadline())
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn test_infeasible() {
        let problem = Problem::new(Rect::new(100, 50), Rect::new(50, 100)).with_rotation(false);
        let sol = GreedySolver::new(SolverConfig::default())
            .solve(&problem, deadline())
            .unwrap();
        assert!(sol.is_empty());
        assert!(sol.metadata.contains_key("reason"));
    }
}
