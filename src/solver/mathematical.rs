//! Closed-form layouts: plain grids and stacks of full-width rows (or
//! full-height columns) mixing the two orientations.

use std::time::Instant;

use crate::config::SolverConfig;
use crate::deadline::Deadline;
use crate::error::SolveError;
use crate::geometry;
use crate::solver::{PackingSolver, infeasible_answer};
use crate::symmetry::SignatureSet;
use crate::types::{Orientation, Placement, Problem, ProofStatus, Rect, Solution, SolverKind};

/// Upper limit on line orders generated per plan while enumerating.
const MAX_ORDERS_PER_PLAN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    /// Lines are full-width rows stacked upwards.
    Rows,
    /// Lines are full-height columns stacked rightwards.
    Columns,
}

/// A layout made of homogeneous lines, stored as runs of
/// `(orientation index, line count)`.
#[derive(Debug, Clone)]
struct Plan {
    axis: Axis,
    runs: Vec<(usize, u32)>,
}

impl Plan {
    fn lines(&self) -> Vec<usize> {
        self.runs
            .iter()
            .flat_map(|&(i, n)| std::iter::repeat_n(i, n as usize))
            .collect()
    }
}

/// Ranking of a plan: tile count, then the tie-break key (rotated tiles,
/// container area outside the bounding box).
type Score = (usize, (usize, u64));

pub struct MathematicalSolver {
    config: SolverConfig,
}

impl MathematicalSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    fn line_capacity(container: Rect, axis: Axis, extent: Rect) -> u32 {
        match axis {
            Axis::Rows => container.w / extent.w,
            Axis::Columns => container.h / extent.h,
        }
    }

    fn line_thickness(axis: Axis, extent: Rect) -> u32 {
        match axis {
            Axis::Rows => extent.h,
            Axis::Columns => extent.w,
        }
    }

    /// Length of one tile along its line.
    fn line_step(axis: Axis, extent: Rect) -> u32 {
        match axis {
            Axis::Rows => extent.w,
            Axis::Columns => extent.h,
        }
    }

    fn span(container: Rect, axis: Axis) -> u32 {
        match axis {
            Axis::Rows => container.h,
            Axis::Columns => container.w,
        }
    }

    /// Every grid and two-band plan with at least one tile, in a fixed order:
    /// grids first (original before rotated), then row bands, then column
    /// bands.
    fn plans(problem: &Problem, orientations: &[(Orientation, Rect)]) -> Vec<Plan> {
        let container = problem.container();
        let mut plans = Vec::new();

        for (i, &(_, extent)) in orientations.iter().enumerate() {
            if Self::line_capacity(container, Axis::Rows, extent) == 0 {
                continue;
            }
            let rows = container.h / extent.h;
            if rows > 0 {
                plans.push(Plan {
                    axis: Axis::Rows,
                    runs: vec![(i, rows)],
                });
            }
        }

        if orientations.len() < 2 {
            return plans;
        }

        for axis in [Axis::Rows, Axis::Columns] {
            let span = Self::span(container, axis);
            for (a, &(_, first)) in orientations.iter().enumerate() {
                for (b, &(_, second)) in orientations.iter().enumerate() {
                    if a == b
                        || Self::line_capacity(container, axis, first) == 0
                        || Self::line_capacity(container, axis, second) == 0
                    {
                        continue;
                    }
                    let first_t = Self::line_thickness(axis, first);
                    let second_t = Self::line_thickness(axis, second);
                    for k in 1..=span / first_t {
                        let m = (span - k * first_t) / second_t;
                        if m == 0 {
                            continue;
                        }
                        plans.push(Plan {
                            axis,
                            runs: vec![(a, k), (b, m)],
                        });
                    }
                }
            }
        }

        plans
    }

    /// Scores a plan without placing its tiles. Lines fill in order until the
    /// tile cap runs out; the bounding box is the used depth times the widest
    /// used line.
    fn score(problem: &Problem, orientations: &[(Orientation, Rect)], plan: &Plan) -> Score {
        let container = problem.container();
        let mut remaining = problem.max_tiles().unwrap_or(usize::MAX);
        let (mut count, mut rotated) = (0usize, 0usize);
        let (mut depth, mut breadth) = (0u64, 0u64);

        for &(i, lines) in &plan.runs {
            let (orientation, extent) = orientations[i];
            let per_line = Self::line_capacity(container, plan.axis, extent) as usize;
            if remaining == 0 {
                break;
            }
            let taken = per_line.saturating_mul(lines as usize).min(remaining);
            let used_lines = taken.div_ceil(per_line);
            remaining -= taken;
            count += taken;
            if orientation == Orientation::Rotated {
                rotated += taken;
            }
            depth += used_lines as u64 * u64::from(Self::line_thickness(plan.axis, extent));
            let step = u64::from(Self::line_step(plan.axis, extent));
            breadth = breadth.max(taken.min(per_line) as u64 * step);
        }

        (count, (rotated, problem.container_area() - depth * breadth))
    }

    fn layout(
        problem: &Problem,
        orientations: &[(Orientation, Rect)],
        axis: Axis,
        lines: &[usize],
    ) -> Vec<Placement> {
        let container = problem.container();
        let cap = problem.max_tiles().unwrap_or(usize::MAX);
        let mut placements = Vec::new();
        let mut offset = 0;

        'lines: for &i in lines {
            let (orientation, extent) = orientations[i];
            for slot in 0..Self::line_capacity(container, axis, extent) {
                if placements.len() >= cap {
                    break 'lines;
                }
                let (x, y) = match axis {
                    Axis::Rows => (slot * extent.w, offset),
                    Axis::Columns => (offset, slot * extent.h),
                };
                placements.push(Placement::new(x, y, extent, orientation));
            }
            offset += Self::line_thickness(axis, extent);
        }

        if problem.center() {
            geometry::center(&placements, container)
        } else {
            placements
        }
    }

    fn describe(orientations: &[(Orientation, Rect)], axis: Axis, lines: &[usize]) -> String {
        let kind = match axis {
            Axis::Rows => "rows",
            Axis::Columns => "columns",
        };
        let parts: Vec<String> = lines
            .chunk_by(|a, b| a == b)
            .map(|run| format!("{}x{}", run.len(), orientations[run[0]].0))
            .collect();
        format!("{kind}: {}", parts.join(" + "))
    }

    fn to_solution(
        &self,
        problem: &Problem,
        placements: Vec<Placement>,
        description: String,
        started: Instant,
    ) -> Solution {
        let exact = placements.len() as u64 * problem.tile_area() == problem.container_area();
        let proof = if placements.len() >= problem.theoretical_max_tiles() {
            ProofStatus::ProvenOptimal
        } else {
            ProofStatus::FeasibleUnproven
        };
        Solution::new(placements, problem.container(), SolverKind::Mathematical)
            .with_proof(proof)
            .with_meta("arrangement", description)
            .with_meta("exact_tiling", exact)
            .with_solve_time(started.elapsed())
    }

    /// Distinct orders of the lines of `plan`: the plan's own first, then the
    /// others in lexicographic order, at most `limit` in total.
    fn line_orders(plan: &Plan, limit: usize) -> Vec<Vec<usize>> {
        let own = plan.lines();
        let mut current = own.clone();
        current.sort_unstable();
        let mut out = vec![own];

        while out.len() < limit {
            if current != out[0] {
                out.push(current.clone());
            }
            if !next_permutation(&mut current) {
                break;
            }
        }
        out.truncate(limit);
        out
    }
}

/// Advances `v` to its next lexicographic permutation. Returns `false` once
/// `v` is the last one.
fn next_permutation(v: &mut [usize]) -> bool {
    let Some(i) = v.windows(2).rposition(|w| w[0] < w[1]) else {
        return false;
    };
    let Some(j) = (i + 1..v.len()).rev().find(|&j| v[j] > v[i]) else {
        return false;
    };
    v.swap(i, j);
    v[i + 1..].reverse();
    true
}

impl PackingSolver for MathematicalSolver {
    fn kind(&self) -> SolverKind {
        SolverKind::Mathematical
    }

    fn solve(&self, problem: &Problem, deadline: Deadline) -> Result<Solution, SolveError> {
        let started = Instant::now();
        if let Some(answer) = infeasible_answer(problem, self.kind()) {
            return Ok(answer);
        }

        let orientations = problem.fitting_orientations();
        let mut best: Option<(Score, Plan)> = None;
        let mut timed_out = false;

        for plan in Self::plans(problem, &orientations) {
            if best.is_some() && deadline.expired() {
                timed_out = true;
                break;
            }
            let score = Self::score(problem, &orientations, &plan);
            let better = best
                .as_ref()
                .is_none_or(|(b, _)| score.0 > b.0 || (score.0 == b.0 && score.1 < b.1));
            if better {
                best = Some((score, plan));
            }
        }

        let Some(((count, _), plan)) = best else {
            return Ok(Solution::empty(problem, self.kind()).with_solve_time(started.elapsed()));
        };
        let lines = plan.lines();
        let placements = Self::layout(problem, &orientations, plan.axis, &lines);
        let description = Self::describe(&orientations, plan.axis, &lines);
        tracing::debug!(count, arrangement = %description, timed_out, "mathematical layout");
        Ok(self
            .to_solution(problem, placements, description, started)
            .with_time_limit_reached(timed_out))
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

        let orientations = problem.fitting_orientations();
        let scored: Vec<(usize, Plan)> = Self::plans(problem, &orientations)
            .into_iter()
            .map(|plan| (Self::score(problem, &orientations, &plan).0, plan))
            .collect();
        let best_count = scored.iter().map(|(count, _)| *count).max().unwrap_or(0);
        let wanted = target.unwrap_or(best_count);
        if wanted == 0 || wanted != best_count {
            return Ok(Vec::new());
        }

        let mut seen = SignatureSet::default();
        let mut solutions: Vec<Solution> = Vec::new();
        let mut timed_out = false;
        'plans: for (_, plan) in scored.iter().filter(|(count, _)| *count == wanted) {
            for lines in Self::line_orders(plan, MAX_ORDERS_PER_PLAN) {
                if !solutions.is_empty() && deadline.expired() {
                    timed_out = true;
                    break 'plans;
                }
                let placements = Self::layout(problem, &orientations, plan.axis, &lines);
                let fresh = if self.config.symmetry_breaking {
                    seen.insert(&placements, problem.container())
                } else {
                    solutions.iter().all(|s| s.placements != placements)
                };
                if !fresh {
                    continue;
                }
                let description = Self::describe(&orientations, plan.axis, &lines);
                solutions.push(self.to_solution(problem, placements, description, started));
                if solutions.len() >= max_solutions {
                    break 'plans;
                }
            }
        }

        let elapsed = started.elapsed();
        for s in &mut solutions {
            s.solve_time = elapsed;
            s.time_limit_reached = timed_out;
        }
        Ok(solutions)
    }

    fn enumerates(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symmetry;
    use crate::validation;
    use std::time::Duration;

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(10))
    }

    fn solver() -> MathematicalSolver {
        MathematicalSolver::new(SolverConfig::default())
    }

    fn assert_valid(sol: &Solution, problem: &Problem) {
        let (ok, violations) = validation::valid(sol, problem);
        assert!(ok, "invalid solution: {violations:?}");
    }

    #[test]
    fn test_perfect_grid() {
        let problem = Problem::new(Rect::new(20, 20), Rect::new(5, 5));
        let sol = solver().solve(&problem, deadline()).unwrap();
        assert_valid(&sol, &problem);
        assert_eq!(sol.tile_count(), 16);
        assert!((sol.efficiency() - 100.0).abs() < 1e-9);
        assert_eq!(sol.proof, ProofStatus::ProvenOptimal);
        assert_eq!(sol.metadata.get("exact_tiling").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_deterministic() {
        let problem = Problem::new(Rect::new(20, 20), Rect::new(5, 5));
        let a = solver().solve(&problem, deadline()).unwrap();
        let b = solver().solve(&problem, deadline()).unwrap();
        assert_eq!(a.placements, b.placements);
    }

    #[test]
    fn test_mixed_bands_beat_plain_grids() {
        // Plain grids give 10 and 9, one band of each orientation gives 11
        let problem = Problem::new(Rect::new(30, 20), Rect::new(6, 8));
        let sol = solver().solve(&problem, deadline()).unwrap();
        assert_valid(&sol, &problem);
        assert_eq!(sol.tile_count(), 11);
        assert_eq!(sol.proof, ProofStatus::FeasibleUnproven);
        assert!(sol.metadata["arrangement"].starts_with("rows"));
    }

    #[test]
    fn test_no_rotation_uses_original_grid() {
        let problem = Problem::new(Rect::new(30, 20), Rect::new(6, 8)).with_rotation(false);
        let sol = solver().solve(&problem, deadline()).unwrap();
        assert_valid(&sol, &problem);
        assert_eq!(sol.tile_count(), 10);
        assert!(
            sol.placements
                .iter()
                .all(|p| p.orientation == Orientation::Original)
        );
    }

    #[test]
    fn test_rotated_grid_only_option() {
        let problem = Problem::new(Rect::new(10, 4), Rect::new(4, 10));
        let sol = solver().solve(&problem, deadline()).unwrap();
        assert_valid(&sol, &problem);
        assert_eq!(sol.tile_count(), 1);
        assert_eq!(sol.placements[0].orientation, Orientation::Rotated);
    }

    #[test]
    fn test_centering() {
        let problem = Problem::new(Rect::new(23, 17), Rect::new(5, 5));
        let sol = solver().solve(&problem, deadline()).unwrap();
        assert_valid(&sol, &problem);
        assert!(sol.is_centered());

        let uncentered = solver()
            .solve(&problem.clone().with_centering(false), deadline())
            .unwrap();
        let bb = uncentered.bounding_box().unwrap();
        assert_eq!((bb.min_x, bb.min_y), (0, 0));
    }

    #[test]
    fn test_cap_limits_count() {
        let problem = Problem::new(Rect::new(20, 20), Rect::new(5, 5)).with_max_tiles(Some(7));
        let sol = solver().solve(&problem, deadline()).unwrap();
        assert_valid(&sol, &problem);
        assert_eq!(sol.tile_count(), 7);
    }

    #[test]
    fn test_infeasible_problem() {
        let problem = Problem::new(Rect::new(5, 5), Rect::new(10, 10));
        let sol = solver().solve(&problem, deadline()).unwrap();
        assert!(sol.is_empty());
        assert_eq!(sol.efficiency(), 0.0);
        assert!(sol.metadata.contains_key("reason"));
    }

    #[test]
    fn test_solve_all_same_count_and_distinct() {
        let problem = Problem::new(Rect::new(30, 20), Rect::new(6, 8)).with_centering(false);
        let all = solver()
            .solve_all_optimal(&problem, 20, deadline())
            .unwrap();
        assert!(all.len() > 1);
        for (i, a) in all.iter().enumerate() {
            assert_valid(a, &problem);
            assert_eq!(a.tile_count(), 11);
            for b in &all[i + 1..] {
                assert!(!symmetry::are_equivalent(a, b));
            }
        }
    }

    #[test]
    fn test_solve_all_respects_max() {
        let problem = Problem::new(Rect::new(30, 20), Rect::new(6, 8));
        let all = solver().solve_all_optimal(&problem, 2, deadline()).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_line_orders_are_distinct() {
        let plan = Plan {
            axis: Axis::Rows,
            runs: vec![(0, 1), (1, 2)],
        };
        let orders = MathematicalSolver::line_orders(&plan, 100);
        assert_eq!(orders, vec![vec![0, 1, 1], vec![1, 0, 1], vec![1, 1, 0]]);

        let plan = Plan {
            axis: Axis::Columns,
            runs: vec![(1, 2), (0, 1)],
        };
        let orders = MathematicalSolver::line_orders(&plan, 2);
        assert_eq!(orders, vec![vec![1, 1, 0], vec![0, 1, 1]]);
    }

    #[test]
    fn test_score_matches_layout() {
        for cap in [None, Some(5), Some(9)] {
            let problem = Problem::new(Rect::new(30, 20), Rect::new(6, 8))
                .with_centering(false)
                .with_max_tiles(cap);
            let orientations = problem.fitting_orientations();
            for plan in MathematicalSolver::plans(&problem, &orientations) {
                let (count, (rotated, outside)) =
                    MathematicalSolver::score(&problem, &orientations, &plan);
                let placements =
                    MathematicalSolver::layout(&problem, &orientations, plan.axis, &plan.lines());
                let used = geometry::bounding_box(&placements).map_or(0, |bb| bb.area());
                assert_eq!(count, placements.len());
                assert_eq!(
                    rotated,
                    placements
                        .iter()
                        .filter(|p| p.orientation == Orientation::Rotated)
                        .count()
                );
                assert_eq!(outside, problem.container_area() - used);
            }
        }
    }

    #[test]
    fn test_large_container_is_quick() {
        let problem = Problem::new(Rect::new(3000, 3000), Rect::new(3, 7));
        let started = Instant::now();
        let sol = solver()
            .solve(&problem, Deadline::after(Duration::from_millis(200)))
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(sol.tile_count() >= 428_000);
        assert_valid(&sol, &problem);
    }

    #[test]
    fn test_solve_all_stops_at_deadline() {
        let problem = Problem::new(Rect::new(3000, 3000), Rect::new(3, 7));
        let started = Instant::now();
        let all = solver()
            .solve_all_optimal(&problem, 50, Deadline::after(Duration::from_millis(100)))
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!all.is_empty());
    }

    #[test]
    fn test_solve_all_without_symmetry_breaking_keeps_mirror_images() {
        let problem = Problem::new(Rect::new(30, 20), Rect::new(6, 8)).with_centering(false);
        let plain = solver().solve_all_optimal(&problem, 50, deadline()).unwrap();
        let raw = MathematicalSolver::new(SolverConfig::default().with_symmetry_breaking(false))
            .solve_all_optimal(&problem, 50, deadline())
            .unwrap();
        assert!(raw.len() >= plain.len());
        for (i, a) in raw.iter().enumerate() {
            assert_eq!(a.tile_count(), 11);
            for b in &raw[i + 1..] {
                assert_ne!(a.placements, b.placements);
            }
        }
    }
}
