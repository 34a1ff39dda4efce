use std::time::{Duration, Instant};

use tile_packer::config::SolverConfig;
use tile_packer::deadline::Deadline;
use tile_packer::geometry;
use tile_packer::solver::{self, HybridSolver, PackingSolver};
use tile_packer::symmetry;
use tile_packer::types::{Problem, ProofStatus, Rect, Solution, SolverKind};
use tile_packer::validation;

fn far() -> Deadline {
    Deadline::after(Duration::from_secs(60))
}

fn assert_solution_valid(solution: &Solution, problem: &Problem) {
    let (ok, violations) = validation::valid(solution, problem);
    assert!(ok, "{} produced an invalid solution: {violations:?}", solution.solver);
}

fn cheap_tiers() -> Vec<SolverKind> {
    vec![
        SolverKind::Mathematical,
        SolverKind::Greedy,
        SolverKind::Backtrack,
        SolverKind::Hybrid,
    ]
}

#[test]
fn every_tier_returns_valid_solutions() {
    let config = SolverConfig::default().with_time_limit(Duration::from_secs(1));
    let cases = [
        (20, 20, 5, 5),
        (30, 20, 6, 8),
        (23, 17, 5, 5),
        (10, 4, 4, 10),
        (13, 11, 3, 2),
        (40, 25, 7, 6),
    ];
    for (cw, ch, tw, th) in cases {
        for rotate in [true, false] {
            let problem = Problem::new(Rect::new(cw, ch), Rect::new(tw, th)).with_rotation(rotate);
            for kind in cheap_tiers() {
                let solution = solver::for_kind(kind, &config)
                    .solve(&problem, Deadline::after(Duration::from_secs(1)))
                    .unwrap();
                assert_solution_valid(&solution, &problem);
                assert!(solution.tile_count() <= problem.theoretical_max_tiles());
            }
        }
    }
}

#[test]
fn efficiency_matches_covered_area() {
    let problem = Problem::new(Rect::new(30, 20), Rect::new(6, 8));
    let solution = HybridSolver::new(SolverConfig::default())
        .solve(&problem, far())
        .unwrap();
    let expected = (solution.tile_count() as u64 * problem.tile_area()) as f64
        / problem.container_area() as f64
        * 100.0;
    assert!((solution.efficiency() - expected).abs() < 1e-9);
}

#[test]
fn hybrid_finds_and_enumerates_mixed_optimum() {
    let problem = Problem::new(Rect::new(30, 20), Rect::new(6, 8)).with_max_solutions(Some(4));
    let solver = HybridSolver::new(SolverConfig::default());

    let best = solver.solve(&problem, far()).unwrap();
    assert_eq!(best.tile_count(), 12);
    assert!((best.efficiency() - 96.0).abs() < 1e-9);
    assert_eq!(best.proof, ProofStatus::ProvenOptimal);

    let all = solver.solve_all_optimal(&problem, 4, far()).unwrap();
    assert!(!all.is_empty() && all.len() <= 4);
    for (i, a) in all.iter().enumerate() {
        assert_solution_valid(a, &problem);
        assert_eq!(a.tile_count(), 12);
        for b in &all[i + 1..] {
            assert!(!symmetry::are_equivalent(a, b));
        }
    }
}

#[test]
fn centring_is_idempotent_and_preserves_validity() {
    let problem = Problem::new(Rect::new(23, 17), Rect::new(5, 5)).with_centering(false);
    let raw = solver::for_kind(SolverKind::Greedy, &SolverConfig::default())
        .solve(&problem, far())
        .unwrap();
    let once = raw.centered();
    let twice = once.centered();
    assert_eq!(once.placements, twice.placements);
    assert!(once.is_centered());
    assert_solution_valid(&once, &problem);
    assert_eq!(once.tile_count(), raw.tile_count());
}

#[test]
fn whole_rotation_round_trip() {
    let problem = Problem::new(Rect::new(30, 20), Rect::new(6, 8));
    let solution = solver::for_kind(SolverKind::Mathematical, &SolverConfig::default())
        .solve(&problem, far())
        .unwrap();
    let container = problem.container();
    let mut placements = solution.placements.clone();
    let mut current = container;
    for _ in 0..4 {
        placements = geometry::rotate90(&placements, current);
        current = current.rotated();
    }
    let mut expected = solution.placements.clone();
    expected.sort_by_key(|p| (p.x, p.y));
    placements.sort_by_key(|p| (p.x, p.y));
    assert_eq!(placements, expected);
}

#[test]
fn symmetric_images_are_equivalent() {
    let problem = Problem::new(Rect::new(30, 20), Rect::new(6, 8)).with_centering(false);
    let solution = solver::for_kind(SolverKind::Backtrack, &SolverConfig::default())
        .solve(&problem, far())
        .unwrap();
    for s in symmetry::group(problem.container()) {
        let image = Solution::new(
            s.apply(&solution.placements, problem.container()),
            problem.container(),
            SolverKind::Backtrack,
        );
        assert_solution_valid(&image, &problem);
        assert!(symmetry::are_equivalent(&solution, &image), "{} image differs", s.name);
    }
}

#[test]
fn rotation_never_reduces_the_optimum() {
    for (cw, ch, tw, th) in [(30, 20, 6, 8), (10, 4, 4, 10), (11, 7, 2, 3)] {
        let with = Problem::new(Rect::new(cw, ch), Rect::new(tw, th));
        let without = with.clone().with_rotation(false);
        let config = SolverConfig::default().with_time_limit(Duration::from_secs(5));
        let solver = HybridSolver::new(config);
        let a = solver.solve(&with, far()).unwrap();
        let b = solver.solve(&without, far()).unwrap();
        assert!(a.tile_count() >= b.tile_count(), "{cw}x{ch} with {tw}x{th}");
    }
}

#[test]
fn infeasible_problems_yield_empty_solutions() {
    let problems = [
        Problem::new(Rect::new(10, 10), Rect::new(11, 11)),
        Problem::new(Rect::new(10, 4), Rect::new(4, 10)).with_rotation(false),
        Problem::new(Rect::new(0, 10), Rect::new(2, 2)),
        Problem::new(Rect::new(10, 10), Rect::new(2, 2)).with_max_tiles(Some(0)),
    ];
    for problem in &problems {
        for kind in cheap_tiers() {
            let solution = solver::for_kind(kind, &SolverConfig::default())
                .solve(problem, far())
                .unwrap();
            assert!(solution.is_empty());
            assert_eq!(solution.efficiency(), 0.0);
            assert!(solution.metadata.contains_key("reason"));
        }
    }
}

#[test]
fn timeout_returns_incumbent_promptly() {
    let problem = Problem::new(Rect::new(50, 50), Rect::new(7, 11));
    let started = Instant::now();
    let solution = solver::for_kind(SolverKind::Backtrack, &SolverConfig::default())
        .solve(&problem, Deadline::after(Duration::from_millis(100)))
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(solution.tile_count() > 0);
    assert!(solution.time_limit_reached);
    assert_eq!(solution.proof, ProofStatus::FeasibleUnproven);
    assert_solution_valid(&solution, &problem);
}

#[test]
fn oversized_lattice_still_answers() {
    let problem = Problem::new(Rect::new(2001, 2000), Rect::new(7, 11));
    let started = Instant::now();
    let solution = solver::for_kind(SolverKind::Backtrack, &SolverConfig::default())
        .solve(&problem, Deadline::after(Duration::from_millis(50)))
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(solution.tile_count() > 0);
    assert!(solution.time_limit_reached);
    assert_eq!(solution.proof, ProofStatus::FeasibleUnproven);
    assert!(solution.metadata.contains_key("reason"));
    assert_solution_valid(&solution, &problem);
}

#[test]
fn hybrid_on_large_container_respects_time_limit() {
    let problem = Problem::new(Rect::new(3000, 3000), Rect::new(3, 7))
        .with_time_limit(Some(Duration::from_millis(200)));
    let started = Instant::now();
    let solution = HybridSolver::new(SolverConfig::default())
        .solve(&problem, far())
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(solution.tile_count() >= 428_000);
    assert!(solution.is_centered());
    assert_solution_valid(&solution, &problem);
}

#[test]
fn max_tiles_caps_every_tier() {
    let problem = Problem::new(Rect::new(20, 20), Rect::new(5, 5)).with_max_tiles(Some(7));
    for kind in cheap_tiers() {
        let solution = solver::for_kind(kind, &SolverConfig::default())
            .solve(&problem, far())
            .unwrap();
        assert_solution_valid(&solution, &problem);
        assert_eq!(solution.tile_count(), 7, "{kind}");
    }
}

#[cfg(feature = "ilp")]
#[test]
fn ilp_agrees_with_backtracking_on_small_instances() {
    let config = SolverConfig::default();
    for (cw, ch, tw, th) in [(7, 5, 2, 3), (10, 10, 5, 5), (9, 6, 2, 4)] {
        let problem = Problem::new(Rect::new(cw, ch), Rect::new(tw, th));
        let ilp = solver::for_kind(SolverKind::Ilp, &config)
            .solve(&problem, far())
            .unwrap();
        let exact = solver::for_kind(SolverKind::Backtrack, &config)
            .solve(&problem, far())
            .unwrap();
        assert_solution_valid(&ilp, &problem);
        assert_eq!(ilp.tile_count(), exact.tile_count(), "{cw}x{ch} with {tw}x{th}");
        assert_eq!(ilp.proof, ProofStatus::ProvenOptimal);
    }
}

#[cfg(feature = "ilp")]
#[test]
fn ilp_stops_near_a_short_deadline() {
    let problem = Problem::new(Rect::new(29, 23), Rect::new(4, 7));
    let started = Instant::now();
    let solution = solver::for_kind(SolverKind::Ilp, &SolverConfig::default())
        .solve(&problem, Deadline::after(Duration::from_millis(20)))
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(solution.time_limit_reached);
    assert_eq!(solution.proof, ProofStatus::FeasibleUnproven);
    assert_solution_valid(&solution, &problem);
}
