//! Independent checks of problems and solutions, and quality metrics.
//!
//! Solvers never call into this module; tests and the outer surfaces do.

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::geometry;
use crate::types::{Orientation, Problem, Solution};

/// Sanity-check a problem before solving. Returns whether any tile can be
/// placed, plus warnings about the instance.
pub fn feasible(problem: &Problem) -> (bool, Vec<String>) {
    let mut warnings = Vec::new();
    if let Some(reason) = problem.feasibility_issue() {
        warnings.push(reason);
        return (false, warnings);
    }

    let container = problem.container();
    let tile = problem.tile();
    if !tile.fits_in(&container) {
        warnings.push(format!(
            "tile {tile} fits container {container} only when rotated"
        ));
    }
    if problem.tile_area() * 2 > problem.container_area() {
        warnings.push(format!(
            "tile covers more than half of the container ({:.1}%)",
            problem.tile_area() as f64 / problem.container_area() as f64 * 100.0
        ));
    }
    if let Some(cap) = problem.max_tiles() {
        let by_area = (problem.container_area() / problem.tile_area()) as usize;
        if cap > by_area {
            warnings.push(format!(
                "max_tiles {cap} exceeds the area bound of {by_area}"
            ));
        }
    }
    (true, warnings)
}

/// Re-check every invariant of a solution against its problem. Returns
/// whether it holds, plus one message per violation.
pub fn valid(solution: &Solution, problem: &Problem) -> (bool, Vec<String>) {
    let mut violations = Vec::new();
    let container = problem.container();
    let tile = problem.tile();

    if solution.container != container {
        violations.push(format!(
            "solution container {} differs from problem container {}",
            solution.container, container
        ));
    }

    for (i, p) in solution.placements.iter().enumerate() {
        if !geometry::contains(container, p) {
            violations.push(format!(
                "placement {i} at ({}, {}) size {} leaves the container",
                p.x, p.y, p.rect
            ));
        }
        if p.rect != p.orientation.extent(tile) {
            violations.push(format!(
                "placement {i} has size {} but {} orientation means {}",
                p.rect,
                p.orientation,
                p.orientation.extent(tile)
            ));
        }
        if p.orientation == Orientation::Rotated && !problem.allow_rotation() {
            violations.push(format!("placement {i} is rotated but rotation is disabled"));
        }
    }

    // Bucket placements on a grid of tile-sized cells so only neighbours
    // are compared.
    let cell = tile.w.max(tile.h).max(1);
    let mut buckets: FxHashMap<(u32, u32), Vec<usize>> = FxHashMap::default();
    for (j, b) in solution.placements.iter().enumerate() {
        let mut neighbours = Vec::new();
        for cx in b.x / cell..=b.right().saturating_sub(1) / cell {
            for cy in b.y / cell..=b.top().saturating_sub(1) / cell {
                let bucket = buckets.entry((cx, cy)).or_default();
                neighbours.extend_from_slice(bucket);
                bucket.push(j);
            }
        }
        neighbours.sort_unstable();
        neighbours.dedup();
        for i in neighbours {
            if geometry::overlaps(&solution.placements[i], b) {
                violations.push(format!("placements {i} and {j} overlap"));
            }
        }
    }

    let count = solution.tile_count();
    if count as u64 * problem.tile_area() > problem.container_area() {
        violations.push(format!(
            "{count} tiles cover more than the container area"
        ));
    }
    if count > problem.theoretical_max_tiles() {
        violations.push(format!(
            "{count} tiles exceed the maximum of {}",
            problem.theoretical_max_tiles()
        ));
    }

    (violations.is_empty(), violations)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub tile_count: usize,
    /// Percentage of the container covered.
    pub efficiency: f64,
    /// Percentage of the bounding box covered.
    pub bounding_box_efficiency: f64,
    /// Bounding box width over height.
    pub aspect_ratio: f64,
    /// Distance between the bounding box centre and the container centre.
    pub center_deviation: f64,
    pub centered: bool,
    /// Tile count over the theoretical maximum.
    pub optimality_ratio: f64,
}

pub fn metrics(solution: &Solution, problem: &Problem) -> Metrics {
    let container = problem.container();
    let max = problem.theoretical_max_tiles();
    let optimality_ratio = if max == 0 {
        0.0
    } else {
        solution.tile_count() as f64 / max as f64
    };

    let (bounding_box_efficiency, aspect_ratio, center_deviation) = match solution.bounding_box() {
        Some(bb) => {
            let cx = (bb.min_x + bb.max_x) as f64 / 2.0;
            let cy = (bb.min_y + bb.max_y) as f64 / 2.0;
            let dx = cx - container.w as f64 / 2.0;
            let dy = cy - container.h as f64 / 2.0;
            (
                solution.used_area() as f64 / bb.area() as f64 * 100.0,
                bb.width() as f64 / bb.height() as f64,
                (dx * dx + dy * dy).sqrt(),
            )
        }
        None => (0.0, 0.0, 0.0),
    };

    Metrics {
        tile_count: solution.tile_count(),
        efficiency: solution.efficiency(),
        bounding_box_efficiency,
        aspect_ratio,
        center_deviation,
        centered: solution.is_centered(),
        optimality_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Placement, Rect, SolverKind};

    fn problem() -> Problem {
        Problem::new(Rect::new(10, 10), Rect::new(4, 2))
    }

    fn solution(placements: Vec<Placement>) -> Solution {
        Solution::new(placements, Rect::new(10, 10), SolverKind::Greedy)
    }

    #[test]
    fn test_feasible() {
        let (ok, warnings) = feasible(&problem());
        assert!(ok);
        assert!(warnings.is_empty());

        let (ok, warnings) = feasible(&Problem::new(Rect::new(10, 10), Rect::new(11, 3)));
        assert!(!ok);
        assert_eq!(warnings.len(), 1);

        let (ok, warnings) = feasible(&Problem::new(Rect::new(10, 4), Rect::new(3, 8)));
        assert!(ok);
        assert!(warnings.iter().any(|w| w.contains("only when rotated")));
    }

    #[test]
    fn test_valid_solution() {
        let sol = solution(vec![
            Placement::new(0, 0, Rect::new(4, 2), Orientation::Original),
            Placement::new(4, 0, Rect::new(4, 2), Orientation::Original),
            Placement::new(0, 2, Rect::new(2, 4), Orientation::Rotated),
        ]);
        let (ok, violations) = valid(&sol, &problem());
        assert!(ok, "{violations:?}");
    }

    #[test]
    fn test_detects_overlap_and_bounds() {
        let sol = solution(vec![
            Placement::new(0, 0, Rect::new(4, 2), Orientation::Original),
            Placement::new(2, 1, Rect::new(4, 2), Orientation::Original),
            Placement::new(8, 0, Rect::new(4, 2), Orientation::Original),
        ]);
        let (ok, violations) = valid(&sol, &problem());
        assert!(!ok);
        assert!(violations.iter().any(|v| v.contains("overlap")));
        assert!(violations.iter().any(|v| v.contains("leaves the container")));
    }

    #[test]
    fn test_detects_overlap_across_cells() {
        // The wide stray tile spans several cells and hits the last one
        let sol = solution(vec![
            Placement::new(0, 0, Rect::new(4, 2), Orientation::Original),
            Placement::new(6, 6, Rect::new(4, 2), Orientation::Original),
            Placement::new(1, 7, Rect::new(9, 1), Orientation::Original),
        ]);
        let (ok, violations) = valid(&sol, &problem());
        assert!(!ok);
        assert!(violations.contains(&"placements 1 and 2 overlap".to_string()));
        assert_eq!(violations.iter().filter(|v| v.contains("overlap")).count(), 1);
    }

    #[test]
    fn test_touching_edges_are_fine() {
        let sol = solution(vec![
            Placement::new(0, 0, Rect::new(4, 2), Orientation::Original),
            Placement::new(0, 2, Rect::new(4, 2), Orientation::Original),
        ]);
        assert!(valid(&sol, &problem()).0);
    }

    #[test]
    fn test_detects_wrong_extent_and_rotation() {
        let no_rotate = problem().with_rotation(false);
        let sol = solution(vec![
            Placement::new(0, 0, Rect::new(2, 4), Orientation::Rotated),
            Placement::new(5, 5, Rect::new(2, 4), Orientation::Original),
        ]);
        let (ok, violations) = valid(&sol, &no_rotate);
        assert!(!ok);
        assert!(violations.iter().any(|v| v.contains("rotation is disabled")));
        assert!(violations.iter().any(|v| v.contains("orientation means")));
    }

    #[test]
    fn test_detects_count_over_cap() {
        let capped = problem().with_max_tiles(Some(1));
        let sol = solution(vec![
            Placement::new(0, 0, Rect::new(4, 2), Orientation::Original),
            Placement::new(4, 0, Rect::new(4, 2), Orientation::Original),
        ]);
        let (ok, violations) = valid(&sol, &capped);
        assert!(!ok);
        assert!(violations.iter().any(|v| v.contains("exceed the maximum")));
    }

    #[test]
    fn test_metrics() {
        let sol = solution(vec![
            Placement::new(1, 4, Rect::new(4, 2), Orientation::Original),
            Placement::new(5, 4, Rect::new(4, 2), Orientation::Original),
        ]);
        let m = metrics(&sol, &problem());
        assert_eq!(m.tile_count, 2);
        assert!((m.efficiency - 16.0).abs() < 1e-9);
        assert!((m.bounding_box_efficiency - 100.0).abs() < 1e-9);
        assert!((m.aspect_ratio - 4.0).abs() < 1e-9);
        assert!(m.center_deviation.abs() < 1e-9);
        assert!(m.centered);
        assert!((m.optimality_ratio - 2.0 / 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_empty() {
        let m = metrics(&solution(Vec::new()), &problem());
        assert_eq!(m.tile_count, 0);
        assert_eq!(m.efficiency, 0.0);
        assert!(m.centered);
    }
}
