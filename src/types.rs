use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::geometry::{self, BoundingBox};

/// Accepts `5`, `5.0` and rejects fractional or negative numbers.
pub fn deserialize_u32_from_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.fract() != 0.0 || value < 0.0 || value > u32::MAX as f64 {
        return Err(serde::de::Error::custom(format!(
            "expected a non-negative integer, got {value}"
        )));
    }
    Ok(value as u32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rect {
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub w: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub h: u32,
}

impl Rect {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    pub fn rotated(&self) -> Self {
        Self {
            w: self.h,
            h: self.w,
        }
    }

    pub fn fits_in(&self, other: &Rect) -> bool {
        self.w <= other.w && self.h <= other.h
    }

    pub fn is_square(&self) -> bool {
        self.w == self.h
    }

    pub fn is_degenerate(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Number of copies of `tile` an axis-aligned grid fits inside `self`.
    pub fn grid_count(&self, tile: Rect) -> u64 {
        if tile.is_degenerate() {
            return 0;
        }
        (self.w / tile.w) as u64 * (self.h / tile.h) as u64
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Original,
    Rotated,
}

impl Orientation {
    pub fn toggle(self) -> Self {
        match self {
            Orientation::Original => Orientation::Rotated,
            Orientation::Rotated => Orientation::Original,
        }
    }

    /// Extent of `tile` when laid in this orientation.
    pub fn extent(self, tile: Rect) -> Rect {
        match self {
            Orientation::Original => tile,
            Orientation::Rotated => tile.rotated(),
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::Original => write!(f, "original"),
            Orientation::Rotated => write!(f, "rotated"),
        }
    }
}

/// One tile copy; `(x, y)` is the lower-left corner in container coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub rect: Rect,
    pub x: u32,
    pub y: u32,
    pub orientation: Orientation,
}

impl Placement {
    pub fn new(x: u32, y: u32, rect: Rect, orientation: Orientation) -> Self {
        Self {
            rect,
            x,
            y,
            orientation,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.rect.w
    }

    pub fn top(&self) -> u32 {
        self.y + self.rect.h
    }

    pub fn contains_point(&self, x: u32, y: u32) -> bool {
        self.x <= x && x < self.right() && self.y <= y && y < self.top()
    }
}

/// An immutable packing instance. Build it with [`Problem::new`] and the
/// `with_*` methods; solvers only ever borrow it.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    container: Rect,
    tile: Rect,
    max_tiles: Option<usize>,
    allow_rotation: bool,
    center: bool,
    time_limit: Option<Duration>,
    max_solutions: Option<usize>,
}

impl Problem {
    pub fn new(container: Rect, tile: Rect) -> Self {
        Self {
            container,
            tile,
            max_tiles: None,
            allow_rotation: true,
            center: true,
            time_limit: None,
            max_solutions: None,
        }
    }

    pub fn with_rotation(mut self, allow_rotation: bool) -> Self {
        self.allow_rotation = allow_rotation;
        self
    }

    pub fn with_centering(mut self, center: bool) -> Self {
        self.center = center;
        self
    }

    pub fn with_max_tiles(mut self, max_tiles: Option<usize>) -> Self {
        self.max_tiles = max_tiles;
        self
    }

    pub fn with_time_limit(mut self, time_limit: Option<Duration>) -> Self {
        self.time_limit = time_limit;
        self
    }

    pub fn with_max_solutions(mut self, max_solutions: Option<usize>) -> Self {
        self.max_solutions = max_solutions;
        self
    }

    pub fn container(&self) -> Rect {
        self.container
    }

    pub fn tile(&self) -> Rect {
        self.tile
    }

    pub fn max_tiles(&self) -> Option<usize> {
        self.max_tiles
    }

    pub fn allow_rotation(&self) -> bool {
        self.allow_rotation
    }

    pub fn center(&self) -> bool {
        self.center
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit
    }

    pub fn max_solutions(&self) -> Option<usize> {
        self.max_solutions
    }

    pub fn container_area(&self) -> u64 {
        self.container.area()
    }

    pub fn tile_area(&self) -> u64 {
        self.tile.area()
    }

    /// `floor(container_area / tile_area)`, capped by `max_tiles` when set.
    pub fn theoretical_max_tiles(&self) -> usize {
        if self.tile_area() == 0 {
            return 0;
        }
        let by_area = (self.container_area() / self.tile_area()) as usize;
        match self.max_tiles {
            Some(cap) => by_area.min(cap),
            None => by_area,
        }
    }

    /// Orientations a placement may use: original first, rotated only when
    /// rotation is allowed and actually changes the extent.
    pub fn orientations(&self) -> Vec<(Orientation, Rect)> {
        let mut out = vec![(Orientation::Original, self.tile)];
        if self.allow_rotation && !self.tile.is_square() {
            out.push((Orientation::Rotated, self.tile.rotated()));
        }
        out
    }

    /// Orientations whose extent fits inside the container.
    pub fn fitting_orientations(&self) -> Vec<(Orientation, Rect)> {
        self.orientations()
            .into_iter()
            .filter(|(_, extent)| extent.fits_in(&self.container))
            .collect()
    }

    /// Why no tile can be placed, or `None` when the instance is solvable.
    pub fn feasibility_issue(&self) -> Option<String> {
        if self.container.is_degenerate() {
            return Some(format!(
                "container dimensions must be positive, got {}",
                self.container
            ));
        }
        if self.tile.is_degenerate() {
            return Some(format!(
                "tile dimensions must be positive, got {}",
                self.tile
            ));
        }
        if self.max_tiles == Some(0) {
            return Some("max_tiles is zero".to_string());
        }
        if self.fitting_orientations().is_empty() {
            return Some(format!(
                "tile {} does not fit in container {} in any allowed orientation",
                self.tile, self.container
            ));
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofStatus {
    /// The search space was exhausted, the backend certified optimality, or
    /// the count reached the area bound.
    ProvenOptimal,
    /// Best effort: a heuristic result or a search cut short by its deadline.
    FeasibleUnproven,
}

impl std::fmt::Display for ProofStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProofStatus::ProvenOptimal => write!(f, "proven_optimal"),
            ProofStatus::FeasibleUnproven => write!(f, "feasible_unproven"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    Mathematical,
    Greedy,
    Backtrack,
    Ilp,
    Hybrid,
}

impl SolverKind {
    pub fn name(self) -> &'static str {
        match self {
            SolverKind::Mathematical => "mathematical",
            SolverKind::Greedy => "greedy",
            SolverKind::Backtrack => "backtrack",
            SolverKind::Ilp => "ilp",
            SolverKind::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for SolverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Solution {
    pub placements: Vec<Placement>,
    pub container: Rect,
    pub solve_time: Duration,
    pub solver: SolverKind,
    pub proof: ProofStatus,
    pub time_limit_reached: bool,
    pub metadata: BTreeMap<String, String>,
}

impl Solution {
    pub fn new(placements: Vec<Placement>, container: Rect, solver: SolverKind) -> Self {
        Self {
            placements,
            container,
            solve_time: Duration::ZERO,
            solver,
            proof: ProofStatus::FeasibleUnproven,
            time_limit_reached: false,
            metadata: BTreeMap::new(),
        }
    }

    /// Zero placements. An empty answer to a problem with no room for a tile
    /// is trivially optimal.
    pub fn empty(problem: &Problem, solver: SolverKind) -> Self {
        Self::new(Vec::new(), problem.container(), solver)
    }

    /// Empty solution for an instance that cannot hold a single tile.
    pub fn infeasible(problem: &Problem, solver: SolverKind, reason: String) -> Self {
        Self::empty(problem, solver)
            .with_proof(ProofStatus::ProvenOptimal)
            .with_meta("reason", reason)
    }

    pub fn with_meta(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_proof(mut self, proof: ProofStatus) -> Self {
        self.proof = proof;
        self
    }

    pub fn with_solve_time(mut self, solve_time: Duration) -> Self {
        self.solve_time = solve_time;
        self
    }

    pub fn with_time_limit_reached(mut self, reached: bool) -> Self {
        self.time_limit_reached = reached;
        self
    }

    pub fn tile_count(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn used_area(&self) -> u64 {
        self.placements.iter().map(|p| p.rect.area()).sum()
    }

    /// Percentage of the container covered by tiles.
    pub fn efficiency(&self) -> f64 {
        let container_area = self.container.area();
        if container_area == 0 {
            return 0.0;
        }
        self.used_area() as f64 / container_area as f64 * 100.0
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        geometry::bounding_box(&self.placements)
    }

    /// Whether the bounding box sits in the middle of the container, within
    /// one unit on each axis.
    pub fn is_centered(&self) -> bool {
        let Some(bb) = self.bounding_box() else {
            return true;
        };
        let expected_x = self.container.w.saturating_sub(bb.width()) / 2;
        let expected_y = self.container.h.saturating_sub(bb.height()) / 2;
        bb.min_x.abs_diff(expected_x) <= 1 && bb.min_y.abs_diff(expected_y) <= 1
    }

    /// Index of the placement covering the unit cell at `(x, y)`.
    pub fn tile_at(&self, x: u32, y: u32) -> Option<usize> {
        self.placements.iter().position(|p| p.contains_point(x, y))
    }

    /// A copy translated so its bounding box is centred in the container.
    pub fn centered(&self) -> Self {
        Self {
            placements: geometry::center(&self.placements, self.container),
            ..self.clone()
        }
    }
}
