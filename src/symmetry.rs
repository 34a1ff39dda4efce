//! Canonical forms of arrangements under the container's symmetry group.
//!
//! A rectangular container is invariant under the identity, both flips and
//! the half turn. A square one additionally under the quarter turns and the
//! two diagonal reflections. The canonical representative of an arrangement
//! is the lexicographically smallest sorted placement list over the group.

use rustc_hash::FxHashSet;

use crate::geometry;
use crate::types::{Placement, Rect, Solution};

/// A pure per-placement transform mapping the container onto itself.
#[derive(Clone, Copy)]
pub struct Symmetry {
    pub name: &'static str,
    apply: fn(Placement, Rect) -> Placement,
}

impl Symmetry {
    pub fn apply(&self, placements: &[Placement], container: Rect) -> Vec<Placement> {
        placements
            .iter()
            .map(|&p| (self.apply)(p, container))
            .collect()
    }
}

impl std::fmt::Debug for Symmetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

const IDENTITY: Symmetry = Symmetry {
    name: "identity",
    apply: geometry::identity_one,
};
const FLIP_HORIZONTAL: Symmetry = Symmetry {
    name: "flip_horizontal",
    apply: geometry::flip_horizontal_one,
};
const FLIP_VERTICAL: Symmetry = Symmetry {
    name: "flip_vertical",
    apply: geometry::flip_vertical_one,
};
const ROTATE_180: Symmetry = Symmetry {
    name: "rotate_180",
    apply: geometry::rotate180_one,
};
const ROTATE_90: Symmetry = Symmetry {
    name: "rotate_90",
    apply: geometry::rotate90_one,
};
const ROTATE_270: Symmetry = Symmetry {
    name: "rotate_270",
    apply: geometry::rotate270_one,
};
const TRANSPOSE: Symmetry = Symmetry {
    name: "transpose",
    apply: geometry::transpose_one,
};
const ANTI_TRANSPOSE: Symmetry = Symmetry {
    name: "anti_transpose",
    apply: geometry::anti_transpose_one,
};

static RECTANGLE_GROUP: [Symmetry; 4] = [IDENTITY, FLIP_HORIZONTAL, FLIP_VERTICAL, ROTATE_180];

static SQUARE_GROUP: [Symmetry; 8] = [
    IDENTITY,
    FLIP_HORIZONTAL,
    FLIP_VERTICAL,
    ROTATE_180,
    ROTATE_90,
    ROTATE_270,
    TRANSPOSE,
    ANTI_TRANSPOSE,
];

pub fn group(container: Rect) -> &'static [Symmetry] {
    if container.is_square() {
        &SQUARE_GROUP
    } else {
        &RECTANGLE_GROUP
    }
}

/// Sorted `(x, y, w, h)` keys. The extent stands in for the orientation
/// flag: for an oblong tile they determine each other, and for a square
/// tile the flag carries no geometric meaning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalForm(Vec<(u32, u32, u32, u32)>);

impl CanonicalForm {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn normalized(placements: &[Placement]) -> Vec<(u32, u32, u32, u32)> {
    let mut keys: Vec<_> = placements
        .iter()
        .map(|p| (p.x, p.y, p.rect.w, p.rect.h))
        .collect();
    keys.sort_unstable();
    keys
}

pub fn canonical_form(placements: &[Placement], container: Rect) -> CanonicalForm {
    let best = group(container)
        .iter()
        .map(|s| normalized(&s.apply(placements, container)))
        .min()
        .unwrap_or_default();
    CanonicalForm(best)
}

pub fn are_equivalent(a: &Solution, b: &Solution) -> bool {
    a.container == b.container
        && a.tile_count() == b.tile_count()
        && canonical_form(&a.placements, a.container) == canonical_form(&b.placements, b.container)
}

/// Keep the first solution of every equivalence class, preserving order.
pub fn deduplicate(solutions: Vec<Solution>) -> Vec<Solution> {
    let mut seen = SignatureSet::default();
    solutions
        .into_iter()
        .filter(|s| seen.insert(&s.placements, s.container))
        .collect()
}

/// Names of the non-identity symmetries that map the arrangement onto itself.
pub fn detect(solution: &Solution) -> Vec<&'static str> {
    let base = normalized(&solution.placements);
    group(solution.container)
        .iter()
        .skip(1)
        .filter(|s| normalized(&s.apply(&solution.placements, solution.container)) == base)
        .map(|s| s.name)
        .collect()
}

/// Canonical forms recorded so far in one search or one pooling pass.
#[derive(Debug, Default)]
pub struct SignatureSet {
    seen: FxHashSet<CanonicalForm>,
}

impl SignatureSet {
    /// Records the arrangement; returns `false` if an equivalent one was
    /// already present.
    pub fn insert(&mut self, placements: &[Placement], container: Rect) -> bool {
        self.seen.insert(canonical_form(placements, container))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
