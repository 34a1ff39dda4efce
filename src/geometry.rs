//! Rectangle predicates and whole-arrangement transforms.
//!
//! Every transform is pure: it takes a placement list and returns a new one.
//! Transforms map the container onto itself except [`rotate90`], which maps a
//! `w x h` container onto an `h x w` one.

use crate::types::{Placement, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BoundingBox {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }
}

/// True iff the two rectangles share positive area. Touching edges do not
/// count.
pub fn overlaps(a: &Placement, b: &Placement) -> bool {
    a.x < b.right() && b.x < a.right() && a.y < b.top() && b.y < a.top()
}

/// True iff `p` lies within `[0, container.w] x [0, container.h]`.
pub fn contains(container: Rect, p: &Placement) -> bool {
    p.right() <= container.w && p.top() <= container.h
}

pub fn bounding_box(placements: &[Placement]) -> Option<BoundingBox> {
    let first = placements.first()?;
    let init = BoundingBox {
        min_x: first.x,
        min_y: first.y,
        max_x: first.right(),
        max_y: first.top(),
    };
    Some(placements.iter().skip(1).fold(init, |bb, p| BoundingBox {
        min_x: bb.min_x.min(p.x),
        min_y: bb.min_y.min(p.y),
        max_x: bb.max_x.max(p.right()),
        max_y: bb.max_y.max(p.top()),
    }))
}

/// Translate every placement so the combined bounding box is centred in the
/// container. Leaves the arrangement untouched if it cannot fit.
pub fn center(placements: &[Placement], container: Rect) -> Vec<Placement> {
    let Some(bb) = bounding_box(placements) else {
        return Vec::new();
    };
    if bb.width() > container.w || bb.height() > container.h {
        return placements.to_vec();
    }
    let target_x = (container.w - bb.width()) / 2;
    let target_y = (container.h - bb.height()) / 2;
    placements
        .iter()
        .map(|p| Placement {
            x: p.x - bb.min_x + target_x,
            y: p.y - bb.min_y + target_y,
            ..*p
        })
        .collect()
}

/// Rotate the arrangement a quarter turn. The result lives in the container
/// `container.rotated()`.
pub fn rotate90(placements: &[Placement], container: Rect) -> Vec<Placement> {
    placements.iter().map(|p| rotate90_one(*p, container)).collect()
}

pub fn rotate180(placements: &[Placement], container: Rect) -> Vec<Placement> {
    placements.iter().map(|p| rotate180_one(*p, container)).collect()
}

/// Three quarter turns. The result lives in the container `container.rotated()`.
pub fn rotate270(placements: &[Placement], container: Rect) -> Vec<Placement> {
    placements.iter().map(|p| rotate270_one(*p, container)).collect()
}

pub fn flip_horizontal(placements: &[Placement], container: Rect) -> Vec<Placement> {
    placements
        .iter()
        .map(|p| flip_horizontal_one(*p, container))
        .collect()
}

pub fn flip_vertical(placements: &[Placement], container: Rect) -> Vec<Placement> {
    placements
        .iter()
        .map(|p| flip_vertical_one(*p, container))
        .collect()
}

pub(crate) fn identity_one(p: Placement, _container: Rect) -> Placement {
    p
}

pub(crate) fn rotate90_one(p: Placement, container: Rect) -> Placement {
    Placement {
        rect: p.rect.rotated(),
        x: p.y,
        y: container.w - p.x - p.rect.w,
        orientation: p.orientation.toggle(),
    }
}

pub(crate) fn rotate180_one(p: Placement, container: Rect) -> Placement {
    Placement {
        x: container.w - p.x - p.rect.w,
        y: container.h - p.y - p.rect.h,
        ..p
    }
}

pub(crate) fn rotate270_one(p: Placement, container: Rect) -> Placement {
    Placement {
        rect: p.rect.rotated(),
        x: container.h - p.y - p.rect.h,
        y: p.x,
        orientation: p.orientation.toggle(),
    }
}

pub(crate) fn flip_horizontal_one(p: Placement, container: Rect) -> Placement {
    Placement {
        x: container.w - p.x - p.rect.w,
        ..p
    }
}

pub(crate) fn flip_vertical_one(p: Placement, container: Rect) -> Placement {
    Placement {
        y: container.h - p.y - p.rect.h,
        ..p
    }
}

/// Reflection across the main diagonal. Only closes over a square container.
pub(crate) fn transpose_one(p: Placement, _container: Rect) -> Placement {
    Placement {
        rect: p.rect.rotated(),
        x: p.y,
        y: p.x,
        orientation: p.orientation.toggle(),
    }
}

/// Reflection across the anti-diagonal. Only closes over a square container.
pub(crate) fn anti_transpose_one(p: Placement, container: Rect) -> Placement {
    Placement {
        rect: p.rect.rotated(),
        x: container.h - p.y - p.rect.h,
        y: container.w - p.x - p.rect.w,
        orientation: p.orientation.toggle(),
    }
}

pub fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 { a } else { gcd(b, a % b) }
}

/// Side length of the coarsest lattice that loses no packing of `tile`.
///
/// Any packing can be compacted towards the lower-left corner until every
/// coordinate is a sum of tile sides, so coordinates stay multiples of
/// `gcd(tile.w, tile.h)`.
pub fn lattice_unit(tile: Rect) -> u32 {
    gcd(tile.w, tile.h).max(1)
}
