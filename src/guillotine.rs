use crate::types::{Orientation, Placement, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeRect {
    pub x: u32,
    pub y: u32,
    pub rect: Rect,
}

impl FreeRect {
    pub fn can_host(&self, extent: Rect) -> bool {
        extent.fits_in(&self.rect)
    }

    /// Squared distance from this rectangle's centre to the container's,
    /// in doubled coordinates so it stays integral.
    pub fn center_distance_sq(&self, container: Rect) -> u64 {
        let dx = (2 * self.x as i64 + self.rect.w as i64 - container.w as i64).unsigned_abs();
        let dy = (2 * self.y as i64 + self.rect.h as i64 - container.h as i64).unsigned_abs();
        dx * dx + dy * dy
    }
}

/// Which corner of a free rectangle a tile is pushed into. The two
/// remainders of the guillotine split sit on the opposite sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    LowerLeft,
    LowerRight,
    UpperLeft,
    UpperRight,
}

impl Anchor {
    fn flips(self) -> (bool, bool) {
        match self {
            Anchor::LowerLeft => (false, false),
            Anchor::LowerRight => (true, false),
            Anchor::UpperLeft => (false, true),
            Anchor::UpperRight => (true, true),
        }
    }

    /// The corner of `free` nearest the container centre.
    pub fn toward_center(free: &FreeRect, container: Rect) -> Self {
        let right = 2 * free.x as u64 + free.rect.w as u64 <= container.w as u64;
        let up = 2 * free.y as u64 + free.rect.h as u64 <= container.h as u64;
        match (right, up) {
            (false, false) => Anchor::LowerLeft,
            (true, false) => Anchor::LowerRight,
            (false, true) => Anchor::UpperLeft,
            (true, true) => Anchor::UpperRight,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoredPlacement {
    pub free_idx: usize,
    pub orientation: Orientation,
    pub extent: Rect,
    pub anchor: Anchor,
    /// Lower is better: (tiles lost in the remainders, short leftover side).
    pub score: (u64, u64),
}

/// Free-space bookkeeping for one container: a set of disjoint free
/// rectangles, initially the whole container, split guillotine-style as
/// tiles are placed.
#[derive(Debug, Clone)]
pub struct GuillotineBin {
    container: Rect,
    pub free_rects: Vec<FreeRect>,
    pub placements: Vec<Placement>,
}

impl GuillotineBin {
    pub fn new(container: Rect) -> Self {
        Self {
            container,
            free_rects: vec![FreeRect {
                x: 0,
                y: 0,
                rect: container,
            }],
            placements: Vec::new(),
        }
    }

    pub fn container(&self) -> Rect {
        self.container
    }

    pub fn used_area(&self) -> u64 {
        self.placements.iter().map(|p| p.rect.area()).sum()
    }

    pub fn free_area(&self) -> u64 {
        self.free_rects.iter().map(|f| f.rect.area()).sum()
    }

    /// Best orientation for a tile pushed into `anchor` of free rectangle
    /// `free_idx`, or `None` if no orientation fits there.
    ///
    /// An orientation scores by how many tiles its two remainders can still
    /// hold as plain grids, then by the shorter leftover side. Ties keep the
    /// earlier entry of `orientations`.
    pub fn find_best(
        &self,
        free_idx: usize,
        orientations: &[(Orientation, Rect)],
        anchor: Anchor,
    ) -> Option<ScoredPlacement> {
        let free = self.free_rects[free_idx];
        let mut best: Option<ScoredPlacement> = None;

        for &(orientation, extent) in orientations {
            if !free.can_host(extent) {
                continue;
            }
            let score = Self::score(free, extent, orientations);
            if best.is_none_or(|b| score < b.score) {
                best = Some(ScoredPlacement {
                    free_idx,
                    orientation,
                    extent,
                    anchor,
                    score,
                });
            }
        }

        best
    }

    fn score(free: FreeRect, extent: Rect, orientations: &[(Orientation, Rect)]) -> (u64, u64) {
        let capacity: u64 = Self::remainders(free, extent, Anchor::LowerLeft)
            .iter()
            .map(|r| {
                orientations
                    .iter()
                    .map(|&(_, e)| r.rect.grid_count(e))
                    .max()
                    .unwrap_or(0)
            })
            .sum();
        let short_side =
            std::cmp::min(free.rect.w - extent.w, free.rect.h - extent.h) as u64;
        (u64::MAX - capacity, short_side)
    }

    pub fn place(&mut self, scored: ScoredPlacement) -> Placement {
        let free = self.free_rects[scored.free_idx];
        let placed = scored.extent;
        debug_assert!(free.can_host(placed));
        let (flip_x, flip_y) = scored.anchor.flips();

        let x = if flip_x {
            free.x + free.rect.w - placed.w
        } else {
            free.x
        };
        let y = if flip_y {
            free.y + free.rect.h - placed.h
        } else {
            free.y
        };
        let placement = Placement::new(x, y, placed, scored.orientation);

        // Remove the used free rect and split
        self.free_rects.swap_remove(scored.free_idx);
        self.free_rects
            .extend(Self::remainders(free, placed, scored.anchor));
        self.placements.push(placement);
        self.coalesce();

        placement
    }

    /// Guillotine split of `free` around a tile pushed into `anchor`. The cut
    /// runs along the shorter leftover axis so the larger remainder spans the
    /// full side of `free`.
    fn remainders(free: FreeRect, placed: Rect, anchor: Anchor) -> Vec<FreeRect> {
        let right_w = free.rect.w - placed.w;
        let top_h = free.rect.h - placed.h;

        // Offsets local to `free` for a lower-left anchored tile
        let mut local: Vec<(u32, u32, Rect)> = Vec::with_capacity(2);
        if right_w > 0 && top_h > 0 {
            if right_w < top_h {
                // Right remainder is narrow, top remainder spans full width
                local.push((placed.w, 0, Rect::new(right_w, placed.h)));
                local.push((0, placed.h, Rect::new(free.rect.w, top_h)));
            } else {
                // Top remainder is narrow, right remainder spans full height
                local.push((placed.w, 0, Rect::new(right_w, free.rect.h)));
                local.push((0, placed.h, Rect::new(placed.w, top_h)));
            }
        } else if right_w > 0 {
            local.push((placed.w, 0, Rect::new(right_w, free.rect.h)));
        } else if top_h > 0 {
            local.push((0, placed.h, Rect::new(free.rect.w, top_h)));
        }

        let (flip_x, flip_y) = anchor.flips();
        local
            .into_iter()
            .map(|(lx, ly, rect)| FreeRect {
                x: free.x
                    + if flip_x {
                        free.rect.w - lx - rect.w
                    } else {
                        lx
                    },
                y: free.y
                    + if flip_y {
                        free.rect.h - ly - rect.h
                    } else {
                        ly
                    },
                rect,
            })
            .collect()
    }

    /// Fuses free rectangles that share a whole edge until no pair does.
    /// A grown rectangle may now fuse with one already passed, so the scan
    /// restarts after every fusion.
    fn coalesce(&mut self) {
        let mut i = 0;
        while i < self.free_rects.len() {
            let a = self.free_rects[i];
            let fused = self.free_rects[i + 1..]
                .iter()
                .enumerate()
                .find_map(|(k, &b)| Self::union(a, b).map(|u| (i + 1 + k, u)));
            match fused {
                Some((j, u)) => {
                    self.free_rects[i] = u;
                    self.free_rects.swap_remove(j);
                    i = 0;
                }
                None => i += 1,
            }
        }
    }

    /// The union of `a` and `b` when it is itself a rectangle.
    fn union(a: FreeRect, b: FreeRect) -> Option<FreeRect> {
        let (x, y) = (a.x.min(b.x), a.y.min(b.y));
        let side_by_side = a.y == b.y
            && a.rect.h == b.rect.h
            && (a.x + a.rect.w == b.x || b.x + b.rect.w == a.x);
        let stacked = a.x == b.x
            && a.rect.w == b.rect.w
            && (a.y + a.rect.h == b.y || b.y + b.rect.h == a.y);
        let rect = if side_by_side {
            Rect::new(a.rect.w + b.rect.w, a.rect.h)
        } else if stacked {
            Rect::new(a.rect.w, a.rect.h + b.rect.h)
        } else {
            return None;
        };
        Some(FreeRect { x, y, rect })
    }
}
