// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Sector-based local update.
//!
//! A point's value is found by scanning the 27 sign sectors `(s1, s2, s3)` in
//! `{-1, 0, +1}^3`. Sectors with every sign non-zero use the full local equation,
//! sectors with one zero sign use its 2D face analogue and sectors with two zero
//! signs reduce to a closed 1D form. Lower-dimensional sectors are only tried when
//! the adjacent higher-dimensional ones produced nothing.

/// A root found in one sector together with the raw control vector at that root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorRoot {
    /// Candidate value for the point.
    pub root: f64,
    /// Raw optimal dynamics. Components on zero-sign axes are 0.
    pub dynamics: [f64; 3],
}

/// The winning sector of a point update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorSolution {
    /// Minimum root over all sectors.
    pub value: f64,
    /// Normalized optimal dynamics of the winning sector.
    pub dynamics: [f64; 3],
    /// Signs of the winning sector.
    pub sector: [i8; 3],
}

/// The six axis neighbors of a point, as read by the marcher.
///
/// Unreadable or out-of-grid neighbors carry the unreached sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborValues {
    /// Value one step in the negative direction along each axis.
    pub lo: [f64; 3],
    /// Value one step in the positive direction along each axis.
    pub hi: [f64; 3],
    /// Value stored at the point itself.
    pub center: f64,
}

impl NeighborValues {
    /// Value read along `axis` for sign `s`; the center value when `s == 0`.
    #[inline]
    pub fn along(&self, axis: usize, s: i8) -> f64 {
        match s {
            s if s < 0 => self.lo[axis],
            s if s > 0 => self.hi[axis],
            _ => self.center,
        }
    }

    /// The three values seen by sector `signs`.
    #[inline]
    pub fn for_sector(&self, signs: [i8; 3]) -> [f64; 3] {
        [
            self.along(0, signs[0]),
            self.along(1, signs[1]),
            self.along(2, signs[2]),
        ]
    }
}

/// Local solver hooks used by [`solve_point`].
///
/// `u` always holds the neighbor values seen by the sector; entries on zero-sign
/// axes are unspecified. Hooks are only called when every neighbor they need is
/// reachable.
pub trait SectorSolver {
    /// False for points that must never be evaluated or enter the front.
    fn is_admissible(&self, _index: usize) -> bool {
        true
    }

    /// Solve a sector with all three signs non-zero.
    fn solve_full(&self, index: usize, u: [f64; 3], signs: [i8; 3]) -> Option<SectorRoot>;

    /// Solve a sector whose sign on `zero_axis` is 0.
    fn solve_face(
        &self,
        index: usize,
        u: [f64; 3],
        signs: [i8; 3],
        zero_axis: usize,
    ) -> Option<SectorRoot>;

    /// Solve a sector whose only non-zero sign is on `axis`.
    fn solve_edge(
        &self,
        index: usize,
        u: [f64; 3],
        signs: [i8; 3],
        axis: usize,
    ) -> Option<SectorRoot>;

    /// Turn the raw dynamics of the winning sector into the recorded control.
    fn normalize_dynamics(&self, _index: usize, raw: [f64; 3]) -> [f64; 3] {
        raw
    }
}

impl<S: SectorSolver + ?Sized> SectorSolver for &S {
    fn is_admissible(&self, index: usize) -> bool {
        (**self).is_admissible(index)
    }

    fn solve_full(&self, index: usize, u: [f64; 3], signs: [i8; 3]) -> Option<SectorRoot> {
        (**self).solve_full(index, u, signs)
    }

    fn solve_face(
        &self,
        index: usize,
        u: [f64; 3],
        signs: [i8; 3],
        zero_axis: usize,
    ) -> Option<SectorRoot> {
        (**self).solve_face(index, u, signs, zero_axis)
    }

    fn solve_edge(
        &self,
        index: usize,
        u: [f64; 3],
        signs: [i8; 3],
        axis: usize,
    ) -> Option<SectorRoot> {
        (**self).solve_edge(index, u, signs, axis)
    }

    fn normalize_dynamics(&self, index: usize, raw: [f64; 3]) -> [f64; 3] {
        (**self).normalize_dynamics(index, raw)
    }
}

/// Flat index of a sector: `(s1+1)*9 + (s2+1)*3 + (s3+1)`.
#[inline]
pub fn sector_index(signs: [i8; 3]) -> usize {
    let [a, b, c] = signs.map(|s| (s + 1) as usize);
    a * 9 + b * 3 + c
}

/// Inverse of [`sector_index`].
#[inline]
pub fn sector_signs(index: usize) -> [i8; 3] {
    [
        (index / 9) as i8 - 1,
        ((index / 3) % 3) as i8 - 1,
        (index % 3) as i8 - 1,
    ]
}

/// Both roots of `a*t^2 + b*t + c = 0`, larger first.
///
/// Returns `None` when the discriminant is negative or `a` is zero.
pub fn solve_quadratic(a: f64, b: f64, c: f64) -> Option<(f64, f64)> {
    let delta = b * b - 4.0 * a * c;
    if delta < 0.0 || a == 0.0 {
        return None;
    }
    let sqrt_delta = delta.sqrt();
    Some(((-b + sqrt_delta) / a / 2.0, (-b - sqrt_delta) / a / 2.0))
}

const SIGNS: [i8; 2] = [-1, 1];

/// Per-update sector bookkeeping.
struct SectorTable {
    exists: [bool; 27],
    roots: [Option<SectorRoot>; 27],
}

impl SectorTable {
    fn new() -> Self {
        SectorTable {
            exists: [false; 27],
            roots: [None; 27],
        }
    }

    #[inline]
    fn exists(&self, signs: [i8; 3]) -> bool {
        self.exists[sector_index(signs)]
    }

    fn record(&mut self, signs: [i8; 3], found: Option<SectorRoot>) {
        let k = sector_index(signs);
        self.exists[k] = found.is_some();
        self.roots[k] = found;
    }

    /// Flag a sector as solved without giving it a root.
    fn mark(&mut self, signs: [i8; 3]) {
        self.exists[sector_index(signs)] = true;
    }
}

/// Evaluate one point over all 27 sectors and return the minimum root.
///
/// `unreached` is the sentinel used for unreadable neighbors; any neighbor value
/// at or above it disables the sectors that need it. Returns `None` when no
/// sector produced a root below `unreached`.
pub fn solve_point<S: SectorSolver + ?Sized>(
    solver: &S,
    index: usize,
    nbrs: &NeighborValues,
    unreached: f64,
) -> Option<SectorSolution> {
    let reachable = |u: f64| u < unreached;
    let mut table = SectorTable::new();

    for s1 in SIGNS {
        for s2 in SIGNS {
            for s3 in SIGNS {
                let signs = [s1, s2, s3];
                let u = nbrs.for_sector(signs);
                let found = if u.iter().all(|&v| reachable(v)) {
                    solver.solve_full(index, u, signs)
                } else {
                    None
                };
                table.record(signs, found);
            }
        }
    }

    // Faces. A face adjacent to a solved full sector is marked, not solved.
    for zero_axis in 0..3 {
        for a in SIGNS {
            for b in SIGNS {
                let signs = face_signs(zero_axis, a, b);
                let mut lo = signs;
                lo[zero_axis] = -1;
                let mut hi = signs;
                hi[zero_axis] = 1;
                if table.exists(lo) || table.exists(hi) {
                    table.mark(signs);
                    continue;
                }
                let u = nbrs.for_sector(signs);
                let found = if (0..3)
                    .filter(|&ax| ax != zero_axis)
                    .all(|ax| reachable(u[ax]))
                {
                    solver.solve_face(index, u, signs, zero_axis)
                } else {
                    None
                };
                table.record(signs, found);
            }
        }
    }

    // Edges, gated on the four faces around them. Axis 2 first, then 1, then 0.
    for axis in [2, 1, 0] {
        let (p, q) = other_axes(axis);
        for s in SIGNS {
            let mut signs = [0i8; 3];
            signs[axis] = s;
            let gated = SIGNS.iter().any(|&t| {
                let mut around_p = signs;
                around_p[p] = t;
                let mut around_q = signs;
                around_q[q] = t;
                table.exists(around_p) || table.exists(around_q)
            });
            if gated {
                continue;
            }
            let u = nbrs.for_sector(signs);
            let found = if reachable(u[axis]) {
                solver.solve_edge(index, u, signs, axis)
            } else {
                None
            };
            table.record(signs, found);
        }
    }

    let mut best: Option<(usize, SectorRoot)> = None;
    let mut min_root = unreached;
    for (k, slot) in table.roots.iter().enumerate() {
        if let Some(r) = slot {
            if min_root > r.root {
                min_root = r.root;
                best = Some((k, *r));
            }
        }
    }

    best.map(|(k, r)| SectorSolution {
        value: r.root,
        dynamics: solver.normalize_dynamics(index, r.dynamics),
        sector: sector_signs(k),
    })
}

/// Sector with sign 0 on `zero_axis` and signs `a`, `b` on the other two axes in order.
fn face_signs(zero_axis: usize, a: i8, b: i8) -> [i8; 3] {
    match zero_axis {
        0 => [0, a, b],
        1 => [a, 0, b],
        _ => [a, b, 0],
    }
}

fn other_axes(axis: usize) -> (usize, usize) {
    match axis {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Hook {
        Full,
        Face,
        Edge,
    }

    /// Returns a fixed root for listed sectors and logs every call.
    #[derive(Default)]
    struct ScriptedSolver {
        roots: HashMap<[i8; 3], f64>,
        calls: RefCell<Vec<(Hook, [i8; 3])>>,
    }

    impl ScriptedSolver {
        fn with_roots(roots: &[([i8; 3], f64)]) -> Self {
            ScriptedSolver {
                roots: roots.iter().copied().collect(),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn answer(&self, hook: Hook, signs: [i8; 3]) -> Option<SectorRoot> {
            self.calls.borrow_mut().push((hook, signs));
            self.roots.get(&signs).map(|&root| SectorRoot {
                root,
                dynamics: signs.map(|s| -(s as f64)),
            })
        }

        fn called(&self, hook: Hook, signs: [i8; 3]) -> bool {
            self.calls.borrow().contains(&(hook, signs))
        }
    }

    impl SectorSolver for ScriptedSolver {
        fn solve_full(&self, _: usize, _: [f64; 3], signs: [i8; 3]) -> Option<SectorRoot> {
            self.answer(Hook::Full, signs)
        }

        fn solve_face(
            &self,
            _: usize,
            _: [f64; 3],
            signs: [i8; 3],
            zero_axis: usize,
        ) -> Option<SectorRoot> {
            assert_eq!(signs[zero_axis], 0);
            self.answer(Hook::Face, signs)
        }

        fn solve_edge(
            &self,
            _: usize,
            _: [f64; 3],
            signs: [i8; 3],
            axis: usize,
        ) -> Option<SectorRoot> {
            assert_ne!(signs[axis], 0);
            assert_eq!(signs.iter().filter(|&&s| s == 0).count(), 2);
            self.answer(Hook::Edge, signs)
        }
    }

    fn all_zero() -> NeighborValues {
        NeighborValues {
            lo: [0.0; 3],
            hi: [0.0; 3],
            center: 0.0,
        }
    }

    #[test]
    fn sector_index_layout() {
        assert_eq!(sector_index([-1, -1, -1]), 0);
        assert_eq!(sector_index([0, 0, 0]), 13);
        assert_eq!(sector_index([1, 1, 1]), 26);
        assert_eq!(sector_index([1, 0, -1]), 21);
        for k in 0..27 {
            assert_eq!(sector_index(sector_signs(k)), k);
        }
    }

    #[test]
    fn quadratic_roots() {
        let (t1, t2) = solve_quadratic(1.0, -3.0, 2.0).unwrap();
        assert_eq!((t1, t2), (2.0, 1.0));
        assert!(solve_quadratic(1.0, 0.0, 1.0).is_none());
        assert!(solve_quadratic(0.0, 1.0, 1.0).is_none());
    }

    #[test]
    fn no_hooks_succeed_calls_everything() {
        let solver = ScriptedSolver::default();
        let result = solve_point(&solver, 0, &all_zero(), f64::MAX);
        assert!(result.is_none());
        let calls = solver.calls.borrow();
        assert_eq!(calls.iter().filter(|c| c.0 == Hook::Full).count(), 8);
        assert_eq!(calls.iter().filter(|c| c.0 == Hook::Face).count(), 12);
        assert_eq!(calls.iter().filter(|c| c.0 == Hook::Edge).count(), 6);
    }

    #[test]
    fn full_sector_prunes_adjacent_faces_and_edges() {
        let solver = ScriptedSolver::with_roots(&[([1, 1, 1], 3.0)]);
        let result = solve_point(&solver, 0, &all_zero(), f64::MAX).unwrap();
        assert_eq!(result.value, 3.0);
        assert_eq!(result.sector, [1, 1, 1]);

        // The three faces around (1,1,1) are marked instead of solved.
        assert!(!solver.called(Hook::Face, [0, 1, 1]));
        assert!(!solver.called(Hook::Face, [1, 0, 1]));
        assert!(!solver.called(Hook::Face, [1, 1, 0]));
        assert!(solver.called(Hook::Face, [0, -1, -1]));

        // Marked faces gate the edges that touch them.
        assert!(!solver.called(Hook::Edge, [0, 0, 1]));
        assert!(!solver.called(Hook::Edge, [0, 1, 0]));
        assert!(!solver.called(Hook::Edge, [1, 0, 0]));
        assert!(solver.called(Hook::Edge, [0, 0, -1]));
        assert!(solver.called(Hook::Edge, [-1, 0, 0]));
    }

    #[test]
    fn face_root_gates_edges() {
        let solver = ScriptedSolver::with_roots(&[([0, -1, 1], 2.0), ([0, 0, -1], 1.5)]);
        let result = solve_point(&solver, 0, &all_zero(), f64::MAX).unwrap();
        // (0,-1,1) is adjacent to edges (0,0,1) and (0,-1,0).
        assert!(!solver.called(Hook::Edge, [0, 0, 1]));
        assert!(!solver.called(Hook::Edge, [0, -1, 0]));
        assert!(solver.called(Hook::Edge, [0, 0, -1]));
        assert_eq!(result.value, 1.5);
        assert_eq!(result.sector, [0, 0, -1]);
    }

    #[test]
    fn minimum_over_sectors_wins() {
        let solver = ScriptedSolver::with_roots(&[
            ([1, 1, 1], 4.0),
            ([-1, -1, -1], 2.5),
            ([-1, 1, -1], 3.0),
        ]);
        let result = solve_point(&solver, 0, &all_zero(), f64::MAX).unwrap();
        assert_eq!(result.value, 2.5);
        assert_eq!(result.sector, [-1, -1, -1]);
        assert_eq!(result.dynamics, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn ties_keep_lowest_sector_index() {
        let solver = ScriptedSolver::with_roots(&[([1, 1, 1], 2.0), ([-1, 1, 1], 2.0)]);
        let result = solve_point(&solver, 0, &all_zero(), f64::MAX).unwrap();
        assert_eq!(result.sector, [-1, 1, 1]);
    }

    #[test]
    fn unreached_neighbors_skip_hooks() {
        let big = f64::MAX;
        let nbrs = NeighborValues {
            lo: [0.0, big, big],
            hi: [big, big, big],
            center: big,
        };
        let solver = ScriptedSolver::with_roots(&[([-1, 0, 0], 1.0), ([1, 0, 0], 0.5)]);
        let result = solve_point(&solver, 0, &nbrs, big).unwrap();
        assert_eq!(result.value, 1.0);
        assert_eq!(result.sector, [-1, 0, 0]);
        let calls = solver.calls.borrow();
        assert_eq!(calls.as_slice(), &[(Hook::Edge, [-1, 0, 0])]);
    }

    #[test]
    fn roots_at_or_above_sentinel_are_ignored() {
        let solver = ScriptedSolver::with_roots(&[([1, 1, 1], 10.0)]);
        assert!(solve_point(&solver, 0, &all_zero(), 10.0).is_none());
    }
}
