// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::core::{Grid3, PointState};
use crate::error::{MarchError, Result};
use crate::queue::{NodeHandle, PairingHeap};
use crate::scheme::{solve_point, NeighborValues, SectorSolver};

/// A point at the moment it is finalized.
#[derive(Debug, Clone, Copy)]
pub struct AcceptedPoint<'a> {
    /// Linear index.
    pub index: usize,
    /// Grid coordinate.
    pub coord: [usize; 3],
    /// Stored (sign-adjusted) value.
    pub value: f64,
    /// Normalized optimal dynamics, zero for seeds.
    pub dynamics: [f64; 3],
    /// True if the point kept its seeded value and has no upwind source.
    pub seeded: bool,
    /// Grid the point lives on.
    pub grid: &'a Grid3,
}

/// Hook invoked each time the marcher finalizes a point.
pub trait AcceptObserver {
    /// Called once per accepted point, in acceptance order.
    fn on_accept(&mut self, point: &AcceptedPoint<'_>);

    /// Drop any per-run state.
    fn reset(&mut self) {}
}

impl AcceptObserver for () {
    fn on_accept(&mut self, _point: &AcceptedPoint<'_>) {}
}

impl<A: AcceptObserver, B: AcceptObserver> AcceptObserver for (A, B) {
    fn on_accept(&mut self, point: &AcceptedPoint<'_>) {
        self.0.on_accept(point);
        self.1.on_accept(point);
    }

    fn reset(&mut self) {
        self.0.reset();
        self.1.reset();
    }
}

impl<T: AcceptObserver + ?Sized> AcceptObserver for Box<T> {
    fn on_accept(&mut self, point: &AcceptedPoint<'_>) {
        (**self).on_accept(point);
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}

impl<T: AcceptObserver> AcceptObserver for Vec<T> {
    fn on_accept(&mut self, point: &AcceptedPoint<'_>) {
        for observer in self.iter_mut() {
            observer.on_accept(point);
        }
    }

    fn reset(&mut self) {
        for observer in self.iter_mut() {
            observer.reset();
        }
    }
}

/// Records the optimal dynamics of every accepted point.
#[derive(Debug, Clone)]
pub struct DynamicsField {
    data: Vec<[f64; 3]>,
}

impl DynamicsField {
    /// Zeroed field for `num_nodes` points.
    pub fn new(num_nodes: usize) -> Self {
        DynamicsField {
            data: vec![[0.0; 3]; num_nodes],
        }
    }

    /// Dynamics of one point.
    pub fn get(&self, index: usize) -> [f64; 3] {
        self.data[index]
    }

    /// Per-point vectors.
    pub fn as_slice(&self) -> &[[f64; 3]] {
        &self.data
    }

    /// Flatten to three consecutive scalar fields, one per component.
    pub fn component_major(&self) -> Vec<f64> {
        let n = self.data.len();
        let mut out = vec![0.0; 3 * n];
        for (i, v) in self.data.iter().enumerate() {
            out[i] = v[0];
            out[i + n] = v[1];
            out[i + 2 * n] = v[2];
        }
        out
    }
}

impl AcceptObserver for DynamicsField {
    fn on_accept(&mut self, point: &AcceptedPoint<'_>) {
        self.data[point.index] = point.dynamics;
    }

    fn reset(&mut self) {
        self.data.fill([0.0; 3]);
    }
}

/// Direction in which stored values grow away from the seeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// Values increase from the seeds (distance-like).
    #[default]
    Increasing,
    /// Values decrease from the seeds.
    Decreasing,
}

impl Orientation {
    /// `+1.0` or `-1.0`.
    pub fn factor(self) -> f64 {
        match self {
            Orientation::Increasing => 1.0,
            Orientation::Decreasing => -1.0,
        }
    }
}

/// Outcome of one call to [`Marcher::run_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Points accepted during this run.
    pub accepted: usize,
    /// Trial points sent back to Far because the limit was reached.
    pub flushed: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Candidate {
    dynamics: [f64; 3],
    source: Option<usize>,
}

/// Single-threaded fast-marching engine.
///
/// Points move Far -> Trial -> Alive. Forbidden points never enter the front
/// and read as unreached. The engine pops the Trial point with the smallest
/// value, finalizes it, notifies the observer and re-evaluates its Far and
/// Trial neighbors through the sector solver.
pub struct Marcher<S, O = ()> {
    grid: Grid3,
    scheme: S,
    observer: O,
    orientation: Orientation,
    unreached: f64,
    boundary_evaluation: bool,
    values: Vec<f64>,
    states: Vec<PointState>,
    handles: Vec<Option<NodeHandle>>,
    queue: PairingHeap<usize>,
    accepted: Vec<usize>,
    candidates: Vec<Candidate>,
    labels: Option<Vec<f64>>,
}

impl<S: SectorSolver, O: AcceptObserver> Marcher<S, O> {
    /// Create a marcher over `grid`.
    ///
    /// Every point starts Far with the unreached value, except points the
    /// scheme reports as inadmissible, which start Forbidden.
    pub fn new(grid: Grid3, scheme: S, observer: O) -> Self {
        let n = grid.num_nodes();
        let states = (0..n)
            .map(|i| {
                if scheme.is_admissible(i) {
                    PointState::Far
                } else {
                    PointState::Forbidden
                }
            })
            .collect();
        let unreached = f64::MAX;
        Marcher {
            grid,
            scheme,
            observer,
            orientation: Orientation::Increasing,
            unreached,
            boundary_evaluation: false,
            values: vec![unreached; n],
            states,
            handles: vec![None; n],
            queue: PairingHeap::with_capacity(n.min(1 << 16)),
            accepted: Vec::new(),
            candidates: vec![Candidate::default(); n],
            labels: None,
        }
    }

    /// Set the unreached sentinel (builder method). Default is `f64::MAX`.
    ///
    /// Resets every stored value, so call it before seeding.
    pub fn with_unreached(mut self, unreached: f64) -> Self {
        self.unreached = unreached;
        self.values.fill(self.orientation.factor() * unreached);
        self
    }

    /// Set the orientation (builder method). Default is [`Orientation::Increasing`].
    ///
    /// Resets every stored value, so call it before seeding.
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self.values.fill(orientation.factor() * self.unreached);
        self
    }

    /// Also evaluate points on the grid faces (builder method).
    ///
    /// Out-of-grid neighbors read as unreached. Off by default, in which case
    /// face points never receive a value.
    pub fn with_boundary_evaluation(mut self, enabled: bool) -> Self {
        self.boundary_evaluation = enabled;
        self
    }

    /// Propagate labels from the neighbor each value came from (builder method).
    ///
    /// # Errors
    /// Returns `ShapeMismatch` if `labels` does not have one entry per point.
    pub fn with_labels(mut self, labels: Vec<f64>) -> Result<Self> {
        if labels.len() != self.grid.num_nodes() {
            return Err(MarchError::ShapeMismatch {
                expected: vec![self.grid.num_nodes()],
                got: vec![labels.len()],
            });
        }
        self.labels = Some(labels);
        Ok(self)
    }

    /// The grid.
    pub fn grid(&self) -> &Grid3 {
        &self.grid
    }

    /// The sector solver.
    pub fn scheme(&self) -> &S {
        &self.scheme
    }

    /// The accept observer.
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Mutable access to the accept observer.
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Orientation of the stored values.
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Unreached sentinel.
    pub fn unreached(&self) -> f64 {
        self.unreached
    }

    /// Stored values, one per point.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Propagated labels, if any.
    pub fn labels(&self) -> Option<&[f64]> {
        self.labels.as_deref()
    }

    /// Points in acceptance order, seeds added with [`Self::add_alive_point`] included.
    pub fn accepted(&self) -> &[usize] {
        &self.accepted
    }

    /// Number of points currently in the front.
    pub fn num_trial(&self) -> usize {
        self.queue.len()
    }

    /// Stored value at a coordinate.
    pub fn value_at(&self, coord: [usize; 3]) -> f64 {
        self.values[self.grid.offset(coord)]
    }

    /// State of a coordinate.
    pub fn state(&self, coord: [usize; 3]) -> PointState {
        self.states[self.grid.offset(coord)]
    }

    /// Consume the marcher, returning the value field and the observer.
    pub fn into_parts(self) -> (Vec<f64>, O) {
        (self.values, self.observer)
    }

    /// Write a value at a point before it is seeded.
    ///
    /// # Errors
    /// Returns `InvalidSeed` if the point is outside the grid or Forbidden.
    pub fn set_value(&mut self, coord: [usize; 3], value: f64) -> Result<()> {
        let n = self.checked_offset(coord)?;
        self.values[n] = value;
        Ok(())
    }

    /// Put a Far point in the front using its stored value.
    ///
    /// Trial and Alive points are left untouched.
    ///
    /// # Errors
    /// Returns `InvalidSeed` if the point is outside the grid or Forbidden.
    pub fn add_trial_point(&mut self, coord: [usize; 3]) -> Result<()> {
        let n = self.checked_offset(coord)?;
        self.push_trial(n);
        Ok(())
    }

    /// Finalize a Far point with its stored value without queueing it.
    ///
    /// # Errors
    /// Returns `InvalidSeed` if the point is outside the grid or Forbidden.
    pub fn add_alive_point(&mut self, coord: [usize; 3]) -> Result<()> {
        let n = self.checked_offset(coord)?;
        if self.states[n] == PointState::Far {
            self.states[n] = PointState::Alive;
            self.accepted.push(n);
        }
        Ok(())
    }

    /// Exclude a Far point for the lifetime of the marcher.
    ///
    /// # Errors
    /// Returns `InvalidSeed` if the point is outside the grid.
    pub fn add_forbidden_point(&mut self, coord: [usize; 3]) -> Result<()> {
        if !self.grid.contains(coord) {
            return Err(MarchError::InvalidSeed {
                coord,
                reason: "outside the grid".to_string(),
            });
        }
        let n = self.grid.offset(coord);
        if self.states[n] == PointState::Far {
            self.states[n] = PointState::Forbidden;
            self.values[n] = self.orientation.factor() * self.unreached;
        }
        Ok(())
    }

    /// Put every Far neighbor of the Alive points in the front, using the values
    /// already stored at those neighbors.
    pub fn init_trial_from_alive(&mut self) {
        let alive = self.accepted.clone();
        for index in alive {
            for axis in 0..3 {
                for dir in [-1i8, 1] {
                    if let Some(nb) = self.grid.neighbor(index, axis, dir) {
                        self.push_trial(nb);
                    }
                }
            }
        }
    }

    /// March until the front is exhausted.
    pub fn run(&mut self) -> RunSummary {
        let limit = self.orientation.factor() * self.unreached;
        self.run_until(limit)
    }

    /// March until the smallest front value reaches `limit`.
    ///
    /// `limit` is expressed like the stored values (negated for
    /// [`Orientation::Decreasing`]). When it is reached, every remaining Trial
    /// point goes back to Far with its value set to `limit`.
    pub fn run_until(&mut self, limit: f64) -> RunSummary {
        let sign = self.orientation.factor();
        let stop_key = (sign * limit).min(self.unreached);
        let before = self.accepted.len();
        let mut flushed = 0;

        loop {
            let key = match self.queue.peek() {
                Some((key, _)) => key,
                None => break,
            };
            if key >= stop_key {
                flushed = self.flush(sign * stop_key);
                break;
            }
            let Some((_, index)) = self.queue.pop() else {
                break;
            };
            self.accept(index);
            for axis in 0..3 {
                for dir in [-1i8, 1] {
                    if let Some(nb) = self.grid.neighbor(index, axis, dir) {
                        self.update_point(nb);
                    }
                }
            }
        }

        let summary = RunSummary {
            accepted: self.accepted.len() - before,
            flushed,
        };
        log::debug!(
            "march finished: {} accepted, {} flushed at limit {}",
            summary.accepted,
            summary.flushed,
            limit
        );
        summary
    }

    /// Return to the state right after construction.
    ///
    /// Forbidden points stay Forbidden. Labels are kept as they are.
    pub fn reset(&mut self) {
        for state in self.states.iter_mut() {
            if *state != PointState::Forbidden {
                *state = PointState::Far;
            }
        }
        self.values.fill(self.orientation.factor() * self.unreached);
        self.handles.fill(None);
        self.queue.clear();
        self.accepted.clear();
        self.candidates.fill(Candidate::default());
        self.observer.reset();
    }

    fn checked_offset(&self, coord: [usize; 3]) -> Result<usize> {
        if !self.grid.contains(coord) {
            return Err(MarchError::InvalidSeed {
                coord,
                reason: "outside the grid".to_string(),
            });
        }
        let n = self.grid.offset(coord);
        if self.states[n] == PointState::Forbidden {
            return Err(MarchError::InvalidSeed {
                coord,
                reason: "point is forbidden".to_string(),
            });
        }
        Ok(n)
    }

    fn push_trial(&mut self, n: usize) {
        if self.states[n] == PointState::Far {
            self.states[n] = PointState::Trial;
            let key = self.orientation.factor() * self.values[n];
            self.handles[n] = Some(self.queue.push(key, n));
        }
    }

    /// Internal (positive) value of a readable point, the sentinel otherwise.
    #[inline]
    fn read(&self, n: usize) -> f64 {
        if self.states[n].is_readable() {
            self.orientation.factor() * self.values[n]
        } else {
            self.unreached
        }
    }

    fn read_neighbor(&self, index: usize, axis: usize, dir: i8) -> f64 {
        self.grid
            .neighbor(index, axis, dir)
            .map_or(self.unreached, |nb| self.read(nb))
    }

    fn evaluate(&self, index: usize) -> (f64, Candidate) {
        if !self.boundary_evaluation && self.grid.is_boundary(self.grid.coord(index)) {
            return (self.unreached, Candidate::default());
        }
        let nbrs = NeighborValues {
            lo: std::array::from_fn(|axis| self.read_neighbor(index, axis, -1)),
            hi: std::array::from_fn(|axis| self.read_neighbor(index, axis, 1)),
            center: self.read(index),
        };
        let Some(solution) = solve_point(&self.scheme, index, &nbrs, self.unreached) else {
            return (self.unreached, Candidate::default());
        };

        // Upwind neighbor with the smallest value among the active axes.
        let mut source = None;
        let mut best = self.unreached;
        for (axis, &s) in solution.sector.iter().enumerate() {
            if s == 0 {
                continue;
            }
            let v = nbrs.along(axis, s);
            if v < best {
                best = v;
                source = self.grid.neighbor(index, axis, s);
            }
        }

        (
            solution.value,
            Candidate {
                dynamics: solution.dynamics,
                source,
            },
        )
    }

    fn update_point(&mut self, n: usize) {
        let sign = self.orientation.factor();
        match self.states[n] {
            PointState::Far => {
                let (value, candidate) = self.evaluate(n);
                self.states[n] = PointState::Trial;
                self.values[n] = sign * value;
                self.candidates[n] = candidate;
                self.handles[n] = Some(self.queue.push(value, n));
            }
            PointState::Trial => {
                let (value, candidate) = self.evaluate(n);
                if value < sign * self.values[n] {
                    self.values[n] = sign * value;
                    self.candidates[n] = candidate;
                    if let Some(handle) = self.handles[n] {
                        self.queue.decrease_key(handle, value);
                    }
                }
            }
            PointState::Alive | PointState::Forbidden => {}
        }
    }

    fn accept(&mut self, index: usize) {
        self.states[index] = PointState::Alive;
        self.handles[index] = None;
        self.accepted.push(index);

        let candidate = self.candidates[index];
        if let (Some(labels), Some(src)) = (self.labels.as_mut(), candidate.source) {
            labels[index] = labels[src];
        }

        let point = AcceptedPoint {
            index,
            coord: self.grid.coord(index),
            value: self.values[index],
            dynamics: candidate.dynamics,
            seeded: candidate.source.is_none(),
            grid: &self.grid,
        };
        self.observer.on_accept(&point);
    }

    fn flush(&mut self, value: f64) -> usize {
        let mut flushed = 0;
        while let Some((_, n)) = self.queue.pop() {
            self.states[n] = PointState::Far;
            self.handles[n] = None;
            self.values[n] = value;
            flushed += 1;
        }
        flushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::TensorMetric;
    use nalgebra::Matrix3;

    fn identity_metric(n: usize) -> TensorMetric {
        let grid = Grid3::with_unit_spacing([n, n, n]).unwrap();
        TensorMetric::uniform(grid, Matrix3::identity()).unwrap()
    }

    fn seeded(metric: &TensorMetric, seed: [usize; 3]) -> Marcher<&TensorMetric> {
        let mut m = Marcher::new(metric.grid().clone(), metric, ());
        m.set_value(seed, 0.0).unwrap();
        m.add_trial_point(seed).unwrap();
        m
    }

    /// Records values in acceptance order.
    #[derive(Default)]
    struct Trace(Vec<(usize, f64)>);

    impl AcceptObserver for Trace {
        fn on_accept(&mut self, p: &AcceptedPoint<'_>) {
            self.0.push((p.index, p.value));
        }

        fn reset(&mut self) {
            self.0.clear();
        }
    }

    #[test]
    fn seed_and_axis_neighbors() {
        let metric = identity_metric(5);
        let mut m = seeded(&metric, [2, 2, 2]);
        let summary = m.run();
        assert_eq!(m.value_at([2, 2, 2]), 0.0);
        assert!((m.value_at([1, 2, 2]) - 1.0).abs() < 1e-12);
        assert!((m.value_at([2, 3, 2]) - 1.0).abs() < 1e-12);
        let diag = m.value_at([1, 1, 2]);
        assert!((diag - (1.0 + 0.5f64.sqrt())).abs() < 1e-12, "{}", diag);
        // 27 interior points accepted; the faces are flushed back to Far.
        assert_eq!(summary.accepted, 27);
        assert_eq!(m.state([0, 2, 2]), PointState::Far);
        assert_eq!(m.value_at([0, 2, 2]), f64::MAX);
        assert_eq!(m.num_trial(), 0);
    }

    #[test]
    fn boundary_evaluation_reaches_faces() {
        let metric = identity_metric(5);
        let mut m =
            Marcher::new(metric.grid().clone(), &metric, ()).with_boundary_evaluation(true);
        m.set_value([2, 2, 2], 0.0).unwrap();
        m.add_trial_point([2, 2, 2]).unwrap();
        m.run();
        assert!((m.value_at([0, 2, 2]) - 2.0).abs() < 1e-12);
        assert_eq!(m.state([0, 2, 2]), PointState::Alive);
        assert!(m.values().iter().all(|v| *v < f64::MAX));
    }

    #[test]
    fn forbidden_points_stay_unreached() {
        let grid = Grid3::with_unit_spacing([7, 7, 7]).unwrap();
        let n = grid.num_nodes();
        let mut mask = vec![1.0; n];
        let wall = grid.offset([3, 3, 3]);
        mask[wall] = 0.0;
        let tensor: Vec<f64> = (0..6)
            .flat_map(|c| {
                let v = if matches!(c, 0 | 3 | 5) { 1.0 } else { 0.0 };
                std::iter::repeat(v).take(n)
            })
            .collect();
        let metric = TensorMetric::new(grid, &tensor, Some(&mask)).unwrap();
        let mut m = seeded(&metric, [3, 3, 2]);
        m.run();
        assert_eq!(m.state([3, 3, 3]), PointState::Forbidden);
        assert_eq!(m.value_at([3, 3, 3]), f64::MAX);
        // The point behind the hole is reached around it, not through it.
        assert!(m.value_at([3, 3, 4]) > 2.0);
        assert!(m.set_value([3, 3, 3], 0.0).is_err());
    }

    #[test]
    fn limit_truncates_and_clamps() {
        let metric = identity_metric(11);
        let mut m = seeded(&metric, [5, 5, 5]);
        let summary = m.run_until(2.0);
        assert!(summary.flushed > 0);
        assert_eq!(m.num_trial(), 0);
        for (i, &v) in m.values().iter().enumerate() {
            let c = metric.grid().coord(i);
            match m.state(c) {
                PointState::Alive => assert!(v < 2.0, "alive value {} at {:?}", v, c),
                PointState::Far => {
                    assert!(v == 2.0 || v == f64::MAX, "far value {} at {:?}", v, c)
                }
                other => panic!("unexpected state {:?} at {:?}", other, c),
            }
        }
        // Reached (about 2.28) but still in the front when the limit hit.
        assert_eq!(m.value_at([6, 6, 6]), 2.0);
        assert_eq!(m.state([6, 6, 6]), PointState::Far);
    }

    #[test]
    fn reset_then_rerun_is_identical() {
        let metric = identity_metric(9);
        let grid = metric.grid().clone();
        let observer = (DynamicsField::new(grid.num_nodes()), Trace::default());
        let mut m = Marcher::new(grid, &metric, observer);
        m.set_value([4, 4, 4], 0.0).unwrap();
        m.add_trial_point([4, 4, 4]).unwrap();
        m.run();
        let first = m.values().to_vec();
        let first_dyn = m.observer().0.as_slice().to_vec();
        let first_order = m.accepted().to_vec();

        m.reset();
        assert!(m.accepted().is_empty());
        assert!(m.observer().1 .0.is_empty());
        m.set_value([4, 4, 4], 0.0).unwrap();
        m.add_trial_point([4, 4, 4]).unwrap();
        m.run();

        assert_eq!(first, m.values());
        assert_eq!(first_dyn.as_slice(), m.observer().0.as_slice());
        assert_eq!(first_order.as_slice(), m.accepted());
    }

    #[test]
    fn acceptance_order_is_monotone() {
        let metric = identity_metric(13);
        let grid = metric.grid().clone();
        let mut m = Marcher::new(grid, &metric, Trace::default());
        m.set_value([6, 6, 6], 0.0).unwrap();
        m.add_trial_point([6, 6, 6]).unwrap();
        m.run();
        let trace = &m.observer().0;
        for w in trace.windows(2) {
            assert!(w[1].1 >= w[0].1 - 1e-12, "{:?} then {:?}", w[0], w[1]);
        }
    }

    #[test]
    fn decreasing_orientation_mirrors_values() {
        let metric = identity_metric(7);
        let mut up = seeded(&metric, [3, 3, 3]);
        up.run();

        let mut down = Marcher::new(metric.grid().clone(), &metric, ())
            .with_orientation(Orientation::Decreasing);
        down.set_value([3, 3, 3], 0.0).unwrap();
        down.add_trial_point([3, 3, 3]).unwrap();
        down.run();

        for (a, b) in up.values().iter().zip(down.values()) {
            assert_eq!(*a, -*b);
        }
    }

    #[test]
    fn labels_follow_nearest_seed() {
        let metric = identity_metric(11);
        let grid = metric.grid().clone();
        let mut labels = vec![0.0; grid.num_nodes()];
        labels[grid.offset([2, 5, 5])] = 1.0;
        labels[grid.offset([8, 5, 5])] = 2.0;
        let mut m = Marcher::new(grid, &metric, ()).with_labels(labels).unwrap();
        for seed in [[2, 5, 5], [8, 5, 5]] {
            m.set_value(seed, 0.0).unwrap();
            m.add_trial_point(seed).unwrap();
        }
        m.run();
        let labels = m.labels().unwrap();
        let g = m.grid();
        assert_eq!(labels[g.offset([1, 5, 5])], 1.0);
        assert_eq!(labels[g.offset([3, 4, 6])], 1.0);
        assert_eq!(labels[g.offset([7, 5, 5])], 2.0);
        assert_eq!(labels[g.offset([8, 2, 7])], 2.0);
    }

    #[test]
    fn alive_seeds_start_the_front() {
        let metric = identity_metric(7);
        let mut m = Marcher::new(metric.grid().clone(), &metric, ());
        m.set_value([3, 3, 3], 0.0).unwrap();
        m.add_alive_point([3, 3, 3]).unwrap();
        m.set_value([2, 3, 3], 1.0).unwrap();
        m.init_trial_from_alive();
        assert_eq!(m.num_trial(), 6);
        m.run();
        assert_eq!(m.value_at([2, 3, 3]), 1.0);
        assert!((m.value_at([4, 3, 3]) - 1.0).abs() < 1e-12);
        assert_eq!(m.accepted()[0], m.grid().offset([3, 3, 3]));
    }

    #[test]
    fn seeding_outside_grid_fails() {
        let metric = identity_metric(5);
        let mut m = Marcher::new(metric.grid().clone(), &metric, ());
        assert!(matches!(
            m.add_trial_point([5, 0, 0]),
            Err(MarchError::InvalidSeed { .. })
        ));
        assert!(m.add_forbidden_point([0, 9, 0]).is_err());
    }

    #[test]
    fn label_length_is_checked() {
        let metric = identity_metric(5);
        let result =
            Marcher::new(metric.grid().clone(), &metric, ()).with_labels(vec![0.0; 3]);
        assert!(matches!(result, Err(MarchError::ShapeMismatch { .. })));
    }

    #[test]
    fn dynamics_field_layout() {
        let grid = Grid3::with_unit_spacing([3, 3, 3]).unwrap();
        let mut field = DynamicsField::new(grid.num_nodes());
        field.on_accept(&AcceptedPoint {
            index: 1,
            coord: grid.coord(1),
            value: 0.5,
            dynamics: [1.0, 2.0, 3.0],
            seeded: false,
            grid: &grid,
        });
        let flat = field.component_major();
        assert_eq!(flat[1], 1.0);
        assert_eq!(flat[1 + 27], 2.0);
        assert_eq!(flat[1 + 54], 3.0);
        field.reset();
        assert_eq!(field.get(1), [0.0; 3]);
    }
}
