//! Executor-side map between protocol indices and backend objects.
//!
//! Objects are partitioned by [`ObjectKind`] so the stepper can walk all
//! characters or all dynamic bodies without filtering. The engine reports
//! by [`NativeHandle`] while the protocol addresses by [`Index`], so both
//! directions are kept.

use std::collections::HashMap;

use indexmap::IndexSet;
use smallvec::SmallVec;
use tether_core::{Index, MotionType, NativeHandle, ObjectKind, TrackedKind, TrackerError};

use crate::motion::MotionState;

/// One object living in the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedObject {
    /// Protocol handle.
    pub index: Index,
    /// Backend handle.
    pub native: NativeHandle,
    /// Kind and kind-specific data.
    pub kind: TrackedKind,
    /// Pose history, present only for interpolated objects.
    pub motion: Option<MotionState>,
    /// Constraints that name this object as an endpoint.
    pub constraints: SmallVec<[Index; 4]>,
}

impl TrackedObject {
    /// Object with no motion history and no attached constraints.
    pub fn new(index: Index, native: NativeHandle, kind: TrackedKind) -> Self {
        Self {
            index,
            native,
            kind,
            motion: None,
            constraints: SmallVec::new(),
        }
    }

    /// Attach pose history.
    pub fn with_motion(mut self, motion: MotionState) -> Self {
        self.motion = Some(motion);
        self
    }
}

/// Outcome of [`Tracker::remove_cascade`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Removal {
    /// Removed objects: dependent constraints first, the target last.
    pub removed: Vec<TrackedObject>,
    /// Surviving constraint endpoints that lost a partner and should be
    /// woken so they do not stay asleep.
    pub wake: Vec<NativeHandle>,
}

/// Bidirectional index/native map, partitioned by kind.
#[derive(Debug, Default)]
pub struct Tracker {
    objects: HashMap<Index, TrackedObject>,
    by_native: HashMap<NativeHandle, Index>,
    partitions: [IndexSet<Index>; PARTITIONS],
}

const PARTITIONS: usize = ObjectKind::ALL.len();

fn slot(kind: ObjectKind) -> usize {
    match kind {
        ObjectKind::DynamicBody => 0,
        ObjectKind::KinematicBody => 1,
        ObjectKind::StaticBody => 2,
        ObjectKind::Character => 3,
        ObjectKind::Shape => 4,
        ObjectKind::Constraint => 5,
    }
}

impl Tracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `object` under its index.
    ///
    /// Constraints are attached to both endpoints, which must already be
    /// tracked.
    pub fn add(&mut self, object: TrackedObject) -> Result<(), TrackerError> {
        if self.objects.contains_key(&object.index) {
            return Err(TrackerError::IndexInUse(object.index));
        }
        if let Some((a, b)) = object.kind.endpoints() {
            for end in [a, b] {
                if !self.objects.contains_key(&end) {
                    return Err(TrackerError::UnknownEndpoint(end));
                }
            }
            for end in [a, b] {
                if let Some(endpoint) = self.objects.get_mut(&end) {
                    endpoint.constraints.push(object.index);
                }
            }
        }

        self.partitions[slot(object.kind.object_kind())].insert(object.index);
        self.by_native.insert(object.native, object.index);
        self.objects.insert(object.index, object);
        Ok(())
    }

    /// Object behind `index`.
    pub fn get(&self, index: Index) -> Option<&TrackedObject> {
        self.objects.get(&index)
    }

    /// Mutable object behind `index`.
    ///
    /// Changing `kind` through this reference skips re-partitioning; use
    /// [`set_motion_type`](Self::set_motion_type) for that.
    pub fn get_mut(&mut self, index: Index) -> Option<&mut TrackedObject> {
        self.objects.get_mut(&index)
    }

    /// Object backed by `native`.
    pub fn get_by_native(&self, native: NativeHandle) -> Option<&TrackedObject> {
        self.by_native.get(&native).and_then(|i| self.objects.get(i))
    }

    /// Protocol index of the object backed by `native`.
    pub fn index_of(&self, native: NativeHandle) -> Option<Index> {
        self.by_native.get(&native).copied()
    }

    /// Whether `index` is tracked.
    pub fn contains(&self, index: Index) -> bool {
        self.objects.contains_key(&index)
    }

    /// Number of tracked objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of tracked objects of `kind`.
    pub fn count(&self, kind: ObjectKind) -> usize {
        self.partitions[slot(kind)].len()
    }

    /// Indices of `kind`, in partition order.
    pub fn indices_of(&self, kind: ObjectKind) -> impl Iterator<Item = Index> + '_ {
        self.partitions[slot(kind)].iter().copied()
    }

    /// Objects of `kind`.
    pub fn iter_kind(&self, kind: ObjectKind) -> impl Iterator<Item = &TrackedObject> + '_ {
        self.partitions[slot(kind)]
            .iter()
            .filter_map(|i| self.objects.get(i))
    }

    /// Every object with pose history, in no particular order.
    pub fn motion_states_mut(
        &mut self,
    ) -> impl Iterator<Item = (Index, NativeHandle, &mut MotionState)> + '_ {
        self.objects
            .values_mut()
            .filter_map(|o| {
                let (index, native) = (o.index, o.native);
                o.motion.as_mut().map(|m| (index, native, m))
            })
    }

    /// Every object with pose history, sorted by index.
    pub fn motion_states(&self) -> Vec<(Index, &MotionState)> {
        let mut out: Vec<_> = self
            .objects
            .values()
            .filter_map(|o| o.motion.as_ref().map(|m| (o.index, m)))
            .collect();
        out.sort_unstable_by_key(|(i, _)| *i);
        out
    }

    /// Change a body's motion type and move it to the matching partition.
    ///
    /// Returns `false` if `index` is not a tracked body.
    pub fn set_motion_type(&mut self, index: Index, motion: MotionType) -> bool {
        let Some(object) = self.objects.get_mut(&index) else {
            return false;
        };
        let TrackedKind::Body { motion: old } = object.kind else {
            return false;
        };
        if old != motion {
            let from = object.kind.object_kind();
            object.kind = TrackedKind::Body { motion };
            let to = object.kind.object_kind();
            self.partitions[slot(from)].swap_remove(&index);
            self.partitions[slot(to)].insert(index);
        }
        true
    }

    /// Unregister one object. Removing an absent index is a no-op.
    ///
    /// A removed constraint is detached from both endpoints. Constraints
    /// attached to a removed body are left in place; use
    /// [`remove_cascade`](Self::remove_cascade) to drop them too.
    pub fn remove(&mut self, index: Index) -> Option<TrackedObject> {
        let object = self.objects.remove(&index)?;
        self.partitions[slot(object.kind.object_kind())].swap_remove(&index);
        if self.by_native.get(&object.native) == Some(&index) {
            self.by_native.remove(&object.native);
        }
        if let Some((a, b)) = object.kind.endpoints() {
            for end in [a, b] {
                if let Some(endpoint) = self.objects.get_mut(&end) {
                    endpoint.constraints.retain(|c| *c != index);
                }
            }
        }
        Some(object)
    }

    /// Unregister an object and every constraint that references it.
    ///
    /// Returns `None` if `index` is not tracked. Surviving endpoints of
    /// removed constraints are listed in [`Removal::wake`].
    pub fn remove_cascade(&mut self, index: Index) -> Option<Removal> {
        let target = self.objects.get(&index)?;
        let attached = target.constraints.clone();
        let mut removal = Removal::default();

        for constraint in attached {
            if let Some(removed) = self.remove(constraint) {
                removal.removed.push(removed);
            }
        }

        let object = self.remove(index)?;
        removal.removed.push(object);

        for removed in &removal.removed {
            let Some((a, b)) = removed.kind.endpoints() else {
                continue;
            };
            for end in [a, b] {
                if let Some(survivor) = self.objects.get(&end) {
                    if !removal.wake.contains(&survivor.native) {
                        removal.wake.push(survivor.native);
                    }
                }
            }
        }
        log::trace!(
            "removed {index} with {} dependents, waking {}",
            removal.removed.len() - 1,
            removal.wake.len()
        );
        Some(removal)
    }

    /// Drop every object.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.by_native.clear();
        for p in &mut self.partitions {
            p.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::Pose;

    fn body(i: u32) -> TrackedObject {
        TrackedObject::new(
            Index(i),
            NativeHandle(100 + i as u64),
            TrackedKind::Body {
                motion: MotionType::Dynamic,
            },
        )
        .with_motion(MotionState::new(Pose::IDENTITY))
    }

    fn joint(i: u32, a: u32, b: u32) -> TrackedObject {
        TrackedObject::new(
            Index(i),
            NativeHandle(100 + i as u64),
            TrackedKind::Constraint {
                body_a: Index(a),
                body_b: Index(b),
            },
        )
    }

    #[test]
    fn lookups_both_directions() {
        let mut t = Tracker::new();
        t.add(body(3)).unwrap();
        assert_eq!(t.get(Index(3)).unwrap().native, NativeHandle(103));
        assert_eq!(t.index_of(NativeHandle(103)), Some(Index(3)));
        assert_eq!(t.get_by_native(NativeHandle(103)).unwrap().index, Index(3));
        assert_eq!(t.count(ObjectKind::DynamicBody), 1);
    }

    #[test]
    fn duplicate_index_rejected() {
        let mut t = Tracker::new();
        t.add(body(1)).unwrap();
        assert_eq!(t.add(body(1)), Err(TrackerError::IndexInUse(Index(1))));
    }

    #[test]
    fn constraint_needs_endpoints() {
        let mut t = Tracker::new();
        t.add(body(1)).unwrap();
        assert_eq!(
            t.add(joint(5, 1, 2)),
            Err(TrackerError::UnknownEndpoint(Index(2)))
        );
        assert!(t.get(Index(1)).unwrap().constraints.is_empty());
    }

    #[test]
    fn remove_is_idempotent() {
        let mut t = Tracker::new();
        t.add(body(1)).unwrap();
        assert!(t.remove(Index(1)).is_some());
        assert!(t.remove(Index(1)).is_none());
        assert!(t.remove_cascade(Index(1)).is_none());
        assert!(t.is_empty());
        assert_eq!(t.count(ObjectKind::DynamicBody), 0);
        assert_eq!(t.index_of(NativeHandle(101)), None);
    }

    #[test]
    fn cascade_removes_constraints_and_wakes_neighbours() {
        let mut t = Tracker::new();
        for i in [1, 2, 3] {
            t.add(body(i)).unwrap();
        }
        t.add(joint(10, 1, 2)).unwrap();
        t.add(joint(11, 2, 3)).unwrap();
        assert_eq!(t.get(Index(2)).unwrap().constraints.len(), 2);

        let removal = t.remove_cascade(Index(2)).unwrap();
        let removed: Vec<_> = removal.removed.iter().map(|o| o.index).collect();
        assert_eq!(removed, vec![Index(10), Index(11), Index(2)]);

        let mut wake = removal.wake.clone();
        wake.sort();
        assert_eq!(wake, vec![NativeHandle(101), NativeHandle(103)]);

        assert_eq!(t.count(ObjectKind::Constraint), 0);
        assert!(t.get(Index(1)).unwrap().constraints.is_empty());
        assert!(t.get(Index(3)).unwrap().constraints.is_empty());
    }

    #[test]
    fn removing_constraint_wakes_both_ends() {
        let mut t = Tracker::new();
        t.add(body(1)).unwrap();
        t.add(body(2)).unwrap();
        t.add(joint(9, 1, 2)).unwrap();
        let removal = t.remove_cascade(Index(9)).unwrap();
        assert_eq!(removal.removed.len(), 1);
        assert_eq!(removal.wake.len(), 2);
        assert!(t.contains(Index(1)) && t.contains(Index(2)));
    }

    #[test]
    fn motion_type_change_repartitions() {
        let mut t = Tracker::new();
        t.add(body(4)).unwrap();
        assert!(t.set_motion_type(Index(4), MotionType::Kinematic));
        assert_eq!(t.count(ObjectKind::DynamicBody), 0);
        assert_eq!(t.indices_of(ObjectKind::KinematicBody).collect::<Vec<_>>(), vec![Index(4)]);
        assert!(!t.set_motion_type(Index(99), MotionType::Static));
    }

    #[test]
    fn motion_states_sorted() {
        let mut t = Tracker::new();
        for i in [5, 2, 9] {
            t.add(body(i)).unwrap();
        }
        let order: Vec<_> = t.motion_states().into_iter().map(|(i, _)| i).collect();
        assert_eq!(order, vec![Index(2), Index(5), Index(9)]);
        assert_eq!(t.motion_states_mut().count(), 3);
    }
}
