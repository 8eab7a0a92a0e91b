//! Cleanup role: cascading destruction.

use tether_backend::{DestroyCommand, Payload};
use tether_buffer::CommandBuffer;
use tether_core::{CleanupOp, DispatchError};

use super::{ensure_complete, Outcome, RouteContext};

/// Decode and apply one cleanup command.
///
/// Destroying an object first destroys every constraint attached to it,
/// then the object, then wakes the bodies on the far side of those
/// constraints. A stale index is a no-op.
pub fn cleanup(
    op: CleanupOp,
    buf: &mut CommandBuffer,
    ctx: &mut RouteContext<'_>,
) -> Result<Outcome, DispatchError> {
    let CleanupOp::Destroy = op;
    let cmd = DestroyCommand::decode(buf)?;
    ensure_complete(buf)?;

    let Some(removal) = ctx.tracker.remove_cascade(cmd.index) else {
        log::debug!("destroy of {} ignored: not live", cmd.index);
        return Ok(Outcome::Skipped);
    };

    let mut first_error = None;
    for object in &removal.removed {
        if let Err(e) = ctx.backend.destroy(object.native) {
            log::warn!("destroying {} ({}) failed: {e}", object.index, object.native);
            first_error.get_or_insert(e);
        }
    }
    for native in &removal.wake {
        if let Err(e) = ctx.backend.wake(*native) {
            log::debug!("waking {native} after cleanup failed: {e}");
        }
    }

    Ok(match first_error {
        None => Outcome::Applied,
        Some(e) => Outcome::failed(&e, Some(cmd.index)),
    })
}

#[cfg(test)]
mod tests {
    use super::super::tests::Harness;
    use super::*;
    use tether_backend::Command;
    use tether_core::{Index, ObjectKind};
    use tether_test_utils::fixtures;

    fn chain(h: &mut Harness) {
        let (bodies, joints) = fixtures::chain();
        let mut buf = CommandBuffer::new();
        for b in &bodies {
            b.write_to(&mut buf);
        }
        for j in &joints {
            j.write_to(&mut buf);
        }
        h.route(&mut buf).unwrap();
    }

    #[test]
    fn middle_of_chain_cascades() {
        let mut h = Harness::new();
        chain(&mut h);
        let native = |h: &Harness, i: u32| h.tracker.get(Index(i)).unwrap().native;
        let (a, b, c) = (native(&h, 0), native(&h, 1), native(&h, 2));
        let (j1, j2) = (native(&h, 10), native(&h, 11));

        let mut buf = CommandBuffer::new();
        DestroyCommand { index: Index(1) }.write_to(&mut buf);
        assert_eq!(h.route(&mut buf).unwrap().applied, 1);

        let destroyed = h.backend.probe().destroyed();
        assert_eq!(destroyed.len(), 3);
        assert_eq!(destroyed[2], b);
        assert!(destroyed[..2].contains(&j1) && destroyed[..2].contains(&j2));

        let mut woken = h.backend.probe().woken();
        woken.sort();
        assert_eq!(woken, vec![a, c]);

        assert_eq!(h.tracker.count(ObjectKind::Constraint), 0);
        assert!(h.tracker.get(Index(0)).unwrap().constraints.is_empty());
        assert!(h.tracker.get(Index(2)).unwrap().constraints.is_empty());
    }

    #[test]
    fn stale_destroy_is_a_no_op() {
        let mut h = Harness::new();
        chain(&mut h);
        let mut buf = CommandBuffer::new();
        DestroyCommand { index: Index(1) }.write_to(&mut buf);
        DestroyCommand { index: Index(1) }.write_to(&mut buf);
        DestroyCommand { index: Index(77) }.write_to(&mut buf);

        let stats = h.route(&mut buf).unwrap();
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.failed, 0);
        assert!(h.reports().is_empty());
    }

    #[test]
    fn destroying_a_constraint_keeps_its_bodies() {
        let mut h = Harness::new();
        chain(&mut h);
        let mut buf = CommandBuffer::new();
        DestroyCommand { index: Index(10) }.write_to(&mut buf);
        h.route(&mut buf).unwrap();

        assert!(h.tracker.contains(Index(0)));
        assert!(h.tracker.contains(Index(1)));
        assert_eq!(
            h.tracker.get(Index(1)).unwrap().constraints.as_slice(),
            &[Index(11)]
        );
    }
}
