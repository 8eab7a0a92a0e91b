//! Batch profiles for benchmarking the Tether protocol.
//!
//! - [`body_grid`]: `n` dynamic spheres laid out on a square grid
//! - [`mixed_batch`]: one frame's worth of creates, modifies and queries
//! - [`frame_churn`]: per-frame velocity updates for an existing grid

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use tether_backend::{BodyDesc, Command, ModifyCommand, RayQuery, ShapeDesc};
use tether_buffer::CommandBuffer;
use tether_core::{CorrelationId, Index, Vec3};

/// `n` unit spheres on a square grid in the XZ plane, 10 m up.
pub fn body_grid(n: u32) -> Vec<BodyDesc> {
    let side = (n as f32).sqrt().ceil().max(1.0) as u32;
    (0..n)
        .map(|i| {
            let (x, z) = ((i % side) as f32 * 1.5, (i / side) as f32 * 1.5);
            BodyDesc::new(
                Index(i),
                ShapeDesc::Sphere { radius: 0.5 },
                Vec3::new(x, 10.0, z),
            )
        })
        .collect()
}

/// Append a creation batch for `bodies`, a velocity change per body, and
/// one downward ray per ten bodies.
pub fn mixed_batch(buf: &mut CommandBuffer, bodies: &[BodyDesc]) {
    for body in bodies {
        body.write_to(buf);
    }
    frame_churn(buf, bodies.len() as u32);
    for (i, body) in bodies.iter().enumerate().step_by(10) {
        RayQuery::new(
            CorrelationId(i as u32),
            body.pose.position + Vec3::Y * 5.0,
            Vec3::NEG_Y * 20.0,
        )
        .write_to(buf);
    }
}

/// Append one linear velocity update for each of indices `0..n`.
pub fn frame_churn(buf: &mut CommandBuffer, n: u32) {
    for i in 0..n {
        ModifyCommand::LinearVelocity {
            index: Index(i),
            velocity: Vec3::new((i % 7) as f32 * 0.1, 0.0, 0.0),
        }
        .write_to(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_indices_are_dense() {
        let bodies = body_grid(10);
        assert_eq!(bodies.len(), 10);
        assert!(bodies.iter().enumerate().all(|(i, b)| b.index == Index(i as u32)));
    }

    #[test]
    fn mixed_batch_counts_every_command() {
        let bodies = body_grid(20);
        let mut buf = CommandBuffer::new();
        mixed_batch(&mut buf, &bodies);
        assert_eq!(buf.commands_count(), 20 + 20 + 2);
    }
}
