//! Ray and shape cast requests and their hits.

use tether_buffer::codec::{decode_pose, encode_pose};
use tether_buffer::CommandBuffer;
use tether_core::{CorrelationId, DispatchError, Index, Operator, Pose, QueryOp, Vec3};

use crate::payload::{Command, Payload};
use crate::shape::ShapeDesc;

/// Which hits a query reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HitPolicy {
    /// Only the closest hit.
    #[default]
    First,
    /// Every hit, nearest first.
    All,
}

impl Payload for HitPolicy {
    fn encode(&self, buf: &mut CommandBuffer) {
        buf.write(match self {
            Self::First => 0u8,
            Self::All => 1u8,
        });
    }

    fn decode(buf: &mut CommandBuffer) -> Result<Self, DispatchError> {
        match buf.read::<u8>() {
            0 => Ok(Self::First),
            1 => Ok(Self::All),
            tag => Err(DispatchError::UnknownVariant {
                what: "hit policy",
                tag,
            }),
        }
    }
}

/// Ray cast request.
///
/// The ray covers `origin + t * direction` for `t` in `[0, 1]`, so the
/// direction's length is the cast distance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayQuery {
    /// Echoed with the hits.
    pub correlation: CorrelationId,
    /// Start point.
    pub origin: Vec3,
    /// Direction scaled by cast distance.
    pub direction: Vec3,
    /// First hit or all hits.
    pub policy: HitPolicy,
    /// Object to skip, typically the caster.
    pub ignore: Option<Index>,
    /// Only objects sharing a bit with this mask are hit.
    pub layer_mask: Option<u32>,
    /// Compute surface normals.
    pub want_normals: bool,
}

impl RayQuery {
    /// Closest-hit ray with no filtering.
    pub fn new(correlation: CorrelationId, origin: Vec3, direction: Vec3) -> Self {
        Self {
            correlation,
            origin,
            direction,
            policy: HitPolicy::First,
            ignore: None,
            layer_mask: None,
            want_normals: true,
        }
    }
}

impl Payload for RayQuery {
    fn encode(&self, buf: &mut CommandBuffer) {
        buf.write(self.correlation);
        buf.write(self.origin);
        buf.write(self.direction);
        self.policy.encode(buf);
        buf.write_optional(self.ignore);
        buf.write_optional(self.layer_mask);
        buf.write(self.want_normals);
    }

    fn decode(buf: &mut CommandBuffer) -> Result<Self, DispatchError> {
        Ok(Self {
            correlation: buf.read(),
            origin: buf.read(),
            direction: buf.read(),
            policy: HitPolicy::decode(buf)?,
            ignore: buf.read_optional(),
            layer_mask: buf.read_optional(),
            want_normals: buf.read(),
        })
    }
}

impl Command for RayQuery {
    const OPERATOR: Operator = Operator::Query;

    fn opcode(&self) -> u16 {
        QueryOp::Ray.to_wire()
    }

    fn encode_payload(&self, buf: &mut CommandBuffer) {
        self.encode(buf);
    }
}

/// Shape sweep request.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeQuery {
    /// Echoed with the hits.
    pub correlation: CorrelationId,
    /// Swept geometry.
    pub shape: ShapeDesc,
    /// Starting pose of the shape.
    pub start: Pose,
    /// Sweep direction scaled by distance.
    pub direction: Vec3,
    /// First hit or all hits.
    pub policy: HitPolicy,
    /// Object to skip.
    pub ignore: Option<Index>,
    /// Only objects sharing a bit with this mask are hit.
    pub layer_mask: Option<u32>,
    /// Compute surface normals.
    pub want_normals: bool,
}

impl Payload for ShapeQuery {
    fn encode(&self, buf: &mut CommandBuffer) {
        buf.write(self.correlation);
        self.shape.encode(buf);
        encode_pose(buf, &self.start);
        buf.write(self.direction);
        self.policy.encode(buf);
        buf.write_optional(self.ignore);
        buf.write_optional(self.layer_mask);
        buf.write(self.want_normals);
    }

    fn decode(buf: &mut CommandBuffer) -> Result<Self, DispatchError> {
        let correlation = buf.read();
        let shape = ShapeDesc::decode(buf)?;
        Ok(Self {
            correlation,
            shape,
            start: decode_pose(buf),
            direction: buf.read(),
            policy: HitPolicy::decode(buf)?,
            ignore: buf.read_optional(),
            layer_mask: buf.read_optional(),
            want_normals: buf.read(),
        })
    }
}

impl Command for ShapeQuery {
    const OPERATOR: Operator = Operator::Query;

    fn opcode(&self) -> u16 {
        QueryOp::Shape.to_wire()
    }

    fn encode_payload(&self, buf: &mut CommandBuffer) {
        self.encode(buf);
    }
}

/// One query hit as reported to the caller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueryHit {
    /// Object that was hit.
    pub index: Index,
    /// World-space contact point.
    pub point: Vec3,
    /// Surface normal, when requested.
    pub normal: Option<Vec3>,
    /// Fraction of the cast distance at the hit.
    pub fraction: f32,
}

impl Payload for QueryHit {
    fn encode(&self, buf: &mut CommandBuffer) {
        buf.write(self.index);
        buf.write(self.point);
        buf.write_optional(self.normal);
        buf.write(self.fraction);
    }

    fn decode(buf: &mut CommandBuffer) -> Result<Self, DispatchError> {
        Ok(Self {
            index: buf.read(),
            point: buf.read(),
            normal: buf.read_optional(),
            fraction: buf.read(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_query_frame() {
        let mut q = RayQuery::new(CorrelationId(12), Vec3::Y * 5.0, -Vec3::Y * 10.0);
        q.policy = HitPolicy::All;
        q.ignore = Some(Index(3));
        let mut buf = CommandBuffer::new();
        q.write_to(&mut buf);
        assert_eq!(buf.read_operator(), Operator::Query as u8);
        assert_eq!(buf.read_command(), QueryOp::Ray.to_wire());
        assert_eq!(RayQuery::decode(&mut buf).unwrap(), q);
    }

    #[test]
    fn shape_query_round_trip() {
        let q = ShapeQuery {
            correlation: CorrelationId(1),
            shape: ShapeDesc::Sphere { radius: 0.2 },
            start: Pose::IDENTITY,
            direction: Vec3::X,
            policy: HitPolicy::First,
            ignore: None,
            layer_mask: Some(0b10),
            want_normals: false,
        };
        let mut buf = CommandBuffer::new();
        q.encode(&mut buf);
        assert_eq!(ShapeQuery::decode(&mut buf).unwrap(), q);
    }
}
