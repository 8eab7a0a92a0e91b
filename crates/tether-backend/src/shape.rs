//! Collision shape descriptors.
//!
//! Primitive shapes are inline. Point clouds, meshes and height samples
//! travel as side blobs on the buffer and are referenced by blob id, so a
//! megabyte mesh never gets copied through the frame stream.

use tether_buffer::codec::{decode_pose, encode_pose};
use tether_buffer::CommandBuffer;
use tether_core::{CreateOp, DispatchError, Index, Operator, Pose, Vec3};

use crate::payload::{decode_list, encode_list, Command, Payload};

/// Geometry of a collision shape.
#[derive(Clone, Debug, PartialEq)]
pub enum ShapeDesc {
    /// Sphere centred on the origin.
    Sphere {
        /// Radius.
        radius: f32,
    },
    /// Axis-aligned box centred on the origin.
    Box {
        /// Half size along each axis.
        half_extents: Vec3,
    },
    /// Capsule along the Y axis.
    Capsule {
        /// Half length of the cylindrical section.
        half_height: f32,
        /// Radius of the caps and section.
        radius: f32,
    },
    /// Cylinder along the Y axis.
    Cylinder {
        /// Half length.
        half_height: f32,
        /// Radius.
        radius: f32,
    },
    /// Convex hull of a point cloud. Points travel as a side blob.
    ConvexHull {
        /// Hull points.
        points: Vec<Vec3>,
    },
    /// Triangle mesh. Vertices and indices travel as side blobs.
    Mesh {
        /// Vertex positions.
        vertices: Vec<Vec3>,
        /// Triangles as vertex index triples.
        triangles: Vec<[u32; 3]>,
    },
    /// Square grid of heights. Samples travel as a side blob.
    HeightField {
        /// Samples along each side.
        samples_per_side: u32,
        /// Scale applied to grid x, height y, grid z.
        scale: Vec3,
        /// Row-major height samples.
        heights: Vec<f32>,
    },
    /// Several primitive shapes with local offsets.
    Compound {
        /// Child shapes.
        children: Vec<CompoundChild>,
    },
}

/// One child of a [`ShapeDesc::Compound`].
#[derive(Clone, Debug, PartialEq)]
pub struct CompoundChild {
    /// Offset from the compound's origin.
    pub offset: Pose,
    /// Child geometry. Compounds do not nest.
    pub shape: ShapeDesc,
}

const SPHERE: u8 = 0;
const BOX: u8 = 1;
const CAPSULE: u8 = 2;
const CYLINDER: u8 = 3;
const CONVEX_HULL: u8 = 4;
const MESH: u8 = 5;
const HEIGHT_FIELD: u8 = 6;
const COMPOUND: u8 = 7;

impl ShapeDesc {
    /// Radius of a sphere around the origin that contains the shape.
    pub fn bounding_radius(&self) -> f32 {
        match self {
            Self::Sphere { radius } => *radius,
            Self::Box { half_extents } => half_extents.length(),
            Self::Capsule { half_height, radius } => half_height + radius,
            Self::Cylinder { half_height, radius } => half_height.hypot(*radius),
            Self::ConvexHull { points } => max_length(points),
            Self::Mesh { vertices, .. } => max_length(vertices),
            Self::HeightField {
                samples_per_side,
                scale,
                heights,
            } => {
                let half = (*samples_per_side as f32) * 0.5;
                let top = heights.iter().fold(0.0f32, |m, h| m.max(h.abs())) * scale.y;
                Vec3::new(half * scale.x, top, half * scale.z).length()
            }
            Self::Compound { children } => children.iter().fold(0.0, |m, c| {
                m.max(c.offset.position.length() + c.shape.bounding_radius())
            }),
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Self::Sphere { .. } => SPHERE,
            Self::Box { .. } => BOX,
            Self::Capsule { .. } => CAPSULE,
            Self::Cylinder { .. } => CYLINDER,
            Self::ConvexHull { .. } => CONVEX_HULL,
            Self::Mesh { .. } => MESH,
            Self::HeightField { .. } => HEIGHT_FIELD,
            Self::Compound { .. } => COMPOUND,
        }
    }

    fn decode_primitive(tag: u8, buf: &mut CommandBuffer) -> Result<Self, DispatchError> {
        let shape = match tag {
            SPHERE => Self::Sphere { radius: buf.read() },
            BOX => Self::Box {
                half_extents: buf.read(),
            },
            CAPSULE => Self::Capsule {
                half_height: buf.read(),
                radius: buf.read(),
            },
            CYLINDER => Self::Cylinder {
                half_height: buf.read(),
                radius: buf.read(),
            },
            CONVEX_HULL => {
                let id = buf.read::<u32>();
                Self::ConvexHull {
                    points: blob_to_vec3s(read_blob(buf, id)?),
                }
            }
            MESH => {
                let vertices = buf.read::<u32>();
                let triangles = buf.read::<u32>();
                Self::Mesh {
                    vertices: blob_to_vec3s(read_blob(buf, vertices)?),
                    triangles: blob_to_triangles(read_blob(buf, triangles)?),
                }
            }
            HEIGHT_FIELD => {
                let samples_per_side = buf.read();
                let scale = buf.read();
                let id = buf.read::<u32>();
                Self::HeightField {
                    samples_per_side,
                    scale,
                    heights: blob_to_f32s(read_blob(buf, id)?),
                }
            }
            tag => {
                return Err(DispatchError::UnknownVariant {
                    what: "shape",
                    tag,
                })
            }
        };
        Ok(shape)
    }
}

fn max_length(points: &[Vec3]) -> f32 {
    points.iter().fold(0.0, |m, p| m.max(p.length()))
}

impl Payload for ShapeDesc {
    fn encode(&self, buf: &mut CommandBuffer) {
        buf.write(self.tag());
        match self {
            Self::Sphere { radius } => buf.write(*radius),
            Self::Box { half_extents } => buf.write(*half_extents),
            Self::Capsule { half_height, radius } | Self::Cylinder { half_height, radius } => {
                buf.write(*half_height);
                buf.write(*radius);
            }
            Self::ConvexHull { points } => {
                let id = buf.attach_blob(vec3s_to_blob(points));
                buf.write(id);
            }
            Self::Mesh {
                vertices,
                triangles,
            } => {
                let v = buf.attach_blob(vec3s_to_blob(vertices));
                let t = buf.attach_blob(triangles_to_blob(triangles));
                buf.write(v);
                buf.write(t);
            }
            Self::HeightField {
                samples_per_side,
                scale,
                heights,
            } => {
                buf.write(*samples_per_side);
                buf.write(*scale);
                let id = buf.attach_blob(f32s_to_blob(heights));
                buf.write(id);
            }
            Self::Compound { children } => encode_list(buf, children),
        }
    }

    fn decode(buf: &mut CommandBuffer) -> Result<Self, DispatchError> {
        match buf.read::<u8>() {
            COMPOUND => {
                // First pass collects every child; the parent is built
                // only once all of them decoded.
                let children = decode_list::<CompoundChild>(buf)?;
                Ok(Self::Compound { children })
            }
            tag => Self::decode_primitive(tag, buf),
        }
    }
}

impl Payload for CompoundChild {
    fn encode(&self, buf: &mut CommandBuffer) {
        encode_pose(buf, &self.offset);
        self.shape.encode(buf);
    }

    fn decode(buf: &mut CommandBuffer) -> Result<Self, DispatchError> {
        let offset = decode_pose(buf);
        match buf.read::<u8>() {
            COMPOUND => Err(DispatchError::UnknownVariant {
                what: "compound child shape",
                tag: COMPOUND,
            }),
            tag => Ok(Self {
                offset,
                shape: ShapeDesc::decode_primitive(tag, buf)?,
            }),
        }
    }
}

// ── Side blob layouts ──────────────────────────────────────────────

// Blobs are borrowed so a frame can be decoded more than once.
fn read_blob(buf: &CommandBuffer, id: u32) -> Result<&[u8], DispatchError> {
    buf.blob(id).map_err(|_| DispatchError::MissingBlob { id })
}

fn f32s_to_blob(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn blob_to_f32s(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn vec3s_to_blob(points: &[Vec3]) -> Vec<u8> {
    points
        .iter()
        .flat_map(|p| p.to_array())
        .flat_map(|c| c.to_le_bytes())
        .collect()
}

fn blob_to_vec3s(bytes: &[u8]) -> Vec<Vec3> {
    blob_to_f32s(bytes)
        .chunks_exact(3)
        .map(Vec3::from_slice)
        .collect()
}

fn triangles_to_blob(triangles: &[[u32; 3]]) -> Vec<u8> {
    triangles
        .iter()
        .flatten()
        .flat_map(|i| i.to_le_bytes())
        .collect()
}

fn blob_to_triangles(bytes: &[u8]) -> Vec<[u32; 3]> {
    bytes
        .chunks_exact(12)
        .map(|c| {
            let at = |i: usize| u32::from_le_bytes([c[i], c[i + 1], c[i + 2], c[i + 3]]);
            [at(0), at(4), at(8)]
        })
        .collect()
}

/// Create a standalone shape that bodies can share by index.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeCreate {
    /// Caller-assigned handle.
    pub index: Index,
    /// Geometry.
    pub shape: ShapeDesc,
}

impl Payload for ShapeCreate {
    fn encode(&self, buf: &mut CommandBuffer) {
        buf.write(self.index);
        self.shape.encode(buf);
    }

    fn decode(buf: &mut CommandBuffer) -> Result<Self, DispatchError> {
        let index = buf.read();
        let shape = ShapeDesc::decode(buf)?;
        Ok(Self { index, shape })
    }
}

impl Command for ShapeCreate {
    const OPERATOR: Operator = Operator::Create;

    fn opcode(&self) -> u16 {
        CreateOp::Shape.to_wire()
    }

    fn encode_payload(&self, buf: &mut CommandBuffer) {
        self.encode(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::Quat;

    fn round_trip(shape: &ShapeDesc) -> ShapeDesc {
        let mut buf = CommandBuffer::new();
        shape.encode(&mut buf);
        ShapeDesc::decode(&mut buf).unwrap()
    }

    #[test]
    fn mesh_travels_as_blobs() {
        let mesh = ShapeDesc::Mesh {
            vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Z],
            triangles: vec![[0, 1, 2]],
        };
        let mut buf = CommandBuffer::new();
        mesh.encode(&mut buf);
        // Tag plus two blob ids; the geometry is not inline.
        assert_eq!(buf.len(), tether_buffer::HEADER_LEN + 1 + 4 + 4);
        assert_eq!(buf.blob_count(), 2);
        assert_eq!(ShapeDesc::decode(&mut buf).unwrap(), mesh);

        buf.rewind();
        assert_eq!(ShapeDesc::decode(&mut buf).unwrap(), mesh);
    }

    #[test]
    fn missing_blob_is_an_error() {
        let hull = ShapeDesc::ConvexHull {
            points: vec![Vec3::X, Vec3::Y, Vec3::Z],
        };
        let mut buf = CommandBuffer::new();
        hull.encode(&mut buf);
        let mut copy = CommandBuffer::from_bytes(buf.as_bytes()).unwrap();
        assert_eq!(copy.blob_count(), 0);
        assert_eq!(
            ShapeDesc::decode(&mut copy),
            Err(DispatchError::MissingBlob { id: 0 })
        );
    }

    #[test]
    fn compound_collects_children() {
        let compound = ShapeDesc::Compound {
            children: vec![
                CompoundChild {
                    offset: Pose::from_position(Vec3::Y),
                    shape: ShapeDesc::Sphere { radius: 0.5 },
                },
                CompoundChild {
                    offset: Pose::new(Vec3::ZERO, Quat::from_rotation_z(0.3)),
                    shape: ShapeDesc::Box {
                        half_extents: Vec3::splat(0.25),
                    },
                },
            ],
        };
        assert_eq!(round_trip(&compound), compound);
        assert!((compound.bounding_radius() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn nested_compound_rejected() {
        let inner = ShapeDesc::Compound { children: vec![] };
        let outer = ShapeDesc::Compound {
            children: vec![CompoundChild {
                offset: Pose::IDENTITY,
                shape: inner,
            }],
        };
        let mut buf = CommandBuffer::new();
        outer.encode(&mut buf);
        assert!(matches!(
            ShapeDesc::decode(&mut buf),
            Err(DispatchError::UnknownVariant { tag: COMPOUND, .. })
        ));
    }

    #[test]
    fn unknown_tag_is_desync() {
        let mut buf = CommandBuffer::new();
        buf.write(42u8);
        assert_eq!(
            ShapeDesc::decode(&mut buf),
            Err(DispatchError::UnknownVariant {
                what: "shape",
                tag: 42
            })
        );
    }

    #[test]
    fn height_field_round_trip() {
        let hf = ShapeDesc::HeightField {
            samples_per_side: 2,
            scale: Vec3::new(1.0, 0.5, 1.0),
            heights: vec![0.0, 1.0, 2.0, -1.0],
        };
        assert_eq!(round_trip(&hf), hf);
    }
}
