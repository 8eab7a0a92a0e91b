//! Encode/decode traits shared by every payload schema.
//!
//! Frames carry no length or field tags, so each schema's `encode` and
//! `decode` must agree field for field. Decoding fails only on an unknown
//! variant tag, which leaves the stream position undefined.

use tether_buffer::CommandBuffer;
use tether_core::{DispatchError, Operator};

/// A schema-fixed payload.
pub trait Payload: Sized {
    /// Append every field in wire order.
    fn encode(&self, buf: &mut CommandBuffer);

    /// Read every field in wire order.
    fn decode(buf: &mut CommandBuffer) -> Result<Self, DispatchError>;
}

/// A payload that forms a complete frame.
pub trait Command {
    /// Subsystem tag of the frame.
    const OPERATOR: Operator;

    /// Opcode of the frame.
    fn opcode(&self) -> u16;

    /// Append the payload without a frame header.
    fn encode_payload(&self, buf: &mut CommandBuffer);

    /// Append the frame header and payload, counting one command.
    fn write_to(&self, buf: &mut CommandBuffer) {
        buf.write_frame(Self::OPERATOR as u8, self.opcode());
        self.encode_payload(buf);
    }
}

/// Append a presence flag and, if present, a composite payload.
pub fn encode_opt<P: Payload>(buf: &mut CommandBuffer, value: &Option<P>) {
    match value {
        None => buf.write(0u8),
        Some(v) => {
            buf.write(1u8);
            v.encode(buf);
        }
    }
}

/// Read a presence flag and, if set, a composite payload.
pub fn decode_opt<P: Payload>(buf: &mut CommandBuffer) -> Result<Option<P>, DispatchError> {
    match buf.read::<u8>() {
        0 => Ok(None),
        1 => P::decode(buf).map(Some),
        tag => Err(DispatchError::UnknownVariant {
            what: "presence flag",
            tag,
        }),
    }
}

/// Read a `u16` element count followed by that many payloads.
pub fn decode_list<P: Payload>(buf: &mut CommandBuffer) -> Result<Vec<P>, DispatchError> {
    let n = buf.read::<u16>() as usize;
    let mut out = Vec::with_capacity(n.min(buf.remaining()));
    for _ in 0..n {
        out.push(P::decode(buf)?);
    }
    Ok(out)
}

/// Append a `u16` element count followed by each payload.
///
/// Lists longer than `u16::MAX` are truncated.
pub fn encode_list<P: Payload>(buf: &mut CommandBuffer, items: &[P]) {
    let n = items.len().min(u16::MAX as usize);
    buf.write(n as u16);
    for item in &items[..n] {
        item.encode(buf);
    }
}
