//! Object destruction payload.

use tether_buffer::CommandBuffer;
use tether_core::{CleanupOp, DispatchError, Index, Operator};

use crate::payload::{Command, Payload};

/// Destroy an object and every constraint attached to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DestroyCommand {
    /// Object to destroy.
    pub index: Index,
}

impl Payload for DestroyCommand {
    fn encode(&self, buf: &mut CommandBuffer) {
        buf.write(self.index);
    }

    fn decode(buf: &mut CommandBuffer) -> Result<Self, DispatchError> {
        Ok(Self { index: buf.read() })
    }
}

impl Command for DestroyCommand {
    const OPERATOR: Operator = Operator::Cleanup;

    fn opcode(&self) -> u16 {
        CleanupOp::Destroy.to_wire()
    }

    fn encode_payload(&self, buf: &mut CommandBuffer) {
        self.encode(buf);
    }
}
