//! Binary command buffer for the Tether protocol.
//!
//! A [`CommandBuffer`] is a growable little-endian byte region with a
//! 2-byte command counter at offset 0, followed by frames of
//! `{u8 operator, u16 opcode, payload}`. Frames carry no length or type
//! information: the decoder must consume exactly what the encoder wrote,
//! in the same order. Bulk data travels as side blobs attached to the
//! buffer rather than inline.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod buffer;
pub mod codec;
pub mod config;
pub mod value;

pub use buffer::{CommandBuffer, Reserved, HEADER_LEN};
pub use config::{BufferConfig, BufferConfigError, Growth};
pub use value::{Value, WireKind, WireValue};
