//! Typed wire values.
//!
//! [`WireValue`] is the statically typed path used by payload encoders.
//! [`Value`] and [`WireKind`] are the dynamic path for callers that only
//! know the field type at runtime (schema tables, test walkers).

use tether_core::{CorrelationId, Index, Quat, Vec3};

/// A fixed-width value with a little-endian wire encoding.
///
/// `Default` is what a read past the end of the buffer yields.
pub trait WireValue: Copy + Default {
    /// Dynamic tag for this type.
    const KIND: WireKind;

    /// Encoded width in bytes.
    const SIZE: usize = Self::KIND.size();

    /// Encode into exactly [`SIZE`](Self::SIZE) bytes.
    fn encode(self, out: &mut [u8]);

    /// Decode from exactly [`SIZE`](Self::SIZE) bytes.
    fn decode(bytes: &[u8]) -> Self;
}

macro_rules! le_scalar {
    ($ty:ty, $kind:ident, $n:expr) => {
        impl WireValue for $ty {
            const KIND: WireKind = WireKind::$kind;

            fn encode(self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_le_bytes());
            }

            fn decode(bytes: &[u8]) -> Self {
                let mut raw = [0u8; $n];
                raw.copy_from_slice(bytes);
                <$ty>::from_le_bytes(raw)
            }
        }
    };
}

le_scalar!(u8, U8, 1);
le_scalar!(u16, U16, 2);
le_scalar!(u32, U32, 4);
le_scalar!(i32, I32, 4);
le_scalar!(f32, F32, 4);

impl WireValue for bool {
    const KIND: WireKind = WireKind::Bool;

    fn encode(self, out: &mut [u8]) {
        out[0] = self as u8;
    }

    fn decode(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

impl WireValue for Vec3 {
    const KIND: WireKind = WireKind::Vec3;

    fn encode(self, out: &mut [u8]) {
        for (chunk, c) in out.chunks_exact_mut(4).zip(self.to_array()) {
            c.encode(chunk);
        }
    }

    fn decode(bytes: &[u8]) -> Self {
        let mut c = [0.0f32; 3];
        for (v, chunk) in c.iter_mut().zip(bytes.chunks_exact(4)) {
            *v = f32::decode(chunk);
        }
        Vec3::from_array(c)
    }
}

/// Component order on the wire is x, y, z, w. The past-end default is
/// the identity rotation.
impl WireValue for Quat {
    const KIND: WireKind = WireKind::Quat;

    fn encode(self, out: &mut [u8]) {
        for (chunk, c) in out.chunks_exact_mut(4).zip(self.to_array()) {
            c.encode(chunk);
        }
    }

    fn decode(bytes: &[u8]) -> Self {
        let mut c = [0.0f32; 4];
        for (v, chunk) in c.iter_mut().zip(bytes.chunks_exact(4)) {
            *v = f32::decode(chunk);
        }
        Quat::from_array(c)
    }
}

impl WireValue for Index {
    const KIND: WireKind = WireKind::U32;

    fn encode(self, out: &mut [u8]) {
        self.0.encode(out);
    }

    fn decode(bytes: &[u8]) -> Self {
        Index(u32::decode(bytes))
    }
}

impl WireValue for CorrelationId {
    const KIND: WireKind = WireKind::U32;

    fn encode(self, out: &mut [u8]) {
        self.0.encode(out);
    }

    fn decode(bytes: &[u8]) -> Self {
        CorrelationId(u32::decode(bytes))
    }
}

/// Runtime tag for a wire type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WireKind {
    /// `u8`
    U8,
    /// `u16`
    U16,
    /// `u32`
    U32,
    /// `i32`
    I32,
    /// `f32`
    F32,
    /// One byte, 0 or 1.
    Bool,
    /// Three `f32`.
    Vec3,
    /// Four `f32`, x y z w.
    Quat,
}

impl WireKind {
    /// Encoded width in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::U8 | Self::Bool => 1,
            Self::U16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::Vec3 => 12,
            Self::Quat => 16,
        }
    }
}

/// A dynamically typed wire value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    /// `u8`
    U8(u8),
    /// `u16`
    U16(u16),
    /// `u32`
    U32(u32),
    /// `i32`
    I32(i32),
    /// `f32`
    F32(f32),
    /// `bool`
    Bool(bool),
    /// `Vec3`
    Vec3(Vec3),
    /// `Quat`
    Quat(Quat),
}

impl Value {
    /// Runtime tag of this value.
    pub fn kind(&self) -> WireKind {
        match self {
            Self::U8(_) => WireKind::U8,
            Self::U16(_) => WireKind::U16,
            Self::U32(_) => WireKind::U32,
            Self::I32(_) => WireKind::I32,
            Self::F32(_) => WireKind::F32,
            Self::Bool(_) => WireKind::Bool,
            Self::Vec3(_) => WireKind::Vec3,
            Self::Quat(_) => WireKind::Quat,
        }
    }

    /// Compare encodings rather than numeric values, so NaN payloads and
    /// signed zeros are distinguished.
    pub fn bits_eq(&self, other: &Value) -> bool {
        if other.kind() != self.kind() {
            return false;
        }
        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        let n = self.kind().size();
        self.encode(&mut a[..n]);
        other.encode(&mut b[..n]);
        a[..n] == b[..n]
    }

    pub(crate) fn encode(&self, out: &mut [u8]) {
        match *self {
            Self::U8(v) => v.encode(out),
            Self::U16(v) => v.encode(out),
            Self::U32(v) => v.encode(out),
            Self::I32(v) => v.encode(out),
            Self::F32(v) => v.encode(out),
            Self::Bool(v) => v.encode(out),
            Self::Vec3(v) => v.encode(out),
            Self::Quat(v) => v.encode(out),
        }
    }

    pub(crate) fn decode(kind: WireKind, bytes: &[u8]) -> Self {
        match kind {
            WireKind::U8 => Self::U8(u8::decode(bytes)),
            WireKind::U16 => Self::U16(u16::decode(bytes)),
            WireKind::U32 => Self::U32(u32::decode(bytes)),
            WireKind::I32 => Self::I32(i32::decode(bytes)),
            WireKind::F32 => Self::F32(f32::decode(bytes)),
            WireKind::Bool => Self::Bool(bool::decode(bytes)),
            WireKind::Vec3 => Self::Vec3(Vec3::decode(bytes)),
            WireKind::Quat => Self::Quat(Quat::decode(bytes)),
        }
    }

    /// Value a past-end read of `kind` yields.
    pub fn default_of(kind: WireKind) -> Self {
        match kind {
            WireKind::U8 => Self::U8(0),
            WireKind::U16 => Self::U16(0),
            WireKind::U32 => Self::U32(0),
            WireKind::I32 => Self::I32(0),
            WireKind::F32 => Self::F32(0.0),
            WireKind::Bool => Self::Bool(false),
            WireKind::Vec3 => Self::Vec3(Vec3::ZERO),
            WireKind::Quat => Self::Quat(Quat::IDENTITY),
        }
    }
}
