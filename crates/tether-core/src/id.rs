//! Strongly-typed handles that cross the protocol boundary.

use std::fmt;

/// Stable integer identifying a tracked object across the protocol boundary.
///
/// Minted on the caller side by an index allocator and carried in every
/// command payload that addresses an object. Unique while live; may be
/// reused only after it has been freed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Index(pub u32);

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for Index {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Opaque handle the physics backend uses for one of its own objects.
///
/// The backend reports hits and poses by native handle; the tracker maps
/// these back to protocol [`Index`] values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeHandle(pub u64);

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "native:{}", self.0)
    }
}

impl From<u64> for NativeHandle {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Caller-chosen tag echoed back with query results and step results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(pub u32);

impl CorrelationId {
    /// Return the next id, wrapping on overflow.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for CorrelationId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_wraps() {
        assert_eq!(CorrelationId(u32::MAX).next(), CorrelationId(0));
        assert_eq!(CorrelationId(4).next(), CorrelationId(5));
    }

    #[test]
    fn display_forms() {
        assert_eq!(Index(7).to_string(), "#7");
        assert_eq!(NativeHandle(3).to_string(), "native:3");
    }
}
