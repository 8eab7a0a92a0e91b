//! The growable command buffer.

use std::fmt;
use std::marker::PhantomData;

use tether_core::{BufferError, WarnOnce};

use crate::config::BufferConfig;
use crate::value::{Value, WireKind, WireValue};

/// Width of the little-endian `u16` command counter at offset 0.
pub const HEADER_LEN: usize = 2;

/// Width of a frame header: `u8` operator plus `u16` opcode.
const FRAME_LEN: usize = 3;

/// Slot written now and patched later with [`CommandBuffer::write_reserved`].
#[derive(Debug, PartialEq, Eq)]
pub struct Reserved<T> {
    offset: usize,
    _marker: PhantomData<T>,
}

impl<T> Clone for Reserved<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Reserved<T> {}

impl<T> Reserved<T> {
    /// Byte offset of the slot.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Growable byte region with typed, ordered reads and writes.
///
/// Owned by exactly one side of the protocol at a time; ownership moves
/// with the step and result messages. The lenient accessors
/// ([`write`](Self::write), [`read`](Self::read)) never fail: a write that
/// cannot fit is dropped and counted, a read past the end yields the
/// type's default. Both conditions log one deduplicated warning. The
/// `try_*` accessors report the same conditions as [`BufferError`].
#[derive(Clone)]
pub struct CommandBuffer {
    data: Vec<u8>,
    write_cursor: usize,
    read_cursor: usize,
    dirty: bool,
    overrun: bool,
    lost_writes: u32,
    blobs: Vec<Option<Vec<u8>>>,
    config: BufferConfig,
    warnings: WarnOnce,
}

impl fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("commands", &self.commands_count())
            .field("len", &self.write_cursor)
            .field("capacity", &self.data.len())
            .field("read_cursor", &self.read_cursor)
            .field("blobs", &self.blobs.len())
            .field("lost_writes", &self.lost_writes)
            .finish()
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBuffer {
    /// Empty buffer with the default configuration.
    pub fn new() -> Self {
        Self::with_config(BufferConfig::default())
    }

    /// Empty buffer with an explicit configuration.
    ///
    /// Capacities below [`HEADER_LEN`] are raised to it.
    pub fn with_config(config: BufferConfig) -> Self {
        let capacity = config.initial_capacity.max(HEADER_LEN);
        Self {
            data: vec![0; capacity],
            write_cursor: HEADER_LEN,
            read_cursor: HEADER_LEN,
            dirty: false,
            overrun: false,
            lost_writes: 0,
            blobs: Vec::new(),
            config,
            warnings: WarnOnce::new(),
        }
    }

    /// Rebuild a buffer from encoded bytes (header included).
    ///
    /// Side blobs are not part of the byte image and start empty.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BufferError> {
        if bytes.len() < HEADER_LEN {
            return Err(BufferError::ReadPastEnd {
                offset: 0,
                wanted: HEADER_LEN,
            });
        }
        let mut buf = Self::with_config(BufferConfig {
            initial_capacity: bytes.len(),
            ..BufferConfig::default()
        });
        buf.data[..bytes.len()].copy_from_slice(bytes);
        buf.write_cursor = bytes.len();
        buf.dirty = buf.commands_count() > 0;
        Ok(buf)
    }

    // ── Introspection ──────────────────────────────────────────────

    /// Commands framed since the last reset.
    pub fn commands_count(&self) -> u16 {
        u16::decode(&self.data[..HEADER_LEN])
    }

    /// Whether no command has been framed.
    pub fn is_empty(&self) -> bool {
        self.commands_count() == 0
    }

    /// Whether anything has been written since the last reset.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Encoded length in bytes, header included.
    pub fn len(&self) -> usize {
        self.write_cursor
    }

    /// Allocated bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Current read offset.
    pub fn read_offset(&self) -> usize {
        self.read_cursor
    }

    /// Bytes written but not yet read.
    pub fn remaining(&self) -> usize {
        self.write_cursor.saturating_sub(self.read_cursor)
    }

    /// Whether a lenient read has run past the end since the last rewind.
    pub fn overran(&self) -> bool {
        self.overrun
    }

    /// Writes dropped because growth is disabled, since the last reset.
    pub fn lost_writes(&self) -> u32 {
        self.lost_writes
    }

    /// Growth policy and initial size.
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Encoded bytes, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.write_cursor]
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Zero the counter, rewind both cursors past the header, drop blobs.
    ///
    /// Keeps the allocation so the buffer can be reused for the next batch.
    pub fn reset(&mut self) {
        self.data[..HEADER_LEN].fill(0);
        self.write_cursor = HEADER_LEN;
        self.read_cursor = HEADER_LEN;
        self.dirty = false;
        self.overrun = false;
        self.lost_writes = 0;
        self.blobs.clear();
    }

    /// Move the read cursor back to the first frame.
    pub fn rewind(&mut self) {
        self.read_cursor = HEADER_LEN;
        self.overrun = false;
    }

    // ── Writing ────────────────────────────────────────────────────

    fn reserve_bytes(&mut self, n: usize) -> Result<usize, BufferError> {
        let required = self.write_cursor + n;
        if required > self.data.len() {
            let Some(capacity) = self.config.growth.next_capacity(self.data.len(), required)
            else {
                return Err(BufferError::CapacityExhausted {
                    requested: n,
                    available: self.data.len() - self.write_cursor,
                });
            };
            self.data.resize(capacity, 0);
        }
        let at = self.write_cursor;
        self.write_cursor = required;
        self.dirty = true;
        Ok(at)
    }

    fn note_lost_write(&mut self, err: &BufferError) {
        self.lost_writes = self.lost_writes.saturating_add(1);
        self.warnings.warn(
            "buffer.capacity",
            format_args!("command buffer write dropped: {err}"),
        );
    }

    /// Append `value`, or report that it does not fit.
    pub fn try_write<T: WireValue>(&mut self, value: T) -> Result<(), BufferError> {
        let at = self.reserve_bytes(T::SIZE)?;
        value.encode(&mut self.data[at..at + T::SIZE]);
        Ok(())
    }

    /// Append `value`. A write that does not fit is dropped and counted.
    pub fn write<T: WireValue>(&mut self, value: T) {
        if let Err(e) = self.try_write(value) {
            self.note_lost_write(&e);
        }
    }

    /// Append a presence flag and, if present, `value`.
    ///
    /// Flag and value are reserved together so a full buffer never holds
    /// a flag without its value.
    pub fn try_write_optional<T: WireValue>(&mut self, value: Option<T>) -> Result<(), BufferError> {
        match value {
            None => self.try_write(0u8),
            Some(v) => {
                let at = self.reserve_bytes(1 + T::SIZE)?;
                self.data[at] = 1;
                v.encode(&mut self.data[at + 1..at + 1 + T::SIZE]);
                Ok(())
            }
        }
    }

    /// Lenient form of [`try_write_optional`](Self::try_write_optional).
    pub fn write_optional<T: WireValue>(&mut self, value: Option<T>) {
        if let Err(e) = self.try_write_optional(value) {
            self.note_lost_write(&e);
        }
    }

    /// Append a dynamically typed value, optionally preceded by a
    /// presence flag set to 1.
    pub fn write_value(&mut self, value: &Value, with_presence_flag: bool) {
        let size = value.kind().size();
        let flag = usize::from(with_presence_flag);
        match self.reserve_bytes(flag + size) {
            Ok(at) => {
                if with_presence_flag {
                    self.data[at] = 1;
                }
                value.encode(&mut self.data[at + flag..at + flag + size]);
            }
            Err(e) => self.note_lost_write(&e),
        }
    }

    /// Append the `u8` subsystem tag that precedes each opcode.
    pub fn write_operator(&mut self, operator: u8) {
        self.write(operator);
    }

    /// Append a `u16` opcode and count it in the header.
    pub fn write_command(&mut self, opcode: u16) {
        match self.try_write(opcode) {
            Ok(()) => self.bump_count(),
            Err(e) => self.note_lost_write(&e),
        }
    }

    /// Append a full frame header (operator then opcode) and count it.
    ///
    /// Both fields are reserved together, so a full buffer never holds
    /// an operator without its opcode.
    pub fn try_write_frame(&mut self, operator: u8, opcode: u16) -> Result<(), BufferError> {
        let at = self.reserve_bytes(FRAME_LEN)?;
        self.data[at] = operator;
        opcode.encode(&mut self.data[at + 1..at + FRAME_LEN]);
        self.bump_count();
        Ok(())
    }

    /// Lenient form of [`try_write_frame`](Self::try_write_frame).
    pub fn write_frame(&mut self, operator: u8, opcode: u16) {
        if let Err(e) = self.try_write_frame(operator, opcode) {
            self.note_lost_write(&e);
        }
    }

    fn bump_count(&mut self) {
        let count = self.commands_count().wrapping_add(1);
        count.encode(&mut self.data[..HEADER_LEN]);
    }

    /// Write a placeholder for `T` and return its slot.
    ///
    /// If the placeholder does not fit, the slot points past the end and
    /// a later [`write_reserved`](Self::write_reserved) is dropped too.
    pub fn reserve<T: WireValue>(&mut self) -> Reserved<T> {
        let offset = self.write_cursor;
        self.write(T::default());
        Reserved {
            offset,
            _marker: PhantomData,
        }
    }

    /// Patch a slot returned by [`reserve`](Self::reserve).
    pub fn write_reserved<T: WireValue>(&mut self, slot: Reserved<T>, value: T) {
        let end = slot.offset + T::SIZE;
        if end > self.write_cursor {
            let err = BufferError::CapacityExhausted {
                requested: T::SIZE,
                available: 0,
            };
            self.note_lost_write(&err);
            return;
        }
        value.encode(&mut self.data[slot.offset..end]);
    }

    // ── Side blobs ─────────────────────────────────────────────────

    /// Attach bulk data to travel with the buffer. Returns its id.
    pub fn attach_blob(&mut self, bytes: Vec<u8>) -> u32 {
        self.dirty = true;
        self.blobs.push(Some(bytes));
        (self.blobs.len() - 1) as u32
    }

    /// Borrow an attached blob.
    pub fn blob(&self, id: u32) -> Result<&[u8], BufferError> {
        self.blobs
            .get(id as usize)
            .and_then(|b| b.as_deref())
            .ok_or(BufferError::UnknownBlob { id })
    }

    /// Move an attached blob out of the buffer.
    pub fn take_blob(&mut self, id: u32) -> Result<Vec<u8>, BufferError> {
        self.blobs
            .get_mut(id as usize)
            .and_then(Option::take)
            .ok_or(BufferError::UnknownBlob { id })
    }

    /// Number of blob slots attached since the last reset.
    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }

    // ── Reading ────────────────────────────────────────────────────

    fn take_bytes(&mut self, n: usize) -> Result<usize, BufferError> {
        if self.read_cursor + n > self.write_cursor {
            return Err(BufferError::ReadPastEnd {
                offset: self.read_cursor,
                wanted: n,
            });
        }
        let at = self.read_cursor;
        self.read_cursor += n;
        Ok(at)
    }

    fn note_overrun(&mut self, err: &BufferError) {
        self.overrun = true;
        self.read_cursor = self.write_cursor;
        self.warnings
            .warn("buffer.read", format_args!("command buffer read failed: {err}"));
    }

    /// Read the next `T`, or report that the buffer is exhausted.
    pub fn try_read<T: WireValue>(&mut self) -> Result<T, BufferError> {
        let at = self.take_bytes(T::SIZE)?;
        Ok(T::decode(&self.data[at..at + T::SIZE]))
    }

    /// Read the next `T`. Past the end yields `T::default()` and marks
    /// the buffer as [overran](Self::overran).
    pub fn read<T: WireValue>(&mut self) -> T {
        match self.try_read() {
            Ok(v) => v,
            Err(e) => {
                self.note_overrun(&e);
                T::default()
            }
        }
    }

    /// Read a presence flag and, if set, the value behind it.
    pub fn try_read_optional<T: WireValue>(&mut self) -> Result<Option<T>, BufferError> {
        let offset = self.read_cursor;
        match self.try_read::<u8>()? {
            0 => Ok(None),
            1 => self.try_read().map(Some),
            value => Err(BufferError::InvalidPresenceFlag { offset, value }),
        }
    }

    /// Lenient form of [`try_read_optional`](Self::try_read_optional).
    /// Any failure yields `None` and marks the buffer as overran.
    pub fn read_optional<T: WireValue>(&mut self) -> Option<T> {
        match self.try_read_optional() {
            Ok(v) => v,
            Err(e) => {
                self.note_overrun(&e);
                None
            }
        }
    }

    /// Read a dynamically typed value.
    pub fn read_value(&mut self, kind: WireKind) -> Value {
        match self.take_bytes(kind.size()) {
            Ok(at) => Value::decode(kind, &self.data[at..at + kind.size()]),
            Err(e) => {
                self.note_overrun(&e);
                Value::default_of(kind)
            }
        }
    }

    /// Read the `u8` subsystem tag of the next frame.
    pub fn read_operator(&mut self) -> u8 {
        self.read()
    }

    /// Read the `u16` opcode of the next frame.
    pub fn read_command(&mut self) -> u16 {
        self.read()
    }
}
