//! Byte string builder
//!
//! [`Cbb`] writes TLS-style and DER structures into a single buffer without
//! knowing lengths up front. Opening a child reserves room for the child's
//! length prefix; the prefix is patched in once the child is flushed, and a
//! DER length that needs the long form shifts the child's bytes to make room.
//!
//! # Usage Example
//!
//! ```rust
//! use derkit_asn1::der::{Asn1Tag, Cbb};
//!
//! let cbb = Cbb::new(64);
//! let seq = cbb.add_asn1(Asn1Tag::SEQUENCE)?;
//! seq.add_asn1_uint64(1)?;
//! assert_eq!(cbb.finish()?, vec![0x30, 0x03, 0x02, 0x01, 0x01]);
//! # Ok::<(), derkit_asn1::error::Asn1Error>(())
//! ```
//!
//! # Handles
//!
//! The root and all of its children share one chain. Only the most recently
//! opened child of a handle is live: writing to the parent, opening a sibling,
//! flushing or discarding closes it, after which the old handle is stale.
//!
//! # Error Handling
//!
//! The first failure poisons the whole chain. Every later call on any handle
//! of that chain returns `BuilderMisuse` and leaves the buffer alone, so a
//! half-written structure can never be finished by accident.

use crate::base128;
use crate::der::config::BuilderConfig;
use crate::der::set_of;
use crate::der::types::{Asn1Tag, DerLength};
use crate::error::{Asn1Error, Asn1Result};
use crate::integer::{Asn1Integer, encode_der_integer};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

const POISONED: &str = "builder chain is in an error state";
const BORROWED: &str = "builder is borrowed by an outstanding guard";
const FINISHED: &str = "builder has been finished";

/// Largest length a DER prefix of at most four length bytes can hold.
const DER_LENGTH_MAX: usize = 0xffff_fffe;

enum Buffer<'a> {
    Growable(Vec<u8>),
    Fixed { slice: &'a mut [u8], len: usize },
    Finished,
}

impl Buffer<'_> {
    fn len(&self) -> usize {
        match self {
            Buffer::Growable(vec) => vec.len(),
            Buffer::Fixed { len, .. } => *len,
            Buffer::Finished => 0,
        }
    }

    fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Growable(vec) => vec.as_slice(),
            Buffer::Fixed { slice, len } => &slice[..*len],
            Buffer::Finished => &[],
        }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            Buffer::Growable(vec) => vec.as_mut_slice(),
            Buffer::Fixed { slice, len } => &mut slice[..*len],
            Buffer::Finished => &mut [],
        }
    }

    fn truncate(&mut self, new_len: usize) {
        match self {
            Buffer::Growable(vec) => vec.truncate(new_len),
            Buffer::Fixed { len, .. } => *len = (*len).min(new_len),
            Buffer::Finished => {}
        }
    }
}

/// An open level of the chain. `frames[0]` is the root.
#[derive(Debug, Clone, Copy)]
struct Frame {
    generation: u64,
    /// Where this level's length prefix starts
    offset: usize,
    pending_len_len: u8,
    pending_is_asn1: bool,
}

impl Frame {
    fn child_start(&self) -> usize {
        self.offset + usize::from(self.pending_len_len)
    }
}

struct Chain<'a> {
    buf: Buffer<'a>,
    frames: Vec<Frame>,
    next_generation: u64,
    poisoned: bool,
    config: BuilderConfig,
}

impl<'a> Chain<'a> {
    fn new(buf: Buffer<'a>, config: BuilderConfig) -> Self {
        let root = Frame {
            generation: 0,
            offset: 0,
            pending_len_len: 0,
            pending_is_asn1: false,
        };
        Self {
            buf,
            frames: vec![root],
            next_generation: 1,
            poisoned: false,
            config,
        }
    }

    fn check_handle(&self, depth: usize, generation: u64) -> Asn1Result<()> {
        if matches!(self.buf, Buffer::Finished) {
            return Err(Asn1Error::BuilderMisuse(FINISHED));
        }
        match self.frames.get(depth) {
            Some(frame) if frame.generation == generation => Ok(()),
            _ => Err(Asn1Error::BuilderMisuse("child builder is no longer open")),
        }
    }

    fn poison(&mut self, err: &Asn1Error) {
        self.poisoned = true;
        self.frames.truncate(1);
        log::debug!("builder chain poisoned: {err}");
    }

    fn child_start(&self, depth: usize) -> usize {
        self.frames[depth].child_start()
    }

    /// Append `additional` zero bytes and return where they start
    fn reserve(&mut self, additional: usize) -> Asn1Result<usize> {
        let start = self.buf.len();
        let new_len = start
            .checked_add(additional)
            .ok_or(Asn1Error::Overflow("buffer length overflows usize"))?;

        match &mut self.buf {
            Buffer::Growable(vec) => {
                if self.config.max_capacity.is_some_and(|max| new_len > max) {
                    return Err(Asn1Error::Overflow("buffer would exceed max_capacity"));
                }
                if new_len > vec.capacity() {
                    let mut target = vec
                        .capacity()
                        .checked_mul(2)
                        .map_or(new_len, |doubled| doubled.max(new_len));
                    if let Some(max) = self.config.max_capacity {
                        target = target.min(max);
                    }
                    vec.try_reserve_exact(target - vec.len())
                        .map_err(|_| Asn1Error::AllocationFailure(target))?;
                }
                vec.resize(new_len, 0);
            }
            Buffer::Fixed { slice, len } => {
                if new_len > slice.len() {
                    return Err(Asn1Error::BuilderMisuse("write past the end of a fixed buffer"));
                }
                slice[start..new_len].fill(0);
                *len = new_len;
            }
            Buffer::Finished => return Err(Asn1Error::BuilderMisuse(FINISHED)),
        }
        Ok(start)
    }

    fn write(&mut self, bytes: &[u8]) -> Asn1Result<()> {
        let start = self.reserve(bytes.len())?;
        self.buf.as_mut_slice()[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn push_child(&mut self, len_len: u8, is_der_length: bool) -> Asn1Result<u64> {
        if is_der_length && len_len != 1 {
            return Err(Asn1Error::BuilderMisuse("DER length prefix must start as one byte"));
        }
        if !(1..=4).contains(&len_len) {
            return Err(Asn1Error::BuilderMisuse("length prefix must be 1 to 4 bytes"));
        }
        let offset = self.reserve(usize::from(len_len))?;
        let generation = self.next_generation;
        self.next_generation += 1;
        self.frames.push(Frame {
            generation,
            offset,
            pending_len_len: len_len,
            pending_is_asn1: is_der_length,
        });
        Ok(generation)
    }

    /// Close every level deeper than `depth`, innermost first
    fn flush_above(&mut self, depth: usize) -> Asn1Result<()> {
        while self.frames.len() > depth + 1 {
            self.close_top()?;
        }
        Ok(())
    }

    /// Pop the innermost level and patch its length prefix
    fn close_top(&mut self) -> Asn1Result<()> {
        let Some(frame) = self.frames.pop() else {
            return Ok(());
        };
        let child_start = frame.child_start();
        let mut len = self.buf.len() - child_start;
        let offset = frame.offset;

        if frame.pending_is_asn1 {
            if len > DER_LENGTH_MAX {
                return Err(Asn1Error::Overflow("DER length exceeds four length bytes"));
            }
            let header = DerLength::new(len).encode();
            let extra = header.len() - 1;
            if extra > 0 {
                // Long form: shift the contents right to make room.
                self.reserve(extra)?;
                self.buf
                    .as_mut_slice()
                    .copy_within(child_start..child_start + len, child_start + extra);
            }
            self.buf.as_mut_slice()[offset..offset + header.len()].copy_from_slice(&header);
            return Ok(());
        }

        let len_len = usize::from(frame.pending_len_len);
        for byte in self.buf.as_mut_slice()[offset..offset + len_len].iter_mut().rev() {
            *byte = len as u8;
            len >>= 8;
        }
        if len != 0 {
            return Err(Asn1Error::Overflow("length does not fit in the length prefix"));
        }
        Ok(())
    }
}

/// Byte string builder handle
///
/// A `Cbb` is either the root, which owns the buffer, or a child opened
/// through one of the `add_*` or `open_child` methods. All operations take
/// `&self`; the chain is shared through `Rc<RefCell<_>>`, so handles are
/// neither `Send` nor `Sync`.
///
/// # Memory Management
///
/// A growable builder doubles its capacity as needed, bounded by
/// [`BuilderConfig::max_capacity`]. A fixed builder writes into a caller
/// slice and fails once the slice is full.
pub struct Cbb<'a> {
    chain: Rc<RefCell<Chain<'a>>>,
    depth: usize,
    generation: u64,
}

impl Cbb<'static> {
    /// Create a growable builder with `initial_capacity` bytes reserved
    pub fn new(initial_capacity: usize) -> Self {
        Self::with_config(BuilderConfig {
            initial_capacity,
            ..BuilderConfig::default()
        })
    }

    /// Create a growable builder from a configuration
    pub fn with_config(config: BuilderConfig) -> Self {
        let mut vec = Vec::new();
        let initial = config
            .max_capacity
            .map_or(config.initial_capacity, |max| config.initial_capacity.min(max));
        if vec.try_reserve_exact(initial).is_err() {
            // Growth reports the failure once bytes are actually written.
            log::debug!("could not reserve {initial} bytes up front");
        }
        Self::from_buffer(Buffer::Growable(vec), config)
    }
}

impl<'a> Cbb<'a> {
    /// Create a builder that writes into `buf` and never allocates
    ///
    /// # Arguments
    /// * `buf` - Output storage; writes beyond its length fail with
    ///   `BuilderMisuse`
    pub fn new_fixed(buf: &'a mut [u8]) -> Self {
        Self::from_buffer(
            Buffer::Fixed { slice: buf, len: 0 },
            BuilderConfig::default(),
        )
    }

    fn from_buffer(buf: Buffer<'a>, config: BuilderConfig) -> Self {
        Self {
            chain: Rc::new(RefCell::new(Chain::new(buf, config))),
            depth: 0,
            generation: 0,
        }
    }

    fn with_chain<T>(&self, op: impl FnOnce(&mut Chain<'a>) -> Asn1Result<T>) -> Asn1Result<T> {
        let mut chain = self
            .chain
            .try_borrow_mut()
            .map_err(|_| Asn1Error::BuilderMisuse(BORROWED))?;
        if chain.poisoned {
            return Err(Asn1Error::BuilderMisuse(POISONED));
        }
        let result = chain
            .check_handle(self.depth, self.generation)
            .and_then(|()| op(&mut *chain));
        if let Err(err) = &result {
            chain.poison(err);
        }
        result
    }

    /// Like `with_chain`, after closing this handle's live child.
    fn with_flushed<T>(&self, op: impl FnOnce(&mut Chain<'a>) -> Asn1Result<T>) -> Asn1Result<T> {
        let depth = self.depth;
        self.with_chain(|chain| {
            chain.flush_above(depth)?;
            op(chain)
        })
    }

    fn child(&self, generation: u64) -> Cbb<'a> {
        Cbb {
            chain: Rc::clone(&self.chain),
            depth: self.depth + 1,
            generation,
        }
    }

    /// Whether this handle is the root of its chain
    pub fn is_root(&self) -> bool {
        self.depth == 0
    }

    /// Open a child whose length is written in front of its contents
    ///
    /// # Arguments
    /// * `len_len` - Bytes reserved for the length, 1 to 4
    /// * `is_der_length` - Write a DER length instead of a fixed-width
    ///   big-endian one; requires `len_len == 1`
    ///
    /// # Errors
    /// Returns `BuilderMisuse` for an unsupported prefix width.
    pub fn open_child(&self, len_len: u8, is_der_length: bool) -> Asn1Result<Cbb<'a>> {
        let generation = self.with_flushed(|chain| chain.push_child(len_len, is_der_length))?;
        Ok(self.child(generation))
    }

    /// Open a child with a one-byte length prefix
    pub fn add_u8_length_prefixed(&self) -> Asn1Result<Cbb<'a>> {
        self.open_child(1, false)
    }

    /// Open a child with a two-byte length prefix
    pub fn add_u16_length_prefixed(&self) -> Asn1Result<Cbb<'a>> {
        self.open_child(2, false)
    }

    /// Open a child with a three-byte length prefix
    pub fn add_u24_length_prefixed(&self) -> Asn1Result<Cbb<'a>> {
        self.open_child(3, false)
    }

    /// Write the identifier octets of `tag` and open a child for the contents
    ///
    /// Tag numbers of 31 and above use the high tag number form.
    pub fn add_asn1(&self, tag: Asn1Tag) -> Asn1Result<Cbb<'a>> {
        let generation = self.with_flushed(|chain| {
            chain.write(&tag.encode()?)?;
            chain.push_child(1, true)
        })?;
        Ok(self.child(generation))
    }

    /// Patch the length prefixes of every open child below this handle
    ///
    /// # Errors
    /// Returns `Overflow` if a child's contents do not fit in its prefix.
    pub fn flush(&self) -> Asn1Result<()> {
        self.with_flushed(|_| Ok(()))
    }

    /// Drop the live child of this handle together with everything it wrote
    pub fn discard_child(&self) -> Asn1Result<()> {
        let depth = self.depth;
        self.with_chain(|chain| {
            if let Some(child) = chain.frames.get(depth + 1) {
                let offset = child.offset;
                chain.buf.truncate(offset);
                chain.frames.truncate(depth + 1);
            }
            Ok(())
        })
    }

    /// Number of content bytes written through this handle
    pub fn len(&self) -> Asn1Result<usize> {
        let depth = self.depth;
        self.with_flushed(|chain| Ok(chain.buf.len() - chain.child_start(depth)))
    }

    /// Whether nothing has been written through this handle
    pub fn is_empty(&self) -> Asn1Result<bool> {
        self.len().map(|len| len == 0)
    }

    /// Flushed content bytes of this handle
    ///
    /// The returned guard must be dropped before the chain is used again.
    pub fn contents(&self) -> Asn1Result<Ref<'_, [u8]>> {
        let depth = self.depth;
        let start = self.with_flushed(|chain| Ok(chain.child_start(depth)))?;
        let chain = self
            .chain
            .try_borrow()
            .map_err(|_| Asn1Error::BuilderMisuse(BORROWED))?;
        Ok(Ref::map(chain, |chain| &chain.buf.as_slice()[start..]))
    }

    /// Flush and return the encoded bytes
    ///
    /// Only the root can be finished. A fixed builder returns a copy of the
    /// written prefix of its slice. Every handle of the chain is unusable
    /// afterwards.
    ///
    /// # Errors
    /// Returns `BuilderMisuse` when called on a child.
    pub fn finish(self) -> Asn1Result<Vec<u8>> {
        let depth = self.depth;
        self.with_chain(|chain| {
            if depth != 0 {
                return Err(Asn1Error::BuilderMisuse("finish called on a child builder"));
            }
            chain.flush_above(0)?;
            match std::mem::replace(&mut chain.buf, Buffer::Finished) {
                Buffer::Growable(vec) => Ok(vec),
                Buffer::Fixed { slice, len } => Ok(slice[..len].to_vec()),
                Buffer::Finished => Err(Asn1Error::BuilderMisuse(FINISHED)),
            }
        })
    }

    pub fn add_bytes(&self, data: &[u8]) -> Asn1Result<()> {
        self.with_flushed(|chain| chain.write(data))
    }

    /// Append `len` zero bytes
    pub fn add_zeros(&self, len: usize) -> Asn1Result<()> {
        self.with_flushed(|chain| chain.reserve(len).map(|_| ()))
    }

    /// Append `len` zero bytes and return them for the caller to fill
    ///
    /// Any other call on the chain fails with `BuilderMisuse` while the
    /// guard is alive.
    pub fn add_space(&self, len: usize) -> Asn1Result<RefMut<'_, [u8]>> {
        let start = self.with_flushed(|chain| chain.reserve(len))?;
        let chain = self
            .chain
            .try_borrow_mut()
            .map_err(|_| Asn1Error::BuilderMisuse(BORROWED))?;
        Ok(RefMut::map(chain, |chain| {
            &mut chain.buf.as_mut_slice()[start..start + len]
        }))
    }

    pub fn add_u8(&self, value: u8) -> Asn1Result<()> {
        self.add_bytes(&[value])
    }

    pub fn add_u16(&self, value: u16) -> Asn1Result<()> {
        self.add_bytes(&value.to_be_bytes())
    }

    /// Append the low 24 bits of `value`, big-endian
    ///
    /// # Errors
    /// Returns `Overflow` if `value` does not fit in 24 bits.
    pub fn add_u24(&self, value: u32) -> Asn1Result<()> {
        self.with_flushed(|chain| {
            if value >> 24 != 0 {
                return Err(Asn1Error::Overflow("value does not fit in 24 bits"));
            }
            chain.write(&value.to_be_bytes()[1..])
        })
    }

    pub fn add_u32(&self, value: u32) -> Asn1Result<()> {
        self.add_bytes(&value.to_be_bytes())
    }

    pub fn add_u64(&self, value: u64) -> Asn1Result<()> {
        self.add_bytes(&value.to_be_bytes())
    }

    pub fn add_u16le(&self, value: u16) -> Asn1Result<()> {
        self.add_bytes(&value.to_le_bytes())
    }

    pub fn add_u32le(&self, value: u32) -> Asn1Result<()> {
        self.add_bytes(&value.to_le_bytes())
    }

    pub fn add_u64le(&self, value: u64) -> Asn1Result<()> {
        self.add_bytes(&value.to_le_bytes())
    }

    /// Write a complete element: identifier, contents from `fill`, length
    fn add_asn1_with(
        &self,
        tag: Asn1Tag,
        fill: impl FnOnce(&mut Chain<'a>) -> Asn1Result<()>,
    ) -> Asn1Result<()> {
        let depth = self.depth;
        self.with_flushed(|chain| {
            chain.write(&tag.encode()?)?;
            chain.push_child(1, true)?;
            fill(chain)?;
            chain.flush_above(depth)
        })
    }

    /// Write an INTEGER holding `value`
    pub fn add_asn1_uint64(&self, value: u64) -> Asn1Result<()> {
        self.add_asn1_uint64_with_tag(value, Asn1Tag::INTEGER)
    }

    /// Write `value` as INTEGER contents under an implicit `tag`
    ///
    /// # Encoding Format
    /// Leading zero bytes are dropped and a `0x00` is prepended when the top
    /// bit of the first remaining byte is set. Zero encodes as a single
    /// `0x00`.
    pub fn add_asn1_uint64_with_tag(&self, value: u64, tag: Asn1Tag) -> Asn1Result<()> {
        let bytes = value.to_be_bytes();
        let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
        self.add_asn1_with(tag, |chain| {
            if bytes[start] & 0x80 != 0 {
                chain.write(&[0x00])?;
            }
            chain.write(&bytes[start..])
        })
    }

    /// Write an INTEGER holding `value`
    pub fn add_asn1_int64(&self, value: i64) -> Asn1Result<()> {
        self.add_asn1_int64_with_tag(value, Asn1Tag::INTEGER)
    }

    /// Write `value` as INTEGER contents under an implicit `tag`
    ///
    /// Negative values drop leading `0xff` bytes while the next byte still
    /// carries the sign bit.
    pub fn add_asn1_int64_with_tag(&self, value: i64, tag: Asn1Tag) -> Asn1Result<()> {
        if let Ok(unsigned) = u64::try_from(value) {
            return self.add_asn1_uint64_with_tag(unsigned, tag);
        }
        let bytes = value.to_be_bytes();
        let mut start = 0;
        while start < bytes.len() - 1 && bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0 {
            start += 1;
        }
        self.add_asn1_with(tag, |chain| chain.write(&bytes[start..]))
    }

    /// Write an INTEGER of any size
    pub fn add_asn1_integer(&self, value: &Asn1Integer) -> Asn1Result<()> {
        self.add_asn1_with(Asn1Tag::INTEGER, |chain| {
            chain.write(&encode_der_integer(value)?)
        })
    }

    pub fn add_asn1_octet_string(&self, data: &[u8]) -> Asn1Result<()> {
        self.add_asn1_with(Asn1Tag::OCTET_STRING, |chain| chain.write(data))
    }

    /// Write a BOOLEAN; DER encodes true as `0xff`
    pub fn add_asn1_bool(&self, value: bool) -> Asn1Result<()> {
        let byte = if value { 0xff } else { 0x00 };
        self.add_asn1_with(Asn1Tag::BOOLEAN, |chain| chain.write(&[byte]))
    }

    /// Write the contents of an OBJECT IDENTIFIER given in dotted decimal
    ///
    /// Only the contents are written; open the element with
    /// `add_asn1(Asn1Tag::OID)` first.
    ///
    /// # Errors
    /// Returns `InvalidOid` unless `text` has at least two arcs, every arc
    /// is a decimal without leading zeros that fits in `u64`, the first arc
    /// is at most 2, and the second is below 40 when the first is 0 or 1.
    pub fn add_asn1_oid_from_text(&self, text: &str) -> Asn1Result<()> {
        self.with_flushed(|chain| chain.write(&encode_oid(text)?))
    }

    /// Sort this handle's contents into DER SET OF order
    ///
    /// # Errors
    /// Returns `MalformedDer` if the contents are not a sequence of DER
    /// elements; nothing is reordered in that case.
    pub fn flush_asn1_set_of(&self) -> Asn1Result<()> {
        let depth = self.depth;
        self.with_flushed(|chain| {
            let start = chain.child_start(depth);
            set_of::sort_elements(&mut chain.buf.as_mut_slice()[start..])
        })
    }
}

impl fmt::Debug for Cbb<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Cbb")
            .field("depth", &self.depth)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

fn encode_oid(text: &str) -> Asn1Result<Vec<u8>> {
    let invalid = || Asn1Error::InvalidOid(text.to_string());

    let mut arcs = Vec::new();
    for component in text.split('.') {
        let digits_only = !component.is_empty() && component.bytes().all(|b| b.is_ascii_digit());
        if !digits_only || (component.len() > 1 && component.starts_with('0')) {
            return Err(invalid());
        }
        arcs.push(component.parse::<u64>().map_err(|_| invalid())?);
    }

    let [first, second, rest @ ..] = arcs.as_slice() else {
        return Err(invalid());
    };
    if *first > 2 || (*first < 2 && *second >= 40) {
        return Err(invalid());
    }
    let head = (40 * first).checked_add(*second).ok_or_else(invalid)?;

    let mut out = Vec::new();
    for arc in std::iter::once(head).chain(rest.iter().copied()) {
        base128::write_base128(arc, base128::encoded_len(arc), |byte| out.push(byte));
    }
    Ok(out)
}
