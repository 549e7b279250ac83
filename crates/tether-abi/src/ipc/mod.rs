// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Message framing for RPC calls and replies.
//!
//! A call message is a method selector followed by marshalled argument
//! bytes. The selector is omitted (and implicitly 0) when the interface
//! has exactly one method. A reply carries only marshalled output bytes.
//!
//! # Call Layout
//!
//! | Bytes | Content |
//! |-------|---------|
//! | `0..w` | selector, native byte order, `w` from [`SelectorWidth`] |
//! | `w..len` | marshalled input parameters |
//!
//! When the message travels in the thread's IPC buffer, its length is
//! carried in [`MessageInfo::length`] in words, so a byte length is always
//! rounded up to a whole word.

use core::fmt;


// =============================================================================
// Limits
// =============================================================================

/// Size of a message register in bytes.
pub const WORD_SIZE: usize = 8;

/// Maximum number of message registers in one IPC message.
pub const MSG_MAX_LENGTH: usize = 120;

/// Maximum number of bytes an IPC-buffer message can carry.
pub const MSG_MAX_BYTES: usize = MSG_MAX_LENGTH * WORD_SIZE;

/// Number of words needed to carry `bytes` bytes.
#[inline]
#[must_use]
pub const fn words_for_bytes(bytes: usize) -> usize {
    bytes.div_ceil(WORD_SIZE)
}

// =============================================================================
// Message Info
// =============================================================================

/// The kernel's message descriptor for a single IPC transfer.
///
/// Mirrors the fields of `seL4_MessageInfo_t` that RPC stubs use.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageInfo {
    label: u64,
    caps_unwrapped: u8,
    extra_caps: u8,
    length: usize,
}

impl MessageInfo {
    /// A message with no label, no capabilities and no payload.
    pub const EMPTY: Self = Self::new(0, 0, 0, 0);

    /// Creates a message info value.
    #[inline]
    #[must_use]
    pub const fn new(label: u64, caps_unwrapped: u8, extra_caps: u8, length: usize) -> Self {
        Self {
            label,
            caps_unwrapped,
            extra_caps,
            length,
        }
    }

    /// Creates a message info value carrying `bytes` bytes of payload.
    #[inline]
    #[must_use]
    pub const fn for_bytes(bytes: usize) -> Self {
        Self::new(0, 0, 0, words_for_bytes(bytes))
    }

    /// Message label.
    #[inline]
    #[must_use]
    pub const fn label(self) -> u64 {
        self.label
    }

    /// Number of capabilities unwrapped by the kernel.
    #[inline]
    #[must_use]
    pub const fn caps_unwrapped(self) -> u8 {
        self.caps_unwrapped
    }

    /// Number of extra capabilities transferred.
    #[inline]
    #[must_use]
    pub const fn extra_caps(self) -> u8 {
        self.extra_caps
    }

    /// Payload length in words.
    #[inline]
    #[must_use]
    pub const fn length(self) -> usize {
        self.length
    }

    /// Payload length in bytes.
    #[inline]
    #[must_use]
    pub const fn length_bytes(self) -> usize {
        self.length.saturating_mul(WORD_SIZE)
    }
}

impl fmt::Debug for MessageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MessageInfo {{ label: {}, length: {} }}",
            self.label, self.length
        )
    }
}

// =============================================================================
// Method Selectors
// =============================================================================

/// Index of a method within an interface's ordered method table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct MethodIndex(u64);

impl MethodIndex {
    /// The only method of a single-method interface.
    pub const FIRST: Self = Self(0);

    /// Creates a method index.
    #[inline]
    #[must_use]
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the index as usize (for method table lookup).
    ///
    /// Indices that do not fit `usize` saturate, which is always out of range.
    #[inline]
    #[must_use]
    pub fn as_usize(self) -> usize {
        usize::try_from(self.0).unwrap_or(usize::MAX)
    }
}

impl fmt::Debug for MethodIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodIndex({})", self.0)
    }
}

impl fmt::Display for MethodIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Encoded width of the selector at the front of a call message.
///
/// The selector uses the smallest unsigned integer that can index every
/// method. Single-method interfaces carry no selector at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectorWidth {
    /// No selector: the interface has at most one method.
    Implicit,
    /// One byte.
    U8,
    /// Two bytes.
    U16,
    /// Four bytes.
    U32,
    /// Eight bytes.
    U64,
}

impl SelectorWidth {
    /// Selector width for an interface with `method_count` methods.
    #[must_use]
    pub const fn for_method_count(method_count: usize) -> Self {
        // Widen before comparing so 32-bit hosts agree with 64-bit ones.
        let count = method_count as u64;
        if count <= 1 {
            Self::Implicit
        } else if count <= 1 << 8 {
            Self::U8
        } else if count <= 1 << 16 {
            Self::U16
        } else if count <= 1 << 32 {
            Self::U32
        } else {
            Self::U64
        }
    }

    /// Number of bytes the selector occupies.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Implicit => 0,
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }

    /// Reads a selector from the front of `payload`.
    ///
    /// Returns `None` if the payload is shorter than the selector. An
    /// implicit selector always reads as method 0 and never fails.
    #[must_use]
    pub fn read(self, payload: &[u8]) -> Option<MethodIndex> {
        let width = self.bytes();
        let bytes = payload.get(..width)?;
        let value = match self {
            Self::Implicit => 0,
            Self::U8 => u64::from(bytes[0]),
            Self::U16 => u64::from(u16::from_ne_bytes([bytes[0], bytes[1]])),
            Self::U32 => u64::from(u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
            Self::U64 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                u64::from_ne_bytes(raw)
            }
        };
        Some(MethodIndex::new(value))
    }

    /// Writes `method` to the front of `buffer`.
    ///
    /// Returns the number of bytes written, or `None` if the buffer is too
    /// small or the index does not fit the width.
    #[must_use]
    pub fn write(self, method: MethodIndex, buffer: &mut [u8]) -> Option<usize> {
        let width = self.bytes();
        let out = buffer.get_mut(..width)?;
        let value = method.as_u64();
        match self {
            Self::Implicit => {
                if value != 0 {
                    return None;
                }
            }
            Self::U8 => out.copy_from_slice(&u8::try_from(value).ok()?.to_ne_bytes()),
            Self::U16 => out.copy_from_slice(&u16::try_from(value).ok()?.to_ne_bytes()),
            Self::U32 => out.copy_from_slice(&u32::try_from(value).ok()?.to_ne_bytes()),
            Self::U64 => out.copy_from_slice(&value.to_ne_bytes()),
        }
        Some(width)
    }
}
