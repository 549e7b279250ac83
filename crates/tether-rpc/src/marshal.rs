// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Marshalling gateway.
//!
//! The byte encoding of individual argument types is owned by the
//! interface's marshaller. The stubs call into it at fixed points of the
//! call cycle and react to its outcome:
//!
//! - the server decodes inputs into the worker's slots, encodes outputs
//!   after the handler ran, and releases heap-owned inputs afterwards;
//! - the caller encodes inputs after the selector and decodes the reply.
//!
//! [`Reader`] and [`Writer`] are small cursor helpers for marshallers that
//! lay out fixed-size values back to back in native byte order.

use core::fmt;
use tether_abi::{Method, MethodIndex};


// =============================================================================
// Errors
// =============================================================================

/// The payload ended before the decoder could read what it needed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeError {
    /// Byte offset (relative to the start of the payload) the decoder
    /// needed to read up to.
    pub offset: usize,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "payload truncated before byte {}", self.offset)
    }
}

/// The encoded message does not fit the buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodeError {
    /// Bytes the encoder needed.
    pub needed: usize,
    /// Bytes available.
    pub capacity: usize,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "message needs {} bytes, buffer holds {}",
            self.needed, self.capacity
        )
    }
}

// =============================================================================
// Marshaller Traits
// =============================================================================

/// Server-side marshaller of one interface.
///
/// `Slots` is the per-worker storage for every method's decoded inputs,
/// outputs and return value. It lives in the worker's call context and is
/// overwritten by each call, never dropped between calls.
pub trait ServerMarshaller {
    /// Per-worker argument and return storage.
    type Slots: Default;

    /// Decodes the input parameters of `method` from `payload`.
    ///
    /// `payload` starts after the selector and ends at the message's valid
    /// length.
    ///
    /// # Errors
    ///
    /// Returns the offset the decoder could not reach.
    fn decode_inputs(
        &mut self,
        method: MethodIndex,
        desc: &Method,
        payload: &[u8],
        slots: &mut Self::Slots,
    ) -> Result<(), DecodeError>;

    /// Encodes the outputs and return value of `method` into `out`.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply does not fit `out`.
    fn encode_outputs(
        &mut self,
        method: MethodIndex,
        desc: &Method,
        slots: &Self::Slots,
        out: &mut [u8],
    ) -> Result<usize, EncodeError>;

    /// Releases heap-owned values decoded for `method`.
    ///
    /// Called exactly once after every successful decode, whether or not
    /// the cycle reached the reply.
    fn release(&mut self, method: MethodIndex, slots: &mut Self::Slots);
}

/// Caller-side marshaller of one interface.
pub trait ClientMarshaller {
    /// Input values of a call.
    type Request;
    /// Output values and return value of a call.
    type Response;

    /// Encodes the inputs of `method` into `out`, returning the bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if the inputs do not fit `out`.
    fn encode_inputs(
        &mut self,
        method: MethodIndex,
        desc: &Method,
        request: &Self::Request,
        out: &mut [u8],
    ) -> Result<usize, EncodeError>;

    /// Decodes the outputs of `method` from a reply payload.
    ///
    /// # Errors
    ///
    /// Returns the offset the decoder could not reach.
    fn decode_outputs(
        &mut self,
        method: MethodIndex,
        desc: &Method,
        payload: &[u8],
    ) -> Result<Self::Response, DecodeError>;
}

// =============================================================================
// Cursors
// =============================================================================

/// Sequential reader over a payload.
#[derive(Debug)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader at the start of `bytes`.
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Current offset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Reads `len` raw bytes.
    ///
    /// # Errors
    ///
    /// Returns the offset that could not be reached.
    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(len).ok_or(DecodeError { offset: usize::MAX })?;
        let slice = self.bytes.get(self.pos..end).ok_or(DecodeError { offset: end })?;
        self.pos = end;
        Ok(slice)
    }

    /// Reads a fixed-size array.
    ///
    /// # Errors
    ///
    /// Returns the offset that could not be reached.
    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut raw = [0u8; N];
        raw.copy_from_slice(self.bytes(N)?);
        Ok(raw)
    }

    /// Reads a native-endian `u32`.
    ///
    /// # Errors
    ///
    /// Returns the offset that could not be reached.
    pub fn u32(&mut self) -> Result<u32, DecodeError> {
        self.array().map(u32::from_ne_bytes)
    }

    /// Reads a native-endian `i32`.
    ///
    /// # Errors
    ///
    /// Returns the offset that could not be reached.
    pub fn i32(&mut self) -> Result<i32, DecodeError> {
        self.array().map(i32::from_ne_bytes)
    }

    /// Reads a native-endian `u64`.
    ///
    /// # Errors
    ///
    /// Returns the offset that could not be reached.
    pub fn u64(&mut self) -> Result<u64, DecodeError> {
        self.array().map(u64::from_ne_bytes)
    }
}

/// Sequential writer into a buffer.
#[derive(Debug)]
pub struct Writer<'a> {
    bytes: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    /// Creates a writer at the start of `bytes`.
    #[must_use]
    pub const fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Bytes written so far.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Appends raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is too small.
    pub fn bytes(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        let capacity = self.bytes.len();
        let end = self.pos.saturating_add(data.len());
        let out = self
            .bytes
            .get_mut(self.pos..end)
            .ok_or(EncodeError { needed: end, capacity })?;
        out.copy_from_slice(data);
        self.pos = end;
        Ok(())
    }

    /// Appends a native-endian `u32`.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is too small.
    pub fn u32(&mut self, value: u32) -> Result<(), EncodeError> {
        self.bytes(&value.to_ne_bytes())
    }

    /// Appends a native-endian `i32`.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is too small.
    pub fn i32(&mut self, value: i32) -> Result<(), EncodeError> {
        self.bytes(&value.to_ne_bytes())
    }

    /// Appends a native-endian `u64`.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is too small.
    pub fn u64(&mut self, value: u64) -> Result<(), EncodeError> {
        self.bytes(&value.to_ne_bytes())
    }
}
