// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Caller stub.
//!
//! The mirror image of the dispatch loop: a [`Client`] writes the selector
//! and the marshalled inputs, performs the blocking call, and decodes the
//! reply. Used by handlers calling other interfaces (through
//! [`Invocation::client`](crate::Invocation::client)), in which case the
//! pending reply right of the call being serviced is protected first.

use crate::config::InterfaceConfig;
use crate::fastpath::{FastReplyTransport, GenericTransport};
use crate::kernel::{Kernel, KernelError};
use crate::marshal::{ClientMarshaller, DecodeError, EncodeError};
use crate::reply::ReplyCapManager;
use core::fmt;
use tether_abi::{InterfaceType, MessageInfo, Method, MethodIndex};


/// Error from a call through the caller stub.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallError {
    /// The interface has no such method.
    InvalidMethod(MethodIndex),
    /// The pending reply right could not be preserved.
    Protect(KernelError),
    /// The inputs do not fit the message buffer.
    Encode(EncodeError),
    /// The call itself failed.
    Kernel(KernelError),
    /// The reply could not be decoded.
    Decode(DecodeError),
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMethod(method) => write!(f, "no method {method}"),
            Self::Protect(error) => write!(f, "failed to save reply cap: {error}"),
            Self::Encode(error) => write!(f, "failed to marshal inputs: {error}"),
            Self::Kernel(error) => write!(f, "call failed: {error}"),
            Self::Decode(error) => write!(f, "failed to unmarshal reply: {error}"),
        }
    }
}

/// The caller end of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientEnd {
    /// Connection configuration; `endpoint` is the badged endpoint to call.
    pub config: InterfaceConfig,
    /// Interface at the other end.
    pub iface: &'static InterfaceType,
}

impl ClientEnd {
    /// Creates a caller end.
    #[must_use]
    pub const fn new(config: InterfaceConfig, iface: &'static InterfaceType) -> Self {
        Self { config, iface }
    }
}

/// Caller stub bound to one worker's kernel.
pub struct Client<'c, K, M, F = GenericTransport> {
    end: ClientEnd,
    kernel: &'c mut K,
    reply: Option<&'c mut ReplyCapManager>,
    marshaller: M,
    transport: F,
}

impl<'c, K: Kernel, M: ClientMarshaller> Client<'c, K, M> {
    /// Creates a stub for a thread that is not servicing a call.
    #[must_use]
    pub fn new(end: ClientEnd, kernel: &'c mut K, marshaller: M) -> Self {
        Self {
            end,
            kernel,
            reply: None,
            marshaller,
            transport: GenericTransport,
        }
    }

    /// Creates a stub that protects `reply` before calling.
    pub(crate) fn nested(
        end: ClientEnd,
        kernel: &'c mut K,
        reply: &'c mut ReplyCapManager,
        marshaller: M,
    ) -> Self {
        Self {
            end,
            kernel,
            reply: Some(reply),
            marshaller,
            transport: GenericTransport,
        }
    }
}

impl<'c, K, M, F> Client<'c, K, M, F>
where
    K: Kernel,
    M: ClientMarshaller,
    F: FastReplyTransport<K>,
{
    /// Replaces the reduced-overhead transport.
    #[must_use]
    pub fn with_transport<G: FastReplyTransport<K>>(self, transport: G) -> Client<'c, K, M, G> {
        Client {
            end: self.end,
            kernel: self.kernel,
            reply: self.reply,
            marshaller: self.marshaller,
            transport,
        }
    }

    /// Calls `method` with `request` and waits for the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the method does not exist, the reply right cannot
    /// be protected, the inputs do not fit, the call fails, or the reply
    /// cannot be decoded. Encoding failures happen before the kernel is
    /// invoked.
    pub fn call(
        &mut self,
        method: MethodIndex,
        request: &M::Request,
    ) -> Result<M::Response, CallError> {
        let desc = self
            .end
            .iface
            .method(method)
            .ok_or(CallError::InvalidMethod(method))?;
        let config = self.end.config;

        // The call below overwrites any reply right this thread holds.
        if let Some(reply) = self.reply.as_deref_mut() {
            reply.protect(&mut *self.kernel).map_err(CallError::Protect)?;
        }

        if config.fast_path_eligible(self.end.iface) {
            self.transport
                .call_empty(&mut *self.kernel, config.endpoint, config.trust)
                .map_err(CallError::Kernel)?;
            return self.decode(method, desc, 0);
        }

        let length = self.encode(method, desc, request)?;
        let info = if config.userspace_buffer.is_some() {
            MessageInfo::EMPTY
        } else {
            MessageInfo::for_bytes(length)
        };
        let reply_info = self
            .kernel
            .call(config.endpoint, info)
            .map_err(CallError::Kernel)?;
        let size = config.message_size(reply_info.length_bytes());
        self.decode(method, desc, size)
    }

    /// Writes the selector and inputs, returning the message length.
    fn encode(
        &mut self,
        method: MethodIndex,
        desc: &Method,
        request: &M::Request,
    ) -> Result<usize, CallError> {
        let width = self.end.iface.selector_width();
        let buffer = self.kernel.buffer_mut();
        let capacity = self.end.config.buffer_capacity().min(buffer.len());
        let out = &mut buffer[..capacity];
        let selector = width.write(method, out).ok_or(CallError::Encode(EncodeError {
            needed: width.bytes(),
            capacity,
        }))?;
        let inputs = self
            .marshaller
            .encode_inputs(method, desc, request, &mut out[selector..])
            .map_err(|error| {
                CallError::Encode(EncodeError {
                    needed: selector.saturating_add(error.needed),
                    capacity,
                })
            })?;
        Ok(selector.saturating_add(inputs))
    }

    fn decode(
        &mut self,
        method: MethodIndex,
        desc: &Method,
        size: usize,
    ) -> Result<M::Response, CallError> {
        let buffer = self.kernel.buffer();
        let payload = &buffer[..size.min(buffer.len())];
        self.marshaller
            .decode_outputs(method, desc, payload)
            .map_err(CallError::Decode)
    }
}

impl<M: ClientMarshaller + ?Sized> ClientMarshaller for &mut M {
    type Request = M::Request;
    type Response = M::Response;

    fn encode_inputs(
        &mut self,
        method: MethodIndex,
        desc: &Method,
        request: &Self::Request,
        out: &mut [u8],
    ) -> Result<usize, EncodeError> {
        (**self).encode_inputs(method, desc, request, out)
    }

    fn decode_outputs(
        &mut self,
        method: MethodIndex,
        desc: &Method,
        payload: &[u8],
    ) -> Result<Self::Response, DecodeError> {
        (**self).decode_outputs(method, desc, payload)
    }
}

impl<K, M, F> fmt::Debug for Client<'_, K, M, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("end", &self.end)
            .field("nested", &self.reply.is_some())
            .finish_non_exhaustive()
    }
}
