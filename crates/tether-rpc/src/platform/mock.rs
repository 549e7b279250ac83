// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Host simulation of the kernel IPC primitives.
//!
//! [`MockKernel`] plays both sides of a connection: a queue of scripted
//! incoming calls stands in for the callers, and a queue of scripted replies
//! answers the nested calls a handler makes. It models the non-realtime
//! reply right precisely enough to tell the two reply paths apart:
//!
//! - each receive leaves the caller's reply right in the thread context;
//! - a nested `call` destroys that right;
//! - `save_caller` moves it into a storage slot, from where a re-derived
//!   capability can `send` the reply.
//!
//! Every primitive appends a [`MockEvent`], so tests assert on the exact
//! sequence of system calls.

use crate::config::PartnerTrust;
use crate::error::{ErrorAction, ErrorSink, RpcError};
use crate::fastpath::FastReplyTransport;
use crate::kernel::{Kernel, KernelError, Received};
use std::collections::{BTreeMap, VecDeque};
use std::vec::Vec;
use tether_abi::ipc::{MSG_MAX_BYTES, words_for_bytes};
use tether_abi::{Badge, CapSlot, MessageInfo};

/// Identity of a simulated caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallerId(pub u32);

/// How a reply reached its caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyPath {
    /// Combined reply-receive on the thread's reply right.
    Fast,
    /// Plain send on a re-derived, preserved reply right.
    Preserved,
    /// The specialised empty reply sequence.
    FastPath,
}

/// One simulated system call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockEvent {
    /// A call was received.
    Received {
        /// Who sent it.
        caller: CallerId,
        /// Badge delivered with it.
        badge: Badge,
    },
    /// A notification was signalled.
    Signalled {
        /// The notification.
        notification: CapSlot,
    },
    /// A reply reached its caller.
    Replied {
        /// The caller answered.
        caller: CallerId,
        /// Reply payload (whole words).
        payload: Vec<u8>,
        /// Path the reply took.
        path: ReplyPath,
    },
    /// A reply was attempted without a live reply right and went nowhere.
    ReplyLost {
        /// Path that was attempted.
        path: ReplyPath,
    },
    /// The reply right was moved into a storage slot.
    Saved {
        /// The storage slot.
        slot: CapSlot,
    },
    /// A reply capability was re-derived from a storage slot.
    Rederived {
        /// The storage slot.
        slot: CapSlot,
    },
    /// The worker called another endpoint.
    NestedCall {
        /// The endpoint called.
        endpoint: CapSlot,
        /// Call payload (whole words).
        payload: Vec<u8>,
    },
    /// The specialised empty sequence was used.
    FastPath {
        /// The partner was trusted.
        trusted: bool,
        /// Scratch registers were restored afterwards.
        reloaded: bool,
    },
}

#[derive(Clone, Debug)]
struct ScriptedCall {
    caller: CallerId,
    badge: Badge,
    payload: Vec<u8>,
    length_words: Option<usize>,
}

/// Bit set on capabilities returned by `rederive_reply`.
const DERIVED_BIT: u64 = 1 << 63;

/// Simulated kernel for one worker thread.
#[derive(Debug)]
pub struct MockKernel {
    incoming: VecDeque<ScriptedCall>,
    nested_replies: VecDeque<Vec<u8>>,
    /// Caller whose reply right sits in the thread context.
    tcb_reply: Option<CallerId>,
    /// Reply rights moved into storage, by slot.
    stored: BTreeMap<u64, CallerId>,
    buffer: Vec<u8>,
    events: Vec<MockEvent>,
    fail_save_caller: Option<KernelError>,
    fail_rederive: Option<KernelError>,
}

impl MockKernel {
    /// Creates a kernel with an IPC-buffer sized message buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_buffer_size(MSG_MAX_BYTES)
    }

    /// Creates a kernel with a message buffer of `size` bytes.
    #[must_use]
    pub fn with_buffer_size(size: usize) -> Self {
        Self {
            incoming: VecDeque::new(),
            nested_replies: VecDeque::new(),
            tcb_reply: None,
            stored: BTreeMap::new(),
            buffer: std::vec![0; size],
            events: Vec::new(),
            fail_save_caller: None,
            fail_rederive: None,
        }
    }

    /// Queues an incoming call. Its length is `payload` rounded up to words.
    pub fn push_call(&mut self, caller: CallerId, badge: Badge, payload: &[u8]) {
        self.incoming.push_back(ScriptedCall {
            caller,
            badge,
            payload: payload.to_vec(),
            length_words: None,
        });
    }

    /// Queues an incoming call announcing `length_words` words.
    pub fn push_call_with_length(
        &mut self,
        caller: CallerId,
        badge: Badge,
        payload: &[u8],
        length_words: usize,
    ) {
        self.incoming.push_back(ScriptedCall {
            caller,
            badge,
            payload: payload.to_vec(),
            length_words: Some(length_words),
        });
    }

    /// Queues the reply to the next nested call.
    pub fn push_nested_reply(&mut self, payload: &[u8]) {
        self.nested_replies.push_back(payload.to_vec());
    }

    /// Makes the next `save_caller` fail with `error`.
    pub fn fail_next_save_caller(&mut self, error: KernelError) {
        self.fail_save_caller = Some(error);
    }

    /// Makes the next `rederive_reply` fail with `error`.
    pub fn fail_next_rederive(&mut self, error: KernelError) {
        self.fail_rederive = Some(error);
    }

    /// Every event so far.
    #[must_use]
    pub fn events(&self) -> &[MockEvent] {
        &self.events
    }

    /// Replies delivered so far, as `(caller, payload, path)`.
    #[must_use]
    pub fn replies(&self) -> Vec<(CallerId, &[u8], ReplyPath)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                MockEvent::Replied {
                    caller,
                    payload,
                    path,
                } => Some((*caller, payload.as_slice(), *path)),
                _ => None,
            })
            .collect()
    }

    /// Number of scripted calls not yet received.
    #[must_use]
    pub fn pending_calls(&self) -> usize {
        self.incoming.len()
    }

    /// Replies on the thread's reply right through the specialised sequence
    /// and receives the next call.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Disconnected`] when no calls remain.
    pub fn fast_reply_recv(&mut self, trust: PartnerTrust) -> Result<Received, KernelError> {
        self.events.push(MockEvent::FastPath {
            trusted: trust.is_trusted(),
            reloaded: !trust.is_trusted(),
        });
        self.deliver_fast(0, ReplyPath::FastPath);
        self.receive()
    }

    fn deliver_fast(&mut self, length_bytes: usize, path: ReplyPath) {
        match self.tcb_reply.take() {
            Some(caller) => {
                let payload = self.payload(length_bytes);
                self.events.push(MockEvent::Replied {
                    caller,
                    payload,
                    path,
                });
            }
            None => self.events.push(MockEvent::ReplyLost { path }),
        }
    }

    fn payload(&self, length_bytes: usize) -> Vec<u8> {
        self.buffer[..length_bytes.min(self.buffer.len())].to_vec()
    }

    fn receive(&mut self) -> Result<Received, KernelError> {
        let call = self.incoming.pop_front().ok_or(KernelError::Disconnected)?;
        let len = call.payload.len().min(self.buffer.len());
        self.buffer[..len].copy_from_slice(&call.payload[..len]);
        let words = call
            .length_words
            .unwrap_or_else(|| words_for_bytes(call.payload.len()));
        self.tcb_reply = Some(call.caller);
        self.events.push(MockEvent::Received {
            caller: call.caller,
            badge: call.badge,
        });
        Ok(Received {
            info: MessageInfo::new(0, 0, 0, words),
            badge: call.badge,
        })
    }
}

impl Default for MockKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel for MockKernel {
    fn recv(
        &mut self,
        _endpoint: CapSlot,
        _reply: Option<CapSlot>,
    ) -> Result<Received, KernelError> {
        self.receive()
    }

    fn reply_recv(
        &mut self,
        _endpoint: CapSlot,
        info: MessageInfo,
        _reply: Option<CapSlot>,
    ) -> Result<Received, KernelError> {
        self.deliver_fast(info.length_bytes(), ReplyPath::Fast);
        self.receive()
    }

    fn signal_recv(
        &mut self,
        notification: CapSlot,
        _endpoint: CapSlot,
        _reply: Option<CapSlot>,
    ) -> Result<Received, KernelError> {
        self.events.push(MockEvent::Signalled { notification });
        self.receive()
    }

    fn send(&mut self, cap: CapSlot, info: MessageInfo) -> Result<(), KernelError> {
        // Only re-derived reply capabilities are modelled as send targets.
        if cap.as_u64() & DERIVED_BIT == 0 {
            return Err(KernelError::EmptySlot(cap));
        }
        let caller = self
            .stored
            .remove(&(cap.as_u64() & !DERIVED_BIT))
            .ok_or(KernelError::EmptySlot(cap))?;
        let payload = self.payload(info.length_bytes());
        self.events.push(MockEvent::Replied {
            caller,
            payload,
            path: ReplyPath::Preserved,
        });
        Ok(())
    }

    fn call(&mut self, endpoint: CapSlot, info: MessageInfo) -> Result<MessageInfo, KernelError> {
        let payload = self.payload(info.length_bytes());
        self.events.push(MockEvent::NestedCall { endpoint, payload });
        // The caller side of a call reuses the thread's reply slot.
        self.tcb_reply = None;
        let reply = self
            .nested_replies
            .pop_front()
            .ok_or(KernelError::Disconnected)?;
        let len = reply.len().min(self.buffer.len());
        self.buffer[..len].copy_from_slice(&reply[..len]);
        Ok(MessageInfo::for_bytes(reply.len()))
    }

    fn save_caller(&mut self, _cnode: CapSlot, slot: CapSlot) -> Result<(), KernelError> {
        if let Some(error) = self.fail_save_caller.take() {
            return Err(error);
        }
        let caller = self.tcb_reply.take().ok_or(KernelError::Syscall(1))?;
        self.stored.insert(slot.as_u64(), caller);
        self.events.push(MockEvent::Saved { slot });
        Ok(())
    }

    fn rederive_reply(&mut self, _cnode: CapSlot, slot: CapSlot) -> Result<CapSlot, KernelError> {
        if let Some(error) = self.fail_rederive.take() {
            return Err(error);
        }
        if !self.stored.contains_key(&slot.as_u64()) {
            return Err(KernelError::EmptySlot(slot));
        }
        self.events.push(MockEvent::Rederived { slot });
        Ok(CapSlot::new(slot.as_u64() | DERIVED_BIT))
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }
}

/// Fast transport that records its use on a [`MockKernel`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MockFastTransport;

impl FastReplyTransport<MockKernel> for MockFastTransport {
    fn reply_recv_empty(
        &mut self,
        kernel: &mut MockKernel,
        _endpoint: CapSlot,
        trust: PartnerTrust,
    ) -> Result<Received, KernelError> {
        kernel.fast_reply_recv(trust)
    }

    fn call_empty(
        &mut self,
        kernel: &mut MockKernel,
        endpoint: CapSlot,
        trust: PartnerTrust,
    ) -> Result<(), KernelError> {
        kernel.events.push(MockEvent::FastPath {
            trusted: trust.is_trusted(),
            reloaded: !trust.is_trusted(),
        });
        kernel.call(endpoint, MessageInfo::EMPTY).map(|_| ())
    }
}

/// Error sink that records every report.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    /// Reports in the order received.
    pub errors: Vec<RpcError>,
    /// Action returned for every report.
    pub action: ErrorAction,
}

impl RecordingSink {
    /// Creates a sink that continues after every report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink that aborts on the first report.
    #[must_use]
    pub fn aborting() -> Self {
        Self {
            errors: Vec::new(),
            action: ErrorAction::Abort,
        }
    }
}

impl ErrorSink for RecordingSink {
    fn report(&mut self, error: &RpcError) -> ErrorAction {
        self.errors.push(*error);
        self.action
    }
}
