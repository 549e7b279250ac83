// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Kernel abstraction for the RPC stubs.
//!
//! This trait covers exactly the IPC primitives the server and caller
//! stubs use, allowing the dispatch loop to be tested on the host system
//! against [`crate::platform::MockKernel`]. One instance is owned by each
//! worker thread; the message buffer it exposes is that thread's IPC
//! buffer (or the dataport standing in for it).

use core::fmt;
use tether_abi::{Badge, CapSlot, MessageInfo};

/// Result of a blocking receive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Received {
    /// Message descriptor of the received call.
    pub info: MessageInfo,
    /// Badge of the capability the caller invoked.
    pub badge: Badge,
}

/// System calls that can appear in error reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syscall {
    /// Blocking receive.
    Recv,
    /// Combined reply and receive.
    ReplyRecv,
    /// Combined signal and receive.
    SignalRecv,
    /// Plain send.
    Send,
    /// Blocking call.
    Call,
    /// Move the pending reply right into a `CNode` slot.
    SaveCaller,
    /// Re-derive a reply capability from a preserved slot.
    RederiveReply,
}

impl fmt::Display for Syscall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Recv => "Recv",
            Self::ReplyRecv => "ReplyRecv",
            Self::SignalRecv => "SignalRecv",
            Self::Send => "Send",
            Self::Call => "Call",
            Self::SaveCaller => "CNodeSaveCaller",
            Self::RederiveReply => "RederiveReply",
        };
        f.write_str(name)
    }
}

/// Errors reported by kernel primitives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelError {
    /// The kernel rejected the invocation with this error code.
    Syscall(u64),
    /// The capability slot holds no capability.
    EmptySlot(CapSlot),
    /// The primitive is not available in this kernel configuration.
    Unsupported,
    /// No further messages will arrive (host simulation only).
    Disconnected,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syscall(code) => write!(f, "kernel error {code}"),
            Self::EmptySlot(slot) => write!(f, "{slot} is empty"),
            Self::Unsupported => write!(f, "not supported by this kernel configuration"),
            Self::Disconnected => write!(f, "endpoint disconnected"),
        }
    }
}

/// IPC primitives used by the RPC stubs.
///
/// `reply` arguments name the reply object used by realtime (MCS) kernels.
/// Non-realtime kernels keep the reply right in the thread context and
/// ignore it.
pub trait Kernel {
    /// Blocks until a message arrives on `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the receive cannot be performed.
    fn recv(&mut self, endpoint: CapSlot, reply: Option<CapSlot>) -> Result<Received, KernelError>;

    /// Replies on the pending reply right and blocks for the next message.
    ///
    /// # Errors
    ///
    /// Returns an error if the receive cannot be performed.
    fn reply_recv(
        &mut self,
        endpoint: CapSlot,
        info: MessageInfo,
        reply: Option<CapSlot>,
    ) -> Result<Received, KernelError>;

    /// Signals `notification` and blocks for a message on `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the receive cannot be performed.
    fn signal_recv(
        &mut self,
        notification: CapSlot,
        endpoint: CapSlot,
        reply: Option<CapSlot>,
    ) -> Result<Received, KernelError>;

    /// Sends a message without waiting for an answer.
    ///
    /// # Errors
    ///
    /// Returns an error if `cap` cannot be invoked.
    fn send(&mut self, cap: CapSlot, info: MessageInfo) -> Result<(), KernelError>;

    /// Sends a message on `endpoint` and blocks for the reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the call cannot be performed.
    fn call(&mut self, endpoint: CapSlot, info: MessageInfo) -> Result<MessageInfo, KernelError>;

    /// Moves the thread's pending reply right into `slot` of `cnode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be written.
    fn save_caller(&mut self, cnode: CapSlot, slot: CapSlot) -> Result<(), KernelError>;

    /// Returns a capability usable to reply through a preserved `slot`.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot no longer holds a usable reply right.
    fn rederive_reply(&mut self, cnode: CapSlot, slot: CapSlot) -> Result<CapSlot, KernelError>;

    /// The message buffer, readable after a receive.
    fn buffer(&self) -> &[u8];

    /// The message buffer, writable before a send.
    fn buffer_mut(&mut self) -> &mut [u8];
}
