// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Reduced-overhead reply path.
//!
//! An interface whose only method takes no arguments and returns nothing
//! exchanges empty messages in both directions. Some platforms offer a
//! cheaper system call sequence for that case. The dispatch loop reaches it
//! only through [`FastReplyTransport`], and only when
//! [`InterfaceConfig::fast_path_eligible`](crate::InterfaceConfig::fast_path_eligible)
//! holds. Every transport must be observably identical to
//! [`GenericTransport`]: an empty reply followed by an immediate receive.
//!
//! When the partner is not trusted, a transport must restore any register
//! the shortened sequence lets the partner clobber before returning.

use crate::config::PartnerTrust;
use crate::kernel::{Kernel, KernelError, Received};
use tether_abi::{CapSlot, MessageInfo};

/// System call sequences for empty messages.
pub trait FastReplyTransport<K: Kernel> {
    /// Replies with an empty message and waits for the next call.
    ///
    /// # Errors
    ///
    /// Returns an error if the receive cannot be performed.
    fn reply_recv_empty(
        &mut self,
        kernel: &mut K,
        endpoint: CapSlot,
        trust: PartnerTrust,
    ) -> Result<Received, KernelError>;

    /// Calls `endpoint` with an empty message and waits for the empty reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the call cannot be performed.
    fn call_empty(
        &mut self,
        kernel: &mut K,
        endpoint: CapSlot,
        trust: PartnerTrust,
    ) -> Result<(), KernelError>;
}

/// The ordinary kernel primitives, used where no specialised sequence exists.
#[derive(Clone, Copy, Debug, Default)]
pub struct GenericTransport;

impl<K: Kernel> FastReplyTransport<K> for GenericTransport {
    fn reply_recv_empty(
        &mut self,
        kernel: &mut K,
        endpoint: CapSlot,
        _trust: PartnerTrust,
    ) -> Result<Received, KernelError> {
        kernel.reply_recv(endpoint, MessageInfo::EMPTY, None)
    }

    fn call_empty(
        &mut self,
        kernel: &mut K,
        endpoint: CapSlot,
        _trust: PartnerTrust,
    ) -> Result<(), KernelError> {
        kernel.call(endpoint, MessageInfo::EMPTY).map(|_| ())
    }
}
