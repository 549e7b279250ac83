// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Startup handshake of passive workers.
//!
//! A passive worker starts dormant. Before its first receive it signals a
//! supervising thread exactly once to declare that it is ready, then blocks
//! on its endpoint. Both happen in one combined system call so the
//! supervisor can never observe readiness before the worker is receiving.

use crate::kernel::{Kernel, KernelError, Received};
use tether_abi::CapSlot;


/// Signals `notification` and receives the first call on `endpoint`.
///
/// # Errors
///
/// Returns [`KernelError::EmptySlot`] for a null notification, or the
/// kernel's error if the combined call fails.
pub fn signal_and_receive<K: Kernel>(
    kernel: &mut K,
    notification: CapSlot,
    endpoint: CapSlot,
    reply_object: Option<CapSlot>,
) -> Result<Received, KernelError> {
    let notification = notification
        .non_null()
        .ok_or(KernelError::EmptySlot(notification))?;
    tracing::debug!(%notification, %endpoint, "passive worker ready");
    kernel.signal_recv(notification, endpoint, reply_object)
}
