// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Reply right management.
//!
//! On a non-realtime kernel, receiving a call leaves a one-shot reply right
//! in the receiving thread's context. Any blocking call the thread makes
//! afterwards overwrites it. Handlers of methods that may block therefore
//! get their reply right tracked by a [`ReplyCapManager`]:
//!
//! 1. before the handler runs, the manager is *declared*, which requires a
//!    storage slot for this worker;
//! 2. the first nested call the handler makes *protects* the right by
//!    moving it into that slot;
//! 3. after the handler returns, the reply goes through whichever location
//!    holds the right.
//!
//! A protection that fails is remembered until the handler returns, so the
//! dispatch loop can drop the call instead of replying through a right the
//! nested call has since consumed.
//!
//! Realtime kernels receive into a persistent reply object and bypass all
//! of this.

use crate::kernel::{Kernel, KernelError, Received, Syscall};
use core::fmt;
use tether_abi::{CapSlot, MessageInfo};

#[cfg(test)]
mod reply_test;

/// Location of a preserved reply right.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplyStorage {
    /// `CNode` holding the slot.
    pub cnode: CapSlot,
    /// Slot within `cnode`.
    pub slot: CapSlot,
}

impl ReplyStorage {
    /// Creates a storage location.
    #[must_use]
    pub const fn new(cnode: CapSlot, slot: CapSlot) -> Self {
        Self { cnode, slot }
    }
}

/// Where the reply right of the in-flight call currently lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyRight {
    /// Still in the thread context, usable by a combined reply-receive.
    FastSlot,
    /// Moved into a storage slot.
    Preserved(CapSlot),
}

/// A failed attempt to deliver a reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplyError {
    /// The failing system call.
    pub syscall: Syscall,
    /// The error it returned.
    pub error: KernelError,
}

impl fmt::Display for ReplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.syscall, self.error)
    }
}

impl ReplyRight {
    /// Moves the right out of the thread context into `storage`.
    ///
    /// A right that is already preserved is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns the kernel error if the right could not be moved.
    pub fn preserve<K: Kernel>(
        self,
        kernel: &mut K,
        storage: ReplyStorage,
    ) -> Result<Self, KernelError> {
        match self {
            Self::FastSlot => {
                kernel.save_caller(storage.cnode, storage.slot)?;
                Ok(Self::Preserved(storage.slot))
            }
            preserved @ Self::Preserved(_) => Ok(preserved),
        }
    }

    /// Replies with `info` and blocks for the next call on `endpoint`.
    ///
    /// A right still in the fast slot replies and receives in one step. A
    /// preserved right is re-derived from its slot, replied to with a plain
    /// send, and followed by a separate receive.
    ///
    /// If the preserved right cannot be used, the caller is left without a
    /// reply, nothing is received, and [`ReplyOutcome::Failed`] says why.
    ///
    /// # Errors
    ///
    /// Returns the kernel error if the receive fails.
    pub fn reply<K: Kernel>(
        self,
        kernel: &mut K,
        endpoint: CapSlot,
        cnode: CapSlot,
        info: MessageInfo,
    ) -> Result<ReplyOutcome, KernelError> {
        match self {
            Self::FastSlot => kernel
                .reply_recv(endpoint, info, None)
                .map(ReplyOutcome::Received),
            Self::Preserved(slot) => {
                let cap = match kernel.rederive_reply(cnode, slot) {
                    Ok(cap) => cap,
                    Err(error) => {
                        return Ok(ReplyOutcome::Failed(ReplyError {
                            syscall: Syscall::RederiveReply,
                            error,
                        }));
                    }
                };
                if let Err(error) = kernel.send(cap, info) {
                    return Ok(ReplyOutcome::Failed(ReplyError {
                        syscall: Syscall::Send,
                        error,
                    }));
                }
                kernel.recv(endpoint, None).map(ReplyOutcome::Received)
            }
        }
    }
}

/// Result of [`ReplyRight::reply`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The reply was delivered and the next call received.
    Received(Received),
    /// The reply could not be delivered; nothing was received.
    Failed(ReplyError),
}

/// The declared reply storage could not be prepared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeclareError {
    /// Size of the storage that could not be provided.
    pub alloc_bytes: usize,
}

/// Tracks the reply right of one worker across a handler invocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplyCapManager {
    storage: Option<ReplyStorage>,
    right: Option<ReplyRight>,
    failed: Option<KernelError>,
}

impl ReplyCapManager {
    /// Creates a manager with no storage assigned.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            storage: None,
            right: None,
            failed: None,
        }
    }

    /// Creates a manager preserving into `storage`.
    #[must_use]
    pub const fn with_storage(storage: ReplyStorage) -> Self {
        Self {
            storage: Some(storage),
            right: None,
            failed: None,
        }
    }

    /// Assigns the storage slot.
    pub fn set_storage(&mut self, storage: ReplyStorage) {
        self.storage = Some(storage);
    }

    /// Storage slot, if assigned.
    #[must_use]
    pub const fn storage(&self) -> Option<ReplyStorage> {
        self.storage
    }

    /// Starts tracking the reply right of a freshly received call.
    ///
    /// # Errors
    ///
    /// Fails if this worker has no usable storage slot.
    pub fn declare(&mut self) -> Result<(), DeclareError> {
        match self.storage {
            Some(storage) if !storage.slot.is_null() => {
                self.right = Some(ReplyRight::FastSlot);
                self.failed = None;
                Ok(())
            }
            _ => Err(DeclareError {
                alloc_bytes: core::mem::size_of::<CapSlot>(),
            }),
        }
    }

    /// Preserves a tracked right still in the fast slot.
    ///
    /// Does nothing if no right is tracked or it is already preserved.
    ///
    /// # Errors
    ///
    /// Returns the kernel error if the right could not be moved. The right
    /// stays in the fast slot and the failure is kept for
    /// [`ReplyCapManager::take_failure`].
    pub fn protect<K: Kernel>(&mut self, kernel: &mut K) -> Result<(), KernelError> {
        let (Some(right), Some(storage)) = (self.right, self.storage) else {
            return Ok(());
        };
        match right.preserve(kernel, storage) {
            Ok(right) => {
                self.right = Some(right);
                Ok(())
            }
            Err(error) => {
                self.failed = Some(error);
                Err(error)
            }
        }
    }

    /// Returns and clears the error of a failed protection since the last
    /// declaration.
    pub fn take_failure(&mut self) -> Option<KernelError> {
        self.failed.take()
    }

    /// Replies through the tracked right and receives the next call.
    ///
    /// Without a declared right the reply goes through the fast slot.
    ///
    /// # Errors
    ///
    /// Returns the kernel error if the receive fails.
    pub fn reply<K: Kernel>(
        &mut self,
        kernel: &mut K,
        endpoint: CapSlot,
        info: MessageInfo,
    ) -> Result<ReplyOutcome, KernelError> {
        let right = self.right.take().unwrap_or(ReplyRight::FastSlot);
        let cnode = self.storage.map_or(CapSlot::NULL, |storage| storage.cnode);
        right.reply(kernel, endpoint, cnode, info)
    }

    /// Where the tracked right currently lives.
    #[must_use]
    pub const fn right(&self) -> Option<ReplyRight> {
        self.right
    }

    /// Stops tracking without replying.
    pub fn abandon(&mut self) {
        self.right = None;
        self.failed = None;
    }

    /// Returns true if a right is being tracked.
    #[must_use]
    pub const fn is_declared(&self) -> bool {
        self.right.is_some()
    }

    /// Returns true if the tracked right was moved into storage.
    #[must_use]
    pub const fn is_preserved(&self) -> bool {
        matches!(self.right, Some(ReplyRight::Preserved(_)))
    }
}
