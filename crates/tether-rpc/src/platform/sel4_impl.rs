// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! seL4 implementation of the kernel seam.
//!
//! Both kernel configurations are supported. On realtime (MCS) kernels
//! every receive names a reply object and the reply-preservation primitives
//! report [`KernelError::Unsupported`]. On non-realtime kernels receives
//! take no reply object, the pending reply right is saved with
//! `CNode_SaveCaller`, and a saved right is invoked directly from its slot.
//!
//! Message bytes are staged in a per-worker array and copied to and from
//! the thread's IPC buffer around each system call. A worker configured
//! with a userspace dataport uses that region directly and transfers no
//! message registers.

use crate::kernel::{Kernel, KernelError, Received};
use sel4::Cap;
use sel4::cap_type::{Endpoint, Unspecified};
use tether_abi::ipc::MSG_MAX_BYTES;
use tether_abi::{Badge, CapSlot, MessageInfo};

/// Depth used to address reply storage slots.
#[sel4::sel4_cfg(not(KERNEL_MCS))]
const CNODE_DEPTH: usize = 64;

/// Kernel seam for one worker thread on seL4.
pub struct Sel4Kernel {
    staging: [u8; MSG_MAX_BYTES],
    dataport: Option<&'static mut [u8]>,
}

impl Sel4Kernel {
    /// Creates a worker kernel exchanging messages through the IPC buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            staging: [0; MSG_MAX_BYTES],
            dataport: None,
        }
    }

    /// Creates a worker kernel exchanging messages through `dataport`.
    #[must_use]
    pub const fn with_dataport(dataport: &'static mut [u8]) -> Self {
        Self {
            staging: [0; MSG_MAX_BYTES],
            dataport: Some(dataport),
        }
    }

    /// Copies the first `length` message bytes into the IPC buffer.
    fn load(&self, info: MessageInfo) -> sel4::MessageInfo {
        if self.dataport.is_none() {
            let len = info.length_bytes().min(MSG_MAX_BYTES);
            sel4::with_ipc_buffer_mut(|buf| {
                buf.msg_bytes_mut()[..len].copy_from_slice(&self.staging[..len]);
            });
        }
        to_sel4(info)
    }

    /// Copies a received message out of the IPC buffer.
    fn store(&mut self, info: sel4::MessageInfo, badge: sel4::Badge) -> Received {
        let info = from_sel4(&info);
        if self.dataport.is_none() {
            let len = info.length_bytes().min(MSG_MAX_BYTES);
            sel4::with_ipc_buffer(|buf| {
                self.staging[..len].copy_from_slice(&buf.msg_bytes()[..len]);
            });
        }
        Received {
            info,
            badge: Badge::new(badge),
        }
    }
}

impl Default for Sel4Kernel {
    fn default() -> Self {
        Self::new()
    }
}

fn to_sel4(info: MessageInfo) -> sel4::MessageInfo {
    sel4::MessageInfoBuilder::default()
        .label(info.label())
        .caps_unwrapped(info.caps_unwrapped().into())
        .extra_caps(info.extra_caps().into())
        .length(info.length())
        .build()
}

#[allow(clippy::cast_possible_truncation)]
fn from_sel4(info: &sel4::MessageInfo) -> MessageInfo {
    // Capability counts are at most a handful of bits wide.
    MessageInfo::new(
        info.label(),
        info.caps_unwrapped() as u8,
        info.extra_caps() as u8,
        info.length(),
    )
}

/// Maps a rejected invocation to its seL4 error code.
#[sel4::sel4_cfg(not(KERNEL_MCS))]
const fn syscall_error(error: sel4::Error) -> KernelError {
    let code = match error {
        sel4::Error::InvalidArgument => 1,
        sel4::Error::InvalidCapability => 2,
        sel4::Error::IllegalOperation => 3,
        sel4::Error::RangeError => 4,
        sel4::Error::AlignmentError => 5,
        sel4::Error::FailedLookup => 6,
        sel4::Error::TruncatedMessage => 7,
        sel4::Error::DeleteFirst => 8,
        sel4::Error::RevokeFirst => 9,
        sel4::Error::NotEnoughMemory => 10,
    };
    KernelError::Syscall(code)
}

/// Resolves the reply object every MCS receive must name.
#[sel4::sel4_cfg(KERNEL_MCS)]
fn reply_authority(reply: Option<CapSlot>) -> Result<sel4::ReplyAuthority, KernelError> {
    let slot = reply.ok_or(KernelError::Unsupported)?;
    if slot.is_null() {
        return Err(KernelError::EmptySlot(slot));
    }
    Ok(Cap::from_bits(slot.as_u64()))
}

/// Non-realtime receives leave the reply right in the thread context.
#[sel4::sel4_cfg(not(KERNEL_MCS))]
const fn reply_authority(reply: Option<CapSlot>) -> Result<sel4::ReplyAuthority, KernelError> {
    match reply {
        None => Ok(()),
        Some(_) => Err(KernelError::Unsupported),
    }
}

#[sel4::sel4_cfg(KERNEL_MCS)]
const fn save_caller(_cnode: CapSlot, _slot: CapSlot) -> Result<(), KernelError> {
    Err(KernelError::Unsupported)
}

#[sel4::sel4_cfg(not(KERNEL_MCS))]
fn save_caller(cnode: CapSlot, slot: CapSlot) -> Result<(), KernelError> {
    if cnode.is_null() {
        return Err(KernelError::EmptySlot(cnode));
    }
    let cnode: Cap<sel4::cap_type::CNode> = Cap::from_bits(cnode.as_u64());
    cnode
        .absolute_cptr_from_bits_with_depth(slot.as_u64(), CNODE_DEPTH)
        .save_caller()
        .map_err(syscall_error)
}

#[sel4::sel4_cfg(KERNEL_MCS)]
const fn rederive_reply(_slot: CapSlot) -> Result<CapSlot, KernelError> {
    Err(KernelError::Unsupported)
}

/// A saved reply capability is sent on straight from its slot.
#[sel4::sel4_cfg(not(KERNEL_MCS))]
const fn rederive_reply(slot: CapSlot) -> Result<CapSlot, KernelError> {
    if slot.is_null() {
        return Err(KernelError::EmptySlot(slot));
    }
    Ok(slot)
}

fn endpoint(slot: CapSlot) -> Result<Cap<Endpoint>, KernelError> {
    if slot.is_null() {
        return Err(KernelError::EmptySlot(slot));
    }
    Ok(Cap::from_bits(slot.as_u64()))
}

impl Kernel for Sel4Kernel {
    fn recv(
        &mut self,
        endpoint_slot: CapSlot,
        reply: Option<CapSlot>,
    ) -> Result<Received, KernelError> {
        let ep = endpoint(endpoint_slot)?;
        let reply = reply_authority(reply)?;
        let (info, badge) = ep.recv(reply);
        Ok(self.store(info, badge))
    }

    fn reply_recv(
        &mut self,
        endpoint_slot: CapSlot,
        info: MessageInfo,
        reply: Option<CapSlot>,
    ) -> Result<Received, KernelError> {
        let ep = endpoint(endpoint_slot)?;
        let reply = reply_authority(reply)?;
        let info = self.load(info);
        let (info, badge) = ep.reply_recv(info, reply);
        Ok(self.store(info, badge))
    }

    fn signal_recv(
        &mut self,
        notification: CapSlot,
        endpoint_slot: CapSlot,
        reply: Option<CapSlot>,
    ) -> Result<Received, KernelError> {
        if notification.is_null() {
            return Err(KernelError::EmptySlot(notification));
        }
        let ep = endpoint(endpoint_slot)?;
        let reply = reply_authority(reply)?;
        sel4::debug_println!("tether: signalling {} before first receive", notification);
        let dest: Cap<Unspecified> = Cap::from_bits(notification.as_u64());
        let (info, badge) = dest.nb_send_recv(to_sel4(MessageInfo::EMPTY), ep, reply);
        Ok(self.store(info, badge))
    }

    fn send(&mut self, cap: CapSlot, info: MessageInfo) -> Result<(), KernelError> {
        // Also used for saved reply capabilities; the kernel dispatches on
        // the capability type.
        let ep = endpoint(cap)?;
        let info = self.load(info);
        ep.send(info);
        Ok(())
    }

    fn call(
        &mut self,
        endpoint_slot: CapSlot,
        info: MessageInfo,
    ) -> Result<MessageInfo, KernelError> {
        let ep = endpoint(endpoint_slot)?;
        let info = self.load(info);
        let reply = ep.call(info);
        Ok(self.store(reply, 0).info)
    }

    fn save_caller(&mut self, cnode: CapSlot, slot: CapSlot) -> Result<(), KernelError> {
        save_caller(cnode, slot)
    }

    fn rederive_reply(&mut self, _cnode: CapSlot, slot: CapSlot) -> Result<CapSlot, KernelError> {
        rederive_reply(slot)
    }

    fn buffer(&self) -> &[u8] {
        match &self.dataport {
            Some(region) => region,
            None => &self.staging,
        }
    }

    fn buffer_mut(&mut self) -> &mut [u8] {
        match &mut self.dataport {
            Some(region) => region,
            None => &mut self.staging,
        }
    }
}
