// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Build-time configuration of an interface instance.
//!
//! Everything here is decided when the component system is assembled and
//! baked into the component as a `const`. Nothing is read at runtime.

use tether_abi::ipc::MSG_MAX_BYTES;
use tether_abi::{CapSlot, InterfaceType};


/// Default constants for interface configuration.
pub mod constants {
    use tether_abi::ipc::MSG_MAX_BYTES;

    /// Default message capacity when the thread's IPC buffer carries messages.
    pub const DEFAULT_BUFFER_CAPACITY: usize = MSG_MAX_BYTES;

    /// Default number of worker threads servicing one interface.
    pub const DEFAULT_WORKERS: usize = 1;
}

/// Whether the communicating partner is trusted not to corrupt registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PartnerTrust {
    /// The partner may leave arbitrary values in scratch registers.
    #[default]
    Untrusted,
    /// The partner is trusted; scratch registers need no reload.
    Trusted,
}

impl PartnerTrust {
    /// Returns true for a trusted partner.
    #[must_use]
    pub const fn is_trusted(self) -> bool {
        matches!(self, Self::Trusted)
    }
}

/// Configuration of one interface instance on the server side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterfaceConfig {
    /// Component instance name (for error reports).
    pub instance: &'static str,
    /// Interface name within the instance (for error reports).
    pub interface: &'static str,
    /// Endpoint the interface receives calls on.
    pub endpoint: CapSlot,
    /// Realtime (MCS) kernel: reply rights live in persistent reply objects.
    pub realtime: bool,
    /// The worker starts dormant and must signal readiness first.
    pub passive: bool,
    /// Trust placed in the communicating partner.
    pub trust: PartnerTrust,
    /// Allow specialised system call sequences where eligible.
    pub specialise_syscall_stubs: bool,
    /// The connection has exactly one caller end and one server end.
    pub single_connection: bool,
    /// Size of a userspace message region used instead of the IPC buffer.
    pub userspace_buffer: Option<usize>,
    /// Reply object for realtime kernels.
    pub reply_object: Option<CapSlot>,
}

impl InterfaceConfig {
    /// Creates a configuration for an active, non-realtime interface using
    /// the thread's IPC buffer.
    #[must_use]
    pub const fn new(instance: &'static str, interface: &'static str, endpoint: CapSlot) -> Self {
        Self {
            instance,
            interface,
            endpoint,
            realtime: false,
            passive: false,
            trust: PartnerTrust::Untrusted,
            specialise_syscall_stubs: false,
            single_connection: false,
            userspace_buffer: None,
            reply_object: None,
        }
    }

    /// Runs on a realtime kernel, receiving into `reply_object`.
    #[must_use]
    pub const fn realtime(mut self, reply_object: CapSlot) -> Self {
        self.realtime = true;
        self.reply_object = Some(reply_object);
        self
    }

    /// Marks the worker as passive.
    #[must_use]
    pub const fn passive(mut self) -> Self {
        self.passive = true;
        self
    }

    /// Sets partner trust.
    #[must_use]
    pub const fn with_trust(mut self, trust: PartnerTrust) -> Self {
        self.trust = trust;
        self
    }

    /// Enables specialised system call sequences.
    #[must_use]
    pub const fn specialised(mut self) -> Self {
        self.specialise_syscall_stubs = true;
        self
    }

    /// Declares the connection as one caller to one server.
    #[must_use]
    pub const fn single_connection(mut self) -> Self {
        self.single_connection = true;
        self
    }

    /// Carries messages in a userspace region of `size` bytes.
    #[must_use]
    pub const fn userspace_buffer(mut self, size: usize) -> Self {
        self.userspace_buffer = Some(size);
        self
    }

    /// Number of bytes replies may occupy.
    #[must_use]
    pub const fn buffer_capacity(&self) -> usize {
        match self.userspace_buffer {
            Some(size) => size,
            None => constants::DEFAULT_BUFFER_CAPACITY,
        }
    }

    /// Byte length of a received message given its word length.
    ///
    /// A userspace region has no per-message length; the whole region is
    /// handed to the decoder.
    #[must_use]
    pub const fn message_size(&self, length_bytes: usize) -> usize {
        match self.userspace_buffer {
            Some(size) => size,
            None => {
                if length_bytes > MSG_MAX_BYTES {
                    MSG_MAX_BYTES
                } else {
                    length_bytes
                }
            }
        }
    }

    /// Returns true if `iface` may use the reduced-overhead reply path.
    ///
    /// The path carries no payload in either direction, so it applies only
    /// to a sole method with no parameters and no return value that never
    /// needs its reply right preserved.
    #[must_use]
    pub fn fast_path_eligible(&self, iface: &InterfaceType) -> bool {
        let [method] = iface.methods else {
            return false;
        };
        !self.realtime
            && self.single_connection
            && self.specialise_syscall_stubs
            && method.is_nullary_void()
            && !method.might_block
    }
}
