// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Error reports and the error sink.
//!
//! Every recoverable or fatal condition the stubs detect is described by an
//! [`RpcError`] and handed to the interface's [`ErrorSink`]. The sink owns the
//! policy: its [`ErrorAction`] decides whether the dispatch loop drops the
//! current call and keeps receiving, or stops.

use crate::kernel::{KernelError, Syscall};
use core::fmt;
use tether_abi::MethodIndex;


/// Category of a reported error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A call message was truncated or could not be decoded.
    MalformedRpcPayload,
    /// A call selected a method the interface does not have.
    InvalidMethodIndex,
    /// A reply could not be encoded within the message buffer.
    BufferLengthExceeded,
    /// Storage for preserving a reply right was unavailable.
    AllocationFailure,
    /// A system call failed.
    SyscallFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MalformedRpcPayload => "malformed RPC payload",
            Self::InvalidMethodIndex => "invalid method index",
            Self::BufferLengthExceeded => "buffer length exceeded",
            Self::AllocationFailure => "allocation failure",
            Self::SyscallFailed => "system call failed",
        };
        f.write_str(name)
    }
}

/// Numeric context attached to an error report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorDetail {
    /// The message ended before the decoder reached `current_index`.
    Truncated {
        /// Valid length of the message in bytes.
        length: usize,
        /// Byte index the decoder needed to read up to.
        current_index: usize,
    },
    /// A selector outside `[lower_bound, upper_bound]`.
    InvalidIndex {
        /// Lowest valid method index.
        lower_bound: i64,
        /// Highest valid method index (-1 for an interface with no methods).
        upper_bound: i64,
        /// The selector received.
        invalid_index: u64,
    },
    /// The encoded reply needs more room than the buffer has.
    BufferLength {
        /// Bytes the encoder needed.
        needed: usize,
        /// Bytes available.
        capacity: usize,
    },
    /// An allocation of `alloc_bytes` bytes failed.
    Allocation {
        /// Size of the failed allocation.
        alloc_bytes: usize,
    },
    /// A system call returned an error.
    Syscall {
        /// The failing system call.
        syscall: Syscall,
        /// The error it returned.
        error: KernelError,
    },
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated {
                length,
                current_index,
            } => write!(f, "needed {current_index} bytes of a {length} byte message"),
            Self::InvalidIndex {
                lower_bound,
                upper_bound,
                invalid_index,
            } => write!(
                f,
                "index {invalid_index} outside [{lower_bound}, {upper_bound}]"
            ),
            Self::BufferLength { needed, capacity } => {
                write!(f, "needed {needed} bytes, buffer holds {capacity}")
            }
            Self::Allocation { alloc_bytes } => write!(f, "failed to allocate {alloc_bytes} bytes"),
            Self::Syscall { syscall, error } => write!(f, "{syscall}: {error}"),
        }
    }
}

/// A fully described error, as handed to the sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RpcError {
    /// Error category.
    pub kind: ErrorKind,
    /// Component instance the error occurred in.
    pub instance: &'static str,
    /// Interface the error occurred on.
    pub interface: &'static str,
    /// Method being serviced, if one was selected.
    pub method: Option<MethodIndex>,
    /// Short human-readable description.
    pub description: &'static str,
    /// Numeric context.
    pub detail: ErrorDetail,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}: ", self.instance, self.interface, self.kind)?;
        if let Some(method) = self.method {
            write!(f, "method {method}: ")?;
        }
        write!(f, "{} ({})", self.description, self.detail)
    }
}

/// What the dispatch loop does after an error was reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ErrorAction {
    /// Drop the current call and keep receiving.
    #[default]
    Continue,
    /// Stop servicing the interface.
    Abort,
}

/// Receiver of error reports.
pub trait ErrorSink {
    /// Reports `error` and decides how the loop proceeds.
    fn report(&mut self, error: &RpcError) -> ErrorAction;
}

impl<F> ErrorSink for F
where
    F: FnMut(&RpcError) -> ErrorAction,
{
    fn report(&mut self, error: &RpcError) -> ErrorAction {
        self(error)
    }
}

/// Error sink that logs through `tracing`.
///
/// Every report is logged. Kinds listed in `abort_on` stop the loop; all
/// others drop the current call.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink {
    abort_on: &'static [ErrorKind],
}

impl TracingSink {
    /// Logs every report and never aborts.
    #[must_use]
    pub const fn continuing() -> Self {
        Self { abort_on: &[] }
    }

    /// Logs every report and aborts on the given kinds.
    #[must_use]
    pub const fn aborting_on(abort_on: &'static [ErrorKind]) -> Self {
        Self { abort_on }
    }

    /// Returns the action taken for `kind`.
    #[must_use]
    pub fn action_for(&self, kind: ErrorKind) -> ErrorAction {
        if self.abort_on.contains(&kind) {
            ErrorAction::Abort
        } else {
            ErrorAction::Continue
        }
    }
}

impl ErrorSink for TracingSink {
    fn report(&mut self, error: &RpcError) -> ErrorAction {
        let action = self.action_for(error.kind);
        tracing::error!(
            instance = error.instance,
            interface = error.interface,
            kind = ?error.kind,
            action = ?action,
            "{}",
            error
        );
        action
    }
}
