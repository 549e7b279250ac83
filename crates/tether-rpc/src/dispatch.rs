// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Server dispatch loop.
//!
//! One [`Server`] services one interface on one worker thread:
//!
//! ```text
//! RECEIVE -> VALIDATE_SELECTOR -> DECODE -> INVOKE -> ENCODE -> REPLY_AND_RECEIVE
//!               ^                                                     |
//!               +-----------------------------------------------------+
//! ```
//!
//! Every failed validation, decode, reply-right save, encode or reply drops
//! the call without replying, reports it to the error sink, and falls back
//! to a bare receive. The loop never finishes on its own: `run` only
//! returns when the sink aborts, startup validation fails, or the kernel
//! stops delivering calls.

use crate::check::{ArrayTypedefCheck, TypedefCheck, TypedefError};
use crate::client::{Client, ClientEnd};
use crate::config::InterfaceConfig;
use crate::context::{ClaimError, WorkerContext};
use crate::error::{ErrorAction, ErrorDetail, ErrorKind, ErrorSink, RpcError};
use crate::fastpath::{FastReplyTransport, GenericTransport};
use crate::handshake;
use crate::kernel::{Kernel, KernelError, Received, Syscall};
use crate::marshal::{ClientMarshaller, ServerMarshaller};
use crate::reply::{ReplyCapManager, ReplyOutcome};
use core::convert::Infallible;
use core::fmt;
use tether_abi::{Badge, CapSlot, InterfaceType, MessageInfo, MethodIndex, WorkerId};


// =============================================================================
// Exit Reasons
// =============================================================================

/// Why a dispatch loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerExit {
    /// The error sink asked to stop after this report.
    Aborted(RpcError),
    /// The interface uses an array typedef and cannot be serviced.
    ArrayTypedef(TypedefError),
    /// The entry point does not match the configured activation mode.
    EntryMismatch {
        /// Whether the interface is configured as passive.
        passive: bool,
    },
    /// The worker's call context could not be claimed.
    Claim(ClaimError),
    /// A receive failed.
    Kernel(KernelError),
}

impl fmt::Display for ServerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted(error) => write!(f, "aborted: {error}"),
            Self::ArrayTypedef(error) => write!(f, "invalid interface: {error}"),
            Self::EntryMismatch { passive: true } => {
                write!(f, "passive interface started without handshake")
            }
            Self::EntryMismatch { passive: false } => {
                write!(f, "active interface started with handshake")
            }
            Self::Claim(error) => write!(f, "cannot claim worker context: {error}"),
            Self::Kernel(error) => write!(f, "receive failed: {error}"),
        }
    }
}

impl From<ClaimError> for ServerExit {
    fn from(error: ClaimError) -> Self {
        Self::Claim(error)
    }
}

impl From<KernelError> for ServerExit {
    fn from(error: KernelError) -> Self {
        Self::Kernel(error)
    }
}

// =============================================================================
// Handler
// =============================================================================

/// The component's implementation of an interface.
pub trait Handler<K: Kernel, S> {
    /// Runs `method`.
    ///
    /// Inputs have been decoded into `slots`; outputs and the return value
    /// are written back to them. `call` describes the call being serviced.
    fn handle(&mut self, method: MethodIndex, slots: &mut S, call: &mut Invocation<'_, K>);
}

impl<K, S, F> Handler<K, S> for F
where
    K: Kernel,
    F: FnMut(MethodIndex, &mut S, &mut Invocation<'_, K>),
{
    fn handle(&mut self, method: MethodIndex, slots: &mut S, call: &mut Invocation<'_, K>) {
        self(method, slots, call);
    }
}

/// The call a handler is servicing.
pub struct Invocation<'c, K> {
    kernel: &'c mut K,
    reply: &'c mut ReplyCapManager,
    worker: WorkerId,
    badge: Badge,
    method: MethodIndex,
}

impl<K: Kernel> Invocation<'_, K> {
    /// Badge of the caller being serviced.
    #[must_use]
    pub const fn sender_id(&self) -> Badge {
        self.badge
    }

    /// Worker servicing the call.
    #[must_use]
    pub const fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Method being serviced.
    #[must_use]
    pub const fn method(&self) -> MethodIndex {
        self.method
    }

    /// Preserves the caller's reply right ahead of a blocking operation.
    ///
    /// Only needed around raw kernel calls; [`Invocation::client`] does this
    /// itself.
    ///
    /// # Errors
    ///
    /// Returns the kernel error if the right could not be moved.
    pub fn protect_reply(&mut self) -> Result<(), KernelError> {
        self.reply.protect(&mut *self.kernel)
    }

    /// Caller stub for a nested call to another interface.
    pub fn client<M: ClientMarshaller>(
        &mut self,
        end: ClientEnd,
        marshaller: M,
    ) -> Client<'_, K, M> {
        Client::nested(end, &mut *self.kernel, &mut *self.reply, marshaller)
    }

    /// The worker's kernel.
    pub fn kernel(&mut self) -> &mut K {
        &mut *self.kernel
    }
}

// =============================================================================
// Server
// =============================================================================

enum Step {
    /// A reply went out and the next call is in.
    Next(Received),
    /// The call was dropped; receive afresh.
    Drop,
}

/// Dispatch loop of one interface on one worker.
pub struct Server<'a, K, M, H, E, F = GenericTransport>
where
    M: ServerMarshaller,
{
    config: InterfaceConfig,
    iface: &'static InterfaceType,
    kernel: K,
    marshaller: M,
    handler: H,
    sink: E,
    transport: F,
    context: WorkerContext<'a, M::Slots>,
    typedef_check: &'a dyn TypedefCheck,
    fast_path: bool,
}

impl<'a, K, M, H, E> Server<'a, K, M, H, E>
where
    K: Kernel,
    M: ServerMarshaller,
    H: Handler<K, M::Slots>,
    E: ErrorSink,
{
    /// Creates a server using the generic reply path.
    #[must_use]
    pub fn new(
        config: InterfaceConfig,
        iface: &'static InterfaceType,
        kernel: K,
        marshaller: M,
        handler: H,
        sink: E,
        context: WorkerContext<'a, M::Slots>,
    ) -> Self {
        Self {
            fast_path: config.fast_path_eligible(iface),
            config,
            iface,
            kernel,
            marshaller,
            handler,
            sink,
            transport: GenericTransport,
            context,
            typedef_check: &ArrayTypedefCheck,
        }
    }
}

impl<'a, K, M, H, E, F> Server<'a, K, M, H, E, F>
where
    K: Kernel,
    M: ServerMarshaller,
    H: Handler<K, M::Slots>,
    E: ErrorSink,
    F: FastReplyTransport<K>,
{
    /// Replaces the reduced-overhead transport.
    ///
    /// It is only used if the interface is eligible for the fast path.
    #[must_use]
    pub fn with_transport<G: FastReplyTransport<K>>(
        self,
        transport: G,
    ) -> Server<'a, K, M, H, E, G> {
        Server {
            config: self.config,
            iface: self.iface,
            kernel: self.kernel,
            marshaller: self.marshaller,
            handler: self.handler,
            sink: self.sink,
            transport,
            context: self.context,
            typedef_check: self.typedef_check,
            fast_path: self.fast_path,
        }
    }

    /// Replaces the startup typedef check.
    #[must_use]
    pub fn with_typedef_check(mut self, check: &'a dyn TypedefCheck) -> Self {
        self.typedef_check = check;
        self
    }

    /// The worker's kernel.
    pub const fn kernel(&self) -> &K {
        &self.kernel
    }

    /// The worker's kernel, mutably.
    pub fn kernel_mut(&mut self) -> &mut K {
        &mut self.kernel
    }

    /// The error sink.
    pub const fn sink(&self) -> &E {
        &self.sink
    }

    /// The handler.
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    /// The marshaller.
    pub const fn marshaller(&self) -> &M {
        &self.marshaller
    }

    /// The worker's call context.
    pub const fn context(&self) -> &WorkerContext<'a, M::Slots> {
        &self.context
    }

    /// Badge of the call most recently received.
    #[must_use]
    pub fn sender_id(&self) -> Badge {
        self.context.sender_id()
    }

    /// Whether replies use the reduced-overhead transport.
    #[must_use]
    pub const fn uses_fast_path(&self) -> bool {
        self.fast_path
    }

    /// Services an active interface.
    ///
    /// # Errors
    ///
    /// Returns why the loop stopped. It never stops otherwise.
    pub fn run(&mut self) -> Result<Infallible, ServerExit> {
        if self.config.passive {
            return Err(ServerExit::EntryMismatch { passive: true });
        }
        self.start()?;
        let received = self.receive()?;
        self.serve(received)
    }

    /// Services a passive interface, signalling `notification` once ready.
    ///
    /// # Errors
    ///
    /// Returns why the loop stopped. It never stops otherwise.
    pub fn run_passive(&mut self, notification: CapSlot) -> Result<Infallible, ServerExit> {
        if !self.config.passive {
            return Err(ServerExit::EntryMismatch { passive: false });
        }
        self.start()?;
        let received = handshake::signal_and_receive(
            &mut self.kernel,
            notification,
            self.config.endpoint,
            self.config.reply_object,
        )?;
        self.serve(received)
    }

    fn start(&mut self) -> Result<(), ServerExit> {
        self.typedef_check
            .validate(self.iface)
            .map_err(ServerExit::ArrayTypedef)?;
        tracing::debug!(
            instance = self.config.instance,
            interface = self.config.interface,
            worker = %self.context.worker(),
            methods = self.iface.method_count(),
            fast_path = self.fast_path,
            "servicing interface"
        );
        Ok(())
    }

    fn receive(&mut self) -> Result<Received, ServerExit> {
        Ok(self
            .kernel
            .recv(self.config.endpoint, self.config.reply_object)?)
    }

    fn serve(&mut self, first: Received) -> Result<Infallible, ServerExit> {
        let mut received = first;
        loop {
            received = match self.cycle(received)? {
                Step::Next(next) => next,
                Step::Drop => self.receive()?,
            };
        }
    }

    /// Services one received call up to and including the reply.
    fn cycle(&mut self, received: Received) -> Result<Step, ServerExit> {
        self.context.begin_call(received.badge);
        let width = self.iface.selector_width();
        let size = self
            .config
            .message_size(received.info.length_bytes())
            .min(self.kernel.buffer().len());

        let Some(method) = width.read(&self.kernel.buffer()[..size]) else {
            return self.drop_call(
                ErrorKind::MalformedRpcPayload,
                None,
                "truncated message encountered while reading method index",
                ErrorDetail::Truncated {
                    length: size,
                    current_index: width.bytes(),
                },
            );
        };
        let Some(desc) = self.iface.method(method) else {
            return self.drop_call(
                ErrorKind::InvalidMethodIndex,
                None,
                "invalid method index received",
                ErrorDetail::InvalidIndex {
                    lower_bound: 0,
                    upper_bound: i64::try_from(self.iface.method_count())
                        .unwrap_or(i64::MAX)
                        - 1,
                    invalid_index: method.as_u64(),
                },
            );
        };
        self.context.set_selector(method);
        tracing::debug!(
            worker = %self.context.worker(),
            badge = %received.badge,
            method = desc.name,
            "call received"
        );

        let decoded = {
            let (_, slots) = self.context.parts();
            let payload = &self.kernel.buffer()[width.bytes()..size];
            self.marshaller.decode_inputs(method, desc, payload, slots)
        };
        if let Err(error) = decoded {
            return self.drop_call(
                ErrorKind::MalformedRpcPayload,
                Some(method),
                "truncated message encountered while unmarshalling arguments",
                ErrorDetail::Truncated {
                    length: size,
                    current_index: width.bytes().saturating_add(error.offset),
                },
            );
        }

        let blocking = !self.config.realtime && desc.might_block;
        if blocking {
            if let Err(error) = self.context.reply_mut().declare() {
                self.marshaller.release(method, self.context.slots_mut());
                return self.drop_call(
                    ErrorKind::AllocationFailure,
                    Some(method),
                    "failed to declare reply cap",
                    ErrorDetail::Allocation {
                        alloc_bytes: error.alloc_bytes,
                    },
                );
            }
        }

        let worker = self.context.worker();
        {
            let (reply, slots) = self.context.parts();
            let mut invocation = Invocation {
                kernel: &mut self.kernel,
                reply,
                worker,
                badge: received.badge,
                method,
            };
            self.handler.handle(method, slots, &mut invocation);
        }

        if let Some(error) = self.context.reply_mut().take_failure() {
            self.marshaller.release(method, self.context.slots_mut());
            self.context.reply_mut().abandon();
            return self.drop_call(
                ErrorKind::SyscallFailed,
                Some(method),
                "failed to save reply cap",
                ErrorDetail::Syscall {
                    syscall: Syscall::SaveCaller,
                    error,
                },
            );
        }

        let encoded = {
            let out = self.kernel.buffer_mut();
            let capacity = self.config.buffer_capacity().min(out.len());
            self.marshaller
                .encode_outputs(method, desc, self.context.slots(), &mut out[..capacity])
        };
        // Inputs are released whether or not the reply could be encoded.
        self.marshaller.release(method, self.context.slots_mut());
        let length = match encoded {
            Ok(length) => length,
            Err(error) => {
                self.context.reply_mut().abandon();
                return self.drop_call(
                    ErrorKind::BufferLengthExceeded,
                    Some(method),
                    "reply does not fit the message buffer",
                    ErrorDetail::BufferLength {
                        needed: error.needed,
                        capacity: error.capacity,
                    },
                );
            }
        };

        let info = if self.config.userspace_buffer.is_some() {
            MessageInfo::EMPTY
        } else {
            MessageInfo::for_bytes(length)
        };
        let endpoint = self.config.endpoint;

        if blocking {
            let preserved = self.context.reply().is_preserved();
            let outcome = self
                .context
                .reply_mut()
                .reply(&mut self.kernel, endpoint, info)?;
            return match outcome {
                ReplyOutcome::Received(next) => {
                    tracing::debug!(worker = %worker, preserved, "replied");
                    Ok(Step::Next(next))
                }
                ReplyOutcome::Failed(failure) => self.drop_call(
                    ErrorKind::SyscallFailed,
                    Some(method),
                    match failure.syscall {
                        Syscall::RederiveReply => "failed to re-derive reply cap",
                        _ => "failed to send reply",
                    },
                    ErrorDetail::Syscall {
                        syscall: failure.syscall,
                        error: failure.error,
                    },
                ),
            };
        }

        let next = if self.fast_path {
            self.transport
                .reply_recv_empty(&mut self.kernel, endpoint, self.config.trust)?
        } else {
            self.kernel
                .reply_recv(endpoint, info, self.config.reply_object)?
        };
        Ok(Step::Next(next))
    }

    /// Reports a dropped call and decides whether to keep going.
    fn drop_call(
        &mut self,
        kind: ErrorKind,
        method: Option<MethodIndex>,
        description: &'static str,
        detail: ErrorDetail,
    ) -> Result<Step, ServerExit> {
        let error = RpcError {
            kind,
            instance: self.config.instance,
            interface: self.config.interface,
            method,
            description,
            detail,
        };
        tracing::warn!(worker = %self.context.worker(), %error, "dropping call");
        match self.sink.report(&error) {
            ErrorAction::Continue => Ok(Step::Drop),
            ErrorAction::Abort => Err(ServerExit::Aborted(error)),
        }
    }
}

impl<K, M, H, E, F> fmt::Debug for Server<'_, K, M, H, E, F>
where
    M: ServerMarshaller,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("interface", &self.iface.name)
            .field("fast_path", &self.fast_path)
            .finish_non_exhaustive()
    }
}
