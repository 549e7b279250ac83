// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Caller-side kernel that services every call with a real `store` server.
//!
//! Each `call` hands the request bytes to a fresh [`MockKernel`] as a
//! scripted incoming call, runs a [`Server`] over it until the script is
//! exhausted, and copies whatever reply reached the caller back into the
//! caller's buffer. Handler and marshaller state carry over between calls.

use std::vec::Vec;

use tether_abi::ipc::MSG_MAX_BYTES;
use tether_abi::{Badge, CapSlot, MessageInfo, MethodIndex, WorkerId};
use tether_rpc::platform::{CallerId, MockKernel, RecordingSink, ReplyPath};
use tether_rpc::{
    CallContextArena, Handler, InterfaceConfig, Invocation, Kernel, KernelError, Received,
    RpcError, Server, ServerExit,
};

use super::store::{STORE, StoreHandler, StoreMarshaller, StoreSlots};

/// Kernel of a `store` caller whose calls land on a server in-process.
#[derive(Debug)]
pub struct Loopback {
    config: InterfaceConfig,
    badge: Badge,
    buffer: Vec<u8>,
    /// Server-side handler state.
    pub store: StoreHandler,
    /// Server-side marshaller state.
    pub marshaller: StoreMarshaller,
    /// Errors the server reported, across all calls.
    pub errors: Vec<RpcError>,
    /// Path of every reply delivered.
    pub paths: Vec<ReplyPath>,
    /// Why each server run ended.
    pub exits: Vec<ServerExit>,
}

impl Loopback {
    /// Creates a caller holding a capability badged `badge`.
    #[must_use]
    pub fn new(config: InterfaceConfig, badge: Badge) -> Self {
        Self {
            config,
            badge,
            buffer: std::vec![0; MSG_MAX_BYTES],
            store: StoreHandler::default(),
            marshaller: StoreMarshaller::default(),
            errors: Vec::new(),
            paths: Vec::new(),
            exits: Vec::new(),
        }
    }

    /// Presents subsequent calls under `badge`.
    pub fn set_badge(&mut self, badge: Badge) {
        self.badge = badge;
    }

    /// Runs one server cycle over `request`, returning the reply payload.
    fn serve(&mut self, request: &[u8]) -> Option<Vec<u8>> {
        let mut kernel = MockKernel::new();
        kernel.push_call(CallerId(1), self.badge, request);

        let arena: CallContextArena<StoreSlots, 1> = CallContextArena::new();
        let Ok(context) = arena.claim(WorkerId::CONTROL) else {
            return None;
        };
        let store = &mut self.store;
        let mut server = Server::new(
            self.config,
            &STORE,
            kernel,
            core::mem::take(&mut self.marshaller),
            |method: MethodIndex, slots: &mut StoreSlots, call: &mut Invocation<'_, MockKernel>| {
                store.handle(method, slots, call);
            },
            RecordingSink::new(),
            context,
        );
        let Err(exit) = server.run();

        self.exits.push(exit);
        self.errors.extend(server.sink().errors.iter().copied());
        let reply = server
            .kernel()
            .replies()
            .first()
            .map(|(_, payload, path)| (payload.to_vec(), *path));
        let marshaller = server.marshaller();
        self.marshaller = StoreMarshaller {
            live: marshaller.live,
            released: marshaller.released,
        };

        let (payload, path) = reply?;
        self.paths.push(path);
        Some(payload)
    }
}

impl Kernel for Loopback {
    fn recv(
        &mut self,
        _endpoint: CapSlot,
        _reply: Option<CapSlot>,
    ) -> Result<Received, KernelError> {
        Err(KernelError::Unsupported)
    }

    fn reply_recv(
        &mut self,
        _endpoint: CapSlot,
        _info: MessageInfo,
        _reply: Option<CapSlot>,
    ) -> Result<Received, KernelError> {
        Err(KernelError::Unsupported)
    }

    fn signal_recv(
        &mut self,
        _notification: CapSlot,
        _endpoint: CapSlot,
        _reply: Option<CapSlot>,
    ) -> Result<Received, KernelError> {
        Err(KernelError::Unsupported)
    }

    fn send(&mut self, _cap: CapSlot, _info: MessageInfo) -> Result<(), KernelError> {
        Err(KernelError::Unsupported)
    }

    fn call(&mut self, endpoint: CapSlot, info: MessageInfo) -> Result<MessageInfo, KernelError> {
        if endpoint != self.config.endpoint {
            return Err(KernelError::EmptySlot(endpoint));
        }
        let len = info.length_bytes().min(self.buffer.len());
        let request = self.buffer[..len].to_vec();
        // No reply means the caller would block forever.
        let reply = self.serve(&request).ok_or(KernelError::Disconnected)?;
        let len = reply.len().min(self.buffer.len());
        self.buffer[..len].copy_from_slice(&reply[..len]);
        Ok(MessageInfo::for_bytes(len))
    }

    fn save_caller(&mut self, _cnode: CapSlot, _slot: CapSlot) -> Result<(), KernelError> {
        Err(KernelError::Unsupported)
    }

    fn rederive_reply(&mut self, _cnode: CapSlot, _slot: CapSlot) -> Result<CapSlot, KernelError> {
        Err(KernelError::Unsupported)
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }
}
