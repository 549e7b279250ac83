// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Reply rights of handlers that make nested calls.
//!
//! On a non-realtime kernel a nested call overwrites the reply right of the
//! call being serviced. `forward` may block, so its right is tracked and,
//! once the handler calls `double`, moved into the worker's storage slot.

// Test code unwraps freely
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, missing_docs)]

mod common;

use common::{
    FORWARD, GET, STORE, StoreHandler, StoreMarshaller, StoreSlots, init_tracing, store_config,
};
use std::vec::Vec;
use tether_abi::{Badge, CapSlot, MethodIndex, WorkerId};
use tether_rpc::error::ErrorDetail;
use tether_rpc::kernel::Syscall;
use tether_rpc::platform::{CallerId, MockEvent, MockKernel, RecordingSink, ReplyPath};
use tether_rpc::{
    CallContextArena, CallError, ErrorKind, KernelError, ReplyStorage, RpcError, Server,
};

const STORAGE: ReplyStorage = ReplyStorage::new(CapSlot::new(2), CapSlot::new(40));

struct Run {
    events: Vec<MockEvent>,
    errors: Vec<RpcError>,
    nested: Vec<Result<i32, CallError>>,
}

fn serve(kernel: MockKernel, storage: Option<ReplyStorage>) -> Run {
    init_tracing();
    let arena: CallContextArena<StoreSlots, 1> = CallContextArena::new();
    let mut context = arena.claim(WorkerId::CONTROL).unwrap();
    if let Some(storage) = storage {
        context.assign_reply_storage(storage);
    }
    let mut server = Server::new(
        store_config(),
        &STORE,
        kernel,
        StoreMarshaller::default(),
        StoreHandler::default(),
        RecordingSink::new(),
        context,
    );
    let Err(_) = server.run();
    Run {
        events: server.kernel().events().to_vec(),
        errors: server.sink().errors.clone(),
        nested: server.handler().nested.clone(),
    }
}

fn request(method: MethodIndex, arg: i32) -> Vec<u8> {
    let mut message = std::vec![u8::try_from(method.as_u64()).unwrap()];
    message.extend_from_slice(&arg.to_ne_bytes());
    message
}

fn words(value: i32) -> Vec<u8> {
    let mut payload = value.to_ne_bytes().to_vec();
    payload.resize(8, 0);
    payload
}

#[test]
fn nested_call_reply_goes_through_preserved_right() {
    let mut kernel = MockKernel::new();
    kernel.push_call(CallerId(1), Badge::new(6), &request(FORWARD, 21));
    kernel.push_nested_reply(&42i32.to_ne_bytes());
    let run = serve(kernel, Some(STORAGE));

    assert!(run.errors.is_empty());
    assert_eq!(run.nested, [Ok(42)]);
    assert_eq!(
        run.events,
        [
            MockEvent::Received {
                caller: CallerId(1),
                badge: Badge::new(6)
            },
            MockEvent::Saved { slot: STORAGE.slot },
            MockEvent::NestedCall {
                endpoint: CapSlot::new(30),
                payload: words(21)
            },
            MockEvent::Rederived { slot: STORAGE.slot },
            MockEvent::Replied {
                caller: CallerId(1),
                payload: words(42),
                path: ReplyPath::Preserved
            },
        ]
    );
}

#[test]
fn blocking_method_without_nested_call_replies_fast() {
    let mut kernel = MockKernel::new();
    kernel.push_call(CallerId(1), Badge::NONE, &request(FORWARD, 0));
    let run = serve(kernel, Some(STORAGE));

    assert!(run.nested.is_empty());
    assert!(matches!(
        run.events.as_slice(),
        [
            MockEvent::Received { .. },
            MockEvent::Replied {
                caller: CallerId(1),
                path: ReplyPath::Fast,
                ..
            }
        ]
    ));
}

#[test]
fn next_call_after_preserved_reply_is_fast_again() {
    let mut kernel = MockKernel::new();
    kernel.push_call(CallerId(1), Badge::NONE, &request(FORWARD, 1));
    kernel.push_nested_reply(&2i32.to_ne_bytes());
    kernel.push_call(CallerId(2), Badge::NONE, &request(GET, 0));
    let run = serve(kernel, Some(STORAGE));

    let paths: Vec<_> = run
        .events
        .iter()
        .filter_map(|event| match event {
            MockEvent::Replied { caller, path, .. } => Some((*caller, *path)),
            _ => None,
        })
        .collect();
    assert_eq!(
        paths,
        [
            (CallerId(1), ReplyPath::Preserved),
            (CallerId(2), ReplyPath::Fast)
        ]
    );
}

#[test]
fn missing_storage_drops_blocking_call() {
    let mut kernel = MockKernel::new();
    kernel.push_call(CallerId(1), Badge::NONE, &request(FORWARD, 3));
    kernel.push_call(CallerId(2), Badge::NONE, &request(GET, 0));
    let run = serve(kernel, None);

    assert!(run.nested.is_empty());
    assert_eq!(run.errors.len(), 1);
    assert_eq!(run.errors[0].kind, ErrorKind::AllocationFailure);
    assert_eq!(
        run.errors[0].detail,
        ErrorDetail::Allocation {
            alloc_bytes: core::mem::size_of::<CapSlot>()
        }
    );
    // Methods that never block do not need storage.
    assert!(run.events.iter().any(|event| matches!(
        event,
        MockEvent::Replied {
            caller: CallerId(2),
            ..
        }
    )));
}

#[test]
fn failed_save_drops_call_instead_of_replying() {
    let mut kernel = MockKernel::new();
    kernel.push_call(CallerId(1), Badge::NONE, &request(FORWARD, 5));
    kernel.push_call(CallerId(2), Badge::NONE, &request(GET, 0));
    kernel.fail_next_save_caller(KernelError::Syscall(9));
    let run = serve(kernel, Some(STORAGE));

    assert_eq!(
        run.nested,
        [Err(CallError::Protect(KernelError::Syscall(9)))]
    );
    assert_eq!(run.errors.len(), 1);
    assert_eq!(run.errors[0].kind, ErrorKind::SyscallFailed);
    assert_eq!(run.errors[0].method, Some(FORWARD));
    assert_eq!(
        run.errors[0].detail,
        ErrorDetail::Syscall {
            syscall: Syscall::SaveCaller,
            error: KernelError::Syscall(9)
        }
    );
    // The first caller stays blocked; the loop carries on with the next one.
    assert_eq!(
        run.events,
        [
            MockEvent::Received {
                caller: CallerId(1),
                badge: Badge::NONE
            },
            MockEvent::Received {
                caller: CallerId(2),
                badge: Badge::NONE
            },
            MockEvent::Replied {
                caller: CallerId(2),
                payload: words(0),
                path: ReplyPath::Fast
            },
        ]
    );
}
