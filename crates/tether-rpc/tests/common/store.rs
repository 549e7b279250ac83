// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Sample interfaces used across the integration tests.
//!
//! `store` is a four-method key/value service. `expand` takes a heap-owned
//! string, so it exercises release; `forward` may block, so it exercises
//! reply preservation by calling the single-method `double` interface.

use std::collections::BTreeMap;
use std::vec::Vec;

use tether_abi::idl::{Direction, Parameter, TypeRef};
use tether_abi::{Badge, CapSlot, InterfaceType, Method, MethodIndex};
use tether_rpc::marshal::{Reader, Writer};
use tether_rpc::platform::MockKernel;
use tether_rpc::{
    ClientEnd, ClientMarshaller, DecodeError, EncodeError, Handler, InterfaceConfig, Invocation,
    ServerMarshaller,
};

const U32: TypeRef = TypeRef::Primitive("uint32_t");
const I32: TypeRef = TypeRef::Primitive("int32_t");

// =============================================================================
// Interface Descriptions
// =============================================================================

/// `void put(in uint32_t key, in int32_t value)`
pub const PUT: MethodIndex = MethodIndex::new(0);
/// `int32_t get(in uint32_t key)`
pub const GET: MethodIndex = MethodIndex::new(1);
/// `void expand(in string label, out string doubled)`
pub const EXPAND: MethodIndex = MethodIndex::new(2);
/// `int32_t forward(in int32_t n)`, may block
pub const FORWARD: MethodIndex = MethodIndex::new(3);

static PUT_PARAMS: [Parameter; 2] = [
    Parameter::new("key", U32, Direction::In),
    Parameter::new("value", I32, Direction::In),
];
static GET_PARAMS: [Parameter; 1] = [Parameter::new("key", U32, Direction::In)];
static EXPAND_PARAMS: [Parameter; 2] = [
    Parameter::new("label", TypeRef::String, Direction::In),
    Parameter::new("doubled", TypeRef::String, Direction::Out),
];
static N_PARAMS: [Parameter; 1] = [Parameter::new("n", I32, Direction::In)];

static STORE_METHODS: [Method; 4] = [
    Method::new("put", &PUT_PARAMS),
    Method::new("get", &GET_PARAMS).returning(I32),
    Method::new("expand", &EXPAND_PARAMS),
    Method::new("forward", &N_PARAMS).returning(I32).blocking(),
];

/// The key/value interface.
pub static STORE: InterfaceType = InterfaceType::new("store", &STORE_METHODS);

static DOUBLE_METHODS: [Method; 1] = [Method::new("double", &N_PARAMS).returning(I32)];

/// `int32_t double(in int32_t n)`: a single method, so no selector.
pub static DOUBLE: InterfaceType = InterfaceType::new("double", &DOUBLE_METHODS);

/// Caller end of `double` as seen from the store server.
pub static DOUBLE_END: ClientEnd = ClientEnd::new(
    InterfaceConfig::new("kv_server", "doubler", CapSlot::new(30)),
    &DOUBLE,
);

static POKE_METHODS: [Method; 1] = [Method::new("poke", &[])];

/// `void poke(void)`: eligible for the reduced-overhead path.
pub static POKE: InterfaceType = InterfaceType::new("poke", &POKE_METHODS);

// =============================================================================
// Store: Server Side
// =============================================================================

/// Per-worker argument storage of `store`.
#[derive(Debug, Default)]
pub struct StoreSlots {
    /// `key` of `put` and `get`.
    pub key: u32,
    /// `value` of `put`, `n` of `forward`.
    pub value: i32,
    /// `label` of `expand`; owned until released.
    pub label: Option<Vec<u8>>,
    /// `doubled` of `expand`.
    pub doubled: Vec<u8>,
    /// Return value of `get` and `forward`.
    pub ret: i32,
}

/// Server marshaller of `store`, counting heap buffers it hands out.
#[derive(Debug, Default)]
pub struct StoreMarshaller {
    /// Labels decoded and not yet released.
    pub live: usize,
    /// Labels released.
    pub released: usize,
}

impl ServerMarshaller for StoreMarshaller {
    type Slots = StoreSlots;

    fn decode_inputs(
        &mut self,
        method: MethodIndex,
        _desc: &Method,
        payload: &[u8],
        slots: &mut StoreSlots,
    ) -> Result<(), DecodeError> {
        let mut reader = Reader::new(payload);
        match method {
            PUT => {
                slots.key = reader.u32()?;
                slots.value = reader.i32()?;
            }
            GET => slots.key = reader.u32()?,
            EXPAND => {
                let len = reader.u32()?;
                let bytes = reader.bytes(usize::try_from(len).unwrap_or(usize::MAX))?;
                slots.label = Some(bytes.to_vec());
                self.live += 1;
            }
            _ => slots.value = reader.i32()?,
        }
        Ok(())
    }

    fn encode_outputs(
        &mut self,
        method: MethodIndex,
        _desc: &Method,
        slots: &StoreSlots,
        out: &mut [u8],
    ) -> Result<usize, EncodeError> {
        let mut writer = Writer::new(out);
        match method {
            PUT => {}
            EXPAND => {
                let len = u32::try_from(slots.doubled.len()).unwrap_or(u32::MAX);
                writer.u32(len)?;
                writer.bytes(&slots.doubled)?;
            }
            _ => writer.i32(slots.ret)?,
        }
        Ok(writer.position())
    }

    fn release(&mut self, _method: MethodIndex, slots: &mut StoreSlots) {
        if slots.label.take().is_some() {
            self.live -= 1;
            self.released += 1;
        }
    }
}

/// Implementation of `store`.
#[derive(Debug, Default)]
pub struct StoreHandler {
    /// Stored values.
    pub entries: BTreeMap<u32, i32>,
    /// `get_sender_id()` as observed by each invocation.
    pub senders: Vec<Badge>,
    /// Results of nested calls made by `forward`.
    pub nested: Vec<Result<i32, tether_rpc::CallError>>,
}

impl Handler<MockKernel, StoreSlots> for StoreHandler {
    fn handle(
        &mut self,
        method: MethodIndex,
        slots: &mut StoreSlots,
        call: &mut Invocation<'_, MockKernel>,
    ) {
        self.senders.push(call.sender_id());
        match method {
            PUT => {
                self.entries.insert(slots.key, slots.value);
            }
            GET => slots.ret = self.entries.get(&slots.key).copied().unwrap_or_default(),
            EXPAND => {
                let label = slots.label.as_deref().unwrap_or_default();
                slots.doubled.clear();
                slots.doubled.extend_from_slice(label);
                slots.doubled.extend_from_slice(label);
            }
            _ => {
                if slots.value == 0 {
                    slots.ret = 0;
                } else {
                    let result = call
                        .client(DOUBLE_END, DoubleClient)
                        .call(MethodIndex::FIRST, &slots.value);
                    slots.ret = result.unwrap_or(i32::MIN);
                    self.nested.push(result);
                }
            }
        }
    }
}

// =============================================================================
// Store: Caller Side
// =============================================================================

/// Inputs of a `store` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreRequest {
    /// `put(key, value)`
    Put {
        /// Key.
        key: u32,
        /// Value.
        value: i32,
    },
    /// `get(key)`
    Get {
        /// Key.
        key: u32,
    },
    /// `expand(label)`
    Expand(Vec<u8>),
    /// `forward(n)`
    Forward(i32),
}

impl StoreRequest {
    /// Method this request calls.
    #[must_use]
    pub const fn method(&self) -> MethodIndex {
        match self {
            Self::Put { .. } => PUT,
            Self::Get { .. } => GET,
            Self::Expand(_) => EXPAND,
            Self::Forward(_) => FORWARD,
        }
    }
}

/// Outputs of a `store` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreResponse {
    /// Nothing returned.
    Unit,
    /// A returned integer.
    Value(i32),
    /// A returned string.
    Bytes(Vec<u8>),
}

/// Caller marshaller of `store`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StoreClient;

impl ClientMarshaller for StoreClient {
    type Request = StoreRequest;
    type Response = StoreResponse;

    fn encode_inputs(
        &mut self,
        _method: MethodIndex,
        _desc: &Method,
        request: &StoreRequest,
        out: &mut [u8],
    ) -> Result<usize, EncodeError> {
        let mut writer = Writer::new(out);
        match request {
            StoreRequest::Put { key, value } => {
                writer.u32(*key)?;
                writer.i32(*value)?;
            }
            StoreRequest::Get { key } => writer.u32(*key)?,
            StoreRequest::Expand(label) => {
                writer.u32(u32::try_from(label.len()).unwrap_or(u32::MAX))?;
                writer.bytes(label)?;
            }
            StoreRequest::Forward(n) => writer.i32(*n)?,
        }
        Ok(writer.position())
    }

    fn decode_outputs(
        &mut self,
        method: MethodIndex,
        _desc: &Method,
        payload: &[u8],
    ) -> Result<StoreResponse, DecodeError> {
        let mut reader = Reader::new(payload);
        match method {
            PUT => Ok(StoreResponse::Unit),
            EXPAND => {
                let len = reader.u32()?;
                let bytes = reader.bytes(usize::try_from(len).unwrap_or(usize::MAX))?;
                Ok(StoreResponse::Bytes(bytes.to_vec()))
            }
            _ => reader.i32().map(StoreResponse::Value),
        }
    }
}

// =============================================================================
// Double
// =============================================================================

/// Per-worker argument storage of `double`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DoubleSlots {
    /// Input.
    pub n: i32,
    /// Return value.
    pub ret: i32,
}

/// Server marshaller of `double`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DoubleMarshaller;

impl ServerMarshaller for DoubleMarshaller {
    type Slots = DoubleSlots;

    fn decode_inputs(
        &mut self,
        _method: MethodIndex,
        _desc: &Method,
        payload: &[u8],
        slots: &mut DoubleSlots,
    ) -> Result<(), DecodeError> {
        slots.n = Reader::new(payload).i32()?;
        Ok(())
    }

    fn encode_outputs(
        &mut self,
        _method: MethodIndex,
        _desc: &Method,
        slots: &DoubleSlots,
        out: &mut [u8],
    ) -> Result<usize, EncodeError> {
        let mut writer = Writer::new(out);
        writer.i32(slots.ret)?;
        Ok(writer.position())
    }

    fn release(&mut self, _method: MethodIndex, _slots: &mut DoubleSlots) {}
}

/// Caller marshaller of `double`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DoubleClient;

impl ClientMarshaller for DoubleClient {
    type Request = i32;
    type Response = i32;

    fn encode_inputs(
        &mut self,
        _method: MethodIndex,
        _desc: &Method,
        request: &i32,
        out: &mut [u8],
    ) -> Result<usize, EncodeError> {
        let mut writer = Writer::new(out);
        writer.i32(*request)?;
        Ok(writer.position())
    }

    fn decode_outputs(
        &mut self,
        _method: MethodIndex,
        _desc: &Method,
        payload: &[u8],
    ) -> Result<i32, DecodeError> {
        Reader::new(payload).i32()
    }
}

// =============================================================================
// Poke
// =============================================================================

/// Marshaller of an interface without parameters or return values.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnitMarshaller;

impl ServerMarshaller for UnitMarshaller {
    type Slots = ();

    fn decode_inputs(
        &mut self,
        _method: MethodIndex,
        _desc: &Method,
        _payload: &[u8],
        (): &mut (),
    ) -> Result<(), DecodeError> {
        Ok(())
    }

    fn encode_outputs(
        &mut self,
        _method: MethodIndex,
        _desc: &Method,
        (): &(),
        _out: &mut [u8],
    ) -> Result<usize, EncodeError> {
        Ok(0)
    }

    fn release(&mut self, _method: MethodIndex, (): &mut ()) {}
}
