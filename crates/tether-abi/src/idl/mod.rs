// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Build-time interface descriptions.
//!
//! An interface is an ordered, fixed table of methods. Each method has an
//! optional return type and an ordered parameter list. The descriptions are
//! produced when a component is built and never change afterwards, so every
//! type here is `const`-constructible and borrows only `'static` data:
//!
//! ```
//! use tether_abi::idl::{Direction, InterfaceType, Method, Parameter, TypeRef};
//!
//! static PARAMS: [Parameter; 2] = [
//!     Parameter::new("a", TypeRef::Primitive("int32_t"), Direction::In),
//!     Parameter::new("b", TypeRef::Primitive("int32_t"), Direction::In),
//! ];
//! static METHODS: [Method; 1] =
//!     [Method::new("add", &PARAMS).returning(TypeRef::Primitive("int32_t"))];
//! static ADDER: InterfaceType = InterfaceType::new("adder", &METHODS);
//!
//! assert_eq!(ADDER.method_count(), 1);
//! ```


use crate::ipc::{MethodIndex, SelectorWidth};

// =============================================================================
// Types
// =============================================================================

/// Reference to a parameter or return type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeRef {
    /// A built-in scalar type such as `int32_t` or `bool`.
    Primitive(&'static str),
    /// A NUL-free character string, heap-owned once decoded.
    String,
    /// A named struct.
    Struct(&'static str),
    /// A named typedef, resolved through [`InterfaceType::typedefs`].
    Typedef(&'static str),
}

impl TypeRef {
    /// Returns true if decoded values of this type own heap memory.
    #[must_use]
    pub const fn is_string(self) -> bool {
        matches!(self, Self::String)
    }
}

/// A typedef visible to an interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Typedef {
    /// Name the interface refers to.
    pub name: &'static str,
    /// The aliased type.
    pub target: TypeRef,
    /// Element count if the typedef names a fixed-size array type.
    pub array_len: Option<usize>,
}

impl Typedef {
    /// Creates a plain alias.
    #[must_use]
    pub const fn alias(name: &'static str, target: TypeRef) -> Self {
        Self {
            name,
            target,
            array_len: None,
        }
    }

    /// Creates an alias for a fixed-size array type.
    #[must_use]
    pub const fn array(name: &'static str, target: TypeRef, len: usize) -> Self {
        Self {
            name,
            target,
            array_len: Some(len),
        }
    }
}

// =============================================================================
// Parameters
// =============================================================================

/// Direction in which a parameter's value flows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Caller to callee, by value.
    In,
    /// Callee to caller.
    Out,
    /// Caller to callee and back.
    InOut,
    /// Caller to callee, passed to the handler by reference.
    RefIn,
}

impl Direction {
    /// Returns true if the value is marshalled into the call message.
    #[must_use]
    pub const fn is_input(self) -> bool {
        matches!(self, Self::In | Self::InOut | Self::RefIn)
    }

    /// Returns true if the value is marshalled into the reply message.
    #[must_use]
    pub const fn is_output(self) -> bool {
        matches!(self, Self::Out | Self::InOut)
    }
}

/// One formal parameter of a method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Parameter {
    /// Parameter name.
    pub name: &'static str,
    /// Element type (the element type for arrays).
    pub ty: TypeRef,
    /// Flow direction.
    pub direction: Direction,
    /// True for variable-length arrays, passed as a pointer/size pair.
    pub array: bool,
}

impl Parameter {
    /// Creates a scalar parameter.
    #[must_use]
    pub const fn new(name: &'static str, ty: TypeRef, direction: Direction) -> Self {
        Self {
            name,
            ty,
            direction,
            array: false,
        }
    }

    /// Creates a variable-length array parameter.
    #[must_use]
    pub const fn array(name: &'static str, ty: TypeRef, direction: Direction) -> Self {
        Self {
            name,
            ty,
            direction,
            array: true,
        }
    }

    /// Returns true if decoding this parameter allocates.
    #[must_use]
    pub const fn owns_heap(&self) -> bool {
        self.array || self.ty.is_string()
    }
}

// =============================================================================
// Methods
// =============================================================================

/// One method of an interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Method {
    /// Method name.
    pub name: &'static str,
    /// Return type, `None` for `void`.
    pub return_type: Option<TypeRef>,
    /// Ordered formal parameters.
    pub parameters: &'static [Parameter],
    /// True if the handler may itself perform blocking calls before it
    /// returns, which can invalidate the kernel's transient reply right.
    pub might_block: bool,
}

impl Method {
    /// Creates a `void` method that never blocks downstream.
    #[must_use]
    pub const fn new(name: &'static str, parameters: &'static [Parameter]) -> Self {
        Self {
            name,
            return_type: None,
            parameters,
            might_block: false,
        }
    }

    /// Sets the return type.
    #[must_use]
    pub const fn returning(mut self, ty: TypeRef) -> Self {
        self.return_type = Some(ty);
        self
    }

    /// Marks the method as possibly blocking downstream.
    #[must_use]
    pub const fn blocking(mut self) -> Self {
        self.might_block = true;
        self
    }

    /// Iterates over parameters that travel in the call message.
    pub fn inputs(&self) -> impl Iterator<Item = &'static Parameter> + use<> {
        let parameters: &'static [Parameter] = self.parameters;
        parameters.iter().filter(|p| p.direction.is_input())
    }

    /// Iterates over parameters that travel in the reply message.
    pub fn outputs(&self) -> impl Iterator<Item = &'static Parameter> + use<> {
        let parameters: &'static [Parameter] = self.parameters;
        parameters.iter().filter(|p| p.direction.is_output())
    }

    /// Returns true for a method with no parameters and no return value.
    #[must_use]
    pub const fn is_nullary_void(&self) -> bool {
        self.parameters.is_empty() && self.return_type.is_none()
    }
}

// =============================================================================
// Interfaces
// =============================================================================

/// An interface type: an ordered method table plus the typedefs it uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterfaceType {
    /// Interface type name.
    pub name: &'static str,
    /// Ordered method table. A call's selector indexes into it.
    pub methods: &'static [Method],
    /// Typedefs referenced by parameter or return types.
    pub typedefs: &'static [Typedef],
}

impl InterfaceType {
    /// Creates an interface type without typedefs.
    #[must_use]
    pub const fn new(name: &'static str, methods: &'static [Method]) -> Self {
        Self {
            name,
            methods,
            typedefs: &[],
        }
    }

    /// Attaches the typedef table.
    #[must_use]
    pub const fn with_typedefs(mut self, typedefs: &'static [Typedef]) -> Self {
        self.typedefs = typedefs;
        self
    }

    /// Number of methods.
    #[must_use]
    pub const fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Width of the selector in call messages.
    #[must_use]
    pub const fn selector_width(&self) -> SelectorWidth {
        SelectorWidth::for_method_count(self.methods.len())
    }

    /// Looks up a method by index.
    #[must_use]
    pub fn method(&self, index: MethodIndex) -> Option<&'static Method> {
        self.methods.get(index.as_usize())
    }

    /// Looks up a typedef by name.
    #[must_use]
    pub fn typedef(&self, name: &str) -> Option<&'static Typedef> {
        self.typedefs.iter().find(|t| t.name == name)
    }

    /// Returns true if any method may block downstream.
    #[must_use]
    pub fn any_might_block(&self) -> bool {
        self.methods.iter().any(|m| m.might_block)
    }
}
