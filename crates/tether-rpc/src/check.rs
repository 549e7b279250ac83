// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Startup validation of an interface's typedefs.
//!
//! Argument slots hold a value or a pointer/size pair. A typedef that names
//! a fixed-size array type fits neither, so an interface using one cannot be
//! serviced. The check runs once before the first receive.

use core::fmt;
use tether_abi::idl::{InterfaceType, TypeRef};


/// Why an interface failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypedefError {
    /// A parameter or return type resolves to an array typedef.
    ArrayTypedef {
        /// Method using the type.
        method: &'static str,
        /// Parameter using the type, `None` for the return type.
        parameter: Option<&'static str>,
        /// The array typedef reached.
        typedef: &'static str,
    },
    /// A typedef name is not declared by the interface.
    Unresolved {
        /// The missing name.
        typedef: &'static str,
    },
    /// Typedefs refer to each other in a cycle.
    Cycle {
        /// A typedef on the cycle.
        typedef: &'static str,
    },
}

impl fmt::Display for TypedefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArrayTypedef {
                method,
                parameter: Some(parameter),
                typedef,
            } => write!(
                f,
                "parameter {parameter} of {method} uses array typedef {typedef}"
            ),
            Self::ArrayTypedef {
                method,
                parameter: None,
                typedef,
            } => write!(f, "return type of {method} uses array typedef {typedef}"),
            Self::Unresolved { typedef } => write!(f, "undeclared typedef {typedef}"),
            Self::Cycle { typedef } => write!(f, "typedef {typedef} refers to itself"),
        }
    }
}

/// Validates an interface before it is serviced.
pub trait TypedefCheck {
    /// Checks `iface`.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    fn validate(&self, iface: &InterfaceType) -> Result<(), TypedefError>;
}

/// Rejects interfaces whose parameter or return types are array typedefs.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArrayTypedefCheck;

impl ArrayTypedefCheck {
    /// Follows `ty` through typedef chains.
    ///
    /// Returns the name of the first array typedef reached, if any.
    fn array_typedef(
        iface: &InterfaceType,
        ty: TypeRef,
    ) -> Result<Option<&'static str>, TypedefError> {
        let mut current = ty;
        // A chain longer than the table must revisit a typedef.
        for _ in 0..=iface.typedefs.len() {
            let TypeRef::Typedef(name) = current else {
                return Ok(None);
            };
            let typedef = iface
                .typedef(name)
                .ok_or(TypedefError::Unresolved { typedef: name })?;
            if typedef.array_len.is_some() {
                return Ok(Some(typedef.name));
            }
            current = typedef.target;
        }
        match current {
            TypeRef::Typedef(typedef) => Err(TypedefError::Cycle { typedef }),
            _ => Ok(None),
        }
    }
}

impl TypedefCheck for ArrayTypedefCheck {
    fn validate(&self, iface: &InterfaceType) -> Result<(), TypedefError> {
        for method in iface.methods {
            if let Some(ty) = method.return_type {
                if let Some(typedef) = Self::array_typedef(iface, ty)? {
                    return Err(TypedefError::ArrayTypedef {
                        method: method.name,
                        parameter: None,
                        typedef,
                    });
                }
            }
            for parameter in method.parameters {
                if let Some(typedef) = Self::array_typedef(iface, parameter.ty)? {
                    return Err(TypedefError::ArrayTypedef {
                        method: method.name,
                        parameter: Some(parameter.name),
                        typedef,
                    });
                }
            }
        }
        Ok(())
    }
}
