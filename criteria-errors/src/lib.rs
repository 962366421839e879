//! Error handling, definitions, and utilities for the criteria query compiler.
//!
//! Every error raised while building or compiling a criteria query is a [`CriteriaError`].
//! User-facing errors (an invalid alias, an illegal navigation, a missing root) are raised at the
//! builder call or at `compile()`. [`CriteriaError::Internal`] signals a scoping bug inside the
//! compiler itself and should never be recovered from.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// General error type to be used across the criteria query compiler.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CriteriaError {
    /// The query is not in a state that can be compiled, eg because it has no root.
    #[error("Invalid query state: {0}")]
    InvalidState(String),

    /// An alias was rejected at the alias-setting call.
    #[error("Invalid alias '{alias}': {reason}")]
    InvalidAlias {
        /// The rejected alias.
        alias: String,
        /// Why the alias was rejected.
        reason: String,
    },

    /// No declared constructor of the result class accepts the selected argument types.
    #[error("No constructor of {class} accepts ({})", .arguments.join(", "))]
    UnconstructibleType {
        /// The result class that was to be constructed.
        class: String,
        /// The argument types that were tried, in selection order.
        arguments: Vec<String>,
    },

    /// A join, fetch, or navigation was attempted through an attribute that does not allow it.
    #[error("Cannot navigate through '{owner}.{attribute}': {reason}")]
    IllegalNavigation {
        /// The type declaring (or holding) the attribute.
        owner: String,
        /// The attribute name.
        attribute: String,
        /// Why the navigation is illegal.
        reason: String,
    },

    /// The attribute is not declared by the type or any of its supertypes.
    #[error("Type {owner} has no attribute named '{attribute}'")]
    UnknownAttribute {
        /// The type searched.
        owner: String,
        /// The attribute name.
        attribute: String,
    },

    /// A query root was requested for a type that is not a managed entity.
    #[error("{0} is not a managed entity type")]
    NotAnEntity(String),

    /// A builder method was called with arguments it cannot accept.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An internal invariant has been violated. This indicates a bug in the compiler.
    #[error("Internal invariant violated: {0}")]
    Internal(String),

    /// The operation is not supported by the compiler.
    #[error("Operation unsupported: {0}")]
    Unsupported(String),

    /// Failed to (de)serialize a metamodel or options document.
    #[error("Failed to (de)serialize: {0}")]
    Serialization(String),
}

impl CriteriaError {
    /// Returns `true` if the error is an [`Internal`](CriteriaError::Internal) error.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(..))
    }

    /// Returns `true` if the error is [`InvalidState`](CriteriaError::InvalidState).
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState(..))
    }

    /// Returns `true` if the error is [`InvalidAlias`](CriteriaError::InvalidAlias).
    pub fn is_invalid_alias(&self) -> bool {
        matches!(self, Self::InvalidAlias { .. })
    }

    /// Returns `true` if the error is
    /// [`UnconstructibleType`](CriteriaError::UnconstructibleType).
    pub fn is_unconstructible_type(&self) -> bool {
        matches!(self, Self::UnconstructibleType { .. })
    }

    /// Returns `true` if the error is
    /// [`IllegalNavigation`](CriteriaError::IllegalNavigation).
    pub fn is_illegal_navigation(&self) -> bool {
        matches!(self, Self::IllegalNavigation { .. })
    }

    /// Returns `true` if the error is [`Unsupported`](CriteriaError::Unsupported).
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(..))
    }

    /// Returns `true` if the error is [`InvalidArgument`](CriteriaError::InvalidArgument).
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(..))
    }

    pub fn is_unknown_attribute(&self) -> bool {
        matches!(self, Self::UnknownAttribute { .. })
    }
}

/// Standard issue [`Result`] alias.
pub type CriteriaResult<T> = Result<T, CriteriaError>;

/// Make a new [`CriteriaError::Internal`] with the provided string-able argument.
pub fn internal_err<T: Into<String>>(err: T) -> CriteriaError {
    CriteriaError::Internal(err.into())
}

/// Make a new [`CriteriaError::Unsupported`] with the provided string-able argument.
pub fn unsupported_err<T: Into<String>>(err: T) -> CriteriaError {
    CriteriaError::Unsupported(err.into())
}

/// Make a new [`CriteriaError::InvalidState`] with the provided string-able argument.
pub fn invalid_state_err<T: Into<String>>(err: T) -> CriteriaError {
    CriteriaError::InvalidState(err.into())
}

/// Make a new [`CriteriaError::InvalidArgument`] with the provided string-able argument.
pub fn invalid_argument_err<T: Into<String>>(err: T) -> CriteriaError {
    CriteriaError::InvalidArgument(err.into())
}

/// Make a new [`CriteriaError::InvalidAlias`].
pub fn invalid_alias_err<A: Into<String>, R: Into<String>>(alias: A, reason: R) -> CriteriaError {
    CriteriaError::InvalidAlias {
        alias: alias.into(),
        reason: reason.into(),
    }
}

/// Make a new [`CriteriaError::IllegalNavigation`].
pub fn illegal_navigation_err<O, A, R>(owner: O, attribute: A, reason: R) -> CriteriaError
where
    O: Into<String>,
    A: Into<String>,
    R: Into<String>,
{
    CriteriaError::IllegalNavigation {
        owner: owner.into(),
        attribute: attribute.into(),
        reason: reason.into(),
    }
}

/// Renders information about the current source location *if* building in debug mode, for use in
/// error-generating macros
#[doc(hidden)]
#[macro_export]
macro_rules! __location_info {
    () => {
        $crate::__location_info!(" (in {})")
    };
    ($fstr: literal) => {
        if cfg!(debug_assertions) {
            format!(
                $fstr,
                format!("{}:{}:{}", std::file!(), std::line!(), std::column!(),)
            )
        } else {
            "".to_owned()
        }
    };
}

/// Return a [`CriteriaError::Internal`] from the current function.
///
/// Usage is like [`panic!`], in that you can pass a format string and arguments. When building in
/// debug mode, the returned error also captures file, line, and column information for further
/// debugging purposes.
///
/// When called with no arguments, generates an internal error with the text
/// "entered unreachable code".
#[macro_export]
macro_rules! internal {
    () => {
        $crate::internal!("entered unreachable code")
    };
    ($($tt:tt)*) => {
        return Err($crate::internal_err(format!(
            "{}{}",
            $crate::__location_info!("in {}: "),
            format_args!($($tt)*)
        )).into())
    };
}

/// Return a [`CriteriaError::Unsupported`] from the current function.
///
/// Usage is like [`panic!`], in that you can pass a format string and arguments.
#[macro_export]
macro_rules! unsupported {
    () => {
        $crate::unsupported!("operation not implemented yet")
    };
    ($($tt:tt)*) => {
        return Err($crate::unsupported_err(format!(
            "{}{}",
            format_args!($($tt)*),
            $crate::__location_info!()
        )).into())
    };
}

/// Return a [`CriteriaError::InvalidState`] from the current function.
#[macro_export]
macro_rules! invalid_state {
    ($($tt:tt)*) => {
        return Err($crate::invalid_state_err(format!($($tt)*)).into())
    };
}

/// Return a [`CriteriaError::InvalidArgument`] from the current function.
#[macro_export]
macro_rules! invalid_argument {
    ($($tt:tt)*) => {
        return Err($crate::invalid_argument_err(format!($($tt)*)).into())
    };
}

/// Return a [`CriteriaError::Internal`] from the current function, if and only if
/// the argument evaluates to false.
///
/// This is intended to be used wherever [`assert!`] would otherwise be used.
#[macro_export]
macro_rules! invariant {
    ($expr:expr, $($tt:tt)*) => {
        if !$expr {
            $crate::internal!($($tt)*);
        }
    };
    ($expr:expr) => {
        if !$expr {
            $crate::internal!("assertion failed: {}", std::stringify!($expr));
        }
    };
}

/// Return a [`CriteriaError::Internal`] from the current function, if and only if
/// the two arguments aren't equal.
///
/// This is intended to be used wherever [`assert_eq!`] would otherwise be used.
#[macro_export]
macro_rules! invariant_eq {
    ($expr:expr, $expr2:expr, $($tt:tt)*) => {
        if $expr != $expr2 {
            $crate::internal!(
                "assertion failed: {} == {} ({});\nleft = {:?};\nright = {:?}",
                std::stringify!($expr),
                std::stringify!($expr2),
                format_args!($($tt)*),
                $expr,
                $expr2
            )
        }
    };
    ($expr:expr, $expr2:expr) => {
        if $expr != $expr2 {
            $crate::internal!(
                "assertion failed: {} == {};\nleft = {:?};\nright = {:?}",
                std::stringify!($expr),
                std::stringify!($expr2),
                $expr,
                $expr2
            )
        }
    };
}
