// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! # PERFORMANCE CRITICAL MODULE
//!
//! Error constructors are reached from every buffer read and every slice
//! header check. They are marked `#[cold]` so that LLVM keeps the successful
//! decode paths tight; do not drop those attributes when adding variants.
//!
//! The taxonomy follows the marshaling contract:
//!
//! - registration problems ([`Error::AlreadyRegistered`], [`Error::NotAllowed`])
//! - decode problems caused by version skew ([`Error::NoValueFactory`])
//! - malformed input ([`Error::MalformedStream`], [`Error::BufferOutOfBound`],
//!   [`Error::InvalidRef`]), grouped by [`Error::is_malformed_stream`]
//! - local misuse ([`Error::InvalidCast`], [`Error::TypeError`])
//!
//! Exceptions raised by a peer that cannot be reconstructed are *not* errors;
//! they are reported through
//! [`ReceivedException`](crate::serializer::exception::ReceivedException).

use std::borrow::Cow;

use thiserror::Error;

/// Compile-time switch: build with `MARSHAL_PANIC_ON_ERROR=1` to panic at the
/// exact place an error is created.
pub const PANIC_ON_ERROR: bool = option_env!("MARSHAL_PANIC_ON_ERROR").is_some();

/// Check if MARSHAL_PANIC_ON_ERROR environment variable is set.
#[inline(always)]
pub const fn should_panic_on_error() -> bool {
    PANIC_ON_ERROR
}

/// Error type for marshaling operations.
///
/// # IMPORTANT: Always Use Static Constructor Functions
///
/// Construct errors through the associated functions ([`Error::malformed_stream`],
/// [`Error::no_value_factory`], ...) instead of the enum syntax. The functions
/// accept anything convertible into `Cow<'static, str>` and honor
/// `MARSHAL_PANIC_ON_ERROR`.
///
/// ```rust
/// use marshal_core::error::Error;
///
/// let err = Error::already_registered("::Test::B");
/// assert!(matches!(err, Error::AlreadyRegistered(_)));
///
/// let err = Error::malformed_stream(format!("bad slice flags {:#x}", 0x80));
/// assert!(err.is_malformed_stream());
/// ```
///
/// ## Debug Mode: MARSHAL_PANIC_ON_ERROR
///
/// ```bash
/// RUST_BACKTRACE=1 MARSHAL_PANIC_ON_ERROR=1 cargo test
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A type id was registered twice.
    ///
    /// Do not construct this variant directly; use [`Error::already_registered`] instead.
    #[error("type `{0}` is already registered")]
    AlreadyRegistered(Cow<'static, str>),

    /// No slice of a value could be resolved and the stream cannot be sliced further.
    ///
    /// Do not construct this variant directly; use [`Error::no_value_factory`] instead.
    #[error("no value factory found for type `{0}`")]
    NoValueFactory(Cow<'static, str>),

    /// An instance was viewed as a type more derived than its effective type.
    ///
    /// Do not construct this variant directly; use [`Error::invalid_cast`] instead.
    #[error("{0}")]
    InvalidCast(Cow<'static, str>),

    /// Inconsistent slice layout, bad flags or trailing data.
    ///
    /// Do not construct this variant directly; use [`Error::malformed_stream`] instead.
    #[error("malformed stream: {0}")]
    MalformedStream(Cow<'static, str>),

    /// Buffer boundary violation during read/write operations.
    ///
    /// Do not construct this variant directly; use [`Error::buffer_out_of_bound`] instead.
    #[error("Buffer out of bound: {0} + {1} > {2}")]
    BufferOutOfBound(usize, usize, usize),

    /// Invalid instance index encountered.
    ///
    /// Do not construct this variant directly; use [`Error::invalid_ref`] instead.
    #[error("{0}")]
    InvalidRef(Cow<'static, str>),

    /// General type-related error.
    ///
    /// Do not construct this variant directly; use [`Error::type_error`] instead.
    #[error("{0}")]
    TypeError(Cow<'static, str>),

    /// Error during encoding.
    ///
    /// Do not construct this variant directly; use [`Error::encode_error`] instead.
    #[error("{0}")]
    EncodeError(Cow<'static, str>),

    /// Maximum nesting depth exceeded.
    ///
    /// Do not construct this variant directly; use [`Error::depth_exceed`] instead.
    #[error("{0}")]
    DepthExceed(Cow<'static, str>),

    /// Unsupported operation or feature.
    ///
    /// Do not construct this variant directly; use [`Error::unsupported`] instead.
    #[error("{0}")]
    Unsupported(Cow<'static, str>),

    /// Operation not allowed in current context.
    ///
    /// Do not construct this variant directly; use [`Error::not_allowed`] instead.
    #[error("{0}")]
    NotAllowed(Cow<'static, str>),

    /// Generic unknown error.
    ///
    /// Do not construct this variant directly; use [`Error::unknown`] instead.
    #[error("{0}")]
    Unknown(Cow<'static, str>),

    /// Error raised by a field codec that wraps a foreign error type.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

macro_rules! cow_constructor {
    ($(#[$doc:meta])* $name:ident => $variant:ident) => {
        $(#[$doc])*
        #[inline(always)]
        #[cold]
        #[track_caller]
        pub fn $name<S: Into<Cow<'static, str>>>(s: S) -> Self {
            let err = Error::$variant(s.into());
            if PANIC_ON_ERROR {
                panic!("MARSHAL_PANIC_ON_ERROR: {}", err);
            }
            err
        }
    };
}

impl Error {
    cow_constructor!(
        /// Creates a new [`Error::AlreadyRegistered`] naming the duplicated type id.
        already_registered => AlreadyRegistered
    );
    cow_constructor!(
        /// Creates a new [`Error::NoValueFactory`] naming the unresolved type id.
        no_value_factory => NoValueFactory
    );
    cow_constructor!(
        /// Creates a new [`Error::InvalidCast`].
        invalid_cast => InvalidCast
    );
    cow_constructor!(
        /// Creates a new [`Error::MalformedStream`].
        malformed_stream => MalformedStream
    );
    cow_constructor!(
        /// Creates a new [`Error::InvalidRef`].
        invalid_ref => InvalidRef
    );
    cow_constructor!(
        /// Creates a new [`Error::TypeError`].
        type_error => TypeError
    );
    cow_constructor!(
        /// Creates a new [`Error::EncodeError`].
        encode_error => EncodeError
    );
    cow_constructor!(
        /// Creates a new [`Error::DepthExceed`].
        depth_exceed => DepthExceed
    );
    cow_constructor!(
        /// Creates a new [`Error::Unsupported`].
        unsupported => Unsupported
    );
    cow_constructor!(
        /// Creates a new [`Error::NotAllowed`].
        not_allowed => NotAllowed
    );
    cow_constructor!(
        /// Creates a new [`Error::Unknown`] from a literal, `String`, or any
        /// type convertible into a [`Cow<'static, str>`].
        unknown => Unknown
    );

    /// Creates a new [`Error::BufferOutOfBound`] with the given bounds.
    ///
    /// # Example
    /// ```
    /// use marshal_core::error::Error;
    ///
    /// let err = Error::buffer_out_of_bound(10, 20, 25);
    /// assert!(err.is_malformed_stream());
    /// ```
    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn buffer_out_of_bound(offset: usize, length: usize, capacity: usize) -> Self {
        let err = Error::BufferOutOfBound(offset, length, capacity);
        if PANIC_ON_ERROR {
            panic!("MARSHAL_PANIC_ON_ERROR: {}", err);
        }
        err
    }

    /// Returns `true` for every error caused by truncated or inconsistent input.
    pub fn is_malformed_stream(&self) -> bool {
        matches!(
            self,
            Error::MalformedStream(_) | Error::BufferOutOfBound(..) | Error::InvalidRef(_)
        )
    }
}

/// Ensures a condition is true; otherwise returns an [`enum@Error`].
///
/// # Examples
/// ```
/// use marshal_core::ensure;
/// use marshal_core::error::Error;
///
/// fn check_size(n: usize) -> Result<(), Error> {
///     ensure!(n > 0, "size must be positive");
///     ensure!(n < 10, Error::malformed_stream(format!("size {} too large", n)));
///     Ok(())
/// }
/// assert!(check_size(3).is_ok());
/// assert!(check_size(12).unwrap_err().is_malformed_stream());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $msg:literal) => {
        if !$cond {
            return Err($crate::error::Error::unknown($msg));
        }
    };
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::error::Error::unknown(format!($fmt, $($arg)*)));
        }
    };
}

/// Returns early with a [`Error::NotAllowed`].
///
/// # Examples
/// ```
/// use marshal_core::not_allowed;
/// use marshal_core::error::Error;
///
/// fn register(type_id: &str) -> Result<(), Error> {
///     if type_id.is_empty() {
///         not_allowed!("type id must not be empty");
///     }
///     Ok(())
/// }
/// assert!(matches!(register(""), Err(Error::NotAllowed(_))));
/// ```
#[macro_export]
macro_rules! not_allowed {
    ($err:expr) => {
        return Err($crate::error::Error::not_allowed($err))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::error::Error::not_allowed(format!($fmt, $($arg)*)))
    };
}
