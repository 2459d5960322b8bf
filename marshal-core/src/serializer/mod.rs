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

use crate::error::Error;
use std::any::Any;
use std::fmt::Debug;

pub mod exception;
pub mod preserved;
pub mod slice_writer;
pub mod slicer;

pub use slice_writer::SliceOutput;
pub use slicer::SliceInput;

pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Field codec of a value or exception type, one inheritance level at a time.
///
/// The engine calls `write_slice`/`read_slice` once per slice of the
/// effective type's is-a chain, most derived first, passing the id of the
/// level being coded. A type that embeds its base delegates the base's ids
/// to it and overrides [`upcast`](SliceSerializer::upcast) accordingly:
///
/// ```rust
/// use marshal_core::error::Error;
/// use marshal_core::serializer::{SliceInput, SliceOutput, SliceSerializer};
/// use std::any::Any;
///
/// #[derive(Debug, Default)]
/// struct Base { b: i32 }
///
/// #[derive(Debug, Default)]
/// struct Derived { base: Base, d: String }
///
/// impl SliceSerializer for Base {
///     fn registered_id(&self) -> &str { "::Demo::Base" }
///     fn write_slice(&self, _: &str, out: &mut SliceOutput<'_, '_>) -> Result<(), Error> {
///         out.write_i32(self.b);
///         Ok(())
///     }
///     fn read_slice(&mut self, _: &str, input: &mut SliceInput<'_, '_>) -> Result<(), Error> {
///         self.b = input.read_i32()?;
///         Ok(())
///     }
/// }
///
/// impl SliceSerializer for Derived {
///     fn registered_id(&self) -> &str { "::Demo::Derived" }
///     fn write_slice(&self, type_id: &str, out: &mut SliceOutput<'_, '_>) -> Result<(), Error> {
///         match type_id {
///             "::Demo::Derived" => {
///                 out.write_string(&self.d);
///                 Ok(())
///             }
///             _ => self.base.write_slice(type_id, out),
///         }
///     }
///     fn read_slice(&mut self, type_id: &str, input: &mut SliceInput<'_, '_>) -> Result<(), Error> {
///         match type_id {
///             "::Demo::Derived" => {
///                 self.d = input.read_string()?;
///                 Ok(())
///             }
///             _ => self.base.read_slice(type_id, input),
///         }
///     }
///     fn upcast(&self, type_id: &str) -> Option<&dyn Any> {
///         match type_id {
///             "::Demo::Derived" => Some(self),
///             _ => self.base.upcast(type_id),
///         }
///     }
/// }
/// ```
pub trait SliceSerializer: AsAny + Debug + Send + Sync + 'static {
    /// Id this codec was registered under.
    fn registered_id(&self) -> &str;

    fn write_slice(&self, type_id: &str, output: &mut SliceOutput<'_, '_>) -> Result<(), Error>;

    fn read_slice(&mut self, type_id: &str, input: &mut SliceInput<'_, '_>) -> Result<(), Error>;

    /// Rust view of this value as the type `type_id`.
    fn upcast(&self, type_id: &str) -> Option<&dyn Any> {
        if type_id == self.registered_id() {
            Some(self.as_any())
        } else {
            None
        }
    }
}
