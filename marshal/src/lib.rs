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

//! # Marshal
//!
//! Slicing-aware marshaling of polymorphic values and exceptions for RPC
//! bodies. A sender may use types the receiver has never heard of; the
//! receiver reconstructs the most derived type it knows, keeps reference
//! identity across shared and cyclic references, and, for types registered
//! as *preserved*, carries the unknown parts along so that relaying the value
//! loses nothing.
//!
//! ## Key Features
//!
//! - **Version-skew tolerance**: values are sliced down to their nearest
//!   known base, exceptions to their nearest declared base
//! - **Graph identity**: shared references and cycles survive a round trip
//! - **Two encodings**: 1.0 and 1.1, the latter in a compact and a sliced
//!   class format
//! - **Preservation**: unknown slices of preserved types are re-emitted
//!   byte for byte
//!
//! ## Values
//!
//! Field codecs implement [`SliceSerializer`], one slice per inheritance
//! level. References to other instances are [`InstanceRef`] handles into an
//! [`InstanceGraph`].
//!
//! ```rust
//! use marshal::{Error, InstanceRef, Marshal, SliceInput, SliceOutput, SliceSerializer};
//!
//! #[derive(Debug, Default)]
//! struct Node {
//!     value: i32,
//!     next: Option<InstanceRef>,
//! }
//!
//! impl SliceSerializer for Node {
//!     fn registered_id(&self) -> &str {
//!         "::Demo::Node"
//!     }
//!
//!     fn write_slice(&self, _: &str, out: &mut SliceOutput<'_, '_>) -> Result<(), Error> {
//!         out.write_i32(self.value);
//!         out.write_instance(self.next)
//!     }
//!
//!     fn read_slice(&mut self, _: &str, input: &mut SliceInput<'_, '_>) -> Result<(), Error> {
//!         self.value = input.read_i32()?;
//!         self.next = input.read_instance()?;
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> Result<(), Error> {
//! let marshal = Marshal::default();
//! marshal.register_value::<Node>("::Demo::Node", &[], false)?;
//!
//! let mut graph = marshal.new_graph();
//! let node = graph.insert(Node { value: 7, next: None })?;
//! if let Some(n) = graph.value_mut::<Node>(node) {
//!     n.next = Some(node);
//! }
//!
//! let bytes = marshal.encode_instance(&graph, Some(node))?;
//! let decoded = marshal.decode_instance(&bytes)?;
//! let root = decoded.root().expect("root");
//! let back = decoded.graph().value::<Node>(root).expect("node");
//! assert_eq!(back.value, 7);
//! assert_eq!(back.next, Some(root));
//! # Ok(())
//! # }
//! ```
//!
//! ## Exceptions
//!
//! [`Marshal::decode_exception`] matches the received slices against the
//! operation's [`DeclaredExceptionSet`]. Exceptions that cannot be
//! reconstructed are reported as [`ReceivedException::UnknownUser`],
//! [`ReceivedException::UnknownLocal`] or [`ReceivedException::Unknown`].
//!
//! ## Configuration
//!
//! ```rust
//! use marshal::{EncodingVersion, FormatType, Marshal};
//!
//! let marshal = Marshal::default()
//!     .encoding(EncodingVersion::V1_0)
//!     .slice_values(false)
//!     .max_depth(32);
//! assert_eq!(marshal.config().format(), FormatType::Sliced);
//! ```

pub use marshal_core::{
    buffer, config, error, graph, resolver, serializer, types, Config, DeclaredExceptionSet,
    DecodedInstance, EncodingVersion, Error, ExceptionInstance, Factory, FormatType, Instance,
    InstanceGraph, InstanceRef, LocalExceptionKind, Marshal, PreservedSlice, PreservedSlices,
    ReceivedException, SliceInput, SliceOutput, SliceSerializer, TypeEntry, TypeRegistry,
    UnknownException, UnknownLocalException, UnknownUserException, UnknownValue,
};
pub use marshal_core::{ensure, not_allowed};
