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

//! # Marshal Core
//!
//! Core of a slicing-aware marshaling engine for RPC bodies. It encodes and
//! decodes graphs of polymorphic values and user exceptions while tolerating
//! version skew: a receiver that does not know the sender's most derived type
//! reconstructs the nearest ancestor it does know.
//!
//! ## Architecture
//!
//! - **`marshal`**: the [`Marshal`] entry point and its configuration builder
//! - **`buffer`**: little-endian [`Writer`](buffer::Writer)/[`Reader`](buffer::Reader)
//! - **`graph`**: arena of instances addressed by [`InstanceRef`](graph::InstanceRef)
//! - **`resolver`**: type registry, instance and type-id tables, deferred
//!   patches, per-operation contexts
//! - **`serializer`**: the [`SliceSerializer`](serializer::SliceSerializer)
//!   trait, slice writer, slicer, preservation and exception slicing
//! - **`types`**: wire constants and enums
//! - **`config`**, **`error`**
//!
//! ## Encodings
//!
//! - **1.0**: every slice is sized; instances are written as indices and
//!   their bodies follow in a pending section.
//! - **1.1 compact**: only the first slice names its type, no sizes.
//!   An unknown most derived type cannot be sliced.
//! - **1.1 sliced**: every slice is named and sized, instance references go
//!   through a per-slice indirection table and unknown slices of preserved
//!   types survive a relay byte for byte.

pub mod buffer;
pub mod config;
pub mod error;
pub mod graph;
pub mod marshal;
pub mod resolver;
pub mod serializer;
pub mod types;

pub use config::Config;
pub use error::Error;
pub use graph::{DecodedInstance, ExceptionInstance, Instance, InstanceGraph, InstanceRef};
pub use marshal::Marshal;
pub use resolver::type_registry::{Factory, TypeEntry, TypeRegistry};
pub use serializer::exception::{
    DeclaredExceptionSet, ReceivedException, UnknownException, UnknownLocalException,
    UnknownUserException,
};
pub use serializer::preserved::{PreservedSlice, PreservedSlices, UnknownValue};
pub use serializer::{SliceInput, SliceOutput, SliceSerializer};
pub use types::{EncodingVersion, FormatType, LocalExceptionKind};
