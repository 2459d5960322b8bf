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

use crate::buffer::Reader;
use crate::config::Config;
use crate::error::Error;
use crate::graph::{DecodedInstance, ExceptionInstance, Instance, InstanceGraph, InstanceRef};
use crate::resolver::context::{ReadContext, WriteContext};
use crate::resolver::pool::Pool;
use crate::resolver::type_registry::{factory, Factory, TypeRegistry};
use crate::serializer::exception::{DeclaredExceptionSet, ReceivedException};
use crate::serializer::SliceSerializer;
use crate::types::{EncodingVersion, FormatType, LocalExceptionKind};
use std::sync::Arc;
use tracing::{debug, trace};

/// Entry point for encoding and decoding values and exceptions.
///
/// A `Marshal` owns a [`Config`] and shares a [`TypeRegistry`]. It is
/// `Send + Sync`; write contexts are pooled per thread segment and reset
/// when an encode returns.
///
/// # Examples
///
/// ```rust
/// use marshal_core::types::{EncodingVersion, FormatType};
/// use marshal_core::Marshal;
///
/// let marshal = Marshal::default()
///     .encoding(EncodingVersion::V1_1)
///     .format(FormatType::Compact)
///     .slice_values(true)
///     .max_depth(64);
/// assert!(marshal.config().is_compact());
/// ```
pub struct Marshal {
    config: Config,
    registry: Arc<TypeRegistry>,
    write_context_pool: Pool<WriteContext>,
}

impl Default for Marshal {
    fn default() -> Self {
        Marshal::with_registry(Arc::new(TypeRegistry::new()))
    }
}

impl Marshal {
    /// Creates a `Marshal` over an existing, possibly shared, registry.
    pub fn with_registry(registry: Arc<TypeRegistry>) -> Self {
        Marshal {
            config: Config::default(),
            registry,
            write_context_pool: Pool::new(WriteContext::new),
        }
    }

    /// Sets the wire encoding generation. Defaults to 1.1.
    pub fn encoding(mut self, encoding: EncodingVersion) -> Self {
        self.config.encoding = encoding;
        self
    }

    /// Sets the 1.1 class format. Defaults to [`FormatType::Sliced`].
    pub fn format(mut self, format: FormatType) -> Self {
        self.config.format = format;
        self
    }

    /// When disabled, a value whose most derived type is unknown fails with
    /// [`Error::NoValueFactory`] instead of being sliced.
    pub fn slice_values(mut self, slice_values: bool) -> Self {
        self.config.slice_values = slice_values;
        self
    }

    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn register_value_factory(
        &self,
        type_id: &str,
        factory: Factory,
        is_a: &[&str],
        preserved: bool,
    ) -> Result<(), Error> {
        self.registry
            .register_value_factory(type_id, factory, is_a, preserved)
    }

    pub fn register_exception_factory(
        &self,
        type_id: &str,
        factory: Factory,
        is_a: &[&str],
        preserved: bool,
    ) -> Result<(), Error> {
        self.registry
            .register_exception_factory(type_id, factory, is_a, preserved)
    }

    /// Registers `T` as a value type, built through `T::default()`.
    pub fn register_value<T: SliceSerializer + Default>(
        &self,
        type_id: &str,
        is_a: &[&str],
        preserved: bool,
    ) -> Result<(), Error> {
        self.register_value_factory(type_id, factory::<T>, is_a, preserved)
    }

    /// Registers `T` as an exception type, built through `T::default()`.
    pub fn register_exception<T: SliceSerializer + Default>(
        &self,
        type_id: &str,
        is_a: &[&str],
        preserved: bool,
    ) -> Result<(), Error> {
        self.register_exception_factory(type_id, factory::<T>, is_a, preserved)
    }

    pub fn new_graph(&self) -> InstanceGraph {
        InstanceGraph::new(self.registry.clone())
    }

    pub fn new_exception<T: SliceSerializer>(&self, value: T) -> Result<ExceptionInstance, Error> {
        ExceptionInstance::new(self.registry.clone(), value)
    }

    /// Encodes the graph reachable from `root`.
    pub fn encode_instance(
        &self,
        graph: &InstanceGraph,
        root: Option<InstanceRef>,
    ) -> Result<Vec<u8>, Error> {
        self.write_context_pool.with(|context| {
            context.init(&self.config);
            let result = context
                .write_value_stream(graph, root)
                .map(|_| context.writer.dump());
            trace!(instances = context.instances.len(), ok = result.is_ok(), "encoded value stream");
            result
        })
    }

    /// Decodes a value stream. The whole body must be consumed.
    pub fn decode_instance(&self, bf: &[u8]) -> Result<DecodedInstance, Error> {
        let mut context = ReadContext::new(&self.config, Reader::new(bf), self.new_graph());
        let root = context.read_value_stream()?;
        let graph = context.into_graph();
        trace!(instances = graph.len(), "decoded value stream");
        Ok(DecodedInstance { graph, root })
    }

    pub fn encode_exception(&self, exception: &ExceptionInstance) -> Result<Vec<u8>, Error> {
        debug!(type_id = exception.effective_type_id(), "encoding user exception");
        self.write_context_pool.with(|context| {
            context.init(&self.config);
            context
                .write_exception(exception)
                .map(|_| context.writer.dump())
        })
    }

    pub fn encode_local_exception(&self, kind: LocalExceptionKind, reason: &str) -> Vec<u8> {
        self.write_context_pool.with(|context| {
            context.init(&self.config);
            context.write_local_exception(kind, reason);
            context.writer.dump()
        })
    }

    pub fn encode_unknown_exception(&self, reason: &str) -> Vec<u8> {
        self.write_context_pool.with(|context| {
            context.init(&self.config);
            context.write_unknown_exception(reason);
            context.writer.dump()
        })
    }

    /// Decodes an exception body against the operation's declared exceptions.
    ///
    /// Only malformed input is an `Err`; undeclared or unrecognized
    /// exceptions are reported through the unknown variants of
    /// [`ReceivedException`].
    pub fn decode_exception(
        &self,
        bf: &[u8],
        declared: &DeclaredExceptionSet,
    ) -> Result<ReceivedException, Error> {
        let mut context = ReadContext::new(&self.config, Reader::new(bf), self.new_graph());
        context.read_exception(declared)
    }

    pub fn is_a(&self, instance: &Instance, type_id: &str) -> bool {
        instance.is_a(type_id)
    }

    pub fn most_derived_type_id<'i>(&self, instance: &'i Instance) -> &'i str {
        instance.most_derived_type_id()
    }

    pub fn try_cast<'i, T: 'static>(&self, instance: &'i Instance, type_id: &str) -> Option<&'i T> {
        instance.try_cast(type_id)
    }

    /// Like [`try_cast`](Self::try_cast) but fails with [`Error::InvalidCast`].
    pub fn cast<'i, T: 'static>(&self, instance: &'i Instance, type_id: &str) -> Result<&'i T, Error> {
        instance.cast(type_id)
    }
}
