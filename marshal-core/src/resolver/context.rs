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

use crate::buffer::{Reader, Writer};
use crate::config::Config;
use crate::error::Error;
use crate::graph::{InstanceGraph, InstanceRef};
use crate::resolver::instance_table::{InstanceReader, InstanceWriter};
use crate::resolver::patch_resolver::PatchResolver;
use crate::resolver::pool::Reset;
use crate::resolver::type_id_table::{TypeIdReader, TypeIdWriter};

/// Output buffer capacity a pooled context keeps between operations.
const RETAINED_BUFFER_CAPACITY: usize = 64 * 1024;

/// Per-operation encode state; pooled by [`Marshal`](crate::Marshal).
pub struct WriteContext {
    pub writer: Writer,
    config: Config,
    pub(crate) instances: InstanceWriter,
    pub(crate) type_ids: TypeIdWriter,
    current_depth: u32,
}

impl Reset for WriteContext {
    fn reset(&mut self) {
        self.writer.reset();
        self.writer.shrink_to(RETAINED_BUFFER_CAPACITY);
        self.instances.clear();
        self.type_ids.clear();
        self.current_depth = 0;
    }
}

impl Default for WriteContext {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteContext {
    pub fn new() -> WriteContext {
        WriteContext {
            writer: Writer::default(),
            config: Config::default(),
            instances: InstanceWriter::new(),
            type_ids: TypeIdWriter::default(),
            current_depth: 0,
        }
    }

    pub fn init(&mut self, config: &Config) {
        self.config = config.clone();
    }

    #[inline(always)]
    pub fn config(&self) -> &Config {
        &self.config
    }


    pub fn inc_depth(&mut self) -> Result<(), Error> {
        self.current_depth += 1;
        if self.current_depth > self.config.max_depth() {
            return Err(Error::depth_exceed(format!(
                "maximum instance nesting depth ({}) exceeded while encoding",
                self.config.max_depth()
            )));
        }
        Ok(())
    }

    pub fn dec_depth(&mut self) {
        self.current_depth = self.current_depth.saturating_sub(1);
    }
}

/// Per-operation decode state over a borrowed body.
pub struct ReadContext<'bf> {
    pub reader: Reader<'bf>,
    config: Config,
    pub(crate) graph: InstanceGraph,
    pub(crate) instances: InstanceReader,
    pub(crate) type_ids: TypeIdReader,
    pub(crate) patches: PatchResolver,
    current_depth: u32,
}

impl<'bf> ReadContext<'bf> {
    pub fn new(config: &Config, reader: Reader<'bf>, graph: InstanceGraph) -> ReadContext<'bf> {
        ReadContext {
            reader,
            config: config.clone(),
            graph,
            instances: InstanceReader::new(),
            type_ids: TypeIdReader::default(),
            patches: PatchResolver::default(),
            current_depth: 0,
        }
    }

    #[inline(always)]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn graph(&self) -> &InstanceGraph {
        &self.graph
    }

    pub fn into_graph(self) -> InstanceGraph {
        self.graph
    }

    /// Resolves a 1.0 instance index, reserving a slot on first sight.
    pub(crate) fn bind_index(&mut self, index: u32) -> Result<InstanceRef, Error> {
        let remaining = self.reader.remaining();
        let graph = &mut self.graph;
        self.instances
            .get_or_bind(index, remaining, || graph.reserve())
    }

    /// Fails when a referenced instance never arrived or a patch is still
    /// waiting for its target.
    pub(crate) fn check_complete(&self) -> Result<(), Error> {
        let unfilled = self.graph.unfilled();
        if unfilled > 0 {
            return Err(Error::invalid_ref(format!(
                "{unfilled} referenced instance(s) were never encoded"
            )));
        }
        if self.patches.has_pending() {
            return Err(Error::invalid_ref(format!(
                "{} instance(s) still have pending patches",
                self.patches.pending_targets()
            )));
        }
        Ok(())
    }

    pub fn inc_depth(&mut self) -> Result<(), Error> {
        self.current_depth += 1;
        if self.current_depth > self.config.max_depth() {
            return Err(Error::depth_exceed(format!(
                "maximum instance nesting depth ({}) exceeded. Current depth: {}",
                self.config.max_depth(),
                self.current_depth
            )));
        }
        Ok(())
    }

    pub fn dec_depth(&mut self) {
        self.current_depth = self.current_depth.saturating_sub(1);
    }
}
