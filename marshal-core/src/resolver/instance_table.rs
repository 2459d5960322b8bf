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
use crate::graph::InstanceRef;
use std::collections::HashMap;

/// Write-side instance table.
///
/// Maps graph handles to the stream-local instance index. Indices start at 1,
/// 0 is reserved for null. Under 1.0 first occurrences are also queued as
/// pending bodies that follow the enclosing value or exception.
///
/// # Examples
///
/// ```rust
/// use marshal_core::resolver::instance_table::InstanceWriter;
/// use marshal_core::graph::InstanceRef;
///
/// let mut table = InstanceWriter::new();
/// let r = InstanceRef::from_raw(7);
/// assert_eq!(table.try_assign(r), (1, true));
/// assert_eq!(table.try_assign(r), (1, false));
/// ```
#[derive(Default)]
pub struct InstanceWriter {
    indices: HashMap<InstanceRef, u32>,
    next_index: u32,
    pending: Vec<InstanceRef>,
}

impl InstanceWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_of(&self, instance: InstanceRef) -> Option<u32> {
        self.indices.get(&instance).copied()
    }

    /// Returns the index of `instance` and whether this is its first occurrence.
    pub fn try_assign(&mut self, instance: InstanceRef) -> (u32, bool) {
        if let Some(&index) = self.indices.get(&instance) {
            return (index, false);
        }
        self.next_index += 1;
        self.indices.insert(instance, self.next_index);
        (self.next_index, true)
    }

    /// Like [`try_assign`](Self::try_assign) but queues a first occurrence as
    /// a pending body.
    pub fn assign_pending(&mut self, instance: InstanceRef) -> u32 {
        let (index, first) = self.try_assign(instance);
        if first {
            self.pending.push(instance);
        }
        index
    }

    pub fn take_pending(&mut self) -> Vec<InstanceRef> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn clear(&mut self) {
        self.indices.clear();
        self.pending.clear();
        self.next_index = 0;
    }
}

/// Read-side instance table.
///
/// Slots are bound to an index as soon as the index is seen, before the
/// slices of the instance are read, so that cyclic references resolve to
/// the handle under construction.
#[derive(Default)]
pub struct InstanceReader {
    refs: HashMap<u32, InstanceRef>,
    next_index: u32,
}

impl InstanceReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the next sequential index (1.1 inline instances).
    pub fn bind_next(&mut self, instance: InstanceRef) -> u32 {
        self.next_index += 1;
        self.refs.insert(self.next_index, instance);
        self.next_index
    }

    /// Resolves a back-reference; the index must already be bound.
    pub fn get(&self, index: u32) -> Result<InstanceRef, Error> {
        self.refs.get(&index).copied().ok_or_else(|| {
            Error::invalid_ref(format!("instance index {index} was never assigned"))
        })
    }

    /// Resolves a 1.0 index, binding a fresh slot for a forward reference.
    ///
    /// `remaining` is the number of unread bytes; every unseen instance needs
    /// at least one byte of body, so larger indices cannot be satisfied.
    pub fn get_or_bind(
        &mut self,
        index: u32,
        remaining: usize,
        reserve: impl FnOnce() -> InstanceRef,
    ) -> Result<InstanceRef, Error> {
        if let Some(&instance) = self.refs.get(&index) {
            return Ok(instance);
        }
        if index as usize > self.refs.len() + remaining + 1 {
            return Err(Error::invalid_ref(format!(
                "instance index {index} exceeds what {remaining} remaining bytes can hold"
            )));
        }
        let instance = reserve();
        self.refs.insert(index, instance);
        Ok(instance)
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn clear(&mut self) {
        self.refs.clear();
        self.next_index = 0;
    }
}
