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

//! Retained bytes of slices the receiver could not interpret.
//!
//! A preserved slice keeps its sized region verbatim (fields, tagged optional
//! members and their end marker) together with the decoded indirection table,
//! so the instances it embeds stay part of the graph and keep their identity
//! when the value is relayed.

use crate::error::Error;
use crate::graph::InstanceRef;
use crate::serializer::{SliceInput, SliceOutput, SliceSerializer};
use crate::types::UNKNOWN_VALUE_TYPE_ID;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreservedSlice {
    pub(crate) type_id: Arc<str>,
    pub(crate) position: usize,
    pub(crate) bytes: Vec<u8>,
    pub(crate) has_optional_members: bool,
    pub(crate) instances: Vec<InstanceRef>,
}

impl PreservedSlice {
    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    /// Index of this slice in the sender's chain, most derived at 0.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn has_optional_members(&self) -> bool {
        self.has_optional_members
    }

    /// Indirection table of the slice; positions referenced from `bytes`.
    pub fn instances(&self) -> &[InstanceRef] {
        &self.instances
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PreservedSlices {
    slices: Vec<PreservedSlice>,
}

impl PreservedSlices {
    pub(crate) fn new(mut slices: Vec<PreservedSlice>) -> Self {
        slices.sort_by_key(|s| s.position);
        PreservedSlices { slices }
    }

    pub fn slices(&self) -> &[PreservedSlice] {
        &self.slices
    }

    pub fn type_ids(&self) -> impl Iterator<Item = &str> {
        self.slices.iter().map(|s| &*s.type_id)
    }

    /// Every instance referenced from preserved bytes, each once.
    pub fn embedded_instances(&self) -> BTreeSet<InstanceRef> {
        self.slices
            .iter()
            .flat_map(|s| s.instances.iter().copied())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

/// Placeholder built when no slice of a value is known locally.
///
/// It carries no fields; the sender's type id is kept on the instance
/// (`most_derived_type_id`) and its slices in the instance's preserved data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnknownValue {
    unknown_type_id: String,
}

impl UnknownValue {
    pub(crate) fn new(unknown_type_id: &str) -> Self {
        UnknownValue {
            unknown_type_id: unknown_type_id.to_string(),
        }
    }

    pub fn unknown_type_id(&self) -> &str {
        &self.unknown_type_id
    }
}

impl SliceSerializer for UnknownValue {
    fn registered_id(&self) -> &str {
        UNKNOWN_VALUE_TYPE_ID
    }

    fn write_slice(&self, _type_id: &str, _output: &mut SliceOutput<'_, '_>) -> Result<(), Error> {
        Err(Error::encode_error(format!(
            "placeholder for `{}` has no fields of its own",
            self.unknown_type_id
        )))
    }

    fn read_slice(&mut self, type_id: &str, _input: &mut SliceInput<'_, '_>) -> Result<(), Error> {
        Err(Error::malformed_stream(format!(
            "slice `{type_id}` cannot be read into a placeholder"
        )))
    }
}
