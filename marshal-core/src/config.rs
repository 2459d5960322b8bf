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

use crate::types::{EncodingVersion, FormatType};

/// Configuration for marshaling.
///
/// Shared between [`Marshal`](crate::Marshal) and the per-operation
/// `WriteContext`/`ReadContext` so both sides agree on the layout.
#[derive(Clone, Debug)]
pub struct Config {
    /// Wire encoding generation.
    pub encoding: EncodingVersion,
    /// Class/exception format; only consulted under 1.1.
    pub format: FormatType,
    /// Whether unknown most-derived value types may be sliced to a known
    /// base (or to the placeholder). When false, such values are rejected.
    pub slice_values: bool,
    /// Maximum nesting depth of instances read or written in one operation.
    pub max_depth: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            encoding: EncodingVersion::V1_1,
            format: FormatType::Sliced,
            slice_values: true,
            max_depth: 100,
        }
    }
}

impl Config {
    /// Creates a new Config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn encoding(&self) -> EncodingVersion {
        self.encoding
    }

    #[inline(always)]
    pub fn format(&self) -> FormatType {
        self.format
    }

    #[inline(always)]
    pub fn is_slice_values(&self) -> bool {
        self.slice_values
    }

    #[inline(always)]
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// True when unknown slices are retained for re-emission.
    #[inline(always)]
    pub fn can_preserve(&self) -> bool {
        self.encoding == EncodingVersion::V1_1 && self.format == FormatType::Sliced
    }

    /// True for the 1.1 compact layout.
    #[inline(always)]
    pub fn is_compact(&self) -> bool {
        self.encoding == EncodingVersion::V1_1 && self.format == FormatType::Compact
    }
}
