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

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Wire encoding generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EncodingVersion {
    /// Always-sized slices, pending-instance section, no optional members.
    V1_0,
    /// Per-slice flags, inline instances, optional members.
    #[default]
    V1_1,
}

/// Class format used under 1.1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FormatType {
    /// Type id on the first slice only, no sizes; unknown slices cannot be skipped.
    Compact,
    /// Every slice carries its type id and size.
    #[default]
    Sliced,
}

pub mod slice_flags {
    pub const HAS_TYPE_ID: u8 = 0x01;
    pub const HAS_OPTIONAL_MEMBERS: u8 = 0x04;
    pub const HAS_INDIRECTION_TABLE: u8 = 0x08;
    pub const HAS_SLICE_SIZE: u8 = 0x10;
    pub const IS_LAST_SLICE: u8 = 0x20;

    pub const KNOWN_MASK: u8 =
        HAS_TYPE_ID | HAS_OPTIONAL_MEMBERS | HAS_INDIRECTION_TABLE | HAS_SLICE_SIZE | IS_LAST_SLICE;
}

/// 1.1 inline instance tokens; values `>= 2` are back-references to index `n - 1`.
pub const NULL_INSTANCE: u32 = 0;
pub const NEW_INSTANCE: u32 = 1;

/// End of a tagged-optional section.
pub const OPTIONAL_END_MARKER: u32 = 0;

/// Reserved id of the built-in placeholder for values no slice of which is known.
pub const UNKNOWN_VALUE_TYPE_ID: &str = "::Ice::UnknownSlicedValue";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Value,
    Exception,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ExceptionCategory {
    User = 1,
    Local = 2,
    Unknown = 3,
}

/// Local exceptions a peer may report in place of a user exception.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum LocalExceptionKind {
    ObjectNotExist = 1,
    FacetNotExist = 2,
    OperationNotExist = 3,
    Marshal = 4,
    Timeout = 5,
    ConnectionLost = 6,
    MemoryLimit = 7,
}

impl LocalExceptionKind {
    pub fn type_id(&self) -> &'static str {
        match self {
            LocalExceptionKind::ObjectNotExist => "::Ice::ObjectNotExistException",
            LocalExceptionKind::FacetNotExist => "::Ice::FacetNotExistException",
            LocalExceptionKind::OperationNotExist => "::Ice::OperationNotExistException",
            LocalExceptionKind::Marshal => "::Ice::MarshalException",
            LocalExceptionKind::Timeout => "::Ice::TimeoutException",
            LocalExceptionKind::ConnectionLost => "::Ice::ConnectionLostException",
            LocalExceptionKind::MemoryLimit => "::Ice::MemoryLimitException",
        }
    }
}
