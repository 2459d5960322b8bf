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

//! Exception slicing.
//!
//! A user exception is reconstructed as the most derived slice whose type is
//! registered as an exception *and* is, or derives from, a type the operation
//! declares. Everything the receiver cannot or may not reconstruct collapses
//! into one of three unknown kinds that carry no field data.

use crate::error::Error;
use crate::graph::{ExceptionInstance, Instance, InstanceGraph};
use crate::resolver::context::{ReadContext, WriteContext};
use crate::serializer::slicer::{keep_preserved, ChainKind, ChainRead};
use crate::types::{EncodingVersion, ExceptionCategory, LocalExceptionKind};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Exception types an operation declares it may raise.
///
/// ```rust
/// use marshal_core::serializer::exception::DeclaredExceptionSet;
/// use std::sync::Arc;
///
/// let declared: DeclaredExceptionSet = ["::Test::A"].into_iter().collect();
/// let chain: Vec<Arc<str>> = vec!["::Test::C".into(), "::Test::B".into(), "::Test::A".into()];
/// assert_eq!(declared.matches(&chain), Some("::Test::A"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct DeclaredExceptionSet {
    ids: HashSet<Arc<str>>,
}

impl DeclaredExceptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, type_id: &str) -> bool {
        self.ids.insert(Arc::from(type_id))
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.ids.contains(type_id)
    }

    /// First id of `is_a` that is declared, if any.
    pub fn matches<'c>(&self, is_a: &'c [Arc<str>]) -> Option<&'c str> {
        is_a.iter().find(|id| self.ids.contains(&***id)).map(|id| &**id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for DeclaredExceptionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        DeclaredExceptionSet {
            ids: iter.into_iter().map(|s| Arc::from(s.as_ref())).collect(),
        }
    }
}

/// A user exception that was not declared or whose slices were not recognized.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown user exception `{unknown_type_id}`")]
pub struct UnknownUserException {
    pub unknown_type_id: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("peer raised {}: {}", .kind.type_id(), .reason)]
pub struct UnknownLocalException {
    pub kind: LocalExceptionKind,
    pub reason: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("peer raised an unknown exception: {reason}")]
pub struct UnknownException {
    pub reason: String,
}

/// Outcome of decoding an exception body.
#[derive(Debug)]
pub enum ReceivedException {
    User(ExceptionInstance),
    UnknownUser(UnknownUserException),
    UnknownLocal(UnknownLocalException),
    Unknown(UnknownException),
}

impl ReceivedException {
    pub fn is_user(&self) -> bool {
        matches!(self, ReceivedException::User(_))
    }

    pub fn as_user(&self) -> Option<&ExceptionInstance> {
        match self {
            ReceivedException::User(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_user(self) -> Result<ExceptionInstance, Self> {
        match self {
            ReceivedException::User(e) => Ok(e),
            other => Err(other),
        }
    }
}

impl WriteContext {
    pub(crate) fn write_exception(&mut self, exception: &ExceptionInstance) -> Result<(), Error> {
        self.writer.write_u8(ExceptionCategory::User.into());
        self.write_slices(&exception.graph, &exception.instance)?;
        if self.config().encoding() == EncodingVersion::V1_0 {
            self.write_pending(&exception.graph)?;
        }
        Ok(())
    }

    pub(crate) fn write_local_exception(&mut self, kind: LocalExceptionKind, reason: &str) {
        self.writer.write_u8(ExceptionCategory::Local.into());
        self.writer.write_u8(kind.into());
        self.writer.write_string(reason);
    }

    pub(crate) fn write_unknown_exception(&mut self, reason: &str) {
        self.writer.write_u8(ExceptionCategory::Unknown.into());
        self.writer.write_string(reason);
    }
}

impl<'bf> ReadContext<'bf> {
    pub(crate) fn read_exception(
        &mut self,
        declared: &DeclaredExceptionSet,
    ) -> Result<ReceivedException, Error> {
        let byte = self.reader.read_u8()?;
        let category = ExceptionCategory::try_from(byte)
            .map_err(|_| Error::malformed_stream(format!("unknown exception category {byte}")))?;
        match category {
            ExceptionCategory::User => self.read_user_exception(declared),
            ExceptionCategory::Local => {
                let kind = self.reader.read_u8()?;
                let reason = self.reader.read_string()?;
                Ok(match LocalExceptionKind::try_from(kind) {
                    Ok(kind) => ReceivedException::UnknownLocal(UnknownLocalException { kind, reason }),
                    Err(_) => {
                        debug!(kind, "unrecognized local exception kind");
                        ReceivedException::Unknown(UnknownException { reason })
                    }
                })
            }
            ExceptionCategory::Unknown => Ok(ReceivedException::Unknown(UnknownException {
                reason: self.reader.read_string()?,
            })),
        }
    }

    fn read_user_exception(
        &mut self,
        declared: &DeclaredExceptionSet,
    ) -> Result<ReceivedException, Error> {
        let ChainRead {
            most_derived,
            matched,
            preserved,
            unskippable,
        } = self.read_chain(ChainKind::Exception(declared))?;
        let Some((entry, value)) = matched else {
            debug!(
                type_id = %most_derived,
                unskippable,
                "exception not reconstructed"
            );
            return Ok(ReceivedException::UnknownUser(UnknownUserException {
                unknown_type_id: most_derived.to_string(),
            }));
        };
        if self.config().encoding() == EncodingVersion::V1_0 {
            self.read_pending()?;
        }
        self.check_complete()?;
        if *entry.get_type_id() != most_derived {
            debug!(
                most_derived = %most_derived,
                effective = %entry.get_type_id(),
                "exception sliced to a declared base"
            );
        }
        let preserved = keep_preserved(&entry, preserved);
        let instance = Instance {
            value,
            entry,
            most_derived_id: most_derived,
            preserved,
        };
        let registry = self.graph.registry().clone();
        let graph = std::mem::replace(&mut self.graph, InstanceGraph::new(registry));
        Ok(ReceivedException::User(ExceptionInstance { instance, graph }))
    }
}
