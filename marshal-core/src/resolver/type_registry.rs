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

//! Process-wide map from type id to factory, is-a chain and preservation flag.

use crate::error::Error;
use crate::not_allowed;
use crate::serializer::preserved::UnknownValue;
use crate::serializer::SliceSerializer;
use crate::types::{TypeKind, UNKNOWN_VALUE_TYPE_ID};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Builds an empty instance whose fields are then filled slice by slice.
pub type Factory = fn() -> Box<dyn SliceSerializer>;

/// Generic factory for any default-constructible codec.
pub fn factory<T: SliceSerializer + Default>() -> Box<dyn SliceSerializer> {
    Box::new(T::default())
}

pub struct TypeEntry {
    type_id: Arc<str>,
    is_a: Arc<[Arc<str>]>,
    factory: Factory,
    kind: TypeKind,
    preserved: bool,
}

impl TypeEntry {
    #[inline(always)]
    pub fn get_type_id(&self) -> &Arc<str> {
        &self.type_id
    }

    /// Own id first, root last.
    #[inline(always)]
    pub fn get_is_a(&self) -> &Arc<[Arc<str>]> {
        &self.is_a
    }

    #[inline(always)]
    pub fn get_kind(&self) -> TypeKind {
        self.kind
    }

    #[inline(always)]
    pub fn is_preserved(&self) -> bool {
        self.preserved
    }

    pub fn is_a(&self, type_id: &str) -> bool {
        self.is_a.iter().any(|id| &**id == type_id)
    }

    /// Position of `type_id` in the is-a chain.
    pub fn depth_of(&self, type_id: &str) -> Option<usize> {
        self.is_a.iter().position(|id| &**id == type_id)
    }

    pub fn create(&self) -> Box<dyn SliceSerializer> {
        (self.factory)()
    }

    pub fn is_unknown_placeholder(&self) -> bool {
        &*self.type_id == UNKNOWN_VALUE_TYPE_ID
    }
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEntry")
            .field("type_id", &self.type_id)
            .field("is_a", &self.is_a)
            .field("kind", &self.kind)
            .field("preserved", &self.preserved)
            .finish()
    }
}

/// Registry of every value and exception type this process can reconstruct.
///
/// Values and exceptions share one id namespace. Registration is
/// first-writer-wins: a second registration of the same id fails with
/// [`Error::AlreadyRegistered`] no matter which factory it carries, and this
/// holds when several threads race on the same id.
///
/// ```rust
/// use marshal_core::resolver::type_registry::TypeRegistry;
/// use marshal_core::types::UNKNOWN_VALUE_TYPE_ID;
///
/// let registry = TypeRegistry::new();
/// assert!(registry.contains(UNKNOWN_VALUE_TYPE_ID));
/// assert!(registry.lookup("::Demo::Missing").is_none());
/// ```
pub struct TypeRegistry {
    entries: RwLock<HashMap<Arc<str>, Arc<TypeEntry>>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        let mut entries = HashMap::new();
        seed(&mut entries);
        TypeRegistry {
            entries: RwLock::new(entries),
        }
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("len", &self.len())
            .finish()
    }
}

/// Installs the placeholder type. Callers hold the map exclusively.
fn seed(entries: &mut HashMap<Arc<str>, Arc<TypeEntry>>) {
    let id: Arc<str> = Arc::from(UNKNOWN_VALUE_TYPE_ID);
    let entry = TypeEntry {
        type_id: id.clone(),
        is_a: Arc::from(vec![id.clone()]),
        factory: factory::<UnknownValue>,
        kind: TypeKind::Value,
        preserved: true,
    };
    entries.insert(id, Arc::new(entry));
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `type_id` with its ancestors.
    ///
    /// `is_a` lists the ancestors from the nearest to the root; the type's own
    /// id may be given first and is added when missing.
    pub fn register(
        &self,
        type_id: &str,
        factory: Factory,
        is_a: &[&str],
        preserved: bool,
        kind: TypeKind,
    ) -> Result<(), Error> {
        if type_id.is_empty() {
            not_allowed!("type id must not be empty");
        }
        if is_a.iter().any(|id| id.is_empty()) {
            not_allowed!(format!("is-a chain of `{type_id}` contains an empty id"));
        }
        let id: Arc<str> = Arc::from(type_id);
        let mut chain: Vec<Arc<str>> = Vec::with_capacity(is_a.len() + 1);
        chain.push(id.clone());
        chain.extend(
            is_a.iter()
                .skip_while(|first| **first == type_id)
                .map(|ancestor| Arc::from(*ancestor)),
        );
        let entry = TypeEntry {
            type_id: id.clone(),
            is_a: Arc::from(chain),
            factory,
            kind,
            preserved,
        };

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.entry(id) {
            Entry::Occupied(_) => {
                debug!(type_id, "rejected duplicate registration");
                Err(Error::already_registered(type_id.to_string()))
            }
            Entry::Vacant(slot) => {
                debug!(type_id, ?kind, preserved, depth = is_a.len(), "registered type");
                slot.insert(Arc::new(entry));
                Ok(())
            }
        }
    }

    pub fn register_value_factory(
        &self,
        type_id: &str,
        factory: Factory,
        is_a: &[&str],
        preserved: bool,
    ) -> Result<(), Error> {
        self.register(type_id, factory, is_a, preserved, TypeKind::Value)
    }

    pub fn register_exception_factory(
        &self,
        type_id: &str,
        factory: Factory,
        is_a: &[&str],
        preserved: bool,
    ) -> Result<(), Error> {
        self.register(type_id, factory, is_a, preserved, TypeKind::Exception)
    }

    /// Total lookup; an unknown id is `None`, never an error.
    pub fn lookup(&self, type_id: &str) -> Option<Arc<TypeEntry>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(type_id)
            .cloned()
    }

    pub(crate) fn lookup_kind(&self, type_id: &str, kind: TypeKind) -> Option<Arc<TypeEntry>> {
        self.lookup(type_id).filter(|entry| entry.kind == kind)
    }

    pub fn is_a_chain_of(&self, type_id: &str) -> Option<Arc<[Arc<str>]>> {
        self.lookup(type_id).map(|entry| entry.is_a.clone())
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(type_id)
    }

    /// Number of registered types, the built-in placeholder included.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every user registration; the placeholder type stays available.
    ///
    /// Clearing and re-seeding happen under one write guard, so no reader
    /// ever observes a registry without the placeholder.
    pub fn shutdown(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let dropped = entries.len().saturating_sub(1);
        entries.clear();
        seed(&mut entries);
        drop(entries);
        debug!(dropped, "type registry shut down");
    }
}
