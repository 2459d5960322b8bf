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

//! Arena of decoded (or to-be-encoded) instances.
//!
//! Fields that point at other instances hold an [`InstanceRef`], a handle into
//! the [`InstanceGraph`] they belong to. Handle equality is reference
//! identity, so shared references and cycles need no interior mutability.

use crate::error::Error;
use crate::resolver::type_registry::{TypeEntry, TypeRegistry};
use crate::serializer::preserved::PreservedSlices;
use crate::serializer::SliceSerializer;
use crate::types::TypeKind;
use std::fmt;
use std::sync::Arc;

/// Handle of an instance inside an [`InstanceGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceRef(u32);

impl InstanceRef {
    pub fn from_raw(raw: u32) -> Self {
        InstanceRef(raw)
    }

    pub fn as_raw(self) -> u32 {
        self.0
    }
}

/// A value or exception together with what the receiver knows about its type.
pub struct Instance {
    pub(crate) value: Box<dyn SliceSerializer>,
    pub(crate) entry: Arc<TypeEntry>,
    pub(crate) most_derived_id: Arc<str>,
    pub(crate) preserved: Option<PreservedSlices>,
}

impl Instance {
    pub(crate) fn new(value: Box<dyn SliceSerializer>, entry: Arc<TypeEntry>) -> Self {
        Instance {
            value,
            most_derived_id: entry.get_type_id().clone(),
            entry,
            preserved: None,
        }
    }

    /// The most derived type this process recognizes.
    pub fn effective_type_id(&self) -> &str {
        self.entry.get_type_id()
    }

    /// The most derived type the sender used; may be unknown locally.
    pub fn most_derived_type_id(&self) -> &str {
        &self.most_derived_id
    }

    pub fn entry(&self) -> &Arc<TypeEntry> {
        &self.entry
    }

    pub fn is_a(&self, type_id: &str) -> bool {
        self.entry.is_a(type_id)
    }

    /// True for the placeholder built when no slice of a value was recognized.
    pub fn is_unknown(&self) -> bool {
        self.entry.is_unknown_placeholder()
    }

    pub fn preserved(&self) -> Option<&PreservedSlices> {
        self.preserved.as_ref()
    }

    pub fn value(&self) -> &dyn SliceSerializer {
        &*self.value
    }

    /// Downcast to the Rust type registered for the effective type.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        let value: &dyn SliceSerializer = &*self.value;
        value.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        let value: &mut dyn SliceSerializer = &mut *self.value;
        value.as_any_mut().downcast_mut::<T>()
    }

    /// Views the instance as `type_id`, which must be the effective type or
    /// one of its ancestors. Never reads bytes.
    pub fn try_cast<T: 'static>(&self, type_id: &str) -> Option<&T> {
        if !self.is_a(type_id) {
            return None;
        }
        self.value.upcast(type_id)?.downcast_ref::<T>()
    }

    pub fn cast<T: 'static>(&self, type_id: &str) -> Result<&T, Error> {
        self.try_cast(type_id).ok_or_else(|| {
            Error::invalid_cast(format!(
                "instance of `{}` (sent as `{}`) cannot be viewed as `{}`",
                self.effective_type_id(),
                self.most_derived_id,
                type_id
            ))
        })
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("effective_type_id", &self.effective_type_id())
            .field("most_derived_type_id", &self.most_derived_id)
            .field("value", &self.value)
            .field("preserved", &self.preserved)
            .finish()
    }
}

/// Arena of instances bound to the registry their types come from.
///
/// ```rust
/// use marshal_core::graph::InstanceGraph;
/// use marshal_core::resolver::type_registry::TypeRegistry;
/// use marshal_core::serializer::preserved::UnknownValue;
/// use std::sync::Arc;
///
/// let mut graph = InstanceGraph::new(Arc::new(TypeRegistry::new()));
/// let r = graph.insert(UnknownValue::default()).unwrap();
/// assert!(graph.get(r).unwrap().is_unknown());
/// ```
pub struct InstanceGraph {
    registry: Arc<TypeRegistry>,
    slots: Vec<Option<Instance>>,
}

impl InstanceGraph {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        InstanceGraph {
            registry,
            slots: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Adds a value whose type must be registered as a value type.
    pub fn insert<T: SliceSerializer>(&mut self, value: T) -> Result<InstanceRef, Error> {
        self.insert_boxed(Box::new(value))
    }

    pub fn insert_boxed(&mut self, value: Box<dyn SliceSerializer>) -> Result<InstanceRef, Error> {
        let type_id = value.registered_id();
        let entry = self
            .registry
            .lookup_kind(type_id, TypeKind::Value)
            .ok_or_else(|| {
                Error::type_error(format!("`{type_id}` is not registered as a value type"))
            })?;
        let slot = self.reserve();
        self.slots[slot.0 as usize] = Some(Instance::new(value, entry));
        Ok(slot)
    }

    pub fn get(&self, instance: InstanceRef) -> Option<&Instance> {
        self.slots.get(instance.0 as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, instance: InstanceRef) -> Option<&mut Instance> {
        self.slots.get_mut(instance.0 as usize)?.as_mut()
    }

    /// Like [`get`](Self::get) but a dangling handle is an error.
    pub fn instance(&self, instance: InstanceRef) -> Result<&Instance, Error> {
        self.get(instance).ok_or_else(|| {
            Error::invalid_ref(format!("instance handle {} is not populated", instance.0))
        })
    }

    pub fn value<T: 'static>(&self, instance: InstanceRef) -> Option<&T> {
        self.get(instance)?.downcast_ref::<T>()
    }

    pub fn value_mut<T: 'static>(&mut self, instance: InstanceRef) -> Option<&mut T> {
        self.get_mut(instance)?.downcast_mut::<T>()
    }

    pub fn is_a(&self, instance: InstanceRef, type_id: &str) -> bool {
        self.get(instance).is_some_and(|i| i.is_a(type_id))
    }

    pub fn most_derived_type_id(&self, instance: InstanceRef) -> Option<&str> {
        self.get(instance).map(Instance::most_derived_type_id)
    }

    pub fn try_cast<T: 'static>(&self, instance: InstanceRef, type_id: &str) -> Option<&T> {
        self.get(instance)?.try_cast(type_id)
    }

    pub fn cast<T: 'static>(&self, instance: InstanceRef, type_id: &str) -> Result<&T, Error> {
        self.instance(instance)?.cast(type_id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceRef, &Instance)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|inst| (InstanceRef(i as u32), inst)))
    }

    pub(crate) fn reserve(&mut self) -> InstanceRef {
        self.slots.push(None);
        InstanceRef((self.slots.len() - 1) as u32)
    }

    pub(crate) fn is_filled(&self, instance: InstanceRef) -> bool {
        self.get(instance).is_some()
    }

    pub(crate) fn fill(&mut self, slot: InstanceRef, instance: Instance) -> Result<(), Error> {
        match self.slots.get_mut(slot.0 as usize) {
            Some(s) if s.is_none() => {
                *s = Some(instance);
                Ok(())
            }
            Some(_) => Err(Error::malformed_stream(format!(
                "instance slot {} decoded twice",
                slot.0
            ))),
            None => Err(Error::invalid_ref(format!("no slot {}", slot.0))),
        }
    }

    /// Number of slots referenced but never decoded.
    pub(crate) fn unfilled(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }
}

impl fmt::Debug for InstanceGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceGraph")
            .field("slots", &self.slots)
            .finish()
    }
}

/// Result of decoding a value stream.
#[derive(Debug)]
pub struct DecodedInstance {
    pub(crate) graph: InstanceGraph,
    pub(crate) root: Option<InstanceRef>,
}

impl DecodedInstance {
    pub fn root(&self) -> Option<InstanceRef> {
        self.root
    }

    pub fn graph(&self) -> &InstanceGraph {
        &self.graph
    }

    pub fn root_instance(&self) -> Option<&Instance> {
        self.graph.get(self.root?)
    }

    pub fn into_parts(self) -> (InstanceGraph, Option<InstanceRef>) {
        (self.graph, self.root)
    }
}

/// A user exception with the graph of values its fields reference.
///
/// The exception itself is not part of the graph; it has no instance index.
#[derive(Debug)]
pub struct ExceptionInstance {
    pub(crate) instance: Instance,
    pub(crate) graph: InstanceGraph,
}

impl ExceptionInstance {
    /// Wraps `value`, whose type must be registered as an exception type.
    pub fn new<T: SliceSerializer>(registry: Arc<TypeRegistry>, value: T) -> Result<Self, Error> {
        let type_id = value.registered_id();
        let entry = registry
            .lookup_kind(type_id, TypeKind::Exception)
            .ok_or_else(|| {
                Error::type_error(format!("`{type_id}` is not registered as an exception type"))
            })?;
        Ok(ExceptionInstance {
            instance: Instance::new(Box::new(value), entry),
            graph: InstanceGraph::new(registry),
        })
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn graph(&self) -> &InstanceGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut InstanceGraph {
        &mut self.graph
    }

    pub fn effective_type_id(&self) -> &str {
        self.instance.effective_type_id()
    }

    pub fn most_derived_type_id(&self) -> &str {
        self.instance.most_derived_type_id()
    }

    pub fn is_a(&self, type_id: &str) -> bool {
        self.instance.is_a(type_id)
    }

    pub fn value<T: 'static>(&self) -> Option<&T> {
        self.instance.downcast_ref::<T>()
    }

    pub fn value_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.instance.downcast_mut::<T>()
    }

    pub fn try_cast<T: 'static>(&self, type_id: &str) -> Option<&T> {
        self.instance.try_cast(type_id)
    }

    pub fn cast<T: 'static>(&self, type_id: &str) -> Result<&T, Error> {
        self.instance.cast(type_id)
    }
}
