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
use crate::graph::{Instance, InstanceRef};
use std::collections::HashMap;
use tracing::trace;

/// Deferred work run once the target instance is complete.
pub type Patch = Box<dyn FnOnce(&Instance) -> Result<(), Error>>;

/// Queues patches against instances that are referenced before their slices
/// have been read (cycles, and every 1.0 field reference).
///
/// # Examples
///
/// ```rust
/// use marshal_core::resolver::patch_resolver::PatchResolver;
/// use marshal_core::graph::InstanceRef;
///
/// let mut patches = PatchResolver::default();
/// let target = InstanceRef::from_raw(0);
/// patches.defer(target, Box::new(|_| Ok(())));
/// assert!(patches.has_pending());
/// patches.clear();
/// assert!(!patches.has_pending());
/// ```
#[derive(Default)]
pub struct PatchResolver {
    patches: HashMap<InstanceRef, Vec<Patch>>,
}

impl PatchResolver {
    pub fn defer(&mut self, target: InstanceRef, patch: Patch) {
        trace!(?target, "deferred patch");
        self.patches.entry(target).or_default().push(patch);
    }

    /// Runs the patches of `target` in registration order, stopping at the
    /// first failure.
    pub fn resolve(&mut self, target: InstanceRef, instance: &Instance) -> Result<(), Error> {
        let Some(patches) = self.patches.remove(&target) else {
            return Ok(());
        };
        trace!(?target, count = patches.len(), "resolving patches");
        for patch in patches {
            patch(instance)?;
        }
        Ok(())
    }

    pub fn has_pending(&self) -> bool {
        !self.patches.is_empty()
    }

    pub fn pending_targets(&self) -> usize {
        self.patches.len()
    }

    pub fn clear(&mut self) {
        self.patches.clear();
    }
}
