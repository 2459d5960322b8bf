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

//! Reuse of per-operation encode state across calls and threads.
//!
//! Items are spread over a fixed number of segments so that threads rarely
//! contend on the same lock. An item is reset before it goes back to its
//! segment, also when the operation failed, so a borrower always starts from
//! a clean state.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, PoisonError};

const SEGMENTS: usize = 16;

/// Idle items kept per segment; extra items are dropped on return.
const MAX_IDLE_PER_SEGMENT: usize = 4;

thread_local! {
    static SEGMENT: usize = {
        let mut hasher = DefaultHasher::new();
        std::thread::current().id().hash(&mut hasher);
        hasher.finish() as usize % SEGMENTS
    };
}

/// State that can be cleared for the next borrower.
pub trait Reset {
    fn reset(&mut self);
}

pub struct Pool<T: Reset> {
    segments: [Mutex<Vec<T>>; SEGMENTS],
    factory: fn() -> T,
}

impl<T: Reset> Pool<T> {
    pub fn new(factory: fn() -> T) -> Self {
        Pool {
            segments: std::array::from_fn(|_| Mutex::new(Vec::new())),
            factory,
        }
    }

    /// Runs `handler` on a pooled item, creating one when the segment is empty.
    ///
    /// The item is reset before it is returned. An item whose handler panics
    /// is dropped instead.
    pub fn with<R>(&self, handler: impl FnOnce(&mut T) -> R) -> R {
        let segment = SEGMENT.with(|s| *s);
        let mut item = self.segments[segment]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_else(self.factory);
        let result = handler(&mut item);
        self.give_back(segment, item);
        result
    }

    fn give_back(&self, segment: usize, mut item: T) {
        item.reset();
        let mut idle = self.segments[segment]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if idle.len() < MAX_IDLE_PER_SEGMENT {
            idle.push(item);
        }
    }

    #[cfg(test)]
    fn idle(&self) -> usize {
        self.segments
            .iter()
            .map(|s| s.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }
}
