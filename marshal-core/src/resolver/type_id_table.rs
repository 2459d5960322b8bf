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

use crate::buffer::{wire_len, Reader, Writer};
use crate::error::Error;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

// header = len << 1 for a new string, ((id + 1) << 1) | 1 for a repeat.
// A zero header is the empty id, which ends a 1.0 slice chain.
const REPEAT_FLAG: u32 = 1;
const MAX_HEADER_VALUE: u32 = u32::MAX >> 1;

#[derive(Default)]
pub struct TypeIdWriter {
    written: HashMap<Arc<str>, u32>,
}

impl TypeIdWriter {
    pub fn write(&mut self, writer: &mut Writer, type_id: &Arc<str>) -> Result<(), Error> {
        let next_id = wire_len(self.written.len(), MAX_HEADER_VALUE - 1, "type id table")?;
        match self.written.entry(type_id.clone()) {
            Entry::Occupied(e) => {
                writer.write_varuint32(((*e.get() + 1) << 1) | REPEAT_FLAG);
            }
            Entry::Vacant(e) => {
                let len = wire_len(type_id.len(), MAX_HEADER_VALUE, "type id")?;
                e.insert(next_id);
                writer.write_varuint32(len << 1);
                writer.write_bytes(type_id.as_bytes());
            }
        }
        Ok(())
    }

    pub fn write_end(&mut self, writer: &mut Writer) {
        writer.write_varuint32(0);
    }

    pub fn clear(&mut self) {
        self.written.clear();
    }
}

#[derive(Default)]
pub struct TypeIdReader {
    read: Vec<Arc<str>>,
}

impl TypeIdReader {
    /// Returns `None` for the end-of-chain marker.
    pub fn read(&mut self, reader: &mut Reader) -> Result<Option<Arc<str>>, Error> {
        let header = reader.read_varuint32()?;
        if header & REPEAT_FLAG != 0 {
            let id = (header >> 1) as usize;
            return match id.checked_sub(1).and_then(|i| self.read.get(i)) {
                Some(type_id) => Ok(Some(type_id.clone())),
                None => Err(Error::malformed_stream(format!(
                    "type id reference {id} points past {} known ids",
                    self.read.len()
                ))),
            };
        }
        let len = (header >> 1) as usize;
        if len == 0 {
            return Ok(None);
        }
        let bytes = reader.read_bytes(len)?;
        let s = std::str::from_utf8(bytes)
            .map_err(|e| Error::malformed_stream(format!("type id is not utf-8: {e}")))?;
        let type_id: Arc<str> = Arc::from(s);
        self.read.push(type_id.clone());
        Ok(Some(type_id))
    }

    pub fn clear(&mut self) {
        self.read.clear();
    }
}
