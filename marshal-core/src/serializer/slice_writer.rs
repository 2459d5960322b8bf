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

use crate::buffer::wire_len;
use crate::error::Error;
use crate::graph::{Instance, InstanceGraph, InstanceRef};
use crate::resolver::context::WriteContext;
use crate::serializer::preserved::PreservedSlice;
use crate::types::{
    slice_flags, EncodingVersion, FormatType, NEW_INSTANCE, NULL_INSTANCE, OPTIONAL_END_MARKER,
};
use paste::paste;
use std::sync::Arc;
use tracing::{trace, warn};

/// Handle given to [`SliceSerializer::write_slice`](super::SliceSerializer::write_slice)
/// for one slice.
///
/// Required fields come first, tagged optional members (ascending tags)
/// after them.
pub struct SliceOutput<'a, 'g> {
    ctx: &'a mut WriteContext,
    graph: &'g InstanceGraph,
    table: Vec<InstanceRef>,
    last_tag: Option<u32>,
    has_optional_members: bool,
    in_optional: bool,
}

macro_rules! impl_write_primitive {
    ($($name:ident: $ty:ty),+ $(,)?) => {
        paste! {
            $(
                #[inline(always)]
                pub fn [<write_ $name>](&mut self, value: $ty) {
                    self.ctx.writer.[<write_ $name>](value);
                }
            )+
        }
    };
}

impl<'a, 'g> SliceOutput<'a, 'g> {
    fn new(ctx: &'a mut WriteContext, graph: &'g InstanceGraph) -> Self {
        SliceOutput {
            ctx,
            graph,
            table: Vec::new(),
            last_tag: None,
            has_optional_members: false,
            in_optional: false,
        }
    }

    impl_write_primitive!(
        u8: u8,
        i8: i8,
        bool: bool,
        u16: u16,
        i16: i16,
        u32: u32,
        i32: i32,
        u64: u64,
        i64: i64,
        f32: f32,
        f64: f64,
        varint32: i32,
        varuint32: u32,
        varint64: i64,
        varuint64: u64,
    );

    pub fn write_string(&mut self, value: &str) {
        self.ctx.writer.write_string(value);
    }

    /// Length-prefixed byte sequence.
    pub fn write_bytes(&mut self, value: &[u8]) {
        self.ctx.writer.write_varuint32(value.len() as u32);
        self.ctx.writer.write_bytes(value);
    }

    pub fn write_size(&mut self, size: usize) -> Result<(), Error> {
        let size = u32::try_from(size)
            .map_err(|_| Error::encode_error(format!("size {size} does not fit the wire")))?;
        self.ctx.writer.write_varuint32(size);
        Ok(())
    }

    pub fn encoding(&self) -> EncodingVersion {
        self.ctx.config().encoding()
    }

    /// Writes a reference to another instance of the same graph.
    ///
    /// The first reference to an instance carries its slices (inline, in the
    /// slice's indirection table, or in the 1.0 pending section); later ones
    /// only its index.
    pub fn write_instance(&mut self, instance: Option<InstanceRef>) -> Result<(), Error> {
        if self.in_optional {
            return Err(Error::unsupported(
                "instance references are not supported inside optional members",
            ));
        }
        if let Some(r) = instance {
            self.graph.instance(r)?;
        }
        let config = self.ctx.config();
        match (config.encoding(), config.format()) {
            (EncodingVersion::V1_0, _) => {
                let index = match instance {
                    Some(r) => self.ctx.instances.assign_pending(r),
                    None => 0,
                };
                self.ctx.writer.write_varuint32(index);
                Ok(())
            }
            (EncodingVersion::V1_1, FormatType::Compact) => {
                self.ctx.write_inline_instance(self.graph, instance)
            }
            (EncodingVersion::V1_1, FormatType::Sliced) => {
                let position = match instance {
                    None => 0,
                    Some(r) => match self.table.iter().position(|t| *t == r) {
                        Some(p) => p + 1,
                        None => {
                            self.table.push(r);
                            self.table.len()
                        }
                    },
                };
                self.ctx.writer.write_varuint32(position as u32);
                Ok(())
            }
        }
    }

    /// Writes a tagged optional member. Dropped silently under 1.0, which
    /// has no optional members.
    pub fn write_optional(
        &mut self,
        tag: u32,
        f: impl FnOnce(&mut SliceOutput<'a, 'g>) -> Result<(), Error>,
    ) -> Result<(), Error> {
        if self.ctx.config().encoding() == EncodingVersion::V1_0 {
            return Ok(());
        }
        if self.in_optional {
            return Err(Error::unsupported("optional members cannot be nested"));
        }
        if self.last_tag.is_some_and(|last| tag <= last) {
            return Err(Error::encode_error(format!(
                "optional tag {tag} written after tag {}",
                self.last_tag.unwrap_or_default()
            )));
        }
        let header = tag
            .checked_add(1)
            .ok_or_else(|| Error::encode_error(format!("optional tag {tag} is out of range")))?;
        self.ctx.writer.write_varuint32(header);
        let len_pos = self.ctx.writer.len();
        self.ctx.writer.write_u32(0);
        self.in_optional = true;
        let result = f(self);
        self.in_optional = false;
        result?;
        self.ctx.patch_size(len_pos)?;
        self.last_tag = Some(tag);
        self.has_optional_members = true;
        Ok(())
    }

    fn finish(self) -> (Vec<InstanceRef>, bool) {
        (self.table, self.has_optional_members)
    }
}

enum PlannedSlice<'i> {
    Known(&'i Arc<str>),
    Preserved(&'i PreservedSlice),
}

impl WriteContext {
    /// Encodes a value stream rooted at `root`.
    pub(crate) fn write_value_stream(
        &mut self,
        graph: &InstanceGraph,
        root: Option<InstanceRef>,
    ) -> Result<(), Error> {
        match self.config().encoding() {
            EncodingVersion::V1_0 => {
                let index = match root {
                    Some(r) => {
                        graph.instance(r)?;
                        self.instances.assign_pending(r)
                    }
                    None => 0,
                };
                self.writer.write_varuint32(index);
                self.write_pending(graph)
            }
            EncodingVersion::V1_1 => self.write_inline_instance(graph, root),
        }
    }

    /// 1.1 instance token, followed by the slices on first occurrence.
    pub(crate) fn write_inline_instance(
        &mut self,
        graph: &InstanceGraph,
        instance: Option<InstanceRef>,
    ) -> Result<(), Error> {
        let Some(r) = instance else {
            self.writer.write_varuint32(NULL_INSTANCE);
            return Ok(());
        };
        let (index, first) = self.instances.try_assign(r);
        if !first {
            self.writer.write_varuint32(index + 1);
            return Ok(());
        }
        self.writer.write_varuint32(NEW_INSTANCE);
        let value = graph.instance(r)?;
        self.inc_depth()?;
        self.write_slices(graph, value)?;
        self.dec_depth();
        Ok(())
    }

    /// 1.0 pending section: rounds of `count, (index, slices)*` until a
    /// round is empty.
    pub(crate) fn write_pending(&mut self, graph: &InstanceGraph) -> Result<(), Error> {
        loop {
            let batch = self.instances.take_pending();
            self.writer.write_varuint32(batch.len() as u32);
            if batch.is_empty() {
                return Ok(());
            }
            for r in batch {
                let index = self
                    .instances
                    .index_of(r)
                    .ok_or_else(|| Error::unknown("pending instance has no index"))?;
                self.writer.write_varuint32(index);
                let value = graph.instance(r)?;
                self.write_slices(graph, value)?;
            }
        }
    }

    fn plan<'i>(&self, instance: &'i Instance) -> Result<Vec<PlannedSlice<'i>>, Error> {
        let known: &[Arc<str>] = if instance.is_unknown() {
            &[]
        } else {
            &instance.entry().get_is_a()[..]
        };
        let preserved: &[PreservedSlice] = match instance.preserved() {
            Some(p) if self.config().can_preserve() => p.slices(),
            Some(p) => {
                warn!(
                    type_id = instance.most_derived_type_id(),
                    dropped = p.len(),
                    "preserved slices cannot be re-emitted in this layout"
                );
                &[]
            }
            None => &[],
        };
        let mut plan = Vec::with_capacity(known.len() + preserved.len());
        let mut preserved = preserved.iter().peekable();
        for type_id in known {
            while let Some(p) = preserved.next_if(|p| p.position <= plan.len()) {
                plan.push(PlannedSlice::Preserved(p));
            }
            plan.push(PlannedSlice::Known(type_id));
        }
        plan.extend(preserved.map(PlannedSlice::Preserved));
        if plan.is_empty() {
            return Err(Error::encode_error(format!(
                "value of unknown type `{}` has no slices to encode",
                instance.most_derived_type_id()
            )));
        }
        Ok(plan)
    }

    pub(crate) fn write_slices(
        &mut self,
        graph: &InstanceGraph,
        instance: &Instance,
    ) -> Result<(), Error> {
        let plan = self.plan(instance)?;
        let last = plan.len() - 1;
        for (i, slice) in plan.into_iter().enumerate() {
            match slice {
                PlannedSlice::Known(type_id) => {
                    self.write_known_slice(graph, instance, type_id, i == 0, i == last)?
                }
                PlannedSlice::Preserved(p) => self.write_preserved_slice(graph, p, i == last)?,
            }
        }
        if self.config().encoding() == EncodingVersion::V1_0 {
            self.type_ids.write_end(&mut self.writer);
        }
        Ok(())
    }

    fn write_known_slice(
        &mut self,
        graph: &InstanceGraph,
        instance: &Instance,
        type_id: &Arc<str>,
        first: bool,
        last: bool,
    ) -> Result<(), Error> {
        if self.config().encoding() == EncodingVersion::V1_0 {
            self.type_ids.write(&mut self.writer, type_id)?;
            let size_pos = self.writer.len();
            self.writer.write_u32(0);
            let mut output = SliceOutput::new(self, graph);
            instance.value.write_slice(type_id, &mut output)?;
            output.finish();
            return self.patch_size(size_pos);
        }

        let sliced = !self.config().is_compact();
        let flags_pos = self.writer.len();
        self.writer.write_u8(0);
        let mut flags = 0u8;
        if first || sliced {
            flags |= slice_flags::HAS_TYPE_ID;
            self.type_ids.write(&mut self.writer, type_id)?;
        }
        let size_pos = if sliced {
            flags |= slice_flags::HAS_SLICE_SIZE;
            let pos = self.writer.len();
            self.writer.write_u32(0);
            Some(pos)
        } else {
            None
        };
        let mut output = SliceOutput::new(self, graph);
        instance.value.write_slice(type_id, &mut output)?;
        let (table, has_optional_members) = output.finish();
        if has_optional_members {
            flags |= slice_flags::HAS_OPTIONAL_MEMBERS;
            self.writer.write_varuint32(OPTIONAL_END_MARKER);
        }
        if let Some(pos) = size_pos {
            self.patch_size(pos)?;
        }
        if !table.is_empty() {
            flags |= slice_flags::HAS_INDIRECTION_TABLE;
            self.write_indirection_table(graph, &table)?;
        }
        if last {
            flags |= slice_flags::IS_LAST_SLICE;
        }
        self.writer.set_u8(flags_pos, flags)
    }

    fn write_preserved_slice(
        &mut self,
        graph: &InstanceGraph,
        slice: &PreservedSlice,
        last: bool,
    ) -> Result<(), Error> {
        trace!(type_id = %slice.type_id, bytes = slice.bytes.len(), "re-emitting preserved slice");
        let mut flags = slice_flags::HAS_TYPE_ID | slice_flags::HAS_SLICE_SIZE;
        if slice.has_optional_members {
            flags |= slice_flags::HAS_OPTIONAL_MEMBERS;
        }
        if !slice.instances.is_empty() {
            flags |= slice_flags::HAS_INDIRECTION_TABLE;
        }
        if last {
            flags |= slice_flags::IS_LAST_SLICE;
        }
        self.writer.write_u8(flags);
        self.type_ids.write(&mut self.writer, &slice.type_id)?;
        self.writer
            .write_u32(wire_len(slice.bytes.len(), u32::MAX, "preserved slice")?);
        self.writer.write_bytes(&slice.bytes);
        if !slice.instances.is_empty() {
            self.write_indirection_table(graph, &slice.instances)?;
        }
        Ok(())
    }

    fn write_indirection_table(
        &mut self,
        graph: &InstanceGraph,
        table: &[InstanceRef],
    ) -> Result<(), Error> {
        self.writer.write_varuint32(table.len() as u32);
        for r in table {
            self.write_inline_instance(graph, Some(*r))?;
        }
        Ok(())
    }

    /// Back-patches the u32 at `pos` with the number of bytes written after it.
    pub(crate) fn patch_size(&mut self, pos: usize) -> Result<(), Error> {
        let size = wire_len(self.writer.len() - pos - 4, u32::MAX, "slice")?;
        self.writer.set_u32(pos, size)
    }
}
