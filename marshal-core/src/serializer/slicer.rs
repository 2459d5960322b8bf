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

//! Decoding side of slicing.
//!
//! Slices are read most derived first. The first slice whose type the
//! registry recognizes fixes the effective type; ancestor slices of that type
//! are read into the same value, anything else is skipped by its size and,
//! under the 1.1 sliced format, retained as a preserved slice. An unknown
//! slice without a size cannot be skipped, which ends slicing.

use crate::ensure;
use crate::error::Error;
use crate::graph::{Instance, InstanceRef};
use crate::resolver::context::ReadContext;
use crate::resolver::type_registry::TypeEntry;
use crate::serializer::exception::DeclaredExceptionSet;
use crate::serializer::preserved::{PreservedSlice, PreservedSlices, UnknownValue};
use crate::serializer::SliceSerializer;
use crate::types::{
    slice_flags, EncodingVersion, FormatType, TypeKind, NEW_INSTANCE, NULL_INSTANCE,
    OPTIONAL_END_MARKER, UNKNOWN_VALUE_TYPE_ID,
};
use paste::paste;
use std::sync::Arc;
use tracing::{debug, trace};

/// Handle given to [`SliceSerializer::read_slice`] for one slice.
pub struct SliceInput<'a, 'bf> {
    ctx: &'a mut ReadContext<'bf>,
    table: &'a [InstanceRef],
    has_optional_members: bool,
    in_optional: bool,
}

macro_rules! impl_read_primitive {
    ($($name:ident: $ty:ty),+ $(,)?) => {
        paste! {
            $(
                #[inline(always)]
                pub fn [<read_ $name>](&mut self) -> Result<$ty, Error> {
                    self.ctx.reader.[<read_ $name>]()
                }
            )+
        }
    };
}

impl<'a, 'bf> SliceInput<'a, 'bf> {
    fn new(
        ctx: &'a mut ReadContext<'bf>,
        table: &'a [InstanceRef],
        has_optional_members: bool,
    ) -> Self {
        SliceInput {
            ctx,
            table,
            has_optional_members,
            in_optional: false,
        }
    }

    impl_read_primitive!(
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
        string: String,
    );

    /// Length-prefixed byte sequence.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, Error> {
        let len = self.read_size()?;
        Ok(self.ctx.reader.read_bytes(len)?.to_vec())
    }

    /// Reads a sequence size; a size larger than the remaining input is
    /// rejected before anything is allocated.
    pub fn read_size(&mut self) -> Result<usize, Error> {
        let size = self.ctx.reader.read_varuint32()? as usize;
        let remaining = self.ctx.reader.remaining();
        ensure!(
            size <= remaining,
            Error::malformed_stream(format!(
                "size {size} exceeds the {remaining} remaining bytes"
            ))
        );
        Ok(size)
    }

    pub fn encoding(&self) -> EncodingVersion {
        self.ctx.config().encoding()
    }

    /// Reads a reference to another instance.
    ///
    /// The handle is returned at once, even when the target is still being
    /// decoded (cycles) or has not arrived yet (1.0 forward references).
    pub fn read_instance(&mut self) -> Result<Option<InstanceRef>, Error> {
        if self.in_optional {
            return Err(Error::unsupported(
                "instance references are not supported inside optional members",
            ));
        }
        let config = self.ctx.config();
        match (config.encoding(), config.format()) {
            (EncodingVersion::V1_0, _) => match self.ctx.reader.read_varuint32()? {
                0 => Ok(None),
                index => self.ctx.bind_index(index).map(Some),
            },
            (EncodingVersion::V1_1, FormatType::Compact) => self.ctx.read_inline_instance(),
            (EncodingVersion::V1_1, FormatType::Sliced) => {
                match self.ctx.reader.read_varuint32()? as usize {
                    0 => Ok(None),
                    position => self.table.get(position - 1).copied().map(Some).ok_or_else(|| {
                        Error::malformed_stream(format!(
                            "indirection position {position} outside a table of {}",
                            self.table.len()
                        ))
                    }),
                }
            }
        }
    }

    /// Reads a reference whose target must be an instance of `type_id`.
    ///
    /// When the target is not complete yet the check runs once it is.
    pub fn read_instance_of(&mut self, type_id: &str) -> Result<Option<InstanceRef>, Error> {
        let expected = type_id.to_string();
        self.read_instance_with(move |instance| {
            if instance.is_a(&expected) {
                Ok(())
            } else {
                Err(Error::type_error(format!(
                    "expected an instance of `{expected}`, found `{}`",
                    instance.most_derived_type_id()
                )))
            }
        })
    }

    /// Reads a reference and runs `patch` on the target once it is complete.
    pub fn read_instance_with(
        &mut self,
        patch: impl FnOnce(&Instance) -> Result<(), Error> + 'static,
    ) -> Result<Option<InstanceRef>, Error> {
        let Some(target) = self.read_instance()? else {
            return Ok(None);
        };
        match self.ctx.graph.get(target) {
            Some(instance) => patch(instance)?,
            None => self.ctx.patches.defer(target, Box::new(patch)),
        }
        Ok(Some(target))
    }

    /// Reads the optional member `tag` if the sender wrote it.
    ///
    /// Members with smaller tags that the codec did not ask for are skipped.
    pub fn read_optional<T>(
        &mut self,
        tag: u32,
        f: impl FnOnce(&mut SliceInput<'a, 'bf>) -> Result<T, Error>,
    ) -> Result<Option<T>, Error> {
        if !self.has_optional_members || self.in_optional {
            return Ok(None);
        }
        loop {
            let save = self.ctx.reader.get_cursor();
            let header = self.ctx.reader.read_varuint32()?;
            if header == OPTIONAL_END_MARKER || header - 1 > tag {
                self.ctx.reader.set_cursor(save)?;
                return Ok(None);
            }
            let len = self.ctx.reader.read_u32()? as usize;
            if header - 1 < tag {
                trace!(tag = header - 1, len, "skipping unread optional member");
                self.ctx.reader.skip(len)?;
                continue;
            }
            let start = self.ctx.reader.get_cursor();
            self.in_optional = true;
            let result = f(self);
            self.in_optional = false;
            let value = result?;
            let consumed = self.ctx.reader.get_cursor() - start;
            ensure!(
                consumed == len,
                Error::malformed_stream(format!(
                    "optional member {tag} declared {len} bytes but {consumed} were read"
                ))
            );
            return Ok(Some(value));
        }
    }

    fn skip_remaining_optionals(&mut self) -> Result<(), Error> {
        if !self.has_optional_members {
            return Ok(());
        }
        loop {
            let header = self.ctx.reader.read_varuint32()?;
            if header == OPTIONAL_END_MARKER {
                return Ok(());
            }
            let len = self.ctx.reader.read_u32()? as usize;
            self.ctx.reader.skip(len)?;
        }
    }
}

/// What a slice chain is being matched against.
pub(crate) enum ChainKind<'d> {
    Value,
    Exception(&'d DeclaredExceptionSet),
}

struct SliceHeader {
    type_id: Arc<str>,
    flags: u8,
    size: Option<u32>,
    start: usize,
    table: Vec<InstanceRef>,
    table_end: Option<usize>,
}

impl SliceHeader {
    fn is_last(&self) -> bool {
        self.flags & slice_flags::IS_LAST_SLICE != 0
    }

    fn has_optional_members(&self) -> bool {
        self.flags & slice_flags::HAS_OPTIONAL_MEMBERS != 0
    }
}

pub(crate) struct ChainRead {
    pub(crate) most_derived: Arc<str>,
    pub(crate) matched: Option<(Arc<TypeEntry>, Box<dyn SliceSerializer>)>,
    pub(crate) preserved: Vec<PreservedSlice>,
    /// An unknown slice had no size; the rest of the stream is unreadable.
    pub(crate) unskippable: bool,
}

/// Keeps unknown slices only for preserved effective types.
pub(crate) fn keep_preserved(
    entry: &TypeEntry,
    preserved: Vec<PreservedSlice>,
) -> Option<PreservedSlices> {
    if preserved.is_empty() {
        None
    } else if entry.is_preserved() {
        trace!(type_id = %entry.get_type_id(), slices = preserved.len(), "preserving slices");
        Some(PreservedSlices::new(preserved))
    } else {
        debug!(
            type_id = %entry.get_type_id(),
            discarded = preserved.len(),
            "discarding unknown slices of a non-preserved type"
        );
        None
    }
}

impl<'bf> ReadContext<'bf> {
    /// Decodes a value stream and returns its root.
    pub(crate) fn read_value_stream(&mut self) -> Result<Option<InstanceRef>, Error> {
        let root = match self.config().encoding() {
            EncodingVersion::V1_0 => {
                let root = match self.reader.read_varuint32()? {
                    0 => None,
                    index => Some(self.bind_index(index)?),
                };
                self.read_pending()?;
                root
            }
            EncodingVersion::V1_1 => self.read_inline_instance()?,
        };
        self.check_complete()?;
        let trailing = self.reader.remaining();
        ensure!(
            trailing == 0,
            Error::malformed_stream(format!(
                "{trailing} trailing bytes after the value stream"
            ))
        );
        Ok(root)
    }

    /// 1.1 instance token; a new instance's slices follow inline.
    pub(crate) fn read_inline_instance(&mut self) -> Result<Option<InstanceRef>, Error> {
        match self.reader.read_varuint32()? {
            NULL_INSTANCE => Ok(None),
            NEW_INSTANCE => {
                let slot = self.graph.reserve();
                let index = self.instances.bind_next(slot);
                trace!(index, "reading instance");
                self.inc_depth()?;
                let chain = self.read_chain(ChainKind::Value)?;
                self.complete_value(slot, chain)?;
                self.dec_depth();
                Ok(Some(slot))
            }
            token => self.instances.get(token - 1).map(Some),
        }
    }

    /// 1.0 pending section.
    pub(crate) fn read_pending(&mut self) -> Result<(), Error> {
        loop {
            let count = self.reader.read_varuint32()? as usize;
            if count == 0 {
                return Ok(());
            }
            ensure!(
                count <= self.reader.remaining(),
                Error::malformed_stream(format!(
                    "{count} pending instances cannot fit in {} bytes",
                    self.reader.remaining()
                ))
            );
            for _ in 0..count {
                let index = self.reader.read_varuint32()?;
                ensure!(
                    index != 0,
                    Error::malformed_stream("pending instance with null index")
                );
                let slot = self.bind_index(index)?;
                ensure!(
                    !self.graph.is_filled(slot),
                    Error::malformed_stream(format!("instance {index} encoded twice"))
                );
                let chain = self.read_chain(ChainKind::Value)?;
                self.complete_value(slot, chain)?;
            }
        }
    }

    fn match_entry(&self, type_id: &str, kind: &ChainKind<'_>) -> Option<Arc<TypeEntry>> {
        let registry = self.graph.registry();
        match kind {
            ChainKind::Value => registry
                .lookup_kind(type_id, TypeKind::Value)
                .filter(|entry| !entry.is_unknown_placeholder()),
            ChainKind::Exception(declared) => registry
                .lookup_kind(type_id, TypeKind::Exception)
                .filter(|entry| declared.matches(entry.get_is_a()).is_some()),
        }
    }

    /// Reads one slice chain, most derived first.
    pub(crate) fn read_chain(&mut self, kind: ChainKind<'_>) -> Result<ChainRead, Error> {
        let mut most_derived: Option<Arc<str>> = None;
        let mut matched: Option<(Arc<TypeEntry>, Box<dyn SliceSerializer>)> = None;
        let mut preserved = Vec::new();
        let mut next_known = 0usize;
        let mut position = 0usize;
        loop {
            let implied = matched
                .as_ref()
                .and_then(|(entry, _)| entry.get_is_a().get(next_known).cloned());
            let Some(mut header) = self.read_slice_header(implied)? else {
                break;
            };
            let most_derived_id = most_derived
                .get_or_insert_with(|| header.type_id.clone())
                .clone();

            let known_depth = matched
                .as_ref()
                .map(|(entry, _)| entry.depth_of(&header.type_id));
            match known_depth {
                None => match self.match_entry(&header.type_id, &kind) {
                    Some(entry) => {
                        if position > 0 {
                            debug!(
                                most_derived = %most_derived_id,
                                effective = %entry.get_type_id(),
                                "sliced to a known base"
                            );
                        }
                        let mut value = entry.create();
                        self.read_fields(&mut *value, &header)?;
                        next_known = 1;
                        matched = Some((entry, value));
                    }
                    None => {
                        if !self.skip_slice(&mut header, position, &mut preserved)? {
                            debug!(type_id = %header.type_id, "unknown slice has no size");
                            return Ok(ChainRead {
                                most_derived: most_derived_id,
                                matched: None,
                                preserved,
                                unskippable: true,
                            });
                        }
                    }
                },
                Some(Some(depth)) => {
                    if let Some((_, value)) = matched.as_mut() {
                        self.read_fields(&mut **value, &header)?;
                    }
                    next_known = depth + 1;
                }
                Some(None) => {
                    if !self.skip_slice(&mut header, position, &mut preserved)? {
                        return Err(Error::malformed_stream(format!(
                            "slice `{}` below `{}` cannot be skipped",
                            header.type_id,
                            most_derived_id
                        )));
                    }
                }
            }
            position += 1;
            if header.is_last() {
                break;
            }
        }
        let most_derived =
            most_derived.ok_or_else(|| Error::malformed_stream("instance without slices"))?;
        Ok(ChainRead {
            most_derived,
            matched,
            preserved,
            unskippable: false,
        })
    }

    fn read_slice_header(&mut self, implied: Option<Arc<str>>) -> Result<Option<SliceHeader>, Error> {
        if self.config().encoding() == EncodingVersion::V1_0 {
            let Some(type_id) = self.type_ids.read(&mut self.reader)? else {
                return Ok(None);
            };
            let size = self.reader.read_u32()?;
            return Ok(Some(SliceHeader {
                type_id,
                flags: slice_flags::HAS_TYPE_ID | slice_flags::HAS_SLICE_SIZE,
                size: Some(size),
                start: self.reader.get_cursor(),
                table: Vec::new(),
                table_end: None,
            }));
        }

        let flags = self.reader.read_u8()?;
        ensure!(
            flags & !slice_flags::KNOWN_MASK == 0,
            Error::malformed_stream(format!("unknown slice flags {flags:#04x}"))
        );
        let type_id = if flags & slice_flags::HAS_TYPE_ID != 0 {
            self.type_ids
                .read(&mut self.reader)?
                .ok_or_else(|| Error::malformed_stream("empty type id in slice header"))?
        } else {
            implied.ok_or_else(|| Error::malformed_stream("slice carries no type id"))?
        };
        let size = if flags & slice_flags::HAS_SLICE_SIZE != 0 {
            Some(self.reader.read_u32()?)
        } else {
            None
        };
        let start = self.reader.get_cursor();
        let mut header = SliceHeader {
            type_id,
            flags,
            size,
            start,
            table: Vec::new(),
            table_end: None,
        };
        if flags & slice_flags::HAS_INDIRECTION_TABLE != 0 {
            let Some(size) = size else {
                return Err(Error::malformed_stream(
                    "indirection table on a slice without size",
                ));
            };
            self.reader.skip(size as usize)?;
            header.table = self.read_indirection_table()?;
            header.table_end = Some(self.reader.get_cursor());
            self.reader.set_cursor(start)?;
        }
        Ok(Some(header))
    }

    fn read_indirection_table(&mut self) -> Result<Vec<InstanceRef>, Error> {
        let count = self.reader.read_varuint32()? as usize;
        ensure!(
            count != 0 && count <= self.reader.remaining(),
            Error::malformed_stream(format!("invalid indirection table size {count}"))
        );
        let mut table = Vec::with_capacity(count);
        for _ in 0..count {
            let entry = self
                .read_inline_instance()?
                .ok_or_else(|| Error::malformed_stream("null entry in indirection table"))?;
            table.push(entry);
        }
        Ok(table)
    }

    fn read_fields(
        &mut self,
        value: &mut dyn SliceSerializer,
        header: &SliceHeader,
    ) -> Result<(), Error> {
        let mut input = SliceInput::new(self, &header.table, header.has_optional_members());
        value.read_slice(&header.type_id, &mut input)?;
        input.skip_remaining_optionals()?;
        if let Some(size) = header.size {
            let consumed = self.reader.get_cursor() - header.start;
            ensure!(
                consumed == size as usize,
                Error::malformed_stream(format!(
                    "slice `{}` declared {size} bytes but {consumed} were read",
                    header.type_id
                ))
            );
        }
        if let Some(end) = header.table_end {
            self.reader.set_cursor(end)?;
        }
        Ok(())
    }

    /// Skips an unknown slice; returns false when it has no size.
    fn skip_slice(
        &mut self,
        header: &mut SliceHeader,
        position: usize,
        preserved: &mut Vec<PreservedSlice>,
    ) -> Result<bool, Error> {
        let Some(size) = header.size else {
            return Ok(false);
        };
        if self.config().can_preserve() {
            let bytes = self.reader.read_bytes(size as usize)?.to_vec();
            trace!(type_id = %header.type_id, position, bytes = bytes.len(), "retaining unknown slice");
            preserved.push(PreservedSlice {
                type_id: header.type_id.clone(),
                position,
                bytes,
                has_optional_members: header.has_optional_members(),
                instances: std::mem::take(&mut header.table),
            });
        } else {
            debug!(type_id = %header.type_id, size, "skipping unknown slice");
            self.reader.skip(size as usize)?;
        }
        if let Some(end) = header.table_end {
            self.reader.set_cursor(end)?;
        }
        Ok(true)
    }

    /// Turns a chain into an instance, fills its slot and runs the patches
    /// waiting for it.
    pub(crate) fn complete_value(&mut self, slot: InstanceRef, chain: ChainRead) -> Result<(), Error> {
        let ChainRead {
            most_derived,
            matched,
            preserved,
            unskippable,
        } = chain;
        if unskippable {
            return Err(Error::no_value_factory(most_derived.to_string()));
        }
        let (entry, value) = match matched {
            Some((entry, value)) => {
                if !self.config().is_slice_values() && *entry.get_type_id() != most_derived {
                    return Err(Error::no_value_factory(most_derived.to_string()));
                }
                (entry, value)
            }
            None => {
                if self.config().encoding() == EncodingVersion::V1_0
                    || !self.config().is_slice_values()
                {
                    return Err(Error::no_value_factory(most_derived.to_string()));
                }
                let entry = self
                    .graph
                    .registry()
                    .lookup(UNKNOWN_VALUE_TYPE_ID)
                    .ok_or_else(|| Error::unknown("placeholder value type is not registered"))?;
                debug!(type_id = %most_derived, "no slice recognized, using placeholder");
                let value: Box<dyn SliceSerializer> = Box::new(UnknownValue::new(&most_derived));
                (entry, value)
            }
        };
        let preserved = keep_preserved(&entry, preserved);
        let instance = Instance {
            value,
            entry,
            most_derived_id: most_derived,
            preserved,
        };
        self.graph.fill(slot, instance)?;
        let instance = self.graph.instance(slot)?;
        self.patches.resolve(slot, instance)
    }
}
