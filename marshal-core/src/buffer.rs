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
use byteorder::{ByteOrder, LittleEndian};

/// Converts a length to its u32 wire form, rejecting lengths above `max`.
pub(crate) fn wire_len(len: usize, max: u32, what: &str) -> Result<u32, Error> {
    u32::try_from(len)
        .ok()
        .filter(|n| *n <= max)
        .ok_or_else(|| Error::encode_error(format!("{what} of {len} bytes is too large")))
}

/// Growable little-endian output buffer.
#[derive(Default)]
pub struct Writer {
    pub(crate) bf: Vec<u8>,
}

macro_rules! write_fixed {
    ($($name:ident, $ty:ty, $size:expr, $method:ident);+ $(;)?) => {
        $(
            pub fn $name(&mut self, value: $ty) {
                let mut buf = [0u8; $size];
                LittleEndian::$method(&mut buf, value);
                self.bf.extend_from_slice(&buf);
            }
        )+
    };
}

impl Writer {
    pub fn reset(&mut self) {
        // keep capacity and reset len to 0
        self.bf.clear();
    }

    pub fn shrink_to(&mut self, capacity: usize) {
        self.bf.shrink_to(capacity);
    }

    pub fn dump(&self) -> Vec<u8> {
        self.bf.clone()
    }

    pub fn len(&self) -> usize {
        self.bf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bf.is_empty()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.bf.reserve(additional);
    }

    pub fn write_bytes(&mut self, v: &[u8]) -> usize {
        self.bf.extend_from_slice(v);
        v.len()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bf.push(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.bf.push(value as u8);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.bf.push(value as u8);
    }

    write_fixed!(
        write_u16, u16, 2, write_u16;
        write_i16, i16, 2, write_i16;
        write_u32, u32, 4, write_u32;
        write_i32, i32, 4, write_i32;
        write_u64, u64, 8, write_u64;
        write_i64, i64, 8, write_i64;
        write_f32, f32, 4, write_f32;
        write_f64, f64, 8, write_f64;
    );

    /// Overwrites four bytes at `offset`; used to back-patch slice sizes.
    pub fn set_u32(&mut self, offset: usize, value: u32) -> Result<(), Error> {
        let len = self.bf.len();
        match self.bf.get_mut(offset..offset + 4) {
            Some(dst) => {
                LittleEndian::write_u32(dst, value);
                Ok(())
            }
            None => Err(Error::buffer_out_of_bound(offset, 4, len)),
        }
    }

    /// Overwrites one byte at `offset`; used to back-patch slice flags.
    pub fn set_u8(&mut self, offset: usize, value: u8) -> Result<(), Error> {
        let len = self.bf.len();
        match self.bf.get_mut(offset) {
            Some(dst) => {
                *dst = value;
                Ok(())
            }
            None => Err(Error::buffer_out_of_bound(offset, 1, len)),
        }
    }

    pub fn write_varint32(&mut self, value: i32) {
        let zigzag = ((value as i64) << 1) ^ ((value as i64) >> 31);
        self._write_varuint32(zigzag as u32)
    }

    pub fn write_varuint32(&mut self, value: u32) {
        self._write_varuint32(value)
    }

    fn _write_varuint32(&mut self, value: u32) {
        if value < 0x80 {
            self.write_u8(value as u8);
        } else if value < 0x4000 {
            // 2 bytes
            let u1 = ((value as u8) & 0x7F) | 0x80;
            let u2 = (value >> 7) as u8;
            self.write_u16(((u2 as u16) << 8) | u1 as u16);
        } else if value < 0x200000 {
            // 3 bytes
            let u1 = ((value as u8) & 0x7F) | 0x80;
            let u2 = (((value >> 7) as u8) & 0x7F) | 0x80;
            let u3 = (value >> 14) as u8;
            self.write_u16(((u2 as u16) << 8) | u1 as u16);
            self.write_u8(u3);
        } else if value < 0x10000000 {
            // 4 bytes
            let u1 = ((value as u8) & 0x7F) | 0x80;
            let u2 = (((value >> 7) as u8) & 0x7F) | 0x80;
            let u3 = (((value >> 14) as u8) & 0x7F) | 0x80;
            let u4 = (value >> 21) as u8;
            self.write_u32(
                ((u4 as u32) << 24) | ((u3 as u32) << 16) | ((u2 as u32) << 8) | u1 as u32,
            );
        } else {
            // 5 bytes
            let u1 = ((value as u8) & 0x7F) | 0x80;
            let u2 = (((value >> 7) as u8) & 0x7F) | 0x80;
            let u3 = (((value >> 14) as u8) & 0x7F) | 0x80;
            let u4 = (((value >> 21) as u8) & 0x7F) | 0x80;
            let u5 = (value >> 28) as u8;
            self.write_u32(
                ((u4 as u32) << 24) | ((u3 as u32) << 16) | ((u2 as u32) << 8) | u1 as u32,
            );
            self.write_u8(u5);
        }
    }

    pub fn write_varint64(&mut self, value: i64) {
        let zigzag = ((value << 1) ^ (value >> 63)) as u64;
        self.write_varuint64(zigzag)
    }

    pub fn write_varuint64(&mut self, mut value: u64) {
        // the ninth byte carries a full 8 bits
        for _ in 0..8 {
            if value < 0x80 {
                self.write_u8(value as u8);
                return;
            }
            self.write_u8(((value as u8) & 0x7F) | 0x80);
            value >>= 7;
        }
        self.write_u8(value as u8);
    }

    /// Length-prefixed UTF-8.
    pub fn write_string(&mut self, s: &str) {
        self.write_varuint32(s.len() as u32);
        self.write_bytes(s.as_bytes());
    }
}

/// Bounds-checked little-endian input cursor over a borrowed body.
pub struct Reader<'a> {
    pub(crate) bf: &'a [u8],
    pub(crate) cursor: usize,
}

macro_rules! read_fixed {
    ($($name:ident, $ty:ty, $size:expr, $method:ident);+ $(;)?) => {
        $(
            pub fn $name(&mut self) -> Result<$ty, Error> {
                let bytes = self.take($size)?;
                Ok(LittleEndian::$method(bytes))
            }
        )+
    };
}

impl<'a> Reader<'a> {
    pub fn new(bf: &'a [u8]) -> Reader<'a> {
        Reader { bf, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.bf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bf.is_empty()
    }

    pub fn get_cursor(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.bf.len() - self.cursor
    }

    pub fn set_cursor(&mut self, cursor: usize) -> Result<(), Error> {
        if cursor > self.bf.len() {
            return Err(Error::buffer_out_of_bound(cursor, 0, self.bf.len()));
        }
        self.cursor = cursor;
        Ok(())
    }

    #[inline]
    fn take(&mut self, len: usize) -> Result<&'a [u8], Error> {
        let end = self
            .cursor
            .checked_add(len)
            .filter(|end| *end <= self.bf.len())
            .ok_or_else(|| Error::buffer_out_of_bound(self.cursor, len, self.bf.len()))?;
        let s = &self.bf[self.cursor..end];
        self.cursor = end;
        Ok(s)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), Error> {
        self.take(len).map(|_| ())
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], Error> {
        self.take(len)
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        match self.bf.get(self.cursor) {
            Some(b) => {
                self.cursor += 1;
                Ok(*b)
            }
            None => Err(Error::buffer_out_of_bound(self.cursor, 1, self.bf.len())),
        }
    }

    pub fn read_i8(&mut self) -> Result<i8, Error> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_bool(&mut self) -> Result<bool, Error> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::malformed_stream(format!(
                "invalid boolean byte {other:#x}"
            ))),
        }
    }

    read_fixed!(
        read_u16, u16, 2, read_u16;
        read_i16, i16, 2, read_i16;
        read_u32, u32, 4, read_u32;
        read_i32, i32, 4, read_i32;
        read_u64, u64, 8, read_u64;
        read_i64, i64, 8, read_i64;
        read_f32, f32, 4, read_f32;
        read_f64, f64, 8, read_f64;
    );

    pub fn read_varuint32(&mut self) -> Result<u32, Error> {
        let mut encoded = 0u32;
        for shift in (0..28).step_by(7) {
            let b = self.read_u8()? as u32;
            encoded |= (b & 0x7F) << shift;
            if b < 0x80 {
                return Ok(encoded);
            }
        }
        let b4 = self.read_u8()? as u32;
        if b4 > 0x0F {
            return Err(Error::malformed_stream("varuint32 overflow"));
        }
        Ok(encoded | (b4 << 28))
    }

    pub fn read_varint32(&mut self) -> Result<i32, Error> {
        let encoded = self.read_varuint32()?;
        Ok(((encoded >> 1) as i32) ^ -((encoded & 1) as i32))
    }

    pub fn read_varuint64(&mut self) -> Result<u64, Error> {
        let mut var64 = 0u64;
        for shift in (0..56).step_by(7) {
            let b = self.read_u8()? as u64;
            var64 |= (b & 0x7F) << shift;
            if b < 0x80 {
                return Ok(var64);
            }
        }
        let b8 = self.read_u8()? as u64;
        Ok(var64 | (b8 << 56))
    }

    pub fn read_varint64(&mut self) -> Result<i64, Error> {
        let encoded = self.read_varuint64()?;
        Ok(((encoded >> 1) as i64) ^ -((encoded & 1) as i64))
    }

    pub fn read_string(&mut self) -> Result<String, Error> {
        let len = self.read_varuint32()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|e| Error::malformed_stream(format!("invalid utf-8 string: {e}")))
    }
}
