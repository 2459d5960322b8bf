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


use marshal::{EncodingVersion, Error, FormatType, Marshal};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use test_helpers::*;

fn registered(encoding: EncodingVersion, format: FormatType) -> Marshal {
    let marshal = marshal_for(encoding, format);
    register_all(&marshal);
    marshal
}

fn encode_b(marshal: &Marshal, self_ref: bool) -> Vec<u8> {
    let mut graph = marshal.new_graph();
    let b = graph.insert(B { b: 5, r: None }).unwrap();
    if self_ref {
        graph.value_mut::<B>(b).unwrap().r = Some(b);
    }
    marshal.encode_instance(&graph, Some(b)).unwrap()
}

fn encode_d1(marshal: &Marshal) -> Vec<u8> {
    let mut graph = marshal.new_graph();
    let shared = graph.insert(Node::new(1)).unwrap();
    let d1 = graph
        .insert(D1 {
            base: B {
                b: 2,
                r: Some(shared),
            },
            sd1: "d1".to_string(),
            pd1: Some(shared),
        })
        .unwrap();
    marshal.encode_instance(&graph, Some(d1)).unwrap()
}

// Offset of the u32 slice size in a 1.1 sliced encoding of `B`:
// instance token, flags, type id length, type id.
const B_SIZE_OFFSET: usize = 3 + B_ID.len();

#[test]
fn test_truncated_input() {
    for (encoding, format) in LAYOUTS {
        let marshal = registered(encoding, format);
        let bytes = encode_d1(&marshal);
        for len in 0..bytes.len() {
            let err = marshal.decode_instance(&bytes[..len]).unwrap_err();
            assert!(
                err.is_malformed_stream(),
                "{encoding:?}/{format:?} prefix {len}: {err}"
            );
        }
        assert!(marshal.decode_instance(&bytes).is_ok());
    }
}

#[test]
fn test_trailing_bytes() {
    for (encoding, format) in LAYOUTS {
        let marshal = registered(encoding, format);
        let mut bytes = encode_d1(&marshal);
        bytes.push(0);
        let err = marshal.decode_instance(&bytes).unwrap_err();
        assert!(matches!(err, Error::MalformedStream(_)));
    }
}

#[test]
fn test_unknown_slice_flags() {
    let marshal = registered(EncodingVersion::V1_1, FormatType::Sliced);
    let mut bytes = encode_b(&marshal, false);
    bytes[1] |= 0x80;
    let err = marshal.decode_instance(&bytes).unwrap_err();
    assert!(matches!(err, Error::MalformedStream(_)));
}

#[test]
fn test_slice_size_mismatch() {
    let marshal = registered(EncodingVersion::V1_1, FormatType::Sliced);
    let bytes = encode_b(&marshal, false);
    assert_eq!(bytes[B_SIZE_OFFSET], 5);

    let mut larger = bytes.clone();
    larger[B_SIZE_OFFSET] = 6;
    let err = marshal.decode_instance(&larger).unwrap_err();
    assert!(matches!(err, Error::MalformedStream(_)));

    let mut smaller = bytes;
    smaller[B_SIZE_OFFSET] = 4;
    let err = marshal.decode_instance(&smaller).unwrap_err();
    assert!(matches!(err, Error::MalformedStream(_)));
}

#[test]
fn test_unassigned_instance_index() {
    let marshal = registered(EncodingVersion::V1_1, FormatType::Compact);
    let mut bytes = encode_b(&marshal, true);
    // self reference: index 1 encoded as 2
    assert_eq!(bytes.last(), Some(&2));
    *bytes.last_mut().unwrap() = 7;
    let err = marshal.decode_instance(&bytes).unwrap_err();
    assert!(matches!(err, Error::InvalidRef(_)));
}

#[test]
fn test_indirection_position_out_of_table() {
    let marshal = registered(EncodingVersion::V1_1, FormatType::Sliced);
    let mut bytes = encode_b(&marshal, true);
    // fields: i32, then the table position of `r`
    let position = B_SIZE_OFFSET + 4 + 4;
    assert_eq!(bytes[position], 1);
    bytes[position] = 5;
    let err = marshal.decode_instance(&bytes).unwrap_err();
    assert!(matches!(err, Error::MalformedStream(_)));
}

#[test]
fn test_dangling_1_0_reference() {
    let marshal = registered(EncodingVersion::V1_0, FormatType::Sliced);
    // root index 1, empty pending section
    let err = marshal.decode_instance(&[1, 0]).unwrap_err();
    assert!(matches!(err, Error::InvalidRef(_)));
    // index no remaining bytes could satisfy
    let err = marshal.decode_instance(&[100, 0]).unwrap_err();
    assert!(matches!(err, Error::InvalidRef(_)));
}

#[test]
fn test_duplicate_1_0_body() {
    let marshal = registered(EncodingVersion::V1_0, FormatType::Sliced);
    let bytes = encode_b(&marshal, false);
    // root index, round of one, index 1, chain, empty round
    assert_eq!(&bytes[..3], &[1, 1, 1]);
    assert_eq!(bytes.last(), Some(&0));
    let chain = &bytes[3..bytes.len() - 1];

    let mut twice = vec![1, 2, 1];
    twice.extend_from_slice(chain);
    twice.push(1);
    twice.extend_from_slice(chain);
    twice.push(0);
    let err = marshal.decode_instance(&twice).unwrap_err();
    assert!(matches!(err, Error::MalformedStream(_)));
}

#[test]
fn test_empty_input() {
    for (encoding, format) in LAYOUTS {
        let marshal = registered(encoding, format);
        let err = marshal.decode_instance(&[]).unwrap_err();
        assert!(err.is_malformed_stream());
    }
}

#[test]
fn test_random_input_never_panics() {
    let mut rng = StdRng::seed_from_u64(42);
    for (encoding, format) in LAYOUTS {
        let marshal = registered(encoding, format);
        for _ in 0..2000 {
            let len = rng.gen_range(0..64);
            let bytes: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            let _ = marshal.decode_instance(&bytes);
        }
        let valid = encode_d1(&marshal);
        for _ in 0..2000 {
            let mut bytes = valid.clone();
            let at = rng.gen_range(0..bytes.len());
            bytes[at] = rng.gen();
            let _ = marshal.decode_instance(&bytes);
        }
    }
}
