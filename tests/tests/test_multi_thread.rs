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


use marshal::{DeclaredExceptionSet, EncodingVersion, FormatType, Marshal};
use std::sync::Arc;
use std::thread;
use test_helpers::*;

#[test]
fn test_values_multi_thread() {
    for (encoding, format) in LAYOUTS {
        let marshal = marshal_for(encoding, format);
        register_values(&marshal);
        let marshal = Arc::new(marshal);

        // encode
        let mut handles = vec![];
        for i in 0..16 {
            let marshal = Arc::clone(&marshal);
            handles.push(thread::spawn(move || {
                let mut graph = marshal.new_graph();
                let leaf = graph.insert(Node::new(i)).unwrap();
                let root = graph
                    .insert(Node {
                        value: i * 10,
                        left: Some(leaf),
                        right: Some(leaf),
                    })
                    .unwrap();
                (i, marshal.encode_instance(&graph, Some(root)).unwrap())
            }));
        }
        let encoded: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        // decode
        let mut handles = vec![];
        for (i, bytes) in encoded {
            let marshal = Arc::clone(&marshal);
            handles.push(thread::spawn(move || {
                let decoded = marshal.decode_instance(&bytes).unwrap();
                let graph = decoded.graph();
                let root = graph.value::<Node>(decoded.root().unwrap()).unwrap();
                assert_eq!(root.value, i * 10);
                assert_eq!(root.left, root.right);
                assert_eq!(graph.value::<Node>(root.left.unwrap()).unwrap().value, i);
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}

#[test]
fn test_exceptions_multi_thread() {
    let marshal = marshal_for(EncodingVersion::V1_1, FormatType::Sliced);
    register_all(&marshal);
    let marshal = Arc::new(marshal);
    let declared = Arc::new([EX_A_ID].into_iter().collect::<DeclaredExceptionSet>());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let marshal = Arc::clone(&marshal);
            let declared = Arc::clone(&declared);
            thread::spawn(move || {
                let exception = marshal
                    .new_exception(ExB {
                        base: ExA { a_mem: i },
                        b_mem: format!("thread {i}"),
                    })
                    .unwrap();
                let bytes = marshal.encode_exception(&exception).unwrap();
                let received = marshal.decode_exception(&bytes, &declared).unwrap();
                let exception = received.into_user().unwrap();
                assert_eq!(exception.value::<ExB>().unwrap().base.a_mem, i);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_register_while_decoding() {
    let marshal = Arc::new(Marshal::default());
    register_values(&marshal);
    let mut graph = marshal.new_graph();
    let b = graph.insert(B { b: 1, r: None }).unwrap();
    let bytes = Arc::new(marshal.encode_instance(&graph, Some(b)).unwrap());

    let decoders: Vec<_> = (0..4)
        .map(|_| {
            let marshal = Arc::clone(&marshal);
            let bytes = Arc::clone(&bytes);
            thread::spawn(move || {
                for _ in 0..100 {
                    assert!(marshal.decode_instance(&bytes).is_ok());
                }
            })
        })
        .collect();
    let registrar = {
        let marshal = Arc::clone(&marshal);
        thread::spawn(move || {
            for i in 0..100 {
                marshal
                    .register_value::<Node>(&format!("::Test::Extra{i}"), &[], false)
                    .unwrap();
            }
        })
    };
    for handle in decoders {
        handle.join().unwrap();
    }
    registrar.join().unwrap();
    assert!(marshal.registry().contains("::Test::Extra99"));
}
