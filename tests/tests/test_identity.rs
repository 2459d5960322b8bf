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


use marshal::{EncodingVersion, Error, FormatType, InstanceGraph, InstanceRef, Marshal};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};
use test_helpers::*;

fn node(graph: &InstanceGraph, r: InstanceRef) -> &Node {
    graph.value::<Node>(r).unwrap()
}

/// Walks both graphs from their roots and checks that the mapping between
/// instances is a bijection preserving values and edges.
fn assert_isomorphic(
    left: &InstanceGraph,
    left_root: InstanceRef,
    right: &InstanceGraph,
    right_root: InstanceRef,
) -> usize {
    let mut mapping: HashMap<InstanceRef, InstanceRef> = HashMap::new();
    let mut reverse: HashMap<InstanceRef, InstanceRef> = HashMap::new();
    let mut queue = VecDeque::from([(left_root, right_root)]);
    while let Some((l, r)) = queue.pop_front() {
        if let Some(seen) = mapping.get(&l) {
            assert_eq!(*seen, r, "instance {l:?} decoded twice");
            continue;
        }
        assert!(reverse.insert(r, l).is_none(), "two instances merged into {r:?}");
        mapping.insert(l, r);
        let (ln, rn) = (node(left, l), node(right, r));
        assert_eq!(ln.value, rn.value);
        for (le, re) in [(ln.left, rn.left), (ln.right, rn.right)] {
            match (le, re) {
                (None, None) => {}
                (Some(le), Some(re)) => queue.push_back((le, re)),
                other => panic!("edge mismatch: {other:?}"),
            }
        }
    }
    mapping.len()
}

fn marshals() -> Vec<Marshal> {
    LAYOUTS
        .iter()
        .map(|(encoding, format)| {
            let marshal = marshal_for(*encoding, *format);
            register_values(&marshal);
            marshal
        })
        .collect()
}

#[test]
fn test_shared_reference() {
    for marshal in marshals() {
        let mut graph = marshal.new_graph();
        let shared = graph.insert(Node::new(2)).unwrap();
        let root = graph
            .insert(Node {
                value: 1,
                left: Some(shared),
                right: Some(shared),
            })
            .unwrap();
        let bytes = marshal.encode_instance(&graph, Some(root)).unwrap();
        let decoded = marshal.decode_instance(&bytes).unwrap();
        let root = decoded.root().unwrap();
        let back = node(decoded.graph(), root);
        assert_eq!(back.left, back.right);
        assert_ne!(back.left, Some(root));
        assert_eq!(decoded.graph().len(), 2);
    }
}

#[test]
fn test_self_cycle() {
    for marshal in marshals() {
        let mut graph = marshal.new_graph();
        let a = graph.insert(Node::new(7)).unwrap();
        graph.value_mut::<Node>(a).unwrap().left = Some(a);
        let bytes = marshal.encode_instance(&graph, Some(a)).unwrap();
        let decoded = marshal.decode_instance(&bytes).unwrap();
        let root = decoded.root().unwrap();
        let back = node(decoded.graph(), root);
        assert_eq!(back.value, 7);
        assert_eq!(back.left, Some(root));
        assert_eq!(back.right, None);
    }
}

#[test]
fn test_two_cycle() {
    for marshal in marshals() {
        let mut graph = marshal.new_graph();
        let a = graph.insert(Node::new(1)).unwrap();
        let b = graph
            .insert(Node {
                value: 2,
                left: Some(a),
                right: None,
            })
            .unwrap();
        graph.value_mut::<Node>(a).unwrap().right = Some(b);
        let bytes = marshal.encode_instance(&graph, Some(a)).unwrap();
        let decoded = marshal.decode_instance(&bytes).unwrap();
        let root = decoded.root().unwrap();
        let b = node(decoded.graph(), root).right.unwrap();
        assert_eq!(node(decoded.graph(), b).left, Some(root));
    }
}

#[test]
fn test_null_root() {
    for marshal in marshals() {
        let graph = marshal.new_graph();
        let bytes = marshal.encode_instance(&graph, None).unwrap();
        let decoded = marshal.decode_instance(&bytes).unwrap();
        assert!(decoded.root().is_none());
        assert!(decoded.graph().is_empty());
    }
}

#[test]
fn test_shared_across_inheritance_levels() {
    for marshal in marshals() {
        let mut graph = marshal.new_graph();
        let shared = graph.insert(Node::new(5)).unwrap();
        let d1 = graph
            .insert(D1 {
                base: B {
                    b: 1,
                    r: Some(shared),
                },
                sd1: "d1".to_string(),
                pd1: Some(shared),
            })
            .unwrap();
        let bytes = marshal.encode_instance(&graph, Some(d1)).unwrap();
        let decoded = marshal.decode_instance(&bytes).unwrap();
        let d1 = decoded.graph().value::<D1>(decoded.root().unwrap()).unwrap();
        assert_eq!(d1.pd1, d1.base.r);
        assert_eq!(decoded.graph().value::<Node>(d1.pd1.unwrap()).unwrap().value, 5);
    }
}

#[test]
fn test_random_graphs() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for marshal in marshals() {
        for _ in 0..20 {
            let n = rng.gen_range(1..40);
            let mut graph = marshal.new_graph();
            let refs: Vec<InstanceRef> = (0..n)
                .map(|i| graph.insert(Node::new(i)).unwrap())
                .collect();
            for r in &refs {
                let left = rng.gen_bool(0.7).then(|| refs[rng.gen_range(0..refs.len())]);
                let right = rng.gen_bool(0.7).then(|| refs[rng.gen_range(0..refs.len())]);
                let node = graph.value_mut::<Node>(*r).unwrap();
                node.left = left;
                node.right = right;
            }
            let bytes = marshal.encode_instance(&graph, Some(refs[0])).unwrap();
            let decoded = marshal.decode_instance(&bytes).unwrap();
            let reachable = assert_isomorphic(
                &graph,
                refs[0],
                decoded.graph(),
                decoded.root().unwrap(),
            );
            assert_eq!(reachable, decoded.graph().len());
        }
    }
}

#[test]
fn test_max_depth() {
    for marshal in marshals() {
        let marshal = marshal.max_depth(5);
        let mut graph = marshal.new_graph();
        let mut next = None;
        for i in 0..20 {
            let r = graph
                .insert(Node {
                    value: i,
                    left: next,
                    right: None,
                })
                .unwrap();
            next = Some(r);
        }
        let result = marshal.encode_instance(&graph, next);
        if marshal.config().encoding() == EncodingVersion::V1_0 {
            // 1.0 never nests instances
            let bytes = result.unwrap();
            assert!(marshal.decode_instance(&bytes).is_ok());
        } else {
            assert!(matches!(result, Err(Error::DepthExceed(_))));
        }
    }
}

#[test]
fn test_pooled_context_is_clean_after_error() {
    let marshal = marshal_for(EncodingVersion::V1_1, FormatType::Compact);
    register_values(&marshal);
    let marshal = marshal.max_depth(2);
    let mut graph = marshal.new_graph();
    let c = graph.insert(Node::new(3)).unwrap();
    let b = graph
        .insert(Node {
            value: 2,
            left: Some(c),
            right: None,
        })
        .unwrap();
    let a = graph
        .insert(Node {
            value: 1,
            left: Some(b),
            right: None,
        })
        .unwrap();
    assert!(marshal.encode_instance(&graph, Some(a)).is_err());
    let first = marshal.encode_instance(&graph, Some(b)).unwrap();
    let second = marshal.encode_instance(&graph, Some(b)).unwrap();
    assert_eq!(first, second);
}
