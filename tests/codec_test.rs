use lontar::storage::codec;
use lontar::storage::node::{BranchEntry, LeafEntry, Node, TreeKey};
use lontar::{Block, DataType, DatabaseError, Row, Value};

fn sample_leaf() -> Node {
    Node::Leaf(vec![
        LeafEntry::Row {
            row_id: 0,
            row: Row::new(vec![Value::Integer(12), Value::Text("Rogers".to_string())]),
        },
        LeafEntry::Row {
            row_id: 1,
            row: Row::new(vec![Value::Null, Value::Text("ünïcode".to_string())]),
        },
    ])
}

#[test]
fn test_node_bytes_are_stable() {
    let a = codec::encode_node(&sample_leaf());
    let b = codec::encode_node(&sample_leaf());
    assert_eq!(a, b);
    assert_eq!(Block::new(a).cid(), Block::new(b).cid());
}

#[test]
fn test_leaf_node_survives_decoding() {
    let node = sample_leaf();
    let decoded = codec::decode_node(&codec::encode_node(&node)).unwrap();
    assert_eq!(node, decoded);
}

#[test]
fn test_branch_node_survives_decoding() {
    let child = *Block::new(b"child".to_vec()).cid();
    let node = Node::Branch(vec![BranchEntry {
        key: TreeKey::Index {
            value: Value::Text("m".to_string()),
            row_id: 7,
        },
        child,
    }]);
    let decoded = codec::decode_node(&codec::encode_node(&node)).unwrap();
    assert_eq!(node, decoded);
}

#[test]
fn test_malformed_block_is_a_codec_error() {
    for bytes in [&[][..], &[0xFF][..], &[0x01, 9, 0, 0, 0][..]] {
        let err = codec::decode_node(bytes).unwrap_err();
        assert!(matches!(err, DatabaseError::Codec { .. }), "{:?}", bytes);
    }
}

#[test]
fn test_trailing_garbage_is_rejected() {
    let mut bytes = codec::encode_node(&sample_leaf());
    bytes.push(0);
    assert!(codec::decode_node(&bytes).is_err());
}

#[test]
fn test_index_key_orders_value_then_row_id() {
    let small = TreeKey::Index {
        value: Value::Integer(1),
        row_id: 9,
    };
    let large = TreeKey::Index {
        value: Value::Integer(2),
        row_id: 0,
    };
    let tie = TreeKey::Index {
        value: Value::Integer(1),
        row_id: 10,
    };
    assert_eq!(small.cmp_key(&large).unwrap(), std::cmp::Ordering::Less);
    assert_eq!(small.cmp_key(&tie).unwrap(), std::cmp::Ordering::Less);
}

#[test]
fn test_mixed_key_kinds_are_corruption() {
    let row_key = TreeKey::Row(1);
    let index_key = TreeKey::Index {
        value: Value::Integer(1),
        row_id: 1,
    };
    assert!(row_key.cmp_key(&index_key).is_err());
}

#[test]
fn test_typed_compare_rejects_cross_type_and_null() {
    assert!(Value::Integer(1).typed_cmp(&Value::Text("1".to_string())).is_err());
    assert!(Value::Integer(1).typed_cmp(&Value::Null).is_err());
    assert_eq!(
        Value::Text("a".to_string())
            .typed_cmp(&Value::Text("b".to_string()))
            .unwrap(),
        std::cmp::Ordering::Less
    );
}

#[test]
fn test_varchar_display_matches_declaration() {
    assert_eq!(DataType::Varchar(255).to_string(), "VARCHAR(255)");
    assert_eq!(DataType::Integer.to_string(), "INT");
}
