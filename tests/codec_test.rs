//! Cache payload codec properties.

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use rowcache::services::codec::{deserialize, serialize, PayloadFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CachedRow {
    id: Uuid,
    name: String,
    score: f64,
    count: i64,
    due: DateTime<Utc>,
    note: Option<String>,
    flags: Vec<bool>,
    labels: BTreeMap<String, u32>,
}

fn row() -> impl Strategy<Value = CachedRow> {
    (
        any::<u128>(),
        ".{0,24}",
        -1.0e12..1.0e12_f64,
        any::<i64>(),
        0_i64..4_102_444_800,
        proptest::option::of("[a-z ]{0,12}"),
        prop::collection::vec(any::<bool>(), 0..6),
        prop::collection::btree_map("[a-z]{1,5}", any::<u32>(), 0..4),
    )
        .prop_map(|(id, name, score, count, due, note, flags, labels)| CachedRow {
            id: Uuid::from_u128(id),
            name,
            score,
            count,
            due: Utc.timestamp_opt(due, 0).single().unwrap(),
            note,
            flags,
            labels,
        })
}

proptest! {
    /// Property: any row decodes to exactly what was encoded.
    #[test]
    fn prop_row_round_trips(row in row()) {
        let encoded = serialize(&row).unwrap();
        prop_assert_eq!(encoded.format, PayloadFormat::MessagePack);
        let decoded: CachedRow = deserialize(&encoded.bytes).unwrap();
        prop_assert_eq!(decoded, row);
    }

    /// Property: lists of rows, as cached by list queries, round trip too.
    #[test]
    fn prop_row_lists_round_trip(rows in prop::collection::vec(row(), 0..5)) {
        let encoded = serialize(&rows).unwrap();
        let decoded: Vec<CachedRow> = deserialize(&encoded.bytes).unwrap();
        prop_assert_eq!(decoded, rows);
    }
}

#[test]
fn test_unknown_tag_and_empty_payload_fail() {
    assert!(deserialize::<String>(&[]).is_err());
    assert!(deserialize::<String>(&[0x7f, 1, 2]).is_err());
}
