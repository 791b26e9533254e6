//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Piper.
//! The Piper project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! Batch execution tests: stage semantics, ordering guarantees, and
//! cell-level error accumulation.

use std::collections::HashMap;

use piper::{Piper, PiperRecord, PiperValue};

fn build(script: &str) -> Piper {
    Piper::new(script, HashMap::new(), HashMap::new()).unwrap()
}

fn ints(n: &[i64]) -> Vec<PiperRecord> {
    n.iter().map(|&v| PiperRecord::new().with("x", v)).collect()
}

#[test]
fn projection_chain_and_field_order() {
    let piper = build(
        "p(x)\n\
         | project doubled = x * 2, shifted = doubled + 1\n\
         | project-rename input = x\n\
         ;",
    );
    let result = piper.process("p", ints(&[3])).unwrap();
    let row = &result.rows[0];
    let names: Vec<&str> = row.field_names().collect();
    assert_eq!(names, vec!["input", "doubled", "shifted"]);
    assert_eq!(row.get("doubled"), Some(&PiperValue::Int(6)));
    assert_eq!(row.get("shifted"), Some(&PiperValue::Int(7)));
}

#[test]
fn project_keep_reorders_and_restricts() {
    let piper = build("p(a, b, c)\n| project-keep c, a\n;");
    let result = piper
        .process(
            "p",
            PiperRecord::new().with("a", 1i64).with("b", 2i64).with("c", 3i64),
        )
        .unwrap();
    let names: Vec<&str> = result.rows[0].field_names().collect();
    assert_eq!(names, vec!["c", "a"]);
    assert!(result.rows[0].get("b").is_none());
}

#[test]
fn input_order_is_preserved() {
    let piper = build("p(x)\n| project y = x * 10\n;");
    let result = piper.process("p", ints(&[5, 1, 4, 2])).unwrap();
    let ys: Vec<&PiperValue> = result.rows.iter().filter_map(|r| r.get("y")).collect();
    assert_eq!(
        ys,
        vec![
            &PiperValue::Int(50),
            &PiperValue::Int(10),
            &PiperValue::Int(40),
            &PiperValue::Int(20)
        ]
    );
}

#[test]
fn cell_faults_null_one_field_only() {
    let piper = build("p(x)\n| project inv = 100 / x, tag = x + 1\n;");
    let result = piper.process("p", ints(&[4, 0, 2])).unwrap();
    assert_eq!(result.rows.len(), 3);

    // The faulting row keeps its other fields.
    assert_eq!(result.rows[1].get("inv"), Some(&PiperValue::Null));
    assert_eq!(result.rows[1].get("tag"), Some(&PiperValue::Int(1)));
    assert_eq!(result.rows[0].get("inv"), Some(&PiperValue::Int(25)));
    assert_eq!(result.rows[2].get("inv"), Some(&PiperValue::Int(50)));

    assert_eq!(result.errors.len(), 1);
    let error = &result.errors[0];
    assert_eq!(error.pipeline, "p");
    assert_eq!(error.row_index, 1);
    assert_eq!(error.field, "inv");
    assert!(error.message.contains("division by zero"), "{}", error.message);
}

#[test]
fn type_faults_are_reported_per_field() {
    let piper = build("p(x, s)\n| project bad = x + s, good = x\n;");
    let result = piper
        .process("p", PiperRecord::new().with("x", 1i64).with("s", "str"))
        .unwrap();
    assert_eq!(result.rows[0].get("bad"), Some(&PiperValue::Null));
    assert_eq!(result.rows[0].get("good"), Some(&PiperValue::Int(1)));
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].message.contains("cannot apply '+'"));
}

#[test]
fn where_filters_and_reindexes_errors() {
    let piper = build(
        "p(x)\n\
         | project inv = 10 / x\n\
         | where x > 1\n\
         | project flag = inv == 5\n\
         ;",
    );
    // x=0 faults on inv but is filtered out; its diagnostic goes with it.
    // x=2 survives at output index 0.
    let result = piper.process("p", ints(&[0, 2])).unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].get("flag"), Some(&PiperValue::Bool(true)));
    assert!(result.errors.is_empty());
}

#[test]
fn where_drops_non_bool_and_faulting_conditions() {
    let piper = build("p(x)\n| where 10 / x > 1\n;");
    // x=0 faults inside the condition and is dropped, not errored.
    let result = piper.process("p", ints(&[0, 5, 20])).unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].get("x"), Some(&PiperValue::Int(5)));
    assert!(result.errors.is_empty());
}

#[test]
fn take_truncates_after_filtering() {
    let piper = build("p(x)\n| where x > 10\n| take 2\n;");
    let result = piper.process("p", ints(&[5, 11, 12, 13, 14])).unwrap();
    let xs: Vec<&PiperValue> = result.rows.iter().filter_map(|r| r.get("x")).collect();
    assert_eq!(xs, vec![&PiperValue::Int(11), &PiperValue::Int(12)]);
}

#[test]
fn top_defaults_to_descending_nulls_last() {
    let piper = build("p(x)\n| project score = 10 / x\n| top 2 by score\n;");
    // x=0 faults the criteria, sinks to the null bucket, and is truncated
    // away together with its diagnostic.
    let result = piper.process("p", ints(&[5, 0, 1, 2])).unwrap();
    let xs: Vec<&PiperValue> = result.rows.iter().filter_map(|r| r.get("x")).collect();
    assert_eq!(xs, vec![&PiperValue::Int(1), &PiperValue::Int(2)]);
    assert!(result.errors.is_empty());
}

#[test]
fn top_honors_sort_order_and_null_position() {
    let piper = build("p(x)\n| top 3 by x asc nulls first\n;");
    let mut input = ints(&[3, 1, 2]);
    input.insert(1, PiperRecord::new());
    let result = piper.process("p", input).unwrap();
    let xs: Vec<&PiperValue> = result.rows.iter().map(|r| r.get("x").unwrap()).collect();
    assert_eq!(
        xs,
        vec![&PiperValue::Null, &PiperValue::Int(1), &PiperValue::Int(2)]
    );
}

#[test]
fn distinct_keeps_first_occurrences() {
    let piper = build("p(x)\n| distinct\n;");
    let result = piper.process("p", ints(&[1, 2, 1, 3, 2])).unwrap();
    let xs: Vec<&PiperValue> = result.rows.iter().filter_map(|r| r.get("x")).collect();
    assert_eq!(
        xs,
        vec![&PiperValue::Int(1), &PiperValue::Int(2), &PiperValue::Int(3)]
    );
}

#[test]
fn ignore_error_drops_faulted_rows() {
    let piper = build("p(x)\n| project inv = 10 / x\n| ignore-error\n;");
    let result = piper.process("p", ints(&[0, 5])).unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].get("inv"), Some(&PiperValue::Int(2)));
    assert!(result.errors.is_empty());
}

#[test]
fn int_overflow_is_a_cell_fault() {
    let piper = build("p(x)\n| project big = x * x, tag = x + 1\n;");
    let result = piper.process("p", ints(&[4_000_000_000])).unwrap();
    assert_eq!(result.rows[0].get("big"), Some(&PiperValue::Null));
    assert_eq!(result.rows[0].get("tag"), Some(&PiperValue::Int(4_000_000_001)));
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].field, "big");
    assert!(result.errors[0].message.contains("overflow"), "{}", result.errors[0].message);
}

#[test]
fn explode_fans_out_lists() {
    let piper = build("p(id, items)\n| explode items\n| project pair = string(id) + \":\" + string(items)\n;");
    let input = vec![
        PiperRecord::new().with("id", 1i64).with(
            "items",
            vec![PiperValue::Int(7), PiperValue::Int(8)],
        ),
        PiperRecord::new().with("id", 2i64).with("items", Vec::<PiperValue>::new()),
        PiperRecord::new().with("id", 3i64).with("items", "not a list"),
        PiperRecord::new().with("id", 4i64).with("items", vec![PiperValue::Int(9)]),
    ];
    let result = piper.process("p", input).unwrap();
    let pairs: Vec<&PiperValue> = result.rows.iter().filter_map(|r| r.get("pair")).collect();
    assert_eq!(
        pairs,
        vec![
            &PiperValue::from("1:7"),
            &PiperValue::from("1:8"),
            &PiperValue::from("4:9"),
        ]
    );
}

#[test]
fn errors_survive_removal_of_their_field() {
    let piper = build(
        "p(x)\n\
         | project bad = 1 / x\n\
         | project-remove bad\n\
         ;",
    );
    let result = piper.process("p", ints(&[0])).unwrap();
    assert!(result.rows[0].get("bad").is_none());
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].field, "bad");
    assert_eq!(result.errors[0].row_index, 0);
}

#[test]
fn empty_batch_is_fine() {
    let piper = build("p(x)\n| project y = x + 1\n;");
    let result = piper.process("p", Vec::<PiperRecord>::new()).unwrap();
    assert!(result.rows.is_empty());
    assert!(result.errors.is_empty());
}

#[test]
fn missing_input_fields_read_as_null() {
    let piper = build("p(x, y)\n| project has_y = y == null\n;");
    let result = piper.process("p", PiperRecord::new().with("x", 1i64)).unwrap();
    assert_eq!(result.rows[0].get("y"), Some(&PiperValue::Null));
    assert_eq!(result.rows[0].get("has_y"), Some(&PiperValue::Bool(true)));
}

#[test]
fn int_division_truncates_until_cast() {
    let piper = build("p(x)\n| project t = x / 4, d = double(x) / 4\n;");
    let result = piper.process("p", ints(&[10])).unwrap();
    assert_eq!(result.rows[0].get("t"), Some(&PiperValue::Int(2)));
    assert_eq!(result.rows[0].get("d"), Some(&PiperValue::Double(2.5)));
}
