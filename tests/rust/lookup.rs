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

//! Lookup stage tests: extension, elimination, fan-out, and async sources.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use piper::{
    lookup_fn, Piper, PiperError, PiperLookupSource, PiperMapSource, PiperRecord, PiperValue,
    Result,
};

fn user_source() -> PiperMapSource {
    PiperMapSource::new()
        .with("1", PiperRecord::new().with("name", "John").with("age", 30i64))
        .with("4", PiperRecord::new().with("name", "Jill").with("age", 22i64))
}

fn build_with(sources: Vec<(&str, Arc<dyn PiperLookupSource>)>, script: &str) -> Piper {
    let lookups: HashMap<String, Arc<dyn PiperLookupSource>> = sources
        .into_iter()
        .map(|(n, s)| (n.to_string(), s))
        .collect();
    Piper::new(script, lookups, HashMap::new()).unwrap()
}

fn ids(values: &[i64]) -> Vec<PiperRecord> {
    values.iter().map(|&v| PiperRecord::new().with("id", v)).collect()
}

#[test]
fn single_match_extends_the_row() {
    let piper = build_with(
        vec![("users", Arc::new(user_source()))],
        "enrich(id)\n| lookup name, age from users on id\n;",
    );
    let result = piper.process("enrich", ids(&[1, 4])).unwrap();
    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.rows[0].get("name"), Some(&PiperValue::from("John")));
    assert_eq!(result.rows[0].get("age"), Some(&PiperValue::Int(30)));
    assert_eq!(result.rows[1].get("name"), Some(&PiperValue::from("Jill")));
    assert_eq!(result.rows[1].get("age"), Some(&PiperValue::Int(22)));
    assert!(result.errors.is_empty());
}

#[test]
fn zero_matches_eliminate_silently() {
    let piper = build_with(
        vec![("users", Arc::new(user_source()))],
        "enrich(id)\n| lookup name from users on id\n;",
    );
    let result = piper.process("enrich", ids(&[2, 1, 3])).unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].get("id"), Some(&PiperValue::Int(1)));
    assert!(result.errors.is_empty());
}

#[test]
fn multi_match_fans_out_in_source_order() {
    let orders = PiperMapSource::new()
        .with("7", PiperRecord::new().with("item", "first"))
        .with("7", PiperRecord::new().with("item", "second"))
        .with("7", PiperRecord::new().with("item", "third"));
    let piper = build_with(
        vec![("orders", Arc::new(orders))],
        "o(id, tag)\n| lookup item from orders on id\n;",
    );
    let result = piper
        .process("o", PiperRecord::new().with("id", 7i64).with("tag", "t"))
        .unwrap();
    let items: Vec<&PiperValue> = result.rows.iter().filter_map(|r| r.get("item")).collect();
    assert_eq!(
        items,
        vec![
            &PiperValue::from("first"),
            &PiperValue::from("second"),
            &PiperValue::from("third")
        ]
    );
    // Fanned rows are copies; each keeps the probing row's fields.
    for row in &result.rows {
        assert_eq!(row.get("tag"), Some(&PiperValue::from("t")));
    }
}

#[test]
fn fan_out_keeps_batch_order() {
    let orders = PiperMapSource::new()
        .with("1", PiperRecord::new().with("v", 10i64))
        .with("1", PiperRecord::new().with("v", 11i64))
        .with("2", PiperRecord::new().with("v", 20i64));
    let piper = build_with(
        vec![("orders", Arc::new(orders))],
        "o(id)\n| lookup v from orders on id\n;",
    );
    let result = piper.process("o", ids(&[2, 1])).unwrap();
    let vs: Vec<&PiperValue> = result.rows.iter().filter_map(|r| r.get("v")).collect();
    assert_eq!(
        vs,
        vec![&PiperValue::Int(20), &PiperValue::Int(10), &PiperValue::Int(11)]
    );
}

#[test]
fn output_renaming_reads_source_field() {
    let piper = build_with(
        vec![("users", Arc::new(user_source()))],
        "enrich(id)\n| lookup who = name, years = age from users on id\n;",
    );
    let result = piper.process("enrich", ids(&[4])).unwrap();
    assert_eq!(result.rows[0].get("who"), Some(&PiperValue::from("Jill")));
    assert_eq!(result.rows[0].get("years"), Some(&PiperValue::Int(22)));
    assert!(result.rows[0].get("name").is_none());
}

#[test]
fn key_fault_eliminates_the_row() {
    let piper = build_with(
        vec![("users", Arc::new(user_source()))],
        "enrich(id)\n| lookup name from users on 1 / id\n;",
    );
    // id=0 faults the key expression; only id=1 can match ("1" / 1 == 1).
    let result = piper.process("enrich", ids(&[0, 1])).unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].get("id"), Some(&PiperValue::Int(1)));
    assert!(result.errors.is_empty());
}

#[test]
fn source_error_eliminates_the_row() {
    let flaky = lookup_fn(|key, _fields| match key {
        PiperValue::Int(1) => Err(PiperError::external("backend unavailable")),
        key => Ok(vec![vec![key.clone()]]),
    });
    let piper = build_with(
        vec![("flaky", Arc::new(flaky))],
        "p(id)\n| lookup echo from flaky on id\n;",
    );
    let result = piper.process("p", ids(&[1, 2])).unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].get("echo"), Some(&PiperValue::Int(2)));
    assert!(result.errors.is_empty());
}

#[test]
fn short_source_rows_pad_with_null() {
    let stub = lookup_fn(|_key, _fields| Ok(vec![vec![PiperValue::Int(1)]]));
    let piper = build_with(
        vec![("stub", Arc::new(stub))],
        "p(id)\n| lookup a, b from stub on id\n;",
    );
    let result = piper.process("p", ids(&[9])).unwrap();
    assert_eq!(result.rows[0].get("a"), Some(&PiperValue::Int(1)));
    assert_eq!(result.rows[0].get("b"), Some(&PiperValue::Null));
}

#[derive(Debug)]
struct SuspendingSource;

#[async_trait]
impl PiperLookupSource for SuspendingSource {
    async fn lookup(&self, key: &PiperValue, fields: &[String]) -> Result<Vec<Vec<PiperValue>>> {
        // Actually yield to the scheduler before answering.
        tokio::task::yield_now().await;
        Ok(vec![fields
            .iter()
            .map(|f| PiperValue::from(format!("{}:{}", f, key.render())))
            .collect()])
    }
}

#[tokio::test]
async fn async_sources_are_awaited() {
    let piper = build_with(
        vec![("remote", Arc::new(SuspendingSource))],
        "p(id)\n| lookup a, b from remote on id\n;",
    );
    let result = piper.process_async("p", ids(&[5])).await.unwrap();
    assert_eq!(result.rows[0].get("a"), Some(&PiperValue::from("a:5")));
    assert_eq!(result.rows[0].get("b"), Some(&PiperValue::from("b:5")));
}

#[test]
fn chained_lookups_compose() {
    let cities = PiperMapSource::new()
        .with("John", PiperRecord::new().with("city", "London"))
        .with("Jill", PiperRecord::new().with("city", "Paris"));
    let piper = build_with(
        vec![
            ("users", Arc::new(user_source())),
            ("cities", Arc::new(cities)),
        ],
        "p(id)\n| lookup name from users on id\n| lookup city from cities on name\n;",
    );
    let result = piper.process("p", ids(&[1, 4])).unwrap();
    let cities: Vec<&PiperValue> = result.rows.iter().filter_map(|r| r.get("city")).collect();
    assert_eq!(cities, vec![&PiperValue::from("London"), &PiperValue::from("Paris")]);
}
