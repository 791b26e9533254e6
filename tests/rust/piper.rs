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

//! Instance-level tests: the dual sync/async surface, snapshots, and
//! concurrent sharing.

use std::collections::HashMap;
use std::sync::Arc;

use piper::{
    unary_fn, Piper, PiperError, PiperFunction, PiperLookupSource, PiperMapSource, PiperRecord,
    PiperValue,
};

const SCRIPT: &str = "enrich(id, score)\n\
                      | project rank = score * 2 + 1, bad = 1 / (score - score)\n\
                      | lookup name from users on id\n\
                      ;";

fn lookups() -> HashMap<String, Arc<dyn PiperLookupSource>> {
    let users = PiperMapSource::new()
        .with("1", PiperRecord::new().with("name", "John"))
        .with("4", PiperRecord::new().with("name", "Jill"));
    let mut map: HashMap<String, Arc<dyn PiperLookupSource>> = HashMap::new();
    map.insert("users".to_string(), Arc::new(users));
    map
}

fn functions() -> HashMap<String, Arc<dyn PiperFunction>> {
    HashMap::new()
}

fn batch() -> Vec<PiperRecord> {
    vec![
        PiperRecord::new().with("id", 1i64).with("score", 10i64),
        PiperRecord::new().with("id", 2i64).with("score", 20i64),
        PiperRecord::new().with("id", 4i64).with("score", 30i64),
    ]
}

#[tokio::test]
async fn sync_and_async_results_are_identical() {
    let piper = Piper::new(SCRIPT, lookups(), functions()).unwrap();
    let sync_result = {
        let piper = Piper::new(SCRIPT, lookups(), functions()).unwrap();
        tokio::task::spawn_blocking(move || piper.process("enrich", batch()).unwrap())
            .await
            .unwrap()
    };
    let async_result = piper.process_async("enrich", batch()).await.unwrap();
    assert_eq!(sync_result, async_result);
    // Both carry the expected diagnostics, one per surviving row.
    assert_eq!(async_result.rows.len(), 2);
    assert_eq!(async_result.errors.len(), 2);
}

#[test]
fn repeated_calls_are_independent() {
    let piper = Piper::new(SCRIPT, lookups(), functions()).unwrap();
    let first = piper.process("enrich", batch()).unwrap();
    let second = piper.process("enrich", batch()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn snapshot_restores_to_equivalent_instance() {
    let piper = Piper::new(SCRIPT, lookups(), functions()).unwrap();
    let bytes = piper.snapshot().unwrap();

    let restored = Piper::restore(&bytes, lookups(), functions()).unwrap();
    assert_eq!(piper.pipelines(), restored.pipelines());
    assert_eq!(
        piper.process("enrich", batch()).unwrap(),
        restored.process("enrich", batch()).unwrap()
    );
}

#[test]
fn restore_validates_like_new() {
    let piper = Piper::new(SCRIPT, lookups(), functions()).unwrap();
    let bytes = piper.snapshot().unwrap();

    // The script references the users source; restoring without it fails.
    let err = Piper::restore(&bytes, HashMap::new(), functions()).unwrap_err();
    assert!(matches!(err, PiperError::LookupSourceNotFound(name) if name == "users"));

    let err = Piper::restore(b"not a snapshot", lookups(), functions()).unwrap_err();
    assert!(matches!(err, PiperError::InvalidJson(_)));
}

#[test]
fn snapshot_survives_user_function_scripts() {
    let mut funcs = functions();
    funcs.insert("inc".to_string(), Arc::new(unary_fn(|v: i64| v + 42)));
    let piper = Piper::new(
        "p(x)\n| project y = inc(x)\n;",
        HashMap::new(),
        funcs,
    )
    .unwrap();
    let bytes = piper.snapshot().unwrap();

    // Functions are live handles; a snapshot restores only with them
    // re-supplied.
    let err = Piper::restore(&bytes, HashMap::new(), functions()).unwrap_err();
    assert!(matches!(err, PiperError::UnknownFunction(name) if name == "inc"));

    let mut funcs = functions();
    funcs.insert("inc".to_string(), Arc::new(unary_fn(|v: i64| v + 42)));
    let restored = Piper::restore(&bytes, HashMap::new(), funcs).unwrap();
    let result = restored.process("p", PiperRecord::new().with("x", 0i64)).unwrap();
    assert_eq!(result.rows[0].get("y"), Some(&PiperValue::Int(42)));
}

#[tokio::test]
async fn one_instance_serves_concurrent_tasks() {
    let piper = Arc::new(Piper::new(SCRIPT, lookups(), functions()).unwrap());
    let expected = piper.process_async("enrich", batch()).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let piper = Arc::clone(&piper);
        handles.push(tokio::spawn(async move {
            piper.process_async("enrich", batch()).await.unwrap()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), expected);
    }
}

#[test]
fn instance_is_send_and_sync() {
    fn assert_shareable<T: Send + Sync>() {}
    assert_shareable::<Piper>();
}

#[test]
fn debug_lists_pipelines() {
    let piper = Piper::new(SCRIPT, lookups(), functions()).unwrap();
    assert_eq!(format!("{piper:?}"), "Piper { pipelines: [\"enrich\"] }");
}
