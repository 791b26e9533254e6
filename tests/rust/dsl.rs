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

//! Script compilation tests: syntax diagnostics, construction-time name
//! resolution, and pipeline introspection.

use std::collections::HashMap;
use std::sync::Arc;

use piper::{Piper, PiperError, PiperFunction, PiperLookupSource, PiperMapSource};

fn build(script: &str) -> Result<Piper, PiperError> {
    let mut lookups: HashMap<String, Arc<dyn PiperLookupSource>> = HashMap::new();
    lookups.insert("users".to_string(), Arc::new(PiperMapSource::new()));
    let functions: HashMap<String, Arc<dyn PiperFunction>> = HashMap::new();
    Piper::new(script, lookups, functions)
}

#[test]
fn full_script_compiles() {
    let piper = build(
        "# user enrichment\n\
         enrich(id, score as double)\n\
         | project bucket = int(score * 10.0), label = \"u\" + string(id)\n\
         | lookup name, years = age from users on string(id)\n\
         | project-keep label, bucket, name, years\n\
         ;\n\
         \n\
         passthrough(x)\n\
         ;",
    )
    .unwrap();
    assert_eq!(piper.pipelines().len(), 2);
}

#[test]
fn syntax_errors_carry_position() {
    let err = build("p(x)\n| project y = \n;").unwrap_err();
    match err {
        PiperError::Syntax { line, column, .. } => {
            assert_eq!(line, 3);
            assert_eq!(column, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn malformed_scripts_are_rejected() {
    assert!(matches!(build("p(x"), Err(PiperError::Syntax { .. })));
    assert!(matches!(
        build("p(x)\n| frobnicate x\n;"),
        Err(PiperError::Syntax { .. })
    ));
    assert!(matches!(
        build("p(x)\n| take -1\n;"),
        Err(PiperError::Syntax { .. })
    ));
    assert!(matches!(
        build("p(x)\n| project y = \"unterminated\n;"),
        Err(PiperError::Syntax { .. })
    ));
}

#[test]
fn construction_is_all_or_nothing() {
    let err = build(
        "ok(x)\n| project y = x\n;\n\
         broken(x)\n| project y = unknown_fn(x)\n;",
    )
    .unwrap_err();
    assert!(matches!(err, PiperError::UnknownFunction(name) if name == "unknown_fn"));
}

#[test]
fn name_resolution_faults() {
    assert!(matches!(
        build("p(a)\n| project b = c + 1\n;"),
        Err(PiperError::FieldNotFound(name)) if name == "c"
    ));
    assert!(matches!(
        build("p(a)\n| project a = 1\n;"),
        Err(PiperError::FieldAlreadyExists(name)) if name == "a"
    ));
    assert!(matches!(
        build("p(a)\n| project-keep b\n;"),
        Err(PiperError::FieldNotFound(name)) if name == "b"
    ));
    assert!(matches!(
        build("p(a)\n| lookup v from nowhere on a\n;"),
        Err(PiperError::LookupSourceNotFound(name)) if name == "nowhere"
    ));
    assert!(matches!(
        build("p(a)\n;\np(a)\n;"),
        Err(PiperError::PipelineAlreadyDefined(name)) if name == "p"
    ));
}

#[test]
fn pipelines_dump_canonical_text() {
    let piper = build(
        "p(score as double)\n\
         | where score >= 0.5\n\
         | lookup name from users on string(score)\n\
         | distinct\n\
         | top 10 by score\n\
         | ignore-error\n\
         ;",
    )
    .unwrap();
    let dump = piper.pipelines().get("p").unwrap().clone();
    // `top` dumps with its defaults spelled out.
    assert_eq!(
        dump,
        "p(score as double)\n\
         | where (score >= 0.5)\n\
         | lookup name from users on string(score)\n\
         | distinct\n\
         | top 10 by score desc nulls last\n\
         | ignore-error\n\
         ;"
    );
}

#[test]
fn comments_and_whitespace_are_ignored() {
    let piper = build(
        "# leading comment\n\
         \n\
         p(x)  # params\n\
         | project y = x + 1  # add one\n\
         ;  # done\n",
    )
    .unwrap();
    assert_eq!(piper.pipelines().len(), 1);
}
