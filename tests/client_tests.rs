// Copyright (C) 2023-2025 FeatureHub Contributors (https://www.featurehub.io/)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
mod test_helpers;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::test_helpers::{SDK_KEY, await_condition, init_logging, spawn_sse_server};
use featurehub_sse_client::analytics::AnalyticsCollector;
use featurehub_sse_client::client::ClientBuilder;
use featurehub_sse_client::context::Context;
use featurehub_sse_client::dispatcher::State;
use featurehub_sse_client::error::Error;
use featurehub_sse_client::responses::FeatureState;

fn frames(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(event, data)| (event.to_string(), data.to_string()))
        .collect()
}

const MIXED_SNAPSHOT: &str = r#"[
    {"key":"booleanfeature","type":"BOOLEAN","value":true,"version":1},
    {"key":"jsonfeature","type":"JSON","value":"{\"is_crufty\": true}","version":1},
    {"key":"numberfeature","type":"NUMBER","value":123456789,"version":1},
    {"key":"stringfeature","type":"STRING","value":"this is a string","version":1}]"#;

#[tokio::test]
async fn test_typed_lookups_check_the_declared_type() {
    init_logging();
    let address = spawn_sse_server(frames(&[("features", MIXED_SNAPSHOT)])).await;

    let client = ClientBuilder::new()
        .with_server_address(address)
        .with_sdk_key(SDK_KEY)
        .with_wait_for_data(true)
        .connect()
        .await
        .expect("client should connect");

    assert_eq!(State::Running, client.state());

    // A feature that does not exist.
    assert!(matches!(
        client.get_feature("something-that-does-not-exist"),
        Err(Error::FeatureNotFound { .. })
    ));

    // Raw state for a feature that does exist.
    let feature = client.get_feature("stringfeature").unwrap();
    assert_eq!("STRING", feature.value_type.as_ref());

    // Each typed accessor rejects features of other types...
    assert!(matches!(
        client.get_boolean("stringfeature"),
        Err(Error::InvalidType { .. })
    ));
    assert!(matches!(
        client.get_raw_json("numberfeature"),
        Err(Error::InvalidType { .. })
    ));
    assert!(matches!(
        client.get_number("stringfeature"),
        Err(Error::InvalidType { .. })
    ));
    assert!(matches!(
        client.get_string("numberfeature"),
        Err(Error::InvalidType { .. })
    ));

    // ...and serves its own.
    assert!(client.get_boolean("booleanfeature").unwrap());
    assert_eq!(123456789.0, client.get_number("numberfeature").unwrap());
    assert_eq!("this is a string", client.get_string("stringfeature").unwrap());
    assert_eq!(
        r#"{"is_crufty": true}"#,
        client.get_raw_json("jsonfeature").unwrap()
    );

    client.close();
    assert_eq!(State::Closed, client.state());
}

// "alice" buckets at ~298,119 of 1,000,000 and "bob" at ~657,646, so a
// 50% rollout includes alice and excludes bob, on every evaluation.
#[tokio::test]
async fn test_context_bound_lookups_evaluate_strategies() {
    init_logging();
    let snapshot = r#"[{"key":"goodbye","type":"BOOLEAN","value":false,"version":1,
        "strategies":[{"id":"s1","name":"half","percentage":500000,"attributes":[],"value":true}]}]"#;
    let address = spawn_sse_server(frames(&[("features", snapshot)])).await;

    let client = ClientBuilder::new()
        .with_server_address(address)
        .with_sdk_key(SDK_KEY)
        .with_wait_for_data(true)
        .connect()
        .await
        .expect("client should connect");

    let alice = client.with_context(Context::new().with_userkey("alice"));
    let bob = client.with_context(Context::new().with_userkey("bob"));

    for _ in 0..5 {
        assert!(alice.get_boolean("goodbye").unwrap());
        assert!(!bob.get_boolean("goodbye").unwrap());
    }

    // Without a context the percentage gate cannot pass.
    assert!(!client.get_boolean("goodbye").unwrap());
}

#[tokio::test]
async fn test_attribute_targeting_falls_back_to_the_default() {
    init_logging();
    let snapshot = r#"[{"key":"banner","type":"STRING","value":"plain","version":1,
        "strategies":[{"id":"s1","name":"nz","percentage":0,
            "attributes":[{"id":"a1","fieldName":"COUNTRY","conditional":"EQUALS","type":"STRING","values":["nz"]}],
            "value":"kia ora"}]}]"#;
    let address = spawn_sse_server(frames(&[("features", snapshot)])).await;

    let client = ClientBuilder::new()
        .with_server_address(address)
        .with_sdk_key(SDK_KEY)
        .with_wait_for_data(true)
        .connect()
        .await
        .expect("client should connect");

    let nz = client.with_context(Context::new().with_country("nz"));
    let au = client.with_context(Context::new().with_country("au"));
    let anonymous = client.with_context(Context::new());

    assert_eq!("kia ora", nz.get_string("banner").unwrap());
    assert_eq!("plain", au.get_string("banner").unwrap());
    // An absent field fails the attribute, closed.
    assert_eq!("plain", anonymous.get_string("banner").unwrap());
}

#[tokio::test]
async fn test_edge_stale_keeps_cached_data_servable() {
    init_logging();
    let address = spawn_sse_server(frames(&[
        (
            "features",
            r#"[{"key":"cached","type":"STRING","value":"v","version":1}]"#,
        ),
        ("config", r#"{"edge.stale": true}"#),
        (
            "feature",
            r#"{"key":"late","type":"STRING","value":"x","version":1}"#,
        ),
    ]))
    .await;

    let client = ClientBuilder::new()
        .with_server_address(address)
        .with_sdk_key(SDK_KEY)
        .with_wait_for_data(true)
        .connect()
        .await
        .expect("client should connect");

    await_condition(|| client.state() == State::Closed).await;

    assert_eq!(State::Closed, client.state());
    assert_eq!("v", client.get_string("cached").unwrap());
    assert!(matches!(
        client.get_feature("late"),
        Err(Error::FeatureNotFound { .. })
    ));
}

#[tokio::test]
async fn test_construction_validates_the_configuration() {
    let no_address = ClientBuilder::new().with_sdk_key(SDK_KEY).build();
    assert!(matches!(no_address, Err(Error::BadConfig { .. })));

    let no_key = ClientBuilder::new()
        .with_server_address("http://localhost:8085")
        .build();
    assert!(matches!(no_key, Err(Error::BadConfig { .. })));

    let not_a_url = ClientBuilder::new()
        .with_server_address("not a url at all")
        .with_sdk_key(SDK_KEY)
        .build();
    assert!(matches!(not_a_url, Err(Error::BadConfig { .. })));
}

#[tokio::test]
async fn test_subscribing_to_an_unreachable_server_fails() {
    // Nothing listens on this port.
    let result = ClientBuilder::new()
        .with_server_address("http://127.0.0.1:1")
        .with_sdk_key(SDK_KEY)
        .connect()
        .await;

    assert!(matches!(result, Err(Error::Transport { .. })));
}

#[tokio::test]
async fn test_starting_twice_is_rejected() {
    init_logging();
    let address = spawn_sse_server(frames(&[("features", "[]")])).await;

    let client = ClientBuilder::new()
        .with_server_address(address)
        .with_sdk_key(SDK_KEY)
        .with_wait_for_data(true)
        .connect()
        .await
        .expect("client should connect");

    assert!(matches!(client.start().await, Err(Error::BadConfig { .. })));
}

#[tokio::test]
async fn test_readiness_listener_fires_once_data_arrives() {
    init_logging();
    let address = spawn_sse_server(frames(&[(
        "features",
        r#"[{"key":"k","type":"STRING","value":"a","version":1}]"#,
    )]))
    .await;

    let config = ClientBuilder::new()
        .with_server_address(address)
        .with_sdk_key(SDK_KEY)
        .build()
        .unwrap();

    let client = featurehub_sse_client::client::StreamingClient::new(config)
        .await
        .expect("client should subscribe");
    assert_eq!(State::Subscribing, client.state());

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    client.on_ready(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    client.start().await.expect("client should start");
    let counter = Arc::clone(&fired);
    await_condition(move || counter.load(Ordering::SeqCst) == 1).await;
}

#[tokio::test]
async fn test_notifier_handles_are_fresh_after_deletion() {
    init_logging();
    let address = spawn_sse_server(frames(&[("features", "[]")])).await;

    let client = ClientBuilder::new()
        .with_server_address(address)
        .with_sdk_key(SDK_KEY)
        .with_wait_for_data(true)
        .connect()
        .await
        .expect("client should connect");

    let first = client.add_notifier_boolean("flag", |_| {});
    client.delete_notifier("flag", &first).unwrap();
    // Deleting again fails.
    assert!(matches!(
        client.delete_notifier("flag", &first),
        Err(Error::NotifierNotFound { .. })
    ));

    let second = client.add_notifier_boolean("flag", |_| {});
    assert_ne!(first, second);
}

struct RecordingCollector {
    calls: Arc<Mutex<Vec<(String, HashMap<String, String>, usize)>>>,
}

impl AnalyticsCollector for RecordingCollector {
    fn log_event(
        &self,
        action: &str,
        tags: &HashMap<String, String>,
        features: &HashMap<String, FeatureState>,
    ) -> Result<(), Error> {
        self.calls
            .lock()
            .unwrap()
            .push((action.to_owned(), tags.clone(), features.len()));
        Ok(())
    }
}

struct FailingCollector;

impl AnalyticsCollector for FailingCollector {
    fn log_event(
        &self,
        _action: &str,
        _tags: &HashMap<String, String>,
        _features: &HashMap<String, FeatureState>,
    ) -> Result<(), Error> {
        Err(Error::FromApi {
            message: "collector exploded".to_owned(),
        })
    }
}

#[tokio::test]
async fn test_analytics_events_carry_a_feature_snapshot() {
    init_logging();
    let address = spawn_sse_server(frames(&[("features", MIXED_SNAPSHOT)])).await;

    let client = ClientBuilder::new()
        .with_server_address(address)
        .with_sdk_key(SDK_KEY)
        .with_wait_for_data(true)
        .connect()
        .await
        .expect("client should connect");

    let calls = Arc::new(Mutex::new(Vec::new()));
    client.add_analytics_collector(RecordingCollector {
        calls: Arc::clone(&calls),
    });
    // The same collector registered twice is invoked twice.
    client.add_analytics_collector(RecordingCollector {
        calls: Arc::clone(&calls),
    });

    let tags = HashMap::from([("testing".to_owned(), "true".to_owned())]);
    client
        .log_analytics_event_sync("checkout", &tags)
        .expect("collectors should succeed");

    {
        let calls = calls.lock().unwrap();
        assert_eq!(2, calls.len());
        assert_eq!("checkout", calls[0].0);
        assert_eq!(Some(&"true".to_owned()), calls[0].1.get("testing"));
        // The full feature map travels with the event.
        assert_eq!(4, calls[0].2);
    }

    // The asynchronous variant is fire and forget.
    client.log_analytics_event("browse", &tags);
    let observed = Arc::clone(&calls);
    await_condition(move || observed.lock().unwrap().len() == 4).await;
}

#[tokio::test]
async fn test_sync_analytics_aggregates_collector_failures() {
    init_logging();
    let address = spawn_sse_server(frames(&[("features", "[]")])).await;

    let client = ClientBuilder::new()
        .with_server_address(address)
        .with_sdk_key(SDK_KEY)
        .with_wait_for_data(true)
        .connect()
        .await
        .expect("client should connect");

    let calls = Arc::new(Mutex::new(Vec::new()));
    client.add_analytics_collector(FailingCollector);
    client.add_analytics_collector(RecordingCollector {
        calls: Arc::clone(&calls),
    });
    client.add_analytics_collector(FailingCollector);

    let result = client.log_analytics_event_sync("checkout", &HashMap::new());
    match result {
        Err(Error::Analytics { messages }) => assert_eq!(2, messages.len()),
        other => panic!("expected an aggregated analytics error, got {other:?}"),
    }
    // Healthy collectors still ran.
    assert_eq!(1, calls.lock().unwrap().len());
}
