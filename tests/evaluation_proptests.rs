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
use featurehub_sse_client::context::Context;
use featurehub_sse_client::responses::FeatureState;
use featurehub_sse_client::responses::Strategy as RolloutStrategy;
use featurehub_sse_client::store::FeatureStore;
use featurehub_sse_client::strategies;
use proptest::prelude::*;
use serde_json::json;

fn rollout(percentage: f64) -> Vec<RolloutStrategy> {
    vec![RolloutStrategy {
        id: "s1".to_owned(),
        name: "rollout".to_owned(),
        percentage,
        attributes: Vec::new(),
        value: Some(json!(true)),
    }]
}

fn arb_userkey() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_.-]{1,40}").unwrap()
}

proptest! {
    // The same unique key always lands in the same bucket, so repeated
    // evaluation of the same strategy list gives identical results.
    #[test]
    fn prop_evaluation_is_deterministic(
        userkey in arb_userkey(),
        percentage in 0f64..=1_000_000.0,
    ) {
        let strategies = rollout(percentage);
        let ctx = Context::new().with_userkey(userkey);

        let first = strategies::evaluate(&strategies, Some(&ctx)).cloned();
        for _ in 0..3 {
            prop_assert_eq!(
                first.clone(),
                strategies::evaluate(&strategies, Some(&ctx)).cloned()
            );
        }
    }

    // Raising the percentage can only widen a rollout, never narrow it.
    #[test]
    fn prop_wider_rollouts_are_supersets(
        userkey in arb_userkey(),
        lower in 1f64..500_000.0,
        delta in 0f64..500_000.0,
    ) {
        let ctx = Context::new().with_userkey(userkey);
        let narrow = strategies::evaluate(&rollout(lower), Some(&ctx)).is_some();
        let wide = strategies::evaluate(&rollout(lower + delta), Some(&ctx)).is_some();

        prop_assert!(!narrow || wide, "a key inside {lower} fell out of {}", lower + delta);
    }

    // No matter the order deltas arrive in, the store converges on the entry
    // with the highest version.
    #[test]
    fn prop_store_converges_to_the_maximum_version(
        versions in Just((1u64..=20).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let store = FeatureStore::new();
        for version in &versions {
            let feature: FeatureState = serde_json::from_value(json!({
                "key": "k",
                "type": "NUMBER",
                "value": *version as f64,
                "version": version,
            })).unwrap();
            store.apply_delta(feature);
        }

        let stored = store.get("k").unwrap();
        prop_assert_eq!(20, stored.version);
        prop_assert_eq!(20.0, stored.number_value().unwrap());
    }
}
