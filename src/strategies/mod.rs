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

//! Strategy evaluation: given the ordered strategies attached to a feature
//! and a caller context, deterministically select a variant. A strategy
//! matches when its percentage gate passes and every typed attribute
//! predicate matches; the first matching strategy wins.

pub mod predicates;

use std::io::Cursor;

use log::{debug, error, trace};
use serde_json::Value;

use crate::context::Context;
use crate::responses::Strategy;

const MAX_MURMUR32_HASH: f64 = 4_294_967_296.0; // 2^32
const MAX_PERCENTAGE: f64 = 1_000_000.0;

/// Evaluates `strategies` in server order against `context`. Returns the
/// first matching strategy's value, or `None` when no strategy matches (or
/// the matching strategy carries no value).
pub fn evaluate<'a>(strategies: &'a [Strategy], context: Option<&Context>) -> Option<&'a Value> {
    // The hash key is shared by every percentage gate in the list.
    let unique_key = context.and_then(Context::unique_key);

    for strategy in strategies {
        trace!("checking strategy ({})", strategy.id);

        if !proceed_with_percentage(strategy, unique_key) {
            trace!(
                "failed strategy ({}) percentage, trying the next strategy",
                strategy.id
            );
            continue;
        }

        if !proceed_with_attributes(strategy, context) {
            trace!(
                "failed strategy ({}) attributes, trying the next strategy",
                strategy.id
            );
            continue;
        }

        debug!("matched strategy ({}:{})", strategy.id, strategy.name);
        return strategy.value.as_ref();
    }

    None
}

/// The percentage gate. A zero percentage means the strategy has no gate; a
/// non-zero percentage requires a hash key, and passes when the key's bucket
/// falls at or below the strategy's threshold.
pub fn proceed_with_percentage(strategy: &Strategy, unique_key: Option<&str>) -> bool {
    if strategy.percentage == 0.0 {
        return true;
    }

    let Some(key) = unique_key else {
        return false;
    };

    let hash = match murmur3::murmur3_32(&mut Cursor::new(key.as_bytes()), 0) {
        Ok(hash) => hash,
        Err(error) => {
            error!("unable to hash the context key: {error}");
            return false;
        }
    };

    let bucket = f64::from(hash) / MAX_MURMUR32_HASH * MAX_PERCENTAGE;
    if bucket <= strategy.percentage {
        trace!(
            "matched percentage strategy ({}:{}) for calculated bucket {bucket}",
            strategy.id, strategy.percentage
        );
        true
    } else {
        debug!(
            "didn't match percentage strategy ({}:{}) for calculated bucket {bucket}",
            strategy.id, strategy.percentage
        );
        false
    }
}

/// The attribute rule: every attribute must match. Evaluation failures are
/// logged and treated as a non-match, so a malformed attribute can never
/// widen a rollout.
pub fn proceed_with_attributes(strategy: &Strategy, context: Option<&Context>) -> bool {
    let Some(context) = context else {
        return false;
    };

    for attribute in &strategy.attributes {
        let Some(value) = context.attribute_value(&attribute.field_name) else {
            trace!(
                "context has no '{}' attribute, failing strategy ({})",
                attribute.field_name, strategy.id
            );
            return false;
        };

        match predicates::match_attribute(attribute, &value) {
            Ok(true) => continue,
            Ok(false) => {
                trace!(
                    "didn't match attribute strategy ({}:{}) for value {value}",
                    attribute.id, attribute.field_name
                );
                return false;
            }
            Err(error) => {
                error!("unable to evaluate attribute ({}): {error}", attribute.id);
                return false;
            }
        }
    }

    true
}
