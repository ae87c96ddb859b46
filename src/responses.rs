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

//! Types in this module represent SSE payloads emitted by the FeatureHub
//! edge, such as [`FeatureState`], [`Strategy`] and [`ConfigEvent`].

use serde::{Deserialize, Serialize, de};
use serde_json::Value;

use crate::commons::{AttributeType, Conditional, FeatureValueType, StrategyFieldName};
use crate::error::Error;

/// A feature's current value, tagged with the type the server declared for
/// the feature. JSON features carry their value as raw JSON text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Boolean(bool),
    String(String),
    Number(f64),
    Json(String),
}

impl FeatureValue {
    /// Interprets a dynamically typed wire value under the feature's declared
    /// type tag. Returns `None` for types this client does not recognize.
    fn from_tagged(value_type: &FeatureValueType, value: Value) -> Result<Option<Self>, Error> {
        let feature_value = match value_type {
            FeatureValueType::Boolean => match value.as_bool() {
                Some(b) => FeatureValue::Boolean(b),
                None => {
                    return Err(Error::invalid_type(format!(
                        "unable to interpret value ({value}) as a boolean"
                    )));
                }
            },
            FeatureValueType::Number => match value.as_f64() {
                Some(n) => FeatureValue::Number(n),
                None => {
                    return Err(Error::invalid_type(format!(
                        "unable to interpret value ({value}) as a number"
                    )));
                }
            },
            FeatureValueType::String => match value {
                Value::String(s) => FeatureValue::String(s),
                other => {
                    return Err(Error::invalid_type(format!(
                        "unable to interpret value ({other}) as a string"
                    )));
                }
            },
            FeatureValueType::Json => match value {
                Value::String(s) => FeatureValue::Json(s),
                other => {
                    return Err(Error::invalid_type(format!(
                        "unable to interpret value ({other}) as raw JSON text"
                    )));
                }
            },
            FeatureValueType::Other(_) => return Ok(None),
        };

        Ok(Some(feature_value))
    }
}

/// The unit of replicated state: one feature as served by the FeatureHub
/// edge, together with the targeting strategies that apply to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureState {
    pub key: String,
    #[serde(rename = "type")]
    pub value_type: FeatureValueType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<FeatureValue>,
    pub version: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub strategies: Vec<Strategy>,
}

impl FeatureState {
    /// The feature's default boolean value. Fails unless the feature is
    /// declared BOOLEAN and carries a boolean value.
    pub fn boolean_value(&self) -> Result<bool, Error> {
        if self.value_type != FeatureValueType::Boolean {
            return Err(Error::invalid_type(self.value_type.to_string()));
        }
        match &self.value {
            Some(FeatureValue::Boolean(value)) => Ok(*value),
            _ => Err(Error::invalid_type("unable to read the value as a boolean")),
        }
    }

    /// The feature's default numeric value.
    pub fn number_value(&self) -> Result<f64, Error> {
        if self.value_type != FeatureValueType::Number {
            return Err(Error::invalid_type(self.value_type.to_string()));
        }
        match &self.value {
            Some(FeatureValue::Number(value)) => Ok(*value),
            _ => Err(Error::invalid_type("unable to read the value as a number")),
        }
    }

    /// The feature's default string value.
    pub fn string_value(&self) -> Result<String, Error> {
        if self.value_type != FeatureValueType::String {
            return Err(Error::invalid_type(self.value_type.to_string()));
        }
        match &self.value {
            Some(FeatureValue::String(value)) => Ok(value.clone()),
            _ => Err(Error::invalid_type("unable to read the value as a string")),
        }
    }

    /// The feature's default value as raw JSON text.
    pub fn json_value(&self) -> Result<String, Error> {
        if self.value_type != FeatureValueType::Json {
            return Err(Error::invalid_type(self.value_type.to_string()));
        }
        match &self.value {
            Some(FeatureValue::Json(value)) => Ok(value.clone()),
            _ => Err(Error::invalid_type(
                "unable to read the value as raw JSON text",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for FeatureState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        // The wire shape of `value` depends on the sibling `type` tag, so the
        // payload is decoded in two steps: a shadow struct with a dynamic
        // value, then interpretation under the tag.
        #[derive(Deserialize)]
        struct FeatureStateShadow {
            key: String,
            #[serde(rename = "type")]
            value_type: FeatureValueType,
            #[serde(default)]
            value: Option<Value>,
            #[serde(default)]
            version: u64,
            #[serde(default)]
            strategies: Vec<Strategy>,
        }

        let shadow = FeatureStateShadow::deserialize(deserializer)?;
        let value = match shadow.value {
            None | Some(Value::Null) => None,
            Some(dynamic) => FeatureValue::from_tagged(&shadow.value_type, dynamic)
                .map_err(de::Error::custom)?,
        };

        Ok(FeatureState {
            key: shadow.key,
            value_type: shadow.value_type,
            value,
            version: shadow.version,
            strategies: shadow.strategies,
        })
    }
}

/// A targeting rule: an optional percentage gate plus a conjunction of typed
/// attribute predicates, selecting `value` when everything matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Scaled to a million: 1_000_000 means 100%, 0 means no percentage gate.
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub attributes: Vec<StrategyAttribute>,
    /// The variant served on a full match. Its shape is validated against the
    /// parent feature's declared type at query time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// One typed predicate inside a [`Strategy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAttribute {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "fieldName")]
    pub field_name: StrategyFieldName,
    pub conditional: Conditional,
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
    /// Option literals to compare the context value against, dynamically
    /// typed on the wire and parsed under `attribute_type` at evaluation time.
    #[serde(default)]
    pub values: Vec<Value>,
}

/// Client configuration instructions delivered on the `config` SSE event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEvent {
    /// The edge server has become stale: close the stream and keep serving
    /// cached data.
    #[serde(rename = "edge.stale", default)]
    pub edge_stale: bool,
}
