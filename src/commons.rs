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
use std::fmt;

use serde::{Deserialize, Serialize};

/// Feature value types served by the FeatureHub edge. For values of types
/// introduced by future server versions, use the `Other(String)` variant.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureValueType {
    /// Boolean feature (a flag)
    Boolean,
    /// Text feature
    String,
    /// Numeric feature
    Number,
    /// Structured feature, carried as raw JSON text
    Json,
    /// Types this client does not recognize
    #[serde(untagged)]
    Other(String),
}

const FEATURE_VALUE_TYPE_BOOLEAN: &str = "BOOLEAN";
const FEATURE_VALUE_TYPE_STRING: &str = "STRING";
const FEATURE_VALUE_TYPE_NUMBER: &str = "NUMBER";
const FEATURE_VALUE_TYPE_JSON: &str = "JSON";

impl From<&str> for FeatureValueType {
    fn from(value: &str) -> Self {
        match value {
            FEATURE_VALUE_TYPE_BOOLEAN => FeatureValueType::Boolean,
            FEATURE_VALUE_TYPE_STRING => FeatureValueType::String,
            FEATURE_VALUE_TYPE_NUMBER => FeatureValueType::Number,
            FEATURE_VALUE_TYPE_JSON => FeatureValueType::Json,
            other => FeatureValueType::Other(other.to_owned()),
        }
    }
}

impl From<String> for FeatureValueType {
    fn from(value: String) -> Self {
        FeatureValueType::from(value.as_str())
    }
}

impl AsRef<str> for FeatureValueType {
    fn as_ref(&self) -> &str {
        match self {
            FeatureValueType::Boolean => FEATURE_VALUE_TYPE_BOOLEAN,
            FeatureValueType::String => FEATURE_VALUE_TYPE_STRING,
            FeatureValueType::Number => FEATURE_VALUE_TYPE_NUMBER,
            FeatureValueType::Json => FEATURE_VALUE_TYPE_JSON,
            FeatureValueType::Other(value_type) => value_type,
        }
    }
}

impl fmt::Display for FeatureValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// Types a strategy attribute can compare under. The type decides how both
/// the context value and the attribute options are parsed.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeType {
    Boolean,
    String,
    Number,
    /// ISO-8601 date, e.g. `2023-11-05`
    Date,
    /// RFC-3339 datetime
    Datetime,
    /// Semantic version, compared by semver precedence
    SemanticVersion,
    /// Plain IP address or CIDR form
    IpAddress,
    /// Types this client does not recognize; attributes of such types never match
    #[serde(untagged)]
    Other(String),
}

impl AsRef<str> for AttributeType {
    fn as_ref(&self) -> &str {
        match self {
            AttributeType::Boolean => "BOOLEAN",
            AttributeType::String => "STRING",
            AttributeType::Number => "NUMBER",
            AttributeType::Date => "DATE",
            AttributeType::Datetime => "DATETIME",
            AttributeType::SemanticVersion => "SEMANTIC_VERSION",
            AttributeType::IpAddress => "IP_ADDRESS",
            AttributeType::Other(attribute_type) => attribute_type,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// Conditionals a strategy attribute can apply to its options.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Conditional {
    Equals,
    NotEquals,
    Less,
    LessEquals,
    Greater,
    GreaterEquals,
    Includes,
    Excludes,
    StartsWith,
    EndsWith,
    Regex,
    /// Conditionals this client does not recognize; they never match
    #[serde(untagged)]
    Other(String),
}

impl AsRef<str> for Conditional {
    fn as_ref(&self) -> &str {
        match self {
            Conditional::Equals => "EQUALS",
            Conditional::NotEquals => "NOT_EQUALS",
            Conditional::Less => "LESS",
            Conditional::LessEquals => "LESS_EQUALS",
            Conditional::Greater => "GREATER",
            Conditional::GreaterEquals => "GREATER_EQUALS",
            Conditional::Includes => "INCLUDES",
            Conditional::Excludes => "EXCLUDES",
            Conditional::StartsWith => "STARTS_WITH",
            Conditional::EndsWith => "ENDS_WITH",
            Conditional::Regex => "REGEX",
            Conditional::Other(conditional) => conditional,
        }
    }
}

impl fmt::Display for Conditional {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// The context field a strategy attribute targets. The well-known fields map
/// to named [`crate::context::Context`] slots; anything else is looked up in
/// the context's custom attribute map.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub enum StrategyFieldName {
    #[serde(rename = "COUNTRY")]
    Country,
    #[serde(rename = "DEVICE")]
    Device,
    #[serde(rename = "PLATFORM")]
    Platform,
    #[serde(rename = "USERKEY")]
    Userkey,
    #[serde(rename = "VERSION")]
    Version,
    /// A user-defined context attribute
    #[serde(untagged)]
    Custom(String),
}

const FIELD_NAME_COUNTRY: &str = "COUNTRY";
const FIELD_NAME_DEVICE: &str = "DEVICE";
const FIELD_NAME_PLATFORM: &str = "PLATFORM";
const FIELD_NAME_USERKEY: &str = "USERKEY";
const FIELD_NAME_VERSION: &str = "VERSION";

impl From<&str> for StrategyFieldName {
    fn from(value: &str) -> Self {
        match value {
            FIELD_NAME_COUNTRY => StrategyFieldName::Country,
            FIELD_NAME_DEVICE => StrategyFieldName::Device,
            FIELD_NAME_PLATFORM => StrategyFieldName::Platform,
            FIELD_NAME_USERKEY => StrategyFieldName::Userkey,
            FIELD_NAME_VERSION => StrategyFieldName::Version,
            other => StrategyFieldName::Custom(other.to_owned()),
        }
    }
}

impl From<String> for StrategyFieldName {
    fn from(value: String) -> Self {
        StrategyFieldName::from(value.as_str())
    }
}

impl AsRef<str> for StrategyFieldName {
    fn as_ref(&self) -> &str {
        match self {
            StrategyFieldName::Country => FIELD_NAME_COUNTRY,
            StrategyFieldName::Device => FIELD_NAME_DEVICE,
            StrategyFieldName::Platform => FIELD_NAME_PLATFORM,
            StrategyFieldName::Userkey => FIELD_NAME_USERKEY,
            StrategyFieldName::Version => FIELD_NAME_VERSION,
            StrategyFieldName::Custom(field_name) => field_name,
        }
    }
}

impl fmt::Display for StrategyFieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// SSE event kinds the FeatureHub edge emits on the feature stream.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SseEventKind {
    /// A positive confirmation, control traffic only
    Ack,
    /// The server is ending the connection
    Bye,
    /// A connection-level error reported in-band
    Error,
    /// Client configuration instructions, e.g. `edge.stale`
    Config,
    /// An update to one feature
    Feature,
    /// A complete feature set snapshot
    Features,
    /// A feature was removed server-side
    DeleteFeature,
    /// A server-side failure
    Failure,
    /// Anything this client does not recognize
    Other(String),
}

const SSE_EVENT_ACK: &str = "ack";
const SSE_EVENT_BYE: &str = "bye";
const SSE_EVENT_ERROR: &str = "error";
const SSE_EVENT_CONFIG: &str = "config";
const SSE_EVENT_FEATURE: &str = "feature";
const SSE_EVENT_FEATURES: &str = "features";
const SSE_EVENT_DELETE_FEATURE: &str = "delete_feature";
const SSE_EVENT_FAILURE: &str = "failure";

impl From<&str> for SseEventKind {
    fn from(value: &str) -> Self {
        match value {
            SSE_EVENT_ACK => SseEventKind::Ack,
            SSE_EVENT_BYE => SseEventKind::Bye,
            SSE_EVENT_ERROR => SseEventKind::Error,
            SSE_EVENT_CONFIG => SseEventKind::Config,
            SSE_EVENT_FEATURE => SseEventKind::Feature,
            SSE_EVENT_FEATURES => SseEventKind::Features,
            SSE_EVENT_DELETE_FEATURE => SseEventKind::DeleteFeature,
            SSE_EVENT_FAILURE => SseEventKind::Failure,
            other => SseEventKind::Other(other.to_owned()),
        }
    }
}

impl AsRef<str> for SseEventKind {
    fn as_ref(&self) -> &str {
        match self {
            SseEventKind::Ack => SSE_EVENT_ACK,
            SseEventKind::Bye => SSE_EVENT_BYE,
            SseEventKind::Error => SSE_EVENT_ERROR,
            SseEventKind::Config => SSE_EVENT_CONFIG,
            SseEventKind::Feature => SSE_EVENT_FEATURE,
            SseEventKind::Features => SSE_EVENT_FEATURES,
            SseEventKind::DeleteFeature => SSE_EVENT_DELETE_FEATURE,
            SseEventKind::Failure => SSE_EVENT_FAILURE,
            SseEventKind::Other(kind) => kind,
        }
    }
}

impl fmt::Display for SseEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}
