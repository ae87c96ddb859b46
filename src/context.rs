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
use std::collections::HashMap;

use serde_json::Value;

use crate::commons::StrategyFieldName;

/// Caller-supplied targeting inputs, evaluated against strategy attributes.
/// All fields are optional; an empty context simply never matches targeted
/// strategies.
///
/// Example
/// ```rust
/// use featurehub_sse_client::context::Context;
///
/// let ctx = Context::new()
///     .with_userkey("alice")
///     .with_country("new_zealand")
///     .with_custom("plan", "enterprise");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    pub userkey: Option<String>,
    pub sessionkey: Option<String>,
    pub country: Option<String>,
    pub device: Option<String>,
    pub platform: Option<String>,
    pub version: Option<String>,
    pub custom: HashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_userkey(mut self, userkey: impl Into<String>) -> Self {
        self.userkey = Some(userkey.into());
        self
    }

    pub fn with_sessionkey(mut self, sessionkey: impl Into<String>) -> Self {
        self.sessionkey = Some(sessionkey.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_custom(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom.insert(name.into(), value.into());
        self
    }

    /// The identifier preferred for percentage hashing: the userkey, falling
    /// back to the sessionkey. `None` when neither is set, in which case
    /// percentage-gated strategies cannot match.
    pub fn unique_key(&self) -> Option<&str> {
        self.userkey
            .as_deref()
            .or(self.sessionkey.as_deref())
            .filter(|key| !key.is_empty())
    }

    /// Looks up the context value a strategy attribute targets. Well-known
    /// fields resolve to their named slot (absent slots read as the empty
    /// string); custom fields resolve through the custom map, where absence
    /// is `None` and fails the enclosing strategy.
    pub fn attribute_value(&self, field_name: &StrategyFieldName) -> Option<Value> {
        let named = |slot: &Option<String>| {
            Some(Value::String(slot.clone().unwrap_or_default()))
        };

        match field_name {
            StrategyFieldName::Country => named(&self.country),
            StrategyFieldName::Device => named(&self.device),
            StrategyFieldName::Platform => named(&self.platform),
            StrategyFieldName::Userkey => named(&self.userkey),
            StrategyFieldName::Version => named(&self.version),
            StrategyFieldName::Custom(name) => self.custom.get(name).cloned(),
        }
    }
}
