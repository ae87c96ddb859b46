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

//! Fan-out of caller action events, together with a snapshot of the current
//! feature map, to pluggable collectors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, error, info};

use crate::error::Error;
use crate::responses::FeatureState;

/// Receives action events. `features` is the state of every feature at the
/// time the event was logged.
pub trait AnalyticsCollector: Send + Sync {
    fn log_event(
        &self,
        action: &str,
        tags: &HashMap<String, String>,
        features: &HashMap<String, FeatureState>,
    ) -> Result<(), Error>;
}

/// A collector that writes every event and feature to the log.
pub struct LoggingAnalyticsCollector;

impl AnalyticsCollector for LoggingAnalyticsCollector {
    fn log_event(
        &self,
        action: &str,
        tags: &HashMap<String, String>,
        features: &HashMap<String, FeatureState>,
    ) -> Result<(), Error> {
        for feature in features.values() {
            let value = feature
                .value
                .as_ref()
                .and_then(|value| serde_json::to_string(value).ok())
                .unwrap_or_default();
            info!(
                "Analytics event: action={action} tags={tags:?} feature_key={} feature_value={value}",
                feature.key
            );
        }
        Ok(())
    }
}

/// The protected collector list plus the dispatch machinery. Registration
/// may race with a dispatch in flight; a dispatch sees the collectors
/// registered at the moment the event was logged.
pub struct AnalyticsRegistry {
    collectors: Mutex<Vec<Arc<dyn AnalyticsCollector>>>,
}

impl AnalyticsRegistry {
    pub fn new() -> Self {
        Self {
            collectors: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, collector: Arc<dyn AnalyticsCollector>) {
        let mut collectors = self.collectors.lock().expect("collector lock poisoned");
        collectors.push(collector);
    }

    pub fn len(&self) -> usize {
        self.collectors.lock().expect("collector lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fire-and-forget dispatch on a background task. Collector failures are
    /// logged; the caller is never blocked on a slow collector.
    pub fn log_event(
        &self,
        action: &str,
        tags: &HashMap<String, String>,
        features: HashMap<String, FeatureState>,
    ) {
        debug!("Submitting analytics event ({action})");
        let collectors = self.collectors();
        let action = action.to_owned();
        let tags = tags.clone();

        tokio::spawn(async move {
            for collector in collectors {
                if let Err(e) = collector.log_event(&action, &tags, &features) {
                    error!("analytics collector failed for action '{action}': {e}");
                }
            }
        });
    }

    /// Synchronous dispatch: blocks until every collector has returned,
    /// aggregating their failures.
    pub fn log_event_sync(
        &self,
        action: &str,
        tags: &HashMap<String, String>,
        features: &HashMap<String, FeatureState>,
    ) -> Result<(), Error> {
        debug!("Submitting analytics event ({action})");
        let mut messages = Vec::new();
        for collector in self.collectors() {
            if let Err(e) = collector.log_event(action, tags, features) {
                messages.push(e.to_string());
            }
        }

        if messages.is_empty() {
            Ok(())
        } else {
            Err(Error::Analytics { messages })
        }
    }

    fn collectors(&self) -> Vec<Arc<dyn AnalyticsCollector>> {
        self.collectors
            .lock()
            .expect("collector lock poisoned")
            .clone()
    }
}

impl Default for AnalyticsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
