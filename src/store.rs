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

//! The replicated feature map. All mutation flows through the SSE
//! dispatcher; readers get defensive copies so a concurrent snapshot can
//! never tear a read-then-evaluate sequence.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use tokio::sync::watch;

use crate::error::Error;
use crate::responses::FeatureState;

/// Concurrency-safe mapping from feature key to current [`FeatureState`],
/// with version-monotone update rules.
///
/// Invariant: for any key, the stored version never decreases. A snapshot
/// replaces the whole map atomically; readers observe either the pre- or
/// post-snapshot map, never a mix.
pub struct FeatureStore {
    features: Mutex<HashMap<String, FeatureState>>,
    has_data: AtomicBool,
    ready_tx: watch::Sender<bool>,
    ready_rx: watch::Receiver<bool>,
}

impl FeatureStore {
    pub fn new() -> Self {
        let (ready_tx, ready_rx) = watch::channel(false);
        Self {
            features: Mutex::new(HashMap::new()),
            has_data: AtomicBool::new(false),
            ready_tx,
            ready_rx,
        }
    }

    /// Fetches a copy of the current state for `key`.
    pub fn get(&self, key: &str) -> Result<FeatureState, Error> {
        let features = self.features.lock().expect("feature map lock poisoned");
        features.get(key).cloned().ok_or(Error::FeatureNotFound {
            key: key.to_owned(),
        })
    }

    /// Applies a single-feature delta. The delta is rejected when an existing
    /// entry already carries the same or a newer version. Returns the
    /// accepted state so the caller can notify listeners after the lock has
    /// been released.
    pub fn apply_delta(&self, feature: FeatureState) -> Option<FeatureState> {
        {
            let mut features = self.features.lock().expect("feature map lock poisoned");
            if let Some(current) = features.get(&feature.key)
                && feature.version <= current.version
            {
                debug!("received an old version of feature '{}'", feature.key);
                return None;
            }
            features.insert(feature.key.clone(), feature.clone());
        }

        debug!("received a new version of feature '{}'", feature.key);
        self.mark_ready();
        Some(feature)
    }

    /// Atomically replaces the entire map with the snapshot's contents. Keys
    /// absent from the snapshot are dropped. Returns the states whose version
    /// increased (or which are new), in snapshot order, for post-lock
    /// notification; unchanged versions stay silent, which makes re-applying
    /// the same snapshot observationally idempotent.
    pub fn apply_snapshot(&self, snapshot: Vec<FeatureState>) -> Vec<FeatureState> {
        let mut incoming: HashMap<String, FeatureState> = HashMap::with_capacity(snapshot.len());
        for feature in &snapshot {
            incoming.insert(feature.key.clone(), feature.clone());
        }

        let previous = {
            let mut features = self.features.lock().expect("feature map lock poisoned");
            std::mem::replace(&mut *features, incoming)
        };

        let accepted: Vec<FeatureState> = snapshot
            .into_iter()
            .filter(|feature| match previous.get(&feature.key) {
                Some(old) => feature.version > old.version,
                None => true,
            })
            .collect();

        debug!("applied a snapshot, {} feature(s) changed", accepted.len());
        self.mark_ready();
        accepted
    }

    /// Removes `key` unconditionally. Deletion fires no notifications.
    pub fn apply_delete(&self, key: &str) -> bool {
        let removed = {
            let mut features = self.features.lock().expect("feature map lock poisoned");
            features.remove(key).is_some()
        };
        if removed {
            debug!("deleted feature '{key}'");
        }
        removed
    }

    /// A copy of the whole map, as handed to analytics collectors.
    pub fn snapshot(&self) -> HashMap<String, FeatureState> {
        self.features
            .lock()
            .expect("feature map lock poisoned")
            .clone()
    }

    /// Whether the store has accepted at least one payload.
    pub fn is_ready(&self) -> bool {
        self.has_data.load(Ordering::Acquire)
    }

    /// A completion signal that resolves to `true` once the store has
    /// accepted its first payload. Await `changed()` rather than polling.
    pub fn ready_signal(&self) -> watch::Receiver<bool> {
        self.ready_rx.clone()
    }

    fn mark_ready(&self) {
        if !self.has_data.swap(true, Ordering::AcqRel) {
            let _ = self.ready_tx.send(true);
        }
    }
}

impl Default for FeatureStore {
    fn default() -> Self {
        Self::new()
    }
}
