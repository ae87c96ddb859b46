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

//! Per-feature change callbacks. Several notifiers may watch the same key;
//! each registration returns an opaque handle that permits later deletion.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::error::Error;
use crate::responses::FeatureState;

/// Opaque identifier for a registered notifier. Registering again after a
/// deletion yields a fresh handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotifierHandle(Uuid);

impl NotifierHandle {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for NotifierHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A typed change callback. Typed variants receive the feature's new default
/// value, or the type error when the feature's declared type does not match
/// the callback's.
pub enum Notifier {
    Boolean(Arc<dyn Fn(Result<bool, Error>) + Send + Sync>),
    Number(Arc<dyn Fn(Result<f64, Error>) + Send + Sync>),
    String(Arc<dyn Fn(Result<String, Error>) + Send + Sync>),
    Json(Arc<dyn Fn(Result<String, Error>) + Send + Sync>),
    Feature(Arc<dyn Fn(&FeatureState) + Send + Sync>),
}

impl Notifier {
    pub fn boolean(callback: impl Fn(Result<bool, Error>) + Send + Sync + 'static) -> Self {
        Notifier::Boolean(Arc::new(callback))
    }

    pub fn number(callback: impl Fn(Result<f64, Error>) + Send + Sync + 'static) -> Self {
        Notifier::Number(Arc::new(callback))
    }

    pub fn string(callback: impl Fn(Result<String, Error>) + Send + Sync + 'static) -> Self {
        Notifier::String(Arc::new(callback))
    }

    pub fn json(callback: impl Fn(Result<String, Error>) + Send + Sync + 'static) -> Self {
        Notifier::Json(Arc::new(callback))
    }

    pub fn feature(callback: impl Fn(&FeatureState) + Send + Sync + 'static) -> Self {
        Notifier::Feature(Arc::new(callback))
    }

    fn deliver(&self, feature: &FeatureState) {
        match self {
            Notifier::Boolean(callback) => callback(feature.boolean_value()),
            Notifier::Number(callback) => callback(feature.number_value()),
            Notifier::String(callback) => callback(feature.string_value()),
            Notifier::Json(callback) => callback(feature.json_value()),
            Notifier::Feature(callback) => callback(feature),
        }
    }
}

/// Registry of notifiers, keyed by feature key then handle.
pub struct NotifierRegistry {
    notifiers: Mutex<HashMap<String, HashMap<NotifierHandle, Arc<Notifier>>>>,
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self {
            notifiers: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, feature_key: &str, notifier: Notifier) -> NotifierHandle {
        let handle = NotifierHandle::new();
        let mut notifiers = self.notifiers.lock().expect("notifier lock poisoned");
        notifiers
            .entry(feature_key.to_owned())
            .or_default()
            .insert(handle, Arc::new(notifier));
        handle
    }

    pub fn deregister(&self, feature_key: &str, handle: &NotifierHandle) -> Result<(), Error> {
        let mut notifiers = self.notifiers.lock().expect("notifier lock poisoned");
        let not_found = || Error::NotifierNotFound {
            key: feature_key.to_owned(),
        };

        let for_key = notifiers.get_mut(feature_key).ok_or_else(not_found)?;
        for_key.remove(handle).ok_or_else(not_found)?;
        if for_key.is_empty() {
            notifiers.remove(feature_key);
        }
        Ok(())
    }

    /// Dispatches an accepted update to every notifier watching the key.
    /// Callbacks run outside the registry lock, so a callback may register
    /// or delete notifiers without deadlocking.
    pub fn notify(&self, feature: &FeatureState) {
        let watching: Vec<Arc<Notifier>> = {
            let notifiers = self.notifiers.lock().expect("notifier lock poisoned");
            match notifiers.get(&feature.key) {
                Some(for_key) => for_key.values().cloned().collect(),
                None => return,
            }
        };

        for notifier in watching {
            notifier.deliver(feature);
        }
    }
}

impl Default for NotifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}
