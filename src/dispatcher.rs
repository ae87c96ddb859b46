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

//! The long-lived consumer of the SSE channels. Classifies inbound frames,
//! decodes their payloads and applies them to the feature store, fires
//! notifiers for accepted updates, and routes unrecoverable conditions to
//! the fatal error handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{error, info, trace, warn};
use tokio::sync::mpsc;

use crate::commons::SseEventKind;
use crate::error::Error;
use crate::notifiers::NotifierRegistry;
use crate::responses::{ConfigEvent, FeatureState};
use crate::store::FeatureStore;
use crate::transport::{SseFrame, StreamHandle};

/// Called for unrecoverable asynchronous errors: `failure` frames and
/// transport errors that arrive before the store has any data.
pub type FatalErrorHandler = Arc<dyn Fn(&Error, &str) + Send + Sync>;

/// Lifecycle of the streaming subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Subscribing,
    Running,
    Closed,
}

#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<FeatureStore>,
    notifiers: Arc<NotifierRegistry>,
    is_running: Arc<AtomicBool>,
    state: Arc<Mutex<State>>,
    transport: Arc<StreamHandle>,
    fatal_error_handler: FatalErrorHandler,
}

impl Dispatcher {
    pub fn new(
        store: Arc<FeatureStore>,
        notifiers: Arc<NotifierRegistry>,
        is_running: Arc<AtomicBool>,
        state: Arc<Mutex<State>>,
        transport: Arc<StreamHandle>,
        fatal_error_handler: FatalErrorHandler,
    ) -> Self {
        Self {
            store,
            notifiers,
            is_running,
            state,
            transport,
            fatal_error_handler,
        }
    }

    /// The event consumer. Runs until the events channel closes, the client
    /// is shut down, or the server declares the edge stale.
    pub async fn run_events(self, mut events: mpsc::Receiver<SseFrame>) {
        while let Some(frame) = events.recv().await {
            if !self.is_running.load(Ordering::Acquire) {
                break;
            }
            self.handle_frame(frame);
        }
        info!("no longer handling SSE events");
    }

    /// The error consumer. Transport errors before readiness are fatal;
    /// after readiness they are logged and the stream carries on.
    pub async fn run_errors(self, mut errors: mpsc::Receiver<Error>) {
        while let Some(e) = errors.recv().await {
            if !self.is_running.load(Ordering::Acquire) {
                break;
            }
            if self.store.is_ready() {
                trace!("error from the feature stream: {e}");
            } else {
                (self.fatal_error_handler)(&e, "feature stream failed before any data arrived");
            }
        }
        info!("no longer handling SSE errors");
    }

    fn handle_frame(&self, frame: SseFrame) {
        match SseEventKind::from(frame.event.as_str()) {
            SseEventKind::Ack | SseEventKind::Bye => {
                trace!("received SSE control event '{}'", frame.event);
            }
            SseEventKind::Error => self.handle_error_frame(&frame),
            SseEventKind::Config => self.handle_config(&frame),
            SseEventKind::Feature => self.handle_feature(&frame),
            SseEventKind::Features => self.handle_features(&frame),
            SseEventKind::DeleteFeature => self.handle_delete_feature(&frame),
            SseEventKind::Failure => {
                let e = Error::FromApi {
                    message: frame.data.clone(),
                };
                (self.fatal_error_handler)(&e, "failure from the FeatureHub server");
            }
            SseEventKind::Other(kind) => {
                trace!("received SSE event '{kind}'");
            }
        }
    }

    fn handle_error_frame(&self, frame: &SseFrame) {
        let e = Error::FromApi {
            message: frame.data.clone(),
        };
        if self.store.is_ready() {
            error!("error from the FeatureHub server: {e}");
        } else {
            (self.fatal_error_handler)(&e, "error from the FeatureHub server");
        }
    }

    fn handle_config(&self, frame: &SseFrame) {
        let config: ConfigEvent = match serde_json::from_str(&frame.data) {
            Ok(config) => config,
            Err(e) => {
                error!("error decoding 'config' SSE payload: {e}");
                return;
            }
        };

        if config.edge_stale {
            warn!(
                "the FeatureHub server has requested that we close our connection (edge.stale); \
                 no further updates will be received, existing data will continue to be served"
            );
            self.close();
        }
    }

    fn handle_feature(&self, frame: &SseFrame) {
        let feature: FeatureState = match serde_json::from_str(&frame.data) {
            Ok(feature) => feature,
            Err(e) => {
                error!("error decoding 'feature' SSE payload: {e}");
                return;
            }
        };

        // Notification happens here, after the store lock has been released,
        // and before the next frame is consumed.
        if let Some(accepted) = self.store.apply_delta(feature) {
            self.notifiers.notify(&accepted);
        }
    }

    fn handle_features(&self, frame: &SseFrame) {
        let features: Vec<FeatureState> = match serde_json::from_str(&frame.data) {
            Ok(features) => features,
            Err(e) => {
                error!("error decoding 'features' SSE payload: {e}");
                return;
            }
        };

        for accepted in self.store.apply_snapshot(features) {
            self.notifiers.notify(&accepted);
        }
    }

    fn handle_delete_feature(&self, frame: &SseFrame) {
        let feature: FeatureState = match serde_json::from_str(&frame.data) {
            Ok(feature) => feature,
            Err(e) => {
                error!("error decoding 'delete_feature' SSE payload: {e}");
                return;
            }
        };

        self.store.apply_delete(&feature.key);
    }

    /// Stops both consumers and closes the transport. Cached data stays
    /// servable.
    pub fn close(&self) {
        self.is_running.store(false, Ordering::Release);
        *self.state.lock().expect("state lock poisoned") = State::Closed;
        self.transport.close();
    }
}
