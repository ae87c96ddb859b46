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
#![allow(clippy::result_large_err)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{LevelFilter, error, info, trace};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use tokio::sync::mpsc;
use url::Url;

use crate::analytics::{AnalyticsCollector, AnalyticsRegistry};
use crate::context::Context;
use crate::dispatcher::{Dispatcher, FatalErrorHandler, State};
use crate::error::Error;
use crate::notifiers::{Notifier, NotifierHandle, NotifierRegistry};
use crate::responses::FeatureState;
use crate::store::FeatureStore;
use crate::strategies;
use crate::transport::{self, SseFrame};

/// Characters percent-encoded inside the SDK key path component. `/` is
/// deliberately not in the set: FeatureHub SDK keys contain literal slashes
/// that the edge expects to receive as-is.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// The default fatal error handler: log and terminate the process. Override
/// it through the builder to make unrecoverable stream errors observable
/// instead, for example in tests.
pub fn default_fatal_error_handler() -> FatalErrorHandler {
    Arc::new(|e, message| {
        error!("{message}: {e}");
        std::process::exit(1);
    })
}

/// Streaming client configuration.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the FeatureHub edge, e.g. `http://localhost:8085`.
    pub server_address: String,
    /// Opaque credential embedded in the stream URL.
    pub sdk_key: String,
    /// Block `start` until the first payload has been accepted.
    pub wait_for_data: bool,
    /// Cap on the global log level applied when the client starts.
    pub log_level: LevelFilter,
    pub fatal_error_handler: Option<FatalErrorHandler>,
}

impl Config {
    pub fn new(server_address: impl Into<String>, sdk_key: impl Into<String>) -> Self {
        Self {
            server_address: server_address.into(),
            sdk_key: sdk_key.into(),
            wait_for_data: false,
            log_level: LevelFilter::Info,
            fatal_error_handler: None,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.server_address.trim().is_empty() {
            return Err(Error::bad_config("no server address provided"));
        }
        if self.sdk_key.trim().is_empty() {
            return Err(Error::bad_config("no SDK key provided"));
        }
        if let Err(e) = Url::parse(&self.server_address) {
            return Err(Error::bad_config(format!(
                "server address '{}' is not a valid URL: {e}",
                self.server_address
            )));
        }
        Ok(())
    }

    /// The stream URL: `{server_address}/features/{sdk_key}`.
    pub(crate) fn features_url(&self) -> String {
        format!(
            "{}/features/{}",
            self.server_address.trim_end_matches('/'),
            utf8_percent_encode(&self.sdk_key, PATH_SEGMENT)
        )
    }
}

/// A `ClientBuilder` can be used to create a [`StreamingClient`] with custom
/// configuration.
///
/// Example
/// ```rust
/// use featurehub_sse_client::client::ClientBuilder;
/// use featurehub_sse_client::context::Context;
///
/// let client = ClientBuilder::new()
///     .with_server_address("http://localhost:8085")
///     .with_sdk_key("default/71ed3c04-122b-4312-9ea8-06b2b8d6ceac")
///     .with_wait_for_data(true)
///     .connect()
///     .await?;
///
/// let ctx = client.with_context(Context::new().with_userkey("alice"));
/// if ctx.get_boolean("new-checkout")? {
///     // ...
/// }
/// ```
pub struct ClientBuilder {
    config: Config,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new("", ""),
        }
    }

    pub fn with_server_address(mut self, server_address: impl Into<String>) -> Self {
        self.config.server_address = server_address.into();
        self
    }

    pub fn with_sdk_key(mut self, sdk_key: impl Into<String>) -> Self {
        self.config.sdk_key = sdk_key.into();
        self
    }

    pub fn with_wait_for_data(mut self, wait_for_data: bool) -> Self {
        self.config.wait_for_data = wait_for_data;
        self
    }

    pub fn with_log_level(mut self, log_level: LevelFilter) -> Self {
        self.config.log_level = log_level;
        self
    }

    /// Replaces the default process-terminating handler for unrecoverable
    /// asynchronous errors.
    pub fn with_fatal_error_handler(
        mut self,
        handler: impl Fn(&Error, &str) + Send + Sync + 'static,
    ) -> Self {
        self.config.fatal_error_handler = Some(Arc::new(handler));
        self
    }

    /// Validates the configuration and returns it.
    pub fn build(self) -> Result<Config, Error> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Subscribes and starts consuming: `StreamingClient::new` followed by
    /// `start`.
    pub async fn connect(self) -> Result<StreamingClient, Error> {
        let client = StreamingClient::new(self.build()?).await?;
        client.start().await?;
        Ok(client)
    }
}

/// A client that maintains a live mirror of the feature store by consuming
/// the edge's SSE stream. Queries are synchronous in-memory lookups and can
/// be issued from any thread while the stream is consumed in the background.
pub struct StreamingClient {
    config: Config,
    store: Arc<FeatureStore>,
    notifiers: Arc<NotifierRegistry>,
    analytics: Arc<AnalyticsRegistry>,
    fatal_error_handler: FatalErrorHandler,
    is_running: Arc<AtomicBool>,
    state: Arc<Mutex<State>>,
    transport: Arc<transport::StreamHandle>,
    channels: Mutex<Option<(mpsc::Receiver<SseFrame>, mpsc::Receiver<Error>)>>,
    readiness_listener: Arc<Mutex<Option<Box<dyn Fn() + Send + Sync>>>>,
}

impl StreamingClient {
    /// Validates the configuration and performs the HTTP upgrade against the
    /// feature stream. The returned client is subscribed but not yet
    /// consuming; call [`StreamingClient::start`].
    pub async fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;
        log::set_max_level(config.log_level);

        let state = Arc::new(Mutex::new(State::Idle));
        info!(
            "subscribing to the FeatureHub server at {}",
            config.server_address
        );
        let stream = transport::subscribe(&config.features_url()).await?;
        *state.lock().expect("state lock poisoned") = State::Subscribing;

        let fatal_error_handler = config
            .fatal_error_handler
            .clone()
            .unwrap_or_else(default_fatal_error_handler);

        Ok(Self {
            config,
            store: Arc::new(FeatureStore::new()),
            notifiers: Arc::new(NotifierRegistry::new()),
            analytics: Arc::new(AnalyticsRegistry::new()),
            fatal_error_handler,
            is_running: Arc::new(AtomicBool::new(false)),
            state,
            transport: Arc::new(stream.handle),
            channels: Mutex::new(Some((stream.events, stream.errors))),
            readiness_listener: Arc::new(Mutex::new(None)),
        })
    }

    /// Spawns the event and error consumers. When the configuration asks to
    /// wait for data, blocks until the store has accepted its first payload.
    pub async fn start(&self) -> Result<(), Error> {
        let Some((events, errors)) = self
            .channels
            .lock()
            .expect("channel lock poisoned")
            .take()
        else {
            return Err(Error::bad_config("the client has already been started"));
        };

        self.is_running.store(true, Ordering::Release);
        *self.state.lock().expect("state lock poisoned") = State::Running;

        let dispatcher = Dispatcher::new(
            Arc::clone(&self.store),
            Arc::clone(&self.notifiers),
            Arc::clone(&self.is_running),
            Arc::clone(&self.state),
            Arc::clone(&self.transport),
            Arc::clone(&self.fatal_error_handler),
        );
        tokio::spawn(dispatcher.clone().run_events(events));
        tokio::spawn(dispatcher.run_errors(errors));

        let mut ready = self.store.ready_signal();
        let listener = Arc::clone(&self.readiness_listener);
        tokio::spawn(async move {
            if ready.wait_for(|ready| *ready).await.is_ok() {
                match &*listener.lock().expect("listener lock poisoned") {
                    Some(callback) => {
                        trace!("calling the readiness listener");
                        callback();
                    }
                    None => trace!("no registered readiness listener to call"),
                }
            }
        });

        if self.config.wait_for_data {
            let mut ready = self.store.ready_signal();
            let _ = ready.wait_for(|ready| *ready).await;
        }

        Ok(())
    }

    /// Stops both consumers and closes the transport. Cached features remain
    /// servable.
    pub fn close(&self) {
        self.is_running.store(false, Ordering::Release);
        *self.state.lock().expect("state lock poisoned") = State::Closed;
        self.transport.close();
    }

    pub fn state(&self) -> State {
        *self.state.lock().expect("state lock poisoned")
    }

    /// Whether the store has accepted at least one payload.
    pub fn is_ready(&self) -> bool {
        self.store.is_ready()
    }

    /// Registers a callback fired once, when the client first becomes ready.
    pub fn on_ready(&self, callback: impl Fn() + Send + Sync + 'static) {
        let mut listener = self
            .readiness_listener
            .lock()
            .expect("listener lock poisoned");
        *listener = Some(Box::new(callback));
    }

    /// Returns a lightweight binding that evaluates strategies against
    /// `context` on every typed lookup. The underlying client is shared.
    pub fn with_context(&self, context: Context) -> ContextClient<'_> {
        ContextClient {
            client: self,
            context,
        }
    }

    /// Fetches the raw replicated state for `key`.
    pub fn get_feature(&self, key: &str) -> Result<FeatureState, Error> {
        self.store.get(key)
    }

    pub fn get_boolean(&self, key: &str) -> Result<bool, Error> {
        resolve_boolean(&self.store.get(key)?, None)
    }

    pub fn get_number(&self, key: &str) -> Result<f64, Error> {
        resolve_number(&self.store.get(key)?, None)
    }

    pub fn get_string(&self, key: &str) -> Result<String, Error> {
        resolve_string(&self.store.get(key)?, None)
    }

    pub fn get_raw_json(&self, key: &str) -> Result<String, Error> {
        resolve_json(&self.store.get(key)?, None)
    }

    pub fn add_notifier_boolean(
        &self,
        feature_key: &str,
        callback: impl Fn(Result<bool, Error>) + Send + Sync + 'static,
    ) -> NotifierHandle {
        self.notifiers.register(feature_key, Notifier::boolean(callback))
    }

    pub fn add_notifier_number(
        &self,
        feature_key: &str,
        callback: impl Fn(Result<f64, Error>) + Send + Sync + 'static,
    ) -> NotifierHandle {
        self.notifiers.register(feature_key, Notifier::number(callback))
    }

    pub fn add_notifier_string(
        &self,
        feature_key: &str,
        callback: impl Fn(Result<String, Error>) + Send + Sync + 'static,
    ) -> NotifierHandle {
        self.notifiers.register(feature_key, Notifier::string(callback))
    }

    pub fn add_notifier_json(
        &self,
        feature_key: &str,
        callback: impl Fn(Result<String, Error>) + Send + Sync + 'static,
    ) -> NotifierHandle {
        self.notifiers.register(feature_key, Notifier::json(callback))
    }

    pub fn add_notifier_feature(
        &self,
        feature_key: &str,
        callback: impl Fn(&FeatureState) + Send + Sync + 'static,
    ) -> NotifierHandle {
        self.notifiers.register(feature_key, Notifier::feature(callback))
    }

    /// Removes a previously registered notifier, by key and handle (more
    /// than one notifier may watch a key).
    pub fn delete_notifier(
        &self,
        feature_key: &str,
        handle: &NotifierHandle,
    ) -> Result<(), Error> {
        self.notifiers.deregister(feature_key, handle)
    }

    pub fn add_analytics_collector(&self, collector: impl AnalyticsCollector + 'static) {
        self.analytics.add(Arc::new(collector));
    }

    /// Sends an analytics event with a snapshot of the current feature map
    /// to every registered collector. Fire and forget.
    pub fn log_analytics_event(&self, action: &str, tags: &HashMap<String, String>) {
        self.analytics.log_event(action, tags, self.store.snapshot());
    }

    /// Sends an analytics event and waits for every collector to finish.
    pub fn log_analytics_event_sync(
        &self,
        action: &str,
        tags: &HashMap<String, String>,
    ) -> Result<(), Error> {
        self.analytics
            .log_event_sync(action, tags, &self.store.snapshot())
    }
}

/// A [`StreamingClient`] bound to an evaluation [`Context`]. Typed lookups
/// made through this binding run the strategy evaluator with the bound
/// context before falling back to the feature's default value.
pub struct ContextClient<'a> {
    client: &'a StreamingClient,
    context: Context,
}

impl ContextClient<'_> {
    pub fn client(&self) -> &StreamingClient {
        self.client
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Rebinds to a different context; the underlying client is inherited.
    pub fn with_context(&self, context: Context) -> ContextClient<'_> {
        self.client.with_context(context)
    }

    pub fn get_feature(&self, key: &str) -> Result<FeatureState, Error> {
        self.client.get_feature(key)
    }

    pub fn get_boolean(&self, key: &str) -> Result<bool, Error> {
        resolve_boolean(&self.client.store.get(key)?, Some(&self.context))
    }

    pub fn get_number(&self, key: &str) -> Result<f64, Error> {
        resolve_number(&self.client.store.get(key)?, Some(&self.context))
    }

    pub fn get_string(&self, key: &str) -> Result<String, Error> {
        resolve_string(&self.client.store.get(key)?, Some(&self.context))
    }

    pub fn get_raw_json(&self, key: &str) -> Result<String, Error> {
        resolve_json(&self.client.store.get(key)?, Some(&self.context))
    }

    pub fn add_notifier_boolean(
        &self,
        feature_key: &str,
        callback: impl Fn(Result<bool, Error>) + Send + Sync + 'static,
    ) -> NotifierHandle {
        self.client.add_notifier_boolean(feature_key, callback)
    }

    pub fn add_notifier_number(
        &self,
        feature_key: &str,
        callback: impl Fn(Result<f64, Error>) + Send + Sync + 'static,
    ) -> NotifierHandle {
        self.client.add_notifier_number(feature_key, callback)
    }

    pub fn add_notifier_string(
        &self,
        feature_key: &str,
        callback: impl Fn(Result<String, Error>) + Send + Sync + 'static,
    ) -> NotifierHandle {
        self.client.add_notifier_string(feature_key, callback)
    }

    pub fn add_notifier_json(
        &self,
        feature_key: &str,
        callback: impl Fn(Result<String, Error>) + Send + Sync + 'static,
    ) -> NotifierHandle {
        self.client.add_notifier_json(feature_key, callback)
    }

    pub fn add_notifier_feature(
        &self,
        feature_key: &str,
        callback: impl Fn(&FeatureState) + Send + Sync + 'static,
    ) -> NotifierHandle {
        self.client.add_notifier_feature(feature_key, callback)
    }

    pub fn delete_notifier(
        &self,
        feature_key: &str,
        handle: &NotifierHandle,
    ) -> Result<(), Error> {
        self.client.delete_notifier(feature_key, handle)
    }

    pub fn add_analytics_collector(&self, collector: impl AnalyticsCollector + 'static) {
        self.client.add_analytics_collector(collector);
    }

    pub fn log_analytics_event(&self, action: &str, tags: &HashMap<String, String>) {
        self.client.log_analytics_event(action, tags);
    }

    pub fn log_analytics_event_sync(
        &self,
        action: &str,
        tags: &HashMap<String, String>,
    ) -> Result<(), Error> {
        self.client.log_analytics_event_sync(action, tags)
    }

    pub fn on_ready(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.client.on_ready(callback);
    }
}

fn resolve_boolean(feature: &FeatureState, context: Option<&Context>) -> Result<bool, Error> {
    let default = feature.boolean_value()?;
    if let Some(matched) = strategies::evaluate(&feature.strategies, context)
        && let Some(value) = matched.as_bool()
    {
        return Ok(value);
    }
    Ok(default)
}

fn resolve_number(feature: &FeatureState, context: Option<&Context>) -> Result<f64, Error> {
    let default = feature.number_value()?;
    if let Some(matched) = strategies::evaluate(&feature.strategies, context)
        && let Some(value) = matched.as_f64()
    {
        return Ok(value);
    }
    Ok(default)
}

fn resolve_string(feature: &FeatureState, context: Option<&Context>) -> Result<String, Error> {
    let default = feature.string_value()?;
    if let Some(matched) = strategies::evaluate(&feature.strategies, context)
        && let Some(value) = matched.as_str()
    {
        return Ok(value.to_owned());
    }
    Ok(default)
}

fn resolve_json(feature: &FeatureState, context: Option<&Context>) -> Result<String, Error> {
    let default = feature.json_value()?;
    if let Some(matched) = strategies::evaluate(&feature.strategies, context)
        && let Some(value) = matched.as_str()
    {
        return Ok(value.to_owned());
    }
    Ok(default)
}
