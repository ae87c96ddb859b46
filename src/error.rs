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
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid client configuration: {message}")]
    BadConfig { message: String },
    #[error("no feature found for key '{key}'")]
    FeatureNotFound { key: String },
    #[error("feature value type mismatch: {message}")]
    InvalidType { message: String },
    #[error("no notifier registered for key '{key}'")]
    NotifierNotFound { key: String },
    #[error("the FeatureHub server reported an error: {message}")]
    FromApi { message: String },
    #[error("feature stream transport error: {message}")]
    Transport { message: String },
    #[error("one or more analytics collectors failed: {}", messages.join("; "))]
    Analytics { messages: Vec<String> },
}

impl Error {
    pub(crate) fn bad_config(message: impl Into<String>) -> Self {
        Error::BadConfig {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_type(message: impl Into<String>) -> Self {
        Error::InvalidType {
            message: message.into(),
        }
    }

    pub(crate) fn transport(error: impl std::fmt::Display) -> Self {
        Error::Transport {
            message: error.to_string(),
        }
    }
}
