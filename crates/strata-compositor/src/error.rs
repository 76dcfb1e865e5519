// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error type of the compositor.
//!
//! Only negotiation failures and API misuse surface here. Missing layer
//! support, attachment changes and host-initiated session ends are handled
//! internally and reported through logging and session events.

use crate::layer::{LayerId, LayerKind};
use strata_core::graphics::ResourceError;
use strata_core::host::HostError;
use thiserror::Error;

/// Errors returned by the compositor API.
#[derive(Debug, Error)]
pub enum XrError {
    /// The host refused to create the session.
    #[error("session negotiation failed: {0}")]
    SessionNegotiationFailed(#[source] HostError),

    /// A session is already running. End it before requesting another one.
    #[error("an immersive session is already active")]
    SessionAlreadyActive,

    /// The operation needs an active session.
    #[error("no immersive session is active")]
    NoActiveSession,

    /// A layer was used outside of a renderer or in an inconsistent state.
    #[error("invalid layer state for {layer:?}: {reason}")]
    InvalidLayerState {
        /// The offending layer, if known.
        layer: Option<LayerId>,
        /// What went wrong.
        reason: &'static str,
    },

    /// The layer kind cannot be created.
    #[error("unsupported layer kind: {0:?}")]
    UnsupportedLayer(LayerKind),

    /// A graphics resource failed.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// The host failed outside of negotiation.
    #[error("host error: {0}")]
    Host(#[from] HostError),

    /// Renderer settings could not be parsed.
    #[error("invalid renderer settings: {0}")]
    Settings(String),
}

/// Result alias used across the compositor.
pub type XrResult<T> = Result<T, XrError>;
