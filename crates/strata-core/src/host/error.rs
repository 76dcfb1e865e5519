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

use std::fmt;

/// An error reported by the immersive host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The requested session mode is not available on this device.
    NotSupported(String),
    /// The user or the platform declined the request.
    Rejected(String),
    /// The session has already ended.
    SessionEnded,
    /// A layer handle does not belong to this session.
    UnknownLayer(u64),
    /// The host failed for another reason.
    Internal(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::NotSupported(what) => write!(f, "Not supported by the host: {what}"),
            HostError::Rejected(reason) => write!(f, "Request rejected by the host: {reason}"),
            HostError::SessionEnded => write!(f, "The session has already ended."),
            HostError::UnknownLayer(id) => write!(f, "Unknown host layer handle: {id}"),
            HostError::Internal(msg) => write!(f, "Host error: {msg}"),
        }
    }
}

impl std::error::Error for HostError {}
