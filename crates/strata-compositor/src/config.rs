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

//! Renderer-wide settings.

use crate::error::{XrError, XrResult};
use serde::{Deserialize, Serialize};
use strata_core::host::SessionRequest;

/// Global configuration for an [`XrRenderer`](crate::XrRenderer).
///
/// Every field has a default, so a settings file only lists what it changes:
///
/// ```
/// use strata_compositor::RendererSettings;
///
/// let settings = RendererSettings::from_ron("(antialias: false, allow_alpha_clip: false)").unwrap();
/// assert!(!settings.antialias);
/// assert!(settings.allow_native_layers);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Clear color, RGBA in `[0, 1]`.
    pub clear_color: [f32; 4],
    /// Clear before drawing unless a render call overrides it.
    pub auto_clear: bool,
    /// Multisample the base layer target.
    pub antialias: bool,
    /// Cull drawables outside the camera frustum.
    pub frustum_cull: bool,
    /// Allow layers to bind to host-native composition layers.
    pub allow_native_layers: bool,
    /// Mask native layers with an alpha-only clip instead of a depth clip.
    pub allow_alpha_clip: bool,
    /// Minimum `view_pixel_width * view_pixel_height` for native allocation.
    pub min_layer_pixel_area: u64,
    /// Presentation pass rendered by default.
    pub active_pass: u32,
    /// Default session request used by `request_xr(None)`.
    pub session: SessionRequest,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 0.0],
            auto_clear: true,
            antialias: true,
            frustum_cull: false,
            allow_native_layers: true,
            allow_alpha_clip: true,
            min_layer_pixel_area: 1,
            active_pass: 0,
            session: SessionRequest::default(),
        }
    }
}

impl RendererSettings {
    /// Parses settings from RON text. Missing fields keep their defaults.
    pub fn from_ron(text: &str) -> XrResult<Self> {
        let mut settings: Self = ron::from_str(text).map_err(|e| XrError::Settings(e.to_string()))?;
        for channel in settings.clear_color.iter_mut() {
            *channel = channel.clamp(0.0, 1.0);
        }
        Ok(settings)
    }

    /// Serializes the settings back to pretty RON.
    pub fn to_ron(&self) -> XrResult<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| XrError::Settings(e.to_string()))
    }
}
