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

//! Frame scheduling and render-list construction.

mod render_list;
mod scheduler;

pub use self::render_list::{
    build_render_list, rendered_nodes, sort_render_list, RenderItem, RenderListOptions,
    RenderSource,
};
pub use self::scheduler::{FrameDriver, FrameRequestId, FrameScheduler};

use strata_core::host::HostFrame;

/// Passed to every frame callback of a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Timestamp of the tick in milliseconds.
    pub time: f64,
    /// Host frame when the tick comes from an immersive session.
    pub frame: Option<HostFrame>,
}
