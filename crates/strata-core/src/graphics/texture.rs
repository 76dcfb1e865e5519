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

//! Application-owned textures that feed composition layers.

use super::types::TextureId;
use std::cell::Cell;

/// A 2D texture produced by the application (a canvas, a video frame, a UI
/// panel) and displayed through a composition layer.
///
/// The texture carries a revision counter instead of a change callback.
/// Consumers remember the last revision they handled and compare against
/// [`ContentTexture::revision`] to learn about new content. Share it as
/// `Rc<ContentTexture>`.
#[derive(Debug)]
pub struct ContentTexture {
    id: Cell<Option<TextureId>>,
    width: Cell<u32>,
    height: Cell<u32>,
    revision: Cell<u64>,
}

impl ContentTexture {
    /// Wraps an uploaded texture.
    pub fn new(id: TextureId, width: u32, height: u32) -> Self {
        Self {
            id: Cell::new(Some(id)),
            width: Cell::new(width),
            height: Cell::new(height),
            revision: Cell::new(1),
        }
    }

    /// A texture whose GPU storage does not exist yet.
    pub fn pending(width: u32, height: u32) -> Self {
        Self {
            id: Cell::new(None),
            width: Cell::new(width),
            height: Cell::new(height),
            revision: Cell::new(0),
        }
    }

    /// The GPU texture, if uploaded.
    pub fn id(&self) -> Option<TextureId> {
        self.id.get()
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width.get()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height.get()
    }

    /// `true` when there is GPU storage with a non-empty area.
    pub fn is_ready(&self) -> bool {
        self.id.get().is_some() && u64::from(self.width.get()) * u64::from(self.height.get()) > 0
    }

    /// Monotonic content revision.
    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    /// Signals that new pixels were uploaded.
    pub fn mark_updated(&self) {
        self.revision.set(self.revision.get() + 1);
    }

    /// Records a (re)upload with new storage and size.
    pub fn upload(&self, id: TextureId, width: u32, height: u32) {
        self.id.set(Some(id));
        self.width.set(width);
        self.height.set(height);
        self.mark_updated();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_bumps_on_every_update() {
        let tex = ContentTexture::new(TextureId(3), 64, 32);
        let start = tex.revision();
        tex.mark_updated();
        tex.mark_updated();
        assert_eq!(tex.revision(), start + 2);
    }

    #[test]
    fn test_pending_texture_is_not_ready() {
        let tex = ContentTexture::pending(16, 16);
        assert!(!tex.is_ready());
        tex.upload(TextureId(9), 16, 0);
        assert!(!tex.is_ready(), "zero-area storage is never ready");
        tex.upload(TextureId(9), 16, 8);
        assert!(tex.is_ready());
        assert_eq!(tex.height(), 8);
    }
}
