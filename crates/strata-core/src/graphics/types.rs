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

//! Plain data types shared by every [`GraphicsContext`](super::GraphicsContext) implementation.

use std::ops::BitOr;

/// An opaque handle to a framebuffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferId(pub u32);

/// An opaque handle to a renderbuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderbufferId(pub u32);

/// An opaque handle to a 2D texture, owned either by the application or by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// An opaque handle to a linked shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// An opaque handle to a vertex array (vertex + index storage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayId(pub u32);

/// Which framebuffer binding point an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferTarget {
    /// Both read and draw binding points.
    Framebuffer,
    /// The read binding point, source of copies and blits.
    Read,
    /// The draw binding point, destination of draws and blits.
    Draw,
}

/// A framebuffer attachment slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attachment {
    /// First color attachment.
    Color0,
    /// Depth attachment.
    Depth,
}

/// Storage format of a renderbuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderbufferFormat {
    /// 8-bit RGBA color.
    Rgba8,
    /// 24-bit depth.
    Depth24,
}

/// Sampling filter for framebuffer blits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlitFilter {
    /// Nearest sample, required when depth is part of the blit.
    Nearest,
    /// Bilinear filtering.
    Linear,
}

/// A set of buffer planes, used by `clear` and `blit_framebuffer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferMask(u8);

impl BufferMask {
    /// No planes.
    pub const NONE: Self = Self(0);
    /// The color plane.
    pub const COLOR: Self = Self(1);
    /// The depth plane.
    pub const DEPTH: Self = Self(1 << 1);
    /// The stencil plane.
    pub const STENCIL: Self = Self(1 << 2);

    /// Returns `true` when every plane in `other` is in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for BufferMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Viewport {
    /// Left edge in pixels.
    pub x: i32,
    /// Bottom edge in pixels.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Viewport {
    /// A viewport anchored at the origin.
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Optional features a graphics context may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicsCapabilities {
    /// Textures can be attached as implicitly multisampled render targets,
    /// with the resolve performed by the driver.
    pub multisampled_render_to_texture: bool,
    /// Framebuffer contents can be discarded after use.
    pub invalidate_framebuffer: bool,
    /// Maximum multisample count for renderbuffers.
    pub max_samples: u32,
}

impl Default for GraphicsCapabilities {
    fn default() -> Self {
        Self {
            multisampled_render_to_texture: false,
            invalidate_framebuffer: false,
            max_samples: 4,
        }
    }
}

/// A blend factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// `0`
    Zero,
    /// `1`
    One,
    /// Source alpha.
    SrcAlpha,
    /// `1 - source alpha`.
    OneMinusSrcAlpha,
}

/// Separate color/alpha blend factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    /// Source color factor.
    pub src: BlendFactor,
    /// Destination color factor.
    pub dst: BlendFactor,
    /// Source alpha factor.
    pub src_alpha: BlendFactor,
    /// Destination alpha factor.
    pub dst_alpha: BlendFactor,
}

impl BlendState {
    /// Standard non-premultiplied alpha blending.
    pub const ALPHA: Self = Self {
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::OneMinusSrcAlpha,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::OneMinusSrcAlpha,
    };
}

/// Fixed-function state for a draw call. Also drives render-list bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineState {
    /// Drawn in a transparent bucket when `true`.
    pub transparent: bool,
    /// Depth testing enabled.
    pub depth_test: bool,
    /// Depth writes enabled.
    pub depth_write: bool,
    /// Blend state, `None` disables blending.
    pub blend: Option<BlendState>,
    /// Back-face culling.
    pub cull_back_faces: bool,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            transparent: false,
            depth_test: true,
            depth_write: true,
            blend: None,
            cull_back_faces: true,
        }
    }
}
