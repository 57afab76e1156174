//! Renderer crate root.
//!
//! The compositor owns one BGRA texture holding the engine's view pixels. Popup
//! pixels are written into the same texture at the popup's effective rect. Each
//! frame clears, draws the background gradient, then the textured view quad
//! under the spin rotation, and finally the optional update-rect outline.
//!
//! Internal layout:
//! - `upload_plan`: pure planning of full, partial and popup uploads.
//! - `texture_sync`: executes plans against a `TextureUploadTarget`.
//! - `geometry`: vertex data and clip matrices.
//! - `compositor`: the wgpu-backed `OsrCompositor`.

mod compositor;
pub mod geometry;
pub mod texture_sync;
pub mod upload_plan;

#[cfg(test)]
mod wgsl_tests;

use render_protocol::{ArgbColor, DirtyRegion, PaintElementType, Rect, Size};
use thiserror::Error;
use view::{PopupOverlay, SpinTransform};

pub use compositor::{OsrCompositor, VIEW_TEXTURE_FORMAT};
pub use texture_sync::{TextureSync, TextureUploadTarget};
pub use upload_plan::{UploadKind, UploadPlanError};

#[cfg(any(test, feature = "test-helpers"))]
pub use texture_sync::CpuTexture;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompositorConfig {
    pub background_color: ArgbColor,
    pub show_update_rect: bool,
}

impl CompositorConfig {
    /// Pages are composited with premultiplied alpha only over a transparent background.
    pub fn is_transparent(&self) -> bool {
        self.background_color.is_transparent()
    }

    pub fn clear_color(&self) -> [f64; 4] {
        if self.is_transparent() {
            return [0.0, 0.0, 0.0, 0.0];
        }
        let channel = |value: u8| f64::from(value) / 255.0;
        [
            channel(self.background_color.red()),
            channel(self.background_color.green()),
            channel(self.background_color.blue()),
            1.0,
        ]
    }
}

/// One pixel-buffer callback from the engine. `buffer` is BGRA, premultiplied,
/// `width * height * 4` bytes, rows tightly packed.
#[derive(Debug, Clone, Copy)]
pub struct PixelUpdate<'a> {
    pub element: PaintElementType,
    pub dirty: &'a DirtyRegion,
    pub buffer: &'a [u8],
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Error)]
pub enum PresentError {
    #[error("surface acquisition failed: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

/// Compositor operations the window glue drives.
pub trait FrameCompositor {
    /// Creates GPU resources on first use; later calls do nothing.
    fn initialize(&mut self);
    fn on_pixel_update(&mut self, update: PixelUpdate<'_>, popup: &PopupOverlay);
    /// Draws and presents one frame. Does nothing while the view size is zero.
    fn render(&mut self) -> Result<(), PresentError>;
    fn resize_surface(&mut self, width: u32, height: u32);
    fn reconfigure_surface(&mut self);
    fn set_spin(&mut self, spin_x: f32, spin_y: f32);
    fn increment_spin(&mut self, delta_x: f32, delta_y: f32);
    fn spin(&self) -> SpinTransform;
    fn view_size(&self) -> Size;
    fn update_rect(&self) -> Option<Rect>;
}
