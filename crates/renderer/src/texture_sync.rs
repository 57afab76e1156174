use render_protocol::{DirtyRegion, Point, Rect, Size};

use crate::upload_plan::{
    BYTES_PER_PIXEL, RegionWrite, UploadKind, UploadOp, UploadPlan, UploadPlanError,
    plan_popup_upload, plan_view_upload,
};

/// Destination of planned uploads: the GPU texture, or a CPU mirror in tests.
pub trait TextureUploadTarget {
    fn respecify(&mut self, size: Size);
    fn write_region(&mut self, write: &RegionWrite, buffer: &[u8]);
}

/// Bookkeeping for the view texture: its size and the last update rectangle.
#[derive(Debug, Clone, Default)]
pub struct TextureSync {
    view_size: Size,
    update_rect: Option<Rect>,
    show_update_rect: bool,
}

impl TextureSync {
    pub fn new(show_update_rect: bool) -> Self {
        Self {
            view_size: Size::default(),
            update_rect: None,
            show_update_rect,
        }
    }

    pub fn view_size(&self) -> Size {
        self.view_size
    }

    pub fn update_rect(&self) -> Option<Rect> {
        self.update_rect
    }

    pub fn apply_view(
        &mut self,
        target: &mut dyn TextureUploadTarget,
        dirty: &DirtyRegion,
        buffer: &[u8],
        width: i32,
        height: i32,
    ) -> Result<UploadKind, UploadPlanError> {
        let plan = plan_view_upload(self.view_size, dirty, width, height, buffer.len())?;
        self.view_size = Size::new(width, height);
        if self.show_update_rect {
            self.update_rect = dirty.first();
        }
        execute_plan(&plan, target, buffer);
        Ok(plan.kind())
    }

    pub fn apply_popup(
        &mut self,
        target: &mut dyn TextureUploadTarget,
        effective_rect: Rect,
        buffer: &[u8],
        width: i32,
        height: i32,
    ) -> Result<UploadKind, UploadPlanError> {
        let plan = plan_popup_upload(self.view_size, effective_rect, width, height, buffer.len())?;
        execute_plan(&plan, target, buffer);
        Ok(plan.kind())
    }
}

fn execute_plan(plan: &UploadPlan, target: &mut dyn TextureUploadTarget, buffer: &[u8]) {
    for op in plan.ops() {
        match op {
            UploadOp::Respecify(size) => target.respecify(*size),
            UploadOp::Write(write) => target.write_region(write, buffer),
        }
    }
}

/// Byte offset of the first source pixel of `write` inside the engine buffer.
pub fn source_byte_offset(write: &RegionWrite) -> usize {
    let Point { x, y } = write.source_origin;
    (y as usize * write.source_stride as usize + x as usize) * BYTES_PER_PIXEL
}

#[cfg(any(test, feature = "test-helpers"))]
mod cpu_texture {
    use render_protocol::Size;

    use super::{TextureUploadTarget, source_byte_offset};
    use crate::upload_plan::{BYTES_PER_PIXEL, RegionWrite};

    /// CPU copy of the view texture with the same write semantics as the GPU path.
    #[derive(Debug, Clone, Default)]
    pub struct CpuTexture {
        size: Size,
        pixels: Vec<u8>,
        respecify_count: usize,
        write_count: usize,
    }

    impl CpuTexture {
        pub fn size(&self) -> Size {
            self.size
        }

        pub fn pixels(&self) -> &[u8] {
            &self.pixels
        }

        pub fn respecify_count(&self) -> usize {
            self.respecify_count
        }

        pub fn write_count(&self) -> usize {
            self.write_count
        }

        pub fn pixel(&self, x: i32, y: i32) -> [u8; 4] {
            let offset = (y as usize * self.size.width as usize + x as usize) * BYTES_PER_PIXEL;
            let mut texel = [0; 4];
            texel.copy_from_slice(&self.pixels[offset..offset + BYTES_PER_PIXEL]);
            texel
        }
    }

    impl TextureUploadTarget for CpuTexture {
        fn respecify(&mut self, size: Size) {
            self.size = size;
            self.pixels = vec![0; size.width as usize * size.height as usize * BYTES_PER_PIXEL];
            self.respecify_count += 1;
        }

        fn write_region(&mut self, write: &RegionWrite, buffer: &[u8]) {
            assert!(
                write.dest.right() <= self.size.width && write.dest.bottom() <= self.size.height,
                "region {:?} exceeds texture {:?}",
                write.dest,
                self.size
            );
            let row_bytes = write.dest.width as usize * BYTES_PER_PIXEL;
            let source_row_pitch = write.source_stride as usize * BYTES_PER_PIXEL;
            let dest_row_pitch = self.size.width as usize * BYTES_PER_PIXEL;
            let source_start = source_byte_offset(write);
            for row in 0..write.dest.height as usize {
                let source = source_start + row * source_row_pitch;
                let dest = (write.dest.y as usize + row) * dest_row_pitch
                    + write.dest.x as usize * BYTES_PER_PIXEL;
                self.pixels[dest..dest + row_bytes]
                    .copy_from_slice(&buffer[source..source + row_bytes]);
            }
            self.write_count += 1;
        }
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use cpu_texture::CpuTexture;
