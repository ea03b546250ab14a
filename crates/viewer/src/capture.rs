//! Tiled image capture.
//!
//! A capture larger than the renderer's biggest target is rendered as a
//! grid of tiles, each showing one sub-rectangle of the pane's viewing
//! volume, and stitched into a single RGBA buffer.

use shared::{CapturedImage, PixelRect};

use crate::error::{ViewerError, ViewerResult};
use crate::layout;
use crate::renderer::{RenderOptions, SceneRenderer};
use crate::scheduler::IdleScheduler;
use crate::window::Window;

const BPP: usize = CapturedImage::BYTES_PER_PIXEL;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureOptions {
    /// Image size; 0 uses the window's current size
    pub width: u32,
    pub height: u32,
    /// Overrides the configured antialias level
    pub antialias: Option<u32>,
    /// Overrides the configured transparency layers
    pub transparency_layers: Option<u32>,
    /// Render through the window buffer instead of an offscreen target
    pub onscreen: bool,
}

impl CaptureOptions {
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }
}

fn tile_spans(length: u32, cap: u32) -> Vec<(u32, u32)> {
    let count = length.div_ceil(cap);
    let size = length.div_ceil(count);
    let mut spans = Vec::with_capacity(count as usize);
    let mut start = 0;
    while start < length {
        let len = size.min(length - start);
        spans.push((start, len));
        start += len;
    }
    spans
}

/// Split a `width` x `height` pane into tiles no larger than
/// `cap_width` x `cap_height`. Tiles are balanced; the last column and row
/// take the remainder. Rectangles are pane-relative with a bottom-left
/// origin.
pub fn plan_tiles(width: u32, height: u32, cap_width: u32, cap_height: u32) -> Vec<PixelRect> {
    if width == 0 || height == 0 || cap_width == 0 || cap_height == 0 {
        return Vec::new();
    }
    let columns = tile_spans(width, cap_width);
    let rows = tile_spans(height, cap_height);
    let mut tiles = Vec::with_capacity(columns.len() * rows.len());
    for &(y, h) in &rows {
        for &(x, w) in &columns {
            tiles.push(PixelRect::new(x as i32, y as i32, w, h));
        }
    }
    tiles
}

impl<R: SceneRenderer, S: IdleScheduler> Window<R, S> {
    /// Render the current layout into one RGBA image, rows top to bottom
    pub fn capture(&mut self, options: &CaptureOptions) -> ViewerResult<CapturedImage> {
        let count = self.pane_count();
        if options.onscreen && count > 1 {
            let msg = format!(
                "on-screen capture needs a single-pane layout, {} has {count}",
                self.layout_mode.name()
            );
            tracing::warn!("{msg}");
            return Err(ViewerError::PolicyViolation(msg));
        }

        let width = if options.width == 0 { self.width } else { options.width };
        let height = if options.height == 0 { self.height } else { options.height };
        let border = if count > 1 { self.settings.capture.pane_border } else { 0 };
        let rects = layout::pane_rects(self.layout_mode, width, height, border).ok_or_else(|| {
            ViewerError::InvalidArgument(format!("capture size {width}x{height} is too small for the layout"))
        })?;

        let cap = if options.onscreen {
            let pane = self.current_pane;
            let target = self.viewports[pane]
                .render_target()
                .ok_or(ViewerError::MissingRenderTarget { pane })?;
            (target.width, target.height)
        } else {
            let (max_w, max_h) = self.scheduler.renderer().max_offscreen_size();
            (
                self.settings.capture.max_tile_width.min(max_w),
                self.settings.capture.max_tile_height.min(max_h),
            )
        };
        if cap.0 == 0 || cap.1 == 0 {
            return Err(ViewerError::ResourceExhausted("renderer has no usable tile size".into()));
        }

        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(BPP))
            .ok_or_else(|| ViewerError::ResourceExhausted(format!("{width}x{height} image is too large")))?;
        let mut buffer: Vec<u8> = Vec::new();
        buffer
            .try_reserve_exact(len)
            .map_err(|e| ViewerError::ResourceExhausted(format!("capture buffer of {len} bytes: {e}")))?;
        buffer.resize(len, 0);

        let plans: Vec<Vec<PixelRect>> = rects
            .iter()
            .map(|r| plan_tiles(r.width, r.height, cap.0, cap.1))
            .collect();
        let render_options = RenderOptions {
            antialias: options.antialias.unwrap_or(self.settings.capture.antialias),
            transparency_layers: options
                .transparency_layers
                .unwrap_or(self.settings.capture.transparency_layers),
            background: self.settings.viewport.background_color,
            offscreen: !options.onscreen,
        };

        if !options.onscreen {
            let tile_w = plans.iter().flatten().map(|t| t.width).max().unwrap_or(1);
            let tile_h = plans.iter().flatten().map(|t| t.height).max().unwrap_or(1);
            self.scheduler
                .renderer_mut()
                .create_offscreen_target(tile_w, tile_h)
                .map_err(|e| ViewerError::ResourceExhausted(format!("offscreen target {tile_w}x{tile_h}: {e}")))?;
        }

        let result = self.render_tiles(&rects, &plans, &render_options, width, &mut buffer);

        if options.onscreen {
            // the window buffer now holds the last tile
            self.scheduler.request_redraw(self.current_pane);
        } else {
            self.scheduler.renderer_mut().release_offscreen_target();
        }
        let tiles = result?;

        // readback rows run bottom to top
        let stride = width as usize * BPP;
        let mut pixels = Vec::with_capacity(len);
        for row in buffer.chunks_exact(stride).rev() {
            pixels.extend_from_slice(row);
        }

        tracing::info!(width, height, tiles, panes = count, "capture complete");
        Ok(CapturedImage { width, height, pixels })
    }

    /// Render every tile into the bottom-up `buffer`. Returns the number of
    /// tiles rendered.
    fn render_tiles(
        &mut self,
        rects: &[PixelRect],
        plans: &[Vec<PixelRect>],
        options: &RenderOptions,
        image_width: u32,
        buffer: &mut [u8],
    ) -> ViewerResult<usize> {
        let stride = image_width as usize * BPP;
        let mut rendered = 0;
        for (pane, (rect, tiles)) in rects.iter().zip(plans).enumerate() {
            let effective = self.viewports[pane].effective_volume(rect.width, rect.height);
            let saved = self.viewports[pane].view_state();

            for tile in tiles {
                let sub = effective.sub_volume(tile, rect.width, rect.height);
                self.viewports[pane].override_for_tile(sub, tile.width, tile.height);

                let vp = &self.viewports[pane];
                let pixels = self
                    .scheduler
                    .render(pane, vp, options, false)
                    .and_then(|_| {
                        self.scheduler
                            .renderer_mut()
                            .read_pixels(tile.width, tile.height)
                            .map_err(|e| ViewerError::from_render(pane, e))
                    });
                self.viewports[pane].restore_view_state(saved);
                let pixels = pixels?;

                let tile_stride = tile.width as usize * BPP;
                if pixels.len() < tile_stride * tile.height as usize {
                    return Err(ViewerError::InvalidArgument(format!(
                        "renderer returned {} bytes for a {}x{} tile",
                        pixels.len(),
                        tile.width,
                        tile.height
                    )));
                }
                let x = (rect.left + tile.left) as usize * BPP;
                for (row, src) in pixels.chunks_exact(tile_stride).take(tile.height as usize).enumerate() {
                    let y = (rect.bottom + tile.bottom) as usize + row;
                    let start = y * stride + x;
                    buffer[start..start + tile_stride].copy_from_slice(src);
                }
                rendered += 1;
                tracing::debug!(pane, ?tile, "tile rendered");
            }
        }
        Ok(rendered)
    }
}
