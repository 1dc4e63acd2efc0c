//! Panels, outputs and the render pass that puts them on screen.
//!
//! Pixel painting and display surfaces are external collaborators, plugged in through
//! [`Painter`] and [`PanelSurface`]. This module owns the parts in between: picking a
//! free buffer from the [`BufferPool`], deciding whether a panel needs a redraw, and
//! isolating failures per output.

use crate::error::{RenderError, SystemError};
use crate::sources::Sources;
use std::sync::Arc;
use zenway_buffer_manager::{Buffer, BufferHandle, BufferPool, BYTES_PER_PIXEL};
use zenway_core::config::{parse_argb, ZenwayConfig};

/// The render collaborator driven by the manager.
pub trait Renderer {
    fn draw(&mut self, sources: &Sources) -> Result<(), RenderError>;
    fn hide(&mut self);
    fn draw_alert(&mut self, sources: &Sources) -> Result<(), RenderError>;
    fn hide_alert(&mut self);
}

/// Draws a panel's content.
pub trait Painter {
    fn paint(&self, output: &str, sources: &Sources, canvas: &mut Canvas<'_>) -> Result<(), RenderError>;
}

/// A display surface a panel is shown on.
pub trait PanelSurface {
    /// Presents a locked buffer. The surface calls [`Buffer::release`] once the
    /// compositor no longer reads it.
    fn commit(&mut self, handle: &BufferHandle, buffer: Arc<Buffer>) -> Result<(), RenderError>;
    fn hide(&mut self);
}

/// ARGB8888 view over a buffer's pixels.
pub struct Canvas<'a> {
    pixels: &'a mut [u8],
    width: u32,
    height: u32,
    stride: u32,
}

impl<'a> Canvas<'a> {
    pub fn new(pixels: &'a mut [u8], width: u32, height: u32, stride: u32) -> Self {
        Self {
            pixels,
            width,
            height,
            stride,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Byte offset of pixel (x, y), computed in `usize` so large surfaces cannot wrap.
    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.stride as usize + x as usize * BYTES_PER_PIXEL as usize
    }

    pub fn fill(&mut self, argb: u32) {
        self.fill_rect(0, 0, self.width, self.height, argb);
    }

    /// Fills a rectangle, clipped to the canvas.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, argb: u32) {
        let pixel = argb.to_le_bytes();
        let x_end = x.saturating_add(width).min(self.width);
        let y_end = y.saturating_add(height).min(self.height);
        for row in y.min(y_end)..y_end {
            let start = self.offset(x, row);
            let end = self.offset(x_end, row);
            if start >= end {
                continue;
            }
            let Some(span) = self.pixels.get_mut(start..end) else {
                break;
            };
            for chunk in span.chunks_exact_mut(BYTES_PER_PIXEL as usize) {
                chunk.copy_from_slice(&pixel);
            }
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = self.offset(x, y);
        let bytes: [u8; 4] = self.pixels.get(at..at + 4)?.try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }
}

/// One panel: the sources it shows, how it is painted and where.
pub struct Panel {
    name: String,
    sources: Vec<String>,
    painter: Box<dyn Painter>,
    surface: Box<dyn PanelSurface>,
    shown: bool,
}

impl Panel {
    pub fn new(
        name: impl Into<String>,
        sources: Vec<String>,
        painter: Box<dyn Painter>,
        surface: Box<dyn PanelSurface>,
    ) -> Self {
        Self {
            name: name.into(),
            sources,
            painter,
            surface,
            shown: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_shown(&self) -> bool {
        self.shown
    }

    /// Redraws the panel if one of its sources changed or it is not shown.
    ///
    /// Returns whether a frame was committed.
    pub fn draw(&mut self, output: &str, pool: &BufferPool, sources: &Sources) -> Result<bool, RenderError> {
        if self.shown && !sources.needs_redraw(&self.sources) {
            return Ok(false);
        }
        let Some(buffer) = pool.get() else {
            tracing::error!("No free buffer for panel {} on {}, skipping frame", self.name, output);
            return Err(RenderError::NoFreeBuffer {
                panel: self.name.clone(),
            });
        };

        buffer.clear(0)?;
        let (width, height, stride) = (buffer.width(), buffer.height(), buffer.stride());
        buffer.with_pixels(|pixels| {
            let mut canvas = Canvas::new(pixels, width, height, stride);
            self.painter.paint(output, sources, &mut canvas)
        })??;

        let handle = buffer.lock();
        if let Err(e) = self.surface.commit(&handle, Arc::clone(&buffer)) {
            buffer.release();
            return Err(e);
        }
        tracing::trace!("Committed panel {} on {} with buffer {}", self.name, output, handle.index);
        self.shown = true;
        Ok(true)
    }

    pub fn hide(&mut self) {
        if self.shown {
            self.surface.hide();
            self.shown = false;
        }
    }
}

/// The panels placed on one output, plus its alert popup.
pub struct Output {
    name: String,
    panels: Vec<Panel>,
    alert: Option<Panel>,
}

impl Output {
    pub fn new(name: impl Into<String>, panels: Vec<Panel>, alert: Option<Panel>) -> Self {
        Self {
            name: name.into(),
            panels,
            alert,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn alert(&self) -> Option<&Panel> {
        self.alert.as_ref()
    }

    /// Draws every panel; the first failure is returned after all panels were tried.
    pub fn draw(&mut self, pool: &BufferPool, sources: &Sources) -> Result<(), RenderError> {
        let mut result = Ok(());
        for panel in &mut self.panels {
            if let Err(e) = panel.draw(&self.name, pool, sources) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    pub fn draw_alert(&mut self, pool: &BufferPool, sources: &Sources) -> Result<(), RenderError> {
        match &mut self.alert {
            Some(alert) => alert.draw(&self.name, pool, sources).map(|_| ()),
            None => Ok(()),
        }
    }

    pub fn hide(&mut self) {
        for panel in &mut self.panels {
            panel.hide();
        }
    }

    pub fn hide_alert(&mut self) {
        if let Some(alert) = &mut self.alert {
            alert.hide();
        }
    }
}

/// All outputs and the buffer pool they share.
pub struct Outputs {
    pool: BufferPool,
    outputs: Vec<Output>,
}

impl Outputs {
    pub fn new(pool: BufferPool, outputs: Vec<Output>) -> Self {
        Self { pool, outputs }
    }

    /// Builds headless outputs from the configuration: one [`HeadlessSurface`] and
    /// [`FillPainter`] per configured panel on every configured output.
    pub fn headless(config: &ZenwayConfig) -> Result<Self, SystemError> {
        let pool = BufferPool::new(config.buffers.count, config.buffers.width, config.buffers.height)?;
        let outputs = config
            .outputs
            .iter()
            .map(|output| {
                let panels = config
                    .panels
                    .iter()
                    .map(|panel| {
                        Panel::new(
                            panel.name.clone(),
                            panel.sources.clone(),
                            Box::new(FillPainter::from_color(&panel.color)),
                            Box::new(HeadlessSurface::new(format!("{}/{}", output, panel.name))),
                        )
                    })
                    .collect();
                let alert = Panel::new(
                    "alert",
                    config.alert_panel.sources.clone(),
                    Box::new(FillPainter::from_color(&config.alert_panel.color)),
                    Box::new(HeadlessSurface::new(format!("{}/alert", output))),
                );
                Output::new(output.clone(), panels, Some(alert))
            })
            .collect();
        Ok(Self::new(pool, outputs))
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    fn for_each_output(
        &mut self,
        what: &str,
        mut f: impl FnMut(&mut Output, &BufferPool) -> Result<(), RenderError>,
    ) -> Result<(), RenderError> {
        let mut failed = Vec::new();
        for output in &mut self.outputs {
            if let Err(e) = f(output, &self.pool) {
                tracing::error!("Failed to {} on output {}: {}", what, output.name, e);
                failed.push(output.name.clone());
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(RenderError::Outputs { failed })
        }
    }
}

impl Renderer for Outputs {
    fn draw(&mut self, sources: &Sources) -> Result<(), RenderError> {
        self.for_each_output("draw panels", |output, pool| output.draw(pool, sources))
    }

    fn hide(&mut self) {
        for output in &mut self.outputs {
            output.hide();
        }
    }

    fn draw_alert(&mut self, sources: &Sources) -> Result<(), RenderError> {
        self.for_each_output("draw alert", |output, pool| output.draw_alert(pool, sources))
    }

    fn hide_alert(&mut self) {
        for output in &mut self.outputs {
            output.hide_alert();
        }
    }
}

/// A surface without a display: logs the commit and releases the buffer at once, as a
/// compositor presenting instantly would.
#[derive(Debug)]
pub struct HeadlessSurface {
    name: String,
}

impl HeadlessSurface {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl PanelSurface for HeadlessSurface {
    fn commit(&mut self, handle: &BufferHandle, buffer: Arc<Buffer>) -> Result<(), RenderError> {
        tracing::debug!(
            "{}: presenting buffer {} ({}x{}, offset {})",
            self.name,
            handle.index,
            handle.width,
            handle.height,
            handle.offset
        );
        buffer.release();
        Ok(())
    }

    fn hide(&mut self) {
        tracing::debug!("{}: hidden", self.name);
    }
}

/// Paints a solid background.
#[derive(Debug, Clone, Copy)]
pub struct FillPainter {
    color: u32,
}

impl FillPainter {
    pub fn new(color: u32) -> Self {
        Self { color }
    }

    /// Colors are validated with the configuration; an unparsable one paints black.
    pub fn from_color(color: &str) -> Self {
        Self::new(parse_argb(color).unwrap_or(0xff00_0000))
    }
}

impl Painter for FillPainter {
    fn paint(&self, _output: &str, _sources: &Sources, canvas: &mut Canvas<'_>) -> Result<(), RenderError> {
        canvas.fill(self.color);
        Ok(())
    }
}
