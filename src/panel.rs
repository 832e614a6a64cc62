use anyhow::{Context, Result};
use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_layer, delegate_output, delegate_registry, delegate_shm,
    output::{OutputHandler, OutputState},
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    shell::{
        wlr_layer::{
            Anchor, KeyboardInteractivity, Layer, LayerShell, LayerShellHandler, LayerSurface,
            LayerSurfaceConfigure,
        },
        WaylandSurface,
    },
    shm::{slot::SlotPool, Shm, ShmHandler},
};
use std::{io, sync::Arc};
use tiny_skia::{Color, Paint, PathBuilder, Pixmap, PixmapMut, PixmapPaint, Transform};
use tracing::debug;
use wayland_client::{
    backend::WaylandError,
    globals::registry_queue_init,
    protocol::{wl_output, wl_shm, wl_surface},
    Connection, EventQueue, QueueHandle,
};

use crate::config::{Config, CORNER_RADIUS, PANEL_PADDING};
use crate::icon::IconImages;
use crate::render::RenderTarget;
use crate::types::StyleTags;

const NAMESPACE: &str = "hypr-ws-apps";

/// A small layer-shell strip along the top edge showing one icon per class.
pub struct LayerPanel {
    conn: Connection,
    event_queue: EventQueue<Panel>,
    panel: Panel,
}

impl LayerPanel {
    pub fn connect(config: &Config) -> Result<Self> {
        let conn = Connection::connect_to_env().context("connect to Wayland")?;
        let (globals, event_queue) =
            registry_queue_init::<Panel>(&conn).context("init registry")?;
        let qh = event_queue.handle();

        let compositor =
            CompositorState::bind(&globals, &qh).context("wl_compositor not available")?;
        let layer_shell = LayerShell::bind(&globals, &qh).context("layer shell not available")?;
        let shm = Shm::bind(&globals, &qh).context("wl_shm not available")?;

        let namespace = match config.css_class.as_deref() {
            Some(class) => format!("{NAMESPACE}-{class}"),
            None => NAMESPACE.to_string(),
        };
        let surface = compositor.create_surface(&qh);
        let layer =
            layer_shell.create_layer_surface(&qh, surface, Layer::Top, Some(namespace), None);
        layer.set_anchor(Anchor::TOP);
        layer.set_keyboard_interactivity(KeyboardInteractivity::None);
        layer.set_exclusive_zone(0);

        let (width, height) = layout_size(0, config.icon_size, config.spacing);
        let len = buffer_len(width, height, 1).context("panel size out of range")?;
        let pool = SlotPool::new(len, &shm).context("create shm pool")?;

        let panel = Panel {
            registry_state: RegistryState::new(&globals),
            output_state: OutputState::new(&globals, &qh),
            shm,
            layer,
            pool,
            images: IconImages::new(config.icon_size),
            icon_size: config.icon_size,
            spacing: config.spacing,
            width,
            height,
            buffer_scale: 1,
            configured: false,
            mapped: false,
            closed: false,
            visible: false,
            tags: StyleTags {
                empty: true,
                active: false,
                extra: config.css_class.clone(),
            },
            icons: Vec::new(),
        };

        Ok(Self {
            conn,
            event_queue,
            panel,
        })
    }

    /// Reads whatever the compositor has sent without blocking, then
    /// dispatches it. Buffer releases, scale changes and `closed` arrive here.
    fn dispatch_events(&mut self) -> Result<()> {
        self.event_queue.flush().context("flush Wayland connection")?;
        if let Some(guard) = self.event_queue.prepare_read() {
            ignore_would_block(guard.read()).context("read Wayland events")?;
        }
        self.event_queue
            .dispatch_pending(&mut self.panel)
            .context("dispatch Wayland events")?;
        Ok(())
    }
}

fn ignore_would_block(result: Result<usize, WaylandError>) -> Result<(), WaylandError> {
    match result {
        Err(WaylandError::Io(err)) if err.kind() == io::ErrorKind::WouldBlock => Ok(()),
        other => other.map(|_| ()),
    }
}

impl RenderTarget for LayerPanel {
    fn set_visible(&mut self, visible: bool) {
        self.panel.visible = visible;
    }

    fn set_style_tags(&mut self, tags: &StyleTags) {
        debug!(tags = ?tags.names(), "style");
        self.panel.tags = tags.clone();
    }

    fn set_icon_sequence(&mut self, icons: &[String]) {
        let images = &mut self.panel.images;
        let loaded = icons
            .iter()
            .filter_map(|icon| images.image_for(icon))
            .collect();
        self.panel.icons = loaded;
    }

    fn set_tooltip(&mut self, tooltip: Option<&str>) {
        debug!(tooltip = tooltip.unwrap_or_default(), "tooltip");
    }

    fn flush(&mut self) -> Result<()> {
        self.dispatch_events()?;
        let panel = &mut self.panel;
        if panel.closed {
            return Ok(());
        }

        if !panel.visible {
            if panel.mapped || panel.configured {
                panel.layer.wl_surface().attach(None, 0, 0);
                panel.layer.commit();
                panel.mapped = false;
                panel.configured = false;
            }
            self.conn.flush().context("flush Wayland connection")?;
            return Ok(());
        }

        let size = layout_size(panel.icons.len(), panel.icon_size, panel.spacing);
        if !panel.configured || size != (panel.width, panel.height) {
            (panel.width, panel.height) = size;
            panel.layer.set_size(panel.width, panel.height);
            panel.layer.commit();
            self.event_queue
                .roundtrip(panel)
                .context("wait for layer configure")?;
        }

        if panel.configured && !panel.closed {
            panel.draw()?;
        }
        self.conn.flush().context("flush Wayland connection")?;
        Ok(())
    }
}

struct Panel {
    registry_state: RegistryState,
    output_state: OutputState,
    shm: Shm,
    layer: LayerSurface,
    pool: SlotPool,
    images: IconImages,
    icon_size: u32,
    spacing: u32,
    width: u32,
    height: u32,
    buffer_scale: u32,
    configured: bool,
    mapped: bool,
    closed: bool,
    visible: bool,
    tags: StyleTags,
    icons: Vec<Arc<Pixmap>>,
}

impl Panel {
    fn draw(&mut self) -> Result<()> {
        let needed =
            buffer_len(self.width, self.height, self.buffer_scale).context("buffer too large")?;
        let buffer_width = self.width * self.buffer_scale;
        let buffer_height = self.height * self.buffer_scale;
        let stride = buffer_width as i32 * 4;

        if self.pool.len() < needed {
            self.pool.resize(needed).context("resize shm pool")?;
        }

        let (buffer, canvas) = self
            .pool
            .create_buffer(
                buffer_width as i32,
                buffer_height as i32,
                stride,
                wl_shm::Format::Argb8888,
            )
            .context("create buffer")?;

        {
            let mut pixmap = PixmapMut::from_bytes(canvas.as_mut(), buffer_width, buffer_height)
                .context("pixmap from buffer")?;
            pixmap.fill(Color::from_rgba8(0, 0, 0, 0));

            let transform =
                Transform::from_scale(self.buffer_scale as f32, self.buffer_scale as f32);
            let background = rounded_rect_path(
                0.0,
                0.0,
                self.width as f32,
                self.height as f32,
                CORNER_RADIUS,
            )
            .context("background path")?;
            let mut paint = Paint::default();
            paint.set_color(background_color(&self.tags));
            pixmap.fill_path(&background, &paint, tiny_skia::FillRule::Winding, transform, None);

            let paint = PixmapPaint::default();
            let mut x = PANEL_PADDING as i32;
            for icon in &self.icons {
                pixmap.draw_pixmap(
                    x,
                    PANEL_PADDING as i32,
                    icon.as_ref().as_ref(),
                    &paint,
                    transform,
                    None,
                );
                x += (self.icon_size + self.spacing) as i32;
            }
        }

        swizzle_rgba_to_bgra(canvas.as_mut());

        let surface = self.layer.wl_surface();
        surface.set_buffer_scale(self.buffer_scale as i32);
        surface.damage_buffer(0, 0, buffer_width as i32, buffer_height as i32);
        buffer.attach_to(surface).context("attach buffer")?;
        self.layer.commit();
        self.mapped = true;
        Ok(())
    }
}

fn background_color(tags: &StyleTags) -> Color {
    match (tags.active, tags.empty) {
        (true, false) => Color::from_rgba8(255, 255, 255, 56),
        (true, true) => Color::from_rgba8(255, 255, 255, 28),
        (false, false) => Color::from_rgba8(20, 20, 20, 200),
        (false, true) => Color::from_rgba8(20, 20, 20, 120),
    }
}

/// Strip size for `count` icons; never narrower than one icon slot.
fn layout_size(count: usize, icon_size: u32, spacing: u32) -> (u32, u32) {
    let count = u32::try_from(count.max(1)).unwrap_or(u32::MAX);
    let width = (PANEL_PADDING * 2)
        .saturating_add(count.saturating_mul(icon_size))
        .saturating_add((count - 1).saturating_mul(spacing));
    let height = (PANEL_PADDING * 2).saturating_add(icon_size);
    (width, height)
}

/// Bytes of an ARGB8888 buffer at `scale`. `None` when the buffer could not
/// be addressed by the protocol's `i32` sizes.
fn buffer_len(width: u32, height: u32, scale: u32) -> Option<usize> {
    let buffer_width = width.checked_mul(scale)?;
    let buffer_height = height.checked_mul(scale)?;
    let stride = i32::try_from(buffer_width).ok()?.checked_mul(4)?;
    i32::try_from(buffer_height).ok()?;
    usize::try_from(stride)
        .ok()?
        .checked_mul(usize::try_from(buffer_height).ok()?)
}

fn swizzle_rgba_to_bgra(bytes: &mut [u8]) {
    for pixel in bytes.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }
}

fn rounded_rect_path(x: f32, y: f32, width: f32, height: f32, radius: f32) -> Option<tiny_skia::Path> {
    let r = radius.min(width / 2.0).min(height / 2.0);
    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + width - r, y);
    pb.quad_to(x + width, y, x + width, y + r);
    pb.line_to(x + width, y + height - r);
    pb.quad_to(x + width, y + height, x + width - r, y + height);
    pb.line_to(x + r, y + height);
    pb.quad_to(x, y + height, x, y + height - r);
    pb.line_to(x, y + r);
    pb.quad_to(x, y, x + r, y);
    pb.close();
    pb.finish()
}

impl CompositorHandler for Panel {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        new_factor: i32,
    ) {
        self.buffer_scale = new_factor.max(1) as u32;
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }
}

impl OutputHandler for Panel {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _output: wl_output::WlOutput) {}

    fn update_output(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _output: wl_output::WlOutput) {}

    fn output_destroyed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _output: wl_output::WlOutput) {}
}

impl LayerShellHandler for Panel {
    fn closed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _layer: &LayerSurface) {
        debug!("layer surface closed by compositor");
        self.closed = true;
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _layer: &LayerSurface,
        _configure: LayerSurfaceConfigure,
        _serial: u32,
    ) {
        self.configured = true;
    }
}

impl ShmHandler for Panel {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm
    }
}

delegate_compositor!(Panel);
delegate_output!(Panel);
delegate_shm!(Panel);
delegate_layer!(Panel);
delegate_registry!(Panel);

impl ProvidesRegistryState for Panel {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }

    registry_handlers![OutputState];
}
