use anyhow::{Context, Result};
use freedesktop_icons::lookup;
use image::{imageops::FilterType, DynamicImage};
use resvg::usvg;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tiny_skia::{Color, IntSize, Paint, Pixmap, Transform};
use tracing::debug;

use crate::config::FALLBACK_ICON;

/// Pixmaps for icon identifiers, loaded once per identifier at a fixed size.
pub struct IconImages {
    size: u32,
    images: HashMap<String, Arc<Pixmap>>,
}

impl IconImages {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            images: HashMap::new(),
        }
    }

    pub fn image_for(&mut self, icon: &str) -> Option<Arc<Pixmap>> {
        if let Some(image) = self.images.get(icon) {
            return Some(image.clone());
        }
        let image = match load_icon(icon, self.size) {
            Ok(image) => image,
            Err(err) => {
                debug!("icon {icon}: {err:#}");
                placeholder_icon(self.size)?
            }
        };
        let image = Arc::new(image);
        self.images.insert(icon.to_string(), image.clone());
        Some(image)
    }
}

/// Absolute paths and `file://` URIs name a file; anything else is a theme icon name.
fn icon_file(icon: &str) -> Option<PathBuf> {
    let path = icon.strip_prefix("file://").unwrap_or(icon);
    path.starts_with('/').then(|| PathBuf::from(path))
}

fn load_icon(icon: &str, size: u32) -> Result<Pixmap> {
    let path = match icon_file(icon) {
        Some(path) => path,
        None => lookup(icon)
            .with_size(size as u16)
            .find()
            .or_else(|| lookup(FALLBACK_ICON).with_size(size as u16).find())
            .context("no icon found in theme")?,
    };

    if path.extension().and_then(|ext| ext.to_str()) == Some("svg") {
        return render_svg(&path, size);
    }

    let image = image::open(&path).with_context(|| format!("open icon {}", path.display()))?;
    let resized = image.resize_exact(size, size, FilterType::Lanczos3);
    pixmap_from_image(resized)
}

fn pixmap_from_image(image: DynamicImage) -> Result<Pixmap> {
    let rgba = image.to_rgba8();
    let size = IntSize::from_wh(rgba.width(), rgba.height()).context("icon size")?;
    Pixmap::from_vec(rgba.into_raw(), size).context("pixmap from image")
}

fn placeholder_icon(size: u32) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(size, size)?;
    let mut paint = Paint::default();
    paint.set_color(Color::from_rgba8(90, 90, 90, 255));
    let rect = tiny_skia::Rect::from_xywh(0.0, 0.0, size as f32, size as f32)?;
    pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    Some(pixmap)
}

fn render_svg(path: &Path, size: u32) -> Result<Pixmap> {
    let data = fs::read(path).with_context(|| format!("read svg {}", path.display()))?;
    let options = usvg::Options::default();
    let tree = usvg::Tree::from_data(&data, &options)
        .with_context(|| format!("parse svg {}", path.display()))?;
    let mut pixmap = Pixmap::new(size, size).context("create svg pixmap")?;
    let tree_size = tree.size();
    let scale = (size as f32 / tree_size.width()).min(size as f32 / tree_size.height());
    let dx = (size as f32 - tree_size.width() * scale) * 0.5;
    let dy = (size as f32 - tree_size.height() * scale) * 0.5;
    let transform = Transform::from_scale(scale, scale).post_translate(dx, dy);
    resvg::render(&tree, transform, &mut pixmap.as_mut());
    Ok(pixmap)
}
