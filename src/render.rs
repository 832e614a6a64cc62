use anyhow::Result;

use crate::types::StyleTags;

/// Whatever hosts the indicator. Setters only record state; `flush` makes it
/// visible on screen.
pub trait RenderTarget {
    fn set_visible(&mut self, visible: bool);
    fn set_style_tags(&mut self, tags: &StyleTags);
    fn set_icon_sequence(&mut self, icons: &[String]);
    /// `None` removes the tooltip.
    fn set_tooltip(&mut self, tooltip: Option<&str>);

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
