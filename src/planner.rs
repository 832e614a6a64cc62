use std::collections::HashSet;

use crate::config::{Config, FALLBACK_ICON};
use crate::render::RenderTarget;
use crate::resolver::IconResolver;
use crate::types::{ActiveWorkspaceState, StyleTags, WindowRecord};

/// What a single render cycle pushes to the render target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderDecision {
    pub visible: bool,
    pub tags: StyleTags,
    /// `None` when the class list is unchanged since the last cycle.
    pub content: Option<RenderContent>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderContent {
    pub icons: Vec<String>,
    pub tooltip: Option<String>,
}

impl RenderDecision {
    pub fn apply(&self, target: &mut dyn RenderTarget) {
        target.set_visible(self.visible);
        target.set_style_tags(&self.tags);
        if let Some(content) = &self.content {
            target.set_icon_sequence(&content.icons);
            target.set_tooltip(content.tooltip.as_deref());
        }
    }
}

/// Remembers the last rendered class list so icon rebuilds only happen when
/// workspace membership or order changes.
#[derive(Default)]
pub struct RenderPlanner {
    last_classes: Vec<String>,
}

impl RenderPlanner {
    pub fn plan(
        &mut self,
        windows: &[WindowRecord],
        resolver: &IconResolver,
        active: &ActiveWorkspaceState,
        config: &Config,
    ) -> RenderDecision {
        let entries = unique_by_class(windows, config.max_icons);
        let is_empty = entries.is_empty();
        let tags = StyleTags {
            empty: is_empty,
            active: active.is_active(&config.workspace),
            extra: config.css_class.clone(),
        };
        let visible = !is_empty || config.show_empty;

        let classes_unchanged = entries.len() == self.last_classes.len()
            && entries
                .iter()
                .zip(&self.last_classes)
                .all(|(entry, last)| entry.class == *last);
        if classes_unchanged {
            return RenderDecision {
                visible,
                tags,
                content: None,
            };
        }

        let icons = entries
            .iter()
            .map(|entry| {
                resolver
                    .resolve(&entry.class)
                    .unwrap_or_else(|| FALLBACK_ICON.to_string())
            })
            .collect();
        let tooltip = config.tooltip.then(|| tooltip_text(&entries)).flatten();
        self.last_classes = entries.iter().map(|entry| entry.class.clone()).collect();

        RenderDecision {
            visible,
            tags,
            content: Some(RenderContent { icons, tooltip }),
        }
    }
}

/// First window per class, in order, capped at `limit` when non-zero.
fn unique_by_class(windows: &[WindowRecord], limit: usize) -> Vec<&WindowRecord> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for window in windows {
        if window.class.is_empty() || !seen.insert(window.class.as_str()) {
            continue;
        }
        unique.push(window);
        if limit > 0 && unique.len() >= limit {
            break;
        }
    }
    unique
}

fn tooltip_text(entries: &[&WindowRecord]) -> Option<String> {
    let lines: Vec<String> = entries
        .iter()
        .map(|entry| {
            if entry.title.is_empty() {
                entry.class.clone()
            } else {
                format!("{} — {}", entry.class, entry.title)
            }
        })
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}
