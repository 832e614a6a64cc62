/// One client window as reported by the compositor, already filtered to the
/// target workspace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowRecord {
    pub class: String,
    pub title: String,
}

impl WindowRecord {
    pub fn new(class: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            title: title.into(),
        }
    }
}

pub const SPECIAL_PREFIX: &str = "special:";

/// Last workspaces reported active by the event stream. Owned by the UI loop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActiveWorkspaceState {
    pub normal: String,
    /// Empty when no special workspace is open, otherwise `special:<name>`.
    pub special: String,
}

impl ActiveWorkspaceState {
    pub fn is_active(&self, target: &str) -> bool {
        let current = if target.starts_with(SPECIAL_PREFIX) {
            &self.special
        } else {
            &self.normal
        };
        !current.is_empty() && current == target
    }
}

/// Mutually exclusive style tag pairs plus the optional user class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleTags {
    pub empty: bool,
    pub active: bool,
    pub extra: Option<String>,
}

impl StyleTags {
    pub fn names(&self) -> Vec<&str> {
        let mut names = vec![
            if self.empty { "empty" } else { "nonempty" },
            if self.active { "active" } else { "inactive" },
        ];
        if let Some(extra) = self.extra.as_deref() {
            names.push(extra);
        }
        names
    }
}

/// Messages delivered to the UI loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UiMsg {
    Render,
    ActiveWorkspace(String),
    ActiveSpecial(String),
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_special_targets_compare_against_special_state() {
        let state = ActiveWorkspaceState {
            normal: "special:dropdown".to_string(),
            special: "special:dropdown".to_string(),
        };
        assert!(state.is_active("special:dropdown"));

        let state = ActiveWorkspaceState {
            normal: "special:dropdown".to_string(),
            special: String::new(),
        };
        assert!(!state.is_active("special:dropdown"));
    }

    #[test]
    fn test_empty_state_is_never_active() {
        let state = ActiveWorkspaceState::default();
        assert!(!state.is_active(""));
        assert!(!state.is_active("1"));
    }

    #[test]
    fn test_tag_names_are_exclusive_pairs() {
        let tags = StyleTags {
            empty: true,
            active: false,
            extra: Some("dock".to_string()),
        };
        assert_eq!(tags.names(), vec!["empty", "inactive", "dock"]);
    }
}
