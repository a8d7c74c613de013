//! Frontend configuration.
//!
//! Loaded best-effort the same way as `hexa-daemon::config::HexaConfig`
//! (missing file → defaults, malformed file → startup error). The schema is
//! the teacher's `MultiplexerConfig`/`KeybindingsConfig`/`LeaderKeyConfig`
//! shape, generalized from windows to tabs and with the `config-integration`
//! hot-reload feature dropped — `alacritty_config::SerdeReplace` is a
//! GUI-only live-reload mechanism out of scope here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::command::{LeaderKeyConfig, MuxCommand};
use crate::error::{FrontendError, FrontendResult};
use crate::notify::{NotifyPosition, NotifyStyle};

/// Top-level frontend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxConfig {
    /// Whether to show the status bar.
    pub status_bar: bool,
    /// Leader key(s) and timeout that activate command mode.
    pub leader: LeaderKeyConfig,
    /// Key → action bindings for leader mode.
    pub keybindings: KeybindingsConfig,
    /// Maximum frames rendered per second.
    pub frame_rate_cap_hz: u32,
    /// Lines scrolled per mouse wheel tick / scroll key.
    pub mouse_scroll_step: u32,
    /// Default notification appearance.
    pub notify: NotifyConfig,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            status_bar: true,
            leader: LeaderKeyConfig::default(),
            keybindings: KeybindingsConfig::default(),
            frame_rate_cap_hz: 60,
            mouse_scroll_step: 3,
            notify: NotifyConfig::default(),
        }
    }
}

impl MuxConfig {
    /// Load configuration from `path`, falling back to defaults if the file
    /// is absent. A present-but-malformed file is a hard error.
    pub fn load(path: &Path) -> FrontendResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no frontend config at {}, using defaults", path.display());
                return Ok(Self::default());
            },
            Err(e) => return Err(FrontendError::Io(e)),
        };
        toml::from_str(&contents).map_err(|e| FrontendError::Config(e.to_string()))
    }

    /// Default config file path: `$XDG_CONFIG_HOME/hexa/mux.toml`, or
    /// `$HOME/.config/hexa/mux.toml` if `XDG_CONFIG_HOME` is unset.
    pub fn default_path() -> PathBuf {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("hexa").join("mux.toml")
    }

    /// Frame interval corresponding to `frame_rate_cap_hz`.
    pub fn frame_interval_ms(&self) -> u64 {
        if self.frame_rate_cap_hz == 0 { 16 } else { 1000 / self.frame_rate_cap_hz as u64 }
    }
}

/// Keybindings for leader mode (key pressed after the leader sequence).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeybindingsConfig {
    /// Key for horizontal split.
    pub split_horizontal: String,
    /// Alternate key for horizontal split.
    pub split_horizontal_alt: String,
    /// Key for vertical split.
    pub split_vertical: String,
    /// Alternate key for vertical split.
    pub split_vertical_alt: String,
    /// Key to close the focused pane.
    pub close_pane: String,
    /// Key for next pane.
    pub next_pane: String,
    /// Key for previous pane.
    pub prev_pane: String,
    /// Key to create a new tab.
    pub new_tab: String,
    /// Key for next tab.
    pub next_tab: String,
    /// Key for previous tab.
    pub prev_tab: String,
    /// Key to detach.
    pub detach: String,
    /// Key to rename the active tab.
    pub rename_tab: String,
    /// Key to enter scrollback mode.
    pub scrollback_mode: String,
    /// Trigger byte (as a one-character string) for the default sticky
    /// float, in addition to number-keyed tab switching.
    pub toggle_sticky_float: String,
}

impl Default for KeybindingsConfig {
    fn default() -> Self {
        Self {
            split_horizontal: "\"".into(),
            split_horizontal_alt: "-".into(),
            split_vertical: "%".into(),
            split_vertical_alt: "|".into(),
            close_pane: "x".into(),
            next_pane: "o".into(),
            prev_pane: ";".into(),
            new_tab: "c".into(),
            next_tab: "n".into(),
            prev_tab: "p".into(),
            detach: "d".into(),
            rename_tab: ",".into(),
            scrollback_mode: "[".into(),
            toggle_sticky_float: "g".into(),
        }
    }
}

impl KeybindingsConfig {
    /// Convert keybindings config into a key → action map.
    pub fn to_bindings_map(&self) -> HashMap<String, MuxCommand> {
        let mut m = HashMap::new();
        m.insert(self.split_horizontal.clone(), MuxCommand::SplitHorizontal);
        m.insert(self.split_horizontal_alt.clone(), MuxCommand::SplitHorizontal);
        m.insert(self.split_vertical.clone(), MuxCommand::SplitVertical);
        m.insert(self.split_vertical_alt.clone(), MuxCommand::SplitVertical);
        m.insert(self.close_pane.clone(), MuxCommand::ClosePane);
        m.insert(self.next_pane.clone(), MuxCommand::NextPane);
        m.insert(self.prev_pane.clone(), MuxCommand::PrevPane);
        m.insert(self.new_tab.clone(), MuxCommand::NewTab);
        m.insert(self.next_tab.clone(), MuxCommand::NextTab);
        m.insert(self.prev_tab.clone(), MuxCommand::PrevTab);
        m.insert(self.detach.clone(), MuxCommand::DetachSession);
        m.insert(self.scrollback_mode.clone(), MuxCommand::ScrollbackMode);
        if let Some(&byte) = self.toggle_sticky_float.as_bytes().first() {
            m.insert(self.toggle_sticky_float.clone(), MuxCommand::ToggleStickyFloat(byte));
        }

        for i in 0..=9u8 {
            m.insert(i.to_string(), MuxCommand::SwitchToTab(i));
        }

        m
    }
}

/// Default appearance/timing for the notification overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// How long a notification stays visible, in milliseconds.
    pub duration_ms: u64,
    /// Default position.
    pub position: NotifyPosition,
    /// Default style.
    pub style: NotifyStyle,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            duration_ms: crate::notify::DEFAULT_DURATION_MS,
            position: NotifyPosition::Top,
            style: NotifyStyle::Info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = MuxConfig::default();
        assert!(cfg.status_bar);
        assert_eq!(cfg.leader.keys.len(), 2);
        assert_eq!(cfg.frame_rate_cap_hz, 60);
    }

    #[test]
    fn keybindings_to_map_covers_all_actions() {
        let cfg = KeybindingsConfig::default();
        let map = cfg.to_bindings_map();
        assert!(map.contains_key("\""));
        assert!(map.contains_key("%"));
        assert!(map.contains_key("x"));
        assert!(map.contains_key("c"));
        assert!(map.contains_key("0"));
        assert!(map.contains_key("9"));
        assert!(map.contains_key("g"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let cfg = MuxConfig::load(&path).unwrap();
        assert_eq!(cfg, MuxConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mux.toml");
        std::fs::write(&path, "not = [valid toml").unwrap();
        assert!(MuxConfig::load(&path).is_err());
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mux.toml");
        std::fs::write(&path, "frame_rate_cap_hz = 30\n").unwrap();
        let cfg = MuxConfig::load(&path).unwrap();
        assert_eq!(cfg.frame_rate_cap_hz, 30);
        assert_eq!(cfg.mouse_scroll_step, MuxConfig::default().mouse_scroll_step);
    }

    #[test]
    fn frame_interval_matches_cap() {
        let cfg = MuxConfig::default();
        assert_eq!(cfg.frame_interval_ms(), 16);
    }
}
