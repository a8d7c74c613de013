//! Status bar content generation.
//!
//! Ported from `alacritty_multiplexer::statusbar`, generalized from windows
//! to tabs. Per the spec, this module only renders the opaque strings it is
//! handed — it does not compute status-bar segment content beyond the
//! session/tab/pane summary shown here.

use crate::session::Session;
use crate::tab::Tab;

/// Describes a tab entry for the status bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabEntry {
    /// Index in the tab list.
    pub index: usize,
    /// Tab name.
    pub name: String,
    /// Whether this tab is currently active.
    pub is_active: bool,
}

/// Content to be rendered in the status bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusBarContent {
    /// Name of the current session.
    pub session_name: String,
    /// Tab list with active indicator.
    pub tabs: Vec<TabEntry>,
    /// Information about the active pane.
    pub pane_info: String,
}

/// Build the status bar content from the current session state.
pub fn build_status(session: &Session) -> StatusBarContent {
    let tabs = session
        .tabs
        .iter()
        .enumerate()
        .map(|(i, t)| TabEntry { index: i, name: t.name.clone(), is_active: i == session.active_tab })
        .collect();

    let pane_info = {
        let tab = session.active_tab();
        let count = tab.pane_order().len();
        if count == 0 {
            String::new()
        } else {
            format!("pane {}/{count}", pane_position(tab))
        }
    };

    StatusBarContent { session_name: session.name.clone(), tabs, pane_info }
}

fn pane_position(tab: &Tab) -> usize {
    let order = tab.pane_order();
    match tab.focused {
        Some(focused) => order.iter().position(|&id| id == focused).map(|p| p + 1).unwrap_or(1),
        None => 1,
    }
}

/// Format a tab entry for the status bar.
fn format_tab_entry(t: &TabEntry) -> String {
    let marker = if t.is_active { "*" } else { "" };
    format!(" {}:{}{}", t.index, t.name, marker)
}

/// Render the status bar content as a single line string, padded/truncated
/// to exactly `width` columns.
pub fn render_status_line(content: &StatusBarContent, width: usize) -> String {
    let left = format!("[{}]", content.session_name);
    let center: String = content.tabs.iter().map(format_tab_entry).collect();
    let right = &content.pane_info;

    let used = left.len() + center.len() + right.len();
    let padding = width.saturating_sub(used);

    let mut line = format!("{left}{center}{:>pad$}{right}", "", pad = padding);
    if line.len() > width {
        line.truncate(width);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_status_single_tab() {
        let s = Session::new("work");
        let status = build_status(&s);
        assert_eq!(status.session_name, "work");
        assert_eq!(status.tabs.len(), 1);
        assert!(status.tabs[0].is_active);
    }

    #[test]
    fn build_status_multiple_tabs() {
        let mut s = Session::new("work");
        s.new_tab("vim");
        s.new_tab("logs");

        let status = build_status(&s);
        assert_eq!(status.tabs.len(), 3);
        let active_count = status.tabs.iter().filter(|t| t.is_active).count();
        assert_eq!(active_count, 1);
    }

    #[test]
    fn render_status_line_basic() {
        let content = StatusBarContent {
            session_name: "s".into(),
            tabs: vec![TabEntry { index: 0, name: "w".into(), is_active: true }],
            pane_info: "pane 1/1".into(),
        };
        let line = render_status_line(&content, 40);
        assert!(line.contains("[s]"));
        assert!(line.contains("0:w*"));
        assert!(line.contains("pane 1/1"));
        assert_eq!(line.len(), 40);
    }

    #[test]
    fn render_status_line_truncates_when_overflowing() {
        let content = StatusBarContent {
            session_name: "a-very-long-session-name-indeed".into(),
            tabs: vec![TabEntry { index: 0, name: "tab".into(), is_active: true }],
            pane_info: "pane 1/1".into(),
        };
        let line = render_status_line(&content, 10);
        assert_eq!(line.len(), 10);
    }
}
