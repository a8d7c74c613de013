//! Raw-byte input decoding and the leader-key state machine.
//!
//! Reworked from the teacher's `mux_input.rs`, which decodes `winit::KeyEvent`
//! values from a windowing toolkit; this frontend has no toolkit underneath
//! it, only raw bytes read from stdin in raw mode, so every key, the leader
//! sequence, scroll keys, and SGR mouse reports are decoded directly from
//! the byte stream here.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::command::{LeaderKeyConfig, MuxCommand};

/// Current state of the multiplexer input layer.
#[derive(Debug, Clone, Default)]
pub enum MuxInputState {
    /// Normal mode — all input goes to the focused pane's PTY.
    #[default]
    Normal,
    /// Leader key was pressed, waiting for the command key.
    WaitingForCommand {
        /// When the leader key was pressed.
        entered_at: Instant,
    },
}

/// A decoded, fully-processed unit of input for the event loop to act on.
#[derive(Debug, Clone, PartialEq)]
pub enum MuxAction {
    /// A leader-mode command was recognized.
    Command(MuxCommand),
    /// Bytes to forward to the focused pane's PTY.
    Forward(Vec<u8>),
    /// Scroll the focused pane's viewport by `delta` lines (negative = up
    /// into scrollback, positive = down toward live output).
    Scroll(i64),
    /// Jump the focused pane's viewport to the bottom before forwarding the
    /// byte that triggered it (the "any key snaps back" rule).
    ScrollToBottomThenForward(Vec<u8>),
}

/// Decode one chunk of raw stdin bytes into a sequence of actions, advancing
/// `state` across leader-key transitions as it goes.
pub fn process_input(
    state: &mut MuxInputState,
    bytes: &[u8],
    leader_config: &LeaderKeyConfig,
    bindings: &HashMap<String, MuxCommand>,
    pane_is_scrolled: bool,
) -> Vec<MuxAction> {
    let leader_bytes: Vec<Vec<u8>> =
        leader_config.keys.iter().filter_map(|s| spec_to_bytes(s)).collect();
    let timeout = Duration::from_millis(leader_config.timeout_ms);

    let mut actions = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let rest = &bytes[i..];

        if let MuxInputState::WaitingForCommand { entered_at } = state {
            if entered_at.elapsed() > timeout {
                *state = MuxInputState::Normal;
            }
        }

        if let Some(matched) = leader_bytes.iter().find(|lb| rest.starts_with(lb.as_slice())) {
            match state {
                MuxInputState::Normal => {
                    *state = MuxInputState::WaitingForCommand { entered_at: Instant::now() };
                    i += matched.len();
                    continue;
                },
                MuxInputState::WaitingForCommand { .. } => {
                    // Double-tap leader: send the literal leader bytes through.
                    *state = MuxInputState::Normal;
                    actions.push(forward_or_scroll(matched.clone(), pane_is_scrolled));
                    i += matched.len();
                    continue;
                },
            }
        }

        if matches!(state, MuxInputState::WaitingForCommand { .. }) {
            let (key_str, consumed) = decode_key_token(rest);
            *state = MuxInputState::Normal;
            if let Some(cmd) = key_str.and_then(|k| bindings.get(&k)).cloned() {
                actions.push(MuxAction::Command(cmd));
            }
            i += consumed.max(1);
            continue;
        }

        if let Some((delta, consumed)) = decode_scroll_key(rest) {
            actions.push(MuxAction::Scroll(delta));
            i += consumed;
            continue;
        }

        if let Some((up, consumed)) = decode_sgr_wheel(rest) {
            actions.push(MuxAction::Scroll(if up { -3 } else { 3 }));
            i += consumed;
            continue;
        }

        // Plain byte (or an escape sequence this decoder doesn't recognize
        // specially): forward as-is, one byte at a time so a scroll-to-
        // bottom trigger on the very first byte applies immediately.
        actions.push(forward_or_scroll(vec![rest[0]], pane_is_scrolled));
        i += 1;
    }

    actions
}

fn forward_or_scroll(bytes: Vec<u8>, pane_is_scrolled: bool) -> MuxAction {
    if pane_is_scrolled {
        MuxAction::ScrollToBottomThenForward(bytes)
    } else {
        MuxAction::Forward(bytes)
    }
}

/// Decode the single key token following a leader press: either an
/// Alt+key escape (`ESC` + one byte that isn't `[`/`O`) or a single
/// printable byte. Returns the binding-lookup string and bytes consumed.
fn decode_key_token(rest: &[u8]) -> (Option<String>, usize) {
    if rest.first() == Some(&0x1b) && rest.len() >= 2 && rest[1] != b'[' && rest[1] != b'O' {
        let ch = rest[1] as char;
        return (Some(format!("Alt-{ch}")), 2);
    }
    match rest.first() {
        Some(&b) if b.is_ascii_graphic() => (Some((b as char).to_string()), 1),
        Some(_) => (None, 1),
        None => (None, 0),
    }
}

/// Recognize scroll-affecting key sequences: PageUp/Down, Shift-PageUp/Down,
/// Home/End, Shift-Up/Down. Returns (line delta, bytes consumed).
fn decode_scroll_key(rest: &[u8]) -> Option<(i64, usize)> {
    const PAGE: i64 = 20;
    let table: &[(&[u8], i64)] = &[
        (b"\x1b[5~", -PAGE),       // PageUp
        (b"\x1b[6~", PAGE),        // PageDown
        (b"\x1b[5;2~", -PAGE),     // Shift-PageUp
        (b"\x1b[6;2~", PAGE),      // Shift-PageDown
        (b"\x1b[1;2A", -1),        // Shift-Up
        (b"\x1b[1;2B", 1),         // Shift-Down
        (b"\x1b[1~", i64::MIN),    // Home -> to top (sentinel)
        (b"\x1b[H", i64::MIN),     // Home (alt encoding)
        (b"\x1b[4~", i64::MAX),    // End -> to bottom (sentinel)
        (b"\x1b[F", i64::MAX),     // End (alt encoding)
    ];
    for (seq, delta) in table {
        if rest.starts_with(seq) {
            return Some((*delta, seq.len()));
        }
    }
    None
}

/// Recognize an SGR mouse report (`ESC[<b;x;y{M|m}`) and classify wheel
/// events. Non-wheel buttons are treated as unrecognized (forwarded as
/// plain bytes by the caller, one byte at a time).
fn decode_sgr_wheel(rest: &[u8]) -> Option<(bool, usize)> {
    if !rest.starts_with(b"\x1b[<") {
        return None;
    }
    let body = &rest[3..];
    let end = body.iter().position(|&b| b == b'M' || b == b'm')?;
    let fields: Vec<&[u8]> = body[..end].split(|&b| b == b';').collect();
    let btn: u32 = std::str::from_utf8(fields.first()?).ok()?.parse().ok()?;
    let consumed = 3 + end + 1;
    match btn {
        64 => Some((true, consumed)),
        65 => Some((false, consumed)),
        _ => None,
    }
}

/// Convert a leader-key spec string ("Control-Space", "Control-b") into the
/// literal control byte(s) it produces on the wire.
fn spec_to_bytes(spec: &str) -> Option<Vec<u8>> {
    let parts: Vec<&str> = spec.split('-').collect();
    let mut ctrl = false;
    let mut key = "";
    for part in &parts {
        match *part {
            "Control" | "Ctrl" => ctrl = true,
            other => key = other,
        }
    }
    if !ctrl {
        return None;
    }
    let byte = match key {
        "Space" => 0x00,
        s if s.len() == 1 => {
            let c = s.chars().next()?.to_ascii_lowercase() as u8;
            c & 0x1f
        },
        _ => return None,
    };
    Some(vec![byte])
}
