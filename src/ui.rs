//! UI rendering helpers for the terminal user interface.
//!
//! This module contains functions to render the TUI using `ratatui`.

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style, Stylize},
    widgets::{Block, Borders, Clear, List, ListItem, Padding, Paragraph, Wrap},
};
use std::time::Duration;

use crate::app::App;
use crate::config::{ControlsSettings, TimeField, UiSettings};
use crate::session::PlaybackStatus;

const NOW_PLAYING_MARK: &str = "♪ ";

/// Render the controls help text, incorporating scrub seconds.
fn controls_text(scrub_seconds: u64) -> String {
    [
        ("j/k", "up/down".to_string()),
        ("h/l", "prev/next song".to_string()),
        ("H/L", format!("scrub -/+{scrub_seconds}s")),
        ("enter", "play selected song".to_string()),
        ("space/p", "play/pause".to_string()),
        ("gg/G", "top/bottom".to_string()),
        ("zz", "now playing".to_string()),
        ("s", "shuffle".to_string()),
        ("r", "repeat".to_string()),
        ("d", "delete".to_string()),
        ("R", "rescan".to_string()),
        ("D", "detach/attach".to_string()),
        ("q", "quit".to_string()),
    ]
    .iter()
    .map(|(k, v)| format!("[{k}] {v}"))
    .collect::<Vec<String>>()
    .join(" | ")
}

/// Format a `Duration` as `MM:SS`.
fn format_mmss(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Build the now-playing time text (elapsed/total/remaining) per `UiSettings`.
fn now_playing_time_text(
    elapsed: Duration,
    total: Option<Duration>,
    ui: &UiSettings,
) -> Option<String> {
    let parts: Vec<String> = ui
        .now_playing_time_fields
        .iter()
        .filter_map(|f| match f {
            TimeField::Elapsed => Some(format_mmss(elapsed)),
            TimeField::Total => total.map(format_mmss),
            TimeField::Remaining => {
                total.map(|t| format!("-{}", format_mmss(t.saturating_sub(elapsed))))
            }
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(&ui.now_playing_time_separator))
    }
}

fn status_text(app: &App, ui: &UiSettings) -> String {
    let snap = &app.snapshot;
    let mut parts: Vec<String> = Vec::new();

    if !app.attached {
        parts.push(" DETACHED (D to attach)".to_string());
    }

    parts.push(if app.follow_playback {
        " CURSOR: Follow".to_string()
    } else {
        " CURSOR: Free-roam".to_string()
    });

    if let Some(track) = snap.current_track() {
        let elapsed = Duration::from_millis(snap.position_ms);
        // Before the engine knows the length, fall back to the tag's.
        let total = match snap.duration_ms {
            0 => track.duration_hint_ms,
            ms => Some(ms),
        }
        .map(Duration::from_millis);
        let has_metrics = matches!(snap.status, PlaybackStatus::Playing | PlaybackStatus::Paused);
        match now_playing_time_text(elapsed, total, ui).filter(|_| has_metrics) {
            Some(time) => parts.push(format!("Song: {} [{}]", track.display, time)),
            None => parts.push(format!("Song: {}", track.display)),
        }
    }
    parts.push(snap.status.label().to_string());

    parts.push(format!(
        "Shuffle: {}",
        if snap.flags.shuffle { "ON" } else { "OFF" }
    ));
    parts.push(format!(
        "Repeat: {}",
        if snap.flags.auto_repeat { "ON" } else { "OFF" }
    ));

    if let Some(dir) = &app.current_dir {
        parts.push(format!("Dir: {dir}"));
    }

    parts.join(" • ")
}

/// Compute a centered rectangle with given size constrained to `r`.
fn centered_rect_sized(mut width: u16, mut height: u16, r: Rect) -> Rect {
    width = width.min(r.width.saturating_sub(2)).max(10);
    height = height.min(r.height.saturating_sub(2)).max(3);

    let x = r.x + (r.width.saturating_sub(width) / 2);
    let y = r.y + (r.height.saturating_sub(height) / 2);
    Rect {
        x,
        y,
        width,
        height,
    }
}

fn left_padded() -> Padding {
    Padding {
        left: 1,
        right: 0,
        top: 0,
        bottom: 0,
    }
}

/// Render the entire UI into the provided `frame` using `app` state and settings.
pub fn draw(frame: &mut Frame, app: &App, ui_settings: &UiSettings, controls: &ControlsSettings) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let header = Paragraph::new(ui_settings.header_text.as_str())
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" lilt ")
                .title_alignment(Alignment::Center),
        );
    frame.render_widget(header, chunks[0]);

    let status = Paragraph::new(status_text(app, ui_settings))
        .block(Block::bordered().padding(left_padded()).title(" status "))
        .wrap(Wrap { trim: true });
    frame.render_widget(status, chunks[1]);

    // Only build items for the visible window, centred on the selection.
    {
        let tracks = app.tracks();
        let total = tracks.len();
        let list_height = chunks[2].height.saturating_sub(2) as usize;
        let (start, end) = if total <= list_height || list_height == 0 {
            (0, total)
        } else {
            let half = list_height / 2;
            let start = app.selected.saturating_sub(half).min(total - list_height);
            (start, start + list_height)
        };

        let playing = app.playing_index();
        let items: Vec<ListItem> = tracks[start..end]
            .iter()
            .enumerate()
            .map(|(offset, track)| {
                if playing == Some(start + offset) {
                    ListItem::new(format!("{NOW_PLAYING_MARK}{}", track.display)).bold()
                } else {
                    ListItem::new(format!("  {}", track.display))
                }
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" tracks ({total}) ")),
            )
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        let mut state = ratatui::widgets::ListState::default();
        if total > 0 {
            state.select(Some(app.selected - start));
        }
        frame.render_stateful_widget(list, chunks[2], &mut state);
    }

    let notice = Paragraph::new(app.notice.as_deref().unwrap_or("")).italic();
    frame.render_widget(notice, chunks[3]);

    let footer = Paragraph::new(controls_text(controls.scrub_seconds))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" controls ")
                .padding(left_padded()),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, chunks[4]);

    if let Some(prompt) = &app.prompt {
        let popup_area = centered_rect_sized(64, 5, chunks[2]);
        frame.render_widget(Clear, popup_area);
        let popup = Paragraph::new(prompt.text())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(prompt.title())
                    .padding(left_padded()),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(popup, popup_area);
    }
}
