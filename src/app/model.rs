//! Observer model: the last session snapshot plus purely local view state
//! (selection, notices, prompts).

use std::sync::Arc;

use crate::error::SessionError;
use crate::library::{Track, TrackId};
use crate::session::SessionSnapshot;

/// A question waiting for a y/n answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    ConfirmDelete { id: TrackId, title: String },
    ConfirmQuit,
}

impl Prompt {
    pub fn title(&self) -> &'static str {
        match self {
            Prompt::ConfirmDelete { .. } => " delete ",
            Prompt::ConfirmQuit => " quit ",
        }
    }

    pub fn text(&self) -> String {
        match self {
            Prompt::ConfirmDelete { title, .. } => {
                format!("Are you sure you want to delete \"{title}\"? [y/n]")
            }
            Prompt::ConfirmQuit => "Quit and stop playback? [y/n]".to_string(),
        }
    }
}

/// What a "yes" to the open prompt asks the caller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAnswer {
    Delete(usize),
    Quit,
}

pub struct App {
    pub snapshot: SessionSnapshot,
    pub selected: usize,

    /// Cursor follows the playing track.
    pub follow_playback: bool,

    /// Whether this observer is currently bound to the session.
    pub attached: bool,
    pub current_dir: Option<String>,
    pub notice: Option<String>,
    pub prompt: Option<Prompt>,
}

impl App {
    pub fn new(follow_playback: bool) -> Self {
        Self {
            snapshot: SessionSnapshot::default(),
            selected: 0,
            follow_playback,
            attached: false,
            current_dir: None,
            notice: None,
            prompt: None,
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.snapshot.playlist
    }

    pub fn has_tracks(&self) -> bool {
        !self.snapshot.playlist.is_empty()
    }

    pub fn selected_track(&self) -> Option<&Track> {
        self.snapshot.playlist.get(self.selected)
    }

    /// Index of the track the session has selected, if any.
    pub fn playing_index(&self) -> Option<usize> {
        self.snapshot.cursor
    }

    pub fn set_current_dir(&mut self, dir: String) {
        self.current_dir = Some(dir);
    }

    /// Take in a fresh snapshot.
    ///
    /// A replaced playlist keeps the selection on the same track when it is
    /// still listed. A newly raised fault becomes the notice.
    pub fn apply_snapshot(&mut self, snap: SessionSnapshot) {
        let replaced = !Arc::ptr_eq(&self.snapshot.playlist, &snap.playlist);
        let selected_id = self.selected_track().map(|t| t.id);

        if snap.fault != self.snapshot.fault {
            if let Some(fault) = &snap.fault {
                self.notice = Some(fault.message());
            }
        }
        self.snapshot = snap;

        if replaced {
            self.selected = selected_id
                .and_then(|id| self.tracks().iter().position(|t| t.id == id))
                .unwrap_or(self.selected);
        }
        if self.follow_playback {
            if let Some(cursor) = self.snapshot.cursor {
                self.selected = cursor;
            }
        }
        self.clamp_selected();
    }

    fn clamp_selected(&mut self) {
        let len = self.tracks().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    pub fn follow_playback_on(&mut self) {
        self.follow_playback = true;
    }

    pub fn follow_playback_off(&mut self) {
        self.follow_playback = false;
    }

    pub fn set_selected(&mut self, idx: usize) {
        self.selected = idx;
        self.clamp_selected();
    }

    /// Move the selection down, wrapping to the top.
    pub fn next(&mut self) {
        let len = self.tracks().len();
        if len > 0 {
            self.selected = (self.selected + 1) % len;
        }
    }

    /// Move the selection up, wrapping to the bottom.
    pub fn prev(&mut self) {
        let len = self.tracks().len();
        if len > 0 {
            self.selected = if self.selected == 0 {
                len - 1
            } else {
                self.selected - 1
            };
        }
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self) {
        self.selected = self.tracks().len().saturating_sub(1);
    }

    /// Put the selection on the playing track. Returns false when nothing is
    /// playing.
    pub fn jump_to_now_playing(&mut self) -> bool {
        match self.playing_index() {
            Some(i) => {
                self.set_selected(i);
                true
            }
            None => false,
        }
    }

    pub fn set_notice(&mut self, msg: impl Into<String>) {
        self.notice = Some(msg.into());
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    /// Start deleting the selected track.
    ///
    /// The playing track is refused up front. With `confirm` a prompt is
    /// raised and `None` returned; the index comes back from
    /// [`answer_prompt`](Self::answer_prompt) instead.
    pub fn begin_delete(&mut self, confirm: bool) -> Option<usize> {
        let track = self.selected_track()?;
        if self.playing_index() == Some(self.selected) {
            let refusal = SessionError::DeleteConflict {
                title: track.title.clone(),
            };
            self.set_notice(refusal.to_string());
            return None;
        }
        if confirm {
            self.prompt = Some(Prompt::ConfirmDelete {
                id: track.id,
                title: track.title.clone(),
            });
            None
        } else {
            Some(self.selected)
        }
    }

    /// Returns true when the caller should quit right away.
    pub fn begin_quit(&mut self, confirm: bool) -> bool {
        if confirm {
            self.prompt = Some(Prompt::ConfirmQuit);
        }
        !confirm
    }

    /// Resolve the open prompt. A delete index is looked up again in case the
    /// playlist changed while the prompt was open.
    pub fn answer_prompt(&mut self, yes: bool) -> Option<PromptAnswer> {
        let prompt = self.prompt.take()?;
        if !yes {
            return None;
        }
        match prompt {
            Prompt::ConfirmQuit => Some(PromptAnswer::Quit),
            Prompt::ConfirmDelete { id, title } => {
                let index = self.tracks().iter().position(|t| t.id == id);
                if index.is_none() {
                    self.set_notice(format!("\"{title}\" is no longer in the list"));
                }
                index.map(PromptAnswer::Delete)
            }
        }
    }
}
