use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::{Notification, PlaybackSession, PlaybackStatus};
use crate::audio::fake::{EngineCall, FakeEngine, FakeProbe};
use crate::audio::{EngineEvent, EngineFault};
use crate::error::{LibraryError, SessionError};
use crate::library::{MediaStore, Track};

fn t(title: &str) -> Track {
    Track::new(format!("/music/{title}.mp3"), title)
}

fn tracks(titles: &[&str]) -> Vec<Track> {
    titles.iter().map(|s| t(s)).collect()
}

fn session_with(titles: &[&str]) -> (PlaybackSession<FakeEngine>, FakeProbe) {
    let (engine, probe) = FakeEngine::new();
    let mut session = PlaybackSession::with_rng(engine, StdRng::seed_from_u64(7));
    session.set_playlist(tracks(titles));
    (session, probe)
}

fn titles(session: &PlaybackSession<FakeEngine>) -> Vec<String> {
    session.playlist().iter().map(|t| t.title.clone()).collect()
}

/// Deliver the pending prepare callback, as the engine would.
fn prepared(session: &mut PlaybackSession<FakeEngine>) {
    let generation = session.generation();
    session.handle_event(EngineEvent::Prepared { generation });
}

fn playing_at(titles: &[&str], index: usize) -> (PlaybackSession<FakeEngine>, FakeProbe) {
    let (mut session, probe) = session_with(titles);
    session.select_and_play(index).unwrap();
    prepared(&mut session);
    (session, probe)
}

#[derive(Default)]
struct MemoryStore {
    tracks: Mutex<Vec<Track>>,
    removed: Mutex<Vec<PathBuf>>,
    gone: Mutex<Vec<PathBuf>>,
}

impl MemoryStore {
    fn with(list: Vec<Track>) -> Self {
        Self {
            tracks: Mutex::new(list),
            ..Self::default()
        }
    }
}

impl MediaStore for MemoryStore {
    fn enumerate(&self) -> Vec<Track> {
        // Reverse so the session has to sort again.
        self.tracks.lock().unwrap().iter().rev().cloned().collect()
    }

    fn remove(&self, track: &Track) -> Result<(), LibraryError> {
        self.tracks.lock().unwrap().retain(|t| t != track);
        self.removed.lock().unwrap().push(track.locator.clone());
        if self.gone.lock().unwrap().contains(&track.locator) {
            return Err(LibraryError::NotFound(track.locator.clone()));
        }
        Ok(())
    }
}

#[test]
fn set_playlist_sorts_by_title() {
    let (session, _) = session_with(&["Charlie", "Alpha", "Bravo"]);
    assert_eq!(titles(&session), vec!["Alpha", "Bravo", "Charlie"]);
    assert_eq!(session.status(), PlaybackStatus::Idle);
    assert_eq!(session.cursor(), None);
}

#[test]
fn set_playlist_is_case_sensitive_and_stable() {
    let (engine, _) = FakeEngine::new();
    let mut session = PlaybackSession::with_rng(engine, StdRng::seed_from_u64(1));
    let first = Track::new("/a/first.mp3", "Same");
    let second = Track::new("/b/second.mp3", "Same");
    session.set_playlist(vec![t("beta"), first.clone(), t("Zed"), second.clone()]);

    assert_eq!(titles(&session), vec!["Same", "Same", "Zed", "beta"]);
    assert_eq!(session.playlist().get(0), Some(&first));
    assert_eq!(session.playlist().get(1), Some(&second));
}

#[test]
fn set_playlist_drops_duplicate_ids() {
    let (engine, _) = FakeEngine::new();
    let mut session = PlaybackSession::new(engine);
    session.set_playlist(vec![t("A"), t("A"), t("B")]);
    assert_eq!(session.playlist().len(), 2);
}

#[test]
fn empty_playlist_is_idle_with_no_cursor() {
    let (mut session, _) = playing_at(&["A", "B"], 1);
    session.set_playlist(Vec::new());
    assert_eq!(session.status(), PlaybackStatus::Idle);
    assert_eq!(session.cursor(), None);
    assert!(session.skip_to_next().is_ok());
    assert!(session.skip_to_previous().is_ok());
    assert_eq!(session.cursor(), None);
}

#[test]
fn set_playlist_does_not_start_playback() {
    let (_, probe) = session_with(&["A", "B"]);
    assert!(!probe.calls().iter().any(|c| matches!(c, EngineCall::Prepare(_))));
}

#[test]
fn set_playlist_follows_the_playing_track_by_id() {
    let (mut session, probe) = playing_at(&["B", "C"], 0);
    probe.clear_calls();

    session.set_playlist(tracks(&["C", "A", "B"]));
    assert_eq!(session.cursor(), Some(1));
    assert_eq!(session.current_track().unwrap().title, "B");
    assert_eq!(session.status(), PlaybackStatus::Playing);
    assert!(probe.calls().is_empty());
}

#[test]
fn set_playlist_stops_when_the_playing_track_disappears() {
    let (mut session, _) = playing_at(&["A", "B"], 1);
    session.take_notifications();

    session.set_playlist(tracks(&["A", "C"]));
    assert_eq!(session.cursor(), None);
    assert_eq!(session.status(), PlaybackStatus::Idle);
    let notes = session.take_notifications();
    assert!(notes.contains(&Notification::PlaylistChanged));
    assert!(notes.contains(&Notification::TrackChanged));
}

#[test]
fn select_and_play_rejects_out_of_range() {
    let (mut session, probe) = session_with(&["A", "B"]);
    let err = session.select_and_play(2).unwrap_err();
    assert!(matches!(err, SessionError::OutOfRange { index: 2, len: 2 }));
    assert_eq!(session.cursor(), None);
    assert_eq!(session.status(), PlaybackStatus::Idle);
    assert!(probe.calls().is_empty());
}

#[test]
fn select_and_play_resets_loads_and_prepares() {
    let (mut session, probe) = session_with(&["A", "B"]);
    session.select_and_play(1).unwrap();

    assert_eq!(session.cursor(), Some(1));
    assert_eq!(session.status(), PlaybackStatus::Preparing);
    assert_eq!(
        probe.calls(),
        vec![
            EngineCall::Reset,
            EngineCall::Load(PathBuf::from("/music/B.mp3")),
            EngineCall::Prepare(session.generation()),
        ]
    );

    prepared(&mut session);
    assert_eq!(session.status(), PlaybackStatus::Playing);
    assert_eq!(probe.calls().last(), Some(&EngineCall::Start));
    assert!(session.take_notifications().contains(&Notification::TransportReady));
}

#[test]
fn unopenable_source_leaves_a_reselectable_error_state() {
    let (mut session, probe) = session_with(&["A", "B"]);
    probe.make_unopenable("/music/A.mp3");

    let err = session.select_and_play(0).unwrap_err();
    assert!(matches!(err, SessionError::SourceUnavailable { ref title, .. } if title == "A"));
    assert_eq!(session.status(), PlaybackStatus::Error);
    assert_eq!(
        session.snapshot().fault.unwrap().message(),
        "\"A\" could not be played"
    );
    assert_eq!(session.cursor(), Some(0));

    session.select_and_play(1).unwrap();
    assert_eq!(session.status(), PlaybackStatus::Preparing);
    assert!(session.snapshot().fault.is_none());
}

#[test]
fn stale_prepared_callback_is_discarded() {
    let (mut session, probe) = session_with(&["A", "B"]);
    session.select_and_play(0).unwrap();
    let first = session.generation();
    session.select_and_play(1).unwrap();

    session.handle_event(EngineEvent::Prepared { generation: first });
    assert_eq!(session.status(), PlaybackStatus::Preparing);
    assert_eq!(session.cursor(), Some(1));
    assert!(!probe.calls().contains(&EngineCall::Start));

    prepared(&mut session);
    assert_eq!(session.status(), PlaybackStatus::Playing);
    assert_eq!(session.cursor(), Some(1));
}

#[test]
fn stale_error_and_completion_are_discarded() {
    let (mut session, _) = session_with(&["A", "B"]);
    session.select_and_play(0).unwrap();
    let old = session.generation();
    session.select_and_play(1).unwrap();
    prepared(&mut session);

    session.handle_event(EngineEvent::Error {
        generation: old,
        fault: EngineFault::Decode,
    });
    session.handle_event(EngineEvent::Completed {
        generation: old,
        position_ms: 500,
    });
    assert_eq!(session.status(), PlaybackStatus::Playing);
    assert_eq!(session.cursor(), Some(1));
}

#[test]
fn pause_and_resume_drive_the_engine() {
    let (mut session, probe) = playing_at(&["A"], 0);
    probe.clear_calls();

    session.pause();
    assert_eq!(session.status(), PlaybackStatus::Paused);
    session.pause();
    assert_eq!(probe.calls(), vec![EngineCall::Pause]);

    session.resume();
    assert_eq!(session.status(), PlaybackStatus::Playing);
    assert_eq!(probe.calls(), vec![EngineCall::Pause, EngineCall::Start]);
}

#[test]
fn resume_without_selection_is_a_no_op() {
    let (mut session, probe) = session_with(&["A"]);
    session.resume();
    assert_eq!(session.status(), PlaybackStatus::Idle);
    assert!(probe.calls().is_empty());
}

#[test]
fn pause_while_preparing_holds_the_track_loaded_but_not_started() {
    let (mut session, probe) = session_with(&["A"]);
    session.select_and_play(0).unwrap();
    session.pause();
    prepared(&mut session);

    assert_eq!(session.status(), PlaybackStatus::Paused);
    assert!(!probe.calls().contains(&EngineCall::Start));

    session.resume();
    assert_eq!(session.status(), PlaybackStatus::Playing);
    assert_eq!(probe.calls().last(), Some(&EngineCall::Start));
}

#[test]
fn seek_delegates_without_changing_status() {
    let (mut session, probe) = playing_at(&["A"], 0);
    probe.set_metrics(0, 10_000);
    session.seek(4_000);
    assert_eq!(probe.calls().last(), Some(&EngineCall::SeekTo(4_000)));
    assert_eq!(session.status(), PlaybackStatus::Playing);
    assert_eq!(session.current_position_ms(), 4_000);

    session.seek_by(10_000);
    assert_eq!(probe.calls().last(), Some(&EngineCall::SeekTo(10_000)));
    session.seek_by(-20_000);
    assert_eq!(probe.calls().last(), Some(&EngineCall::SeekTo(0)));
}

#[test]
fn metrics_are_zero_until_playing() {
    let (mut session, probe) = session_with(&["A"]);
    probe.set_metrics(1_000, 9_000);
    assert_eq!(session.current_position_ms(), 0);
    assert_eq!(session.current_duration_ms(), 0);

    session.select_and_play(0).unwrap();
    probe.set_metrics(1_000, 9_000);
    assert_eq!(session.current_duration_ms(), 0);

    prepared(&mut session);
    assert_eq!(session.current_position_ms(), 1_000);
    assert_eq!(session.current_duration_ms(), 9_000);
}

#[test]
fn paused_track_keeps_its_duration() {
    let (mut session, probe) = playing_at(&["A"], 0);
    probe.set_metrics(3_000, 180_000);
    session.pause();
    assert_eq!(session.current_duration_ms(), 180_000);
    assert_eq!(session.current_position_ms(), 3_000);
}

#[test]
fn sequential_next_wraps_to_the_start() {
    let (mut session, _) = playing_at(&["A", "B", "C"], 2);
    session.skip_to_next().unwrap();
    assert_eq!(session.cursor(), Some(0));
    assert_eq!(session.status(), PlaybackStatus::Preparing);
}

#[test]
fn next_with_nothing_selected_starts_at_the_top() {
    let (mut session, _) = session_with(&["A", "B"]);
    session.skip_to_next().unwrap();
    assert_eq!(session.cursor(), Some(0));
}

#[test]
fn shuffle_next_on_single_track_replays_it() {
    let (mut session, probe) = playing_at(&["Only"], 0);
    session.set_shuffle(true);
    probe.clear_calls();

    session.skip_to_next().unwrap();
    assert_eq!(session.cursor(), Some(0));
    assert_eq!(probe.loads(), vec![PathBuf::from("/music/Only.mp3")]);
}

#[test]
fn previous_wraps_and_ignores_shuffle() {
    let (mut session, _) = playing_at(&["A", "B", "C"], 0);
    session.set_shuffle(true);
    session.skip_to_previous().unwrap();
    assert_eq!(session.cursor(), Some(2));
    session.skip_to_previous().unwrap();
    assert_eq!(session.cursor(), Some(1));
    session.skip_to_previous().unwrap();
    assert_eq!(session.cursor(), Some(0));
}

#[test]
fn completion_with_auto_repeat_reloads_the_same_track() {
    let (mut session, probe) = playing_at(&["A", "B"], 1);
    session.set_auto_repeat(true);
    let before = session.generation();
    probe.clear_calls();

    session.handle_event(EngineEvent::Completed {
        generation: before,
        position_ms: 200_000,
    });
    assert_eq!(session.cursor(), Some(1));
    assert_eq!(session.status(), PlaybackStatus::Preparing);
    assert!(session.generation() > before);
    assert_eq!(
        probe.calls(),
        vec![
            EngineCall::Reset,
            EngineCall::Load(PathBuf::from("/music/B.mp3")),
            EngineCall::Prepare(session.generation()),
        ]
    );
}

#[test]
fn completion_without_auto_repeat_advances() {
    let (mut session, _) = playing_at(&["A", "B"], 1);
    let generation = session.generation();
    session.handle_event(EngineEvent::Completed {
        generation,
        position_ms: 1,
    });
    assert_eq!(session.cursor(), Some(0));
    assert_eq!(session.status(), PlaybackStatus::Preparing);
}

#[test]
fn completion_at_position_zero_is_ignored() {
    let (mut session, probe) = playing_at(&["A", "B"], 0);
    probe.clear_calls();
    let generation = session.generation();
    session.handle_event(EngineEvent::Completed {
        generation,
        position_ms: 0,
    });
    assert_eq!(session.cursor(), Some(0));
    assert_eq!(session.status(), PlaybackStatus::Playing);
    assert!(probe.calls().is_empty());
}

#[test]
fn tick_dispatches_polled_completions() {
    let (mut session, probe) = playing_at(&["A", "B"], 0);
    probe.queue_event(EngineEvent::Completed {
        generation: session.generation(),
        position_ms: 42,
    });
    session.tick();
    assert_eq!(session.cursor(), Some(1));
}

#[test]
fn engine_error_resets_and_does_not_advance() {
    let (mut session, probe) = playing_at(&["A", "B"], 0);
    probe.clear_calls();
    let generation = session.generation();
    session.handle_event(EngineEvent::Error {
        generation,
        fault: EngineFault::Decode,
    });

    assert_eq!(session.status(), PlaybackStatus::Error);
    assert_eq!(session.cursor(), Some(0));
    assert_eq!(probe.calls(), vec![EngineCall::Reset]);
    assert_eq!(session.current_position_ms(), 0);

    session.select_and_play(1).unwrap();
    assert_eq!(session.status(), PlaybackStatus::Preparing);
}

#[test]
fn toggle_pause_after_engine_error_reports_the_fault_without_retrying() {
    let (mut session, probe) = playing_at(&["A", "B"], 0);
    let generation = session.generation();
    session.handle_event(EngineEvent::Error {
        generation,
        fault: EngineFault::Decode,
    });
    probe.clear_calls();

    let err = session.toggle_pause().unwrap_err();
    assert!(matches!(err, SessionError::Engine(EngineFault::Decode)));
    assert_eq!(session.status(), PlaybackStatus::Error);
    assert!(probe.calls().is_empty());
}

#[test]
fn toggle_pause_starts_the_selection_when_idle() {
    let (mut session, _) = session_with(&["A", "B"]);
    session.toggle_pause().unwrap();
    assert_eq!(session.cursor(), Some(0));
    assert_eq!(session.status(), PlaybackStatus::Preparing);
    prepared(&mut session);
    session.toggle_pause().unwrap();
    assert_eq!(session.status(), PlaybackStatus::Paused);
    session.toggle_pause().unwrap();
    assert_eq!(session.status(), PlaybackStatus::Playing);
}

#[test]
fn flags_toggle_independently_and_notify() {
    let (mut session, _) = session_with(&["A"]);
    session.take_notifications();
    session.set_shuffle(true);
    assert!(session.flags().shuffle);
    assert!(!session.flags().auto_repeat);
    assert_eq!(session.take_notifications(), vec![Notification::StatusChanged]);
    session.set_shuffle(true);
    assert!(session.take_notifications().is_empty());
}

#[test]
fn deleting_the_playing_track_conflicts_and_changes_nothing() {
    let list = tracks(&["A", "B", "C"]);
    let store = MemoryStore::with(list.clone());
    let (engine, _) = FakeEngine::new();
    let mut session = PlaybackSession::new(engine);
    session.set_playlist(store.enumerate());
    session.select_and_play(1).unwrap();

    let err = session.delete_track(1, &store).unwrap_err();
    assert!(matches!(err, SessionError::DeleteConflict { ref title } if title == "B"));
    assert_eq!(session.cursor(), Some(1));
    assert_eq!(session.playlist().len(), 3);
    assert!(store.removed.lock().unwrap().is_empty());
}

#[test]
fn deleting_before_the_cursor_shifts_it_down() {
    let store = MemoryStore::with(tracks(&["A", "B", "C"]));
    let (engine, _) = FakeEngine::new();
    let mut session = PlaybackSession::new(engine);
    session.set_playlist(store.enumerate());
    session.select_and_play(2).unwrap();

    let removed = session.delete_track(0, &store).unwrap();
    assert_eq!(removed.title, "A");
    assert_eq!(titles(&session), vec!["B", "C"]);
    assert_eq!(session.cursor(), Some(1));
    assert_eq!(session.current_track().unwrap().title, "C");
    assert_eq!(session.status(), PlaybackStatus::Preparing);
}

#[test]
fn deleting_after_the_cursor_keeps_it() {
    let store = MemoryStore::with(tracks(&["A", "B", "C"]));
    let (engine, _) = FakeEngine::new();
    let mut session = PlaybackSession::new(engine);
    session.set_playlist(store.enumerate());
    session.select_and_play(0).unwrap();

    session.delete_track(2, &store).unwrap();
    assert_eq!(session.cursor(), Some(0));
    assert_eq!(session.playlist().len(), 2);
}

#[test]
fn deleting_a_missing_file_still_refreshes() {
    let store = MemoryStore::with(tracks(&["A", "B"]));
    store
        .gone
        .lock()
        .unwrap()
        .push(PathBuf::from("/music/A.mp3"));
    let (engine, _) = FakeEngine::new();
    let mut session = PlaybackSession::new(engine);
    session.set_playlist(store.enumerate());

    let err = session.delete_track(0, &store).unwrap_err();
    assert!(matches!(err, SessionError::Library(LibraryError::NotFound(_))));
    assert_eq!(titles(&session), vec!["B"]);
}

#[test]
fn delete_rejects_out_of_range() {
    let store = MemoryStore::with(tracks(&["A"]));
    let (engine, _) = FakeEngine::new();
    let mut session = PlaybackSession::new(engine);
    session.set_playlist(store.enumerate());
    assert!(matches!(
        session.delete_track(3, &store),
        Err(SessionError::OutOfRange { index: 3, len: 1 })
    ));
}

#[test]
fn teardown_stops_and_releases_the_engine() {
    let (mut session, probe) = playing_at(&["A"], 0);
    probe.clear_calls();
    let before = session.generation();
    session.teardown();
    assert_eq!(probe.calls(), vec![EngineCall::Stop, EngineCall::Release]);
    assert_eq!(session.status(), PlaybackStatus::Idle);

    // A callback from before the teardown must not restart anything.
    session.handle_event(EngineEvent::Prepared { generation: before });
    assert_eq!(session.status(), PlaybackStatus::Idle);
}

#[test]
fn snapshot_mirrors_session_state() {
    let (mut session, probe) = playing_at(&["A", "B"], 1);
    session.set_auto_repeat(true);
    probe.set_metrics(1_500, 60_000);

    let snap = session.snapshot();
    assert_eq!(snap.status, PlaybackStatus::Playing);
    assert_eq!(snap.cursor, Some(1));
    assert!(snap.flags.auto_repeat);
    assert_eq!(snap.current_track().unwrap().title, "B");
    assert_eq!(snap.position_ms, 1_500);
    assert_eq!(snap.duration_ms, 60_000);
    assert!(Arc::ptr_eq(&snap.playlist, &session.playlist().shared()));
}

fn arbitrary_titles() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[A-Za-z]{1,8}", 1..20)
}

fn session_from(titles: &[String], seed: u64) -> PlaybackSession<FakeEngine> {
    let (engine, _) = FakeEngine::new();
    let mut session = PlaybackSession::with_rng(engine, StdRng::seed_from_u64(seed));
    // Index-based locators keep ids unique even when titles repeat.
    session.set_playlist(
        titles
            .iter()
            .enumerate()
            .map(|(i, title)| Track::new(format!("/p/{i}.mp3"), title.clone()))
            .collect(),
    );
    session
}

proptest! {
    // len skips forward land back where we started
    #[test]
    fn sequential_next_cycles_back(titles in arbitrary_titles(), start in 0usize..20) {
        let mut session = session_from(&titles, 0);
        let start = start % titles.len();
        session.select_and_play(start).unwrap();
        for _ in 0..titles.len() {
            session.skip_to_next().unwrap();
        }
        prop_assert_eq!(session.cursor(), Some(start));
    }

    #[test]
    fn shuffle_next_always_moves(titles in prop::collection::vec("[a-z]{1,6}", 2..20), seed in any::<u64>()) {
        let mut session = session_from(&titles, seed);
        session.set_shuffle(true);
        session.select_and_play(0).unwrap();
        for _ in 0..50 {
            let before = session.cursor();
            session.skip_to_next().unwrap();
            prop_assert_ne!(session.cursor(), before);
            prop_assert!(session.cursor().unwrap() < titles.len());
        }
    }

    #[test]
    fn playlist_is_always_title_ordered(titles in arbitrary_titles()) {
        let session = session_from(&titles, 0);
        let stored: Vec<&str> = session.playlist().iter().map(|t| t.title.as_str()).collect();
        prop_assert!(stored.windows(2).all(|w| w[0] <= w[1]));
        prop_assert_eq!(stored.len(), titles.len());
    }

    // shuffle has no say in previous
    #[test]
    fn previous_steps_back_by_one(titles in arbitrary_titles(), start in 0usize..20, shuffle in any::<bool>()) {
        let mut session = session_from(&titles, 0);
        let start = start % titles.len();
        session.set_shuffle(shuffle);
        session.select_and_play(start).unwrap();
        session.skip_to_previous().unwrap();
        let expected = if start == 0 { titles.len() - 1 } else { start - 1 };
        prop_assert_eq!(session.cursor(), Some(expected));
    }
}
