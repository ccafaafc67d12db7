//! Integration tests for the timeline subsystem.
//!
//! Exercises edit sequences, history and persistence across splice-core and
//! splice-timeline.

use proptest::prelude::*;
use splice_core::RationalTime;
use splice_timeline::{
    Asset, AssetId, EditCommand, Editor, MediaData, Project, ProjectFile, Rejection, TextDescriptor,
    TrackKind,
};

// ── Helpers ────────────────────────────────────────────────────

fn secs(s: f64) -> RationalTime {
    RationalTime::from_seconds_f64(s)
}

fn media() -> MediaData {
    MediaData::new(Some("video/mp4".into()), vec![7u8; 32])
}

struct Fixture {
    editor: Editor,
    video: AssetId,
    song: AssetId,
    still: AssetId,
    caption: AssetId,
}

fn fixture() -> Fixture {
    let mut editor = Editor::default();
    let video = Asset::video("intro.mp4", media(), secs(12.0), 1920, 1080);
    let song = Asset::audio("music.mp3", media(), secs(30.0));
    let still = Asset::image("logo.png", media(), 512, 512);
    let caption = Asset::text(TextDescriptor::new("Welcome"));
    let ids = (video.id, song.id, still.id, caption.id);
    for asset in [video, song, still, caption] {
        editor.dispatch(EditCommand::AddAsset(asset)).unwrap();
    }
    Fixture {
        editor,
        video: ids.0,
        song: ids.1,
        still: ids.2,
        caption: ids.3,
    }
}

fn place(editor: &mut Editor, track: TrackKind, asset: AssetId, start: f64) -> Result<(), Rejection> {
    editor.dispatch(EditCommand::Place {
        track,
        asset,
        start: secs(start),
    })
}

// ── Assembly ───────────────────────────────────────────────────

#[test]
fn project_end_is_latest_clip_end() {
    let mut f = fixture();
    place(&mut f.editor, TrackKind::Video, f.video, 0.0).unwrap();
    place(&mut f.editor, TrackKind::Video, f.still, 12.0).unwrap();
    place(&mut f.editor, TrackKind::Audio, f.song, 2.0).unwrap();
    place(&mut f.editor, TrackKind::Text, f.caption, 1.0).unwrap();

    let project = f.editor.state();
    assert_eq!(project.video.end_time(), secs(17.0));
    assert_eq!(project.end_time(), secs(32.0));
    assert_eq!(project.clips().count(), 4);
}

#[test]
fn video_asset_can_feed_audio_track() {
    let mut f = fixture();
    place(&mut f.editor, TrackKind::Audio, f.video, 0.0).unwrap();
    assert_eq!(f.editor.state().audio.clips[0].duration, secs(12.0));
    assert!(matches!(
        place(&mut f.editor, TrackKind::Audio, f.still, 20.0),
        Err(Rejection::IncompatibleTrack { .. })
    ));
}

#[test]
fn removing_asset_cascades_and_is_undoable() {
    let mut f = fixture();
    place(&mut f.editor, TrackKind::Video, f.video, 0.0).unwrap();
    place(&mut f.editor, TrackKind::Audio, f.video, 0.0).unwrap();
    place(&mut f.editor, TrackKind::Video, f.still, 20.0).unwrap();

    f.editor.dispatch(EditCommand::RemoveAsset(f.video)).unwrap();
    let project = f.editor.state();
    assert!(project.asset(f.video).is_none());
    assert_eq!(project.clips().count(), 1);

    assert!(f.editor.undo());
    assert_eq!(f.editor.state().clips().count(), 3);
}

// ── History ────────────────────────────────────────────────────

#[test]
fn undo_redo_walks_whole_states() {
    let mut f = fixture();
    place(&mut f.editor, TrackKind::Video, f.video, 0.0).unwrap();
    let clip = f.editor.state().video.clips[0].id;
    let placed = f.editor.state().clone();

    f.editor
        .dispatch(EditCommand::Split { clip, at: secs(4.0) })
        .unwrap();
    let split = f.editor.state().clone();
    assert_eq!(split.video.clips.len(), 2);

    assert!(f.editor.undo());
    assert_eq!(f.editor.state(), &placed);
    assert!(f.editor.redo());
    assert_eq!(f.editor.state(), &split);
}

#[test]
fn rejected_edits_do_not_enter_history() {
    let mut f = fixture();
    place(&mut f.editor, TrackKind::Video, f.still, 0.0).unwrap();
    let err = place(&mut f.editor, TrackKind::Video, f.still, 2.0).unwrap_err();
    assert_eq!(err, Rejection::Overlap(TrackKind::Video));

    assert!(f.editor.undo());
    assert!(f.editor.state().video.is_empty());
}

#[test]
fn batch_is_all_or_nothing() {
    let mut f = fixture();
    let before = f.editor.state().clone();
    let batch = EditCommand::Batch(vec![
        EditCommand::Place {
            track: TrackKind::Video,
            asset: f.still,
            start: secs(0.0),
        },
        EditCommand::Place {
            track: TrackKind::Video,
            asset: f.still,
            start: secs(1.0),
        },
    ]);
    assert!(f.editor.dispatch(batch).is_err());
    assert_eq!(f.editor.state(), &before);
}

// ── Persistence ────────────────────────────────────────────────

#[test]
fn edited_project_survives_file_round_trip() {
    let mut f = fixture();
    place(&mut f.editor, TrackKind::Video, f.video, 0.0).unwrap();
    let clip = f.editor.state().video.clips[0].id;
    f.editor
        .dispatch(EditCommand::SetSpeed { clip, speed: 1.5 })
        .unwrap();
    f.editor
        .dispatch(EditCommand::SetFades {
            clip,
            fade_in: Some(0.5),
            fade_out: None,
        })
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("project.json");
    ProjectFile::new(f.editor.state().clone())
        .save_to_file(&path)
        .unwrap();
    let loaded = ProjectFile::load_from_file(&path).unwrap().project;

    assert_eq!(&loaded, f.editor.state());
    let media = loaded.asset(f.video).and_then(|a| a.media()).unwrap();
    assert_eq!(media.len(), 32);
}

#[test]
fn large_payload_is_stored_compactly() {
    let mut editor = Editor::default();
    let clip = Asset::video(
        "long.mp4",
        MediaData::new(Some("video/mp4".into()), vec![0x5Au8; 1_000_000]),
        secs(60.0),
        1920,
        1080,
    );
    let id = clip.id;
    editor.dispatch(EditCommand::AddAsset(clip)).unwrap();
    place(&mut editor, TrackKind::Video, id, 0.0).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("large.json");
    ProjectFile::new(editor.state().clone()).save_to_file(&path).unwrap();

    let on_disk = std::fs::metadata(&path).unwrap().len();
    assert!(on_disk < 1_400_000, "1 MB payload took {on_disk} bytes on disk");
    let loaded = ProjectFile::load_from_file(&path).unwrap().project;
    assert_eq!(loaded.asset(id).and_then(|a| a.media()).map(MediaData::len), Some(1_000_000));
}

#[test]
fn unwrapped_project_documents_are_refused() {
    let bare = serde_json::to_vec(&Project::new("Bare")).unwrap();
    assert!(ProjectFile::from_json(&bare).is_err());
}

#[test]
fn document_with_overlapping_clips_is_refused() {
    let mut f = fixture();
    place(&mut f.editor, TrackKind::Video, f.still, 0.0).unwrap();
    let mut project = f.editor.state().clone();
    let mut twin = project.video.clips[0].clone();
    twin.id = splice_timeline::ClipId::new();
    twin.start = secs(2.0);
    project.video.clips.push(twin);

    let bytes = ProjectFile::new(project).to_json().unwrap();
    assert!(ProjectFile::from_json(&bytes).is_err());
}

#[test]
fn newer_documents_are_refused() {
    let doc = serde_json::json!({
        "version": splice_timeline::CURRENT_VERSION + 1,
        "project": {},
        "app_version": "9.0.0",
    });
    let bytes = serde_json::to_vec(&doc).unwrap();
    assert!(ProjectFile::from_json(&bytes).is_err());
}

// ── Invariants under random edits ──────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Place { track: usize, asset: usize, start: u16 },
    Move { clip: usize, start: u16 },
    TrimLeft { clip: usize, start: u16 },
    TrimRight { clip: usize, duration: u16 },
    Split { clip: usize, at: u16 },
    Remove { clip: usize },
    Speed { clip: usize, speed: u8 },
    Undo,
    Redo,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize, 0..4usize, 0..400u16).prop_map(|(track, asset, start)| Op::Place { track, asset, start }),
        (0..8usize, 0..400u16).prop_map(|(clip, start)| Op::Move { clip, start }),
        (0..8usize, 0..400u16).prop_map(|(clip, start)| Op::TrimLeft { clip, start }),
        (0..8usize, 0..200u16).prop_map(|(clip, duration)| Op::TrimRight { clip, duration }),
        (0..8usize, 0..400u16).prop_map(|(clip, at)| Op::Split { clip, at }),
        (0..8usize).prop_map(|clip| Op::Remove { clip }),
        (0..8usize, 1..40u8).prop_map(|(clip, speed)| Op::Speed { clip, speed }),
        Just(Op::Undo),
        Just(Op::Redo),
    ]
}

/// Tenths of a second.
fn tenths(v: u16) -> RationalTime {
    RationalTime::new(v as i64, 10)
}

fn apply(f: &mut Fixture, op: Op) {
    let clips: Vec<_> = f.editor.state().clips().map(|c| c.id).collect();
    let pick = |i: usize| clips.get(i % clips.len().max(1)).copied();
    let command = match op {
        Op::Place { track, asset, start } => Some(EditCommand::Place {
            track: TrackKind::ALL[track],
            asset: [f.video, f.song, f.still, f.caption][asset],
            start: tenths(start),
        }),
        Op::Move { clip, start } => pick(clip).map(|clip| EditCommand::Move {
            clip,
            start: tenths(start),
        }),
        Op::TrimLeft { clip, start } => pick(clip).map(|clip| EditCommand::TrimLeft {
            clip,
            start: tenths(start),
        }),
        Op::TrimRight { clip, duration } => pick(clip).map(|clip| EditCommand::TrimRight {
            clip,
            duration: tenths(duration),
        }),
        Op::Split { clip, at } => pick(clip).map(|clip| EditCommand::Split { clip, at: tenths(at) }),
        Op::Remove { clip } => pick(clip).map(EditCommand::Remove),
        Op::Speed { clip, speed } => pick(clip).map(|clip| EditCommand::SetSpeed {
            clip,
            speed: speed as f64 / 10.0,
        }),
        Op::Undo => {
            f.editor.undo();
            None
        }
        Op::Redo => {
            f.editor.redo();
            None
        }
    };
    if let Some(command) = command {
        let _ = f.editor.dispatch(command);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn tracks_stay_overlap_free(ops in prop::collection::vec(op(), 1..40)) {
        let mut f = fixture();
        for op in ops {
            apply(&mut f, op);
            let project = f.editor.state();
            for track in project.tracks() {
                prop_assert!(track.is_overlap_free(), "overlap on {} track", track.kind);
                for clip in &track.clips {
                    prop_assert!(clip.duration > RationalTime::ZERO);
                    prop_assert!(!clip.start.is_negative());
                    prop_assert!(!clip.trim_start.is_negative());
                    prop_assert!(project.asset(clip.asset_id).is_some());
                }
            }
        }
    }
}
