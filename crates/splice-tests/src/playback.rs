//! Integration tests for preview resolution and the playback transport.

use std::time::{Duration, Instant};

use splice_compositor::{resolve_at_time, total_duration, Tick, Transport, VisualSource};
use splice_core::RationalTime;
use splice_timeline::{Asset, AssetId, EditCommand, Editor, MediaData, TextDescriptor, TrackKind};

fn secs(s: f64) -> RationalTime {
    RationalTime::from_seconds_f64(s)
}

fn add(editor: &mut Editor, asset: Asset) -> AssetId {
    let id = asset.id;
    editor.dispatch(EditCommand::AddAsset(asset)).unwrap();
    id
}

fn place(editor: &mut Editor, track: TrackKind, asset: AssetId, start: f64) {
    editor
        .dispatch(EditCommand::Place {
            track,
            asset,
            start: secs(start),
        })
        .unwrap();
}

/// Video 0..8 with a 1 s fade-in, image 8..13, music 0..6 and one caption 2..7.
fn slideshow() -> Editor {
    let mut editor = Editor::default();
    let video = add(
        &mut editor,
        Asset::video("clip.mp4", MediaData::new(None, vec![1u8; 4]), secs(8.0), 1280, 720),
    );
    let still = add(
        &mut editor,
        Asset::image("card.png", MediaData::new(None, vec![2u8; 4]), 800, 600),
    );
    let music = add(
        &mut editor,
        Asset::audio("music.wav", MediaData::new(None, vec![3u8; 4]), secs(6.0)),
    );
    let caption = add(&mut editor, Asset::text(TextDescriptor::new("Chapter one").with_fades(1.0, 1.0)));

    place(&mut editor, TrackKind::Video, video, 0.0);
    place(&mut editor, TrackKind::Video, still, 8.0);
    place(&mut editor, TrackKind::Audio, music, 0.0);
    place(&mut editor, TrackKind::Text, caption, 2.0);

    let clip = editor.state().video.clips[0].id;
    editor
        .dispatch(EditCommand::SetFades {
            clip,
            fade_in: Some(1.0),
            fade_out: None,
        })
        .unwrap();
    editor
}

#[test]
fn frame_layers_follow_the_timeline() {
    let editor = slideshow();
    let project = editor.state();

    let early = resolve_at_time(secs(0.5), project);
    let visual = early.visual.as_ref().unwrap();
    assert_eq!(visual.source, VisualSource::Video);
    assert!((visual.opacity - 0.5).abs() < 1e-9);
    assert!(early.audio.is_some());
    assert!(early.text.is_empty());

    let middle = resolve_at_time(secs(4.0), project);
    assert_eq!(middle.text.len(), 1);
    assert_eq!(middle.text[0].text, "Chapter one");
    assert_eq!(middle.text[0].opacity, 1.0);
    assert_eq!(middle.audio.as_ref().unwrap().source_time, secs(4.0));

    let late = resolve_at_time(secs(10.0), project);
    assert_eq!(late.visual.as_ref().unwrap().source, VisualSource::Image);
    assert!(late.audio.is_none());

    assert!(resolve_at_time(secs(13.0), project).is_blank());
}

#[test]
fn speed_and_trim_shift_the_source_time() {
    let mut editor = slideshow();
    let clip = editor.state().video.clips[0].id;
    editor
        .dispatch(EditCommand::TrimLeft { clip, start: secs(2.0) })
        .unwrap();
    let clip = editor.state().video.clips[0].id;
    editor
        .dispatch(EditCommand::SetSpeed { clip, speed: 2.0 })
        .unwrap();

    // Source window 2..8 played at 2x occupies 2..5 on the timeline.
    let trimmed = editor.state().video.clips[0].clone();
    assert_eq!(trimmed.duration, secs(3.0));
    let frame = resolve_at_time(secs(3.0), editor.state());
    assert_eq!(frame.visual.unwrap().source_time, secs(4.0));
}

#[test]
fn muted_track_resolves_silent() {
    let mut editor = slideshow();
    editor
        .dispatch(EditCommand::UpdateTrack {
            track: TrackKind::Audio,
            volume: 80.0,
            muted: true,
            noise_reduction: false,
        })
        .unwrap();
    let frame = resolve_at_time(secs(3.0), editor.state());
    assert_eq!(frame.audio.unwrap().gain, 0.0);
}

#[test]
fn duration_has_a_ten_second_floor() {
    let mut editor = Editor::default();
    assert_eq!(total_duration(editor.state()), secs(10.0));

    let still = add(&mut editor, Asset::image("a.png", MediaData::empty(None), 10, 10));
    place(&mut editor, TrackKind::Video, still, 0.0);
    assert_eq!(total_duration(editor.state()), secs(10.0));

    assert_eq!(total_duration(slideshow().state()), secs(13.0));
}

#[test]
fn transport_plays_to_the_end_and_rewinds() {
    let project = slideshow().into_state();
    let mut transport = Transport::new(total_duration(&project));
    let t0 = Instant::now();

    assert_eq!(transport.tick(t0), Tick::Idle(RationalTime::ZERO));
    transport.play(t0);
    assert_eq!(transport.tick(t0 + Duration::from_secs(4)), Tick::Advanced(secs(4.0)));

    // The preview at the playhead shows the caption.
    let frame = resolve_at_time(transport.position(), &project);
    assert_eq!(frame.text.len(), 1);

    assert_eq!(transport.tick(t0 + Duration::from_secs(14)), Tick::Ended);
    assert!(!transport.is_playing());
    assert_eq!(transport.position(), RationalTime::ZERO);
}

#[test]
fn transport_follows_edits_that_shorten_the_timeline() {
    let mut editor = slideshow();
    let t0 = Instant::now();
    let mut transport = Transport::new(total_duration(editor.state()));
    transport.seek(secs(12.0), t0);

    let still = editor.state().video.clips[1].id;
    editor.dispatch(EditCommand::Remove(still)).unwrap();
    transport.set_duration(total_duration(editor.state()), t0);

    assert_eq!(transport.duration(), secs(10.0));
    assert_eq!(transport.position(), secs(10.0));
}
