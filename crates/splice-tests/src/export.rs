//! Integration tests for the export session.
//!
//! A scripted in-memory backend stands in for ffmpeg so the session's
//! sequencing, progress and reset behaviour can be checked deterministically.

use std::sync::{Arc, Mutex};

use splice_core::RationalTime;
use splice_media::{
    BackendError, EncodeBackend, EncodeJob, ExportCancel, ExportError, ExportPhase, ExportProgress,
    ExportSession, ProgressFn,
};
use splice_render::{input_name, CompileOptions, FontResource};
use splice_timeline::{
    Asset, AssetId, EditCommand, Editor, ExportSettings, MediaData, Project, TextDescriptor, TrackKind,
};

// ── Scripted backend ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum Outcome {
    Succeed,
    /// Exit as an encoder would on a bad graph.
    Fail,
}

#[derive(Debug, Default)]
struct Calls {
    created: usize,
    begun: usize,
    loaded: Vec<String>,
    jobs: Vec<EncodeJob>,
}

struct ScriptedBackend {
    outcomes: Arc<Mutex<Vec<Outcome>>>,
    calls: Arc<Mutex<Calls>>,
    started: bool,
}

impl EncodeBackend for ScriptedBackend {
    fn begin(&mut self) -> Result<(), BackendError> {
        self.started = true;
        self.calls.lock().unwrap().begun += 1;
        Ok(())
    }

    fn load_input(&mut self, name: &str, bytes: &[u8]) -> Result<(), BackendError> {
        if !self.started {
            return Err(BackendError::NotStarted);
        }
        assert!(!bytes.is_empty(), "{name} loaded without bytes");
        self.calls.lock().unwrap().loaded.push(name.to_string());
        Ok(())
    }

    fn execute(
        &mut self,
        job: &EncodeJob,
        progress: &mut dyn FnMut(f64),
        cancel: &ExportCancel,
    ) -> Result<Vec<u8>, BackendError> {
        self.calls.lock().unwrap().jobs.push(job.clone());
        let outcome = {
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                Outcome::Succeed
            } else {
                outcomes.remove(0)
            }
        };
        for step in 1..=4 {
            if cancel.is_cancelled() {
                return Err(BackendError::Cancelled);
            }
            progress(step as f64 / 4.0);
        }
        match outcome {
            Outcome::Succeed => Ok(b"encoded".to_vec()),
            Outcome::Fail => Err(BackendError::Failed {
                status: "exit status: 1".to_string(),
                diagnostic: "Invalid argument".to_string(),
            }),
        }
    }
}

struct Harness {
    session: ExportSession,
    calls: Arc<Mutex<Calls>>,
}

fn harness(outcomes: Vec<Outcome>) -> Harness {
    let outcomes = Arc::new(Mutex::new(outcomes));
    let calls = Arc::new(Mutex::new(Calls::default()));
    let session = {
        let calls = Arc::clone(&calls);
        ExportSession::new(move || {
            calls.lock().unwrap().created += 1;
            Ok(Box::new(ScriptedBackend {
                outcomes: Arc::clone(&outcomes),
                calls: Arc::clone(&calls),
                started: false,
            }) as Box<dyn EncodeBackend>)
        })
    };
    Harness { session, calls }
}

fn recorder() -> (ProgressFn, Arc<Mutex<Vec<ExportProgress>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let progress: ProgressFn = Arc::new(move |p| sink.lock().unwrap().push(p));
    (progress, seen)
}

// ── Projects ───────────────────────────────────────────────────

fn add(editor: &mut Editor, asset: Asset) -> AssetId {
    let id = asset.id;
    editor.dispatch(EditCommand::AddAsset(asset)).unwrap();
    id
}

fn place(editor: &mut Editor, track: TrackKind, asset: AssetId, start: i64) {
    editor
        .dispatch(EditCommand::Place {
            track,
            asset,
            start: RationalTime::from_secs(start),
        })
        .unwrap();
}

/// One video used on both the video and the audio track, twice each, plus a
/// caption. Every asset must still be loaded only once.
fn reused_video() -> (Project, AssetId) {
    let mut editor = Editor::default();
    let video = add(
        &mut editor,
        Asset::video(
            "take.mp4",
            MediaData::new(Some("video/mp4".into()), vec![5u8; 64]),
            RationalTime::from_secs(3),
            1280,
            720,
        ),
    );
    let caption = add(&mut editor, Asset::text(TextDescriptor::new("Take one")));
    for start in [0, 4] {
        place(&mut editor, TrackKind::Video, video, start);
        place(&mut editor, TrackKind::Audio, video, start);
    }
    place(&mut editor, TrackKind::Text, caption, 0);
    (editor.into_state(), video)
}

fn font() -> CompileOptions {
    CompileOptions {
        font: Some(FontResource::new(vec![1u8; 32])),
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn successful_export_reports_every_phase() {
    let h = harness(vec![Outcome::Succeed]);
    let (project, video) = reused_video();
    let (progress, seen) = recorder();

    let output = h
        .session
        .export(&project, &ExportSettings::default(), &font(), progress, ExportCancel::new())
        .await
        .unwrap();

    assert_eq!(output.bytes, b"encoded");
    assert_eq!(output.plan.duration, RationalTime::from_secs(7));

    let seen = seen.lock().unwrap().clone();
    let phases: Vec<ExportPhase> = seen.iter().map(|p| p.phase).collect();
    assert_eq!(phases.first(), Some(&ExportPhase::Preparing));
    assert_eq!(seen.last().map(|p| (p.phase, p.fraction)), Some((ExportPhase::Complete, 1.0)));
    let loading = phases.iter().position(|p| *p == ExportPhase::Loading).unwrap();
    let encoding = phases.iter().position(|p| *p == ExportPhase::Encoding).unwrap();
    assert!(loading < encoding);
    assert!(seen.iter().all(|p| (0.0..=1.0).contains(&p.fraction)));

    assert_eq!(
        h.calls.lock().unwrap().loaded,
        vec![input_name(video), "font.ttf".to_string()]
    );
    assert!(h.session.has_backend().await);
}

#[tokio::test]
async fn job_carries_the_compiled_arguments() {
    let h = harness(Vec::new());
    let (project, video) = reused_video();
    let (progress, _) = recorder();

    let output = h
        .session
        .export(&project, &ExportSettings::default(), &font(), progress, ExportCancel::new())
        .await
        .unwrap();

    let calls = h.calls.lock().unwrap();
    let job = &calls.jobs[0];
    assert_eq!(job.args, output.plan.encode_args("output.mp4"));
    assert_eq!(job.output, "output.mp4");
    // Four clips read the same file.
    let name = input_name(video);
    assert_eq!(job.args.iter().filter(|a| **a == name).count(), 4);
}

#[tokio::test]
async fn invalid_project_never_reaches_the_backend() {
    let h = harness(Vec::new());
    let (progress, _) = recorder();

    let err = h
        .session
        .export(
            &Project::new("Empty"),
            &ExportSettings::default(),
            &CompileOptions::default(),
            progress,
            ExportCancel::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::Validation(_)));
    assert_eq!(h.calls.lock().unwrap().created, 0);
    assert!(!h.session.has_backend().await);
}

#[tokio::test]
async fn failed_backend_is_replaced_on_next_export() {
    let h = harness(vec![Outcome::Fail, Outcome::Succeed]);
    let (project, _) = reused_video();

    let (progress, _) = recorder();
    let err = h
        .session
        .export(&project, &ExportSettings::default(), &font(), progress, ExportCancel::new())
        .await
        .unwrap_err();
    match err {
        ExportError::Backend(BackendError::Failed { diagnostic, .. }) => {
            assert_eq!(diagnostic, "Invalid argument");
        }
        other => panic!("expected encoder failure, got {other:?}"),
    }
    assert!(!h.session.has_backend().await);

    let (progress, _) = recorder();
    h.session
        .export(&project, &ExportSettings::default(), &font(), progress, ExportCancel::new())
        .await
        .unwrap();

    let calls = h.calls.lock().unwrap();
    assert_eq!(calls.created, 2);
    assert_eq!(calls.begun, 2);
}

#[tokio::test]
async fn healthy_backend_is_reused() {
    let h = harness(Vec::new());
    let (project, video) = reused_video();

    for _ in 0..2 {
        let (progress, _) = recorder();
        h.session
            .export(&project, &ExportSettings::default(), &font(), progress, ExportCancel::new())
            .await
            .unwrap();
    }

    let calls = h.calls.lock().unwrap();
    assert_eq!(calls.created, 1);
    assert_eq!(calls.begun, 2);
    // Each export loads its sources again into a fresh working set.
    let name = input_name(video);
    assert_eq!(calls.loaded.iter().filter(|n| **n == name).count(), 2);
}

#[tokio::test]
async fn cancelling_mid_encode_stops_the_export() {
    let h = harness(Vec::new());
    let (project, _) = reused_video();
    let cancel = ExportCancel::new();

    let trigger = cancel.clone();
    let progress: ProgressFn = Arc::new(move |p: ExportProgress| {
        if p.phase == ExportPhase::Encoding && p.fraction >= 0.5 {
            trigger.cancel();
        }
    });

    let err = h
        .session
        .export(&project, &ExportSettings::default(), &font(), progress, cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::Cancelled));
    assert!(!h.session.has_backend().await);
}

#[tokio::test]
async fn cancel_before_loading_skips_the_encoder() {
    let h = harness(Vec::new());
    let (project, _) = reused_video();
    let cancel = ExportCancel::new();
    cancel.cancel();

    let (progress, _) = recorder();
    let err = h
        .session
        .export(&project, &ExportSettings::default(), &font(), progress, cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::Cancelled));
    let calls = h.calls.lock().unwrap();
    assert!(calls.loaded.is_empty());
    assert!(calls.jobs.is_empty());
}
