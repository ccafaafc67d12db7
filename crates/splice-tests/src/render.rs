//! Integration tests for export compilation.
//!
//! Builds projects through the editor and checks the compiled graph text.

use splice_core::RationalTime;
use splice_render::{
    compile, input_name, CompileError, CompileOptions, Degradation, FontResource, ValidationIssue,
};
use splice_timeline::{
    Asset, AssetId, EditCommand, Editor, ExportSettings, MediaData, ProjectFile, Quality, Resolution,
    TextDescriptor, TrackKind,
};

fn secs(s: f64) -> RationalTime {
    RationalTime::from_seconds_f64(s)
}

fn media() -> MediaData {
    MediaData::new(None, vec![9u8; 8])
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

fn hd720() -> ExportSettings {
    ExportSettings {
        resolution: Resolution::Hd720,
        quality: Quality::Medium,
    }
}

struct Mixed {
    editor: Editor,
    video: AssetId,
    still: AssetId,
    music: AssetId,
}

/// Video trimmed to 0..4, a gap, an image at 6..11, music at 1..9 on a
/// half-volume track and a caption at 1..6.
fn mixed() -> Mixed {
    let mut editor = Editor::default();
    let video = add(&mut editor, Asset::video("shot.mp4", media(), secs(10.0), 1920, 1080));
    let still = add(&mut editor, Asset::image("title.png", media(), 1024, 768));
    let music = add(&mut editor, Asset::audio("bed.mp3", media(), secs(8.0)));
    let caption = add(&mut editor, Asset::text(TextDescriptor::new("Hi: there")));

    place(&mut editor, TrackKind::Video, video, 0.0);
    let clip = editor.state().video.clips[0].id;
    editor
        .dispatch(EditCommand::TrimRight {
            clip,
            duration: secs(4.0),
        })
        .unwrap();
    place(&mut editor, TrackKind::Video, still, 6.0);
    place(&mut editor, TrackKind::Audio, music, 1.0);
    place(&mut editor, TrackKind::Text, caption, 1.0);
    editor
        .dispatch(EditCommand::UpdateTrack {
            track: TrackKind::Audio,
            volume: 50.0,
            muted: false,
            noise_reduction: false,
        })
        .unwrap();

    Mixed {
        editor,
        video,
        still,
        music,
    }
}

const FIT_720: &str =
    "scale=1280:720:force_original_aspect_ratio=decrease,pad=1280:720:(ow-iw)/2:(oh-ih)/2,setsar=1";

#[test]
fn mixed_project_compiles_to_exact_graph() {
    let m = mixed();
    let options = CompileOptions {
        font: Some(FontResource::new(vec![0u8; 16])),
    };
    let plan = compile(m.editor.state(), &hd720(), &options).unwrap();

    let expected = [
        format!("[0:v]trim=start=0:end=4,setpts=PTS-STARTPTS,fps=30,{FIT_720}[v0]"),
        "color=c=black:s=1280x720:d=2:r=30[gap1]".to_string(),
        format!("[1:v]loop=loop=150:size=1:start=0,fps=30,trim=duration=5,setpts=PTS-STARTPTS,{FIT_720}[v1]"),
        "[v0][gap1][v1]concat=n=3:v=1:a=0[vcat]".to_string(),
        "[vcat]drawtext=fontfile=font.ttf:text='Hi\\: there':fontsize=48:fontcolor=0xFFFFFF\
         :x=(w*0.5)-text_w/2:y=(h*0.5)\
         :alpha='clip(min(if(lt(t,1.5),(t-1)/0.5,1),if(gt(t,5.5),(6-t)/0.5,1)),0,1)'\
         :enable='between(t,1,6)'[vout]"
            .to_string(),
        "[2:a]atrim=start=0:end=8,asetpts=PTS-STARTPTS,volume=0.5,adelay=1000:all=1[aout]".to_string(),
    ]
    .join(";");
    assert_eq!(plan.filter_complex(), expected);

    assert_eq!(plan.video_duration, secs(11.0));
    assert_eq!(plan.audio_duration, secs(9.0));
    assert_eq!(plan.duration, secs(11.0));
    assert_eq!(plan.working_set(), vec![m.video, m.still, m.music]);
    assert!(plan.font.is_some());
    assert!(plan.degradations.is_empty());
}

#[test]
fn missing_font_degrades_instead_of_failing() {
    let m = mixed();
    let plan = compile(m.editor.state(), &hd720(), &CompileOptions::default()).unwrap();

    assert!(plan.filter_complex().contains("[vcat]null[vout]"));
    assert!(!plan.filter_complex().contains("drawtext"));
    assert_eq!(
        plan.degradations,
        vec![Degradation::TextOverlaysSkipped { overlays: 1 }]
    );
    assert!(plan.font.is_none());
}

#[test]
fn encode_args_reference_working_set_names() {
    let m = mixed();
    let plan = compile(m.editor.state(), &hd720(), &CompileOptions::default()).unwrap();
    let args = plan.encode_args("output.mp4");

    let inputs: Vec<&str> = args
        .windows(2)
        .filter(|w| w[0] == "-i")
        .map(|w| w[1].as_str())
        .collect();
    assert_eq!(
        inputs,
        vec![
            input_name(m.video).as_str(),
            input_name(m.still).as_str(),
            input_name(m.music).as_str()
        ]
    );
    assert!(args.windows(2).any(|w| w == ["-map", "[aout]"]));
    assert!(args.windows(2).any(|w| w == ["-c:a", "aac"]));
    assert_eq!(args.last().map(String::as_str), Some("output.mp4"));
}

#[test]
fn shared_asset_is_one_file_with_two_inputs() {
    let mut editor = Editor::default();
    let video = add(&mut editor, Asset::video("talk.mp4", media(), secs(6.0), 1280, 720));
    place(&mut editor, TrackKind::Video, video, 0.0);
    place(&mut editor, TrackKind::Audio, video, 0.0);

    let plan = compile(editor.state(), &hd720(), &CompileOptions::default()).unwrap();
    assert_eq!(plan.inputs.len(), 2);
    assert_eq!(plan.inputs[0].name, plan.inputs[1].name);
    assert_eq!(plan.working_set(), vec![video]);
    assert!(plan.filter_complex().ends_with("[1:a]atrim=start=0:end=6,asetpts=PTS-STARTPTS,volume=1[aout]"));
}

#[test]
fn stripped_project_cannot_be_exported() {
    let m = mixed();
    let stripped = ProjectFile::new(m.editor.state().clone()).without_bytes().project;

    let err = compile(&stripped, &hd720(), &CompileOptions::default()).unwrap_err();
    let CompileError::Invalid(report) = err else {
        panic!("expected a validation failure");
    };
    // Three media assets lack bytes; the text asset has none to lose.
    assert_eq!(report.len(), 3);
    assert!(report
        .issues
        .iter()
        .all(|issue| matches!(issue, ValidationIssue::MissingBytes { .. })));
}

#[test]
fn resolution_and_quality_reach_the_encoder() {
    let m = mixed();
    let settings = ExportSettings {
        resolution: Resolution::Hd1080,
        quality: Quality::High,
    };
    let plan = compile(m.editor.state(), &settings, &CompileOptions::default()).unwrap();

    assert_eq!((plan.encoder.width, plan.encoder.height), (1920, 1080));
    assert_eq!(plan.encoder.crf, Quality::High.crf());
    assert!(plan.filter_complex().contains("color=c=black:s=1920x1080:d=2:r=30[gap1]"));
}
