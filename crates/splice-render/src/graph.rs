//! Typed filter graph with topological label checking.
//!
//! A graph is a list of chains. Each chain reads some pads, runs a sequence of
//! filters and writes some pads. Pads are either streams of an input file
//! (`[2:v]`) or named links between chains (`[v0]`). The textual
//! `-filter_complex` form is produced in one place, [`FilterGraph::render`].

use serde::Serialize;
use splice_core::Color;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

// ── Pads ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StreamKind {
    Video,
    Audio,
}

/// A connection point in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Pad {
    /// Stream of the input file at `index`.
    Stream { input: usize, kind: StreamKind },
    /// Named link produced by one chain and consumed by another.
    Link(String),
}

impl Pad {
    pub fn video(input: usize) -> Self {
        Self::Stream {
            input,
            kind: StreamKind::Video,
        }
    }

    pub fn audio(input: usize) -> Self {
        Self::Stream {
            input,
            kind: StreamKind::Audio,
        }
    }

    pub fn link(name: impl Into<String>) -> Self {
        Self::Link(name.into())
    }
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pad::Stream {
                input,
                kind: StreamKind::Video,
            } => write!(f, "[{input}:v]"),
            Pad::Stream {
                input,
                kind: StreamKind::Audio,
            } => write!(f, "[{input}:a]"),
            Pad::Link(name) => write!(f, "[{name}]"),
        }
    }
}

// ── Filters ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FadeDirection {
    In,
    Out,
}

impl FadeDirection {
    fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

/// Timestamp rewrite for `setpts`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Pts {
    /// `PTS-STARTPTS`
    Reset,
    /// `(PTS-STARTPTS)/speed`
    ResetScaled(f64),
}

/// A `drawtext` invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawText {
    /// Font file name inside the encoder's working set.
    pub font_file: String,
    /// Unescaped text; escaping happens at render time.
    pub text: String,
    pub font_size: u32,
    pub color: Color,
    pub background: Option<Color>,
    /// Horizontal center as a fraction of frame width.
    pub x: f64,
    /// Vertical position as a fraction of frame height.
    pub y: f64,
    /// Visibility window in output seconds.
    pub start: f64,
    pub end: f64,
    pub fade_in: f64,
    pub fade_out: f64,
}

impl DrawText {
    /// Opacity expression over output time `t`, or `None` when there is no fade.
    fn alpha_expr(&self) -> Option<String> {
        let rise = (self.fade_in > 0.0).then(|| {
            format!(
                "if(lt(t,{}),(t-{})/{},1)",
                num(self.start + self.fade_in),
                num(self.start),
                num(self.fade_in)
            )
        });
        let fall = (self.fade_out > 0.0).then(|| {
            format!(
                "if(gt(t,{}),({}-t)/{},1)",
                num(self.end - self.fade_out),
                num(self.end),
                num(self.fade_out)
            )
        });
        let ramp = match (rise, fall) {
            (Some(r), Some(f)) => format!("min({r},{f})"),
            (Some(r), None) => r,
            (None, Some(f)) => f,
            (None, None) => return None,
        };
        Some(format!("clip({ramp},0,1)"))
    }

    fn render(&self) -> String {
        let mut out = format!(
            "drawtext=fontfile={}:text='{}':fontsize={}:fontcolor={}:x=(w*{})-text_w/2:y=(h*{})",
            self.font_file,
            escape_drawtext(&self.text),
            self.font_size,
            self.color.to_ffmpeg(),
            num(self.x),
            num(self.y),
        );
        if let Some(bg) = self.background {
            out.push_str(&format!(":box=1:boxcolor={}:boxborderw=10", bg.to_ffmpeg()));
        }
        if let Some(alpha) = self.alpha_expr() {
            out.push_str(&format!(":alpha='{alpha}'"));
        }
        out.push_str(&format!(
            ":enable='between(t,{},{})'",
            num(self.start),
            num(self.end)
        ));
        out
    }
}

/// One filter with typed arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Filter {
    /// Repeat a single frame `frames` times.
    Loop { frames: i64 },
    Fps(u32),
    /// Cut a source window (seconds).
    Trim { start: f64, end: f64 },
    /// Keep the first `duration` seconds.
    TrimDuration(f64),
    SetPts(Pts),
    /// Fit inside `width`x`height` keeping aspect ratio.
    ScaleFit { width: u32, height: u32 },
    /// Letterbox to `width`x`height`, centered.
    PadCenter { width: u32, height: u32 },
    SetSar1,
    Fade {
        direction: FadeDirection,
        start: f64,
        duration: f64,
    },
    /// Solid color source.
    ColorSource {
        color: &'static str,
        width: u32,
        height: u32,
        duration: f64,
        rate: u32,
    },
    Concat { segments: usize },
    DrawText(Box<DrawText>),
    Null,
    ATrim { start: f64, end: f64 },
    ASetPts,
    ATempo(f64),
    AFade {
        direction: FadeDirection,
        start: f64,
        duration: f64,
    },
    Volume(f64),
    /// Delay all channels by whole milliseconds.
    ADelay { millis: u64 },
    AMix { inputs: usize },
}

impl Filter {
    /// Textual form of the filter.
    pub fn render(&self) -> String {
        match self {
            Self::Loop { frames } => format!("loop=loop={frames}:size=1:start=0"),
            Self::Fps(rate) => format!("fps={rate}"),
            Self::Trim { start, end } => format!("trim=start={}:end={}", num(*start), num(*end)),
            Self::TrimDuration(d) => format!("trim=duration={}", num(*d)),
            Self::SetPts(Pts::Reset) => "setpts=PTS-STARTPTS".to_string(),
            Self::SetPts(Pts::ResetScaled(speed)) => format!("setpts=(PTS-STARTPTS)/{}", num(*speed)),
            Self::ScaleFit { width, height } => {
                format!("scale={width}:{height}:force_original_aspect_ratio=decrease")
            }
            Self::PadCenter { width, height } => format!("pad={width}:{height}:(ow-iw)/2:(oh-ih)/2"),
            Self::SetSar1 => "setsar=1".to_string(),
            Self::Fade {
                direction,
                start,
                duration,
            } => format!(
                "fade=t={}:st={}:d={}",
                direction.as_str(),
                num(*start),
                num(*duration)
            ),
            Self::ColorSource {
                color,
                width,
                height,
                duration,
                rate,
            } => format!("color=c={color}:s={width}x{height}:d={}:r={rate}", num(*duration)),
            Self::Concat { segments } => format!("concat=n={segments}:v=1:a=0"),
            Self::DrawText(dt) => dt.render(),
            Self::Null => "null".to_string(),
            Self::ATrim { start, end } => format!("atrim=start={}:end={}", num(*start), num(*end)),
            Self::ASetPts => "asetpts=PTS-STARTPTS".to_string(),
            Self::ATempo(rate) => format!("atempo={}", num(*rate)),
            Self::AFade {
                direction,
                start,
                duration,
            } => format!(
                "afade=t={}:st={}:d={}",
                direction.as_str(),
                num(*start),
                num(*duration)
            ),
            Self::Volume(v) => format!("volume={}", num(*v)),
            Self::ADelay { millis } => format!("adelay={millis}:all=1"),
            Self::AMix { inputs } => format!("amix=inputs={inputs}:normalize=0"),
        }
    }

    /// Number of pads the filter consumes. Sources consume none.
    pub fn input_arity(&self) -> usize {
        match self {
            Self::ColorSource { .. } => 0,
            Self::Concat { segments } => *segments,
            Self::AMix { inputs } => *inputs,
            _ => 1,
        }
    }
}

/// Escape text for a single-quoted `drawtext` value.
pub fn escape_drawtext(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            ':' => out.push_str("\\:"),
            '%' => out.push_str("\\%"),
            other => out.push(other),
        }
    }
    out
}

/// Format a number for filter arguments: at most six decimals, no trailing zeros.
pub fn num(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let s = format!("{value:.6}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" || s.is_empty() {
        "0".to_string()
    } else {
        s.to_string()
    }
}

// ── Chains & graph ──────────────────────────────────────────────

/// A linear run of filters between input and output pads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterChain {
    pub inputs: Vec<Pad>,
    pub filters: Vec<Filter>,
    pub outputs: Vec<Pad>,
}

impl FilterChain {
    pub fn new(inputs: Vec<Pad>) -> Self {
        Self {
            inputs,
            filters: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Chain that starts from a single pad.
    pub fn from(input: Pad) -> Self {
        Self::new(vec![input])
    }

    /// Chain that starts from a source filter.
    pub fn source(filter: Filter) -> Self {
        Self {
            inputs: Vec::new(),
            filters: vec![filter],
            outputs: Vec::new(),
        }
    }

    pub fn then(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn then_if(self, condition: bool, filter: impl FnOnce() -> Filter) -> Self {
        if condition {
            self.then(filter())
        } else {
            self
        }
    }

    pub fn to(mut self, output: Pad) -> Self {
        self.outputs.push(output);
        self
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for pad in &self.inputs {
            out.push_str(&pad.to_string());
        }
        let body: Vec<String> = self.filters.iter().map(Filter::render).collect();
        out.push_str(&body.join(","));
        for pad in &self.outputs {
            out.push_str(&pad.to_string());
        }
        out
    }
}

/// Why a graph's pad wiring is inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("chain {chain} has no filters")]
    EmptyChain { chain: usize },

    #[error("chain {chain} reads {expected} pads but is given {actual}")]
    Arity {
        chain: usize,
        expected: usize,
        actual: usize,
    },

    #[error("pad {pad} is produced more than once")]
    DuplicateProducer { pad: String },

    #[error("pad {pad} is consumed more than once")]
    DuplicateConsumer { pad: String },

    #[error("pad {pad} is consumed but never produced")]
    Unproduced { pad: String },

    #[error("pad {pad} is consumed before it is produced")]
    OutOfOrder { pad: String },

    #[error("pad {pad} refers to input {input} but only {available} inputs exist")]
    UnknownInput {
        pad: String,
        input: usize,
        available: usize,
    },

    #[error("pad {pad} is produced but never consumed or mapped")]
    Dangling { pad: String },

    #[error("filter graph contains a cycle")]
    Cycle,
}

/// The complete filter graph for one export.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterGraph {
    chains: Vec<FilterChain>,
}

impl FilterGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chain.
    pub fn push(&mut self, chain: FilterChain) {
        self.chains.push(chain);
    }

    pub fn chains(&self) -> &[FilterChain] {
        &self.chains
    }

    /// Number of chains.
    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    /// Topological order of chains (Kahn's algorithm over link pads).
    /// Returns None if there's a cycle.
    pub fn topological_sort(&self) -> Option<Vec<usize>> {
        let mut producer: HashMap<&str, usize> = HashMap::new();
        for (i, chain) in self.chains.iter().enumerate() {
            for pad in &chain.outputs {
                if let Pad::Link(name) = pad {
                    producer.insert(name.as_str(), i);
                }
            }
        }

        let mut in_degree = vec![0usize; self.chains.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.chains.len()];
        for (i, chain) in self.chains.iter().enumerate() {
            for pad in &chain.inputs {
                if let Pad::Link(name) = pad {
                    if let Some(&p) = producer.get(name.as_str()) {
                        in_degree[i] += 1;
                        dependents[p].push(i);
                    }
                }
            }
        }

        // Lowest index first keeps the order deterministic
        let mut ready: Vec<usize> = (0..self.chains.len()).filter(|&i| in_degree[i] == 0).rev().collect();
        let mut order = Vec::with_capacity(self.chains.len());

        while let Some(i) = ready.pop() {
            order.push(i);
            for &dep in &dependents[i] {
                in_degree[dep] -= 1;
                if in_degree[dep] == 0 {
                    ready.push(dep);
                    ready.sort_unstable_by(|a, b| b.cmp(a));
                }
            }
        }

        (order.len() == self.chains.len()).then_some(order)
    }

    /// Check pad wiring against `input_count` source files and the pads
    /// mapped to the output file.
    pub fn validate(&self, input_count: usize, mapped: &[&Pad]) -> Result<(), GraphError> {
        let mut produced_at: HashMap<&str, usize> = HashMap::new();
        for (i, chain) in self.chains.iter().enumerate() {
            if chain.filters.is_empty() {
                return Err(GraphError::EmptyChain { chain: i });
            }
            let expected = chain.filters[0].input_arity();
            if expected != chain.inputs.len() {
                return Err(GraphError::Arity {
                    chain: i,
                    expected,
                    actual: chain.inputs.len(),
                });
            }
            for pad in &chain.outputs {
                if let Pad::Link(name) = pad {
                    if produced_at.insert(name.as_str(), i).is_some() {
                        return Err(GraphError::DuplicateProducer { pad: pad.to_string() });
                    }
                }
            }
        }

        if self.topological_sort().is_none() {
            return Err(GraphError::Cycle);
        }

        let mut consumed: HashMap<String, usize> = HashMap::new();
        for (i, chain) in self.chains.iter().enumerate() {
            for pad in &chain.inputs {
                match pad {
                    Pad::Stream { input, .. } => {
                        if *input >= input_count {
                            return Err(GraphError::UnknownInput {
                                pad: pad.to_string(),
                                input: *input,
                                available: input_count,
                            });
                        }
                    }
                    Pad::Link(name) => match produced_at.get(name.as_str()) {
                        None => return Err(GraphError::Unproduced { pad: pad.to_string() }),
                        Some(&p) if p >= i => {
                            return Err(GraphError::OutOfOrder { pad: pad.to_string() })
                        }
                        Some(_) => {}
                    },
                }
                if consumed.insert(pad.to_string(), i).is_some() {
                    return Err(GraphError::DuplicateConsumer { pad: pad.to_string() });
                }
            }
        }

        for pad in mapped {
            let key = pad.to_string();
            if let Pad::Link(name) = pad {
                if !produced_at.contains_key(name.as_str()) {
                    return Err(GraphError::Unproduced { pad: key });
                }
            }
            if consumed.insert(key.clone(), usize::MAX).is_some() {
                return Err(GraphError::DuplicateConsumer { pad: key });
            }
        }

        for name in produced_at.keys() {
            let key = format!("[{name}]");
            if !consumed.contains_key(&key) {
                return Err(GraphError::Dangling { pad: key });
            }
        }

        Ok(())
    }

    /// Serialize to the `-filter_complex` argument.
    pub fn render(&self) -> String {
        let parts: Vec<String> = self.chains.iter().map(FilterChain::render).collect();
        parts.join(";")
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
