//! Translate a timeline document into one external encoder invocation.

use crate::encode::process::run_captured;
use crate::foundation::config::EncoderSettings;
use crate::foundation::core::secs_to_millis_rounded;
use crate::encode::process::ensure_parent_dir;
use crate::foundation::error::{SyncError, SyncResult};
use crate::timecode::document::write_cues;
use crate::timeline::model::SubtitleItem;
use crate::timeline::store::TimelineDocument;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

/// A fully described `ffmpeg` invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct EncoderCommand {
    /// Program to run.
    pub program: String,
    /// Input files in `-i` order (videos first, then audio).
    pub inputs: Vec<PathBuf>,
    /// Filter graph statements, joined with `; `.
    pub filter_graph: Vec<String>,
    /// Output pads passed to `-map`.
    pub maps: Vec<String>,
    /// Codec and quality arguments.
    pub codec_args: Vec<String>,
    /// Output file.
    pub output: PathBuf,
    /// Caption file generated from the document's subtitle track and burnt in.
    pub caption_sidecar: Option<CaptionSidecar>,
}

/// Subtitle track that must be written to disk before the encoder runs.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptionSidecar {
    /// Where the `subtitles` filter reads the captions from.
    pub path: PathBuf,
    /// Cues to write.
    pub cues: Vec<SubtitleItem>,
}

impl CaptionSidecar {
    /// Write the cues as SRT or VTT (by extension).
    pub fn write(&self) -> SyncResult<()> {
        ensure_parent_dir(&self.path)?;
        write_cues(&self.path, &self.cues)?;
        tracing::debug!(path = %self.path.display(), cues = self.cues.len(), "wrote caption sidecar");
        Ok(())
    }
}

impl EncoderCommand {
    /// The `-filter_complex` argument, if any statements were produced.
    pub fn filter_complex(&self) -> Option<String> {
        (!self.filter_graph.is_empty()).then(|| self.filter_graph.join("; "))
    }

    /// Arguments after the program name.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["-y".to_owned()];
        for input in &self.inputs {
            args.push("-i".to_owned());
            args.push(input.to_string_lossy().into_owned());
        }
        if let Some(graph) = self.filter_complex() {
            args.push("-filter_complex".to_owned());
            args.push(graph);
        }
        for pad in &self.maps {
            args.push("-map".to_owned());
            args.push(pad.clone());
        }
        args.extend(self.codec_args.iter().cloned());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }

    /// Write the generated caption file, if the plan has one.
    pub fn write_sidecar(&self) -> SyncResult<()> {
        match &self.caption_sidecar {
            Some(sidecar) => sidecar.write(),
            None => Ok(()),
        }
    }

    /// Run the command synchronously, writing the caption sidecar first.
    #[tracing::instrument(skip(self), fields(output = %self.output.display()))]
    pub fn run(&self) -> SyncResult<()> {
        if self.inputs.is_empty() {
            return Err(SyncError::validation(
                "encoder plan has no inputs (timeline has no audio or video items)",
            ));
        }
        self.write_sidecar()?;
        let mut cmd = Command::new(&self.program);
        cmd.args(self.to_args());
        run_captured(&mut cmd)?;
        tracing::info!("encoder plan finished");
        Ok(())
    }
}

fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=+,@%".contains(c));
    if safe {
        arg.to_owned()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

impl std::fmt::Display for EncoderCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut line = shell_quote(&self.program);
        for arg in self.to_args() {
            let _ = write!(line, " {}", shell_quote(&arg));
        }
        f.write_str(&line)
    }
}

fn escape_with(s: &str, specials: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if specials.contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a path for use as a filter option value inside `-filter_complex`.
///
/// Two levels apply: the option parser (`\ ' :`) and then the graph parser (`\ ' [ ] , ;`).
pub fn escape_filter_path(path: &Path) -> String {
    let option_level = escape_with(&path.to_string_lossy(), "\\':");
    escape_with(&option_level, "\\'[],;")
}

/// Build the encoder invocation for `doc`.
///
/// Each video is shifted to its start with `setpts`; videos are stacked by a chain of `overlay`
/// filters. Each audio item is delayed with `adelay` and mixed with `amix`. Subtitles are burnt
/// into the video: from `captions` when given, otherwise from a sidecar next to `output`
/// (`<stem>.srt`) that [`EncoderCommand::run`] writes from the document. Input files are not
/// checked for existence.
pub fn build_encoder_plan(
    doc: &TimelineDocument,
    output: &Path,
    captions: Option<&Path>,
    settings: &EncoderSettings,
) -> EncoderCommand {
    let mut inputs = Vec::new();
    let mut graph = Vec::new();
    let mut maps = Vec::new();
    let mut codec_args = Vec::new();

    let videos = doc.video().as_slice();
    let audios = doc.audio().as_slice();

    for (k, v) in videos.iter().enumerate() {
        inputs.push(v.file.clone());
        graph.push(format!(
            "[{k}:v]setpts=PTS-STARTPTS+{}/TB[v{k}]",
            v.span.start_time()
        ));
    }
    for (k, a) in audios.iter().enumerate() {
        inputs.push(a.file.clone());
        let ms = secs_to_millis_rounded(a.span.start_time());
        graph.push(format!("[{}:a]adelay={ms}|{ms}[a{k}]", videos.len() + k));
    }

    let mut caption_sidecar = None;
    let burn_in: Option<PathBuf> = if doc.subtitles().is_empty() {
        if let Some(path) = captions {
            tracing::debug!(path = %path.display(), "no subtitles to burn in");
        }
        None
    } else if videos.is_empty() {
        if let Some(path) = captions {
            tracing::warn!(path = %path.display(), "ignoring captions: timeline has no video input");
        }
        None
    } else {
        match captions {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let sidecar = CaptionSidecar {
                    path: output.with_extension("srt"),
                    cues: doc.subtitles().as_slice().to_vec(),
                };
                let path = sidecar.path.clone();
                caption_sidecar = Some(sidecar);
                Some(path)
            }
        }
    };

    if !videos.is_empty() {
        let n = videos.len();
        let mut last = "v0".to_owned();
        for k in 1..n {
            let label = if k == n - 1 && burn_in.is_none() {
                "outv".to_owned()
            } else {
                format!("ov{k}")
            };
            graph.push(format!("[{last}][v{k}]overlay=shortest=1[{label}]"));
            last = label;
        }
        match &burn_in {
            Some(path) => graph.push(format!(
                "[{last}]subtitles={}[outv]",
                escape_filter_path(path)
            )),
            None if n == 1 => graph.push("[v0]copy[outv]".to_owned()),
            None => {}
        }
        maps.push("[outv]".to_owned());
        codec_args.extend([
            "-c:v".to_owned(),
            "libx264".to_owned(),
            "-preset".to_owned(),
            settings.preset.clone(),
            "-crf".to_owned(),
            settings.crf.to_string(),
        ]);
    }

    if !audios.is_empty() {
        if audios.len() == 1 {
            graph.push("[a0]acopy[outa]".to_owned());
        } else {
            let pads: String = (0..audios.len()).map(|k| format!("[a{k}]")).collect();
            graph.push(format!("{pads}amix=inputs={}[outa]", audios.len()));
        }
        maps.push("[outa]".to_owned());
        codec_args.extend([
            "-c:a".to_owned(),
            settings.audio_codec.clone(),
            "-b:a".to_owned(),
            settings.audio_bitrate.clone(),
        ]);
    }
    codec_args.push("-shortest".to_owned());

    EncoderCommand {
        program: "ffmpeg".to_owned(),
        inputs,
        filter_graph: graph,
        maps,
        codec_args,
        output: output.to_path_buf(),
        caption_sidecar,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/plan.rs"]
mod tests;
