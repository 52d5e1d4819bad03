//! Synchronous `ffmpeg`/`ffprobe` invocations with captured output.

use crate::foundation::config::EncoderSettings;
use crate::foundation::error::{SyncError, SyncResult};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

fn tool_on_path(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    tool_on_path("ffmpeg")
}

/// Return `true` when `ffprobe` can be invoked from `PATH`.
pub fn is_ffprobe_on_path() -> bool {
    tool_on_path("ffprobe")
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> SyncResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Run `cmd` to completion, capturing stdout and stderr.
///
/// A spawn failure or non-zero exit becomes [`SyncError::EncoderProcessFailure`].
pub fn run_captured(cmd: &mut Command) -> SyncResult<Output> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    tracing::debug!(%program, args = ?cmd.get_args().collect::<Vec<_>>(), "running external tool");
    let out = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|e| SyncError::encoder(&program, None, format!("failed to start: {e}")))?;
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr).trim().to_owned();
        tracing::error!(%program, status = ?out.status.code(), %stderr, "external tool failed");
        return Err(SyncError::encoder(program, out.status.code(), stderr));
    }
    Ok(out)
}

/// `<dir>/<stem>_with_audio.<ext>` next to `video`.
pub fn muxed_path(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_owned());
    let name = match video.extension() {
        Some(ext) => format!("{stem}_with_audio.{}", ext.to_string_lossy()),
        None => format!("{stem}_with_audio"),
    };
    video.with_file_name(name)
}

/// Mux `audio` into the silent `video`, writing `out`. Video is stream-copied.
pub fn mux_audio_video(
    video: &Path,
    audio: &Path,
    out: &Path,
    settings: &EncoderSettings,
) -> SyncResult<()> {
    ensure_parent_dir(out)?;
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-y", "-v", "error", "-i"])
        .arg(video)
        .arg("-i")
        .arg(audio)
        .args([
            "-map",
            "0:v:0",
            "-map",
            "1:a:0",
            "-c:v",
            "copy",
            "-c:a",
            &settings.audio_codec,
            "-b:a",
            &settings.audio_bitrate,
            "-shortest",
        ])
        .arg(out);
    run_captured(&mut cmd)?;
    Ok(())
}

/// Mux `audio` into `video` and replace `video` with the result.
pub fn mux_in_place(video: &Path, audio: &Path, settings: &EncoderSettings) -> SyncResult<()> {
    let muxed = muxed_path(video);
    if let Err(e) = mux_audio_video(video, audio, &muxed, settings) {
        let _ = std::fs::remove_file(&muxed);
        return Err(e);
    }
    std::fs::rename(&muxed, video).map_err(|e| {
        anyhow::anyhow!(
            "failed to move '{}' over '{}': {e}",
            muxed.display(),
            video.display()
        )
    })?;
    tracing::info!(path = %video.display(), audio = %audio.display(), "muxed audio into video");
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/process.rs"]
mod tests;
