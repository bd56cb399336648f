//! FFmpeg filter string builders.

/// Scale an image to fit `width`x`height`, keep aspect, letterbox on black.
///
/// The result has square pixels, the given frame rate and `yuv420p` so every
/// slide can be concatenated without renegotiating formats.
pub fn fit_and_pad(width: u32, height: u32, fps: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,\
         setsar=1,fps={fps},format=yuv420p",
        w = width,
        h = height,
        fps = fps
    )
}

/// Keep exactly `frames` frames of a looped still and restart timestamps.
pub fn hold_frames(frames: u64) -> String {
    format!("trim=end_frame={},setpts=PTS-STARTPTS", frames)
}

/// Fade a held slide from and to black over `fade` frames.
///
/// Frame-indexed so the slide keeps its exact length. Returns `None` when
/// there is nothing to fade.
pub fn slide_fades(frames: u64, fade: u64, fade_in: bool, fade_out: bool) -> Option<String> {
    let fade = fade.min(frames / 2);
    if fade == 0 || !(fade_in || fade_out) {
        return None;
    }
    let mut parts = Vec::with_capacity(2);
    if fade_in {
        parts.push(format!("fade=t=in:s=0:n={}", fade));
    }
    if fade_out {
        parts.push(format!("fade=t=out:s={}:n={}", frames - fade, fade));
    }
    Some(parts.join(","))
}

/// Pad audio with silence and cut it at `duration` seconds.
pub fn pad_and_trim_audio(duration: f64) -> String {
    format!("apad,atrim=end={:.6},asetpts=PTS-STARTPTS", duration)
}

/// Burn an SRT file into the frame.
pub fn burn_subtitles(srt_file: &str, force_style: &str) -> String {
    format!(
        "subtitles=filename={}:force_style='{}'",
        escape_filter_value(srt_file),
        force_style
    )
}

/// Escape a value embedded in a filtergraph option.
///
/// Backslashes become forward slashes (ffmpeg accepts them on every
/// platform), then the characters the option and graph parsers treat
/// specially are backslash-escaped.
pub fn escape_filter_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push('/'),
            ':' | '\'' | ',' | ';' | '[' | ']' | '=' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
