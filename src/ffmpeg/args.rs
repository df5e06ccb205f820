//! ffmpeg argument construction for a stream
//!
//! Pure: the same stream always yields the same argument vector.

use crate::stream::Stream;

/// Encoder used when a video channel is selected
pub const VIDEO_CODEC: &str = "libx264";

/// Encoder used when an audio channel is selected
pub const AUDIO_CODEC: &str = "aac";

/// Build the ffmpeg argument vector for `stream`.
///
/// Order: behavior flags, seek/input binding, channel mapping, subtitle
/// burn-in, output binding. The seek offset is given both before and after
/// `-i` so containers with coarse seeking still start at the right frame.
pub fn build_args(stream: &Stream) -> Vec<String> {
    let entry = stream.entry();
    let mut args: Vec<String> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-copyts",
        "-start_at_zero",
        "-preset",
        "ultrafast",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.push("-readrate".into());
    args.push(read_rate(entry.read_rate));

    if !entry.start_position.is_zero() {
        let start = entry.start_position.as_secs_f64().to_string();
        args.extend([
            "-ss".into(),
            start.clone(),
            "-i".into(),
            entry.source.clone(),
            "-ss".into(),
            start,
        ]);
    } else {
        args.extend(["-i".into(), entry.source.clone()]);
    }

    if let Some(video) = entry.video {
        args.extend([
            "-c:v".into(),
            VIDEO_CODEC.into(),
            "-map".into(),
            format!("0:v:{}", video),
        ]);
    }
    if let Some(audio) = entry.audio {
        args.extend([
            "-c:a".into(),
            AUDIO_CODEC.into(),
            "-map".into(),
            format!("0:a:{}", audio),
        ]);
    }
    if let Some(subtitle) = entry.subtitle {
        args.extend([
            "-vf".into(),
            format!(
                "subtitles={}:stream_index={}",
                escape_filtergraph(&escape_filter_option(&entry.source)),
                subtitle
            ),
        ]);
    }

    args.extend([
        "-f".into(),
        "rtsp".into(),
        "-rtsp_transport".into(),
        "tcp".into(),
        "-auth_type".into(),
        "digest".into(),
        output_url(stream.target(), &entry.name),
    ]);
    args
}

/// `-readrate` value: percentage of real time, clamped to at least 1x
fn read_rate(percent: Option<u32>) -> String {
    let rate = percent.map_or(1.0, |p| p as f64 / 100.0).max(1.0);
    rate.to_string()
}

/// Target base with exactly one trailing separator, followed by the name
pub fn output_url(target: &str, name: &str) -> String {
    format!("{}/{}", target.trim_end_matches('/'), name)
}

/// First escaping level: a value inside a filter's option list
fn escape_filter_option(value: &str) -> String {
    escape_chars(value, &['\\', '\'', ':'])
}

/// Second escaping level: a filter description inside a filtergraph
fn escape_filtergraph(value: &str) -> String {
    escape_chars(value, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamEntry;
    use std::time::Duration;

    fn stream(entry: StreamEntry) -> Stream {
        Stream::new(entry, "rtsp://localhost").unwrap()
    }

    fn strs(args: &[String]) -> Vec<&str> {
        args.iter().map(|s| s.as_str()).collect()
    }

    #[test]
    fn test_minimal_stream() {
        let args = build_args(&stream(StreamEntry::new("news", "/media/news.mkv")));
        assert_eq!(
            strs(&args),
            vec![
                "-hide_banner",
                "-loglevel",
                "error",
                "-copyts",
                "-start_at_zero",
                "-preset",
                "ultrafast",
                "-readrate",
                "1",
                "-i",
                "/media/news.mkv",
                "-f",
                "rtsp",
                "-rtsp_transport",
                "tcp",
                "-auth_type",
                "digest",
                "rtsp://localhost/news",
            ]
        );
    }

    #[test]
    fn test_seek_before_and_after_input() {
        let mut entry = StreamEntry::new("movie", "/media/movie.mp4");
        entry.start_position = Duration::from_millis(90_500);
        let args = build_args(&stream(entry));
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(strs(&args[i - 2..i + 4]), vec!["-ss", "90.5", "-i", "/media/movie.mp4", "-ss", "90.5"]);
    }

    #[test]
    fn test_whole_second_seek() {
        let mut entry = StreamEntry::new("movie", "/media/movie.mp4");
        entry.start_position = Duration::from_secs(600);
        let args = build_args(&stream(entry));
        assert!(strs(&args).windows(2).any(|w| w == ["-ss", "600"]));
    }

    #[test]
    fn test_selected_channels() {
        let mut entry = StreamEntry::new("movie", "/media/movie.mkv");
        entry.video = Some(0);
        entry.audio = Some(2);
        let args = build_args(&stream(entry));
        let joined = args.join(" ");
        assert!(joined.contains("-c:v libx264 -map 0:v:0 -c:a aac -map 0:a:2"));
        assert!(!args.contains(&"-vf".to_string()));
    }

    #[test]
    fn test_unset_channels_are_omitted() {
        let args = build_args(&stream(StreamEntry::new("movie", "/media/movie.mkv")));
        for flag in ["-map", "-c:v", "-c:a", "-vf"] {
            assert!(!args.contains(&flag.to_string()), "{} emitted", flag);
        }
    }

    #[test]
    fn test_subtitle_burn_in() {
        let mut entry = StreamEntry::new("movie", "/media/movie.mkv");
        entry.subtitle = Some(1);
        let args = build_args(&stream(entry));
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf + 1], "subtitles=/media/movie.mkv:stream_index=1");
    }

    #[test]
    fn test_subtitle_path_escaping() {
        let mut entry = StreamEntry::new("movie", "/media/Movie: Part [1], 'cut'.mkv");
        entry.subtitle = Some(0);
        let args = build_args(&stream(entry));
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(
            args[vf + 1],
            r"subtitles=/media/Movie\\: Part \[1\]\, \\\'cut\\\'.mkv:stream_index=0"
        );
    }

    #[test]
    fn test_read_rate() {
        assert_eq!(read_rate(None), "1");
        assert_eq!(read_rate(Some(50)), "1");
        assert_eq!(read_rate(Some(150)), "1.5");
        assert_eq!(read_rate(Some(200)), "2");
    }

    #[test]
    fn test_output_url_normalization() {
        assert_eq!(output_url("rtsp://host:8554", "cam"), "rtsp://host:8554/cam");
        assert_eq!(output_url("rtsp://host:8554/", "cam"), "rtsp://host:8554/cam");
        assert_eq!(output_url("rtsp://host:8554/live//", "cam"), "rtsp://host:8554/live/cam");
    }

    #[test]
    fn test_pure() {
        let mut entry = StreamEntry::new("movie", "/media/movie.mkv");
        entry.subtitle = Some(3);
        let s = stream(entry);
        assert_eq!(build_args(&s), build_args(&s));
    }
}
