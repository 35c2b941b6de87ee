//! External programs behind the media collaborators.
//!
//! Every program is described by a [`CommandTemplate`]: arguments spelled
//! exactly `src`, `dst` or `key` are replaced per call.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use tracing::debug;
use walkdir::WalkDir;

use super::audio::{AudioExtractionPipeline, AudioOptions};
use super::records::{
    AudioArchive, AudioCodec, AudioFormat, DecodedAudio, VideoArchive, VideoCodec,
};
use super::video::{VideoExtractionPipeline, VideoOptions};
use crate::updater::errors::{ExtractionError, ToolError};

pub const SRC_PLACEHOLDER: &str = "src";
pub const DST_PLACEHOLDER: &str = "dst";
pub const KEY_PLACEHOLDER: &str = "key";

/// A program and its argument template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandTemplate {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Arguments with every placeholder replaced. Unknown placeholders stay as written.
    pub fn render(&self, substitutions: &[(&str, &str)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                substitutions
                    .iter()
                    .find(|(name, _)| *name == arg.as_str())
                    .map(|(_, value)| value.to_string())
                    .unwrap_or_else(|| arg.clone())
            })
            .collect()
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// Run to completion on the current thread.
    pub fn run_blocking(&self, substitutions: &[(&str, &str)]) -> Result<(), ToolError> {
        let status = std::process::Command::new(&self.program)
            .args(self.render(substitutions))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| ToolError::Spawn {
                program: self.program_name(),
                source,
            })?;
        check_status(self.program_name(), status)
    }

    pub async fn run(&self, substitutions: &[(&str, &str)]) -> Result<(), ToolError> {
        let status = tokio::process::Command::new(&self.program)
            .args(self.render(substitutions))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|source| ToolError::Spawn {
                program: self.program_name(),
                source,
            })?;
        check_status(self.program_name(), status)
    }
}

fn check_status(program: String, status: ExitStatus) -> Result<(), ToolError> {
    if status.success() {
        Ok(())
    } else {
        Err(ToolError::Failed { program, status })
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// `ffmpeg -i <src> <codec args> -y <dst>`
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    path: PathBuf,
}

impl Ffmpeg {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn convert(&self, input: &Path, output: &Path, codec_args: &[&str]) -> Result<(), ToolError> {
        let mut args = vec!["-i".to_string(), SRC_PLACEHOLDER.to_string()];
        args.extend(codec_args.iter().map(|arg| arg.to_string()));
        args.push("-y".to_string());
        args.push(DST_PLACEHOLDER.to_string());

        let input = path_arg(input);
        let output = path_arg(output);
        CommandTemplate::new(&self.path, args).run_blocking(&[
            (SRC_PLACEHOLDER, input.as_str()),
            (DST_PLACEHOLDER, output.as_str()),
        ])
    }
}

fn audio_codec_args(format: AudioFormat) -> &'static [&'static str] {
    match format {
        AudioFormat::Mp3 => &["-b:a", "320k"],
        AudioFormat::Flac => &["-compression_level", "12"],
    }
}

impl VideoCodec for Ffmpeg {
    fn to_mp4(&self, source: &Path, target: &Path) -> Result<(), ExtractionError> {
        Ok(self.convert(source, target, &["-c:v", "libx264"])?)
    }
}

/// Splits a container with a program that writes its streams into the `dst` directory.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    command: CommandTemplate,
    container_extension: &'static str,
}

impl CommandExtractor {
    pub fn new(command: CommandTemplate, container_extension: &'static str) -> Self {
        Self {
            command,
            container_extension,
        }
    }

    fn extract_into(&self, data: &[u8], dir: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
        let work = tempfile::Builder::new().prefix("extract-").tempdir_in(dir)?;
        let container = work
            .path()
            .join(format!("container.{}", self.container_extension));
        std::fs::write(&container, data)?;
        let out = work.path().join("out");
        std::fs::create_dir_all(&out)?;

        let container_arg = path_arg(&container);
        let out_arg = path_arg(&out);
        self.command.run_blocking(&[
            (SRC_PLACEHOLDER, container_arg.as_str()),
            (DST_PLACEHOLDER, out_arg.as_str()),
        ])?;

        let found: Vec<PathBuf> = WalkDir::new(&out)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect();

        let mut streams = Vec::with_capacity(found.len());
        for path in found {
            if let Some(name) = path.file_name() {
                let target = dir.join(name);
                std::fs::rename(&path, &target)?;
                streams.push(target);
            }
        }
        streams.sort();
        debug!(
            "{} produced {} streams",
            self.command.program_name(),
            streams.len()
        );
        Ok(streams)
    }
}

impl AudioArchive for CommandExtractor {
    fn extract_streams(&self, data: &[u8], dir: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
        self.extract_into(data, dir)
    }
}

impl VideoArchive for CommandExtractor {
    fn extract_streams(&self, data: &[u8], dir: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
        self.extract_into(data, dir)
    }
}

/// Decodes streams with a `src dst key` program; transcodes with ffmpeg.
#[derive(Debug, Clone)]
pub struct CommandAudioCodec {
    decoder: CommandTemplate,
    ffmpeg: Option<Ffmpeg>,
}

impl CommandAudioCodec {
    pub fn new(decoder: CommandTemplate, ffmpeg: Option<Ffmpeg>) -> Self {
        Self { decoder, ffmpeg }
    }
}

impl AudioCodec for CommandAudioCodec {
    fn decode(&self, data: &[u8], key: u64) -> Result<DecodedAudio, ExtractionError> {
        let work = tempfile::tempdir()?;
        let input = work.path().join("stream.hca");
        let output = work.path().join("stream.wav");
        std::fs::write(&input, data)?;

        let input_arg = path_arg(&input);
        let output_arg = path_arg(&output);
        let key_arg = key.to_string();
        self.decoder.run_blocking(&[
            (SRC_PLACEHOLDER, input_arg.as_str()),
            (DST_PLACEHOLDER, output_arg.as_str()),
            (KEY_PLACEHOLDER, key_arg.as_str()),
        ])?;

        Ok(DecodedAudio {
            wav: std::fs::read(&output)?,
        })
    }

    fn transcode(
        &self,
        audio: &DecodedAudio,
        format: AudioFormat,
    ) -> Result<Vec<u8>, ExtractionError> {
        let ffmpeg = self
            .ffmpeg
            .as_ref()
            .ok_or_else(|| ExtractionError::Audio("ffmpeg is not configured".to_string()))?;

        let work = tempfile::tempdir()?;
        let input = work.path().join("decoded.wav");
        let output = work.path().join(format!("encoded.{}", format.extension()));
        std::fs::write(&input, &audio.wav)?;
        ffmpeg.convert(&input, &output, audio_codec_args(format))?;
        Ok(std::fs::read(&output)?)
    }
}

/// Program locations from the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolSettings {
    pub ffmpeg_path: Option<PathBuf>,
    pub acb_extractor: Option<CommandTemplate>,
    pub hca_decoder: Option<CommandTemplate>,
    pub usm_extractor: Option<CommandTemplate>,
}

/// Media collaborators available to every region's extraction.
#[derive(Clone, Default)]
pub struct MediaTools {
    pub audio_archive: Option<Arc<dyn AudioArchive>>,
    pub audio_codec: Option<Arc<dyn AudioCodec>>,
    pub video_archive: Option<Arc<dyn VideoArchive>>,
    pub video_codec: Option<Arc<dyn VideoCodec>>,
}

impl MediaTools {
    pub fn from_settings(settings: &ToolSettings) -> Self {
        let ffmpeg = settings.ffmpeg_path.clone().map(Ffmpeg::new);
        Self {
            audio_archive: settings.acb_extractor.clone().map(|command| {
                Arc::new(CommandExtractor::new(command, "acb")) as Arc<dyn AudioArchive>
            }),
            audio_codec: settings.hca_decoder.clone().map(|command| {
                Arc::new(CommandAudioCodec::new(command, ffmpeg.clone())) as Arc<dyn AudioCodec>
            }),
            video_archive: settings.usm_extractor.clone().map(|command| {
                Arc::new(CommandExtractor::new(command, "usm")) as Arc<dyn VideoArchive>
            }),
            video_codec: ffmpeg.map(|ffmpeg| Arc::new(ffmpeg) as Arc<dyn VideoCodec>),
        }
    }

    /// `None` when no audio container splitter is available.
    pub fn audio_pipeline(&self, options: &AudioOptions) -> Option<AudioExtractionPipeline> {
        let archive = self.audio_archive.clone()?;
        let pipeline = match (&self.audio_codec, options.decode_streams) {
            (Some(codec), true) => AudioExtractionPipeline::new(archive, codec.clone()),
            _ => AudioExtractionPipeline::without_decoding(archive),
        };
        Some(pipeline.with_options(*options))
    }

    /// `None` when no movie demuxer is available.
    pub fn video_pipeline(&self, options: &VideoOptions) -> Option<VideoExtractionPipeline> {
        let archive = self.video_archive.clone()?;
        let codec = if options.convert_to_mp4 {
            self.video_codec.clone()
        } else {
            None
        };
        Some(VideoExtractionPipeline::new(archive, codec).with_keep_m2v(options.keep_m2v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn shell(script: &str) -> CommandTemplate {
        CommandTemplate::new(
            "sh",
            vec![
                "-c".to_string(),
                script.to_string(),
                "sh".to_string(),
                SRC_PLACEHOLDER.to_string(),
                DST_PLACEHOLDER.to_string(),
                KEY_PLACEHOLDER.to_string(),
            ],
        )
    }

    #[test]
    fn test_render_replaces_whole_arguments_only() {
        let command = CommandTemplate::new(
            "rclone",
            vec![
                "copyto".to_string(),
                "src".to_string(),
                "dst".to_string(),
                "--src-flag".to_string(),
            ],
        );

        assert_eq!(
            command.render(&[("src", "/local/a.png"), ("dst", "remote:a.png")]),
            vec!["copyto", "/local/a.png", "remote:a.png", "--src-flag"]
        );
    }

    #[test]
    fn test_run_blocking_reports_exit_status() {
        assert!(shell("exit 0").run_blocking(&[]).is_ok());
        assert!(matches!(
            shell("exit 3").run_blocking(&[]),
            Err(ToolError::Failed { .. })
        ));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let command = CommandTemplate::new("/nonexistent/tool", Vec::new());
        assert!(matches!(
            command.run_blocking(&[]),
            Err(ToolError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn test_async_run_substitutes_placeholders() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("in.txt");
        let target = temp_dir.path().join("out.txt");
        std::fs::write(&source, b"payload").unwrap();

        shell(r#"cp "$1" "$2""#)
            .run(&[
                (SRC_PLACEHOLDER, source.to_str().unwrap()),
                (DST_PLACEHOLDER, target.to_str().unwrap()),
            ])
            .await
            .unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"payload");
    }

    #[test]
    fn test_command_extractor_moves_nested_streams_into_dir() {
        let temp_dir = TempDir::new().unwrap();
        let extractor = CommandExtractor::new(
            shell(r#"mkdir -p "$2/nested" && cp "$1" "$2/a.hca" && cp "$1" "$2/nested/b.hca""#),
            "acb",
        );

        let streams =
            AudioArchive::extract_streams(&extractor, b"acb-bytes", temp_dir.path()).unwrap();

        assert_eq!(
            streams,
            vec![temp_dir.path().join("a.hca"), temp_dir.path().join("b.hca")]
        );
        assert_eq!(std::fs::read(temp_dir.path().join("b.hca")).unwrap(), b"acb-bytes");
        // Only the streams remain next to the container
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_command_codec_passes_key() {
        let codec = CommandAudioCodec::new(shell(r#"printf "%s" "$3" > "$2""#), None);

        let decoded = codec.decode(b"hca", 88888888).unwrap();
        assert_eq!(decoded.wav, b"88888888");
    }

    #[test]
    fn test_transcode_without_ffmpeg_is_an_error() {
        let codec = CommandAudioCodec::new(shell("true"), None);
        let result = codec.transcode(&DecodedAudio { wav: Vec::new() }, AudioFormat::Mp3);
        assert!(matches!(result, Err(ExtractionError::Audio(_))));
    }

    #[test]
    fn test_pipelines_need_a_splitter() {
        let tools = MediaTools::default();
        assert!(tools.audio_pipeline(&AudioOptions::default()).is_none());
        assert!(tools.video_pipeline(&VideoOptions::default()).is_none());

        let tools = MediaTools::from_settings(&ToolSettings {
            acb_extractor: Some(shell("true")),
            usm_extractor: Some(shell("true")),
            ..Default::default()
        });
        assert!(tools.audio_pipeline(&AudioOptions::default()).is_some());
        assert!(tools.video_pipeline(&VideoOptions::default()).is_some());
        assert!(tools.audio_codec.is_none());
        assert!(tools.video_codec.is_none());
    }
}
