//! src/services/compression_service.rs
//!
//! CompressionEngine: runs the external per-format compressors (mozjpeg's
//! `cjpeg`, `pngquant`, `svgo`, `gifsicle`) against staged uploads. Every
//! tool writes to a hidden temporary file in the output directory, which is
//! renamed over `output_dir/{file_name}` once the result is known to be good.
//! A compression that fails or is cancelled leaves no temporary file behind.

use crate::models::{
    compression::{CompressionJob, CompressionReport},
    image::ImageFormat,
};
use async_trait::async_trait;
use std::{
    env,
    ffi::{OsStr, OsString},
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    process::Stdio,
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::{fs, process::Command};
use tracing::{debug, error, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("`{0}` is not a supported image format")]
    UnsupportedFormat(String),
    #[error("input path `{0}` has no file name")]
    InvalidInput(PathBuf),
    #[error("compressor `{0}` not found")]
    ToolNotFound(String),
    #[error("compressor `{tool}` could not be started: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },
    #[error("compressor `{tool}` exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },
    #[error("compressor `{tool}` timed out after {timeout:?}")]
    TimedOut { tool: String, timeout: Duration },
    #[error("compressor `{0}` produced no output")]
    MissingOutput(String),
    #[error("compression task ended abnormally: {0}")]
    Aborted(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type CompressionResult<T> = Result<T, CompressionError>;

/// Anything able to turn a staged upload into a compressed file.
///
/// The HTTP layer only talks to this trait so tests can swap the external
/// tools for an in-process fake.
#[async_trait]
pub trait ImageCompressor: Send + Sync {
    async fn compress(&self, job: &CompressionJob) -> CompressionResult<CompressionReport>;

    /// External programs this compressor depends on, for readiness checks.
    fn required_tools(&self) -> Vec<ToolCommand> {
        Vec::new()
    }
}

/// A program plus any leading arguments, e.g. `npx svgo`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append arguments, returning the extended command.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Locate the program on disk, searching `PATH` for bare names.
    pub fn resolve(&self) -> Option<PathBuf> {
        let program = Path::new(&self.program);
        if program.components().count() > 1 {
            return program.is_file().then(|| program.to_path_buf());
        }
        let paths = env::var_os("PATH").unwrap_or_else(OsString::new);
        env::split_paths(&paths)
            .map(|dir| dir.join(program))
            .find(|candidate| candidate.is_file())
    }
}

impl FromStr for ToolCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| "tool command must not be empty".to_string())?;
        Ok(Self::new(program).with_args(parts))
    }
}

/// mozjpeg parameters.
#[derive(Clone, Debug)]
pub struct JpegSettings {
    pub quality: u8,
}

/// pngquant parameters; the quality range is `min-max`.
#[derive(Clone, Debug)]
pub struct PngSettings {
    pub min_quality: u8,
    pub max_quality: u8,
}

/// svgo parameters.
#[derive(Clone, Debug)]
pub struct SvgSettings {
    pub multipass: bool,
}

/// gifsicle parameters.
#[derive(Clone, Debug)]
pub struct GifSettings {
    pub colors: u16,
    pub web_palette: bool,
}

/// Commands used to launch each compressor.
#[derive(Clone, Debug)]
pub struct ToolSet {
    pub jpeg: ToolCommand,
    pub png: ToolCommand,
    pub svg: ToolCommand,
    pub gif: ToolCommand,
}

impl Default for ToolSet {
    fn default() -> Self {
        Self {
            jpeg: ToolCommand::new("cjpeg"),
            png: ToolCommand::new("pngquant"),
            svg: ToolCommand::new("svgo"),
            gif: ToolCommand::new("gifsicle"),
        }
    }
}

impl ToolSet {
    /// Command configured for `format`, if any.
    pub fn for_format(&self, format: ImageFormat) -> Option<&ToolCommand> {
        match format {
            ImageFormat::Jpeg => Some(&self.jpeg),
            ImageFormat::Png => Some(&self.png),
            ImageFormat::Svg => Some(&self.svg),
            ImageFormat::Gif => Some(&self.gif),
            ImageFormat::Unsupported => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ImageFormat, &ToolCommand)> {
        [
            (ImageFormat::Jpeg, &self.jpeg),
            (ImageFormat::Png, &self.png),
            (ImageFormat::Svg, &self.svg),
            (ImageFormat::Gif, &self.gif),
        ]
        .into_iter()
    }
}

/// Immutable engine configuration, fixed at construction.
#[derive(Clone, Debug)]
pub struct CompressionSettings {
    pub jpeg: JpegSettings,
    pub png: PngSettings,
    pub svg: SvgSettings,
    pub gif: GifSettings,

    /// When false, results that are not smaller than the input are replaced
    /// by the original bytes.
    pub force: bool,

    /// Emit a statistics event for every compression.
    pub statistics: bool,

    /// Upper bound for a single tool invocation. `None` waits forever.
    pub timeout: Option<Duration>,

    pub tools: ToolSet,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            jpeg: JpegSettings { quality: 60 },
            png: PngSettings {
                min_quality: 20,
                max_quality: 50,
            },
            svg: SvgSettings { multipass: true },
            gif: GifSettings {
                colors: 64,
                web_palette: true,
            },
            force: false,
            statistics: true,
            timeout: Some(Duration::from_secs(120)),
            tools: ToolSet::default(),
        }
    }
}

/// pngquant exit codes meaning "could not do better than the input"
/// (98: result larger, 99: quality target not reachable).
const PNGQUANT_NO_IMPROVEMENT: [i32; 2] = [98, 99];

enum ToolOutcome {
    Written,
    NoImprovement,
}

/// Compression engine backed by external command-line tools.
#[derive(Clone)]
pub struct CompressionEngine {
    settings: Arc<CompressionSettings>,
}

impl CompressionEngine {
    pub fn new(settings: CompressionSettings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }

    /// Full command line compressing `input` into `output` for `format`.
    ///
    /// Returns `None` for unsupported formats.
    pub fn command_for(
        &self,
        format: ImageFormat,
        input: &Path,
        output: &Path,
    ) -> Option<ToolCommand> {
        let tool = self.settings.tools.for_format(format)?.clone();
        let input = input.to_string_lossy().into_owned();
        let output = output.to_string_lossy().into_owned();

        let command = match format {
            ImageFormat::Jpeg => tool.with_args([
                "-quality".to_string(),
                self.settings.jpeg.quality.to_string(),
                "-outfile".to_string(),
                output,
                input,
            ]),
            ImageFormat::Png => tool.with_args([
                format!(
                    "--quality={}-{}",
                    self.settings.png.min_quality, self.settings.png.max_quality
                ),
                "-o".to_string(),
                output,
                input,
            ]),
            ImageFormat::Svg => {
                let mut args = Vec::with_capacity(5);
                if self.settings.svg.multipass {
                    args.push("--multipass".to_string());
                }
                args.extend(["-i".to_string(), input, "-o".to_string(), output]);
                tool.with_args(args)
            }
            ImageFormat::Gif => {
                let mut args = vec!["--colors".to_string(), self.settings.gif.colors.to_string()];
                if self.settings.gif.web_palette {
                    args.push("--use-col=web".to_string());
                }
                args.extend(["-o".to_string(), output, input]);
                tool.with_args(args)
            }
            ImageFormat::Unsupported => return None,
        };
        Some(command)
    }

    /// Spawn `command` and wait for it, honoring the configured timeout.
    async fn run_tool(
        &self,
        command: &ToolCommand,
        format: ImageFormat,
    ) -> CompressionResult<ToolOutcome> {
        let tool = command.program.clone();
        debug!("running {} {:?}", tool, command.args);

        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let pending = process.output();
        let output = match self.settings.timeout {
            Some(timeout) => tokio::time::timeout(timeout, pending)
                .await
                .map_err(|_| CompressionError::TimedOut {
                    tool: tool.clone(),
                    timeout,
                })?,
            None => pending.await,
        };
        let output = output.map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                CompressionError::ToolNotFound(tool.clone())
            } else {
                CompressionError::Spawn {
                    tool: tool.clone(),
                    source,
                }
            }
        })?;

        if output.status.success() {
            return Ok(ToolOutcome::Written);
        }
        if !self.settings.force
            && format == ImageFormat::Png
            && output
                .status
                .code()
                .is_some_and(|code| PNGQUANT_NO_IMPROVEMENT.contains(&code))
        {
            return Ok(ToolOutcome::NoImprovement);
        }

        Err(CompressionError::ToolFailed {
            tool,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Fill `tmp_path` with the compressed image. Returns true when the
    /// original bytes were kept instead.
    async fn produce(
        &self,
        job: &CompressionJob,
        tmp_path: &Path,
        input_bytes: u64,
    ) -> CompressionResult<bool> {
        let command = self
            .command_for(job.format, &job.input_path, tmp_path)
            .ok_or_else(|| unsupported(&job.input_path))?;

        if let ToolOutcome::NoImprovement = self.run_tool(&command, job.format).await? {
            fs::copy(&job.input_path, tmp_path).await?;
            return Ok(true);
        }

        let written = match fs::metadata(tmp_path).await {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(CompressionError::MissingOutput(command.program));
            }
            Err(err) => return Err(err.into()),
        };
        if written == 0 {
            return Err(CompressionError::MissingOutput(command.program));
        }

        if !self.settings.force && written >= input_bytes {
            fs::copy(&job.input_path, tmp_path).await?;
            return Ok(true);
        }
        Ok(false)
    }
}

#[async_trait]
impl ImageCompressor for CompressionEngine {
    async fn compress(&self, job: &CompressionJob) -> CompressionResult<CompressionReport> {
        let started = Instant::now();
        let file_name = job
            .input_path
            .file_name()
            .ok_or_else(|| CompressionError::InvalidInput(job.input_path.clone()))?;
        if !job.format.is_supported() {
            return Err(unsupported(&job.input_path));
        }

        let input_bytes = fs::metadata(&job.input_path).await?.len();
        fs::create_dir_all(&job.output_dir).await?;

        let output_path = job.output_dir.join(file_name);
        let tmp = TempOutput::new(&job.output_dir, file_name);

        let kept_original = self.produce(job, &tmp.path, input_bytes).await?;
        tmp.persist(&output_path).await?;

        let report = CompressionReport {
            output_bytes: fs::metadata(&output_path).await?.len(),
            output_path,
            input_bytes,
            kept_original,
            elapsed: started.elapsed(),
        };

        if self.settings.statistics {
            info!(
                format = %job.format,
                input_bytes = report.input_bytes,
                output_bytes = report.output_bytes,
                kept_original = report.kept_original,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "compressed {} ({:.1}% saved)",
                report.output_path.display(),
                report.percent_saved()
            );
        }

        Ok(report)
    }

    fn required_tools(&self) -> Vec<ToolCommand> {
        self.settings
            .tools
            .iter()
            .map(|(_, tool)| tool.clone())
            .collect()
    }
}

const TEMP_PREFIX: &str = ".tmp-";

/// True for names of the engine's in-flight outputs (`.tmp-{uuid}-{name}`).
pub fn is_temp_output_name(name: &str) -> bool {
    name.strip_prefix(TEMP_PREFIX)
        .and_then(|rest| rest.get(..36).zip(rest.get(36..)))
        .is_some_and(|(id, tail)| Uuid::parse_str(id).is_ok() && tail.starts_with('-'))
}

/// Hidden output file a tool writes into. Removed on drop unless it was
/// renamed into place, so errors and cancellation both clean up.
struct TempOutput {
    path: PathBuf,
    persisted: bool,
}

impl TempOutput {
    fn new(output_dir: &Path, file_name: &OsStr) -> Self {
        let name = format!(
            "{}{}-{}",
            TEMP_PREFIX,
            Uuid::new_v4(),
            file_name.to_string_lossy()
        );
        Self {
            path: output_dir.join(name),
            persisted: false,
        }
    }

    async fn persist(mut self, to: &Path) -> io::Result<()> {
        fs::rename(&self.path, to).await?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for TempOutput {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("discarded partial output {}", self.path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => error!(
                "failed to remove partial output {}: {}",
                self.path.display(),
                err
            ),
        }
    }
}

fn unsupported(path: &Path) -> CompressionError {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    CompressionError::UnsupportedFormat(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn job(dir: &TempDir, name: &str, format: ImageFormat, bytes: &[u8]) -> CompressionJob {
        let staged = dir.path().join("staged");
        std::fs::create_dir_all(&staged).unwrap();
        let input_path = staged.join(name);
        std::fs::write(&input_path, bytes).unwrap();
        CompressionJob {
            input_path,
            output_dir: dir.path().join("compressed"),
            format,
        }
    }

    /// A `sh -c` command standing in for a real compressor. The script sees
    /// the tool arguments as `$1..`.
    fn fake_tool(script: &str) -> ToolCommand {
        ToolCommand::new("sh").with_args(["-c", script, "fake-tool"])
    }

    fn engine_with(tools: ToolSet) -> CompressionEngine {
        CompressionEngine::new(CompressionSettings {
            tools,
            ..CompressionSettings::default()
        })
    }

    fn output_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    #[test]
    fn builds_fixed_command_lines() {
        let engine = CompressionEngine::new(CompressionSettings::default());
        let input = Path::new("in/photo.jpg");
        let output = Path::new("out/photo.jpg");

        let jpeg = engine.command_for(ImageFormat::Jpeg, input, output).unwrap();
        assert_eq!(jpeg.program, "cjpeg");
        assert_eq!(
            jpeg.args,
            ["-quality", "60", "-outfile", "out/photo.jpg", "in/photo.jpg"]
        );

        let png = engine.command_for(ImageFormat::Png, input, output).unwrap();
        assert_eq!(png.program, "pngquant");
        assert_eq!(
            png.args,
            ["--quality=20-50", "-o", "out/photo.jpg", "in/photo.jpg"]
        );

        let svg = engine.command_for(ImageFormat::Svg, input, output).unwrap();
        assert_eq!(svg.program, "svgo");
        assert_eq!(
            svg.args,
            ["--multipass", "-i", "in/photo.jpg", "-o", "out/photo.jpg"]
        );

        let gif = engine.command_for(ImageFormat::Gif, input, output).unwrap();
        assert_eq!(gif.program, "gifsicle");
        assert_eq!(
            gif.args,
            [
                "--colors",
                "64",
                "--use-col=web",
                "-o",
                "out/photo.jpg",
                "in/photo.jpg"
            ]
        );

        assert!(
            engine
                .command_for(ImageFormat::Unsupported, input, output)
                .is_none()
        );
    }

    #[test]
    fn tool_commands_keep_leading_arguments() {
        let tool: ToolCommand = "npx svgo".parse().unwrap();
        assert_eq!(tool.program, "npx");
        assert_eq!(tool.args, ["svgo"]);
        assert!("   ".parse::<ToolCommand>().is_err());

        let engine = engine_with(ToolSet {
            svg: tool,
            ..ToolSet::default()
        });
        let cmd = engine
            .command_for(ImageFormat::Svg, Path::new("a.svg"), Path::new("b.svg"))
            .unwrap();
        assert_eq!(cmd.args, ["svgo", "--multipass", "-i", "a.svg", "-o", "b.svg"]);
    }

    #[cfg(unix)]
    #[test]
    fn resolves_programs_on_path() {
        assert!(ToolCommand::new("sh").resolve().is_some());
        assert!(
            ToolCommand::new("image-cdn-no-such-tool")
                .resolve()
                .is_none()
        );
    }

    #[tokio::test]
    async fn rejects_unsupported_formats() {
        let dir = TempDir::new().unwrap();
        let engine = CompressionEngine::new(CompressionSettings::default());
        let job = job(&dir, "notes.txt", ImageFormat::Unsupported, b"hello");

        let err = engine.compress(&job).await.unwrap_err();
        assert!(matches!(err, CompressionError::UnsupportedFormat(ref name) if name == "notes.txt"));
        assert!(output_files(&job.output_dir).is_empty());
    }

    #[tokio::test]
    async fn missing_tool_is_reported() {
        let dir = TempDir::new().unwrap();
        let engine = engine_with(ToolSet {
            jpeg: ToolCommand::new("image-cdn-no-such-tool"),
            ..ToolSet::default()
        });
        let job = job(&dir, "photo.jpg", ImageFormat::Jpeg, &[1u8; 64]);

        let err = engine.compress(&job).await.unwrap_err();
        assert!(matches!(err, CompressionError::ToolNotFound(_)));
        assert!(output_files(&job.output_dir).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn writes_output_named_after_input() {
        let dir = TempDir::new().unwrap();
        // cjpeg args: -quality 60 -outfile OUT IN
        let engine = engine_with(ToolSet {
            jpeg: fake_tool(r#"head -c 10 "$5" > "$4""#),
            ..ToolSet::default()
        });
        let job = job(&dir, "photo.jpg", ImageFormat::Jpeg, &[7u8; 100]);

        let report = engine.compress(&job).await.unwrap();
        assert_eq!(report.output_path, job.output_dir.join("photo.jpg"));
        assert_eq!(report.input_bytes, 100);
        assert_eq!(report.output_bytes, 10);
        assert!(!report.kept_original);
        assert_eq!(output_files(&job.output_dir), ["photo.jpg"]);
        // The engine never touches the staged original.
        assert!(job.input_path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn keeps_original_when_result_is_larger() {
        let dir = TempDir::new().unwrap();
        // gifsicle args: --colors 64 --use-col=web -o OUT IN
        let engine = engine_with(ToolSet {
            gif: fake_tool(r#"cat "$6" "$6" > "$5""#),
            ..ToolSet::default()
        });
        let original = b"GIF89a-already-tiny".to_vec();
        let job = job(&dir, "anim.gif", ImageFormat::Gif, &original);

        let report = engine.compress(&job).await.unwrap();
        assert!(report.kept_original);
        assert_eq!(std::fs::read(&report.output_path).unwrap(), original);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn forced_compression_keeps_tool_output() {
        let dir = TempDir::new().unwrap();
        let engine = CompressionEngine::new(CompressionSettings {
            force: true,
            tools: ToolSet {
                gif: fake_tool(r#"cat "$6" "$6" > "$5""#),
                ..ToolSet::default()
            },
            ..CompressionSettings::default()
        });
        let job = job(&dir, "anim.gif", ImageFormat::Gif, b"abc");

        let report = engine.compress(&job).await.unwrap();
        assert!(!report.kept_original);
        assert_eq!(report.output_bytes, 6);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn pngquant_quality_miss_keeps_original() {
        let dir = TempDir::new().unwrap();
        let engine = engine_with(ToolSet {
            png: fake_tool("exit 99"),
            ..ToolSet::default()
        });
        let job = job(&dir, "logo.png", ImageFormat::Png, b"\x89PNG-optimal");

        let report = engine.compress(&job).await.unwrap();
        assert!(report.kept_original);
        assert_eq!(std::fs::read(&report.output_path).unwrap(), b"\x89PNG-optimal");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_tool_carries_diagnostics() {
        let dir = TempDir::new().unwrap();
        let engine = engine_with(ToolSet {
            svg: fake_tool(r#"echo "bad svg" >&2; touch "$5"; exit 3"#),
            ..ToolSet::default()
        });
        let job = job(&dir, "icon.svg", ImageFormat::Svg, b"<svg/>");

        match engine.compress(&job).await.unwrap_err() {
            CompressionError::ToolFailed { stderr, .. } => assert_eq!(stderr, "bad svg"),
            other => panic!("unexpected error: {other:?}"),
        }
        // Partial output is cleaned up.
        assert!(output_files(&job.output_dir).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancelled_compression_leaves_no_partial_output() {
        let dir = TempDir::new().unwrap();
        let engine = engine_with(ToolSet {
            jpeg: fake_tool(r#"head -c 10 "$5" > "$4"; sleep 5"#),
            ..ToolSet::default()
        });
        let job = job(&dir, "photo.jpg", ImageFormat::Jpeg, &[7u8; 100]);

        let pending = engine.compress(&job);
        let cancelled = tokio::time::timeout(Duration::from_millis(300), pending).await;
        assert!(cancelled.is_err());

        assert!(output_files(&job.output_dir).is_empty());
    }

    #[test]
    fn temp_output_names_are_recognized_exactly() {
        let tmp = TempOutput::new(Path::new("out"), OsStr::new("photo.jpg"));
        let name = tmp.path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(is_temp_output_name(&name));
        assert!(name.ends_with("-photo.jpg"));

        assert!(!is_temp_output_name(".tmp-x.png"));
        assert!(!is_temp_output_name(".tmp-123-a.png"));
        assert!(!is_temp_output_name("photo.jpg"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tool_without_output_is_an_error() {
        let dir = TempDir::new().unwrap();
        let engine = engine_with(ToolSet {
            jpeg: fake_tool("exit 0"),
            ..ToolSet::default()
        });
        let job = job(&dir, "photo.jpg", ImageFormat::Jpeg, &[1u8; 32]);

        let err = engine.compress(&job).await.unwrap_err();
        assert!(matches!(err, CompressionError::MissingOutput(_)));
        assert!(output_files(&job.output_dir).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_tool_times_out() {
        let dir = TempDir::new().unwrap();
        let engine = CompressionEngine::new(CompressionSettings {
            timeout: Some(Duration::from_millis(200)),
            tools: ToolSet {
                jpeg: fake_tool("sleep 10"),
                ..ToolSet::default()
            },
            ..CompressionSettings::default()
        });
        let job = job(&dir, "photo.jpg", ImageFormat::Jpeg, &[1u8; 32]);

        let err = engine.compress(&job).await.unwrap_err();
        assert!(matches!(err, CompressionError::TimedOut { .. }));
    }
}
