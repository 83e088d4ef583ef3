//! Demucs command-line separator
//!
//! Runs `<command> -n <model> -o <output_root>/<song> <input>`. Demucs then
//! writes `<output_root>/<song>/<model>/<song>/<stem>.wav`, which is the
//! layout `StemSetLocator` reads with the model name as its wrapper folder.

use super::traits::StemSeparator;
use crate::discovery::StemSetLocator;
use crate::error::{Result, StemsimError};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How often a running separation is checked against its deadline
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lines of stderr kept in a failure report
const DIAGNOSTIC_TAIL_LINES: usize = 40;

/// Separator that shells out to the demucs CLI
#[derive(Debug, Clone)]
pub struct DemucsSeparator {
    program: String,
    /// Arguments placed before the demucs flags (e.g. `-m demucs` for python3)
    launcher_args: Vec<String>,
    model: String,
    timeout: Option<Duration>,
}

impl DemucsSeparator {
    pub fn new(command: Vec<String>, model: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut parts = command.into_iter();
        let program = parts.next().ok_or_else(|| {
            StemsimError::ConfigError("Separator command must not be empty".to_string())
        })?;
        Ok(Self {
            program,
            launcher_args: parts.collect(),
            model: model.into(),
            timeout,
        })
    }

    /// Full command line prefix, for logging
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.launcher_args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Song root for `input_path` under `output_root`
    pub fn song_root(&self, input_path: &Path, output_root: &Path) -> PathBuf {
        output_root.join(song_name(input_path))
    }

    fn spawn(&self, input_path: &Path, song_root: &Path) -> std::io::Result<Child> {
        Command::new(&self.program)
            .args(&self.launcher_args)
            .arg("-n")
            .arg(&self.model)
            .arg("-o")
            .arg(song_root)
            .arg(input_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
    }

    /// Wait for the child, killing it once the deadline passes
    fn wait(&self, child: &mut Child, input_path: &Path) -> Result<ExitStatus> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if let (Some(deadline), Some(timeout)) = (deadline, self.timeout) {
                if Instant::now() >= deadline {
                    warn!(
                        "Separation of {} exceeded {}s, stopping it",
                        input_path.display(),
                        timeout.as_secs()
                    );
                    if let Err(e) = child.kill() {
                        warn!("Failed to stop separator process: {}", e);
                    }
                    let _ = child.wait();
                    return Err(StemsimError::SeparationTimeout {
                        path: input_path.to_path_buf(),
                        timeout,
                    });
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Remove `<song_root>/<model>` left behind by a failed run
    fn discard_partial_output(&self, song_root: &Path) {
        let partial = song_root.join(&self.model);
        match std::fs::remove_dir_all(&partial) {
            Ok(()) => debug!("Removed partial separator output {}", partial.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove partial separator output {}: {}",
                partial.display(),
                e
            ),
        }
    }
}

impl StemSeparator for DemucsSeparator {
    fn separate(&self, input_path: &Path, output_root: &Path) -> Result<PathBuf> {
        if !input_path.is_file() {
            return Err(StemsimError::FileNotFound(input_path.to_path_buf()));
        }

        let song_root = self.song_root(input_path, output_root);
        std::fs::create_dir_all(&song_root)
            .map_err(|e| StemsimError::output_error(&song_root, e))?;

        info!(
            "Separating {} with {} ({})",
            input_path.display(),
            self.command_line(),
            self.model
        );
        let start = Instant::now();

        let mut child = self.spawn(input_path, &song_root).map_err(|e| {
            StemsimError::SeparationFailed {
                path: input_path.to_path_buf(),
                diagnostics: format!("failed to launch '{}': {}", self.command_line(), e),
            }
        })?;

        // Drain stderr concurrently so a chatty child cannot block on a full pipe
        let stderr_reader = child.stderr.take().map(spawn_reader);

        let status = match self.wait(&mut child, input_path) {
            Ok(status) => status,
            Err(e) => {
                self.discard_partial_output(&song_root);
                return Err(e);
            }
        };
        let diagnostics = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            self.discard_partial_output(&song_root);
            return Err(StemsimError::SeparationFailed {
                path: input_path.to_path_buf(),
                diagnostics: format!("exit status {}\n{}", status, tail(&diagnostics)),
            });
        }

        debug!("Separator output:\n{}", tail(&diagnostics));
        info!(
            "Separated {} in {:.1}s -> {}",
            input_path.display(),
            start.elapsed().as_secs_f64(),
            song_root.display()
        );

        Ok(song_root)
    }

    /// True if a locatable stem set already exists for `input_path`
    fn is_separated(&self, input_path: &Path, output_root: &Path) -> bool {
        StemSetLocator::new(&self.model)
            .locate(&self.song_root(input_path, output_root))
            .is_ok()
    }

    fn name(&self) -> &str {
        "demucs"
    }
}

fn spawn_reader(mut stream: impl Read + Send + 'static) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        let _ = stream.read_to_end(&mut bytes);
        String::from_utf8_lossy(&bytes).into_owned()
    })
}

fn tail(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(DIAGNOSTIC_TAIL_LINES);
    lines[start..].join("\n")
}

/// File name without extension, as demucs names its song folder
fn song_name(input_path: &Path) -> String {
    input_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_command_rejected() {
        let err = DemucsSeparator::new(vec![], "htdemucs", None).unwrap_err();
        assert!(matches!(err, StemsimError::ConfigError(_)));
    }

    #[test]
    fn test_song_root_uses_file_stem() {
        let sep = DemucsSeparator::new(vec!["demucs".into()], "htdemucs", None).unwrap();
        assert_eq!(
            sep.song_root(Path::new("uploads/My Song.mp3"), Path::new("out")),
            Path::new("out").join("My Song")
        );
    }

    #[test]
    fn test_tail_keeps_last_lines() {
        let text: String = (0..100).map(|i| format!("line {i}\n")).collect();
        let kept = tail(&text);
        assert_eq!(kept.lines().count(), DIAGNOSTIC_TAIL_LINES);
        assert!(kept.ends_with("line 99"));
    }

    #[test]
    fn test_missing_input_is_file_not_found() {
        let out = tempfile::tempdir().unwrap();
        let sep = DemucsSeparator::new(vec!["demucs".into()], "htdemucs", None).unwrap();
        let err = sep
            .separate(Path::new("/no/such/upload.mp3"), out.path())
            .unwrap_err();
        assert!(matches!(err, StemsimError::FileNotFound(_)));
    }

    #[test]
    fn test_missing_binary_is_separation_failure() {
        let out = tempfile::tempdir().unwrap();
        let input = out.path().join("song.wav");
        std::fs::write(&input, b"RIFF").unwrap();
        let sep = DemucsSeparator::new(
            vec!["stemsim-no-such-separator-binary".into()],
            "htdemucs",
            None,
        )
        .unwrap();
        let err = sep.separate(&input, out.path()).unwrap_err();
        assert!(matches!(err, StemsimError::SeparationFailed { .. }));
    }

    #[cfg(unix)]
    fn scripted(dir: &Path, body: &str, timeout: Option<Duration>) -> DemucsSeparator {
        let script = dir.join("fake_demucs.sh");
        std::fs::write(&script, body).unwrap();
        DemucsSeparator::new(
            vec!["sh".into(), script.to_string_lossy().into_owned()],
            "htdemucs",
            timeout,
        )
        .unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn test_scripted_separator_produces_locatable_stems() {
        let work = tempfile::tempdir().unwrap();
        let input = work.path().join("track.wav");
        std::fs::write(&input, b"RIFF").unwrap();
        // Arguments: -n <model> -o <song_root> <input>
        let sep = scripted(
            work.path(),
            "mkdir -p \"$4/$2/track\" && echo x > \"$4/$2/track/vocals.wav\"\n",
            None,
        );

        let out = work.path().join("out");
        assert!(!sep.is_separated(&input, &out));
        let song_root = sep.separate(&input, &out).unwrap();
        assert_eq!(song_root, out.join("track"));
        assert!(sep.is_separated(&input, &out));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_reports_stderr() {
        let work = tempfile::tempdir().unwrap();
        let input = work.path().join("track.wav");
        std::fs::write(&input, b"RIFF").unwrap();
        let sep = scripted(work.path(), "echo 'model not found' >&2\nexit 3\n", None);

        match sep.separate(&input, &work.path().join("out")) {
            Err(StemsimError::SeparationFailed { diagnostics, .. }) => {
                assert!(diagnostics.contains("model not found"));
            }
            other => panic!("expected SeparationFailed, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_run_does_not_leave_stems_behind() {
        let work = tempfile::tempdir().unwrap();
        let input = work.path().join("track.wav");
        std::fs::write(&input, b"RIFF").unwrap();
        // Writes one stem, then crashes
        let sep = scripted(
            work.path(),
            "mkdir -p \"$4/$2/track\" && echo x > \"$4/$2/track/vocals.wav\"\nexit 3\n",
            None,
        );

        let out = work.path().join("out");
        let err = sep.separate(&input, &out).unwrap_err();
        assert!(matches!(err, StemsimError::SeparationFailed { .. }));
        assert!(!out.join("track").join("htdemucs").exists());
        assert!(!sep.is_separated(&input, &out));
    }

    #[cfg(unix)]
    #[test]
    fn test_timed_out_run_does_not_leave_stems_behind() {
        let work = tempfile::tempdir().unwrap();
        let input = work.path().join("track.wav");
        std::fs::write(&input, b"RIFF").unwrap();
        let sep = scripted(
            work.path(),
            "mkdir -p \"$4/$2/track\" && echo x > \"$4/$2/track/vocals.wav\"\nexec sleep 5\n",
            Some(Duration::from_millis(300)),
        );

        let out = work.path().join("out");
        let err = sep.separate(&input, &out).unwrap_err();
        assert!(matches!(err, StemsimError::SeparationTimeout { .. }));
        assert!(!sep.is_separated(&input, &out));
    }

    #[cfg(unix)]
    #[test]
    fn test_slow_separator_times_out() {
        let work = tempfile::tempdir().unwrap();
        let input = work.path().join("track.wav");
        std::fs::write(&input, b"RIFF").unwrap();
        let sep = scripted(
            work.path(),
            "exec sleep 5\n",
            Some(Duration::from_millis(200)),
        );

        let started = Instant::now();
        let err = sep.separate(&input, &work.path().join("out")).unwrap_err();
        assert!(matches!(err, StemsimError::SeparationTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
