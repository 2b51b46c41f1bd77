use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use tracing::debug;

use crate::domain::ConvertFormat;
use crate::error::KiraError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Converts a downloaded mmCIF file into one of the derived formats.
pub trait StructureConverter: Send + Sync {
    fn convert(&self, input: &Path, format: ConvertFormat, output: &Path) -> Result<(), KiraError>;
}

/// Schrödinger `structconvert`; the output format follows the output extension.
#[derive(Debug, Clone)]
pub struct StructconvertConverter {
    executable: PathBuf,
    timeout: Duration,
}

impl StructconvertConverter {
    /// Finds `utilities/structconvert` under the Schrödinger installation root.
    pub fn locate(root: Option<&Utf8Path>, timeout: Duration) -> Result<Self, KiraError> {
        let root = root.ok_or(KiraError::MissingConverterRoot)?;
        let utilities = root.as_std_path().join("utilities");
        let candidates = [
            utilities.join("structconvert"),
            utilities.join("structconvert.exe"),
        ];
        let executable = candidates
            .iter()
            .find(|path| path.is_file())
            .cloned()
            .ok_or_else(|| {
                KiraError::MissingTool(format!(
                    "structconvert not found at {}",
                    candidates[0].display()
                ))
            })?;
        Ok(Self::with_executable(executable, timeout))
    }

    pub fn with_executable(executable: PathBuf, timeout: Duration) -> Self {
        Self {
            executable,
            timeout,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

impl StructureConverter for StructconvertConverter {
    fn convert(&self, input: &Path, format: ConvertFormat, output: &Path) -> Result<(), KiraError> {
        debug!(input = %input.display(), output = %output.display(), %format, "structconvert");
        run_with_timeout(
            Command::new(&self.executable).arg(input).arg(output),
            self.timeout,
        )
    }
}

/// Runs `cmd` to completion, killing it once `timeout` has elapsed.
///
/// Stderr goes to a scratch file so a chatty child cannot block on a full pipe.
pub fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<(), KiraError> {
    let mut stderr_file =
        tempfile::tempfile().map_err(|err| KiraError::Filesystem(err.to_string()))?;
    let stderr_handle = stderr_file
        .try_clone()
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::from(stderr_handle))
        .spawn()
        .map_err(|err| KiraError::Conversion(format!("failed to start converter: {err}")))?;

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(KiraError::ConversionTimeout(timeout.as_secs()));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(err) => return Err(KiraError::Conversion(err.to_string())),
        }
    };

    if status.success() {
        return Ok(());
    }

    let mut stderr = String::new();
    if stderr_file.seek(SeekFrom::Start(0)).is_ok() {
        let _ = stderr_file.read_to_string(&mut stderr);
    }
    let stderr = stderr.trim();
    let message = if stderr.is_empty() {
        format!("converter exited with {status}")
    } else {
        stderr.to_string()
    };
    Err(KiraError::Conversion(message))
}
