//! Stream inspection through an external media tool

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use camonvif::StreamInfo;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, trace};

/// Default limit for one inspection
pub const DEFAULT_INSPECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("unable to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("inspection timed out after {0:?}")]
    Timeout(Duration),

    #[error("inspection failed ({status}): {stderr}")]
    Failed { status: String, stderr: String },

    #[error("invalid inspection output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Lists the elementary streams behind a stream URL
#[async_trait]
pub trait StreamInspector: Send + Sync {
    async fn inspect(&self, url: &str) -> Result<Vec<StreamInfo>, InspectError>;
}

/// Inspector returning no streams, used when inspection is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInspector;

#[async_trait]
impl StreamInspector for NoopInspector {
    async fn inspect(&self, _url: &str) -> Result<Vec<StreamInfo>, InspectError> {
        Ok(Vec::new())
    }
}

/// Runs `ffprobe` and reads its JSON report.
#[derive(Debug, Clone)]
pub struct FfprobeInspector {
    program: String,
    timeout: Duration,
}

impl Default for FfprobeInspector {
    fn default() -> Self {
        Self::new("ffprobe", DEFAULT_INSPECT_TIMEOUT)
    }
}

impl FfprobeInspector {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeReport {
    #[serde(default)]
    streams: Vec<StreamInfo>,
}

/// Extracts the stream list from an `ffprobe -print_format json` report.
pub fn parse_ffprobe_output(json: &[u8]) -> Result<Vec<StreamInfo>, InspectError> {
    let report: FfprobeReport = serde_json::from_slice(json)?;
    Ok(report.streams)
}

#[async_trait]
impl StreamInspector for FfprobeInspector {
    async fn inspect(&self, url: &str) -> Result<Vec<StreamInfo>, InspectError> {
        debug!(program = %self.program, "inspecting stream");

        let mut command = Command::new(&self.program);
        command
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(url)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        // the child is killed when the timed out future is dropped
        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => return Err(InspectError::Timeout(self.timeout)),
            Ok(Err(e)) => {
                return Err(InspectError::Spawn {
                    program: self.program.clone(),
                    source: e,
                });
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            return Err(InspectError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        trace!(output = %String::from_utf8_lossy(&output.stdout), "ffprobe report");
        parse_ffprobe_output(&output.stdout)
    }
}
