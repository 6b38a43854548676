//! Step invoker that runs the generator as an external process.

use async_trait::async_trait;
use chrono::Utc;
use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

use super::config::GeneratorConfig;
use super::error::GeneratorError;
use super::materialize::materialize;
use super::traits::StepInvoker;
use super::types::{GenerationOutput, GenerationRequest};
use crate::job::PhaseDefinition;

/// Lines of stderr kept in `GeneratorError::ExitStatus`.
const STDERR_TAIL_LINES: usize = 20;

/// Runs the configured program and materializes what it wrote.
///
/// The program must print a line `Output: <dir>` on stdout naming the
/// directory holding one raw JSON artifact per phase.
pub struct ProcessStepInvoker {
    config: GeneratorConfig,
    pipeline: &'static [PhaseDefinition],
}

impl ProcessStepInvoker {
    pub fn new(config: GeneratorConfig, pipeline: &'static [PhaseDefinition]) -> Self {
        Self { config, pipeline }
    }

    /// Run the program and return its stdout.
    async fn run(&self, args: &[String]) -> Result<String, GeneratorError> {
        let mut child = Command::new(&self.config.program)
            .args(args)
            .current_dir(&self.config.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| GeneratorError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        let mut stdout = child.stdout.take().ok_or_else(|| {
            GeneratorError::Io(std::io::Error::other("generator stdout not captured"))
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| {
            GeneratorError::Io(std::io::Error::other("generator stderr not captured"))
        })?;

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            let mut out = Vec::new();
            let mut err = Vec::new();
            let (read_out, read_err) =
                tokio::join!(stdout.read_to_end(&mut out), stderr.read_to_end(&mut err));
            read_out?;
            read_err?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, out, err))
        })
        .await;

        match result {
            Ok(Ok((status, out, err))) => {
                if !status.success() {
                    return Err(GeneratorError::ExitStatus {
                        code: status.code(),
                        stderr: tail_lines(&String::from_utf8_lossy(&err), STDERR_TAIL_LINES),
                    });
                }
                Ok(String::from_utf8_lossy(&out).into_owned())
            }
            Ok(Err(e)) => Err(GeneratorError::Io(e)),
            Err(_) => {
                // Kill the process on timeout
                let _ = child.kill().await;
                Err(GeneratorError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                })
            }
        }
    }

    fn resolve_output_dir(&self, reported: &str) -> PathBuf {
        let path = Path::new(reported);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.working_dir.join(path)
        }
    }
}

#[async_trait]
impl StepInvoker for ProcessStepInvoker {
    fn name(&self) -> &str {
        "process"
    }

    async fn invoke(&self, request: &GenerationRequest) -> Result<GenerationOutput, GeneratorError> {
        let args = self
            .config
            .render_args(&request.topic, &request.product_type);
        info!(
            "Running generator for job {}: {} {:?}",
            request.job_id, self.config.program, args
        );

        let stdout = self.run(&args).await?;
        let reported = parse_output_dir(&stdout).ok_or(GeneratorError::MissingOutputDir)?;
        let output_dir = self.resolve_output_dir(&reported);

        let is_dir = tokio::fs::metadata(&output_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(GeneratorError::OutputDirNotFound { path: output_dir });
        }
        debug!("Generator output for job {} at {:?}", request.job_id, output_dir);

        let materialized =
            materialize(self.pipeline, &output_dir, &request.project_dir, Utc::now()).await?;

        Ok(GenerationOutput {
            output_dir,
            artifacts: materialized.artifacts,
            metrics: materialized.metrics,
        })
    }
}

/// Extract the path from the first `Output: <path>` line.
pub fn parse_output_dir(stdout: &str) -> Option<String> {
    let re = Regex::new(r"(?m)Output:\s*(.+?)$").ok()?;
    re.captures(stdout)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::STANDARD_PIPELINE;
    use tempfile::TempDir;

    #[test]
    fn test_parse_output_dir() {
        assert_eq!(
            parse_output_dir("starting\nOutput: out/2024-yoga\ndone\n"),
            Some("out/2024-yoga".to_string())
        );
        assert_eq!(
            parse_output_dir("Output:   /abs/dir  \r\n"),
            Some("/abs/dir".to_string())
        );
        assert_eq!(parse_output_dir("no marker here"), None);
        assert_eq!(parse_output_dir(""), None);
    }

    #[test]
    fn test_parse_output_dir_takes_first_match() {
        assert_eq!(
            parse_output_dir("Output: first\nOutput: second\n"),
            Some("first".to_string())
        );
    }

    #[test]
    fn test_tail_lines() {
        assert_eq!(tail_lines("a\nb\nc\nd", 2), "c\nd");
        assert_eq!(tail_lines("a", 5), "a");
        assert_eq!(tail_lines("", 5), "");
    }

    fn shell_invoker(script: &str, working_dir: &Path, timeout_secs: u64) -> ProcessStepInvoker {
        let config = GeneratorConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            working_dir: working_dir.to_path_buf(),
            product_type: "curso_online".to_string(),
            timeout_secs,
        };
        ProcessStepInvoker::new(config, STANDARD_PIPELINE)
    }

    fn request(project_dir: &Path) -> GenerationRequest {
        GenerationRequest {
            job_id: "Teste".to_string(),
            topic: "curso de yoga".to_string(),
            product_type: "curso_online".to_string(),
            project_dir: project_dir.to_path_buf(),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_materializes_relative_output() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("01-multidao-faminta.json"), "{}").unwrap();
        std::fs::write(out.join("02-problemas.json"), r#"{"top15": [1]}"#).unwrap();

        let invoker = shell_invoker("echo 'Output: out'", dir.path(), 10);
        let project = dir.path().join("project");
        let output = invoker.invoke(&request(&project)).await.unwrap();

        assert_eq!(output.output_dir, dir.path().join("out"));
        assert_eq!(output.artifacts.len(), 2);
        assert_eq!(output.metrics["pain_points_identified"], 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_without_output_line() {
        let dir = TempDir::new().unwrap();
        let invoker = shell_invoker("echo 'nothing to see'", dir.path(), 10);
        let err = invoker.invoke(&request(dir.path())).await.unwrap_err();
        assert!(matches!(err, GeneratorError::MissingOutputDir));
        assert!(err.to_string().contains("did not return an output directory"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_reports_missing_directory() {
        let dir = TempDir::new().unwrap();
        let invoker = shell_invoker("echo 'Output: /definitely/not/here'", dir.path(), 10);
        let err = invoker.invoke(&request(dir.path())).await.unwrap_err();
        assert!(matches!(err, GeneratorError::OutputDirNotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_non_zero_exit_keeps_stderr() {
        let dir = TempDir::new().unwrap();
        let invoker = shell_invoker("echo 'quota exceeded' >&2; exit 3", dir.path(), 10);
        let err = invoker.invoke(&request(dir.path())).await.unwrap_err();
        match err {
            GeneratorError::ExitStatus { code, stderr } => {
                assert_eq!(code, Some(3));
                assert!(stderr.contains("quota exceeded"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_times_out() {
        let dir = TempDir::new().unwrap();
        let invoker = shell_invoker("sleep 10", dir.path(), 1);
        let err = invoker.invoke(&request(dir.path())).await.unwrap_err();
        assert!(matches!(err, GeneratorError::Timeout { timeout_secs: 1 }));
    }

    #[tokio::test]
    async fn test_invoke_missing_program() {
        let dir = TempDir::new().unwrap();
        let config = GeneratorConfig {
            program: "offerline-no-such-program".to_string(),
            working_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let invoker = ProcessStepInvoker::new(config, STANDARD_PIPELINE);
        let err = invoker.invoke(&request(dir.path())).await.unwrap_err();
        assert!(matches!(err, GeneratorError::Spawn { .. }));
    }
}
