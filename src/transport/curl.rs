use super::{decode_line, ExitReport, StreamProcess, Transport};
use crate::provider::HttpRequest;
use anyhow::Context;
use futures_core::future::BoxFuture;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

/// Runs each request as a `curl` child process.
#[derive(Debug, Clone)]
pub struct CurlTransport {
    program: String,
    leading_args: Vec<String>,
}

impl CurlTransport {
    pub fn new(program: impl Into<String>, leading_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            leading_args,
        }
    }

    /// `-N` keeps curl from buffering the response; `--fail-with-body`
    /// turns HTTP errors into a nonzero exit while still printing the body.
    pub fn curl_args(req: &HttpRequest) -> Vec<String> {
        let mut args: Vec<String> = [
            "-N",
            "--silent",
            "--show-error",
            "--fail-with-body",
            "-X",
            "POST",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(req.url.clone());
        for (k, v) in &req.headers {
            args.push("-H".to_string());
            args.push(format!("{k}: {v}"));
        }
        args.push("-d".to_string());
        args.push(req.body.to_string());
        args
    }
}

impl Transport for CurlTransport {
    fn name(&self) -> &'static str {
        "curl"
    }

    fn spawn(&self, req: &HttpRequest) -> anyhow::Result<Box<dyn StreamProcess>> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .args(Self::curl_args(req))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn HTTP client: {}", self.program))?;

        let stdout = child.stdout.take().context("child stdout missing")?;
        let mut stderr = child.stderr.take().context("child stderr missing")?;

        let stderr_task = tokio::spawn(async move {
            let mut s = String::new();
            let mut raw = Vec::new();
            if stderr.read_to_end(&mut raw).await.is_ok() {
                s = String::from_utf8_lossy(&raw).into_owned();
            }
            s
        });

        tracing::debug!(program = %self.program, pid = ?child.id(), url = %req.url, "spawned curl");

        Ok(Box::new(CurlProcess {
            child,
            stdout: BufReader::new(stdout),
            stderr_task: Some(stderr_task),
        }))
    }
}

struct CurlProcess {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_task: Option<JoinHandle<String>>,
}

impl StreamProcess for CurlProcess {
    fn next_line(&mut self) -> BoxFuture<'_, anyhow::Result<Option<String>>> {
        Box::pin(async move {
            let mut raw = Vec::new();
            let n = self
                .stdout
                .read_until(b'\n', &mut raw)
                .await
                .context("failed to read curl output")?;
            if n == 0 {
                return Ok(None);
            }
            Ok(Some(decode_line(&raw)))
        })
    }

    fn wait(&mut self) -> BoxFuture<'_, anyhow::Result<ExitReport>> {
        Box::pin(async move {
            let status = self.child.wait().await.context("failed to wait for curl")?;
            let stderr = match self.stderr_task.take() {
                Some(task) => task.await.unwrap_or_default(),
                None => String::new(),
            };
            Ok(ExitReport {
                code: status.code(),
                stderr,
            })
        })
    }

    fn kill(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if let Err(e) = self.child.kill().await {
                tracing::debug!(error = %e, "curl already gone");
            }
            if let Some(task) = self.stderr_task.take() {
                task.abort();
            }
        })
    }
}
