use super::{ExitReport, LineSplitter, StreamProcess, Transport};
use crate::provider::HttpRequest;
use anyhow::{anyhow, Context};
use futures_core::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

/// Exit code reported when the request never produced an HTTP status.
const TRANSPORT_FAILURE: i32 = 1;

/// Issues the request in-process with reqwest, presenting the same
/// line-oriented contract as the curl child process.
#[derive(Debug, Clone)]
pub struct NativeTransport {
    http: reqwest::Client,
}

impl NativeTransport {
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http })
    }

    fn headers(req: &HttpRequest) -> anyhow::Result<HeaderMap> {
        let mut h = HeaderMap::new();
        for (k, v) in &req.headers {
            let name = HeaderName::from_bytes(k.as_bytes()).map_err(|e| anyhow!(e))?;
            let value = HeaderValue::from_str(v).map_err(|e| anyhow!(e))?;
            h.insert(name, value);
        }
        Ok(h)
    }
}

impl Transport for NativeTransport {
    fn name(&self) -> &'static str {
        "native"
    }

    fn spawn(&self, req: &HttpRequest) -> anyhow::Result<Box<dyn StreamProcess>> {
        let headers = Self::headers(req)?;
        let pending = self
            .http
            .post(&req.url)
            .headers(headers)
            .json(&req.body);

        let (tx, rx) = mpsc::channel::<String>(64);

        let task = tokio::spawn(async move {
            let resp = match pending.send().await {
                Ok(r) => r,
                Err(e) => {
                    return ExitReport {
                        code: Some(TRANSPORT_FAILURE),
                        stderr: format!("{:#}", anyhow!(e).context("failed to start request")),
                    }
                }
            };

            let status = resp.status();
            let code = if status.is_success() {
                0
            } else {
                i32::from(status.as_u16())
            };

            let mut stream = resp.bytes_stream();
            let mut lines = LineSplitter::default();
            while let Some(item) = stream.next().await {
                let bytes = match item {
                    Ok(b) => b,
                    Err(e) => {
                        return ExitReport {
                            code: Some(TRANSPORT_FAILURE),
                            stderr: format!("{:#}", anyhow!(e).context("network stream error")),
                        }
                    }
                };
                for line in lines.push(&bytes) {
                    if tx.send(line).await.is_err() {
                        return ExitReport::default();
                    }
                }
            }
            if let Some(rest) = lines.finish() {
                let _ = tx.send(rest).await;
            }

            let stderr = if code == 0 {
                String::new()
            } else {
                format!("HTTP {status}")
            };
            ExitReport {
                code: Some(code),
                stderr,
            }
        });

        Ok(Box::new(NativeProcess {
            lines: rx,
            task: Some(task),
        }))
    }
}

struct NativeProcess {
    lines: mpsc::Receiver<String>,
    task: Option<JoinHandle<ExitReport>>,
}

impl StreamProcess for NativeProcess {
    fn next_line(&mut self) -> BoxFuture<'_, anyhow::Result<Option<String>>> {
        Box::pin(async move { Ok(self.lines.recv().await) })
    }

    fn wait(&mut self) -> BoxFuture<'_, anyhow::Result<ExitReport>> {
        Box::pin(async move {
            let task = self.task.take().context("request already reaped")?;
            match task.await {
                Ok(report) => Ok(report),
                Err(e) if e.is_cancelled() => Ok(ExitReport::default()),
                Err(e) => Err(anyhow!(e).context("request task panicked")),
            }
        })
    }

    fn kill(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.lines.close();
            if let Some(task) = &self.task {
                task.abort();
            }
        })
    }
}
