//! In-memory transport for dispatcher tests.

use super::{ExitReport, StreamProcess, Transport};
use crate::provider::HttpRequest;
use futures_core::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub(crate) struct Script {
    pub lines: Vec<String>,
    pub exit_code: i32,
    pub stderr: String,
    /// Keep output open after `lines` until the test feeds more or kills it.
    pub hold_open: bool,
}

impl Script {
    pub fn lines(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|s| s.to_string()).collect(),
            exit_code: 0,
            stderr: String::new(),
            hold_open: false,
        }
    }

    pub fn exit(mut self, code: i32, stderr: &str) -> Self {
        self.exit_code = code;
        self.stderr = stderr.to_string();
        self
    }

    pub fn held(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

/// Hands out scripted processes in order and records `spawn:N` / `kill:N`.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    pub log: Arc<Mutex<Vec<String>>>,
    feeds: Mutex<Vec<mpsc::UnboundedSender<String>>>,
    pub requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            ..Self::default()
        }
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Push an extra line into the `n`th spawned process (1-based).
    pub fn feed(&self, n: usize, line: &str) {
        let feeds = self.feeds.lock().unwrap();
        let _ = feeds[n - 1].send(line.to_string());
    }
}

impl Transport for ScriptedTransport {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn spawn(&self, req: &HttpRequest) -> anyhow::Result<Box<dyn StreamProcess>> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no script left"))?;

        self.requests.lock().unwrap().push(req.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        for line in &script.lines {
            let _ = tx.send(line.clone());
        }

        let mut feeds = self.feeds.lock().unwrap();
        if script.hold_open {
            feeds.push(tx);
        } else {
            // Keep numbering aligned; a closed sender is dropped right away.
            let (closed, _) = mpsc::unbounded_channel();
            feeds.push(closed);
            drop(tx);
        }

        let id = feeds.len();
        self.log.lock().unwrap().push(format!("spawn:{id}"));

        Ok(Box::new(ScriptedProcess {
            id,
            rx,
            script,
            log: self.log.clone(),
            killed: false,
        }))
    }
}

struct ScriptedProcess {
    id: usize,
    rx: mpsc::UnboundedReceiver<String>,
    script: Script,
    log: Arc<Mutex<Vec<String>>>,
    killed: bool,
}

impl StreamProcess for ScriptedProcess {
    fn next_line(&mut self) -> BoxFuture<'_, anyhow::Result<Option<String>>> {
        Box::pin(async move {
            if self.killed {
                return Ok(None);
            }
            Ok(self.rx.recv().await)
        })
    }

    fn wait(&mut self) -> BoxFuture<'_, anyhow::Result<ExitReport>> {
        Box::pin(async move {
            let code = if self.killed {
                None
            } else {
                Some(self.script.exit_code)
            };
            Ok(ExitReport {
                code,
                stderr: self.script.stderr.clone(),
            })
        })
    }

    fn kill(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.killed = true;
            self.rx.close();
            self.log.lock().unwrap().push(format!("kill:{}", self.id));
        })
    }
}
