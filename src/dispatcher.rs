//! Owns the single in-flight completion stream.
//!
//! At most one stream is active at a time. Starting a new one cancels the
//! previous stream first, and the old process is killed before the new one
//! is spawned. The active slot sits behind a mutex; start and cancel are
//! additionally serialized by an async lock so they never interleave.
//!
//! Host callbacks never run under the slot lock, so a host may call
//! [`Dispatcher::status`] from inside them. Insertions are instead guarded
//! by a per-stream gate that cancel closes before it returns.

use crate::host::{Host, Status};
use crate::provider::{resolve_credential, Adapter, ChunkState, ProviderConfig};
use crate::transport::{ExitReport, StreamProcess, Transport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Continue the text at the cursor.
    Suggest,
    /// Replace the selection.
    Change,
}

#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub prompt: String,
    pub system_prompt: String,
    pub provider: ProviderConfig,
    pub mode: Mode,
}

/// Output lines kept for the failure message.
const OUTPUT_TAIL: usize = 64;

type CredentialLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    host: Arc<dyn Host>,
    transport: Arc<dyn Transport>,
    credentials: Box<CredentialLookup>,
    slot: Mutex<Slot>,
    control: tokio::sync::Mutex<()>,
}

#[derive(Default)]
struct Slot {
    active: Option<ActiveStream>,
    next_id: u64,
}

struct ActiveStream {
    id: u64,
    status: Status,
    status_tx: watch::Sender<Status>,
    kill_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    /// Open while the stream may insert. Held for the duration of each insert.
    gate: Arc<Mutex<bool>>,
}

/// Lets the caller wait for one stream to end.
#[derive(Debug)]
pub struct StreamHandle {
    id: u64,
    status: watch::Receiver<Status>,
}

impl StreamHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Resolves with the terminal status of this stream.
    pub async fn wait(mut self) -> Status {
        loop {
            let current = *self.status.borrow_and_update();
            if current.is_terminal() {
                return current;
            }
            if self.status.changed().await.is_err() {
                // dispatcher dropped mid-stream
                return Status::Cancelled;
            }
        }
    }
}

impl Dispatcher {
    pub fn new(host: Arc<dyn Host>, transport: Arc<dyn Transport>) -> Self {
        Self::with_credentials(host, transport, |name| std::env::var(name).ok())
    }

    pub fn with_credentials(
        host: Arc<dyn Host>,
        transport: Arc<dyn Transport>,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                host,
                transport,
                credentials: Box::new(lookup),
                slot: Mutex::new(Slot::default()),
                control: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status().is_some()
    }

    /// Status of the active stream, if any.
    pub fn status(&self) -> Option<Status> {
        self.inner.slot().active.as_ref().map(|a| a.status)
    }

    /// Start streaming `req`, superseding whatever is running.
    ///
    /// The host sees `Pending` before the process is spawned. If the spawn
    /// itself fails, `Failed` follows directly and no stream is installed;
    /// this is the one path that never reaches `Streaming`.
    pub async fn start(&self, req: StreamRequest) -> anyhow::Result<StreamHandle> {
        let _control = self.inner.control.lock().await;
        if self.inner.cancel_active().await {
            tracing::debug!("superseded previous stream");
        }

        let adapter = Adapter::for_style(req.provider.style);
        let credential = resolve_credential(&req.provider.api_key_name, &*self.inner.credentials);
        if credential.is_none() {
            tracing::warn!(
                variable = %req.provider.api_key_name,
                "no API key found; sending unauthenticated request"
            );
        }
        let http = adapter.build_request(
            &req.provider,
            &req.prompt,
            &req.system_prompt,
            credential.as_deref(),
        );

        self.inner.host.notify_progress(Status::Pending, None);

        let process = match self.inner.transport.spawn(&http) {
            Ok(p) => p,
            Err(e) => {
                let detail = format!("{e:#}");
                self.inner.host.notify_progress(Status::Failed, Some(detail.as_str()));
                return Err(e);
            }
        };

        let (status_tx, status_rx) = watch::channel(Status::Pending);
        let (kill_tx, kill_rx) = oneshot::channel();

        let id = {
            let mut slot = self.inner.slot();
            slot.next_id += 1;
            let id = slot.next_id;
            slot.active = Some(ActiveStream {
                id,
                status: Status::Pending,
                status_tx,
                kill_tx: Some(kill_tx),
                task: None,
                gate: Arc::new(Mutex::new(true)),
            });
            id
        };

        tracing::info!(
            id,
            mode = ?req.mode,
            style = ?req.provider.style,
            transport = self.inner.transport.name(),
            url = %http.url,
            "stream started"
        );

        let task = tokio::spawn(run(self.inner.clone(), id, adapter, process, kill_rx));
        if let Some(active) = self.inner.slot().active.as_mut().filter(|a| a.id == id) {
            active.task = Some(task);
        }

        Ok(StreamHandle {
            id,
            status: status_rx,
        })
    }

    /// Cancel the active stream. Does nothing when idle.
    pub async fn cancel(&self) {
        let _control = self.inner.control.lock().await;
        if !self.inner.cancel_active().await {
            tracing::debug!("cancel requested with no active stream");
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl Inner {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        lock(&self.slot)
    }

    /// Returns whether a stream was running.
    async fn cancel_active(&self) -> bool {
        let taken = self.slot().active.take();
        let Some(mut active) = taken else {
            return false;
        };

        *lock(&*active.gate) = false;
        if let Some(kill) = active.kill_tx.take() {
            let _ = kill.send(());
        }
        if let Some(task) = active.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(id = active.id, error = %e, "stream task ended abnormally");
            }
        }

        tracing::info!(id = active.id, "stream cancelled");
        self.host.notify_progress(Status::Cancelled, None);
        active.status_tx.send_replace(Status::Cancelled);
        true
    }

    /// Apply one parsed line for stream `id`. Returns false once the stream
    /// is no longer the active one; nothing is inserted in that case.
    fn deliver(&self, id: u64, delta: Option<&str>) -> bool {
        let (gate, first) = {
            let mut slot = self.slot();
            let Some(active) = slot.active.as_mut().filter(|a| a.id == id) else {
                return false;
            };
            let first = active.status == Status::Pending;
            if first {
                active.status = Status::Streaming;
                active.status_tx.send_replace(Status::Streaming);
            }
            (active.gate.clone(), first)
        };

        if first {
            self.host.notify_progress(Status::Streaming, None);
        }
        if let Some(text) = delta {
            let open = lock(&*gate);
            if !*open {
                return false;
            }
            self.host.insert_at_cursor(text);
        }
        true
    }

    fn finish(&self, id: u64, status: Status, detail: Option<String>) {
        let owned = {
            let mut slot = self.slot();
            if slot.active.as_ref().is_some_and(|a| a.id == id) {
                slot.active.take()
            } else {
                None
            }
        };
        // cancelled or superseded in the meantime
        let Some(active) = owned else {
            return;
        };

        match status {
            Status::Failed => tracing::warn!(id, detail = detail.as_deref().unwrap_or(""), "stream failed"),
            _ => tracing::info!(id, %status, "stream ended"),
        }
        self.host.notify_progress(status, detail.as_deref());
        active.status_tx.send_replace(status);
    }
}

async fn run(
    inner: Arc<Inner>,
    id: u64,
    adapter: Adapter,
    mut process: Box<dyn StreamProcess>,
    mut kill_rx: oneshot::Receiver<()>,
) {
    let mut state = ChunkState::default();
    let mut output = VecDeque::with_capacity(OUTPUT_TAIL);

    loop {
        let line = tokio::select! {
            biased;
            _ = &mut kill_rx => {
                process.kill().await;
                return;
            }
            line = process.next_line() => line,
        };

        match line {
            Ok(Some(line)) => {
                let (delta, next) = adapter.parse_chunk(&line, state);
                state = next;
                if !inner.deliver(id, delta.as_deref()) {
                    process.kill().await;
                    return;
                }
                if output.len() == OUTPUT_TAIL {
                    output.pop_front();
                }
                output.push_back(line);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(id, error = %e, "stopped reading stream output");
                break;
            }
        }
    }

    let exit = tokio::select! {
        biased;
        _ = &mut kill_rx => {
            process.kill().await;
            return;
        }
        exit = process.wait() => exit,
    };

    match exit {
        Ok(report) if report.success() => inner.finish(id, Status::Finished, None),
        Ok(report) => inner.finish(id, Status::Failed, Some(failure_detail(&output, &report))),
        Err(e) => inner.finish(id, Status::Failed, Some(format!("{e:#}"))),
    }
}

/// The tail of the captured output (usually the error body) plus stderr.
fn failure_detail(output: &VecDeque<String>, report: &ExitReport) -> String {
    let mut parts = Vec::new();
    let body = output.iter().map(String::as_str).collect::<Vec<_>>().join("\n");
    if !body.trim().is_empty() {
        parts.push(body);
    }
    let stderr = report.stderr.trim();
    if !stderr.is_empty() {
        parts.push(stderr.to_string());
    }
    if parts.is_empty() {
        return match report.code {
            Some(code) => format!("request exited with status {code}"),
            None => "request was terminated".to_string(),
        };
    }
    parts.join("\n")
}
