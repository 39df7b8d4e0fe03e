mod curl;
mod native;

#[cfg(test)]
pub(crate) mod scripted;

pub use curl::CurlTransport;
pub use native::NativeTransport;

use crate::config::{TransportConfig, TransportKind};
use crate::provider::HttpRequest;
use futures_core::future::BoxFuture;
use std::sync::Arc;

/// How a streaming request process ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitReport {
    /// `None` when the process died from a signal.
    pub code: Option<i32>,
    pub stderr: String,
}

impl ExitReport {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A running request that produces output line by line.
pub trait StreamProcess: Send {
    /// Next output line without its terminator, `None` once output ends.
    fn next_line(&mut self) -> BoxFuture<'_, anyhow::Result<Option<String>>>;

    /// Wait for the process to exit.
    fn wait(&mut self) -> BoxFuture<'_, anyhow::Result<ExitReport>>;

    /// Terminate immediately. Safe to call after exit.
    fn kill(&mut self) -> BoxFuture<'_, ()>;
}

/// Starts request processes.
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    fn spawn(&self, req: &HttpRequest) -> anyhow::Result<Box<dyn StreamProcess>>;
}

pub fn build_transport(cfg: &TransportConfig) -> anyhow::Result<Arc<dyn Transport>> {
    match cfg.kind {
        TransportKind::Curl => Ok(Arc::new(CurlTransport::new(
            cfg.program.clone(),
            cfg.args.clone(),
        ))),
        TransportKind::Native => Ok(Arc::new(NativeTransport::new()?)),
    }
}

/// Splits a byte stream into lines, tolerating invalid UTF-8.
#[derive(Debug, Default)]
pub(crate) struct LineSplitter {
    buf: Vec<u8>,
}

impl LineSplitter {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            out.push(decode_line(&line));
        }
        out
    }

    /// Whatever is left after the final newline.
    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(decode_line(&rest))
    }
}

pub(crate) fn decode_line(raw: &[u8]) -> String {
    let mut line = raw;
    if let Some(rest) = line.strip_suffix(b"\n") {
        line = rest;
    }
    if let Some(rest) = line.strip_suffix(b"\r") {
        line = rest;
    }
    String::from_utf8_lossy(line).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splitter_handles_partial_lines() {
        let mut s = LineSplitter::default();
        assert!(s.push(b"data: {\"a\"").is_empty());
        assert_eq!(s.push(b":1}\r\nevent: x\n\npart"), vec!["data: {\"a\":1}", "event: x", ""]);
        assert_eq!(s.finish().as_deref(), Some("part"));
        assert_eq!(s.finish(), None);
    }

    #[test]
    fn exit_report_success_needs_zero() {
        assert!(ExitReport { code: Some(0), stderr: String::new() }.success());
        assert!(!ExitReport { code: Some(22), stderr: String::new() }.success());
        assert!(!ExitReport::default().success());
    }
}
