use crate::buffer::Buffer;
use crate::cli::EditArgs;
use crate::config::Config;
use crate::dispatcher::{Dispatcher, Mode, StreamRequest};
use crate::host::{Host, Status};
use crate::{prompt, transport};
use anyhow::Context;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Editor host backed by an in-memory buffer.
pub struct CliHost {
    buffer: Arc<Buffer>,

    /// Print deltas to stdout as they arrive.
    echo: bool,
}

impl Host for CliHost {
    fn insert_at_cursor(&self, text: &str) {
        self.buffer.insert(text);
        if self.echo {
            let mut out = std::io::stdout();
            let _ = out.write_all(text.as_bytes());
            out.flush().ok();
        }
    }

    fn notify_progress(&self, status: Status, detail: Option<&str>) {
        match status {
            Status::Failed => {
                eprintln!("request failed:\n{}", detail.unwrap_or("(no output)"));
            }
            Status::Cancelled => eprintln!("(cancelled)"),
            _ => tracing::debug!(%status, "progress"),
        }
    }
}

/// Call `handler` every time the user presses Ctrl-C.
pub fn register_cancel_key(handler: impl Fn() + Send + 'static) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            handler();
        }
    });
}

pub async fn cmd_edit(cfg: &Config, mode: Mode, args: EditArgs) -> anyhow::Result<()> {
    let mut provider = cfg.provider.clone();
    if let Some(model) = args.model {
        provider.model = model;
    }
    if let Some(style) = args.style {
        provider.style = style.parse()?;
    }
    if let Some(url) = args.url {
        provider.url = url;
    }

    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let buffer = Arc::new(Buffer::new(text));
    if let Some(pos) = args.cursor {
        buffer.set_cursor(pos);
    }
    if let Some(sel) = args.select {
        buffer.select(sel);
    }

    let opts = prompt::PromptOptions {
        use_visual_selection: mode == Mode::Change,
        include_after_cursor: args.after_cursor || cfg.include_after_cursor,
    };
    let assembled = prompt::assemble(&buffer.prompt_context(), opts);
    if assembled.prompt.trim().is_empty() {
        anyhow::bail!("nothing to send: the prompt is empty");
    }
    if assembled.delete_selection {
        buffer.delete_selection();
    }

    let system_prompt = match mode {
        Mode::Suggest => cfg.suggest_system_prompt.clone(),
        Mode::Change => cfg.change_system_prompt.clone(),
    };

    let transport = transport::build_transport(&cfg.transport)?;
    let host = Arc::new(CliHost {
        buffer: buffer.clone(),
        echo: !args.in_place,
    });
    let dispatcher = Dispatcher::new(host, transport);

    let on_cancel = dispatcher.clone();
    register_cancel_key(move || {
        if !on_cancel.is_active() {
            return;
        }
        let d = on_cancel.clone();
        tokio::spawn(async move { d.cancel().await });
    });

    let handle = dispatcher
        .start(StreamRequest {
            prompt: assembled.prompt,
            system_prompt,
            provider,
            mode,
        })
        .await
        .context("failed to start streaming")?;

    let id = handle.id();
    let status = handle.wait().await;
    tracing::debug!(id, %status, "stream done");
    if !args.in_place {
        println!();
    }

    match status {
        Status::Failed => anyhow::bail!("completion failed"),
        _ if args.in_place => {
            write_atomic(&args.file, &buffer.text())?;
            let pos = buffer.cursor_position();
            tracing::info!(file = %args.file.display(), line = pos.line, col = pos.col, %status, "buffer written");
            Ok(())
        }
        _ => Ok(()),
    }
}

pub fn cmd_config(cfg: &Config) -> anyhow::Result<()> {
    let s = toml::to_string_pretty(cfg).context("failed to render config")?;
    print!("{s}");
    Ok(())
}

fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
    let tmp = tmp_path(path);
    std::fs::write(&tmp, contents)
        .with_context(|| format!("failed to write: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace: {}", path.display()))?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut p = path.to_path_buf();
    let file = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "buffer".to_string());
    p.set_file_name(format!(".{file}.tmp"));
    p
}
