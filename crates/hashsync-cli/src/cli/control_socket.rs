//! Control socket: server (during `hashsync run`) and client (`hashsync pause` etc.).
//! Protocol: one command per line: "pause", "resume" or "stop".

use anyhow::Result;
use hashsync_core::control::ControlCommand;
use hashsync_core::DownloadManager;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;

/// Spawns a task that listens on `path` and applies each command line to
/// `manager`. Ignores malformed lines.
pub fn spawn_control_listener(
    manager: Arc<DownloadManager>,
    path: impl AsRef<Path>,
) -> tokio::task::JoinHandle<()> {
    let path = path.as_ref().to_path_buf();
    tokio::spawn(async move {
        let _ = std::fs::remove_file(&path);
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let listener = match UnixListener::bind(&path) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(path = %path.display(), "control socket bind: {}", e);
                return;
            }
        };
        tracing::debug!(path = %path.display(), "control socket listening");
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let manager = Arc::clone(&manager);
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(stream).lines();
                        while let Ok(Some(line)) = reader.next_line().await {
                            match ControlCommand::parse_line(&line) {
                                Some(cmd) => {
                                    tracing::info!(command = %cmd, "control command received");
                                    cmd.apply(&manager);
                                }
                                None => tracing::debug!("ignoring control line {:?}", line),
                            }
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    })
}

/// Sends one command line to the control socket. Returns false (and sends
/// nothing) if no run is listening.
pub async fn send_command(socket_path: &Path, command: ControlCommand) -> Result<bool> {
    if !socket_path.exists() {
        return Ok(false);
    }
    let mut stream = match tokio::net::UnixStream::connect(socket_path).await {
        Ok(stream) => stream,
        // left behind by a run that did not shut down cleanly
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    let msg = format!("{}\n", command);
    stream.write_all(msg.as_bytes()).await?;
    Ok(true)
}
