//! Run control: pause/resume/stop commands and the control socket path.
//!
//! While `hashsync run` is active, a control client (e.g. `hashsync pause` via
//! socket) sends one command per line; the listener parses it here and applies
//! it to the running [`DownloadManager`].

use std::fmt;
use std::path::PathBuf;

use crate::manager::DownloadManager;

/// A command accepted on the control socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Pause,
    Resume,
    Stop,
}

impl ControlCommand {
    /// Parses one protocol line ("pause", "resume", "stop"). Case and
    /// surrounding whitespace are ignored; anything else is None.
    pub fn parse_line(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "pause" => Some(Self::Pause),
            "resume" => Some(Self::Resume),
            "stop" => Some(Self::Stop),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
        }
    }

    /// Applies the command. Stop cancels workers without waiting for them.
    pub fn apply(self, manager: &DownloadManager) {
        match self {
            Self::Pause => {
                manager.pause();
            }
            Self::Resume => {
                manager.resume();
            }
            Self::Stop => manager.stop(),
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default path for the control socket (same XDG state dir as the log).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("hashsync")?.get_state_home();
    Ok(dir.join("control.sock"))
}
