//! `hashsync pause|resume|stop` – signal the active run via its control socket.

use anyhow::Result;
use hashsync_core::control::{default_control_socket_path, ControlCommand};

use crate::cli::control_socket;

pub async fn run_control(command: ControlCommand) -> Result<()> {
    let path = default_control_socket_path()?;
    if control_socket::send_command(&path, command).await? {
        println!("Sent {command} to the active run");
    } else {
        println!("No active run");
    }
    Ok(())
}
