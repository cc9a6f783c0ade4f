//! Shared utility functions used across the application

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

/// Open a file with the desktop's default handler, without waiting for it
pub fn open_path(path: &Path) -> io::Result<()> {
    opener_command(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

fn opener_command(path: &Path) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        // The empty string is the window title `start` expects first
        cmd.args(["/C", "start", ""]).arg(path);
        cmd
    } else if cfg!(target_os = "macos") {
        let mut cmd = Command::new("open");
        cmd.arg(path);
        cmd
    } else {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(path);
        cmd
    }
}
