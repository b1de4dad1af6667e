//! Companion keepalive script supervision.
//!
//! The script nudges the desktop session so the machine never locks or
//! sleeps while a meeting is running. It is started at most once; a
//! `pgrep` check makes repeated session inits harmless.

use crate::config::KeepaliveConfig;
use std::process::{Command, Stdio};
use tracing::{info, warn};

/// Start the keepalive script unless an instance is already running.
pub fn ensure_running(config: &KeepaliveConfig) {
    let script = config.script.to_string_lossy().to_string();

    match Command::new("pgrep").args(["-f", &script]).output() {
        Ok(output) if output.status.success() => {
            info!("keepalive script already running");
            return;
        }
        Ok(_) => {}
        Err(e) => {
            warn!("could not check for keepalive script: {}", e);
            return;
        }
    }

    match Command::new("/bin/bash")
        .arg(&config.script)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => info!(pid = child.id(), script = %script, "keepalive script started"),
        Err(e) => warn!(script = %script, "failed to start keepalive script: {}", e),
    }
}
