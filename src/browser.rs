//! Opening URLs in the user's default browser.
//!
//! Used twice: for the OAuth consent screen and for the finished deck. Both
//! go through [`UrlOpener`] so tests and headless hosts can swap in their
//! own behaviour.

use std::io;
use std::process::{Command, Stdio};
use std::thread;
use tracing::{debug, warn};

/// Something that can show a URL to the user.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> io::Result<()>;
}

/// Launches the platform's default browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl UrlOpener for SystemBrowser {
    fn open(&self, url: &str) -> io::Result<()> {
        debug!("Opening in browser: {}", url);
        spawn_detached(launcher(url))
    }
}

/// Start `cmd` without waiting for it. The child is reaped on a helper
/// thread; callers may be on an async runtime worker.
fn spawn_detached(mut cmd: Command) -> io::Result<()> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    thread::spawn(move || match child.wait() {
        Ok(status) if !status.success() => warn!("Browser launcher exited with {}", status),
        Ok(_) => {}
        Err(e) => debug!("Could not reap browser launcher: {}", e),
    });
    Ok(())
}

#[cfg(target_os = "macos")]
fn launcher(url: &str) -> Command {
    let mut cmd = Command::new("open");
    cmd.arg(url);
    cmd
}

#[cfg(target_os = "windows")]
fn launcher(url: &str) -> Command {
    // The empty string is the window title `start` expects first.
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", "start", ""]).arg(url);
    cmd
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn launcher(url: &str) -> Command {
    let mut cmd = Command::new("xdg-open");
    cmd.arg(url);
    cmd
}

/// Does nothing; for hosts that print the URL instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBrowser;

impl UrlOpener for NoBrowser {
    fn open(&self, _url: &str) -> io::Result<()> {
        Ok(())
    }
}
