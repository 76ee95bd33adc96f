//! Channel between the pipeline worker and the presentation shell.
//!
//! The shell's rendering surface is only mutable from its own context, so
//! the pipeline never touches it directly. Every status line, control-state
//! change and "open this URL" request is posted as a [`ShellEvent`] on an
//! unbounded Tokio channel; the shell drains the [`ShellReceiver`] on its own
//! schedule.
//!
//! Sending is fire-and-forget: it never blocks and never fails the pipeline.
//! If the shell has gone away the event is dropped and logged at `debug`.
//!
//! # Example
//!
//! ```rust
//! use autoslides::progress::{channel, ShellEvent, StatusMessage};
//!
//! let (tx, mut rx) = channel();
//! tx.status(StatusMessage::info("ready"));
//! match rx.try_recv() {
//!     Ok(ShellEvent::Status(s)) => assert_eq!(s.text, "ready"),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::debug;

/// One line for the shell's status bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub text: String,
    /// Render with the error treatment.
    pub is_error: bool,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// Which input affordances the shell should offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlState {
    /// "Generate" may be pressed.
    pub generate_enabled: bool,
    /// A new file may be chosen (browse / drop).
    pub browse_enabled: bool,
    /// A run is in flight; shells typically relabel the generate button.
    pub busy: bool,
}

impl ControlState {
    /// While a run is active nothing can be pressed.
    pub const BUSY: ControlState = ControlState {
        generate_enabled: false,
        browse_enabled: false,
        busy: true,
    };

    /// File chosen, ready to generate.
    pub const READY: ControlState = ControlState {
        generate_enabled: true,
        browse_enabled: true,
        busy: false,
    };

    /// Nothing selected; generate stays locked until a file is chosen.
    pub const AWAITING_FILE: ControlState = ControlState {
        generate_enabled: false,
        browse_enabled: true,
        busy: false,
    };
}

/// Everything the pipeline can ask of the shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ShellEvent {
    /// Numbered progress emitted just before a stage begins.
    Stage {
        /// 1-indexed stage number.
        index: usize,
        total: usize,
        status: StatusMessage,
    },
    /// Any other status line: selection feedback, final success or failure.
    Status(StatusMessage),
    Controls(ControlState),
    /// The selected document changed (`None` = selection cleared).
    Selection(Option<PathBuf>),
    /// A deck was created; the shell should open it externally.
    OpenResult(String),
}

impl ShellEvent {
    /// The status line carried by this event, if any.
    pub fn status(&self) -> Option<&StatusMessage> {
        match self {
            ShellEvent::Stage { status, .. } | ShellEvent::Status(status) => Some(status),
            _ => None,
        }
    }
}

/// Sending half held by the pipeline.
#[derive(Debug, Clone)]
pub struct ShellSender {
    tx: mpsc::UnboundedSender<ShellEvent>,
}

/// Receiving half drained by the shell.
pub type ShellReceiver = mpsc::UnboundedReceiver<ShellEvent>;

/// Create a connected sender/receiver pair.
pub fn channel() -> (ShellSender, ShellReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ShellSender { tx }, rx)
}

impl ShellSender {
    pub fn send(&self, event: ShellEvent) {
        if let Err(e) = self.tx.send(event) {
            debug!("shell receiver gone, dropping event: {:?}", e.0);
        }
    }

    pub fn stage(&self, index: usize, total: usize, text: impl Into<String>) {
        self.send(ShellEvent::Stage {
            index,
            total,
            status: StatusMessage::info(text),
        });
    }

    pub fn status(&self, status: StatusMessage) {
        self.send(ShellEvent::Status(status));
    }

    pub fn controls(&self, state: ControlState) {
        self.send(ShellEvent::Controls(state));
    }
}
