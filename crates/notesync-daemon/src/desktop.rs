//! Desktop notifications through `notify-send`.

use notesync_core::Notifier;
use std::process::{Command, Stdio};
use std::thread;

const APP_NAME: &str = "notesync";

/// Shows each message as a desktop notification. Fire-and-forget: a missing
/// `notify-send` or a failing notification daemon is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, message: &str) {
        let message = message.to_string();
        // Own thread so the event loop never waits on the notification daemon
        thread::spawn(move || {
            let _ = Command::new("notify-send")
                .args(["-a", APP_NAME, &message])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
        });
    }
}
