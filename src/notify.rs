use std::process::{Command, Stdio};

use crate::error::NotifyError;

/// Host capability for showing an alert to the user. Delivery is best-effort.
pub trait Notifier: Send + Sync {
    /// Whether the host is able to show notifications at all.
    fn available(&self) -> bool;

    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

/// Desktop notifications through the freedesktop `notify-send` helper.
pub struct DesktopNotifier {
    command: String,
    app_name: String,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self {
            command: "notify-send".to_string(),
            app_name: "nudge".to_string(),
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for DesktopNotifier {
    fn available(&self) -> bool {
        Command::new(&self.command)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    /// Launches the helper without waiting for it. Only a failure to start
    /// counts as a delivery error.
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        let mut child = Command::new(&self.command)
            .arg("--app-name")
            .arg(&self.app_name)
            .arg(title)
            .arg(body)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    NotifyError::Unavailable
                }
                _ => NotifyError::Failed(e.to_string()),
            })?;

        // Reaped off-thread; the caller never waits on the daemon
        let command = self.command.clone();
        std::thread::spawn(move || match child.wait() {
            Ok(status) if !status.success() => {
                log::debug!("{} exited with {}", command, status);
            }
            Err(e) => log::debug!("Failed to wait for {}: {}", command, e),
            Ok(_) => {}
        });
        Ok(())
    }
}

/// Writes reminders to the log instead of the desktop.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn available(&self) -> bool {
        true
    }

    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        log::info!("{}: {}", title, body.replace('\n', " | "));
        Ok(())
    }
}
