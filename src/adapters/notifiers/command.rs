//! Notifier that hands each event to an external command, such as a
//! text-to-speech tool.

use std::process::Stdio;
use tokio::process::Command;
use tokio::runtime::Handle;

use crate::domain::ports::{EventNotifier, NotifierError, TaskEvent};

/// Spawns `<command> "<text>"` through `sh -c` for every event and does not
/// wait for it to finish.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    command: String,
    shell: String,
}

impl CommandNotifier {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            shell: "sh".to_string(),
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn event_text(task: &str, event: TaskEvent, message: &str) -> String {
        if message.is_empty() {
            format!("{task} {event}")
        } else {
            format!("{task} {event}: {message}")
        }
    }
}

impl EventNotifier for CommandNotifier {
    fn notify(&self, task: &str, event: TaskEvent, message: &str) -> Result<(), NotifierError> {
        let handle = Handle::try_current()
            .map_err(|e| NotifierError::Unavailable(format!("no async runtime: {e}")))?;
        let _enter = handle.enter();

        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(format!("{} \"$@\"", self.command))
            .arg("conductor-notify")
            .arg(Self::event_text(task, event, message))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| NotifierError::Unavailable(format!("{}: {e}", self.command)))?;

        // Reap in the background so the child never lingers as a zombie.
        handle.spawn(async move {
            let _ = child.wait().await;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_text() {
        assert_eq!(
            CommandNotifier::event_text("delivery", TaskEvent::Failed, "smtp down"),
            "delivery failed: smtp down"
        );
        assert_eq!(
            CommandNotifier::event_text("delivery", TaskEvent::Started, ""),
            "delivery started"
        );
    }

    #[test]
    fn test_without_runtime_is_unavailable() {
        let notifier = CommandNotifier::new("true");
        let result = notifier.notify("a", TaskEvent::Started, "");
        assert!(matches!(result, Err(NotifierError::Unavailable(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_writes_event_text_through_command() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("spoken.txt");
        let notifier = CommandNotifier::new(format!("printf '%s' > {}", out.display()));

        notifier
            .notify("market-research", TaskEvent::Completed, "done")
            .unwrap();

        let mut text = String::new();
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            text = std::fs::read_to_string(&out).unwrap_or_default();
            if !text.is_empty() {
                break;
            }
        }
        assert_eq!(text, "market-research completed: done");
    }

    #[tokio::test]
    async fn test_missing_shell_is_reported() {
        let notifier = CommandNotifier::new("say").with_shell("/nonexistent/shell");
        let result = notifier.notify("a", TaskEvent::Started, "");
        assert!(matches!(result, Err(NotifierError::Unavailable(_))));
    }
}
