//! Implementation of the `conductor message` commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::cli::app;
use crate::cli::output::{colorize_priority, output, table, truncate, CommandOutput};
use crate::domain::models::{Config, Message, MessageType, Priority};

#[derive(Args, Debug)]
pub struct MessageArgs {
    #[command(subcommand)]
    pub command: MessageCommands,
}

#[derive(Subcommand, Debug)]
pub enum MessageCommands {
    /// Send a message to a task of a recorded workflow
    Send {
        /// Sending task name
        #[arg(long)]
        from: String,

        /// Receiving task name
        #[arg(long)]
        to: String,

        /// data-request, validation-feedback, status-update or error-report
        #[arg(long = "type", value_parser = parse_message_type)]
        message_type: MessageType,

        /// JSON payload
        #[arg(long, default_value = "{}")]
        payload: String,

        /// Message priority (defaults to medium)
        #[arg(long, value_parser = parse_priority)]
        priority: Option<Priority>,

        /// Workflow ID (latest workflow if omitted)
        #[arg(short, long)]
        workflow: Option<Uuid>,
    },
    /// List every message of a workflow
    List {
        /// Workflow ID (latest workflow if omitted)
        #[arg(short, long)]
        workflow: Option<Uuid>,
    },
}

pub fn parse_message_type(s: &str) -> Result<MessageType, String> {
    MessageType::from_str(s).ok_or_else(|| format!("unknown message type '{s}'"))
}

pub fn parse_priority(s: &str) -> Result<Priority, String> {
    Priority::from_str(s).ok_or_else(|| format!("unknown priority '{s}'"))
}

#[derive(Debug, serde::Serialize)]
pub struct MessageSentOutput {
    message_id: Uuid,
    to_task: String,
}

impl CommandOutput for MessageSentOutput {
    fn to_human(&self) -> String {
        format!("Message {} queued for '{}'", self.message_id, self.to_task)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct MessageListOutput {
    messages: Vec<Message>,
}

impl CommandOutput for MessageListOutput {
    fn to_human(&self) -> String {
        if self.messages.is_empty() {
            return "No messages.".to_string();
        }

        let mut t = table(["From", "To", "Type", "Priority", "Payload", "Sent"]);
        for m in &self.messages {
            t.add_row(vec![
                m.from_task.clone(),
                m.to_task.clone(),
                m.message_type.to_string(),
                colorize_priority(m.priority.as_str()).to_string(),
                truncate(&m.payload.to_string(), 48),
                m.created_at.format("%H:%M:%S%.3f").to_string(),
            ]);
        }
        t.to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: MessageArgs, config: &Config, json_mode: bool) -> Result<()> {
    let orchestrator = app::build_orchestrator(config, false).await?;
    match args.command {
        MessageCommands::Send {
            from,
            to,
            message_type,
            payload,
            priority,
            workflow,
        } => {
            let payload: serde_json::Value =
                serde_json::from_str(&payload).context("Payload must be valid JSON")?;
            let message_id = orchestrator
                .communicate(workflow, &from, &to, message_type, payload, priority)
                .await?;
            output(&MessageSentOutput { message_id, to_task: to }, json_mode);
        }
        MessageCommands::List { workflow } => {
            let messages = orchestrator.messages(workflow).await?;
            output(&MessageListOutput { messages }, json_mode);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_parsers() {
        assert_eq!(
            parse_message_type("validation-feedback"),
            Ok(MessageType::ValidationFeedback)
        );
        assert!(parse_message_type("gossip").is_err());
        assert_eq!(parse_priority("critical"), Ok(Priority::Critical));
        assert!(parse_priority("urgent").is_err());
    }

    #[test]
    fn test_list_output() {
        let message = Message::new(
            Uuid::new_v4(),
            "compliance-check",
            "content-generation",
            MessageType::ValidationFeedback,
            serde_json::json!({"fix": "tone"}),
        );
        let out = MessageListOutput {
            messages: vec![message],
        };
        assert!(out.to_human().contains("validation-feedback"));
        assert_eq!(out.to_json()["messages"][0]["to_task"], "content-generation");
    }
}
