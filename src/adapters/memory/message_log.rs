use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Message;
use crate::domain::ports::MessageLog;

#[derive(Debug, Clone)]
struct Entry {
    message: Message,
    delivered: bool,
}

/// Message log kept in memory, one append-only vector per workflow.
#[derive(Debug, Default)]
pub struct InMemoryMessageLog {
    entries: Mutex<HashMap<Uuid, Vec<Entry>>>,
}

impl InMemoryMessageLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageLog for InMemoryMessageLog {
    async fn append(&self, message: &Message) -> DomainResult<()> {
        self.entries
            .lock()
            .await
            .entry(message.workflow_id)
            .or_default()
            .push(Entry {
                message: message.clone(),
                delivered: false,
            });
        Ok(())
    }

    async fn drain(&self, workflow_id: Uuid, to_task: &str) -> DomainResult<Vec<Message>> {
        let mut entries = self.entries.lock().await;
        let Some(log) = entries.get_mut(&workflow_id) else {
            return Ok(Vec::new());
        };

        let mut drained = Vec::new();
        for entry in log
            .iter_mut()
            .filter(|e| !e.delivered && e.message.to_task == to_task)
        {
            entry.delivered = true;
            drained.push(entry.message.clone());
        }
        Ok(drained)
    }

    async fn list(&self, workflow_id: Uuid) -> DomainResult<Vec<Message>> {
        Ok(self
            .entries
            .lock()
            .await
            .get(&workflow_id)
            .map(|log| log.iter().map(|e| e.message.clone()).collect())
            .unwrap_or_default())
    }
}
