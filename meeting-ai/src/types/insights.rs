//! Types for insight extraction.

use serde::{Deserialize, Serialize};

use crate::Error;

/// A task assigned during the meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    pub task: String,
    pub owner: Option<String>,
    pub due_date: Option<String>,
}

/// Structured insights extracted from one transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insights {
    pub summary: String,
    pub decisions: Vec<String>,
    pub action_items: Vec<ActionItem>,
    pub open_questions: Vec<String>,
    pub topics: Vec<String>,
}

impl Insights {
    /// Checks the shape a stored record must have.
    ///
    /// A failure here means the provider answered with content that cannot be persisted.
    pub fn validate(&self) -> Result<(), Error> {
        if self.summary.trim().is_empty() {
            return Err(Error::MalformedResponse("summary is empty".to_string()));
        }

        if let Some(position) = self
            .action_items
            .iter()
            .position(|item| item.task.trim().is_empty())
        {
            return Err(Error::MalformedResponse(format!(
                "action item {} has no task",
                position + 1
            )));
        }

        Ok(())
    }
}

/// Input to a single extraction call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub transcript: String,
    /// Meeting title given to the model as context
    pub title: Option<String>,
}

/// Provider accounting for one extraction call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub model: String,
    pub tokens_used: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub insights: Insights,
    pub usage: Usage,
}
