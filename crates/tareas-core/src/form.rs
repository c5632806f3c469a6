use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::TaskApi;
use crate::error::ClientError;
use crate::task::{Status, Task, TaskInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit(u64),
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("a submission is already in flight")]
    Busy,
    #[error("{0}")]
    Invalid(String),
    #[error("could not save the task: {0}")]
    Request(#[from] ClientError),
}

/// Create/edit form state. Fields survive a failed submission so the user
/// can retry.
#[derive(Debug, Clone, Default)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub due: Option<NaiveDate>,
    pub status: Status,
    submitting: bool,
    error: Option<String>,
}

impl TaskForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            due: task.due,
            status: task.status,
            ..Self::default()
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Inline message from the last failed submission.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn validate(&self, mode: FormMode) -> Result<TaskInput, FormError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(FormError::Invalid("title is required".to_string()));
        }
        if mode == FormMode::Create && self.description.trim().is_empty() {
            return Err(FormError::Invalid("description is required".to_string()));
        }

        Ok(TaskInput {
            title: title.to_string(),
            description: self.description.trim().to_string(),
            due: self.due,
            status: self.status,
        })
    }

    #[tracing::instrument(skip(self, api))]
    pub async fn submit<A: TaskApi>(&mut self, mode: FormMode, api: &A) -> Result<Task, FormError> {
        if self.submitting {
            return Err(FormError::Busy);
        }

        let input = match self.validate(mode) {
            Ok(input) => input,
            Err(err) => {
                self.error = Some(err.to_string());
                return Err(err);
            }
        };

        self.submitting = true;
        self.error = None;
        let result = match mode {
            FormMode::Create => api.create(&input).await,
            FormMode::Edit(id) => api.update(id, &input).await,
        };
        self.submitting = false;

        match result {
            Ok(task) => {
                info!(id = task.id, "task saved");
                Ok(task)
            }
            Err(err) => {
                warn!(error = %err, "task submission failed");
                let err = FormError::from(err);
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }
}
