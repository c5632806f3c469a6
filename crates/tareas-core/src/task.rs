use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::datetime::due_date_serde;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "en_progreso")]
    InProgress,
    #[serde(rename = "completada")]
    Completed,
}

impl Status {
    /// Accepts the wire spellings, including `en progreso` with a space,
    /// in any ASCII case, plus the English names used on the command line.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "pendiente" | "pending" => Some(Self::Pending),
            "en_progreso" | "in_progress" => Some(Self::InProgress),
            "completada" | "completed" | "done" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Pending => "pendiente",
            Self::InProgress => "en_progreso",
            Self::Completed => "completada",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In progress",
            Self::Completed => "Completed",
        }
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| anyhow!("unknown task status: {s}"))
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown task status: {raw}")))
    }
}

/// A task as owned by the remote API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: u64,

    #[serde(rename = "titulo")]
    pub title: String,

    #[serde(rename = "descripcion", default, deserialize_with = "null_as_empty")]
    pub description: String,

    #[serde(rename = "fecha_limite", default, with = "due_date_serde")]
    pub due: Option<NaiveDate>,

    #[serde(rename = "estado", default)]
    pub status: Status,
}

impl Task {
    /// `needle` must already be lowercased.
    pub fn matches_text(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }
}

/// Request body for create and update calls.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaskInput {
    #[serde(rename = "titulo")]
    pub title: String,

    #[serde(rename = "descripcion")]
    pub description: String,

    #[serde(rename = "fecha_limite", with = "due_date_serde")]
    pub due: Option<NaiveDate>,

    #[serde(rename = "estado")]
    pub status: Status,
}

/// A task plus the flags that only live in local storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayTask {
    pub task: Task,
    pub favorite: bool,
    pub trashed: bool,
}

impl DisplayTask {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            favorite: false,
            trashed: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.task.id
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
