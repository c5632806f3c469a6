#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;

use tareas_core::api::{TaskApi, parse_task_list};
use tareas_core::error::{ClientError, ClientResult};
use tareas_core::task::{Status, Task, TaskInput};

pub fn task(id: u64, title: &str, description: &str) -> Task {
    Task {
        id,
        title: title.to_string(),
        description: description.to_string(),
        due: None,
        status: Status::Pending,
    }
}

fn server_error(url: &str) -> ClientError {
    ClientError::Status {
        url: url.to_string(),
        status: 500,
    }
}

/// In-memory stand-in for the task API.
#[derive(Debug, Default)]
pub struct FakeApi {
    tasks: RefCell<Vec<Task>>,
    next_id: Cell<u64>,
    pub fail_fetch: bool,
    pub fail_writes: bool,
    pub failing_deletes: BTreeSet<u64>,
    pub delete_calls: RefCell<Vec<u64>>,
}

impl FakeApi {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let next = tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        Self {
            tasks: RefCell::new(tasks),
            next_id: Cell::new(next),
            ..Self::default()
        }
    }

    /// Serves tasks decoded from a raw list payload, the way the HTTP
    /// client decodes one.
    pub fn from_payload(body: &str) -> Self {
        Self::with_tasks(parse_task_list(body).expect("payload is a JSON array"))
    }

    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn failing_delete_of(mut self, id: u64) -> Self {
        self.failing_deletes.insert(id);
        self
    }

    pub fn remote_ids(&self) -> Vec<u64> {
        self.tasks.borrow().iter().map(|t| t.id).collect()
    }
}

impl TaskApi for FakeApi {
    async fn fetch_all(&self) -> ClientResult<Vec<Task>> {
        if self.fail_fetch {
            return Err(server_error("/gestion_de_tareas/"));
        }
        Ok(self.tasks.borrow().clone())
    }

    async fn fetch_one(&self, id: u64) -> ClientResult<Task> {
        self.tasks
            .borrow()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| ClientError::Status {
                url: format!("/gestion_de_tareas/{id}/"),
                status: 404,
            })
    }

    async fn create(&self, input: &TaskInput) -> ClientResult<Task> {
        if self.fail_writes {
            return Err(server_error("/gestion_de_tareas/"));
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let created = Task {
            id,
            title: input.title.clone(),
            description: input.description.clone(),
            due: input.due,
            status: input.status,
        };
        self.tasks.borrow_mut().push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: u64, input: &TaskInput) -> ClientResult<Task> {
        if self.fail_writes {
            return Err(server_error(&format!("/gestion_de_tareas/{id}/")));
        }
        let mut tasks = self.tasks.borrow_mut();
        let existing = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| server_error(&format!("/gestion_de_tareas/{id}/")))?;
        existing.title = input.title.clone();
        existing.description = input.description.clone();
        existing.due = input.due;
        existing.status = input.status;
        Ok(existing.clone())
    }

    async fn delete(&self, id: u64) -> ClientResult<()> {
        self.delete_calls.borrow_mut().push(id);
        if self.failing_deletes.contains(&id) {
            return Err(server_error(&format!("/gestion_de_tareas/{id}/")));
        }
        self.tasks.borrow_mut().retain(|t| t.id != id);
        Ok(())
    }
}
