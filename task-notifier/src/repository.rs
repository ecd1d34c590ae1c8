//! Task data consumed by the scheduler.
//!
//! Task storage lives outside this crate; the engine only needs to read
//! due dates and owners, and to look up a user's email address.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::Result;

/// The subset of a task the engine reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub due_date: Option<DateTime<Utc>>,
    pub user_id: Option<i64>,
    /// Completed tasks are never reported as overdue.
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            due_date: None,
            user_id: None,
            completed: false,
        }
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn completed(mut self) -> Self {
        self.completed = true;
        self
    }

    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < now)
    }
}

/// Read access to task data.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Tasks whose due date has passed and that are not completed.
    async fn overdue_tasks(&self) -> Result<Vec<Task>>;

    /// Every task.
    async fn all_tasks(&self) -> Result<Vec<Task>>;

    /// Email address of a user, if one is known.
    async fn user_email(&self, user_id: i64) -> Result<Option<String>>;
}

/// In-memory repository used by the daemon's demo mode and tests.
#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<HashMap<i64, Task>>,
    emails: RwLock<HashMap<i64, String>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_task(&self, task: Task) {
        self.tasks.write().insert(task.id, task);
    }

    pub fn set_user_email(&self, user_id: i64, email: impl Into<String>) {
        self.emails.write().insert(user_id, email.into());
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn overdue_tasks(&self) -> Result<Vec<Task>> {
        let now = Utc::now();
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .values()
            .filter(|t| t.is_overdue_at(now))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.id);
        Ok(tasks)
    }

    async fn all_tasks(&self) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self.tasks.read().values().cloned().collect();
        tasks.sort_by_key(|t| t.id);
        Ok(tasks)
    }

    async fn user_email(&self, user_id: i64) -> Result<Option<String>> {
        Ok(self.emails.read().get(&user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_overdue_excludes_completed_and_future() {
        let repo = InMemoryTaskRepository::new();
        let now = Utc::now();
        repo.upsert_task(Task::new(1, "late").with_due_date(now - chrono::Duration::hours(2)));
        repo.upsert_task(
            Task::new(2, "done")
                .with_due_date(now - chrono::Duration::hours(2))
                .completed(),
        );
        repo.upsert_task(Task::new(3, "later").with_due_date(now + chrono::Duration::hours(2)));
        repo.upsert_task(Task::new(4, "no due date"));

        let overdue = repo.overdue_tasks().await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, 1);
        assert_eq!(repo.all_tasks().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_user_email_lookup() {
        let repo = InMemoryTaskRepository::new();
        repo.set_user_email(7, "seven@example.com");

        assert_eq!(
            repo.user_email(7).await.unwrap().as_deref(),
            Some("seven@example.com")
        );
        assert!(repo.user_email(8).await.unwrap().is_none());
    }
}
