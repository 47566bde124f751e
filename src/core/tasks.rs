//! The to-do list kept alongside the catalog.

use super::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskList {
    tasks: Vec<TaskItem>,
}

impl TaskList {
    pub fn new(tasks: Vec<TaskItem>) -> Self {
        Self { tasks }
    }

    pub fn as_slice(&self) -> &[TaskItem] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }

    pub fn add(&mut self, text: &str) -> Result<&TaskItem> {
        if text.trim().is_empty() {
            return Err(CoreError::EmptyName);
        }
        self.tasks.push(TaskItem {
            id: Uuid::new_v4(),
            text: text.to_string(),
            completed: false,
        });
        Ok(&self.tasks[self.tasks.len() - 1])
    }

    pub fn set_completed(&mut self, id: Uuid, completed: bool) -> Result<()> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(CoreError::UnknownId(id))?;
        task.completed = completed;
        Ok(())
    }

    pub fn remove(&mut self, id: Uuid) -> Result<TaskItem> {
        let idx = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(CoreError::UnknownId(id))?;
        Ok(self.tasks.remove(idx))
    }

    pub fn replace_all(&mut self, tasks: Vec<TaskItem>) {
        self.tasks = tasks;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_lifecycle() {
        let mut tasks = TaskList::default();
        assert!(matches!(tasks.add("  "), Err(CoreError::EmptyName)));

        let first = tasks.add("Clean desktop").unwrap().id;
        tasks.add("Back up photos").unwrap();
        tasks.set_completed(first, true).unwrap();
        assert_eq!(tasks.completed_count(), 1);
        assert_eq!(tasks.len(), 2);

        assert_eq!(tasks.remove(first).unwrap().text, "Clean desktop");
        assert!(matches!(
            tasks.set_completed(first, false),
            Err(CoreError::UnknownId(_))
        ));
        assert_eq!(tasks.completed_count(), 0);
    }
}
