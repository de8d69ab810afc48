//! Persists every dispatched task's status transitions, so `/api/results/{id}`
//! and `/api/workflow/{id}/status` survive a server restart even though the
//! task backend itself may not.

use crate::db::Database;
use crate::error::EngineError;
use crate::model::{TaskRecord, TaskStatus};

#[derive(Clone)]
pub struct TaskStore {
    db: Database,
}

impl TaskStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn insert_pending(
        &self,
        task_id: &str,
        workflow_id: &str,
        step_name: &str,
        pipeline_key: &str,
        queue: &str,
    ) -> Result<(), EngineError> {
        let task_id = task_id.to_string();
        let workflow_id = workflow_id.to_string();
        let step_name = step_name.to_string();
        let pipeline_key = pipeline_key.to_string();
        let queue = queue.to_string();
        let now = chrono::Utc::now().timestamp_millis();

        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO tasks (task_id, workflow_id, step_name, pipeline_key, queue, status, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, 'PENDING', ?6, ?6)
                     ON CONFLICT(task_id) DO NOTHING",
                    rusqlite::params![task_id, workflow_id, step_name, pipeline_key, queue, now],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        result_json: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<(), EngineError> {
        let task_id = task_id.to_string();
        let status_str = status.as_str().to_string();
        let result_text = result_json.map(|v| v.to_string());
        let now = chrono::Utc::now().timestamp_millis();

        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "UPDATE tasks SET status = ?1, result_json = ?2, error = ?3, updated_at = ?4 WHERE task_id = ?5",
                    rusqlite::params![status_str, result_text, error, now, task_id],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn increment_attempt(&self, task_id: &str) -> Result<u32, EngineError> {
        let task_id = task_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "UPDATE tasks SET attempt = attempt + 1 WHERE task_id = ?1",
                    rusqlite::params![task_id],
                )?;
                conn.query_row(
                    "SELECT attempt FROM tasks WHERE task_id = ?1",
                    rusqlite::params![task_id],
                    |row| row.get::<_, i64>(0),
                )
                .map(|v| v as u32)
            })
            .await
    }

    pub async fn get(&self, task_id: &str) -> Result<Option<TaskRecord>, EngineError> {
        let task_id = task_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    "SELECT task_id, workflow_id, step_name, pipeline_key, queue, status FROM tasks WHERE task_id = ?1",
                    rusqlite::params![task_id],
                    row_to_record,
                )
                .map(Some)
                .or_else(|e| {
                    if matches!(e, rusqlite::Error::QueryReturnedNoRows) {
                        Ok(None)
                    } else {
                        Err(e)
                    }
                })
            })
            .await
    }

    pub async fn list_by_workflow(&self, workflow_id: &str) -> Result<Vec<TaskRecord>, EngineError> {
        let workflow_id = workflow_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT task_id, workflow_id, step_name, pipeline_key, queue, status
                     FROM tasks WHERE workflow_id = ?1 ORDER BY created_at ASC",
                )?;
                let rows = stmt.query_map(rusqlite::params![workflow_id], row_to_record)?;
                rows.collect()
            })
            .await
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<TaskRecord> {
    let status_str: String = row.get(5)?;
    let status = match status_str.as_str() {
        "PENDING" => TaskStatus::Pending,
        "RUNNING" => TaskStatus::Running,
        "SUCCESS" => TaskStatus::Success,
        "FAILED" => TaskStatus::Failed,
        _ => TaskStatus::TimedOut,
    };
    Ok(TaskRecord {
        task_id: row.get(0)?,
        workflow_id: row.get(1)?,
        step_name: row.get(2)?,
        pipeline_key: row.get(3)?,
        queue: row.get(4)?,
        status,
    })
}
