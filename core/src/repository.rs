//! The Task Repository (C7): persists task records and transitions status
//! atomically. Every function is generic over `sqlx::Executor` so it can
//! run against a bare pool or inside an explicit transaction, following the
//! teacher's `services/db.rs` generic-executor convention.

use chrono::Utc;
use sqlx::{Executor, Postgres};

use crate::domain::{Finished, Task, TaskStatus};
use crate::error::{CoreError, CoreResult};

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: i64,
    source_file: String,
    source_size: i64,
    output_file: Option<String>,
    output_size: Option<i64>,
    status: String,
    error_message: Option<String>,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = CoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<TaskStatus>()
            .map_err(|_| CoreError::Decode(format!("invalid task status {}", row.status)))?;
        Ok(Task {
            id: row.id,
            source_file: row.source_file,
            source_size: row.source_size,
            output_file: row.output_file,
            output_size: row.output_size,
            status,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Inserts a new task with status `PENDING` (spec §4.7).
pub async fn create<'e, E>(executor: E, source_file: &str, source_size: i64) -> CoreResult<Task>
where
    E: Executor<'e, Database = Postgres>,
{
    let row: TaskRow = sqlx::query_as(
        r#"
        INSERT INTO tasks (source_file, source_size, status, created_at, updated_at)
        VALUES ($1, $2, 'pending', now(), now())
        RETURNING id, source_file, source_size, output_file, output_size, status, error_message, created_at, updated_at
        "#,
    )
    .bind(source_file)
    .bind(source_size)
    .fetch_one(executor)
    .await?;
    row.try_into()
}

/// Atomic compare-and-set from `{PENDING, PROCESSING}` to `PROCESSING`.
/// Returns `Finished` if the task is already terminal — both the Analyze
/// and Transcode handlers begin with this, giving idempotent recovery
/// under at-least-once broker redelivery (spec §4.8, §8 property 2).
pub async fn claim<'e, E>(executor: E, task_id: i64) -> CoreResult<Result<Task, Finished>>
where
    E: Executor<'e, Database = Postgres>,
{
    let row: Option<TaskRow> = sqlx::query_as(
        r#"
        UPDATE tasks
        SET status = 'processing', updated_at = now()
        WHERE id = $1 AND status IN ('pending', 'processing')
        RETURNING id, source_file, source_size, output_file, output_size, status, error_message, created_at, updated_at
        "#,
    )
    .bind(task_id)
    .fetch_optional(executor)
    .await?;

    match row {
        Some(row) => Ok(Ok(row.try_into()?)),
        None => Ok(Err(Finished)),
    }
}

/// CAS from `PROCESSING` to `COMPLETED`.
pub async fn mark_completed<'e, E>(executor: E, task_id: i64, output_file: &str, output_size: i64) -> CoreResult<()>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        UPDATE tasks
        SET status = 'completed', output_file = $2, output_size = $3, updated_at = now()
        WHERE id = $1 AND status = 'processing'
        "#,
    )
    .bind(task_id)
    .bind(output_file)
    .bind(output_size)
    .execute(executor)
    .await?;
    Ok(())
}

/// CAS from `PROCESSING` to `FAILED`.
pub async fn mark_failed<'e, E>(executor: E, task_id: i64, error_message: &str) -> CoreResult<()>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        UPDATE tasks
        SET status = 'failed', error_message = $2, updated_at = now()
        WHERE id = $1 AND status = 'processing'
        "#,
    )
    .bind(task_id)
    .bind(error_message)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn get<'e, E>(executor: E, task_id: i64) -> CoreResult<Task>
where
    E: Executor<'e, Database = Postgres>,
{
    let row: Option<TaskRow> = sqlx::query_as(
        r#"
        SELECT id, source_file, source_size, output_file, output_size, status, error_message, created_at, updated_at
        FROM tasks WHERE id = $1
        "#,
    )
    .bind(task_id)
    .fetch_optional(executor)
    .await?;
    row.ok_or(CoreError::TaskNotFound(task_id))?.try_into()
}

pub struct Page {
    pub tasks: Vec<Task>,
    pub total: i64,
}

/// Paginated list ordered by `created_at DESC`, optionally filtered by
/// status. Uses a `COUNT(*) OVER()` window function so the page and the
/// total arrive in one round trip, following the teacher's
/// `browse_captures_with_count` pattern.
pub async fn list<'e, E>(executor: E, statuses: Option<&[TaskStatus]>, limit: i64, offset: i64) -> CoreResult<Page>
where
    E: Executor<'e, Database = Postgres>,
{
    let status_strs: Option<Vec<&'static str>> = statuses.map(|s| s.iter().map(|s| s.as_str()).collect());

    #[derive(sqlx::FromRow)]
    struct CountedRow {
        #[sqlx(flatten)]
        task: TaskRow,
        total: i64,
    }

    let rows: Vec<CountedRow> = sqlx::query_as(
        r#"
        SELECT id, source_file, source_size, output_file, output_size, status, error_message, created_at, updated_at,
               COUNT(*) OVER() AS total
        FROM tasks
        WHERE ($1::text[] IS NULL OR status = ANY($1))
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(status_strs)
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await?;

    let total = rows.first().map(|r| r.total).unwrap_or(0);
    let tasks = rows.into_iter().map(|r| r.task.try_into()).collect::<Result<_, _>>()?;
    Ok(Page { tasks, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    #[test]
    fn task_status_round_trips_through_storage_string() {
        for s in [TaskStatus::Pending, TaskStatus::Processing, TaskStatus::Completed, TaskStatus::Failed] {
            let parsed: TaskStatus = s.as_str().parse().unwrap();
            assert_eq!(parsed.as_str(), s.as_str());
        }
    }

    #[sqlx::test(migrations = "../api/migrations")]
    async fn create_inserts_pending_task(pool: PgPool) -> sqlx::Result<()> {
        let task = create(&pool, "source/abc.mp4", 1024).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.output_file.is_none());
        Ok(())
    }

    #[sqlx::test(migrations = "../api/migrations")]
    async fn claim_transitions_pending_to_processing_and_is_idempotent(pool: PgPool) -> sqlx::Result<()> {
        let task = create(&pool, "source/abc.mp4", 1024).await.unwrap();

        let claimed = claim(&pool, task.id).await.unwrap().expect("first claim succeeds");
        assert_eq!(claimed.status, TaskStatus::Processing);

        // re-entry after crash/redelivery: PROCESSING -> PROCESSING is idempotent.
        let reclaimed = claim(&pool, task.id).await.unwrap().expect("re-claim succeeds");
        assert_eq!(reclaimed.status, TaskStatus::Processing);
        Ok(())
    }

    #[sqlx::test(migrations = "../api/migrations")]
    async fn claim_on_terminal_task_returns_finished(pool: PgPool) -> sqlx::Result<()> {
        let task = create(&pool, "source/abc.mp4", 1024).await.unwrap();
        claim(&pool, task.id).await.unwrap().unwrap();
        mark_completed(&pool, task.id, "encoded/abc.mp4", 2048).await.unwrap();

        let result = claim(&pool, task.id).await.unwrap();
        assert!(result.is_err(), "claiming a COMPLETED task must yield Finished");
        Ok(())
    }

    #[sqlx::test(migrations = "../api/migrations")]
    async fn mark_completed_requires_prior_processing(pool: PgPool) -> sqlx::Result<()> {
        let task = create(&pool, "source/abc.mp4", 1024).await.unwrap();
        // No claim() first: the CAS targets status = 'processing', so this is a no-op.
        mark_completed(&pool, task.id, "encoded/abc.mp4", 2048).await.unwrap();

        let reloaded = get(&pool, task.id).await.unwrap();
        assert_eq!(reloaded.status, TaskStatus::Pending);
        assert!(reloaded.output_file.is_none());
        Ok(())
    }

    #[sqlx::test(migrations = "../api/migrations")]
    async fn mark_failed_sets_error_message(pool: PgPool) -> sqlx::Result<()> {
        let task = create(&pool, "source/abc.mp4", 1024).await.unwrap();
        claim(&pool, task.id).await.unwrap().unwrap();
        mark_failed(&pool, task.id, "decode error: truncated file").await.unwrap();

        let reloaded = get(&pool, task.id).await.unwrap();
        assert_eq!(reloaded.status, TaskStatus::Failed);
        assert_eq!(reloaded.error_message.as_deref(), Some("decode error: truncated file"));
        Ok(())
    }

    #[sqlx::test(migrations = "../api/migrations")]
    async fn list_orders_by_created_at_desc_and_filters_by_status(pool: PgPool) -> sqlx::Result<()> {
        let first = create(&pool, "source/a.mp4", 1).await.unwrap();
        let second = create(&pool, "source/b.mp4", 1).await.unwrap();
        claim(&pool, second.id).await.unwrap().unwrap();
        mark_failed(&pool, second.id, "boom").await.unwrap();

        let all = list(&pool, None, 10, 0).await.unwrap();
        assert_eq!(all.total, 2);
        assert_eq!(all.tasks[0].id, second.id, "created_at DESC puts the newer row first");
        assert_eq!(all.tasks[1].id, first.id);

        let failed_only = list(&pool, Some(&[TaskStatus::Failed]), 10, 0).await.unwrap();
        assert_eq!(failed_only.total, 1);
        assert_eq!(failed_only.tasks[0].id, second.id);
        Ok(())
    }
}
