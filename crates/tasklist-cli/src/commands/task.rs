//! Task command handlers
//!
//! Each handler loads the task list from the service, issues one intent to
//! the store and renders the result. Input validation (trimming, empty
//! text, id prefixes) happens here before the store is called.

use anyhow::{bail, Context, Result};

use tasklist_core::{Phase, Snapshot, SyncStore, Task, TaskFilter, TaskService};

use crate::output::{short_id, Output};
use crate::prompt::confirm;

/// List tasks
pub async fn list<S: TaskService>(
    store: &SyncStore<S>,
    filter: TaskFilter,
    output: &Output,
) -> Result<()> {
    load(store).await?;
    output.print_snapshot(&store.snapshot(), filter);
    Ok(())
}

/// Create a new task
pub async fn add<S: TaskService>(
    store: &SyncStore<S>,
    words: Vec<String>,
    output: &Output,
) -> Result<()> {
    let text = normalize_text(&words)?;
    load(store).await?;
    let before = store.snapshot();

    let phase = store.create(&text).await;
    ensure_committed(store, phase)?;

    let after = store.snapshot();
    output.success("Task added");
    if let Some(task) = created_task(before.tasks(), after.tasks()) {
        output.print_task(task);
    }
    Ok(())
}

/// Change the text of a task
pub async fn edit<S: TaskService>(
    store: &SyncStore<S>,
    id: String,
    words: Vec<String>,
    output: &Output,
) -> Result<()> {
    let text = normalize_text(&words)?;
    load(store).await?;
    let id = resolve_id(&store.snapshot(), &id)?;

    let phase = store.update(&id, &text).await;
    ensure_committed(store, phase)?;

    output.success("Task updated");
    if let Some(task) = store.snapshot().find(&id) {
        output.print_task(task);
    }
    Ok(())
}

/// Flip a task between active and completed
pub async fn toggle<S: TaskService>(store: &SyncStore<S>, id: String, output: &Output) -> Result<()> {
    load(store).await?;
    let id = resolve_id(&store.snapshot(), &id)?;

    let phase = store.toggle(&id).await;
    ensure_committed(store, phase)?;

    if let Some(task) = store.snapshot().find(&id) {
        let state = if task.completed { "completed" } else { "active" };
        output.success(&format!("Marked {} as {}", short_id(&task.id), state));
        output.print_task(task);
    }
    Ok(())
}

/// Delete a task
pub async fn delete<S: TaskService>(
    store: &SyncStore<S>,
    id: String,
    yes: bool,
    output: &Output,
) -> Result<()> {
    load(store).await?;
    let snapshot = store.snapshot();
    let id = resolve_id(&snapshot, &id)?;

    if !yes && output.should_prompt() {
        if let Some(task) = snapshot.find(&id) {
            println!("Delete task: {} - {}", short_id(&task.id), task.text);
        }
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let phase = store.delete(&id).await;
    ensure_committed(store, phase)?;

    output.success(&format!("Deleted task: {}", id));
    Ok(())
}

/// Mark every active task completed
pub async fn complete_all<S: TaskService>(store: &SyncStore<S>, output: &Output) -> Result<()> {
    load(store).await?;
    let active = store.snapshot().counts().active;
    if active == 0 {
        output.message(TaskFilter::Active.empty_message());
        return Ok(());
    }

    let phase = store.complete_all().await;
    ensure_committed(store, phase)?;

    output.success(&format!("Completed {} task(s)", active));
    Ok(())
}

/// Delete every completed task
pub async fn clear_completed<S: TaskService>(
    store: &SyncStore<S>,
    yes: bool,
    output: &Output,
) -> Result<()> {
    load(store).await?;
    let completed = store.snapshot().counts().completed;
    if completed == 0 {
        output.message(TaskFilter::Completed.empty_message());
        return Ok(());
    }

    if !yes
        && output.should_prompt()
        && !confirm(&format!("Delete {} completed task(s)?", completed))?
    {
        println!("Cancelled.");
        return Ok(());
    }

    let phase = store.delete_completed().await;
    ensure_committed(store, phase)?;

    output.success(&format!("Deleted {} completed task(s)", completed));
    Ok(())
}

/// List completed tasks as reported by the service
pub async fn completed<S: TaskService>(store: &SyncStore<S>, output: &Output) -> Result<()> {
    let tasks = store
        .service()
        .list_completed()
        .await
        .context("Failed to fetch completed tasks")?;

    let refs: Vec<_> = tasks.iter().collect();
    output.print_tasks(&refs, TaskFilter::Completed);
    Ok(())
}

/// Show active/completed tallies
pub async fn stats<S: TaskService>(store: &SyncStore<S>, output: &Output) -> Result<()> {
    load(store).await?;
    output.print_counts(store.snapshot().counts());
    Ok(())
}

/// Rebuild the snapshot from the service
async fn load<S: TaskService>(store: &SyncStore<S>) -> Result<()> {
    let phase = store.load_all().await;
    ensure_committed(store, phase)
}

/// Turn a failed operation into a command error carrying the snapshot's
/// message
fn ensure_committed<S: TaskService>(store: &SyncStore<S>, phase: Phase) -> Result<()> {
    if phase.is_committed() {
        return Ok(());
    }
    let snapshot = store.snapshot();
    bail!("{}", snapshot.error().unwrap_or("Operation failed"));
}

/// The record a create left in the list: new, or replaced in place when
/// the service answered with an id already shown
fn created_task<'a>(before: &[Task], after: &'a [Task]) -> Option<&'a Task> {
    after.iter().find(|task| !before.contains(task))
}

/// Join command-line words into task text
fn normalize_text(words: &[String]) -> Result<String> {
    let text = words.join(" ").trim().to_string();
    if text.is_empty() {
        bail!("Task text cannot be empty");
    }
    Ok(text)
}

/// Resolve a task ID (supports full ID or prefix)
fn resolve_id(snapshot: &Snapshot, id: &str) -> Result<String> {
    if snapshot.find(id).is_some() {
        return Ok(id.to_string());
    }

    let matches: Vec<_> = snapshot
        .tasks()
        .iter()
        .filter(|t| t.id.starts_with(id))
        .collect();

    match matches.len() {
        0 => bail!("No task found matching: {}", id),
        1 => Ok(matches[0].id.clone()),
        _ => {
            eprintln!("Multiple tasks match '{}':", id);
            for task in &matches {
                eprintln!("  {} - {}", task.id, task.text);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use tasklist_core::{InMemoryTaskService, ServiceOp};

    fn quiet() -> Output {
        Output::new(OutputFormat::Quiet)
    }

    async fn seeded(tasks: &[(&str, bool)]) -> SyncStore<InMemoryTaskService> {
        let service = InMemoryTaskService::new();
        for (text, completed) in tasks {
            service.insert(text, *completed).await;
        }
        SyncStore::new(service)
    }

    fn words(text: &str) -> Vec<String> {
        text.split(' ').map(String::from).collect()
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text(&words("Buy milk")).unwrap(), "Buy milk");
        assert_eq!(
            normalize_text(&["  padded ".to_string()]).unwrap(),
            "padded"
        );
        assert!(normalize_text(&["   ".to_string()]).is_err());
        assert!(normalize_text(&[]).is_err());
    }

    #[tokio::test]
    async fn test_resolve_id_by_prefix() {
        let store = seeded(&[("a", false), ("b", false)]).await;
        store.load_all().await;
        let snapshot = store.snapshot();
        let target = snapshot.tasks()[0].id.clone();

        assert_eq!(resolve_id(&snapshot, &target).unwrap(), target);
        // uuid ids are unique well within 8 characters for two tasks
        assert_eq!(resolve_id(&snapshot, &target[..8]).unwrap(), target);
        assert!(resolve_id(&snapshot, "zzzz").is_err());
    }

    #[tokio::test]
    async fn test_resolve_id_ambiguous() {
        let store = seeded(&[("a", false), ("b", false)]).await;
        store.load_all().await;

        assert!(resolve_id(&store.snapshot(), "").is_err());
    }

    #[tokio::test]
    async fn test_add_creates_task() {
        let store = seeded(&[]).await;

        add(&store, words("Buy milk"), &quiet()).await.unwrap();

        let tasks = store.service().tasks().await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].text, "Buy milk");
    }

    #[test]
    fn test_created_task_is_found_by_content_not_position() {
        let task = |id: &str, text: &str| Task {
            id: id.to_string(),
            text: text.to_string(),
            completed: false,
            created_date: chrono::Utc::now(),
            completed_date: None,
        };
        let before = vec![task("1", "a"), task("2", "b"), task("3", "c")];

        // Service answered with an id already in the list
        let mut after = before.clone();
        after[1] = task("2", "new text");
        assert_eq!(created_task(&before, &after).unwrap().text, "new text");

        let mut after = before.clone();
        after.push(task("4", "d"));
        assert_eq!(created_task(&before, &after).unwrap().id, "4");

        assert!(created_task(&before, &before).is_none());
    }

    #[tokio::test]
    async fn test_add_rejects_empty_text_without_remote_call() {
        let store = seeded(&[]).await;

        assert!(add(&store, vec!["  ".to_string()], &quiet()).await.is_err());
        assert_eq!(store.service().call_count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_operation_reports_snapshot_error() {
        let store = seeded(&[]).await;
        store.service().fail(ServiceOp::Create, "quota exceeded").await;

        let err = add(&store, words("x"), &quiet()).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to add task: quota exceeded");
    }

    #[tokio::test]
    async fn test_load_failure_aborts_command() {
        let store = seeded(&[("a", false)]).await;
        store.service().fail(ServiceOp::ListAll, "down").await;

        let err = stats(&store, &quiet()).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to load tasks: down");
    }

    #[tokio::test]
    async fn test_toggle_and_delete_by_prefix() {
        let store = seeded(&[("a", false)]).await;
        let id = store.service().tasks().await[0].id.clone();

        toggle(&store, id[..6].to_string(), &quiet()).await.unwrap();
        assert!(store.service().tasks().await[0].completed);

        delete(&store, id[..6].to_string(), false, &quiet())
            .await
            .unwrap();
        assert!(store.service().tasks().await.is_empty());
    }

    #[tokio::test]
    async fn test_edit_updates_text() {
        let store = seeded(&[("a", false)]).await;
        let id = store.service().tasks().await[0].id.clone();

        edit(&store, id.clone(), words("renamed task"), &quiet())
            .await
            .unwrap();
        assert_eq!(store.service().tasks().await[0].text, "renamed task");
    }

    #[tokio::test]
    async fn test_bulk_commands() {
        let store = seeded(&[("a", false), ("b", true), ("c", false)]).await;

        complete_all(&store, &quiet()).await.unwrap();
        assert!(store.service().tasks().await.iter().all(|t| t.completed));

        clear_completed(&store, false, &quiet()).await.unwrap();
        assert!(store.service().tasks().await.is_empty());

        // Nothing left to do: no bulk calls issued
        let calls = store.service().call_count().await;
        complete_all(&store, &quiet()).await.unwrap();
        clear_completed(&store, true, &quiet()).await.unwrap();
        assert_eq!(store.service().call_count().await, calls + 2);
    }

    #[tokio::test]
    async fn test_clear_completed_failure_is_reported() {
        let store = seeded(&[("a", true), ("b", true)]).await;
        store.service().fail(ServiceOp::Delete, "locked").await;

        let err = clear_completed(&store, true, &quiet()).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to delete completed tasks: locked");
        assert_eq!(store.snapshot().tasks().len(), 2);
    }

    #[tokio::test]
    async fn test_completed_uses_service_listing() {
        let store = seeded(&[("a", false), ("b", true)]).await;

        completed(&store, &quiet()).await.unwrap();
        assert_eq!(
            store.service().calls().await,
            vec!["GET /tasks/completed".to_string()]
        );
    }
}
