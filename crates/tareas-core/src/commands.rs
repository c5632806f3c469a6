use std::io::{self, BufRead, Write};

use anyhow::{Context, anyhow, bail};
use tracing::{debug, info, instrument, warn};

use crate::api::TaskApi;
use crate::bridge::PersistenceBridge;
use crate::cli::{AddArgs, Command, EditArgs, SessionAction, SessionLine};
use crate::datastore::KeyValueStore;
use crate::form::{FormMode, TaskForm};
use crate::render::Renderer;
use crate::session::Session;
use crate::store::TaskStore;
use crate::task::Task;
use crate::theme::{load_theme, toggle_theme};

#[instrument(skip_all)]
pub async fn dispatch<K, A>(
    api: A,
    bridge: PersistenceBridge<K>,
    renderer: &mut Renderer,
    command: Command,
) -> anyhow::Result<()>
where
    K: KeyValueStore,
    A: TaskApi,
{
    debug!(?command, "dispatching command");

    match command {
        Command::List { category, search } => {
            let mut session = Session::open(api, bridge).await;
            session.set_category(category);
            if let Some(term) = search {
                session.search(&term);
            }
            print_view(&session, renderer)
        }
        Command::Show { id } => cmd_show(api, bridge, renderer, id).await,
        Command::Add(args) => {
            submit_form(&api, renderer, new_task_form(args), FormMode::Create).await?;
            Ok(())
        }
        Command::Edit(args) => {
            let current = api
                .fetch_one(args.id)
                .await
                .with_context(|| format!("failed loading task {}", args.id))?;
            let id = args.id;
            submit_form(&api, renderer, edited_form(&current, args), FormMode::Edit(id)).await?;
            Ok(())
        }
        Command::Favorite { id } => {
            let mut session = Session::open(api, bridge).await;
            if !session.toggle_favorite(id)? {
                bail!("task not found: {id}");
            }
            let favorite = session.store().get(id).is_some_and(|record| record.favorite);
            renderer.print_message(&format!(
                "task {id} {}",
                if favorite { "added to favorites" } else { "removed from favorites" }
            ))
        }
        Command::Trash { id } => {
            let mut session = Session::open(api, bridge).await;
            if !session.trash(id)? {
                bail!("task not found: {id}");
            }
            renderer.print_message(&format!("task {id} moved to the trash"))
        }
        Command::Restore { id } => {
            let mut session = Session::open(api, bridge).await;
            if !session.restore(id)? {
                bail!("task not found: {id}");
            }
            renderer.print_message(&format!("task {id} restored"))
        }
        Command::EmptyTrash => {
            let mut session = Session::open(api, bridge).await;
            empty_trash(&mut session, renderer).await
        }
        Command::Delete { id } => {
            let mut session = Session::open(api, bridge).await;
            delete_trashed(&mut session, renderer, id).await
        }
        Command::Theme { toggle } => {
            let mut bridge = bridge;
            let theme = if toggle {
                toggle_theme(&mut bridge)?
            } else {
                load_theme(&bridge)
            };
            renderer.set_theme(theme);
            renderer.print_message(&format!("theme: {}", theme.label()))
        }
        Command::Session => run_session(api, bridge, renderer).await,
    }
}

fn print_view<K, A>(session: &Session<K, A>, renderer: &mut Renderer) -> anyhow::Result<()>
where
    K: KeyValueStore,
    A: TaskApi,
{
    renderer.print_counts(session.counts(), session.category())?;
    if session.view().is_empty() {
        renderer.print_empty_state(session.category(), session.is_searching())
    } else {
        renderer.print_task_table(session.view())
    }
}

#[instrument(skip(api, bridge, renderer))]
async fn cmd_show<K, A>(
    api: A,
    bridge: PersistenceBridge<K>,
    renderer: &mut Renderer,
    id: u64,
) -> anyhow::Result<()>
where
    K: KeyValueStore,
    A: TaskApi,
{
    let task = api
        .fetch_one(id)
        .await
        .with_context(|| format!("failed loading task {id}"))?;
    let store = TaskStore::load(vec![task], bridge);
    let record = store
        .get(id)
        .ok_or_else(|| anyhow!("task not found: {id}"))?;
    renderer.print_task_detail(record)
}

fn new_task_form(args: AddArgs) -> TaskForm {
    let mut form = TaskForm::new();
    form.title = args.title;
    form.description = args.description;
    form.due = args.due;
    form.status = args.status;
    form
}

/// Starts from `current` and overwrites only the fields that were given.
fn edited_form(current: &Task, args: EditArgs) -> TaskForm {
    let mut form = TaskForm::from_task(current);
    if let Some(title) = args.title {
        form.title = title;
    }
    if let Some(description) = args.description {
        form.description = description;
    }
    if args.no_due {
        form.due = None;
    } else if let Some(due) = args.due {
        form.due = Some(due);
    }
    if let Some(status) = args.status {
        form.status = status;
    }
    form
}

#[instrument(skip(api, renderer, form))]
async fn submit_form<A: TaskApi>(
    api: &A,
    renderer: &mut Renderer,
    mut form: TaskForm,
    mode: FormMode,
) -> anyhow::Result<Task> {
    match form.submit(mode, api).await {
        Ok(task) => {
            let verb = match mode {
                FormMode::Create => "created",
                FormMode::Edit(_) => "updated",
            };
            renderer.print_message(&format!("task {} {verb}: {}", task.id, task.title))?;
            Ok(task)
        }
        Err(err) => {
            let message = form.error().unwrap_or("could not save the task").to_string();
            renderer.print_error(&message)?;
            Err(anyhow::Error::new(err))
        }
    }
}

async fn empty_trash<K, A>(session: &mut Session<K, A>, renderer: &mut Renderer) -> anyhow::Result<()>
where
    K: KeyValueStore,
    A: TaskApi,
{
    if session.counts().trash == 0 {
        return renderer.print_message("the trash is already empty");
    }

    let report = session.empty_trash().await?;
    renderer.print_message(&format!("deleted {} task(s)", report.deleted.len()))?;
    if !report.failed.is_empty() {
        let ids: Vec<String> = report.failed.iter().map(u64::to_string).collect();
        renderer.print_error(&format!(
            "could not delete {}; they stay in the trash",
            ids.join(", ")
        ))?;
    }
    Ok(())
}

async fn delete_trashed<K, A>(
    session: &mut Session<K, A>,
    renderer: &mut Renderer,
    id: u64,
) -> anyhow::Result<()>
where
    K: KeyValueStore,
    A: TaskApi,
{
    match session.store().get(id) {
        None => bail!("task not found: {id}"),
        Some(record) if !record.trashed => {
            bail!("task {id} is not in the trash; move it there first")
        }
        Some(_) => {}
    }
    session.delete(id).await?;
    renderer.print_message(&format!("task {id} deleted permanently"))
}

#[instrument(skip_all)]
async fn run_session<K, A>(
    api: A,
    bridge: PersistenceBridge<K>,
    renderer: &mut Renderer,
) -> anyhow::Result<()>
where
    K: KeyValueStore,
    A: TaskApi,
{
    let mut session = Session::open(api, bridge).await;
    info!(tasks = session.store().len(), "session started");
    print_view(&session, renderer)?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("tareas> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let parsed = match SessionLine::parse_line(&line) {
            Ok(parsed) => parsed,
            Err(err) => {
                renderer.print_message(err.to_string().trim_end())?;
                continue;
            }
        };

        match apply_action(&mut session, renderer, parsed.action).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(err) => {
                warn!(error = %err, "session action failed");
                renderer.print_error(&format!("{err:#}"))?;
            }
        }
    }

    info!("session ended");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

async fn apply_action<K, A>(
    session: &mut Session<K, A>,
    renderer: &mut Renderer,
    action: SessionAction,
) -> anyhow::Result<Flow>
where
    K: KeyValueStore,
    A: TaskApi,
{
    match action {
        SessionAction::List => {}
        SessionAction::Search { term } => session.search(&term.join(" ")),
        SessionAction::Clear => session.clear_search(),
        SessionAction::Filter { category } => session.set_category(category),
        SessionAction::Show { id } => {
            let record = session
                .store()
                .get(id)
                .ok_or_else(|| anyhow!("task not found: {id}"))?;
            renderer.print_task_detail(record)?;
            return Ok(Flow::Continue);
        }
        SessionAction::Add(args) => {
            let saved =
                submit_form(session.api(), renderer, new_task_form(args), FormMode::Create).await?;
            session.apply_saved(saved);
        }
        SessionAction::Edit(args) => {
            let id = args.id;
            let current = session
                .store()
                .get(id)
                .map(|record| record.task.clone())
                .ok_or_else(|| anyhow!("task not found: {id}"))?;
            let form = edited_form(&current, args);
            let saved = submit_form(session.api(), renderer, form, FormMode::Edit(id)).await?;
            session.apply_saved(saved);
        }
        SessionAction::Favorite { id } => {
            if !session.toggle_favorite(id)? {
                bail!("task not found: {id}");
            }
        }
        SessionAction::Trash { id } => {
            if !session.trash(id)? {
                bail!("task not found: {id}");
            }
        }
        SessionAction::Restore { id } => {
            if !session.restore(id)? {
                bail!("task not found: {id}");
            }
        }
        SessionAction::EmptyTrash => empty_trash(session, renderer).await?,
        SessionAction::Delete { id } => delete_trashed(session, renderer, id).await?,
        SessionAction::Drag { index } => {
            session.drag_start(index)?;
            return Ok(Flow::Continue);
        }
        SessionAction::Enter { index } => {
            session.drag_enter(index)?;
            return Ok(Flow::Continue);
        }
        SessionAction::Drop => {
            session.drop_dragged()?;
        }
        SessionAction::Cancel => {
            session.cancel_drag();
            return Ok(Flow::Continue);
        }
        SessionAction::Move { from, to } => {
            session.reorder(from, to)?;
        }
        SessionAction::Theme => {
            let theme = toggle_theme(session.bridge_mut())?;
            renderer.set_theme(theme);
            renderer.print_message(&format!("theme: {}", theme.label()))?;
        }
        SessionAction::Quit => return Ok(Flow::Quit),
    }

    print_view(session, renderer)?;
    Ok(Flow::Continue)
}
