use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::datetime::format_due;
use crate::filter::{Category, CategoryCounts};
use crate::task::{DisplayTask, Status};
use crate::theme::ThemeMode;

const DESCRIPTION_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    theme: ThemeMode,
}

impl Renderer {
    pub fn new(color: bool, theme: ThemeMode) -> Self {
        Self { color, theme }
    }

    pub fn set_theme(&mut self, theme: ThemeMode) {
        self.theme = theme;
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn print_task_table(&mut self, tasks: &[DisplayTask]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        write_task_table(&mut out, tasks, |text, code| self.paint(text, code))
    }

    #[tracing::instrument(skip(self, record), fields(id = record.id()))]
    pub fn print_task_detail(&mut self, record: &DisplayTask) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let task = &record.task;

        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", self.paint(&task.title, self.accent()))?;
        writeln!(
            out,
            "status      {}",
            self.paint(task.status.label(), status_color(task.status))
        )?;
        writeln!(out, "description {}", description_or_placeholder(&task.description))?;
        if let Some(due) = task.due {
            writeln!(out, "due         {}", format_due(due))?;
        }
        writeln!(out, "favorite    {}", if record.favorite { "yes" } else { "no" })?;
        if record.trashed {
            writeln!(out, "trashed     yes")?;
        }
        Ok(())
    }

    /// Badge line with one count per category, the active one highlighted.
    pub fn print_counts(&mut self, counts: CategoryCounts, active: Category) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let parts: Vec<String> = [Category::All, Category::Favorites, Category::Trash]
            .into_iter()
            .map(|category| {
                let label = format!("{} ({})", category.as_str(), counts.get(category));
                if category == active {
                    self.paint(&format!("[{label}]"), self.accent())
                } else {
                    label
                }
            })
            .collect();
        writeln!(out, "{}", parts.join("  "))?;
        Ok(())
    }

    pub fn print_empty_state(&mut self, category: Category, searching: bool) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let (title, hint) = category.empty_message(searching);
        writeln!(out, "{}", self.paint(title, "1"))?;
        writeln!(out, "{hint}")?;
        Ok(())
    }

    pub fn print_message(&mut self, message: &str) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{message}")?;
        Ok(())
    }

    pub fn print_error(&mut self, message: &str) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", self.paint(message, "31"))?;
        Ok(())
    }

    fn accent(&self) -> &'static str {
        if self.theme.is_dark() { "96" } else { "34" }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn status_color(status: Status) -> &'static str {
    match status {
        Status::Pending => "33",
        Status::InProgress => "34",
        Status::Completed => "32",
    }
}

fn description_or_placeholder(description: &str) -> &str {
    if description.trim().is_empty() {
        "No description"
    } else {
        description
    }
}

/// First 100 characters plus an ellipsis.
pub fn description_preview(description: &str) -> String {
    if description.trim().is_empty() {
        return "No description".to_string();
    }
    if description.chars().count() > DESCRIPTION_PREVIEW_CHARS {
        let head: String = description.chars().take(DESCRIPTION_PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        description.to_string()
    }
}

const TABLE_HEADERS: [&str; 7] = ["#", "ID", "", "Status", "Due", "Title", "Description"];

fn write_task_table<W, P>(mut writer: W, tasks: &[DisplayTask], paint: P) -> anyhow::Result<()>
where
    W: Write,
    P: Fn(&str, &str) -> String,
{
    let rows: Vec<[String; 7]> = tasks
        .iter()
        .enumerate()
        .map(|(position, record)| {
            let task = &record.task;
            let marker = if record.favorite && !record.trashed {
                paint("*", "33")
            } else {
                String::new()
            };
            [
                position.to_string(),
                paint(&task.id.to_string(), "33"),
                marker,
                paint(task.status.label(), status_color(task.status)),
                task.due.map(format_due).unwrap_or_default(),
                task.title.clone(),
                description_preview(&task.description),
            ]
        })
        .collect();

    let mut widths = TABLE_HEADERS.map(|header| header.width());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(visible_width(cell));
        }
    }

    let header = TABLE_HEADERS.map(|header| header.to_string());
    let rule = widths.map(|width| "-".repeat(width));
    for line in [&header, &rule].into_iter().chain(&rows) {
        for (cell, width) in line.iter().zip(widths) {
            let pad = width.saturating_sub(visible_width(cell));
            write!(writer, "{cell}{:pad$} ", "")?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Display width of `cell`, not counting SGR escape sequences.
fn visible_width(cell: &str) -> usize {
    let mut width = 0;
    let mut rest = cell;
    while let Some(start) = rest.find('\x1b') {
        width += UnicodeWidthStr::width(&rest[..start]);
        rest = rest[start..]
            .find('m')
            .map_or("", |end| &rest[start + end + 1..]);
    }
    width + UnicodeWidthStr::width(rest)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{description_preview, visible_width, write_task_table};
    use crate::task::{DisplayTask, Status, Task};

    #[test]
    fn long_descriptions_are_cut_at_one_hundred_chars() {
        let long = "ñ".repeat(120);
        let preview = description_preview(&long);
        assert_eq!(preview.chars().count(), 103);
        assert!(preview.ends_with("..."));
        assert_eq!(description_preview("  "), "No description");
    }

    #[test]
    fn table_shows_position_marker_and_due() {
        let mut record = DisplayTask::new(Task {
            id: 42,
            title: "Revisar informe".to_string(),
            description: "trimestral".to_string(),
            due: NaiveDate::from_ymd_opt(2026, 11, 3),
            status: Status::InProgress,
        });
        record.favorite = true;

        let mut buf = Vec::new();
        write_task_table(&mut buf, &[record], |text, _| text.to_string()).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        let row = text.lines().nth(2).expect("data row");

        assert!(row.starts_with("0 "));
        assert!(row.contains("42"));
        assert!(row.contains('*'));
        assert!(row.contains("In progress"));
        assert!(row.contains("03-11-2026"));
    }

    #[test]
    fn escape_codes_take_no_columns() {
        assert_eq!(visible_width("\x1b[33m42\x1b[0m"), 2);
        assert_eq!(visible_width("tarea"), 5);
        assert_eq!(visible_width("\x1b[1m"), 0);
    }
}
