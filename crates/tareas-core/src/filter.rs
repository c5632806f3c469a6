use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use tracing::trace;

use crate::task::DisplayTask;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum Category {
  #[default]
  All,
  Favorites,
  Trash
}

impl Category {
  pub fn includes(
    &self,
    record: &DisplayTask
  ) -> bool {
    match self {
      | Self::All => !record.trashed,
      | Self::Favorites => {
        record.favorite
          && !record.trashed
      }
      | Self::Trash => record.trashed
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      | Self::All => "all",
      | Self::Favorites => "favorites",
      | Self::Trash => "trash"
    }
  }

  /// Dragging is not offered for
  /// trashed items.
  pub fn allows_reorder(&self) -> bool {
    !matches!(self, Self::Trash)
  }

  /// Title and hint shown when the
  /// projection comes back empty.
  pub fn empty_message(
    &self,
    searching: bool
  ) -> (&'static str, &'static str) {
    let title = match self {
      | Self::All => "No tasks",
      | Self::Favorites => {
        "You have no favorite tasks"
      }
      | Self::Trash => {
        "The trash is empty"
      }
    };

    let hint = if searching {
      "No tasks match that search"
    } else {
      match self {
        | Self::All => {
          "Start by creating a new task"
        }
        | Self::Favorites => {
          "Mark tasks as favorites to \
           see them here"
        }
        | Self::Trash => {
          "Tasks you delete will show \
           up here"
        }
      }
    };

    (title, hint)
  }
}

impl fmt::Display for Category {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Category {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" | "todas" => Ok(Self::All),
      | "favorites" | "favoritas" => {
        Ok(Self::Favorites)
      }
      | "trash" | "papelera" => {
        Ok(Self::Trash)
      }
      | other => Err(anyhow!(
        "unknown category: {other} \
         (expected all, favorites or \
         trash)"
      ))
    }
  }
}

/// Case-insensitive substring match
/// over title or description. A blank
/// term matches everything.
pub fn matches_search(
  record: &DisplayTask,
  term: &str
) -> bool {
  let needle = term.trim();
  if needle.is_empty() {
    return true;
  }
  record
    .task
    .matches_text(&needle.to_lowercase())
}

/// The displayed sequence: category
/// first, then the search term, in
/// store order.
#[tracing::instrument(skip(records), fields(total = records.len()))]
pub fn project(
  records: &[DisplayTask],
  category: Category,
  term: &str
) -> Vec<DisplayTask> {
  let view: Vec<DisplayTask> = records
    .iter()
    .filter(|record| {
      category.includes(record)
        && matches_search(record, term)
    })
    .cloned()
    .collect();
  trace!(
    shown = view.len(),
    "projected task view"
  );
  view
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub struct CategoryCounts {
  pub all:       usize,
  pub favorites: usize,
  pub trash:     usize
}

impl CategoryCounts {
  pub fn get(
    &self,
    category: Category
  ) -> usize {
    match category {
      | Category::All => self.all,
      | Category::Favorites => {
        self.favorites
      }
      | Category::Trash => self.trash
    }
  }
}

pub fn category_counts(
  records: &[DisplayTask]
) -> CategoryCounts {
  let mut counts =
    CategoryCounts::default();
  for record in records {
    if record.trashed {
      counts.trash += 1;
    } else {
      counts.all += 1;
      if record.favorite {
        counts.favorites += 1;
      }
    }
  }
  counts
}
