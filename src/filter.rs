use crate::model::{Category, Task, ALL_LABEL};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Filter {
    #[default]
    All,
    Category(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterEntry {
    pub label: String,
    pub color: Option<String>,
    pub active: bool,
    pub filter: Filter,
}

impl Filter {
    pub fn from_label(label: &str) -> Self {
        if label == ALL_LABEL {
            Filter::All
        } else {
            Filter::Category(label.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Filter::All => ALL_LABEL,
            Filter::Category(name) => name,
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Category(name) => &task.category == name,
        }
    }

    pub fn visible<'a>(&'a self, tasks: &'a [Task]) -> impl Iterator<Item = &'a Task> + 'a {
        tasks.iter().filter(move |t| self.matches(t))
    }

    /// Follows a rename from `old` to `new`.
    pub fn renamed(self, old: &str, new: &str) -> Self {
        match self {
            Filter::Category(name) if name == old => Filter::Category(new.to_string()),
            other => other,
        }
    }

    /// Falls back to `All` once the filtered category has no record.
    pub fn reconcile(self, categories: &[Category]) -> Self {
        match self {
            Filter::Category(name) if !categories.iter().any(|c| c.name == name) => Filter::All,
            other => other,
        }
    }

    /// Steps through All and then each category, wrapping around.
    pub fn cycle(&self, categories: &[Category], delta: isize) -> Self {
        let len = categories.len() as isize + 1;
        let current = match self {
            Filter::All => 0,
            Filter::Category(name) => categories
                .iter()
                .position(|c| &c.name == name)
                .map(|i| i as isize + 1)
                .unwrap_or(0),
        };
        let next = (current + delta).rem_euclid(len);
        if next == 0 {
            Filter::All
        } else {
            Filter::Category(categories[(next - 1) as usize].name.clone())
        }
    }
}

pub fn filter_bar(categories: &[Category], active: &Filter) -> Vec<FilterEntry> {
    let mut entries = vec![FilterEntry {
        label: ALL_LABEL.to_string(),
        color: None,
        active: *active == Filter::All,
        filter: Filter::All,
    }];
    entries.extend(categories.iter().map(|c| {
        let filter = Filter::Category(c.name.clone());
        FilterEntry {
            label: c.name.clone(),
            color: Some(c.color.clone()),
            active: *active == filter,
            filter,
        }
    }));
    entries
}

/// The category pre-selected in the new-task form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuickPick {
    selected: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chip {
    pub name: String,
    pub color: String,
    pub active: bool,
}

impl QuickPick {
    pub fn new(categories: &[Category]) -> Self {
        QuickPick {
            selected: categories.first().map(|c| c.name.clone()),
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn pick(&mut self, name: &str) {
        self.selected = Some(name.to_string());
    }

    pub fn cycle(&mut self, categories: &[Category], delta: isize) {
        if categories.is_empty() {
            self.selected = None;
            return;
        }
        let len = categories.len() as isize;
        let current = self
            .selected
            .as_ref()
            .and_then(|s| categories.iter().position(|c| &c.name == s))
            .map(|i| i as isize);
        let next = match current {
            Some(i) => (i + delta).rem_euclid(len),
            None => 0,
        };
        self.selected = Some(categories[next as usize].name.clone());
    }

    /// Keeps the selection valid after the category list changed.
    pub fn reconcile(&mut self, categories: &[Category]) {
        let still_known = self
            .selected
            .as_ref()
            .map(|s| categories.iter().any(|c| &c.name == s))
            .unwrap_or(false);
        if !still_known {
            self.selected = categories.first().map(|c| c.name.clone());
        }
    }

    pub fn chips(&self, categories: &[Category]) -> Vec<Chip> {
        categories
            .iter()
            .map(|c| Chip {
                name: c.name.clone(),
                color: c.color.clone(),
                active: self.selected.as_deref() == Some(c.name.as_str()),
            })
            .collect()
    }
}
