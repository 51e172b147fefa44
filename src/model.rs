use chrono::NaiveDate;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

pub type TaskId = String;

/// Color used for category names that no longer have a category record.
pub const DEFAULT_COLOR: &str = "#6b7280";

/// Label of the unfiltered view; no category may take it.
pub const ALL_LABEL: &str = "All";

fn is_reserved_name(name: &str) -> bool {
    name.eq_ignore_ascii_case(ALL_LABEL)
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Task {
    #[serde(default)]
    pub id: TaskId,
    pub text: String,
    pub category: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_on: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub color: String,
}

impl Category {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Category {
            name: name.into(),
            color: color.into(),
        }
    }
}

pub fn default_categories() -> Vec<Category> {
    vec![
        Category::new("Work", "#3b82f6"),
        Category::new("Personal", "#8b5cf6"),
        Category::new("Urgent", "#ef4444"),
        Category::new("Other", "#10b981"),
    ]
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme: {}", other)),
        }
    }
}

/// Per-day completion counts keyed by category name.
///
/// Counts never drop to zero in the map: a zero count is removed, and a date
/// left without counts is removed with it.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct CompletionIndex {
    days: BTreeMap<NaiveDate, BTreeMap<String, u32>>,
}

impl CompletionIndex {
    pub fn record(&mut self, date: NaiveDate, category: &str) {
        *self
            .days
            .entry(date)
            .or_default()
            .entry(category.to_string())
            .or_insert(0) += 1;
    }

    /// Returns false when there was nothing to take away.
    pub fn remove(&mut self, date: NaiveDate, category: &str) -> bool {
        let Some(counts) = self.days.get_mut(&date) else {
            return false;
        };
        let Some(count) = counts.get_mut(category) else {
            return false;
        };
        *count = count.saturating_sub(1);
        if *count == 0 {
            counts.remove(category);
        }
        if counts.is_empty() {
            self.days.remove(&date);
        }
        true
    }

    pub fn count(&self, date: NaiveDate, category: &str) -> u32 {
        self.days
            .get(&date)
            .and_then(|c| c.get(category))
            .copied()
            .unwrap_or(0)
    }

    pub fn on(&self, date: NaiveDate) -> Option<&BTreeMap<String, u32>> {
        self.days.get(&date)
    }

    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.days.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Folds every count under `old` into `new`, summing with what is there.
    fn merge_category(&mut self, old: &str, new: &str) -> bool {
        let mut changed = false;
        for counts in self.days.values_mut() {
            if let Some(moved) = counts.remove(old) {
                *counts.entry(new.to_string()).or_insert(0) += moved;
                changed = true;
            }
        }
        changed
    }

    /// Drops zero counts and empty dates that a hand-edited file may carry.
    pub fn normalize(&mut self) {
        for counts in self.days.values_mut() {
            counts.retain(|_, n| *n > 0);
        }
        self.days.retain(|_, counts| !counts.is_empty());
    }
}

/// Which persisted records an operation changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Touched {
    pub tasks: bool,
    pub categories: bool,
    pub completions: bool,
    pub theme: bool,
}

impl Touched {
    pub const NONE: Touched = Touched {
        tasks: false,
        categories: false,
        completions: false,
        theme: false,
    };

    pub fn tasks() -> Self {
        Touched {
            tasks: true,
            ..Touched::NONE
        }
    }

    pub fn categories() -> Self {
        Touched {
            categories: true,
            ..Touched::NONE
        }
    }

    pub fn theme() -> Self {
        Touched {
            theme: true,
            ..Touched::NONE
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Touched::NONE
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TrackerError {
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("category not found: {0}")]
    CategoryNotFound(String),
}

#[derive(Debug, Clone, Default)]
pub struct Tracker {
    pub tasks: Vec<Task>,
    pub categories: Vec<Category>,
    pub completions: CompletionIndex,
    pub theme: Theme,
}

impl Tracker {
    pub fn new(
        tasks: Vec<Task>,
        categories: Vec<Category>,
        completions: CompletionIndex,
        theme: Theme,
    ) -> Self {
        Tracker {
            tasks,
            categories,
            completions,
            theme,
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn task_index(&self, id: &str) -> Result<usize, TrackerError> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| TrackerError::TaskNotFound(id.to_string()))
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn has_category_like(&self, name: &str) -> bool {
        let lowered = name.to_lowercase();
        self.categories
            .iter()
            .any(|c| c.name.to_lowercase() == lowered)
    }

    pub fn color_of(&self, name: &str) -> &str {
        self.category(name)
            .map(|c| c.color.as_str())
            .unwrap_or(DEFAULT_COLOR)
    }

    /// Gives every task without an id a fresh one. Returns true if any changed.
    pub fn assign_missing_ids(&mut self) -> bool {
        let mut seen: HashSet<TaskId> = HashSet::new();
        let mut changed = false;
        for idx in 0..self.tasks.len() {
            let id = self.tasks[idx].id.clone();
            if id.is_empty() || seen.contains(&id) {
                let fresh = self.fresh_id(&seen);
                self.tasks[idx].id = fresh;
                changed = true;
            }
            seen.insert(self.tasks[idx].id.clone());
        }
        changed
    }

    fn fresh_id(&self, reserved: &HashSet<TaskId>) -> TaskId {
        loop {
            let id = generate_id();
            if !reserved.contains(&id) && self.task(&id).is_none() {
                return id;
            }
        }
    }

    pub fn add_task(&mut self, text: &str, category: &str) -> (Option<TaskId>, Touched) {
        let text = text.trim();
        if text.is_empty() {
            return (None, Touched::NONE);
        }
        let id = self.fresh_id(&HashSet::new());
        self.tasks.push(Task {
            id: id.clone(),
            text: text.to_string(),
            category: category.to_string(),
            completed: false,
            completed_on: None,
        });
        tracing::debug!(%id, category, "task added");
        (Some(id), Touched::tasks())
    }

    pub fn edit_task(&mut self, id: &str, text: &str) -> Result<Touched, TrackerError> {
        let idx = self.task_index(id)?;
        let text = text.trim();
        if text.is_empty() || self.tasks[idx].text == text {
            return Ok(Touched::NONE);
        }
        self.tasks[idx].text = text.to_string();
        tracing::debug!(id, "task edited");
        Ok(Touched::tasks())
    }

    /// Flips completion and keeps the index in step, always under `today`.
    ///
    /// Un-completing on a later day than the completion takes the count off
    /// the later day, leaving the original day's count in place.
    pub fn toggle_task(&mut self, id: &str, today: NaiveDate) -> Result<Touched, TrackerError> {
        let idx = self.task_index(id)?;
        let task = &mut self.tasks[idx];
        task.completed = !task.completed;
        let completions = if task.completed {
            task.completed_on = Some(today);
            self.completions.record(today, &task.category);
            true
        } else {
            task.completed_on = None;
            self.completions.remove(today, &task.category)
        };
        tracing::debug!(id, completed = task.completed, %today, "task toggled");
        Ok(Touched {
            tasks: true,
            completions,
            ..Touched::NONE
        })
    }

    pub fn delete_task(&mut self, id: &str, today: NaiveDate) -> Result<Touched, TrackerError> {
        let idx = self.task_index(id)?;
        let task = self.tasks.remove(idx);
        let completions = task.completed && self.completions.remove(today, &task.category);
        tracing::debug!(id, "task deleted");
        Ok(Touched {
            tasks: true,
            completions,
            ..Touched::NONE
        })
    }

    pub fn add_category(&mut self, name: &str, color: &str) -> Touched {
        let name = name.trim();
        if name.is_empty() || is_reserved_name(name) || self.has_category_like(name) {
            return Touched::NONE;
        }
        self.categories.push(Category::new(name, color));
        tracing::debug!(name, color, "category added");
        Touched::categories()
    }

    /// Renames and recolors `old`, carrying its tasks and completion counts
    /// over to the new name. All three collections change before anything is
    /// written.
    pub fn rename_category(
        &mut self,
        old: &str,
        new: &str,
        color: &str,
    ) -> Result<Touched, TrackerError> {
        let new = new.trim();
        if new.is_empty() || is_reserved_name(new) {
            return Ok(Touched::NONE);
        }
        let idx = self
            .categories
            .iter()
            .position(|c| c.name == old)
            .ok_or_else(|| TrackerError::CategoryNotFound(old.to_string()))?;
        let category = &mut self.categories[idx];
        category.name = new.to_string();
        category.color = color.to_string();

        let mut touched = Touched::categories();
        for task in self.tasks.iter_mut().filter(|t| t.category == old) {
            task.category = new.to_string();
            touched.tasks = true;
        }
        if old != new {
            touched.completions = self.completions.merge_category(old, new);
        }
        tracing::debug!(old, new, color, "category renamed");
        Ok(touched)
    }

    pub fn recolor_category(&mut self, name: &str, color: &str) -> Result<Touched, TrackerError> {
        self.rename_category(name, name, color)
    }

    /// Removes the category record only; tasks and completion counts keep
    /// the old name.
    pub fn delete_category(&mut self, name: &str) -> Result<Touched, TrackerError> {
        let idx = self
            .categories
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| TrackerError::CategoryNotFound(name.to_string()))?;
        self.categories.remove(idx);
        tracing::debug!(name, "category deleted");
        Ok(Touched::categories())
    }

    pub fn set_theme(&mut self, theme: Theme) -> Touched {
        if self.theme == theme {
            return Touched::NONE;
        }
        self.theme = theme;
        Touched::theme()
    }

    pub fn toggle_theme(&mut self) -> Touched {
        self.set_theme(self.theme.toggled())
    }
}

/// Parses `#rrggbb` into its channels.
pub fn parse_hex_color(input: &str) -> Option<(u8, u8, u8)> {
    let hex = input.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

fn generate_id() -> TaskId {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tracker() -> Tracker {
        Tracker::new(
            Vec::new(),
            vec![
                Category::new("Work", "#3b82f6"),
                Category::new("Personal", "#8b5cf6"),
            ],
            CompletionIndex::default(),
            Theme::Dark,
        )
    }

    #[test]
    fn add_task_trims_and_rejects_blank_text() {
        let mut t = tracker();
        assert_eq!(t.add_task("   ", "Work"), (None, Touched::NONE));
        let (id, touched) = t.add_task("  Buy milk ", "Work");
        assert_eq!(touched, Touched::tasks());
        let task = t.task(&id.unwrap()).unwrap();
        assert_eq!(task.text, "Buy milk");
        assert!(!task.completed);
    }

    #[test]
    fn tasks_get_distinct_ids_even_with_same_text() {
        let mut t = tracker();
        let a = t.add_task("Same", "Work").0.unwrap();
        let b = t.add_task("Same", "Work").0.unwrap();
        assert_ne!(a, b);
        t.toggle_task(&b, day(2024, 3, 5)).unwrap();
        assert!(!t.task(&a).unwrap().completed);
        assert!(t.task(&b).unwrap().completed);
    }

    #[test]
    fn edit_task_replaces_text_and_ignores_blank() {
        let mut t = tracker();
        let id = t.add_task("Draft", "Work").0.unwrap();
        assert_eq!(t.edit_task(&id, "  "), Ok(Touched::NONE));
        assert_eq!(t.edit_task(&id, "Final"), Ok(Touched::tasks()));
        assert_eq!(t.task(&id).unwrap().text, "Final");
        assert_eq!(
            t.edit_task("nope", "x"),
            Err(TrackerError::TaskNotFound("nope".into()))
        );
    }

    #[test]
    fn completing_records_under_today() {
        let mut t = tracker();
        let id = t.add_task("Buy milk", "Work").0.unwrap();
        let touched = t.toggle_task(&id, day(2024, 3, 5)).unwrap();
        assert!(touched.tasks && touched.completions);
        assert_eq!(t.completions.count(day(2024, 3, 5), "Work"), 1);
        assert_eq!(t.task(&id).unwrap().completed_on, Some(day(2024, 3, 5)));
    }

    #[test]
    fn toggling_twice_on_same_day_restores_index() {
        let mut t = tracker();
        let a = t.add_task("a", "Work").0.unwrap();
        let b = t.add_task("b", "Work").0.unwrap();
        t.toggle_task(&a, day(2024, 3, 5)).unwrap();
        let before = t.completions.clone();
        t.toggle_task(&b, day(2024, 3, 5)).unwrap();
        t.toggle_task(&b, day(2024, 3, 5)).unwrap();
        assert_eq!(t.completions, before);
        t.toggle_task(&a, day(2024, 3, 5)).unwrap();
        assert!(t.completions.is_empty());
        assert_eq!(t.task(&a).unwrap().completed_on, None);
    }

    #[test]
    fn undo_on_later_day_leaves_original_count() {
        let mut t = tracker();
        let a = t.add_task("a", "Work").0.unwrap();
        let b = t.add_task("b", "Work").0.unwrap();
        t.toggle_task(&a, day(2024, 3, 5)).unwrap();
        t.toggle_task(&b, day(2024, 3, 6)).unwrap();

        t.toggle_task(&a, day(2024, 3, 6)).unwrap();
        assert_eq!(t.completions.count(day(2024, 3, 5), "Work"), 1);
        assert_eq!(t.completions.count(day(2024, 3, 6), "Work"), 0);
        assert!(t.completions.on(day(2024, 3, 6)).is_none());
    }

    #[test]
    fn undo_on_day_without_counts_is_a_no_op_for_the_index() {
        let mut t = tracker();
        let a = t.add_task("a", "Work").0.unwrap();
        t.toggle_task(&a, day(2024, 3, 5)).unwrap();
        let touched = t.toggle_task(&a, day(2024, 3, 7)).unwrap();
        assert!(touched.tasks);
        assert!(!touched.completions);
        assert_eq!(t.completions.count(day(2024, 3, 5), "Work"), 1);
    }

    #[test]
    fn deleting_completed_task_decrements_today() {
        let mut t = tracker();
        let a = t.add_task("a", "Work").0.unwrap();
        let b = t.add_task("b", "Personal").0.unwrap();
        t.toggle_task(&a, day(2024, 3, 5)).unwrap();
        t.toggle_task(&b, day(2024, 3, 5)).unwrap();
        let touched = t.delete_task(&a, day(2024, 3, 5)).unwrap();
        assert!(touched.completions);
        assert_eq!(t.tasks.len(), 1);
        assert_eq!(t.completions.count(day(2024, 3, 5), "Work"), 0);
        assert_eq!(t.completions.count(day(2024, 3, 5), "Personal"), 1);

        let touched = t.delete_task(&b, day(2024, 3, 9)).unwrap();
        assert!(!touched.completions);
        assert_eq!(t.completions.count(day(2024, 3, 5), "Personal"), 1);
    }

    #[test]
    fn category_names_are_unique_ignoring_case() {
        let mut t = tracker();
        assert_eq!(t.add_category("work", "#000000"), Touched::NONE);
        assert_eq!(t.add_category(" ", "#000000"), Touched::NONE);
        assert_eq!(t.add_category("Errands", "#f59e0b"), Touched::categories());
        assert_eq!(t.categories.len(), 3);
    }

    #[test]
    fn rename_merges_counts_into_existing_name() {
        let mut t = tracker();
        t.add_category("B", "#111111");
        t.add_category("A", "#222222");
        let d1 = day(2024, 3, 5);
        let d2 = day(2024, 3, 6);
        for _ in 0..2 {
            t.completions.record(d1, "A");
        }
        t.completions.record(d1, "B");
        t.completions.record(d2, "A");

        let touched = t.rename_category("A", "B", "#222222").unwrap();
        assert!(touched.completions);
        assert_eq!(t.completions.count(d1, "B"), 3);
        assert_eq!(t.completions.count(d2, "B"), 1);
        assert!(t.completions.dates().all(|d| t.completions.count(*d, "A") == 0));
    }

    #[test]
    fn rename_example_from_work_to_job() {
        let mut t = tracker();
        let id = t.add_task("Buy milk", "Work").0.unwrap();
        t.toggle_task(&id, day(2024, 3, 5)).unwrap();
        t.rename_category("Work", "Job", "#3b82f6").unwrap();
        assert_eq!(t.completions.count(day(2024, 3, 5), "Job"), 1);
        assert_eq!(t.completions.count(day(2024, 3, 5), "Work"), 0);
        assert_eq!(t.task(&id).unwrap().category, "Job");
        assert_eq!(t.categories[0].name, "Job");
    }

    #[test]
    fn rename_to_same_name_only_recolors() {
        let mut t = tracker();
        t.completions.record(day(2024, 3, 5), "Work");
        let touched = t.recolor_category("Work", "#000000").unwrap();
        assert!(!touched.completions);
        assert_eq!(t.color_of("Work"), "#000000");
        assert_eq!(t.completions.count(day(2024, 3, 5), "Work"), 1);
    }

    #[test]
    fn rename_rejects_blank_target_and_unknown_source() {
        let mut t = tracker();
        assert_eq!(t.rename_category("Work", "  ", "#000000"), Ok(Touched::NONE));
        assert_eq!(t.categories[0].name, "Work");
        assert_eq!(
            t.rename_category("Nope", "X", "#000000"),
            Err(TrackerError::CategoryNotFound("Nope".into()))
        );
    }

    #[test]
    fn all_is_not_a_category_name() {
        let mut t = tracker();
        assert_eq!(t.add_category("all", "#000000"), Touched::NONE);
        assert_eq!(t.rename_category("Work", " All ", "#000000"), Ok(Touched::NONE));
        assert!(t.categories.iter().all(|c| c.name != "All" && c.name != "all"));
        assert_eq!(t.categories[0].name, "Work");
    }

    #[test]
    fn deleting_category_leaves_orphans() {
        let mut t = tracker();
        let id = t.add_task("Buy milk", "Work").0.unwrap();
        t.toggle_task(&id, day(2024, 3, 5)).unwrap();
        let tasks_before = t.tasks.clone();
        let completions_before = t.completions.clone();

        assert_eq!(t.delete_category("Work"), Ok(Touched::categories()));
        assert_eq!(t.tasks, tasks_before);
        assert_eq!(t.completions, completions_before);
        assert_eq!(t.color_of("Work"), DEFAULT_COLOR);
    }

    #[test]
    fn assign_missing_ids_fills_blanks_and_duplicates() {
        let mut t = tracker();
        for id in ["", "abc123", "abc123"] {
            t.tasks.push(Task {
                id: id.into(),
                text: "x".into(),
                category: "Work".into(),
                completed: false,
                completed_on: None,
            });
        }
        assert!(t.assign_missing_ids());
        let ids: HashSet<_> = t.tasks.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains("abc123"));
        assert!(!t.assign_missing_ids());
    }

    #[test]
    fn theme_parses_and_toggles() {
        assert_eq!("Light".parse::<Theme>(), Ok(Theme::Light));
        assert!("blue".parse::<Theme>().is_err());
        let mut t = tracker();
        assert_eq!(t.set_theme(Theme::Dark), Touched::NONE);
        assert_eq!(t.toggle_theme(), Touched::theme());
        assert_eq!(t.theme, Theme::Light);
    }

    #[test]
    fn hex_colors_parse() {
        assert_eq!(parse_hex_color("#3b82f6"), Some((0x3b, 0x82, 0xf6)));
        assert_eq!(parse_hex_color("3b82f6"), None);
        assert_eq!(parse_hex_color("#3b82"), None);
    }
}
