use crate::model::{
    default_categories, CompletionIndex, TaskId, Theme, Touched, Tracker, TrackerError,
};
use crate::storage::{Store, StoreKey};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};

/// Asks the user before destructive actions.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> Result<bool>,
{
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        self(prompt)
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// The tracker plus the store it is mirrored into.
///
/// Every mutation runs against the tracker first and then rewrites each
/// touched record in full.
pub struct Session<S: Store> {
    tracker: Tracker,
    store: S,
}

impl<S: Store> Session<S> {
    pub fn open(store: S) -> Result<Self> {
        let tasks = store
            .load(StoreKey::Tasks)
            .context("loading tasks")?
            .unwrap_or_default();
        let categories = store
            .load(StoreKey::Categories)
            .context("loading categories")?
            .unwrap_or_else(default_categories);
        let mut completions: CompletionIndex = store
            .load(StoreKey::Completions)
            .context("loading completions")?
            .unwrap_or_default();
        completions.normalize();
        let theme: Theme = store
            .load(StoreKey::Theme)
            .context("loading theme")?
            .unwrap_or_default();

        let mut session = Session {
            tracker: Tracker::new(tasks, categories, completions, theme),
            store,
        };
        if session.tracker.assign_missing_ids() {
            tracing::info!("assigned ids to stored tasks");
            session.persist(Touched::tasks())?;
        }
        tracing::info!(
            tasks = session.tracker.tasks.len(),
            categories = session.tracker.categories.len(),
            "session opened"
        );
        Ok(session)
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Categories first, completions last: an interrupted rename leaves at
    /// worst counts under the old name.
    fn persist(&mut self, touched: Touched) -> Result<()> {
        if touched.categories {
            self.store
                .save(StoreKey::Categories, &self.tracker.categories)?;
        }
        if touched.tasks {
            self.store.save(StoreKey::Tasks, &self.tracker.tasks)?;
        }
        if touched.completions {
            self.store
                .save(StoreKey::Completions, &self.tracker.completions)?;
        }
        if touched.theme {
            self.store.save(StoreKey::Theme, &self.tracker.theme)?;
        }
        Ok(())
    }

    fn commit(&mut self, touched: Touched) -> Result<bool> {
        if touched.is_empty() {
            return Ok(false);
        }
        self.persist(touched)?;
        Ok(true)
    }

    pub fn add_task(&mut self, text: &str, category: &str) -> Result<Option<TaskId>> {
        let (id, touched) = self.tracker.add_task(text, category);
        self.commit(touched)?;
        Ok(id)
    }

    pub fn edit_task(&mut self, id: &str, text: &str) -> Result<bool> {
        let touched = self.tracker.edit_task(id, text)?;
        self.commit(touched)
    }

    pub fn toggle_task(&mut self, id: &str, today: NaiveDate) -> Result<bool> {
        let touched = self.tracker.toggle_task(id, today)?;
        self.commit(touched)?;
        Ok(self.tracker.task(id).map(|t| t.completed).unwrap_or(false))
    }

    pub fn delete_task(&mut self, id: &str, today: NaiveDate) -> Result<bool> {
        let touched = self.tracker.delete_task(id, today)?;
        self.commit(touched)
    }

    pub fn add_category(&mut self, name: &str, color: &str) -> Result<bool> {
        let touched = self.tracker.add_category(name, color);
        self.commit(touched)
    }

    pub fn rename_category(&mut self, old: &str, new: &str, color: &str) -> Result<bool> {
        let touched = self.tracker.rename_category(old, new, color)?;
        self.commit(touched)
    }

    pub fn recolor_category(&mut self, name: &str, color: &str) -> Result<bool> {
        let touched = self.tracker.recolor_category(name, color)?;
        self.commit(touched)
    }

    /// Deletes only after `confirm` agrees; declining changes nothing.
    pub fn delete_category(&mut self, name: &str, confirm: &mut dyn Confirm) -> Result<bool> {
        if self.tracker.category(name).is_none() {
            return Err(TrackerError::CategoryNotFound(name.to_string()).into());
        }
        let prompt = format!("Delete category {}? Tasks keep their old name", name);
        if !confirm.confirm(&prompt)? {
            tracing::debug!(name, "category delete declined");
            return Ok(false);
        }
        let touched = self.tracker.delete_category(name)?;
        self.commit(touched)
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<bool> {
        let touched = self.tracker.set_theme(theme);
        self.commit(touched)
    }

    pub fn toggle_theme(&mut self) -> Result<Theme> {
        let touched = self.tracker.toggle_theme();
        self.commit(touched)?;
        Ok(self.tracker.theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Task};
    use crate::storage::MemoryStore;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn stored_tasks(session: &Session<MemoryStore>) -> Vec<Task> {
        session
            .store()
            .load(StoreKey::Tasks)
            .unwrap()
            .unwrap_or_default()
    }

    fn stored_completions(session: &Session<MemoryStore>) -> CompletionIndex {
        session
            .store()
            .load(StoreKey::Completions)
            .unwrap()
            .unwrap_or_default()
    }

    fn yes() -> impl FnMut(&str) -> Result<bool> {
        |_: &str| Ok(true)
    }

    #[test]
    fn empty_store_seeds_default_categories_and_theme() {
        let session = Session::open(MemoryStore::new()).unwrap();
        let names: Vec<_> = session
            .tracker()
            .categories
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, ["Work", "Personal", "Urgent", "Other"]);
        assert_eq!(session.tracker().theme, Theme::Dark);
        assert!(session.store().raw(StoreKey::Categories).is_none());
    }

    #[test]
    fn persisted_task_list_tracks_memory_after_each_operation() {
        let mut session = Session::open(MemoryStore::new()).unwrap();
        let a = session.add_task("one", "Work").unwrap().unwrap();
        assert_eq!(stored_tasks(&session).len(), session.tracker().tasks.len());
        let b = session.add_task("two", "Personal").unwrap().unwrap();
        assert_eq!(stored_tasks(&session).len(), 2);
        session.add_task("  ", "Personal").unwrap();
        assert_eq!(stored_tasks(&session).len(), session.tracker().tasks.len());
        session.edit_task(&a, "uno").unwrap();
        assert_eq!(stored_tasks(&session), session.tracker().tasks);
        session.delete_task(&b, day(2024, 3, 5)).unwrap();
        assert_eq!(stored_tasks(&session), session.tracker().tasks);
        assert_eq!(stored_tasks(&session).len(), 1);
    }

    #[test]
    fn completion_and_rename_are_written_through() {
        let mut store = MemoryStore::new();
        store
            .save(
                StoreKey::Categories,
                &vec![
                    Category::new("Work", "#3b82f6"),
                    Category::new("Personal", "#8b5cf6"),
                ],
            )
            .unwrap();
        let mut session = Session::open(store).unwrap();
        let id = session.add_task("Buy milk", "Work").unwrap().unwrap();
        assert!(session.toggle_task(&id, day(2024, 3, 5)).unwrap());
        assert_eq!(stored_completions(&session).count(day(2024, 3, 5), "Work"), 1);

        session.rename_category("Work", "Job", "#3b82f6").unwrap();
        let completions = stored_completions(&session);
        assert_eq!(completions.count(day(2024, 3, 5), "Job"), 1);
        assert_eq!(completions.count(day(2024, 3, 5), "Work"), 0);
        assert_eq!(stored_tasks(&session)[0].category, "Job");
        let raw = session.store().raw(StoreKey::Completions).unwrap();
        assert!(raw.contains("2024-03-05"));
    }

    #[test]
    fn declined_category_delete_is_a_no_op() {
        let mut session = Session::open(MemoryStore::new()).unwrap();
        let mut no = |_: &str| -> Result<bool> { Ok(false) };
        assert!(!session.delete_category("Work", &mut no).unwrap());
        assert!(session.tracker().category("Work").is_some());
        assert!(session.store().raw(StoreKey::Categories).is_none());

        let mut yes = yes();
        assert!(session.delete_category("Work", &mut yes).unwrap());
        assert!(session.tracker().category("Work").is_none());
        assert!(session.delete_category("Work", &mut yes).is_err());
    }

    #[test]
    fn legacy_tasks_get_ids_and_are_rewritten() {
        let mut store = MemoryStore::new();
        store
            .save_raw(
                StoreKey::Tasks,
                r#"[{"text": "Buy milk", "category": "Work", "completed": true}]"#,
            )
            .unwrap();
        let session = Session::open(store).unwrap();
        let task = &session.tracker().tasks[0];
        assert_eq!(task.id.len(), 6);
        assert!(task.completed);
        assert_eq!(stored_tasks(&session)[0].id, task.id);
    }

    #[test]
    fn zero_counts_and_empty_dates_are_dropped_on_open() {
        let mut store = MemoryStore::new();
        store
            .save_raw(
                StoreKey::Completions,
                r#"{"2024-03-05": {"Work": 0}, "2024-03-06": {}, "2024-03-07": {"Work": 2, "Personal": 0}}"#,
            )
            .unwrap();
        let session = Session::open(store).unwrap();
        let completions = &session.tracker().completions;
        assert_eq!(completions.dates().count(), 1);
        assert_eq!(completions.count(day(2024, 3, 7), "Work"), 2);
        assert_eq!(completions.on(day(2024, 3, 7)).unwrap().len(), 1);

        let mut store = MemoryStore::new();
        store
            .save_raw(StoreKey::Completions, r#"{"2024-03-05": {"Work": 0}}"#)
            .unwrap();
        let session = Session::open(store).unwrap();
        assert!(session.tracker().completions.is_empty());
    }

    #[test]
    fn theme_round_trips_through_store() {
        let mut session = Session::open(MemoryStore::new()).unwrap();
        assert_eq!(session.toggle_theme().unwrap(), Theme::Light);
        let store = session.store().clone();
        let reopened = Session::open(store).unwrap();
        assert_eq!(reopened.tracker().theme, Theme::Light);
    }
}
