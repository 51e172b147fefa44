use crate::model::{Category, CompletionIndex, Tracker};
use chrono::{Datelike, NaiveDate};

pub const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// A year and a 1-based month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthCursor {
    pub year: i32,
    pub month: u32,
}

impl MonthCursor {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(MonthCursor { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        MonthCursor {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parses `YYYY-MM`.
    pub fn parse(input: &str) -> Option<Self> {
        let (year, month) = input.trim().split_once('-')?;
        MonthCursor::new(year.parse().ok()?, month.parse().ok()?)
    }

    pub fn prev(self) -> Self {
        if self.month == 1 {
            MonthCursor {
                year: self.year - 1,
                month: 12,
            }
        } else {
            MonthCursor {
                month: self.month - 1,
                ..self
            }
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            MonthCursor {
                year: self.year + 1,
                month: 1,
            }
        } else {
            MonthCursor {
                month: self.month + 1,
                ..self
            }
        }
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn title(&self) -> String {
        format!("{} {}", month_name(self.month), self.year)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub category: String,
    pub count: u32,
    pub color: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Blank,
    Day {
        date: NaiveDate,
        markers: Vec<Marker>,
    },
}

#[cfg(test)]
impl Cell {
    pub fn day(&self) -> Option<u32> {
        match self {
            Cell::Blank => None,
            Cell::Day { date, .. } => Some(date.day()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
    pub cursor: MonthCursor,
    pub title: String,
    pub cells: Vec<Cell>,
}

impl MonthGrid {
    #[cfg(test)]
    pub fn leading_blanks(&self) -> usize {
        self.cells
            .iter()
            .take_while(|c| matches!(c, Cell::Blank))
            .count()
    }

    /// Cells split into Monday-first weeks; the last week may be short.
    pub fn weeks(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(7)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegendEntry {
    pub name: String,
    pub color: String,
}

pub fn render_month(
    cursor: MonthCursor,
    completions: &CompletionIndex,
    categories: &[Category],
) -> MonthGrid {
    let mut cells = Vec::new();
    if let Some(first) = cursor.first_day() {
        let offset = first.weekday().num_days_from_monday() as usize;
        cells.extend(std::iter::repeat(Cell::Blank).take(offset));
        for day in 1..=days_in_month(cursor.year, cursor.month) {
            let Some(date) = NaiveDate::from_ymd_opt(cursor.year, cursor.month, day) else {
                continue;
            };
            let markers = completions
                .on(date)
                .map(|counts| {
                    counts
                        .iter()
                        .filter(|(_, n)| **n > 0)
                        .map(|(name, n)| Marker {
                            category: name.clone(),
                            count: *n,
                            color: color_for(categories, name).to_string(),
                            label: format!("{}: {} completed", name, n),
                        })
                        .collect()
                })
                .unwrap_or_default();
            cells.push(Cell::Day { date, markers });
        }
    }
    MonthGrid {
        cursor,
        title: cursor.title(),
        cells,
    }
}

pub fn render_for(tracker: &Tracker, cursor: MonthCursor) -> MonthGrid {
    render_month(cursor, &tracker.completions, &tracker.categories)
}

pub fn legend(categories: &[Category]) -> Vec<LegendEntry> {
    categories
        .iter()
        .map(|c| LegendEntry {
            name: c.name.clone(),
            color: c.color.clone(),
        })
        .collect()
}

fn color_for<'a>(categories: &'a [Category], name: &str) -> &'a str {
    categories
        .iter()
        .find(|c| c.name == name)
        .map(|c| c.color.as_str())
        .unwrap_or(crate::model::DEFAULT_COLOR)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.and_then(|d| d.pred_opt()).map(|d| d.day()).unwrap_or(28)
}

pub fn month_name(month: u32) -> &'static str {
    const NAMES: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];
    NAMES[((month.max(1) - 1) % 12) as usize]
}
