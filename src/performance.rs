use thiserror::Error;

use crate::time;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PerformanceError {
    #[error("the mark '{0}' does not exist")]
    UnknownMark(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Mark,
    Measure,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryType::Mark => "mark",
            EntryType::Measure => "measure",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "mark" => Some(EntryType::Mark),
            "measure" => Some(EntryType::Measure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceEntry {
    pub name: String,
    pub entry_type: EntryType,
    pub start_time: f64,
    pub duration: f64,
}

/// User timing buffer: marks and measures in insertion order.
#[derive(Debug, Default)]
pub struct PerformanceTimeline {
    entries: Vec<PerformanceEntry>,
}

impl PerformanceTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> f64 {
        time::now()
    }

    pub fn time_origin(&self) -> f64 {
        time::time_origin()
    }

    pub fn mark(&mut self, name: &str, start_time: Option<f64>) -> PerformanceEntry {
        let entry = PerformanceEntry {
            name: name.to_string(),
            entry_type: EntryType::Mark,
            start_time: start_time.unwrap_or_else(time::now),
            duration: 0.0,
        };
        self.entries.push(entry.clone());
        entry
    }

    /// Measure between two marks. A missing start means the time origin, a
    /// missing end means now; named marks resolve to their latest occurrence.
    pub fn measure(
        &mut self,
        name: &str,
        start_mark: Option<&str>,
        end_mark: Option<&str>,
    ) -> Result<PerformanceEntry, PerformanceError> {
        let start = match start_mark {
            Some(mark) => self.mark_time(mark)?,
            None => 0.0,
        };
        let end = match end_mark {
            Some(mark) => self.mark_time(mark)?,
            None => time::now(),
        };
        let entry = PerformanceEntry {
            name: name.to_string(),
            entry_type: EntryType::Measure,
            start_time: start,
            duration: end - start,
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    fn mark_time(&self, name: &str) -> Result<f64, PerformanceError> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.entry_type == EntryType::Mark && entry.name == name)
            .map(|entry| entry.start_time)
            .ok_or_else(|| PerformanceError::UnknownMark(name.to_string()))
    }

    /// All entries ordered by start time.
    pub fn entries(&self) -> Vec<PerformanceEntry> {
        let mut entries = self.entries.clone();
        entries.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        entries
    }

    pub fn entries_by_name(
        &self,
        name: &str,
        entry_type: Option<EntryType>,
    ) -> Vec<PerformanceEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.name == name)
            .filter(|entry| entry_type.map_or(true, |kind| entry.entry_type == kind))
            .collect()
    }

    pub fn entries_by_type(&self, entry_type: EntryType) -> Vec<PerformanceEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.entry_type == entry_type)
            .collect()
    }

    /// Drop entries of `entry_type`, optionally only those called `name`.
    pub fn clear(&mut self, entry_type: EntryType, name: Option<&str>) {
        self.entries.retain(|entry| {
            entry.entry_type != entry_type || name.map_or(false, |name| entry.name != name)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measure_between_marks() {
        let mut timeline = PerformanceTimeline::new();
        timeline.mark("start", Some(10.0));
        timeline.mark("end", Some(25.0));
        let measure = timeline.measure("span", Some("start"), Some("end")).unwrap();
        assert_eq!(measure.start_time, 10.0);
        assert_eq!(measure.duration, 15.0);
        assert_eq!(timeline.entries_by_type(EntryType::Measure).len(), 1);
    }

    #[test]
    fn measure_uses_latest_mark() {
        let mut timeline = PerformanceTimeline::new();
        timeline.mark("a", Some(1.0));
        timeline.mark("a", Some(4.0));
        timeline.mark("b", Some(6.0));
        let measure = timeline.measure("m", Some("a"), Some("b")).unwrap();
        assert_eq!(measure.start_time, 4.0);
        assert_eq!(measure.duration, 2.0);
    }

    #[test]
    fn unknown_mark_is_an_error() {
        let mut timeline = PerformanceTimeline::new();
        assert_eq!(
            timeline.measure("m", Some("missing"), None),
            Err(PerformanceError::UnknownMark("missing".into()))
        );
        assert!(timeline.entries().is_empty());
    }

    #[test]
    fn clear_by_type_and_name() {
        let mut timeline = PerformanceTimeline::new();
        timeline.mark("a", Some(1.0));
        timeline.mark("b", Some(2.0));
        timeline.measure("m", Some("a"), Some("b")).unwrap();

        timeline.clear(EntryType::Mark, Some("a"));
        let names: Vec<String> = timeline.entries().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["m", "b"]);

        timeline.clear(EntryType::Mark, None);
        assert_eq!(timeline.entries_by_type(EntryType::Mark).len(), 0);
        assert_eq!(timeline.entries_by_name("m", Some(EntryType::Measure)).len(), 1);
        assert!(timeline.entries_by_name("m", Some(EntryType::Mark)).is_empty());
    }
}
