use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{HashMap, HashSet};

use crate::models::NewsEvent;

/// Turn an event label into a file-name fragment. Colons are dropped and
/// anything outside `[A-Za-z0-9._-]` (spaces and slashes included) becomes `_`.
pub fn sanitize_label(label: &str) -> String {
    let slug: String = label
        .trim()
        .chars()
        .filter(|c| *c != ':')
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if slug.is_empty() {
        "event".to_string()
    } else {
        slug
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlugAssignment {
    /// First time this event is seen
    Fresh(String),
    /// Exact same (datetime, label) seen before; carries the slug it got then
    Repeat(String),
}

/// Hands out per-date unique slugs so no two distinct events share a file name.
///
/// The first event to claim `{date}_{slug}` keeps the plain slug. A later,
/// different event that sanitizes to the same slug on the same date gets its
/// time of day appended (`_HHMMSS`), then a counter if that is taken too.
#[derive(Debug, Default)]
pub struct SlugRegistry {
    assigned: HashMap<(NaiveDateTime, String), String>,
    taken: HashSet<(NaiveDate, String)>,
}

impl SlugRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, event: &NewsEvent) -> SlugAssignment {
        let key = (event.datetime, event.event.clone());
        if let Some(slug) = self.assigned.get(&key) {
            return SlugAssignment::Repeat(slug.clone());
        }

        let date = event.datetime.date();
        let base = sanitize_label(&event.event);
        let mut candidate = base.clone();

        if self.taken.contains(&(date, candidate.clone())) {
            let timed = format!("{}_{}", base, event.datetime.format("%H%M%S"));
            candidate = timed.clone();
            let mut n = 2;
            while self.taken.contains(&(date, candidate.clone())) {
                candidate = format!("{}_{}", timed, n);
                n += 1;
            }
        }

        self.taken.insert((date, candidate.clone()));
        self.assigned.insert(key, candidate.clone());
        SlugAssignment::Fresh(candidate)
    }
}
