// ⚖️ Compare Set - up to four schools side by side

use crate::error::{FinderError, Result};
use crate::school::School;
use serde::{Deserialize, Serialize};

pub const MAX_COMPARE: usize = 4;

/// Selected school ids, in selection order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareSet {
    ids: Vec<String>,
    limit: usize,
}

impl Default for CompareSet {
    fn default() -> Self {
        Self::new()
    }
}

impl CompareSet {
    pub fn new() -> Self {
        CompareSet {
            ids: Vec::new(),
            limit: MAX_COMPARE,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|i| i == id)
    }

    /// Remove if present, otherwise add.
    ///
    /// Returns whether the id is selected afterwards. Adding past the limit
    /// fails and leaves the set unchanged.
    pub fn toggle(&mut self, id: &str) -> Result<bool> {
        if let Some(pos) = self.ids.iter().position(|i| i == id) {
            self.ids.remove(pos);
            return Ok(false);
        }

        if self.ids.len() >= self.limit {
            return Err(FinderError::CompareLimit { limit: self.limit });
        }

        self.ids.push(id.to_string());
        Ok(true)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.ids.len();
        self.ids.retain(|i| i != id);
        self.ids.len() != before
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Selected schools, in the order they appear in `schools`
    pub fn selected<'a>(&self, schools: &'a [School]) -> Vec<&'a School> {
        schools.iter().filter(|s| self.contains(&s.id)).collect()
    }
}

// ============================================================================
// COMPARISON TABLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub label: String,
    /// One cell per compared school
    pub values: Vec<String>,
}

fn row(label: &str, schools: &[&School], cell: impl Fn(&School) -> String) -> ComparisonRow {
    ComparisonRow {
        label: label.to_string(),
        values: schools.iter().map(|s| cell(s)).collect(),
    }
}

fn yes_no(value: bool) -> String {
    if value { "Yes" } else { "No" }.to_string()
}

pub fn format_rating(school: &School) -> String {
    if school.parent_testimonials.is_empty() {
        "N/A".to_string()
    } else {
        format!("{:.1}", school.average_rating())
    }
}

pub fn format_distance(school: &School) -> String {
    match school.distance_km {
        Some(d) if d > 0.0 => format!("{} km", d),
        Some(_) => "In Parklands".to_string(),
        None => "Unknown".to_string(),
    }
}

/// Feature-by-school table
pub fn comparison_rows(schools: &[&School]) -> Vec<ComparisonRow> {
    vec![
        row("Average Rating", schools, format_rating),
        row("Tuition Range", schools, |s| s.tuition_range.clone()),
        row("Distance", schools, format_distance),
        row("Average Class Size", schools, |s| format!("{} students", s.average_class_size)),
        row("Educational Approach", schools, |s| s.educational_approach.clone()),
        row("ADHD Support", schools, |s| yes_no(s.adhd_support)),
        row("IEP Programs", schools, |s| yes_no(s.offers_iep)),
        row("On-site Therapists", schools, |s| yes_no(s.has_on_site_therapists)),
        row("Sensory-Friendly", schools, |s| yes_no(s.has_sensory_friendly_facilities)),
        row("Autism Support", schools, |s| s.autism_support.label().to_string()),
        row("Enrollment Status", schools, |s| s.enrollment_status.as_str().to_string()),
        row("Special Programs", schools, |s| {
            if s.special_needs_programs.is_empty() {
                "None listed".to_string()
            } else {
                s.special_needs_programs.join(", ")
            }
        }),
    ]
}
