// 🔎 Query Engine - predicate filter + stable sort over a school collection
//
// Always filter first, then sort. Sorting is stable: ties keep input order.
// Inputs are never mutated; every call returns a new Vec.

use crate::school::School;
use crate::tuition::tuition_amount;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Distance used for schools whose distance is unknown
pub const UNKNOWN_DISTANCE_KM: f64 = 999.0;

// ============================================================================
// FILTER CONFIG
// ============================================================================

/// All active conditions are ANDed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Inclusive [min, max]. Schools whose fee cannot be read (0) always pass.
    pub tuition: (u64, u64),
    pub max_class_size: u32,
    pub adhd_support: bool,
    pub therapists: bool,
    pub iep: bool,
    pub sensory_friendly: bool,
    /// Empty = any approach
    pub educational_approaches: Vec<String>,
}

impl Default for FilterConfig {
    /// Monthly fee range in Rands, classes of at most 30, no toggles
    fn default() -> Self {
        FilterConfig {
            tuition: (0, 20_000),
            max_class_size: 30,
            adhd_support: false,
            therapists: false,
            iep: false,
            sensory_friendly: false,
            educational_approaches: Vec::new(),
        }
    }
}

impl FilterConfig {
    /// No constraint at all
    pub fn permissive() -> Self {
        FilterConfig {
            tuition: (0, u64::MAX),
            max_class_size: u32::MAX,
            ..Default::default()
        }
    }

    pub fn passes(&self, school: &School) -> bool {
        let fee = tuition_amount(&school.tuition_range);
        if fee > 0 && (fee < self.tuition.0 || fee > self.tuition.1) {
            return false;
        }

        if school.average_class_size > self.max_class_size {
            return false;
        }

        if self.adhd_support && !school.adhd_support {
            return false;
        }
        if self.therapists && !school.has_on_site_therapists {
            return false;
        }
        if self.iep && !school.offers_iep {
            return false;
        }
        if self.sensory_friendly && !school.has_sensory_friendly_facilities {
            return false;
        }

        if !self.educational_approaches.is_empty()
            && !self.educational_approaches.contains(&school.educational_approach)
        {
            return false;
        }

        true
    }

    pub fn is_active(&self, filter: QuickFilter) -> bool {
        match filter {
            QuickFilter::AdhdSupport => self.adhd_support,
            QuickFilter::Iep => self.iep,
            QuickFilter::Therapists => self.therapists,
            QuickFilter::SensoryFriendly => self.sensory_friendly,
        }
    }

    /// Flip exactly one toggle
    pub fn toggle(&mut self, filter: QuickFilter) {
        let flag = match filter {
            QuickFilter::AdhdSupport => &mut self.adhd_support,
            QuickFilter::Iep => &mut self.iep,
            QuickFilter::Therapists => &mut self.therapists,
            QuickFilter::SensoryFriendly => &mut self.sensory_friendly,
        };
        *flag = !*flag;
    }

    pub fn clear(&mut self) {
        *self = FilterConfig::default();
    }

    /// Quick filter chips with their current state
    pub fn quick_filters(&self) -> Vec<(QuickFilter, bool)> {
        QuickFilter::ALL
            .into_iter()
            .map(|f| (f, self.is_active(f)))
            .collect()
    }
}

// ============================================================================
// QUICK FILTERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuickFilter {
    AdhdSupport,
    Iep,
    Therapists,
    SensoryFriendly,
}

impl QuickFilter {
    pub const ALL: [QuickFilter; 4] = [
        QuickFilter::AdhdSupport,
        QuickFilter::Iep,
        QuickFilter::Therapists,
        QuickFilter::SensoryFriendly,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            QuickFilter::AdhdSupport => "adhd-support",
            QuickFilter::Iep => "iep",
            QuickFilter::Therapists => "therapists",
            QuickFilter::SensoryFriendly => "sensory-friendly",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QuickFilter::AdhdSupport => "ADHD Support",
            QuickFilter::Iep => "IEP Programs",
            QuickFilter::Therapists => "On-site Therapists",
            QuickFilter::SensoryFriendly => "Sensory-Friendly",
        }
    }
}

impl FromStr for QuickFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuickFilter::ALL
            .into_iter()
            .find(|f| f.key() == s.trim().to_lowercase())
            .ok_or_else(|| format!("Unknown quick filter: {}", s))
    }
}

// ============================================================================
// SORT KEYS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    /// Mean testimonial rating, highest first
    #[default]
    Rating,
    /// Nearest first; unknown distance last
    Distance,
    TuitionLow,
    TuitionHigh,
    /// Smallest classes first
    ClassSize,
    /// Alphabetical, case-insensitive
    Name,
}

impl SortKey {
    pub const ALL: [SortKey; 6] = [
        SortKey::Rating,
        SortKey::Distance,
        SortKey::TuitionLow,
        SortKey::TuitionHigh,
        SortKey::ClassSize,
        SortKey::Name,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Rating => "rating",
            SortKey::Distance => "distance",
            SortKey::TuitionLow => "tuition-low",
            SortKey::TuitionHigh => "tuition-high",
            SortKey::ClassSize => "class-size",
            SortKey::Name => "name",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortKey::Rating => "Highest Rated",
            SortKey::Distance => "Nearest",
            SortKey::TuitionLow => "Tuition: Low to High",
            SortKey::TuitionHigh => "Tuition: High to Low",
            SortKey::ClassSize => "Smallest Classes",
            SortKey::Name => "Name (A-Z)",
        }
    }

    /// Next key in display order, wrapping around
    pub fn next(&self) -> SortKey {
        let i = SortKey::ALL.iter().position(|k| k == self).unwrap_or(0);
        SortKey::ALL[(i + 1) % SortKey::ALL.len()]
    }

    pub fn compare(&self, a: &School, b: &School) -> Ordering {
        match self {
            SortKey::Rating => b.average_rating().total_cmp(&a.average_rating()),
            SortKey::Distance => distance_key(a).total_cmp(&distance_key(b)),
            SortKey::TuitionLow => {
                tuition_amount(&a.tuition_range).cmp(&tuition_amount(&b.tuition_range))
            }
            SortKey::TuitionHigh => {
                tuition_amount(&b.tuition_range).cmp(&tuition_amount(&a.tuition_range))
            }
            SortKey::ClassSize => a.average_class_size.cmp(&b.average_class_size),
            SortKey::Name => a
                .name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name)),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("Unknown sort key: {}", s))
    }
}

/// Unknown distance (and the 0 placeholder the catalog uses for it) sorts last
fn distance_key(school: &School) -> f64 {
    match school.distance_km {
        Some(d) if d > 0.0 => d,
        _ => UNKNOWN_DISTANCE_KM,
    }
}

// ============================================================================
// OPERATIONS
// ============================================================================

pub fn filter_schools(schools: &[School], config: &FilterConfig) -> Vec<School> {
    schools.iter().filter(|s| config.passes(s)).cloned().collect()
}

pub fn sort_schools(schools: &[School], key: SortKey) -> Vec<School> {
    let mut sorted = schools.to_vec();
    // sort_by is stable: equal keys keep their input order
    sorted.sort_by(|a, b| key.compare(a, b));
    sorted
}

/// filter-then-sort
pub fn apply(schools: &[School], config: &FilterConfig, key: SortKey) -> Vec<School> {
    sort_schools(&filter_schools(schools, config), key)
}

// ============================================================================
// VIEW
// ============================================================================

/// Everything the presentation layer chooses for one display list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub filters: FilterConfig,
    pub sort: SortKey,
    pub bookmarks_only: bool,
}

/// Bookmark restriction (when enabled) → predicate filter → sort
pub fn display_list(schools: &[School], view: &ViewConfig, bookmarks: &BTreeSet<String>) -> Vec<School> {
    if view.bookmarks_only {
        let bookmarked: Vec<School> = schools
            .iter()
            .filter(|s| bookmarks.contains(&s.id))
            .cloned()
            .collect();
        apply(&bookmarked, &view.filters, view.sort)
    } else {
        apply(schools, &view.filters, view.sort)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::school::Testimonial;

    fn school(
        name: &str,
        tuition: &str,
        distance: Option<f64>,
        class_size: u32,
        ratings: &[i64],
    ) -> School {
        let mut s = School::new(name);
        s.tuition_range = tuition.to_string();
        s.distance_km = distance;
        s.average_class_size = class_size;
        s.parent_testimonials = ratings
            .iter()
            .map(|&r| Testimonial::new("Parent", "", r))
            .collect();
        s
    }

    /// Five schools with distinct orderings per key
    fn fixture() -> Vec<School> {
        let mut alpha = school("Alpha Academy", "R8,000 per month", Some(5.0), 15, &[4, 5]);
        alpha.adhd_support = true;
        alpha.educational_approach = "Montessori".to_string();

        let mut bravo = school("bravo Remedial", "Contact School for Fees", None, 8, &[5]);
        bravo.adhd_support = true;
        bravo.offers_iep = true;
        bravo.educational_approach = "Remedial".to_string();

        let mut charlie = school("Charlie College", "R25,000 per month", Some(2.0), 28, &[]);
        charlie.adhd_support = true;
        charlie.educational_approach = "Mainstream Inclusion".to_string();

        let mut delta = school("Delta Prep", "R6,500 per month", Some(9.0), 35, &[3]);
        delta.has_on_site_therapists = true;
        delta.educational_approach = "Montessori".to_string();

        let mut echo = school("Echo School", "R12,000 per month", Some(1.0), 12, &[4, 5]);
        echo.adhd_support = true;
        echo.has_sensory_friendly_facilities = true;
        echo.educational_approach = "Remedial".to_string();

        vec![alpha, bravo, charlie, delta, echo]
    }

    fn names(schools: &[School]) -> Vec<&str> {
        schools.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_default_filter_config() {
        let config = FilterConfig::default();
        assert_eq!(config.tuition, (0, 20_000));
        assert_eq!(config.max_class_size, 30);
        assert!(config.educational_approaches.is_empty());
    }

    #[test]
    fn test_default_filters_tuition_and_class_size() {
        let filtered = filter_schools(&fixture(), &FilterConfig::default());
        // Charlie is over the fee ceiling, Delta over the class size ceiling;
        // Bravo's fee is unreadable and so never excluded
        assert_eq!(names(&filtered), vec!["Alpha Academy", "bravo Remedial", "Echo School"]);
    }

    #[test]
    fn test_toggle_filters() {
        let mut config = FilterConfig::permissive();
        config.toggle(QuickFilter::AdhdSupport);
        config.toggle(QuickFilter::Iep);
        assert_eq!(names(&filter_schools(&fixture(), &config)), vec!["bravo Remedial"]);

        config.toggle(QuickFilter::Iep);
        assert!(!config.is_active(QuickFilter::Iep));
        assert_eq!(filter_schools(&fixture(), &config).len(), 4);
    }

    #[test]
    fn test_approach_filter() {
        let config = FilterConfig {
            educational_approaches: vec!["Montessori".to_string()],
            ..FilterConfig::permissive()
        };
        assert_eq!(
            names(&filter_schools(&fixture(), &config)),
            vec!["Alpha Academy", "Delta Prep"]
        );
    }

    #[test]
    fn test_tuition_lower_bound_spares_unknown_fees() {
        let config = FilterConfig {
            tuition: (10_000, 30_000),
            ..FilterConfig::permissive()
        };
        assert_eq!(
            names(&filter_schools(&fixture(), &config)),
            vec!["bravo Remedial", "Charlie College", "Echo School"]
        );
    }

    #[test]
    fn test_sort_by_rating_is_stable() {
        let sorted = sort_schools(&fixture(), SortKey::Rating);
        // bravo 5.0; Alpha and Echo tie at 4.5 and keep input order; Delta 3; Charlie 0
        assert_eq!(
            names(&sorted),
            vec!["bravo Remedial", "Alpha Academy", "Echo School", "Delta Prep", "Charlie College"]
        );
    }

    #[test]
    fn test_sort_by_distance_unknown_last() {
        let sorted = sort_schools(&fixture(), SortKey::Distance);
        assert_eq!(
            names(&sorted),
            vec!["Echo School", "Charlie College", "Alpha Academy", "Delta Prep", "bravo Remedial"]
        );
    }

    #[test]
    fn test_sort_by_tuition() {
        let low = sort_schools(&fixture(), SortKey::TuitionLow);
        assert_eq!(
            names(&low),
            vec!["bravo Remedial", "Delta Prep", "Alpha Academy", "Echo School", "Charlie College"]
        );

        let high = sort_schools(&fixture(), SortKey::TuitionHigh);
        assert_eq!(
            names(&high),
            vec!["Charlie College", "Echo School", "Alpha Academy", "Delta Prep", "bravo Remedial"]
        );
    }

    #[test]
    fn test_sort_by_class_size_and_name() {
        assert_eq!(
            names(&sort_schools(&fixture(), SortKey::ClassSize)),
            vec!["bravo Remedial", "Echo School", "Alpha Academy", "Charlie College", "Delta Prep"]
        );
        // Case-insensitive: "bravo" sorts between Alpha and Charlie
        assert_eq!(
            names(&sort_schools(&fixture(), SortKey::Name)),
            vec!["Alpha Academy", "bravo Remedial", "Charlie College", "Delta Prep", "Echo School"]
        );
    }

    #[test]
    fn test_filter_then_sort_composition() {
        let config = FilterConfig {
            adhd_support: true,
            ..FilterConfig::default()
        };

        let by_rating = apply(&fixture(), &config, SortKey::Rating);
        let by_distance = apply(&fixture(), &config, SortKey::Distance);

        assert_eq!(names(&by_rating), vec!["bravo Remedial", "Alpha Academy", "Echo School"]);
        assert_eq!(names(&by_distance), vec!["Echo School", "Alpha Academy", "bravo Remedial"]);
    }

    #[test]
    fn test_sort_does_not_mutate_input() {
        let input = fixture();
        let before = input.clone();
        let _ = sort_schools(&input, SortKey::Name);
        assert_eq!(input, before);
    }

    #[test]
    fn test_empty_input_for_every_key() {
        let configs = [FilterConfig::default(), FilterConfig::permissive()];
        for config in &configs {
            for key in SortKey::ALL {
                assert!(apply(&[], config, key).is_empty());
            }
        }
    }

    #[test]
    fn test_sort_key_parse_and_cycle() {
        assert_eq!("tuition-low".parse::<SortKey>(), Ok(SortKey::TuitionLow));
        assert_eq!(" Class-Size ".parse::<SortKey>(), Ok(SortKey::ClassSize));
        assert!("popularity".parse::<SortKey>().is_err());
        assert_eq!(SortKey::Name.next(), SortKey::Rating);
        assert_eq!(SortKey::default(), SortKey::Rating);
    }

    #[test]
    fn test_quick_filter_parse_and_clear() {
        assert_eq!("sensory-friendly".parse::<QuickFilter>(), Ok(QuickFilter::SensoryFriendly));

        let mut config = FilterConfig::default();
        config.toggle(QuickFilter::Therapists);
        assert_eq!(
            config.quick_filters(),
            vec![
                (QuickFilter::AdhdSupport, false),
                (QuickFilter::Iep, false),
                (QuickFilter::Therapists, true),
                (QuickFilter::SensoryFriendly, false),
            ]
        );
        config.clear();
        assert_eq!(config, FilterConfig::default());
    }

    #[test]
    fn test_display_list_bookmarks_only() {
        let bookmarks: BTreeSet<String> =
            ["echo-school", "delta-prep"].iter().map(|s| s.to_string()).collect();
        let view = ViewConfig {
            filters: FilterConfig::permissive(),
            sort: SortKey::Name,
            bookmarks_only: true,
        };

        assert_eq!(
            names(&display_list(&fixture(), &view, &bookmarks)),
            vec!["Delta Prep", "Echo School"]
        );

        let all = ViewConfig { bookmarks_only: false, ..view };
        assert_eq!(display_list(&fixture(), &all, &bookmarks).len(), 5);
    }
}
