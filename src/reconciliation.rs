// ⚖️ Reconciliation Engine - merge provider results with the local catalog
//
// For each externally-sourced school:
//   1. Find its counterpart: first catalog school (stored order) the Name
//      Matcher accepts, external name passed first
//   2. Counterpart found → build a NEW merged School (inputs untouched)
//      No counterpart   → the external record passes through with defaults
//
// Merge policy: catalog value wins whenever it is present, except
//   - capability flags: logical OR of both sides
//   - autism support:   catalog if known, else external (nullable coalescing)
//   - fields the dataset has no column for (class size, testimonials,
//     coordinates): external when provided

use crate::catalog::Catalog;
use crate::matcher::{MatchRule, NameMatcher};
use crate::school::{PartialSchool, School, CONTACT_FOR_FEES};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Which catalog record a result was merged with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogMatch {
    pub catalog_id: String,
    pub rule: MatchRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledSchool {
    pub school: School,
    /// None = passed through without a local counterpart
    pub matched: Option<CatalogMatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub total: usize,
    pub matched: usize,
    pub passed_through: usize,
    /// Ids that had to be suffixed to stay unique
    pub renamed_ids: usize,
}

impl ReconciliationReport {
    pub fn summary(&self) -> String {
        format!(
            "Reconciled {} schools: {} matched local records, {} passed through, {} ids disambiguated",
            self.total, self.matched, self.passed_through, self.renamed_ids
        )
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

/// Read-only over its catalog; safe to share across threads
pub struct Reconciler {
    catalog: Arc<Catalog>,
    matcher: NameMatcher,
}

impl Reconciler {
    pub fn new(catalog: Arc<Catalog>, matcher: NameMatcher) -> Self {
        Reconciler { catalog, matcher }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Local counterpart for an external name
    pub fn find_counterpart(&self, external_name: &str) -> Option<(&School, MatchRule)> {
        self.catalog.find_match(&self.matcher, external_name)
    }

    pub fn reconcile(&self, external: &PartialSchool) -> ReconciledSchool {
        match self.find_counterpart(external.display_name()) {
            Some((local, rule)) => {
                debug!(
                    external = external.display_name(),
                    local = %local.name,
                    rule = rule.as_str(),
                    "Matched provider school to catalog"
                );
                ReconciledSchool {
                    school: merge(local, external),
                    matched: Some(CatalogMatch {
                        catalog_id: local.id.clone(),
                        rule,
                    }),
                }
            }
            None => ReconciledSchool {
                school: external.clone().into_school(),
                matched: None,
            },
        }
    }

    /// Reconcile a whole provider result set.
    ///
    /// Each element is handled independently; output keeps input order and
    /// length. Later duplicates of an id get a numeric suffix so ids stay
    /// unique within the set.
    pub fn reconcile_all(&self, externals: &[PartialSchool]) -> (Vec<ReconciledSchool>, ReconciliationReport) {
        let mut results: Vec<ReconciledSchool> =
            externals.iter().map(|e| self.reconcile(e)).collect();

        let renamed_ids = ensure_unique_ids(results.iter_mut().map(|r| &mut r.school));
        let matched = results.iter().filter(|r| r.matched.is_some()).count();

        let report = ReconciliationReport {
            total: results.len(),
            matched,
            passed_through: results.len() - matched,
            renamed_ids,
        };
        debug!("{}", report.summary());

        (results, report)
    }
}

// ============================================================================
// MERGE
// ============================================================================

fn prefer(local: &Option<String>, external: &Option<String>) -> Option<String> {
    local
        .as_ref()
        .filter(|s| !s.trim().is_empty())
        .or(external.as_ref())
        .cloned()
}

fn prefer_text(local: &str, external: &Option<String>) -> String {
    if local.trim().is_empty() {
        external.clone().unwrap_or_default()
    } else {
        local.to_string()
    }
}

fn prefer_list<T: Clone>(local: &[T], external: &Option<Vec<T>>) -> Vec<T> {
    if local.is_empty() {
        external.clone().unwrap_or_default()
    } else {
        local.to_vec()
    }
}

fn prefer_coordinate(local: f64, external: Option<f64>) -> f64 {
    if local != 0.0 {
        local
    } else {
        external.unwrap_or(0.0)
    }
}

/// Merge a catalog school with its provider counterpart into a new School
pub fn merge(local: &School, external: &PartialSchool) -> School {
    let tuition_range = prefer_text(&local.tuition_range, &external.tuition_range);
    let tuition_range = if tuition_range.trim().is_empty() {
        CONTACT_FOR_FEES.to_string()
    } else {
        tuition_range
    };

    School {
        id: local.id.clone(),
        name: local.name.clone(),
        address: prefer(&local.address, &external.address),
        website: prefer(&local.website, &external.website),
        phone_number: prefer(&local.phone_number, &external.phone_number),
        email: prefer(&local.email, &external.email),
        distance_km: local.distance_km.or(external.distance_km),
        tuition_range,
        fee_document_url: prefer(&local.fee_document_url, &external.fee_document_url),
        special_needs_programs: prefer_list(&local.special_needs_programs, &external.special_needs_programs),
        adhd_support: local.adhd_support || external.adhd_support.unwrap_or(false),
        autism_support: local.autism_support.or(external.autism_support.into()),
        has_on_site_therapists: local.has_on_site_therapists
            || external.has_on_site_therapists.unwrap_or(false),
        offers_iep: local.offers_iep || external.offers_iep.unwrap_or(false),
        has_sensory_friendly_facilities: local.has_sensory_friendly_facilities
            || external.has_sensory_friendly_facilities.unwrap_or(false),
        educational_approach: prefer_text(&local.educational_approach, &external.educational_approach),
        average_class_size: external.average_class_size.unwrap_or(local.average_class_size),
        brief_description: prefer_text(&local.brief_description, &external.brief_description),
        enrollment_status: local.enrollment_status,
        parent_testimonials: prefer_list(&local.parent_testimonials, &external.parent_testimonials),
        lat: prefer_coordinate(local.lat, external.lat),
        lng: prefer_coordinate(local.lng, external.lng),
    }
}

/// Suffix repeated ids ("x", "x" → "x", "x-2"). Returns how many were changed.
fn ensure_unique_ids<'a>(schools: impl Iterator<Item = &'a mut School>) -> usize {
    let schools: Vec<&mut School> = schools.collect();
    let mut taken: HashSet<String> = HashSet::new();
    let mut renamed = 0;

    // First pass reserves every id as it first appears
    let mut duplicate = vec![false; schools.len()];
    for (i, school) in schools.iter().enumerate() {
        if !taken.insert(school.id.clone()) {
            duplicate[i] = true;
        }
    }

    for (school, is_duplicate) in schools.into_iter().zip(duplicate) {
        if !is_duplicate {
            continue;
        }
        let mut n = 2;
        let mut candidate = format!("{}-{}", school.id, n);
        while taken.contains(&candidate) {
            n += 1;
            candidate = format!("{}-{}", school.id, n);
        }
        taken.insert(candidate.clone());
        school.id = candidate;
        renamed += 1;
    }

    renamed
}

// ============================================================================
// TESTS
// ============================================================================
