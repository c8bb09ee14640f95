// 📚 School Catalog - the curated local dataset, parsed once
//
// Catalog:       immutable parsed records + provenance
// CatalogHandle: lazily parses its source on first access and then hands out
//                the same Arc<Catalog> forever. Built by the composition root
//                and passed to whoever needs it; there is no global instance.

use crate::matcher::{MatchRule, NameMatcher};
use crate::parser::{CatalogParser, SkippedRow};
use crate::school::School;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

// ============================================================================
// CATALOG
// ============================================================================

#[derive(Debug, Clone)]
pub struct Catalog {
    schools: Vec<School>,
    skipped: Vec<SkippedRow>,
    /// SHA-256 of the source text; equal text ⇒ equal fingerprint
    fingerprint: String,
    loaded_at: DateTime<Utc>,
}

impl Catalog {
    pub fn parse(parser: &CatalogParser, text: &str) -> Self {
        let outcome = parser.parse_str(text);
        Catalog {
            schools: outcome.schools,
            skipped: outcome.skipped,
            fingerprint: fingerprint(text),
            loaded_at: Utc::now(),
        }
    }

    pub fn from_schools(schools: Vec<School>) -> Self {
        Catalog {
            schools,
            skipped: Vec::new(),
            fingerprint: fingerprint(""),
            loaded_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::from_schools(Vec::new())
    }

    pub fn schools(&self) -> &[School] {
        &self.schools
    }

    pub fn skipped(&self) -> &[SkippedRow] {
        &self.skipped
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn len(&self) -> usize {
        self.schools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schools.is_empty()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&School> {
        self.schools.iter().find(|s| s.id == id)
    }

    /// First school, in stored order, whose name matches `name`.
    /// `name` is passed to the matcher as the first (external) argument.
    pub fn find_match(&self, matcher: &NameMatcher, name: &str) -> Option<(&School, MatchRule)> {
        self.schools
            .iter()
            .find_map(|s| matcher.match_rule(name, &s.name).map(|rule| (s, rule)))
    }

    /// Keyword search over the local records.
    ///
    /// Blank query → every school. Otherwise terms longer than 2 characters
    /// are matched as substrings of name, address, description, approach and
    /// programmes; any matching term selects the school.
    pub fn search(&self, query: &str) -> Vec<School> {
        if query.trim().is_empty() {
            return self.schools.clone();
        }

        let query = query.to_lowercase();
        let terms: Vec<&str> = query
            .split_whitespace()
            .filter(|t| t.chars().count() > 2)
            .collect();

        self.schools
            .iter()
            .filter(|school| {
                let mut text = vec![
                    school.name.as_str(),
                    school.address.as_deref().unwrap_or(""),
                    school.brief_description.as_str(),
                    school.educational_approach.as_str(),
                ];
                text.extend(school.special_needs_programs.iter().map(String::as_str));
                let text = text.join(" ").to_lowercase();

                terms.iter().any(|term| text.contains(term))
            })
            .cloned()
            .collect()
    }
}

fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// CATALOG HANDLE
// ============================================================================

#[derive(Debug, Clone)]
pub enum CatalogSource {
    File(PathBuf),
    Text(String),
}

/// Lazily-initialized, never-invalidated catalog.
///
/// Concurrent first accesses resolve to a single parse; every consumer sees
/// either nothing yet (and waits) or the complete catalog.
pub struct CatalogHandle {
    source: CatalogSource,
    cell: OnceLock<Arc<Catalog>>,
}

impl CatalogHandle {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self::with_source(CatalogSource::File(path.as_ref().to_path_buf()))
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self::with_source(CatalogSource::Text(text.into()))
    }

    pub fn with_source(source: CatalogSource) -> Self {
        CatalogHandle {
            source,
            cell: OnceLock::new(),
        }
    }

    pub fn source(&self) -> &CatalogSource {
        &self.source
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    /// The catalog, parsing the source on first call
    pub fn get(&self) -> Arc<Catalog> {
        self.cell.get_or_init(|| Arc::new(self.load())).clone()
    }

    fn load(&self) -> Catalog {
        let parser = CatalogParser::new();
        let catalog = match &self.source {
            CatalogSource::Text(text) => Catalog::parse(&parser, text),
            CatalogSource::File(path) => match std::fs::read_to_string(path) {
                Ok(text) => Catalog::parse(&parser, &text),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to load school catalog, continuing with none");
                    Catalog::empty()
                }
            },
        };

        info!(
            schools = catalog.len(),
            skipped = catalog.skipped().len(),
            fingerprint = %&catalog.fingerprint()[..12],
            "School catalog loaded"
        );
        catalog
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::thread;

    const TEXT: &str = "School Name,Address,Educational Approach,Special Needs Programs,Brief Description\n\
        Browns School,Parklands,Remedial,\"OT, Speech\",Small classes\n\
        Oakley House,Tableview,Montessori,,Prep school\n\
        La Vigne,Blouberg,Waldorf,Autism,Nurturing environment";

    #[test]
    fn test_handle_parses_lazily_once() {
        let handle = CatalogHandle::from_text(TEXT);
        assert!(!handle.is_loaded());

        let first = handle.get();
        let second = handle.get();
        assert!(handle.is_loaded());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_concurrent_first_access_sees_one_catalog() {
        let handle = Arc::new(CatalogHandle::from_text(TEXT));

        let catalogs: Vec<Arc<Catalog>> = (0..8)
            .map(|_| {
                let handle = Arc::clone(&handle);
                thread::spawn(move || handle.get())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();

        for catalog in &catalogs {
            assert!(Arc::ptr_eq(catalog, &catalogs[0]));
            assert_eq!(catalog.len(), 3);
        }
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let parser = CatalogParser::new();
        let a = Catalog::parse(&parser, TEXT);
        let b = Catalog::parse(&parser, TEXT);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.schools(), b.schools());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_missing_file_yields_empty_catalog() {
        let handle = CatalogHandle::from_path("/definitely/not/here.csv");
        assert!(handle.get().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TEXT.as_bytes()).unwrap();

        let handle = CatalogHandle::from_path(file.path());
        let catalog = handle.get();
        assert_eq!(catalog.len(), 3);
        assert!(catalog.find_by_id("oakley-house").is_some());
    }

    #[test]
    fn test_find_match_uses_stored_order() {
        let catalog = CatalogHandle::from_text(TEXT).get();
        let matcher = NameMatcher::new();

        let (school, rule) = catalog.find_match(&matcher, "Browns School Parklands").unwrap();
        assert_eq!(school.name, "Browns School");
        assert_eq!(rule, MatchRule::Containment);

        assert!(catalog.find_match(&matcher, "Crossroads").is_none());
    }

    #[test]
    fn test_local_search() {
        let catalog = CatalogHandle::from_text(TEXT).get();

        assert_eq!(catalog.search("").len(), 3);
        let names: Vec<String> = catalog.search("montessori speech").into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Browns School", "Oakley House"]);
        // Terms of 2 characters or fewer are ignored
        assert!(catalog.search("ot").is_empty());
        assert_eq!(catalog.search("AUTISM")[0].name, "La Vigne");
    }
}
