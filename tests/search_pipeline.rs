use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use school_finder::{
    BookmarkStore, CatalogHandle, CompareSet, FilterConfig, FinderError, JsonFileProvider,
    QuickFilter, SchoolFinder, SearchRequest, SearchSession, SortKey, TriState, ViewConfig,
    DEFAULT_RESOURCE_TOPIC,
};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn finder_with(results: &str) -> SchoolFinder {
    let catalog = Arc::new(CatalogHandle::from_path(fixtures_dir().join("catalog.csv")));
    let provider = JsonFileProvider::new(fixtures_dir().join(results));
    SchoolFinder::new(catalog, Box::new(provider))
}

fn run_search() -> (SchoolFinder, SearchSession) {
    let finder = finder_with("provider_response.md");
    let session = finder
        .search(SearchRequest::new("ADHD and autism support", "Parklands"))
        .unwrap();
    (finder, session)
}

/// Fees in the catalog are annual; widen the default monthly ceiling
fn wide_view(sort: SortKey) -> ViewConfig {
    ViewConfig {
        filters: FilterConfig {
            tuition: (0, 200_000),
            ..FilterConfig::default()
        },
        sort,
        bookmarks_only: false,
    }
}

fn names(schools: &[school_finder::School]) -> Vec<&str> {
    schools.iter().map(|s| s.name.as_str()).collect()
}

// -------------------------------------------------------------------------
// Reconciliation
// -------------------------------------------------------------------------

#[test]
fn catalog_skips_malformed_rows() {
    let (finder, _) = run_search();
    let catalog = finder.catalog();
    assert_eq!(catalog.len(), 4);
    assert_eq!(catalog.skipped().len(), 1);
}

#[test]
fn session_keeps_provider_order_and_length() {
    let (_, session) = run_search();

    // The non-object record is dropped while decoding
    assert_eq!(
        names(&session.schools),
        vec![
            "Browns School",
            "Oakley House Preparatory",
            "Blouberg International School",
            "Crossroads School",
        ]
    );
    assert_eq!(session.report.total, 4);
    assert_eq!(session.report.matched, 3);
    assert_eq!(session.report.passed_through, 1);
    assert!(session.matches[3].is_none());
}

#[test]
fn merged_records_follow_local_precedence() {
    let (_, session) = run_search();

    let browns = session.find("browns-school").unwrap();
    assert!(browns.adhd_support);
    assert_eq!(browns.autism_support, TriState::Yes);
    assert_eq!(browns.distance_km, Some(3.2));
    assert_eq!(browns.tuition_range, "R98,400 (R9,840 per month)");
    assert_eq!(browns.average_rating(), 5.0);

    let oakley = session.find("oakley-house-preparatory").unwrap();
    assert_eq!(oakley.average_class_size, 14);
    assert_eq!(oakley.autism_support, TriState::Yes);
    assert_eq!((oakley.lat, oakley.lng), (-33.81, 18.49));

    let blouberg = session.find("blouberg-international-school").unwrap();
    // Known local "No" is kept over the provider's "true"
    assert_eq!(blouberg.autism_support, TriState::No);
    assert!(blouberg.has_sensory_friendly_facilities);

    let crossroads = session.find("crossroads-school").unwrap();
    assert_eq!(crossroads.tuition_range, "R9,500 per month");
    assert_eq!(crossroads.autism_support, TriState::No);
}

// -------------------------------------------------------------------------
// Display list
// -------------------------------------------------------------------------

#[test]
fn sort_keys_produce_distinct_orders() {
    let (finder, session) = run_search();
    let none = BTreeSet::new();

    let by_distance = finder.view(&session, &wide_view(SortKey::Distance), &none);
    assert_eq!(
        names(&by_distance),
        vec![
            "Blouberg International School",
            "Browns School",
            "Oakley House Preparatory",
            "Crossroads School",
        ]
    );

    let by_rating = finder.view(&session, &wide_view(SortKey::Rating), &none);
    assert_eq!(
        names(&by_rating),
        vec![
            "Browns School",
            "Oakley House Preparatory",
            "Blouberg International School",
            "Crossroads School",
        ]
    );

    let by_tuition = finder.view(&session, &wide_view(SortKey::TuitionLow), &none);
    assert_eq!(
        names(&by_tuition),
        vec![
            "Crossroads School",
            "Oakley House Preparatory",
            "Browns School",
            "Blouberg International School",
        ]
    );
}

#[test]
fn default_filters_apply_monthly_fee_ceiling() {
    let (finder, session) = run_search();
    let schools = finder.view(&session, &ViewConfig::default(), &BTreeSet::new());
    assert_eq!(names(&schools), vec!["Crossroads School"]);
}

#[test]
fn quick_filter_narrows_results() {
    let (finder, session) = run_search();
    let mut view = wide_view(SortKey::Name);
    view.filters.toggle(QuickFilter::SensoryFriendly);

    let schools = finder.view(&session, &view, &BTreeSet::new());
    assert_eq!(names(&schools), vec!["Blouberg International School"]);

    view.filters.clear();
    assert_eq!(view.filters, FilterConfig::default());
}

#[test]
fn bookmarks_only_view_uses_persisted_ids() {
    let dir = tempfile::tempdir().unwrap();
    let store = BookmarkStore::open(dir.path().join("bookmarks.db")).unwrap();
    store.toggle("oakley-house-preparatory");
    store.toggle("la-vigne");

    let (finder, session) = run_search();
    let view = ViewConfig {
        bookmarks_only: true,
        ..wide_view(SortKey::Rating)
    };

    let reopened = BookmarkStore::open(dir.path().join("bookmarks.db")).unwrap();
    let schools = finder.view(&session, &view, &reopened.load());
    assert_eq!(names(&schools), vec!["Oakley House Preparatory"]);
}

#[test]
fn compare_set_caps_at_four() {
    let (_, session) = run_search();
    let mut compare = CompareSet::new();

    for school in &session.schools {
        compare.toggle(&school.id).unwrap();
    }
    assert!(matches!(
        compare.toggle("la-vigne"),
        Err(FinderError::CompareLimit { limit: 4 })
    ));
    assert_eq!(compare.selected(&session.schools).len(), 4);
}

// -------------------------------------------------------------------------
// Resource library
// -------------------------------------------------------------------------

#[test]
fn resource_library_reads_saved_answer() {
    let finder = finder_with("resources.md");
    let response = finder.resources(DEFAULT_RESOURCE_TOPIC).unwrap();

    let titles: Vec<&str> = response.articles.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Classroom strategies for ADHD", "Understanding IEPs in South African schools"]
    );
    assert_eq!(response.articles[1].link, "https://example.org/iep-guide");
    assert_eq!(response.articles[1].snippet, "");
    assert_eq!(response.sources[0].title, "Example Parenting");
}

#[test]
fn school_answer_has_no_articles() {
    let finder = finder_with("provider_response.md");
    assert!(finder.resources("autism").unwrap().is_empty());
    assert!(matches!(finder.resources(""), Err(FinderError::MissingTopic)));
}

// -------------------------------------------------------------------------
// Failure paths
// -------------------------------------------------------------------------

#[test]
fn missing_provider_output_is_zero_schools() {
    let finder = finder_with("does_not_exist.json");
    let session = finder
        .search(SearchRequest::new("remedial", "Parklands"))
        .unwrap();

    assert!(session.is_empty());
    for sort in SortKey::ALL {
        assert!(finder.view(&session, &wide_view(sort), &BTreeSet::new()).is_empty());
    }
}

#[test]
fn missing_location_is_rejected() {
    let finder = finder_with("provider_response.md");
    assert!(matches!(
        finder.search(SearchRequest::new("remedial", " ")),
        Err(FinderError::MissingLocation)
    ));
}
