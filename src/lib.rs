// School Finder - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod error;
pub mod school;
pub mod tuition;
pub mod parser;
pub mod catalog;
pub mod matcher;
pub mod reconciliation;
pub mod query;
pub mod compare;
pub mod search;
pub mod bookmarks;
pub mod finder;
pub mod config;

// Re-export commonly used types
pub use error::{FinderError, Result};
pub use school::{
    EnrollmentStatus, PartialSchool, School, Testimonial, TriState,
    school_id, CONTACT_FOR_FEES, DEFAULT_CLASS_SIZE,
};
pub use tuition::tuition_amount;
pub use parser::{
    CatalogParser, Column, ParseOutcome, SkipReason, SkippedRow,
    fee_document_for, format_tuition, parse_flag,
};
pub use catalog::{Catalog, CatalogHandle, CatalogSource};
pub use matcher::{MatchRule, NameMatcher, names_match, normalize_name};
pub use reconciliation::{
    CatalogMatch, ReconciledSchool, ReconciliationReport, Reconciler, merge,
};
pub use query::{
    FilterConfig, QuickFilter, SortKey, ViewConfig,
    apply, display_list, filter_schools, sort_schools,
};
pub use compare::{CompareSet, ComparisonRow, comparison_rows, MAX_COMPARE};
pub use search::{
    GroundingSource, JsonFileProvider, ProviderResponse, ResourceArticle, ResourceResponse,
    SearchProvider, SearchRequest, SearchSession, StaticProvider, parse_provider_response,
    parse_resource_response, DEFAULT_RESOURCE_TOPIC,
};
pub use bookmarks::{BookmarkStore, BOOKMARKS_KEY};
pub use finder::SchoolFinder;
pub use config::FinderConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
