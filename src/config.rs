// ⚙️ Finder configuration - defaults overlaid by SCHOOL_FINDER_* env vars

use crate::matcher::NameMatcher;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ENV_CATALOG: &str = "SCHOOL_FINDER_CATALOG";
pub const ENV_DB: &str = "SCHOOL_FINDER_DB";
pub const ENV_FEE_DOCS: &str = "SCHOOL_FINDER_FEE_DOCS";
pub const ENV_ADDR: &str = "SCHOOL_FINDER_ADDR";
pub const ENV_LOG: &str = "SCHOOL_FINDER_LOG";
pub const ENV_MATCH_THRESHOLD: &str = "SCHOOL_FINDER_MATCH_THRESHOLD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinderConfig {
    /// Local school dataset (delimited text)
    pub catalog_path: PathBuf,
    /// SQLite file holding bookmarks
    pub bookmarks_db: PathBuf,
    /// Directory served under /fee-pdfs
    pub fee_documents_dir: PathBuf,
    pub server_addr: String,
    /// tracing filter directive, e.g. "info" or "school_finder=debug"
    pub log_level: String,
    /// Token overlap a provider name must exceed to match a catalog name
    pub match_threshold: f64,
}

impl Default for FinderConfig {
    fn default() -> Self {
        FinderConfig {
            catalog_path: PathBuf::from("data/schools_parklands_blouberg.csv"),
            bookmarks_db: PathBuf::from("school_finder.db"),
            fee_documents_dir: PathBuf::from("fee-pdfs"),
            server_addr: "0.0.0.0:3000".to_string(),
            log_level: "info".to_string(),
            match_threshold: NameMatcher::new().overlap_threshold,
        }
    }
}

impl FinderConfig {
    /// Defaults, overridden by any non-empty SCHOOL_FINDER_* variable
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = FinderConfig::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var(ENV_CATALOG) {
            config.catalog_path = PathBuf::from(v);
        }
        if let Some(v) = var(ENV_DB) {
            config.bookmarks_db = PathBuf::from(v);
        }
        if let Some(v) = var(ENV_FEE_DOCS) {
            config.fee_documents_dir = PathBuf::from(v);
        }
        if let Some(v) = var(ENV_ADDR) {
            config.server_addr = v;
        }
        if let Some(v) = var(ENV_LOG) {
            config.log_level = v;
        }
        // Out-of-range or unparsable thresholds keep the default
        if let Some(v) = var(ENV_MATCH_THRESHOLD)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| (0.0..1.0).contains(v))
        {
            config.match_threshold = v;
        }

        config
    }

    pub fn matcher(&self) -> NameMatcher {
        NameMatcher {
            overlap_threshold: self.match_threshold,
            ..NameMatcher::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = FinderConfig::default();
        assert_eq!(config.catalog_path, PathBuf::from("data/schools_parklands_blouberg.csv"));
        assert_eq!(config.server_addr, "0.0.0.0:3000");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_CATALOG, "/srv/schools.csv"),
            (ENV_ADDR, "127.0.0.1:8080"),
            (ENV_LOG, "  "),
        ]);
        let config = FinderConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.catalog_path, PathBuf::from("/srv/schools.csv"));
        assert_eq!(config.server_addr, "127.0.0.1:8080");
        // Blank values are ignored
        assert_eq!(config.log_level, "info");
        assert_eq!(config.bookmarks_db, PathBuf::from("school_finder.db"));
    }

    #[test]
    fn test_match_threshold_override() {
        let config = FinderConfig::from_lookup(|k| (k == ENV_MATCH_THRESHOLD).then(|| "0.3".to_string()));
        assert_eq!(config.matcher().overlap_threshold, 0.3);
        assert_eq!(config.matcher().min_token_len, 3);

        for bad in ["1.5", "-0.1", "half"] {
            let config = FinderConfig::from_lookup(|k| (k == ENV_MATCH_THRESHOLD).then(|| bad.to_string()));
            assert_eq!(config.matcher(), NameMatcher::new());
        }
    }

    #[test]
    fn test_partial_json_config() {
        let config: FinderConfig = serde_json::from_str(r#"{"bookmarks_db": "/tmp/b.db"}"#).unwrap();
        assert_eq!(config.bookmarks_db, PathBuf::from("/tmp/b.db"));
        assert_eq!(config.fee_documents_dir, PathBuf::from("fee-pdfs"));
    }
}
