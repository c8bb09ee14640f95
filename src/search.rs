// 🌐 Search Provider Boundary - requests out, partial schools in
//
// The provider itself (a grounded LLM/maps search) lives outside this crate.
// What lives here:
// - SearchRequest:  query + location, validated before any provider call
// - SearchProvider: the seam a real provider implements
// - decoding:       provider text → PartialSchool records, never failing
// - resources:      parent-facing articles on a topic, decoded the same way
// - SearchSession:  one reconciled result set with its provenance

use crate::error::{FinderError, Result};
use crate::reconciliation::{CatalogMatch, ReconciliationReport};
use crate::school::{PartialSchool, School};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// Topic used when the resource library is opened without one
pub const DEFAULT_RESOURCE_TOPIC: &str = "ADHD management in educational settings";

static JSON_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json[ \t]*\r?\n(.*?)\r?\n[ \t]*```").expect("valid fence pattern"));

// ============================================================================
// REQUEST
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub location: String,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, location: impl Into<String>) -> Self {
        SearchRequest {
            query: query.into(),
            location: location.into(),
        }
    }

    /// Both fields are required; location is checked first
    pub fn validate(&self) -> Result<()> {
        if self.location.trim().is_empty() {
            return Err(FinderError::MissingLocation);
        }
        if self.query.trim().is_empty() {
            return Err(FinderError::MissingQuery);
        }
        Ok(())
    }
}

// ============================================================================
// RESPONSE
// ============================================================================

/// A web/maps page the provider grounded its answer on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub uri: String,
    #[serde(default)]
    pub title: String,
}

impl GroundingSource {
    /// Accepts `{uri, title}` or the chunk shapes `{web: {...}}` / `{maps: {...}}`
    fn from_value(value: &Value) -> Option<Self> {
        let inner = value
            .get("web")
            .or_else(|| value.get("maps"))
            .unwrap_or(value);

        let uri = inner.get("uri")?.as_str()?.trim();
        if uri.is_empty() {
            return None;
        }
        let title = inner
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or(uri)
            .to_string();

        Some(GroundingSource {
            uri: uri.to_string(),
            title,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderResponse {
    pub schools: Vec<PartialSchool>,
    pub sources: Vec<GroundingSource>,
}

impl ProviderResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(schools: Vec<PartialSchool>) -> Self {
        ProviderResponse {
            schools,
            sources: Vec::new(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<GroundingSource>) -> Self {
        self.sources = sources;
        self
    }
}

/// The JSON payload of a provider answer: the first fenced ```json block
/// when present, otherwise the whole text.
fn extract_payload(text: &str) -> Option<Value> {
    let payload = match JSON_FENCE_RE.captures(text) {
        Some(caps) => serde_json::from_str::<Value>(&caps[1]),
        None => serde_json::from_str::<Value>(text.trim()),
    };

    match payload {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "Could not find or parse JSON in the provider response");
            None
        }
    }
}

fn sources_from_map(map: &Map<String, Value>) -> Vec<GroundingSource> {
    map.get("sources")
        .or_else(|| map.get("groundingChunks"))
        .and_then(Value::as_array)
        .map(|chunks| chunks.iter().filter_map(GroundingSource::from_value).collect())
        .unwrap_or_default()
}

/// Decode provider text into a response. Never fails.
///
/// The payload is either an array of school records or an object with
/// `schools` and optional `sources` (or `groundingChunks`). Anything that
/// does not decode yields zero schools.
pub fn parse_provider_response(text: &str) -> ProviderResponse {
    extract_payload(text)
        .map(|value| response_from_value(&value))
        .unwrap_or_default()
}

pub fn response_from_value(value: &Value) -> ProviderResponse {
    match value {
        Value::Array(records) => ProviderResponse::new(decode_records(records)),
        Value::Object(map) => {
            let schools = map
                .get("schools")
                .and_then(Value::as_array)
                .map(|records| decode_records(records))
                .unwrap_or_default();
            ProviderResponse {
                schools,
                sources: sources_from_map(map),
            }
        }
        _ => {
            warn!("Provider response is neither a list nor an object, treating as no schools");
            ProviderResponse::empty()
        }
    }
}

/// Decode each record on its own; non-objects are dropped
fn decode_records(records: &[Value]) -> Vec<PartialSchool> {
    records
        .iter()
        .enumerate()
        .filter_map(|(i, record)| {
            if !record.is_object() {
                debug!(index = i, "Dropping provider record that is not an object");
                return None;
            }
            match serde_json::from_value::<PartialSchool>(record.clone()) {
                Ok(school) => Some(school),
                Err(e) => {
                    debug!(index = i, error = %e, "Dropping undecodable provider record");
                    None
                }
            }
        })
        .collect()
}

// ============================================================================
// RESOURCE LIBRARY
// ============================================================================

/// An article or guide for parents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceArticle {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

impl ResourceArticle {
    pub fn new(title: impl Into<String>, link: impl Into<String>, snippet: impl Into<String>) -> Self {
        ResourceArticle {
            title: title.into(),
            link: link.into(),
            snippet: snippet.into(),
        }
    }

    /// Lenient decode: `link` may also arrive as `url` or `uri`, a missing
    /// title falls back to the link, and a record with neither is dropped.
    fn from_value(value: &Value) -> Option<Self> {
        let text = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| value.get(*k).and_then(Value::as_str))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };

        let link = text(&["link", "url", "uri"]);
        let title = text(&["title"]);
        if title.is_empty() && link.is_empty() {
            return None;
        }

        Some(ResourceArticle {
            title: if title.is_empty() { link.clone() } else { title },
            link,
            snippet: text(&["snippet", "summary"]),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceResponse {
    pub articles: Vec<ResourceArticle>,
    pub sources: Vec<GroundingSource>,
}

impl ResourceResponse {
    pub fn new(articles: Vec<ResourceArticle>) -> Self {
        ResourceResponse {
            articles,
            sources: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

/// Decode a resource-library answer. Never fails; undecodable text is no articles.
pub fn parse_resource_response(text: &str) -> ResourceResponse {
    extract_payload(text)
        .map(|value| resources_from_value(&value))
        .unwrap_or_default()
}

/// An array of articles, or an object with `articles` (or `resources`) and sources
pub fn resources_from_value(value: &Value) -> ResourceResponse {
    let decode = |records: &[Value]| -> Vec<ResourceArticle> {
        records.iter().filter_map(ResourceArticle::from_value).collect()
    };

    match value {
        Value::Array(records) => ResourceResponse::new(decode(records)),
        Value::Object(map) => ResourceResponse {
            articles: map
                .get("articles")
                .or_else(|| map.get("resources"))
                .and_then(Value::as_array)
                .map(|records| decode(records))
                .unwrap_or_default(),
            sources: sources_from_map(map),
        },
        _ => {
            warn!("Resource response is neither a list nor an object, treating as no articles");
            ResourceResponse::default()
        }
    }
}

// ============================================================================
// PROVIDERS
// ============================================================================

/// External school search.
///
/// Implementations report transport/provider failures as errors; the finder
/// turns those into an empty result set.
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    fn find_schools(&self, request: &SearchRequest) -> Result<ProviderResponse>;

    /// Parent resources on a topic. Providers without a library return none.
    fn find_resources(&self, _topic: &str) -> Result<ResourceResponse> {
        Ok(ResourceResponse::default())
    }
}

/// Replays a saved provider response from disk
pub struct JsonFileProvider {
    path: PathBuf,
}

impl JsonFileProvider {
    pub fn new(path: impl AsRef<Path>) -> Self {
        JsonFileProvider {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SearchProvider for JsonFileProvider {
    fn name(&self) -> &str {
        "json-file"
    }

    fn find_schools(&self, _request: &SearchRequest) -> Result<ProviderResponse> {
        let text = std::fs::read_to_string(&self.path)?;
        Ok(parse_provider_response(&text))
    }

    fn find_resources(&self, _topic: &str) -> Result<ResourceResponse> {
        let text = std::fs::read_to_string(&self.path)?;
        Ok(parse_resource_response(&text))
    }
}

/// Fixed response, whatever the request
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    response: ProviderResponse,
    resources: ResourceResponse,
}

impl StaticProvider {
    pub fn new(response: ProviderResponse) -> Self {
        StaticProvider {
            response,
            resources: ResourceResponse::default(),
        }
    }

    pub fn with_resources(mut self, resources: ResourceResponse) -> Self {
        self.resources = resources;
        self
    }
}

impl SearchProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn find_schools(&self, _request: &SearchRequest) -> Result<ProviderResponse> {
        Ok(self.response.clone())
    }

    fn find_resources(&self, _topic: &str) -> Result<ResourceResponse> {
        Ok(self.resources.clone())
    }
}

// ============================================================================
// SESSION
// ============================================================================

/// One reconciled search result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub request: SearchRequest,
    pub provider: String,
    /// Reconciled schools, in provider order
    pub schools: Vec<School>,
    /// Parallel to `schools`: the catalog record each one was merged with
    pub matches: Vec<Option<CatalogMatch>>,
    pub report: ReconciliationReport,
    pub sources: Vec<GroundingSource>,
}

impl SearchSession {
    pub fn new(request: SearchRequest, provider: impl Into<String>) -> Self {
        SearchSession {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            request,
            provider: provider.into(),
            schools: Vec::new(),
            matches: Vec::new(),
            report: ReconciliationReport::default(),
            sources: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.schools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schools.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&School> {
        self.schools.iter().find(|s| s.id == id)
    }
}

// ============================================================================
// TESTS
// ============================================================================
