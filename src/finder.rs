// 🧭 School Finder - composition root
//
// catalog handle + matcher + provider
//   → search():  validate → provider → reconcile → SearchSession
//   → view():    bookmark restriction → filter → sort

use crate::catalog::{Catalog, CatalogHandle};
use crate::error::Result;
use crate::matcher::NameMatcher;
use crate::query::{display_list, ViewConfig};
use crate::reconciliation::Reconciler;
use crate::school::School;
use crate::error::FinderError;
use crate::search::{ProviderResponse, ResourceResponse, SearchProvider, SearchRequest, SearchSession};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

pub struct SchoolFinder {
    catalog: Arc<CatalogHandle>,
    matcher: NameMatcher,
    provider: Box<dyn SearchProvider>,
}

impl SchoolFinder {
    pub fn new(catalog: Arc<CatalogHandle>, provider: Box<dyn SearchProvider>) -> Self {
        SchoolFinder {
            catalog,
            matcher: NameMatcher::new(),
            provider,
        }
    }

    pub fn with_matcher(mut self, matcher: NameMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        self.catalog.get()
    }

    /// Run one search.
    ///
    /// Only a request without location or query fails. A provider error is
    /// logged and treated as zero schools.
    pub fn search(&self, request: SearchRequest) -> Result<SearchSession> {
        request.validate()?;

        let response = match self.provider.find_schools(&request) {
            Ok(response) => response,
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "Search provider failed, continuing with no results");
                ProviderResponse::empty()
            }
        };

        Ok(self.reconcile_response(request, response))
    }

    /// Reconcile an already-fetched provider response into a session
    pub fn reconcile_response(&self, request: SearchRequest, response: ProviderResponse) -> SearchSession {
        let reconciler = Reconciler::new(self.catalog.get(), self.matcher);
        let (results, report) = reconciler.reconcile_all(&response.schools);

        info!(
            query = %request.query,
            location = %request.location,
            "{}",
            report.summary()
        );

        let mut session = SearchSession::new(request, self.provider.name());
        session.matches = results.iter().map(|r| r.matched.clone()).collect();
        session.schools = results.into_iter().map(|r| r.school).collect();
        session.report = report;
        session.sources = response.sources;
        session
    }

    pub fn view(&self, session: &SearchSession, view: &ViewConfig, bookmarks: &BTreeSet<String>) -> Vec<School> {
        display_list(&session.schools, view, bookmarks)
    }

    /// Resource library lookup. A blank topic fails; a provider error is
    /// logged and treated as no articles.
    pub fn resources(&self, topic: &str) -> Result<ResourceResponse> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(FinderError::MissingTopic);
        }

        match self.provider.find_resources(topic) {
            Ok(response) => {
                info!(topic, articles = response.articles.len(), "Resource library results");
                Ok(response)
            }
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "Resource lookup failed, continuing with no articles");
                Ok(ResourceResponse::default())
            }
        }
    }

    /// Keyword search over the local catalog only
    pub fn browse_catalog(&self, query: &str) -> Vec<School> {
        self.catalog.get().search(query)
    }
}
