use crate::core::filters::{startup_in_scope, talent_in_scope};
use crate::core::industry::keywords_for;
use crate::models::{CandidateScope, Industry, StartupPosting, TalentProfile};
use crate::services::store::{ProfileRepository, StoreError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when interacting with Appwrite
#[derive(Debug, Error)]
pub enum AppwriteError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: invalid API key or token")]
    Unauthorized,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl From<AppwriteError> for StoreError {
    fn from(err: AppwriteError) -> Self {
        match err {
            AppwriteError::RequestError(e) => StoreError::Unavailable(e.to_string()),
            AppwriteError::ApiError { status, message } if status >= 500 || status == 429 => {
                StoreError::Unavailable(format!("{}: {}", status, message))
            }
            AppwriteError::ApiError { status, message } => {
                StoreError::InvalidData(format!("{}: {}", status, message))
            }
            AppwriteError::NotFound(what) => StoreError::NotFound(what),
            AppwriteError::Unauthorized => StoreError::Unavailable("appwrite rejected credentials".to_string()),
            AppwriteError::InvalidResponse(msg) => StoreError::InvalidData(msg),
        }
    }
}

/// Appwrite API client
///
/// Reads the talent and startup read models the engine scores:
/// - Fetching single or bulk profiles and postings
/// - Founder-owned startups
/// - Candidate queries scoped by skill and industry
pub struct AppwriteClient {
    base_url: String,
    api_key: String,
    project_id: String,
    database_id: String,
    client: Client,
    collections: AppwriteCollections,
}

/// Collection IDs in Appwrite
#[derive(Debug, Clone)]
pub struct AppwriteCollections {
    pub talent_profiles: String,
    pub startups: String,
}

/// `equal("attr", [values])` in Appwrite's query syntax
fn query_equal(attribute: &str, values: &[String]) -> String {
    format!("equal(\"{}\", {})", attribute, json_list(values))
}

/// `contains("attr", [values])` for array attributes
fn query_contains(attribute: &str, values: &[String]) -> String {
    format!("contains(\"{}\", {})", attribute, json_list(values))
}

/// `search("attr", "terms")` against a full-text index
fn query_search(attribute: &str, terms: &str) -> String {
    format!("search(\"{}\", {})", attribute, Value::String(terms.to_string()))
}

fn query_limit(limit: usize) -> String {
    format!("limit({})", limit)
}

fn query_offset(offset: usize) -> String {
    format!("offset({})", offset)
}

/// Page size for listings that must be read to the end
const PAGE_SIZE: usize = 100;

/// Values for an exact-match array query on skill tags
///
/// `contains` on array attributes compares elements exactly, so every tag
/// goes out as written, lowercased and capitalized.
fn skill_terms<I>(tags: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut terms: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            continue;
        }
        let lower = tag.to_lowercase();
        let capitalized = capitalize(&lower);
        for term in [tag.to_string(), lower, capitalized] {
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
    }
    terms
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One page of a document listing
struct DocumentPage<T> {
    documents: Vec<T>,
    /// Documents returned by the backend, including ones that failed to parse
    fetched: usize,
    total: Option<u64>,
}

fn json_list(values: &[String]) -> String {
    Value::Array(values.iter().cloned().map(Value::String).collect()).to_string()
}

impl AppwriteClient {
    /// Create a new Appwrite client
    pub fn new(
        base_url: String,
        api_key: String,
        project_id: String,
        database_id: String,
        collections: AppwriteCollections,
    ) -> Result<Self, AppwriteError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url,
            api_key,
            project_id,
            database_id,
            client,
            collections,
        })
    }

    fn documents_url(&self, collection: &str) -> String {
        format!(
            "{}/databases/{}/collections/{}/documents",
            self.base_url.trim_end_matches('/'),
            self.database_id,
            collection
        )
    }

    /// List documents of a collection matching the given queries
    async fn list_documents<T>(
        &self,
        collection: &str,
        queries: &[String],
    ) -> Result<Vec<T>, AppwriteError>
    where
        T: DeserializeOwned,
    {
        Ok(self.list_page(collection, queries).await?.documents)
    }

    async fn list_page<T>(
        &self,
        collection: &str,
        queries: &[String],
    ) -> Result<DocumentPage<T>, AppwriteError>
    where
        T: DeserializeOwned,
    {
        // Build Appwrite query format: JSON array of query strings
        let queries_json = Value::Array(queries.iter().cloned().map(Value::String).collect()).to_string();
        let url = format!(
            "{}?query={}",
            self.documents_url(collection),
            urlencoding::encode(&queries_json)
        );

        tracing::debug!("Listing {} documents with {} queries", collection, queries.len());

        let response = self
            .client
            .get(&url)
            .header("X-Appwrite-Key", &self.api_key)
            .header("X-Appwrite-Project", &self.project_id)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AppwriteError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unable to read body".to_string());
            tracing::error!("Appwrite list on {} failed: {} - {}", collection, status, body);
            return Err(AppwriteError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let json: Value = response.json().await?;

        let documents = json
            .get("documents")
            .and_then(|d| d.as_array())
            .ok_or_else(|| AppwriteError::InvalidResponse("Missing documents array".into()))?;

        let total = json.get("total").and_then(|t| t.as_u64());

        let parsed: Vec<T> = documents
            .iter()
            .filter_map(|doc| {
                let data = doc.get("data").unwrap_or(doc);
                match serde_json::from_value(data.clone()) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::warn!("Skipping malformed {} document: {}", collection, e);
                        None
                    }
                }
            })
            .collect();

        tracing::debug!(
            "Parsed {} of {} {} documents (total {:?})",
            parsed.len(),
            documents.len(),
            collection,
            total
        );

        Ok(DocumentPage {
            documents: parsed,
            fetched: documents.len(),
            total,
        })
    }

    /// Get a single talent profile by talent ID
    pub async fn fetch_talent(&self, talent_id: &str) -> Result<TalentProfile, AppwriteError> {
        let queries = [query_equal("talentId", &[talent_id.to_string()]), query_limit(1)];
        self.list_documents(&self.collections.talent_profiles, &queries)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppwriteError::NotFound(format!("talent {}", talent_id)))
    }

    /// Get a single startup posting by startup ID
    pub async fn fetch_startup(&self, startup_id: &str) -> Result<StartupPosting, AppwriteError> {
        let queries = [query_equal("startupId", &[startup_id.to_string()]), query_limit(1)];
        self.list_documents(&self.collections.startups, &queries)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppwriteError::NotFound(format!("startup {}", startup_id)))
    }
}

#[async_trait]
impl ProfileRepository for AppwriteClient {
    async fn get_talent(&self, talent_id: &str) -> Result<TalentProfile, StoreError> {
        Ok(self.fetch_talent(talent_id).await?)
    }

    async fn get_startup(&self, startup_id: &str) -> Result<StartupPosting, StoreError> {
        Ok(self.fetch_startup(startup_id).await?)
    }

    async fn get_talents(&self, talent_ids: &[String]) -> Result<Vec<TalentProfile>, StoreError> {
        if talent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let queries = [query_equal("talentId", talent_ids), query_limit(talent_ids.len())];
        Ok(self.list_documents(&self.collections.talent_profiles, &queries).await?)
    }

    async fn get_startups(&self, startup_ids: &[String]) -> Result<Vec<StartupPosting>, StoreError> {
        if startup_ids.is_empty() {
            return Ok(Vec::new());
        }
        let queries = [query_equal("startupId", startup_ids), query_limit(startup_ids.len())];
        Ok(self.list_documents(&self.collections.startups, &queries).await?)
    }

    async fn startups_for_founder(&self, founder_id: &str) -> Result<Vec<StartupPosting>, StoreError> {
        let founder = [founder_id.to_string()];
        let mut startups = Vec::new();
        let mut offset = 0;

        loop {
            let queries = [
                query_equal("founderId", &founder),
                query_limit(PAGE_SIZE),
                query_offset(offset),
            ];
            let page = self
                .list_page::<StartupPosting>(&self.collections.startups, &queries)
                .await?;
            startups.extend(page.documents);
            offset += page.fetched;

            let exhausted = page.total.is_some_and(|total| offset as u64 >= total);
            if page.fetched < PAGE_SIZE || exhausted {
                break;
            }
        }

        Ok(startups)
    }

    async fn talent_candidates(&self, scope: &CandidateScope) -> Result<Vec<TalentProfile>, StoreError> {
        let mut candidates: Vec<TalentProfile> = Vec::new();

        // The backend cannot OR across attributes, so skill and industry
        // candidates come from separate queries and are merged here
        let skills = skill_terms(scope.skill_tags.iter().chain(&scope.skills));
        if !skills.is_empty() {
            let queries = [query_contains("skills", &skills), query_limit(scope.limit)];
            candidates.extend(
                self.list_documents::<TalentProfile>(&self.collections.talent_profiles, &queries)
                    .await?,
            );
        }
        // Industry interest shows up as the name or any keyword in the bio,
        // or as keyword skill tags
        for industry in scope.industries.iter().filter(|i| **i != Industry::Other) {
            let keywords = keywords_for(*industry);
            let mut bio_terms = vec![industry.display_name()];
            bio_terms.extend_from_slice(keywords);
            let queries = [query_search("bio", &bio_terms.join(" ")), query_limit(scope.limit)];
            candidates.extend(
                self.list_documents::<TalentProfile>(&self.collections.talent_profiles, &queries)
                    .await?,
            );

            let keyword_tags = skill_terms(keywords);
            if !keyword_tags.is_empty() {
                let queries = [query_contains("skills", &keyword_tags), query_limit(scope.limit)];
                candidates.extend(
                    self.list_documents::<TalentProfile>(&self.collections.talent_profiles, &queries)
                        .await?,
                );
            }
        }

        candidates.sort_by(|a, b| a.talent_id.cmp(&b.talent_id));
        candidates.dedup_by(|a, b| a.talent_id == b.talent_id);
        candidates.retain(|t| talent_in_scope(t, scope));
        candidates.truncate(scope.limit);

        Ok(candidates)
    }

    async fn startup_candidates(&self, scope: &CandidateScope) -> Result<Vec<StartupPosting>, StoreError> {
        let mut candidates: Vec<StartupPosting> = Vec::new();

        if !scope.industries.is_empty() {
            let industries: Vec<String> = scope
                .industries
                .iter()
                .map(|i| i.display_name().to_string())
                .collect();
            let queries = [query_equal("industry", &industries), query_limit(scope.limit)];
            candidates.extend(
                self.list_documents::<StartupPosting>(&self.collections.startups, &queries)
                    .await?,
            );
        }
        let skills = skill_terms(scope.skill_tags.iter().chain(&scope.skills));
        if !skills.is_empty() {
            let queries = [query_contains("skillsNeeded", &skills), query_limit(scope.limit)];
            candidates.extend(
                self.list_documents::<StartupPosting>(&self.collections.startups, &queries)
                    .await?,
            );
        }

        candidates.sort_by(|a, b| a.startup_id.cmp(&b.startup_id));
        candidates.dedup_by(|a, b| a.startup_id == b.startup_id);
        candidates.retain(|s| startup_in_scope(s, scope));
        candidates.truncate(scope.limit);

        Ok(candidates)
    }
}
