//! Entry points that decide which pairs to score and hand them to the
//! synchronizer.

use crate::core::filters::{scope_for_startup, scope_for_talent};
use crate::core::Matcher;
use crate::engine::retry::retry_with_backoff;
use crate::engine::sync::MatchSynchronizer;
use crate::error::EngineError;
use crate::models::{ChangeEvent, EntityType, RecomputeReport, StartupPosting, TalentProfile};
use crate::services::{MatchStore, ProfileRepository};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const TALENT_SCORING_FIELDS: [&str; 2] = ["skills", "bio"];
const STARTUP_SCORING_FIELDS: [&str; 4] = ["industry", "stage", "skillsNeeded", "skills_needed"];

/// Whether a change event can move any score
///
/// Events without a field list are treated as full changes.
pub fn affects_scoring(event: &ChangeEvent) -> bool {
    if event.changed_fields.is_empty() {
        return true;
    }
    let relevant: &[&str] = match event.entity_type {
        EntityType::Talent => &TALENT_SCORING_FIELDS,
        EntityType::Startup => &STARTUP_SCORING_FIELDS,
    };
    event
        .changed_fields
        .iter()
        .any(|field| relevant.contains(&field.as_str()))
}

/// De-duplicate ids and reject empty sets and blank ids
fn validate_ids(kind: &str, ids: &[String]) -> Result<Vec<String>, EngineError> {
    if ids.is_empty() {
        return Err(EngineError::Input(format!("at least one {} id is required", kind)));
    }
    let mut unique = BTreeSet::new();
    for id in ids {
        let id = id.trim();
        if id.is_empty() {
            return Err(EngineError::Input(format!("blank {} id", kind)));
        }
        unique.insert(id.to_string());
    }
    Ok(unique.into_iter().collect())
}

fn ensure_all_found<'a>(
    kind: &str,
    requested: &[String],
    found: impl Iterator<Item = &'a str>,
) -> Result<(), EngineError> {
    let found: BTreeSet<&str> = found.collect();
    let missing: Vec<&str> = requested
        .iter()
        .map(String::as_str)
        .filter(|id| !found.contains(id))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Input(format!("unknown {} ids: {}", kind, missing.join(", "))))
    }
}

/// Recomputes match records for explicit pairs, single entities, or
/// change-feed events
///
/// Every entry point is idempotent: re-running it with unchanged inputs
/// leaves the stored records untouched.
pub struct RecomputeTrigger {
    profiles: Arc<dyn ProfileRepository>,
    matcher: Matcher,
    sync: Arc<MatchSynchronizer>,
    candidate_limit: usize,
}

impl RecomputeTrigger {
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        matcher: Matcher,
        sync: Arc<MatchSynchronizer>,
        candidate_limit: usize,
    ) -> Self {
        Self {
            profiles,
            matcher,
            sync,
            candidate_limit,
        }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Score and persist the cross product of the given talents and startups
    pub async fn recompute(
        &self,
        talent_ids: &[String],
        startup_ids: &[String],
    ) -> Result<RecomputeReport, EngineError> {
        let talent_ids = validate_ids("talent", talent_ids)?;
        let startup_ids = validate_ids("startup", startup_ids)?;
        let retry = self.sync.policy().store_retry;

        let talents =
            retry_with_backoff(retry, "get_talents", || self.profiles.get_talents(&talent_ids)).await?;
        ensure_all_found("talent", &talent_ids, talents.iter().map(|t| t.talent_id.as_str()))?;

        let startups =
            retry_with_backoff(retry, "get_startups", || self.profiles.get_startups(&startup_ids)).await?;
        ensure_all_found("startup", &startup_ids, startups.iter().map(|s| s.startup_id.as_str()))?;

        let pairs = self.matcher.score_pairs(&talents, &startups);
        tracing::info!(
            "Recomputing {} pairs ({} talents x {} startups)",
            pairs.len(),
            talents.len(),
            startups.len()
        );

        self.sync.upsert(pairs).await.into_result()
    }

    /// Fan out from one talent to the startups that could match it
    pub async fn recompute_for_talent(&self, talent_id: &str) -> Result<RecomputeReport, EngineError> {
        let talent_id = validate_ids("talent", &[talent_id.to_string()])?.remove(0);
        let retry = self.sync.policy().store_retry;

        let talent = retry_with_backoff(retry, "get_talent", || self.profiles.get_talent(&talent_id)).await?;
        self.fan_out_from_talent(talent).await
    }

    /// Fan out from one startup to the talent that could match it
    pub async fn recompute_for_startup(&self, startup_id: &str) -> Result<RecomputeReport, EngineError> {
        let startup_id = validate_ids("startup", &[startup_id.to_string()])?.remove(0);
        let retry = self.sync.policy().store_retry;

        let startup =
            retry_with_backoff(retry, "get_startup", || self.profiles.get_startup(&startup_id)).await?;
        self.fan_out_from_startup(startup).await
    }

    /// Fan out from every startup a founder owns
    ///
    /// Postings come straight from the founder listing, never from the
    /// read-model cache.
    pub async fn recompute_for_founder(&self, founder_id: &str) -> Result<RecomputeReport, EngineError> {
        let founder_id = validate_ids("founder", &[founder_id.to_string()])?.remove(0);
        let retry = self.sync.policy().store_retry;

        let startups = retry_with_backoff(retry, "startups_for_founder", || {
            self.profiles.startups_for_founder(&founder_id)
        })
        .await?;

        let mut outcomes = Vec::new();
        for startup in startups {
            self.profiles.invalidate(EntityType::Startup, &startup.startup_id).await;
            match self.fan_out_from_startup(startup).await {
                Ok(report) | Err(EngineError::PartialBatchFailure(report)) => {
                    outcomes.extend(report.outcomes)
                }
                Err(e) => return Err(e),
            }
        }

        RecomputeReport { outcomes }.into_result()
    }

    /// Talent fan-out on the current profile, dropping any cached copy first
    pub async fn refresh_talent(&self, talent_id: &str) -> Result<RecomputeReport, EngineError> {
        let talent_id = validate_ids("talent", &[talent_id.to_string()])?.remove(0);
        self.profiles.invalidate(EntityType::Talent, &talent_id).await;
        self.recompute_for_talent(&talent_id).await
    }

    /// Scoped candidates plus every startup already matched with the talent
    async fn fan_out_from_talent(&self, talent: TalentProfile) -> Result<RecomputeReport, EngineError> {
        let retry = self.sync.policy().store_retry;
        let talent_id = talent.talent_id.as_str();

        let scope = scope_for_talent(&talent, self.candidate_limit);
        let mut candidates =
            retry_with_backoff(retry, "startup_candidates", || self.profiles.startup_candidates(&scope))
                .await?;

        let matched: BTreeSet<String> =
            retry_with_backoff(retry, "list_for_talent", || self.sync.store().list_for_talent(talent_id))
                .await?
                .into_iter()
                .map(|record| record.startup_id)
                .collect();
        let missing: Vec<String> = matched
            .iter()
            .filter(|id| !candidates.iter().any(|s| &s.startup_id == *id))
            .cloned()
            .collect();
        if !missing.is_empty() {
            candidates.extend(
                retry_with_backoff(retry, "get_startups", || self.profiles.get_startups(&missing)).await?,
            );
        }

        let pairs = self.matcher.score_startup_candidates(&talent, &candidates, &matched);
        tracing::info!(
            "Talent {}: {} of {} candidate startups scored ({} previously matched)",
            talent_id,
            pairs.len(),
            candidates.len(),
            matched.len()
        );

        self.sync.upsert(pairs).await.into_result()
    }

    /// Scoped candidates plus every talent already matched with the startup
    async fn fan_out_from_startup(&self, startup: StartupPosting) -> Result<RecomputeReport, EngineError> {
        let retry = self.sync.policy().store_retry;
        let startup_ids = [startup.startup_id.clone()];

        let scope = scope_for_startup(&startup, self.candidate_limit);
        let mut candidates =
            retry_with_backoff(retry, "talent_candidates", || self.profiles.talent_candidates(&scope))
                .await?;

        let matched: BTreeSet<String> =
            retry_with_backoff(retry, "list_for_startups", || self.sync.store().list_for_startups(&startup_ids))
                .await?
                .into_iter()
                .map(|record| record.talent_id)
                .collect();
        let missing: Vec<String> = matched
            .iter()
            .filter(|id| !candidates.iter().any(|t| &t.talent_id == *id))
            .cloned()
            .collect();
        if !missing.is_empty() {
            candidates.extend(
                retry_with_backoff(retry, "get_talents", || self.profiles.get_talents(&missing)).await?,
            );
        }

        let pairs = self.matcher.score_talent_candidates(&startup, &candidates, &matched);
        tracing::info!(
            "Startup {}: {} of {} candidate talents scored ({} previously matched)",
            startup.startup_id,
            pairs.len(),
            candidates.len(),
            matched.len()
        );

        self.sync.upsert(pairs).await.into_result()
    }

    /// React to a change-feed event
    ///
    /// Returns `Ok(None)` when the changed fields cannot affect any score.
    pub async fn handle_change(&self, event: &ChangeEvent) -> Result<Option<RecomputeReport>, EngineError> {
        if event.id.trim().is_empty() {
            return Err(EngineError::Input("change event without id".to_string()));
        }

        self.profiles.invalidate(event.entity_type, &event.id).await;

        if !affects_scoring(event) {
            tracing::debug!(
                "Ignoring {:?} {} change to {:?}",
                event.entity_type,
                event.id,
                event.changed_fields
            );
            return Ok(None);
        }

        let report = match event.entity_type {
            EntityType::Talent => self.recompute_for_talent(&event.id).await?,
            EntityType::Startup => self.recompute_for_startup(&event.id).await?,
        };
        Ok(Some(report))
    }

    /// Consume change events from a channel until every sender is dropped
    pub fn spawn_change_listener(self: Arc<Self>, mut events: mpsc::Receiver<ChangeEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Change listener started");
            while let Some(event) = events.recv().await {
                match self.handle_change(&event).await {
                    Ok(Some(report)) => tracing::info!(
                        "Processed {:?} {} change: {} pairs",
                        event.entity_type,
                        event.id,
                        report.outcomes.len()
                    ),
                    Ok(None) => {}
                    Err(e) => tracing::error!(
                        "Failed to process {:?} {} change: {}",
                        event.entity_type,
                        event.id,
                        e
                    ),
                }
            }
            tracing::info!("Change listener stopped");
        })
    }
}
