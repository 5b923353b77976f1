use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use super::accumulator::NodeAccumulator;
use super::fields;
use super::ingest::IngestionPipeline;
use super::report::{ServerSyncResult, SyncReport};
use super::steps::{SyncStep, SyncSteps};
use crate::github::{GitHubClient, GraphQLTransport};
use crate::query::{
    Fragment, Group, NodeCallback, Query, QueryElement, QueryError, UsageStats, batch,
};
use crate::services::config::SyncSettings;
use crate::store::LocalStore;
use crate::types::{ApiServer, ItemKind, TrackedItem, TrackedRepository};

/// Repositories per query when paging their most recently updated items
pub const LATEST_ITEMS_BATCH_SIZE: usize = 10;

/// Repositories per query when fetching all of their open items
pub const OPEN_ITEMS_BATCH_SIZE: usize = 100;

/// Items per query of an item update
pub const ITEM_BATCH_SIZE: usize = 100;

/// Items per query when reviews are fetched together with their comments
pub const REVIEW_COMMENTS_BATCH_SIZE: usize = 20;

/// An API server together with the transport used to reach it
pub struct ServerConnection<T> {
    pub server: ApiServer,
    pub transport: T,
}

impl<T> ServerConnection<T> {
    pub fn new(server: ApiServer, transport: T) -> Self {
        Self { server, transport }
    }
}

/// Selection and batching of one child update (reviews, comments, ...)
#[derive(Debug, Clone)]
pub struct ItemUpdatePlan {
    pub name: String,
    pub fields: Vec<QueryElement>,
    /// Element types accumulated from the responses
    pub element_types: BTreeSet<&'static str>,
    /// Steps whose children are replaced by the update
    pub steps: Vec<SyncStep>,
    pub batch_size: usize,
}

impl ItemUpdatePlan {
    /// Update of the children of pull requests or issues selected by `steps`.
    /// Steps that do not apply to `kind` are left out.
    pub fn for_items(kind: ItemKind, steps: &SyncSteps) -> Self {
        let mut elements = vec![QueryElement::field("id")];
        let mut element_types = BTreeSet::new();
        let mut applied = Vec::new();
        let mut batch_size = ITEM_BATCH_SIZE;

        for step in steps.iter() {
            if step.pull_request_only() && kind != ItemKind::PullRequest {
                continue;
            }
            let group = match step {
                SyncStep::ReviewRequests => Some(fields::review_request_group()),
                SyncStep::Reviews if steps.contains(SyncStep::ReviewComments) => None,
                SyncStep::Reviews => Some(fields::review_group()),
                SyncStep::ReviewComments => {
                    batch_size = REVIEW_COMMENTS_BATCH_SIZE;
                    Some(fields::review_with_comments_group())
                }
                SyncStep::Statuses => Some(fields::status_group()),
                SyncStep::Reactions => Some(fields::reaction_group()),
                SyncStep::Comments => Some(fields::comment_group()),
            };
            if let Some(group) = group {
                elements.push(group.into());
            }
            element_types.extend(step.element_types().iter().copied());
            applied.push(step);
        }

        let applied_steps: SyncSteps = applied.iter().copied().collect();
        Self {
            name: applied_steps.label(),
            fields: vec![Fragment::new(kind.type_name(), elements).into()],
            element_types,
            steps: applied,
            batch_size,
        }
    }

    /// Reactions of issue comments and review comments
    pub fn comment_reactions() -> Self {
        Self {
            name: "Comment Reactions".to_string(),
            fields: fields::comment_reactions_fields(),
            element_types: ["Reaction"].into_iter().collect(),
            steps: vec![SyncStep::Reactions],
            batch_size: ITEM_BATCH_SIZE,
        }
    }

    /// Comments of pull request reviews
    pub fn review_comments() -> Self {
        Self {
            name: "Review Comments".to_string(),
            fields: fields::review_comments_fields(),
            element_types: ["PullRequestReviewComment"].into_iter().collect(),
            steps: vec![SyncStep::ReviewComments],
            batch_size: ITEM_BATCH_SIZE,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Batched queries for `ids` on one server
    pub fn queries(
        &self,
        server_label: &str,
        ids: &[String],
        callback: &NodeCallback,
    ) -> Result<Vec<Query>, QueryError> {
        batch(
            &format!("{}: {}", server_label, self.name),
            self.fields.clone(),
            ids,
            self.batch_size,
            callback,
        )
    }
}

/// Drives sync operations across all configured servers and feeds the
/// discovered objects into a [`LocalStore`].
///
/// Servers are synced concurrently. Within a server at most
/// `max_concurrent_queries` queries are in flight; a failing query does not
/// stop its siblings, and whatever was discovered is stored either way.
pub struct SyncEngine<S, T> {
    store: Arc<S>,
    servers: Vec<ServerConnection<T>>,
    settings: SyncSettings,
    pipeline: Arc<IngestionPipeline<S>>,
}

impl<S: LocalStore + 'static> SyncEngine<S, GitHubClient> {
    /// Engine talking to `servers` through octocrab clients
    pub fn connect(store: Arc<S>, servers: Vec<ApiServer>, settings: SyncSettings) -> Result<Self> {
        let connections = servers
            .into_iter()
            .map(|server| {
                let client = GitHubClient::new(&server, Some(settings.request_timeout()))
                    .with_context(|| format!("Failed to create client for {}", server.label))?;
                Ok(ServerConnection::new(server, client))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(store, connections, settings))
    }
}

impl<S, T> SyncEngine<S, T>
where
    S: LocalStore + 'static,
    T: GraphQLTransport + Sync,
{
    pub fn new(store: Arc<S>, servers: Vec<ServerConnection<T>>, settings: SyncSettings) -> Self {
        Self {
            store,
            servers,
            settings,
            pipeline: Arc::new(IngestionPipeline::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn servers(&self) -> &[ServerConnection<T>] {
        &self.servers
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    fn server(&self, label: &str) -> Option<&ServerConnection<T>> {
        self.servers.iter().find(|c| c.server.label == label)
    }

    fn accumulator(&self, server: &ApiServer) -> NodeAccumulator<S> {
        NodeAccumulator::new(
            Arc::clone(&self.store),
            server.clone(),
            Arc::clone(&self.pipeline),
            self.settings.flush_threshold,
        )
    }

    /// Check that a server answers and its credentials identify a user
    pub async fn test_api(&self, server_label: &str) -> Result<bool> {
        let connection = self
            .server(server_label)
            .with_context(|| format!("Server '{}' is not configured", server_label))?;

        let found = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&found);
        let callback = NodeCallback::new(move |node| {
            if node.element_type() == "User" {
                info!(
                    "Authenticated as {}",
                    node.str_field("login").unwrap_or("<unknown>")
                );
                flag.store(true, Ordering::SeqCst);
            }
            true
        });

        let query = Query::new(
            format!("{}: Testing", server_label),
            fields::viewer_test_group(),
            callback,
        );
        query.run(&connection.transport, 0).await?;
        Ok(found.load(Ordering::SeqCst))
    }

    /// Fetch the open pull requests and issues the viewer authored, with their
    /// repositories
    pub async fn fetch_authored_items(&self) -> SyncReport {
        let report = SyncReport::new("Authored Items");
        let passes = self.servers.iter().map(|c| self.fetch_authored_for(c));
        report.finish(join_all(passes).await)
    }

    async fn fetch_authored_for(&self, connection: &ServerConnection<T>) -> ServerSyncResult {
        let server = &connection.server;
        let wanted = [
            (ItemKind::PullRequest, self.settings.query_authored_prs),
            (ItemKind::Issue, self.settings.query_authored_issues),
        ];

        self.run_pass(connection, self.accumulator(server), |callback| {
            let mut groups: Vec<QueryElement> = Vec::new();
            for (kind, enabled) in wanted {
                if enabled {
                    groups.push(fields::authored_items_group(kind).into());
                } else {
                    self.store.hide_authored_only_repositories(server, kind)?;
                }
            }
            if groups.is_empty() {
                info!("{}: authored items are not fetched", server.label);
                return Ok(Vec::new());
            }
            // the viewer's id lets later pages be requested through node(id:)
            groups.insert(0, QueryElement::field("id"));
            Ok(vec![Query::new(
                format!("{}: Authored Items", server.label),
                Group::new("viewer", groups),
                callback.clone(),
            )])
        })
        .await
    }

    /// Fetch new and updated items of subscribed repositories.
    ///
    /// Repositories that already hold items of a kind page through them newest
    /// first and stop at the first one older than the newest stored item;
    /// the others fetch all their open items.
    pub async fn fetch_subscribed_items(&self, repositories: &[TrackedRepository]) -> SyncReport {
        let report = SyncReport::new("Subscribed Items");
        for repo in repositories {
            if self.server(&repo.server).is_none() {
                warn!(
                    "Skipping repository {}, server '{}' is not configured",
                    repo.node_id, repo.server
                );
            }
        }

        let passes = self.servers.iter().filter_map(|c| {
            let repos: Vec<&TrackedRepository> = repositories
                .iter()
                .filter(|r| r.server == c.server.label)
                .collect();
            (!repos.is_empty()).then(|| self.fetch_subscribed_for(c, repos))
        });
        report.finish(join_all(passes).await)
    }

    async fn fetch_subscribed_for(
        &self,
        connection: &ServerConnection<T>,
        repositories: Vec<&TrackedRepository>,
    ) -> ServerSyncResult {
        let mut cutoffs = HashMap::new();
        let mut latest: HashMap<ItemKind, Vec<String>> = HashMap::new();
        let mut all_open: HashMap<ItemKind, Vec<String>> = HashMap::new();

        for repo in repositories {
            for kind in [ItemKind::PullRequest, ItemKind::Issue] {
                if !repo.policy(kind).syncs_repository() {
                    continue;
                }
                match self.store.most_recent_item_update(&repo.node_id, kind) {
                    Some(last_update) => {
                        cutoffs.insert((repo.node_id.clone(), kind), last_update);
                        latest.entry(kind).or_default().push(repo.node_id.clone());
                    }
                    None => all_open.entry(kind).or_default().push(repo.node_id.clone()),
                }
            }
        }

        let label = &connection.server.label;
        let accumulator = self.accumulator(&connection.server).with_cutoffs(cutoffs);
        self.run_pass(connection, accumulator, |callback| {
            let mut queries = Vec::new();
            for kind in [ItemKind::Issue, ItemKind::PullRequest] {
                let noun = match kind {
                    ItemKind::Issue => "Issues",
                    ItemKind::PullRequest => "PRs",
                };
                if let Some(ids) = latest.get(&kind) {
                    queries.extend(batch(
                        &format!("{}: Updated {}", label, noun),
                        vec![fields::latest_items_fragment(kind)],
                        ids,
                        LATEST_ITEMS_BATCH_SIZE,
                        callback,
                    )?);
                }
                if let Some(ids) = all_open.get(&kind) {
                    queries.extend(batch(
                        &format!("{}: Open {}", label, noun),
                        vec![fields::all_open_items_fragment(kind)],
                        ids,
                        OPEN_ITEMS_BATCH_SIZE,
                        callback,
                    )?);
                }
            }
            Ok(queries)
        })
        .await
    }

    /// Refresh the children selected by `steps` of already known items
    pub async fn update_items(
        &self,
        items: &[TrackedItem],
        kind: ItemKind,
        steps: &SyncSteps,
    ) -> SyncReport {
        let plan = ItemUpdatePlan::for_items(kind, steps);
        self.run_child_update(&format!("{} Update", kind), plan, items)
            .await
    }

    /// Refresh the reactions of issue comments and review comments
    pub async fn update_comment_reactions(&self, comments: &[TrackedItem]) -> SyncReport {
        self.run_child_update("Comment Reactions", ItemUpdatePlan::comment_reactions(), comments)
            .await
    }

    /// Refresh the comments of pull request reviews
    pub async fn update_review_comments(&self, reviews: &[TrackedItem]) -> SyncReport {
        self.run_child_update("Review Comments", ItemUpdatePlan::review_comments(), reviews)
            .await
    }

    async fn run_child_update(
        &self,
        operation: &str,
        plan: ItemUpdatePlan,
        items: &[TrackedItem],
    ) -> SyncReport {
        let report = SyncReport::new(operation);
        if plan.is_empty() || items.is_empty() {
            info!("{}: nothing to update", operation);
            return report.finish(Vec::new());
        }

        let mut ids_by_server: HashMap<&str, Vec<String>> = HashMap::new();
        for item in items {
            if self.server(&item.server_label).is_none() {
                warn!(
                    "Skipping {}, server '{}' is not configured",
                    item.node_id, item.server_label
                );
                continue;
            }
            ids_by_server
                .entry(item.server_label.as_str())
                .or_default()
                .push(item.node_id.clone());
        }

        let plan = &plan;
        let passes = self.servers.iter().filter_map(|c| {
            let ids = ids_by_server.get(c.server.label.as_str())?;
            let accumulator = self
                .accumulator(&c.server)
                .accepting(plan.element_types.iter().copied());
            Some(async move {
                let mut result = self
                    .run_pass(c, accumulator, move |callback| {
                        let started_at = Utc::now();
                        for step in &plan.steps {
                            self.store.begin_child_sync(ids, *step, started_at)?;
                        }
                        Ok(plan.queries(&c.server.label, ids, callback)?)
                    })
                    .await;
                self.end_child_sync(c, ids, plan, &mut result);
                result
            })
        });
        report.finish(join_all(passes).await)
    }

    /// Delete the children a finished pass no longer returned. A failed pass
    /// only clears the deletion flags.
    fn end_child_sync(
        &self,
        connection: &ServerConnection<T>,
        ids: &[String],
        plan: &ItemUpdatePlan,
        result: &mut ServerSyncResult,
    ) {
        let server = &connection.server;
        for step in &plan.steps {
            match self.store.end_child_sync(ids, *step, result.succeeded) {
                Ok(0) => {}
                Ok(removed) => info!("{}: removed {} stale {} children", server.label, removed, step),
                Err(e) => {
                    warn!("{}: could not finish {} sync: {:#}", server.label, step, e);
                    result.error.get_or_insert_with(|| format!("{:#}", e));
                    if result.succeeded {
                        result.succeeded = false;
                        if let Err(e) = self.store.set_last_sync_succeeded(server, false) {
                            warn!("{}: could not record sync outcome: {:#}", server.label, e);
                        }
                    }
                }
            }
        }
    }

    /// Run the queries `build` creates for one server against one accumulator,
    /// then store what is left and record the outcome.
    async fn run_pass<F>(
        &self,
        connection: &ServerConnection<T>,
        accumulator: NodeAccumulator<S>,
        build: F,
    ) -> ServerSyncResult
    where
        F: FnOnce(&NodeCallback) -> Result<Vec<Query>>,
    {
        let server = &connection.server;
        let sink = Arc::new(Mutex::new(accumulator));
        let callback = NodeCallback::from_sink(Arc::clone(&sink));
        let mut usage = UsageStats::default();
        let mut first_error: Option<String> = None;

        match build(&callback) {
            Ok(queries) => {
                info!("{}: running {} queries", server.label, queries.len());
                let runs: Vec<_> = queries
                    .iter()
                    .map(|q| q.run(&connection.transport, 0))
                    .collect();
                let results: Vec<Result<UsageStats, QueryError>> = stream::iter(runs)
                    .buffer_unordered(self.settings.max_concurrent_queries.max(1))
                    .collect()
                    .await;

                for result in results {
                    match result {
                        Ok(query_usage) => usage.merge(&query_usage),
                        Err(e) => {
                            first_error.get_or_insert_with(|| e.to_string());
                        }
                    }
                }
            }
            Err(e) => {
                error!("{}: could not prepare queries: {:#}", server.label, e);
                first_error = Some(format!("{:#}", e));
            }
        }

        let summary = sink.lock().unwrap_or_else(PoisonError::into_inner).finish();
        if first_error.is_none() {
            first_error = summary.error;
        }

        let succeeded = first_error.is_none();
        if let Err(e) = self.store.set_last_sync_succeeded(server, succeeded) {
            warn!("{}: could not record sync outcome: {:#}", server.label, e);
        }
        match &first_error {
            Some(e) => warn!("{}: sync failed: {}", server.label, e),
            None => info!(
                "{}: sync succeeded, {} requests, {} nodes stored",
                server.label, usage.requests, summary.ingested
            ),
        }

        ServerSyncResult {
            label: server.label.clone(),
            succeeded,
            error: first_error,
            usage,
            nodes_ingested: summary.ingested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_skips_pull_request_steps_for_issues() {
        let steps: SyncSteps = [SyncStep::Reviews, SyncStep::Statuses, SyncStep::Comments]
            .into_iter()
            .collect();
        let plan = ItemUpdatePlan::for_items(ItemKind::Issue, &steps);
        assert_eq!(plan.steps, vec![SyncStep::Comments]);
        assert_eq!(plan.name, "comments");
        assert_eq!(plan.element_types.iter().copied().collect::<Vec<_>>(), vec!["IssueComment"]);

        let text = plan.fields[0].render_selection();
        assert!(text.starts_with("... on Issue { id comments(first: 100)"));
        assert!(!text.contains("reviews"));
    }

    #[test]
    fn test_review_comments_replace_plain_reviews() {
        let steps: SyncSteps = [SyncStep::Reviews, SyncStep::ReviewComments]
            .into_iter()
            .collect();
        let plan = ItemUpdatePlan::for_items(ItemKind::PullRequest, &steps);
        let text = plan.fields[0].render_selection();

        assert_eq!(text.matches("reviews(").count(), 1);
        assert!(text.contains("reviews(first: 20)"));
        assert!(text.contains("comments(first: 20)"));
        assert_eq!(plan.batch_size, REVIEW_COMMENTS_BATCH_SIZE);
        assert!(plan.element_types.contains("PullRequestReviewComment"));
        assert!(plan.element_types.contains("PullRequestReview"));
    }

    #[test]
    fn test_empty_steps_make_an_empty_plan() {
        let plan = ItemUpdatePlan::for_items(ItemKind::PullRequest, &SyncSteps::new());
        assert!(plan.is_empty());
    }
}
