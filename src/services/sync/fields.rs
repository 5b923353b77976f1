//! Selections used by the sync operations

use crate::query::{Field, Fragment, Group, QueryElement};
use crate::types::ItemKind;

/// Page size of nested item connections (assignees, labels) and of the
/// children fetched by item updates
pub const CHILD_PAGE_SIZE: u32 = 100;

/// Page size of assignees and labels when fetching items
pub const ASSIGNEE_AND_LABEL_PAGE_SIZE: u32 = 20;

/// Order of the latest-updated item queries
pub const UPDATED_DESC_ORDER: &str = "{direction: DESC, field: UPDATED_AT}";

fn field(name: &str) -> QueryElement {
    QueryElement::field(name)
}

fn fields(names: &[&str]) -> Vec<QueryElement> {
    names.iter().map(|n| field(n)).collect()
}

fn fragment(type_condition: &str, elements: Vec<QueryElement>) -> QueryElement {
    Fragment::new(type_condition, elements).into()
}

fn group(name: &str, elements: Vec<QueryElement>) -> Group {
    Group::new(name, elements)
}

fn with_id(mut elements: Vec<QueryElement>) -> Vec<QueryElement> {
    elements.insert(0, Field::new("id").into());
    elements
}

pub fn user_fragment() -> QueryElement {
    fragment("User", fields(&["id", "login", "avatarUrl"]))
}

fn user_id_fragment() -> QueryElement {
    fragment("User", fields(&["id"]))
}

fn mannequin_fragment() -> QueryElement {
    fragment("Mannequin", fields(&["id", "login", "avatarUrl"]))
}

fn team_fragment() -> QueryElement {
    fragment("Team", fields(&["id", "slug"]))
}

fn milestone_fragment() -> QueryElement {
    fragment("Milestone", fields(&["title"]))
}

fn label_fragment() -> QueryElement {
    fragment(
        "Label",
        fields(&["id", "name", "color", "createdAt", "updatedAt"]),
    )
}

fn repository_fragment() -> QueryElement {
    let mut elements = fields(&[
        "id",
        "createdAt",
        "updatedAt",
        "isFork",
        "isArchived",
        "nameWithOwner",
        "url",
        "isPrivate",
    ]);
    elements.push(group("owner", fields(&["id"])).into());
    fragment("Repository", elements)
}

fn author() -> QueryElement {
    group("author", vec![user_fragment()]).into()
}

fn comment_fields() -> Vec<QueryElement> {
    let mut elements = fields(&["id", "body", "url", "createdAt", "updatedAt"]);
    elements.push(author());
    elements
}

/// Fields shared by pull requests and issues
fn item_fields(assignee_and_label_page_size: u32) -> Vec<QueryElement> {
    let mut elements = fields(&[
        "id",
        "bodyText",
        "state",
        "createdAt",
        "updatedAt",
        "number",
        "title",
        "url",
    ]);
    elements.push(group("milestone", vec![milestone_fragment()]).into());
    elements.push(author());
    elements.push(
        group("assignees", vec![user_fragment()])
            .with_page_size(assignee_and_label_page_size)
            .into(),
    );
    elements.push(
        group("labels", vec![label_fragment()])
            .with_page_size(assignee_and_label_page_size)
            .into(),
    );
    elements
}

/// Full pull request selection. `include_repo` adds the owning repository,
/// needed when the items are not fetched through their repository.
pub fn pull_request_fragment(assignee_and_label_page_size: u32, include_repo: bool) -> QueryElement {
    let mut elements = item_fields(assignee_and_label_page_size);
    elements.extend(fields(&[
        "headRefOid",
        "mergeable",
        "additions",
        "deletions",
        "headRefName",
        "baseRefName",
        "isDraft",
    ]));
    elements.push(group("mergedBy", vec![user_id_fragment()]).into());
    elements.push(group("baseRepository", fields(&["nameWithOwner"])).into());
    elements.push(group("headRepository", fields(&["nameWithOwner"])).into());
    if include_repo {
        elements.push(group("repository", vec![repository_fragment()]).into());
    }
    fragment("PullRequest", elements)
}

/// Full issue selection, see [`pull_request_fragment`]
pub fn issue_fragment(assignee_and_label_page_size: u32, include_repo: bool) -> QueryElement {
    let mut elements = item_fields(assignee_and_label_page_size);
    if include_repo {
        elements.push(group("repository", vec![repository_fragment()]).into());
    }
    fragment("Issue", elements)
}

pub fn item_fragment(kind: ItemKind, assignee_and_label_page_size: u32, include_repo: bool) -> QueryElement {
    match kind {
        ItemKind::PullRequest => pull_request_fragment(assignee_and_label_page_size, include_repo),
        ItemKind::Issue => issue_fragment(assignee_and_label_page_size, include_repo),
    }
}

/// Viewer selection used to check credentials
pub fn viewer_test_group() -> Group {
    group("viewer", vec![user_fragment()])
}

/// Open items of `kind` authored by the viewer, including their repository
pub fn authored_items_group(kind: ItemKind) -> Group {
    group(
        kind.connection_name(),
        vec![item_fragment(kind, ASSIGNEE_AND_LABEL_PAGE_SIZE, true)],
    )
    .with_extra_param("states", "OPEN")
    .with_page_size(100)
}

/// Repository selection paging its items of `kind`, newest update first
pub fn latest_items_fragment(kind: ItemKind) -> QueryElement {
    let page_size = match kind {
        ItemKind::PullRequest => 10,
        ItemKind::Issue => 20,
    };
    let items = group(
        kind.connection_name(),
        vec![item_fragment(kind, ASSIGNEE_AND_LABEL_PAGE_SIZE, false)],
    )
    .with_extra_param("orderBy", UPDATED_DESC_ORDER)
    .with_page_size(page_size);
    fragment("Repository", vec![field("id"), items.into()])
}

/// Repository selection paging all of its open items of `kind`
pub fn all_open_items_fragment(kind: ItemKind) -> QueryElement {
    let items = group(
        kind.connection_name(),
        vec![item_fragment(kind, ASSIGNEE_AND_LABEL_PAGE_SIZE, false)],
    )
    .with_extra_param("states", "OPEN")
    .with_page_size(50);
    fragment("Repository", vec![field("id"), items.into()])
}

pub fn review_request_group() -> Group {
    let request = fragment(
        "ReviewRequest",
        vec![
            field("id"),
            group(
                "requestedReviewer",
                vec![user_fragment(), team_fragment(), mannequin_fragment()],
            )
            .into(),
        ],
    );
    group("reviewRequests", vec![request]).with_page_size(CHILD_PAGE_SIZE)
}

fn review_elements() -> Vec<QueryElement> {
    let mut elements = fields(&["id", "body", "state", "createdAt", "updatedAt"]);
    elements.push(author());
    elements
}

pub fn review_group() -> Group {
    group("reviews", vec![fragment("PullRequestReview", review_elements())])
        .with_page_size(CHILD_PAGE_SIZE)
}

/// Reviews together with their comments. Both levels page, so they use
/// smaller pages to keep the node count of one request in bounds.
pub fn review_with_comments_group() -> Group {
    let mut elements = review_elements();
    elements.push(review_comment_group(20).into());
    group("reviews", vec![fragment("PullRequestReview", elements)]).with_page_size(20)
}

fn review_comment_group(page_size: u32) -> Group {
    group(
        "comments",
        vec![fragment("PullRequestReviewComment", comment_fields())],
    )
    .with_page_size(page_size)
}

/// Status contexts of the head commit
pub fn status_group() -> Group {
    let status = fragment(
        "StatusContext",
        fields(&["id", "context", "description", "state", "targetUrl", "createdAt"]),
    );
    group(
        "commits",
        vec![
            group(
                "commit",
                vec![group("status", vec![group("contexts", vec![status]).into()]).into()],
            )
            .into(),
        ],
    )
    .latest_only(1)
}

pub fn reaction_group() -> Group {
    let mut elements = fields(&["id", "content", "createdAt"]);
    elements.push(group("user", vec![user_fragment()]).into());
    group("reactions", vec![fragment("Reaction", elements)]).with_page_size(CHILD_PAGE_SIZE)
}

pub fn comment_group() -> Group {
    group("comments", vec![fragment("IssueComment", comment_fields())])
        .with_page_size(CHILD_PAGE_SIZE)
}

/// Reactions of issue comments and review comments
pub fn comment_reactions_fields() -> Vec<QueryElement> {
    ["IssueComment", "PullRequestReviewComment"]
        .into_iter()
        .map(|type_condition| fragment(type_condition, with_id(vec![reaction_group().into()])))
        .collect()
}

/// Comments of pull request reviews
pub fn review_comments_fields() -> Vec<QueryElement> {
    vec![fragment(
        "PullRequestReview",
        with_id(vec![review_comment_group(CHILD_PAGE_SIZE).into()]),
    )]
}
