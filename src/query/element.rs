//! Declarative GraphQL selection model
//!
//! A query is described as a tree of [`QueryElement`]s. Every element renders
//! its own selection-set text; groups additionally know how to page through
//! connections. Trees are immutable once built: paging produces a new
//! [`Group`] through [`Group::with_continuation`] instead of mutating the one
//! that is still referenced by in-flight scans.

use std::sync::Arc;

use super::QueryError;

/// One node of a selection tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryElement {
    Field(Field),
    Fragment(Fragment),
    Group(Group),
}

impl QueryElement {
    /// Shorthand for a scalar field element
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(Field::new(name))
    }

    /// Field name, group name, or the type condition of a fragment
    pub fn name(&self) -> &str {
        match self {
            Self::Field(field) => field.name(),
            Self::Fragment(fragment) => fragment.type_condition(),
            Self::Group(group) => group.name(),
        }
    }

    pub fn render_selection(&self) -> String {
        match self {
            Self::Field(field) => field.render_selection(),
            Self::Fragment(fragment) => fragment.render_selection(),
            Self::Group(group) => group.render_selection(),
        }
    }

    /// Every fragment reachable from this element, in declaration order.
    /// The same fragment may appear more than once.
    pub fn fragments(&self) -> Vec<&Fragment> {
        match self {
            Self::Field(_) => Vec::new(),
            Self::Fragment(fragment) => fragment.fragments(),
            Self::Group(group) => group.fragments(),
        }
    }
}

impl From<Field> for QueryElement {
    fn from(field: Field) -> Self {
        Self::Field(field)
    }
}

impl From<Fragment> for QueryElement {
    fn from(fragment: Fragment) -> Self {
        Self::Fragment(fragment)
    }
}

impl From<Group> for QueryElement {
    fn from(group: Group) -> Self {
        Self::Group(group)
    }
}

/// A scalar field, rendered as its bare name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    name: String,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render_selection(&self) -> String {
        self.name.clone()
    }
}

/// A reusable set of fields bound to a concrete type condition.
///
/// Fragments are rendered inline (`... on User { ... }`); [`Fragment::fragments`]
/// still reports them so callers can tell which fragments a tree touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    type_condition: String,
    elements: Arc<[QueryElement]>,
}

impl Fragment {
    pub fn new(type_condition: impl Into<String>, elements: Vec<QueryElement>) -> Self {
        Self {
            type_condition: type_condition.into(),
            elements: elements.into(),
        }
    }

    pub fn type_condition(&self) -> &str {
        &self.type_condition
    }

    pub fn elements(&self) -> &[QueryElement] {
        &self.elements
    }

    /// Whether this fragment describes an object reported as `typename`.
    /// Objects that did not report a type accept every fragment.
    pub fn applies_to(&self, typename: Option<&str>) -> bool {
        typename.is_none_or(|t| t == self.type_condition)
    }

    pub fn render_selection(&self) -> String {
        let children = render_children(&self.elements);
        if children.is_empty() {
            format!("... on {} {{ __typename }}", self.type_condition)
        } else {
            format!("... on {} {{ {} }}", self.type_condition, children)
        }
    }

    pub fn fragments(&self) -> Vec<&Fragment> {
        let mut fragments = vec![self];
        for element in self.elements.iter() {
            fragments.extend(element.fragments());
        }
        fragments
    }
}

/// A named object or connection selection.
///
/// With a page size of zero the group renders as a plain nested object.
/// A positive page size turns it into a connection with an
/// `edges { node { ... } cursor } pageInfo { hasNextPage }` envelope, paged
/// forward with `first`/`after`, or restricted to the newest entries with
/// `last` when built through [`Group::latest_only`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    name: String,
    fields: Arc<[QueryElement]>,
    extra_params: Vec<(String, String)>,
    page_size: u32,
    only_last: bool,
    last_cursor: Option<String>,
}

impl Group {
    pub fn new(name: impl Into<String>, fields: Vec<QueryElement>) -> Self {
        Self::with_shared_fields(name, fields.into())
    }

    /// Build a group around children that are already shared with other groups
    pub fn with_shared_fields(name: impl Into<String>, fields: Arc<[QueryElement]>) -> Self {
        Self {
            name: name.into(),
            fields,
            extra_params: Vec::new(),
            page_size: 0,
            only_last: false,
            last_cursor: None,
        }
    }

    /// Page forward through the connection, `page_size` entries at a time
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self.only_last = false;
        self
    }

    /// Fetch only the newest `page_size` entries; never continued
    pub fn latest_only(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self.only_last = true;
        self
    }

    /// Add a raw GraphQL argument, rendered verbatim after the paging arguments
    /// in the order the parameters were added
    pub fn with_extra_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.push((key.into(), value.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[QueryElement] {
        &self.fields
    }

    pub fn shared_fields(&self) -> Arc<[QueryElement]> {
        Arc::clone(&self.fields)
    }

    pub fn extra_params(&self) -> &[(String, String)] {
        &self.extra_params
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn is_paginated(&self) -> bool {
        self.page_size > 0
    }

    /// Latest-only mode is ignored on a group that does not page
    pub fn is_latest_only(&self) -> bool {
        self.is_paginated() && self.only_last
    }

    pub fn last_cursor(&self) -> Option<&str> {
        self.last_cursor.as_deref()
    }

    /// Copy of this group that resumes after `cursor`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidConfiguration`] when the group does not
    /// page forward (page size zero, or latest-only mode).
    pub fn with_continuation(&self, cursor: impl Into<String>) -> Result<Group, QueryError> {
        if !self.is_paginated() {
            return Err(QueryError::invalid_configuration(format!(
                "group '{}' is not paginated and cannot be continued",
                self.name
            )));
        }
        if self.only_last {
            return Err(QueryError::invalid_configuration(format!(
                "group '{}' fetches only the latest entries and cannot be continued",
                self.name
            )));
        }
        Ok(Group {
            name: self.name.clone(),
            fields: Arc::clone(&self.fields),
            extra_params: self.extra_params.clone(),
            page_size: self.page_size,
            only_last: self.only_last,
            last_cursor: Some(cursor.into()),
        })
    }

    pub fn render_selection(&self) -> String {
        let mut arguments = Vec::new();
        if self.is_paginated() {
            if self.only_last {
                arguments.push(format!("last: {}", self.page_size));
            } else {
                arguments.push(format!("first: {}", self.page_size));
                if let Some(cursor) = &self.last_cursor {
                    arguments.push(format!("after: {}", graphql_string(cursor)));
                }
            }
        }
        for (key, value) in &self.extra_params {
            arguments.push(format!("{}: {}", key, value));
        }

        let mut text = self.name.clone();
        if !arguments.is_empty() {
            text.push('(');
            text.push_str(&arguments.join(", "));
            text.push(')');
        }

        let children = render_children(&self.fields);
        let selection = if children.is_empty() {
            "__typename".to_string()
        } else {
            format!("__typename {}", children)
        };

        if self.is_paginated() {
            format!(
                "{} {{ edges {{ node {{ {} }} cursor }} pageInfo {{ hasNextPage }} }}",
                text, selection
            )
        } else {
            format!("{} {{ {} }}", text, selection)
        }
    }

    pub fn fragments(&self) -> Vec<&Fragment> {
        self.fields
            .iter()
            .flat_map(|element| element.fragments())
            .collect()
    }
}

fn render_children(elements: &[QueryElement]) -> String {
    elements
        .iter()
        .map(QueryElement::render_selection)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote a value as a GraphQL string literal
pub(crate) fn graphql_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
