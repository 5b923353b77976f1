//! Response walker
//!
//! Matches a JSON response against the selection tree that produced it,
//! reports every object carrying both `__typename` and `id` to the query's
//! node callback and synthesises follow-up queries for connections that still
//! have unseen pages.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::node::TYPENAME_KEY;
use super::{DiscoveredNode, Fragment, Group, Query, QueryElement};

impl Group {
    /// Scan the payload found under this group's key.
    ///
    /// `parent` is the closest enclosing node. Returns the follow-up queries
    /// needed to finish paging; empty when nothing is left to fetch.
    pub fn scan(
        &self,
        query: &Query,
        payload: &Value,
        parent: Option<&Arc<DiscoveredNode>>,
    ) -> Vec<Query> {
        let mut follow_ups = Vec::new();

        match payload {
            Value::Object(object) => {
                if let Some(Value::Array(edges)) = object.get("edges") {
                    self.scan_page(edges, object.get("pageInfo"), query, parent, &mut follow_ups);
                } else {
                    self.scan_node(object, query, parent, &mut follow_ups);
                }
            }
            Value::Array(items) => {
                for item in items {
                    if let Value::Object(object) = item {
                        self.scan_node(object, query, parent, &mut follow_ups);
                    }
                }
            }
            _ => {}
        }

        if !follow_ups.is_empty() {
            debug!("{}{} will need further paging", query.log_prefix(), self.name());
        }
        follow_ups
    }

    /// Returns false when the callback declined the object, which ends the
    /// current page
    fn scan_node(
        &self,
        object: &Map<String, Value>,
        query: &Query,
        parent: Option<&Arc<DiscoveredNode>>,
        follow_ups: &mut Vec<Query>,
    ) -> bool {
        let this_object = match DiscoveredNode::from_object(object, parent.cloned()) {
            Some(node) => {
                let node = Arc::new(node);
                if !query.callback().accept(&node) {
                    match parent {
                        Some(parent) => debug!(
                            "{}Don't need further '{}' items for parent ID '{}', got all the updated ones already",
                            query.log_prefix(),
                            node.element_type(),
                            parent.id()
                        ),
                        None => debug!(
                            "{}Don't need further '{}' items, got all the updated ones already",
                            query.log_prefix(),
                            node.element_type()
                        ),
                    }
                    return false;
                }
                Some(node)
            }
            // a container rather than an object: unwrap this level and keep the outer parent
            None => parent.cloned(),
        };

        scan_children(self.fields(), object, query, this_object.as_ref(), follow_ups);
        true
    }

    fn scan_page(
        &self,
        edges: &[Value],
        page_info: Option<&Value>,
        query: &Query,
        parent: Option<&Arc<DiscoveredNode>>,
        follow_ups: &mut Vec<Query>,
    ) {
        for edge in edges {
            if let Some(Value::Object(node)) = edge.get("node") {
                if !self.scan_node(node, query, parent, follow_ups) {
                    return;
                }
            }
        }

        let latest_cursor = edges
            .last()
            .and_then(|edge| edge.get("cursor"))
            .and_then(Value::as_str);
        let has_next_page = page_info
            .and_then(|info| info.get("hasNextPage"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let Some(cursor) = latest_cursor.filter(|_| has_next_page) else {
            return;
        };
        if self.is_latest_only() {
            return;
        }
        match self.with_continuation(cursor) {
            Ok(next_page) => follow_ups.push(query.continuation(next_page, parent.cloned())),
            Err(e) => warn!("{}Cannot continue '{}': {}", query.log_prefix(), self.name(), e),
        }
    }
}

impl Fragment {
    /// Scan the facets this fragment describes on an already unwrapped object.
    /// Fragments add no nesting: children are looked up on the same object.
    pub fn scan(
        &self,
        query: &Query,
        object: &Map<String, Value>,
        parent: Option<&Arc<DiscoveredNode>>,
    ) -> Vec<Query> {
        let mut follow_ups = Vec::new();
        let typename = object.get(TYPENAME_KEY).and_then(Value::as_str);
        if self.applies_to(typename) {
            scan_children(self.elements(), object, query, parent, &mut follow_ups);
        }
        follow_ups
    }
}

fn scan_children(
    elements: &[QueryElement],
    object: &Map<String, Value>,
    query: &Query,
    parent: Option<&Arc<DiscoveredNode>>,
    follow_ups: &mut Vec<Query>,
) {
    for element in elements {
        match element {
            QueryElement::Fragment(fragment) => {
                follow_ups.extend(fragment.scan(query, object, parent));
            }
            QueryElement::Group(group) => {
                if let Some(field_data) = object.get(group.name()) {
                    follow_ups.extend(group.scan(query, field_data, parent));
                }
            }
            QueryElement::Field(_) => {}
        }
    }
}
