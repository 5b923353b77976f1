/// Output formatting of sync reports as Markdown
pub mod formatter;

/// GitHub GraphQL transport: octocrab client, retry classification and wire types
pub mod github;

/// Query construction, response scanning, pagination and batching
pub mod query;

/// Sync orchestration and configuration
pub mod services;

/// Local store collaborator and its in-memory implementation
pub mod store;

/// Core type definitions and domain models used throughout the library
pub mod types;
