pub mod error;
pub mod graphql_types;
