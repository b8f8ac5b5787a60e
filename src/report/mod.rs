//! Report generation module.
//!
//! Renders trends, document listings and correlation results as Markdown
//! or JSON.

pub mod generator;

pub use generator::{
    generate_correlation_markdown, generate_documents_markdown, generate_json_report,
    generate_trends_markdown, generate_users_markdown,
};
