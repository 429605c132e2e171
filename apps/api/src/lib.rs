//! Resume roaster: extracted resume text goes in, a structured critique
//! produced by a language model comes out.
//!
//! Shared by the `roast-api` web server and the `roast` command-line tool.

pub mod config;
pub mod critique;
pub mod errors;
pub mod extract;
pub mod llm_client;
pub mod report;
pub mod routes;
pub mod state;
