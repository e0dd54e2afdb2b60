pub mod app;
pub mod assess;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod engine;
pub mod extract;
pub mod git;
pub mod identity;
pub mod llm;
pub mod models;
pub mod report;
pub mod utils;

#[cfg(test)]
pub mod test_utils;
