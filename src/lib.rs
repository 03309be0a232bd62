pub mod cancel;
pub mod classify;
pub mod cli;
pub mod config;
pub mod constants;
pub mod container;
pub mod dedup;
pub mod extract;
pub mod logging;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod scanner;
