#![forbid(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod content;
pub mod formats;
pub mod headings;
pub mod link;
pub mod logging;
pub mod overview;
pub mod progress;
pub mod read;
pub mod reader;
pub mod render;
pub mod sections;
pub mod viz;
