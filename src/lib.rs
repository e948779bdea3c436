// ABOUTME: Library crate for tasksync exposing the git monitor, task sync, and CLI plumbing

#![allow(missing_docs)]

pub mod cli;
pub mod config;
pub mod git;
pub mod models;
pub mod monitor;
pub mod sync;
