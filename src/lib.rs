//! # rubric-align
//!
//! Workflow service for authoring grading rubrics and checking that a
//! model's Yes/No judgements agree with a human trainer's.
//!
//! ## Task Flow
//! 1. Trainer creates a task (prompt plus two model responses)
//! 2. Trainer writes rubric V1, then an enhanced V2
//! 3. Trainer and model score the Gemini response against the rubric
//! 4. Below 80% agreement the rubric is enhanced again and re-scored
//! 5. The GPT response is scored once and the task completes
//!
//! ## Modules
//! - `rubric`: rubric and score validation
//! - `alignment`: agreement calculation and per-version history
//! - `task`: task record, status machine, rubric versions
//! - `store`: task persistence (memory, SQLite, Airtable)
//! - `files`: task folders and attachments
//! - `workflow`: the task operations
//! - `api`: HTTP endpoints

pub mod alignment;
pub mod api;
pub mod config;
pub mod files;
pub mod rubric;
pub mod store;
pub mod task;
pub mod util;
pub mod workflow;

pub use config::Config;
pub use workflow::{TaskMutation, TaskService, WorkflowError};
