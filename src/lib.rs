//! foliomail - portfolio company update collection and metrics extraction.
//!
//! Collects forwarded portfolio-company update emails from a mailbox,
//! classifies them with an LLM, extracts financial metrics from bodies and
//! attachments, and persists everything to SQLite with idempotent writes.

pub mod cli;
pub mod collector;
pub mod config;
pub mod extract;
pub mod llm;
pub mod mailbox;
pub mod models;
pub mod repository;
pub mod schema;
pub mod storage;
