//! SQL Fleet Provisioner Library
//!
//! Core functionality for the SQL fleet provisioning demo: the staged
//! workflow lives in [`orchestrator`], the cloud-management seam and its ARM
//! REST implementation in [`provider`], and run-scoped settings in
//! [`config`]. Tests for the workflow run against an in-memory provider
//! double under `tests/`.

pub mod config;
pub mod constants;
pub mod naming;
pub mod orchestrator;
pub mod provider;
