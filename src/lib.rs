//! A small Rust client for the SWEET-CROSS web API.
//!
//! This crate implements a `crossclient`-style flow:
//! authenticate with a platform account, then upload result files for a
//! submission contract or fetch data through the authenticated HTTP client.
//!
//! ## Quick start
//! - Configure credentials via environment variables (`CROSSCLIENT_URL`,
//!   `CROSSCLIENT_USERNAME`, `CROSSCLIENT_PASSWORD`) or a `.crossclientrc`
//!   file (supported in the current directory and in your home directory).
//! - Call [`submit_results`] with a [`CrossClient`] and a results file.
//!
//! ```no_run
//! use anyhow::Result;
//! use crossclient::{CrossClient, ResultsTable, submit_results};
//!
//! fn main() -> Result<()> {
//!     let client = CrossClient::from_env()?;
//!
//!     let mut results = ResultsTable::new(["target", "cross_section"]);
//!     results.push_row(["U-238(n,f)", "1.14"])?;
//!     submit_results(&client, "results.csv", Some(&results), None)?;
//!     Ok(())
//! }
//! ```
//!
//! For full usage and configuration details, see the crate README.

#![forbid(unsafe_code)]

mod client;
mod config;
mod error;
mod submission;
mod token;
mod util;

pub use client::{ClientConfig, CrossClient};
pub use submission::{DEFAULT_SUBMISSION_CONTRACT, ResultsTable, submit_results};
pub use token::{Token, TokenClient};
