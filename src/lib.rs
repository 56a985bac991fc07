//! # piiguard
//!
//! **Content-policy gateway for personally identifiable information.**
//!
//! piiguard sits in front of an application's write endpoints, sends the text
//! fields of each submission to an external PII classifier and applies the
//! configured warn / block rules before the application ever sees the request.
//!
//! ## Architecture
//!
//! - **[`policy`]**: TOML configuration, route matching, type normalization
//!   and the per-rule decision table
//! - **[`classifier`]**: classifier contract and its HTTP client
//! - **[`enforce`]**: rule enforcement, field extraction, block responses,
//!   staged upload cleanup and the axum middleware
//! - **[`guard`]**: fixed sensitive-type guard that silently drops posts
//!   carrying government, payment or bank identifiers
//! - **[`web`]**: router assembly, health and `/api/pii/check` endpoints
//! - **[`proxy`]**: standalone gateway server and upstream forwarding
//! - **[`cli`]**: command-line interface (clap)
//! - **[`error`]**: unified error types using `thiserror`
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a starter config
//! piiguard init
//!
//! # Check what the classifier reports for a piece of text
//! piiguard check "my ssn is 123-45-6789"
//!
//! # Run the gateway in front of the application
//! piiguard serve
//! ```
//!
//! Hosts embedding piiguard in their own axum app can skip the gateway and
//! wrap their router with [`web::protect`].

pub mod classifier;
pub mod cli;
pub mod enforce;
pub mod error;
pub mod guard;
pub mod policy;
pub mod proxy;
pub mod web;
