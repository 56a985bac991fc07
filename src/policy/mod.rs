//! Policy engine for piiguard.
//!
//! This module provides the TOML-based configuration ([`config`]), route
//! matching ([`matcher`]), entity-type normalization ([`normalize`]) and the
//! per-rule decision engine ([`evaluator`]).

pub mod config;
pub mod evaluator;
pub mod matcher;
pub mod normalize;
