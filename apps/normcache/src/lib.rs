//! # normcache
//!
//! Command-line front end for `normcache-core`: loads a store and a query
//! document from disk, resolves the query, and prints the result.

pub mod cli;
pub mod config;
