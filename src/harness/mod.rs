//! Test harness hooks around the LRA client.
//!
//! A test builds a [`TckContext`] in its setup, drives LRAs through
//! [`TckContext::ops`], and finishes with [`TckContext::after`], which cancels
//! anything the test leaked and reports timer failures.

pub mod context;

pub use context::{check_status, check_status_read, TckContext, TestReport};
