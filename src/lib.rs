//! Scrollwatch - infinite-scroll directive with throttle and debounce helpers
//!
//! This crate provides two timing wrappers (throttle and debounce) driven by
//! the Tokio timer, and a directive that invokes a callback whenever a
//! scrollable element gets close to the bottom of its scroll range.

pub mod config;
pub mod directive;
pub mod error;
pub mod timing;
