//! Integration test crate for MotionScope.
//!
//! Holds cross-crate tests that drive the full pipeline: history, transforms,
//! compositor, quality control and both compute backends together.

#[cfg(test)]
mod scenarios;

#[cfg(test)]
mod backends;

#[cfg(test)]
mod config;
