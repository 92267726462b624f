//! Integration test crate for Montage.
//!
//! This crate exists solely to hold cross-crate integration tests. Every
//! scenario runs on synthetic sources, so neither FFmpeg nor a GPU is
//! needed.

#[cfg(test)]
mod support;

#[cfg(test)]
mod pipeline;

#[cfg(test)]
mod timeline;

#[cfg(test)]
mod engine;
