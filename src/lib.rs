// Copyright 2026 Pagesnap Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pagesnap library — expand infinite-scroll pages and capture them as PDFs.
//!
//! This library crate exposes the core modules for integration testing.

pub mod audit;
pub mod cli;
pub mod expand;
pub mod extract;
pub mod pipeline;
pub mod progress;
pub mod renderer;
pub mod setup;
