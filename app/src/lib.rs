// ==============================================================================
// lib.rs - CBD Processor Library
// ==============================================================================
// Description: Library interface for compression-based distance modules
// Author: CBD Service Team
// Created: 2026-07-14
// Modified: 2026-08-25
// Version: 1.0.0
// ==============================================================================

pub mod command;
pub mod combiner;
pub mod distance;
pub mod error;
pub mod extractor;
pub mod models;
pub mod parsers;
pub mod validator;
