//! Face Tracking Studio - live face tracking with session recording
//!
//! This crate opens a camera, runs a face detector against the live feed on a
//! fixed cadence without ever overlapping detector calls, and records the
//! feed into downloadable clips kept for the life of the session.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Value objects, state machines and errors
//! - **Application**: The studio's components and port interfaces (traits)
//! - **Infrastructure**: Adapter implementations (FFmpeg, filesystem, HTTP, etc.)
//! - **CLI**: Command-line interface, argument parsing, and signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
