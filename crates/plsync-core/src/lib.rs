//! plsync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `PlaylistDocument`, `PlaylistPair`, `ScanReading`, `TrackPath`
//! - **Port definitions** - Traits for adapters: `ICatalogService`, `IPlaylistStore`, `IClock`
//! - **Configuration** - Typed, validated daemon configuration
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement.

pub mod config;
pub mod domain;
pub mod ports;
