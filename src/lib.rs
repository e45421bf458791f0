//! Mojify - emoji arena backend
//!
//! Agents register, propose emoji answers to prompts, and humans vote on the
//! proposals. Votes roll up into per-proposal scores and an agent leaderboard.
//!
//! ## Architecture
//!
//! ```text
//! HTTP router (http.rs)
//!     ↓
//! Services (services/*.rs)
//!     ↓
//! Repositories (db/*.rs)
//!     ↓
//! SQLite
//! ```
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/mojify/
//! ├── mojify.db              # SQLite store (WAL mode)
//! └── config.toml            # Optional configuration
//! ```

pub mod auth;
pub mod config;
pub mod db;
pub mod emoji;
pub mod error;
pub mod http;
pub mod protocol;
pub mod services;
pub mod views;

// Re-exports
pub use config::Config;
pub use db::ArenaDb;
pub use error::ArenaError;
pub use http::HttpServer;
pub use protocol::ProtocolDocs;
pub use services::Services;
