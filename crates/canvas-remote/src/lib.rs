//! Canvas Remote
//!
//! reqwest clients for the services a board session talks to:
//!
//! - [`HttpProvider`]: the generation provider (`GenerationProvider`)
//! - [`HttpPersistence`]: board storage (`BoardPersistence`), optionally
//!   paired with a legacy backend through [`HttpPersistence::with_legacy`]
//!
//! ```ignore
//! use canvas_remote::{HttpPersistence, HttpProvider, RemoteClient};
//!
//! let api = RemoteClient::new("https://canvas.example.com/api")?;
//! let provider = HttpProvider::new(api.clone());
//! let persistence = HttpPersistence::with_legacy(
//!     api,
//!     RemoteClient::new("https://canvas.example.com/api/v1")?,
//! );
//! ```

pub mod client;
pub mod error;
pub mod persistence;
pub mod provider;

#[cfg(test)]
mod test_server;

pub use client::RemoteClient;
pub use error::{RemoteError, Result};
pub use persistence::{HttpFallbackPersistence, HttpPersistence};
pub use provider::HttpProvider;
