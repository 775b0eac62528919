//! # wraith
//!
//! HTTP(S)/WebSocket client with byte-precise TLS and HTTP/2 fingerprint
//! impersonation.
//!
//! wraith parses JA3 and JA4R fingerprint strings (and Akamai-format HTTP/2
//! settings strings) into a typed ClientHello and session prelude, then
//! issues requests that preserve those fingerprints end-to-end: cipher and
//! extension sequences, GREASE placement, SETTINGS order, connection-flow
//! window, HEADERS priority, and pseudo-header order.
//!
//! ```no_run
//! use wraith::{profiles, Client, Options};
//!
//! # async fn run() -> wraith::Result<()> {
//! let mut options = Options::new();
//! profiles::chrome142(&mut options);
//!
//! let client = Client::new();
//! let response = client.send("https://tls.peet.ws/api/all", options, "GET").await?;
//! println!("{}", response.text()?);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod fingerprint;
pub mod headers;
pub mod options;
pub mod response;
pub mod transport;

pub use client::Client;
pub use error::{Error, Result};
pub use fingerprint::profiles;
pub use fingerprint::{Fingerprint, FingerprintKind, H2Settings, PseudoHeader};
pub use headers::OrderedHeaders;
pub use options::{Cookie, Options};
pub use response::Response;
pub use transport::{Message, WebSocketClient};
