//! Transport layer: dialing, TLS, and the protocol pipelines.

pub mod connector;
pub mod dialer;
pub mod h1;
pub mod h2;
pub mod h3;
pub mod websocket;

pub use connector::{Alpn, MaybeTlsStream};
pub use h1::H1Connection;
pub use h2::{H2Connection, H2Transport};
pub use h3::H3Transport;
pub use websocket::{Message, WebSocketClient};
