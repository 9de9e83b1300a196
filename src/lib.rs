// #![warn(missing_docs)]

//! Connection handling and protocol framing for a non-blocking web
//! server.
//!
//! Nothing here owns a socket or a reactor: the embedder pushes bytes
//! in and hands the crate a [`Transport`](httpserver::Transport) to
//! write responses to. On top of that sit an incremental HTTP/1.x
//! parser, keep-alive and body handling, a request lifecycle with an
//! output transform chain, and a dual-generation websocket layer.
//!
//! ## HTTP
//!
//! - [`httpserver`]
//! - [`web`]
//!
//! ```ignore
//! {
//!     let mut conn = HttpConnection::new(transport, ip, "http", settings.clone());
//!     if let Some(request) = conn.data_received(&bytes)? {
//!         let mut cx = RequestLifecycle::new(request, settings);
//!         cx.execute(&mut handler, &mut conn)?;
//!     }
//! }
//! ```
//!
//! ## Websocket
//!
//! - [`websocket`]
//!
//! ```ignore
//! {
//!     let (transport, surplus) = conn.into_upgrade_parts();
//!     let (mut ws, early) = websocket::upgrade(&request, transport, name, &surplus)?;
//!     for message in ws.data_received(&bytes)? {
//!         ws.send_message(&message);
//!     }
//! }
//! ```

pub mod error;
pub mod escape;
pub mod httputil;
pub mod settings;
pub mod httpserver;
pub mod web;
pub mod websocket;
pub mod pubsub;
