//! The thin transport adapter: an axum WebSocket endpoint implementing the
//! subscribe/command wire protocol over `wire`'s message shapes. HTTP
//! routing and authentication are explicitly out of scope — this module
//! resolves a `Viewer` from query parameters as the simplest possible
//! stand-in for the real, externally-owned auth layer, and otherwise just
//! forwards parsed messages into the resolved `RoomActorHandle`.

mod websocket;

pub use websocket::{router, websocket_handler, AppState};
