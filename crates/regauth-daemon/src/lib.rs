//! regauth-daemon - HTTP front end for the registration authority.
//!
//! - [`handlers`]: axum router, transport checks and the registration
//!   handler

pub mod handlers;
