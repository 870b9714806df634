//! Unit tests for the AVRCP target service
//!
//! Sessions and browse services are in-memory fakes. Timeout behavior runs
//! on a paused clock.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod browsed_player;
mod support;
