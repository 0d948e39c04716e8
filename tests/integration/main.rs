//! Integration test harness.
//!
//! Drives the session controller end to end against in-memory dice
//! backends: a `DiceApi` mock and a fake Wolfbet HTTP transport.

mod mock_api;
mod session_flow;
