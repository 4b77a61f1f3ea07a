#![allow(non_snake_case)]

#[path = "harness/flip_session.rs"]
mod flip_session;
#[path = "harness/persisted_side.rs"]
mod persisted_side;
