//! Shadow Taxi simulation core.
//!
//! A taxi carries a driver and passengers up a scrolling road while traffic,
//! enemy fireballs and power-ups interact with it.  Everything in this crate
//! advances one frame at a time through [`compute::tick`]; rendering and input
//! polling live in the binary.

pub mod collision;
pub mod compute;
pub mod config;
pub mod entities;
pub mod error;
pub mod powerup;
pub mod trip;
