//! Shared test support: scripted collaborators and pipeline assembly.

#![allow(dead_code)] // not every test binary uses every helper

pub mod doubles;
pub mod fixtures;
pub mod strategies;

pub use doubles::*;
pub use fixtures::*;
