//! Load-time container parsing.
//!
//! Deliberately minimal: each parser extracts exactly the fields needed
//! to hand a PRG/ROM image to the core. None of these provide a general
//! browsing/editing API over the container — that's explicitly out of
//! scope.

pub mod crt;
pub mod p00;
pub mod prg;
pub mod t64;
pub mod tap;
