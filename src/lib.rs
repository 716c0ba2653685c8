//! SAT-based sequential hardware model checker for AIGER circuits.
//!
//! Circuits are and-inverter graph arenas with a flop table between an
//! initial arena and the next-state arena. Engines unroll the next-state
//! function time frame by time frame into a fresh arena, Tseitin-encode
//! the cones they need, and drive a SAT backend to falsify safety and
//! liveness properties or bound them. Transformations that rename inputs
//! push trace adaptors so counter-examples come back in the original
//! file's coordinates.

pub mod bmc;
pub mod cir;
pub mod clausify;
pub mod cli;
pub mod config;
pub mod frontend;
pub mod live;
pub mod reduce;
pub mod sce;
pub mod seqcirc;
pub mod unroll;
