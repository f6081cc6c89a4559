//! Core engine: the observe → decide → dispatch loop and its bookkeeping.

pub mod agent;
pub mod tracker;

pub use agent::Agent;
pub use tracker::PositionTracker;
