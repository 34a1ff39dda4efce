//! Packing identical rectangular tiles into a rectangular container.
//!
//! A [`types::Problem`] goes in, a [`types::Solution`] comes out. Solving
//! tiers live under [`solver`]; [`solver::HybridSolver`] escalates through
//! them against a shared [`deadline::Deadline`].

pub mod config;
pub mod deadline;
pub mod error;
pub mod geometry;
pub mod guillotine;
pub mod solver;
pub mod symmetry;
pub mod types;
pub mod validation;
