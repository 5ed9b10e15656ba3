#![doc = include_str!("../README.md")]

//! Term language, models, and solver interfaces for lemma generalization.
//!
//! This crate provides the SMT term representation shared by the
//! generalization engine, linear-arithmetic normal forms, model-based
//! projection, and pluggable solver backends: in-process Z3, an external
//! SMT-LIB2 process, and a Fourier-Motzkin reference procedure.

pub mod backends;
pub mod context;
pub mod linear;
pub mod mbp;
pub mod solver;
pub mod sorts;
pub mod terms;
