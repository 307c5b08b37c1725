//! This crate contains a set of helpers to build demand-driven static
//! analysis tools for higher-order programs. The building blocks include
//! [lattice](https://en.wikipedia.org/wiki/Lattice_(order)) domains, a
//! memoizing fixpoint engine that solves mutually recursive queries on
//! demand, and bounded call-string contexts in the style of
//! [m-CFA](https://arxiv.org/abs/1311.4231).
//!
//! Look at the flow-lib crate for an example how to define a value-flow
//! analysis using the helpers in this crate.
//!
//! Some resources to learn more about control flow analysis:
//! * [Static Program Analysis, Anders Møller and Michael I. Schwartzbach](https://cs.au.dk/~amoeller/spa/)
//! * [Control-Flow Analysis of Higher-Order Languages, Olin Shivers](https://www.cs.cmu.edu/~shivers/papers/diss.pdf)
//! * [Demand Control-Flow Analysis, Kimball Germane et al.](https://arxiv.org/abs/1907.06839)
//! * [Pushdown Control-Flow Analysis for Free, Thomas Gilray et al.](https://arxiv.org/abs/1507.03137)
//!
//! Frameworks:
//! * [Salsa](https://github.com/salsa-rs/salsa)
//! * [Doop](https://bitbucket.org/yanniss/doop)
//! * [Infer](https://fbinfer.com/)

/// Bounded call strings and the environments built from them.
pub mod contexts;

/// Join semi-lattices used as the values of the fixpoint engine.
pub mod domains;

/// A memoizing worklist solver for systems of mutually recursive queries.
pub mod fixpoint;

#[cfg(test)]
mod contexts_tests;


#[cfg(test)]
mod fixpoint_tests;
