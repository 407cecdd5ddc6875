//! Statement execution: counters, the preprocessor, directives and the
//! executor that drives them.

pub mod comparison;
pub mod directives;
pub mod executor;
pub mod function;
pub mod preprocessor;
pub mod rawtext;
pub mod scoreboard;
pub mod session;
pub mod statement;
