// FILE: src/core/mod.rs

// Leaf data types shared by every compiler stage.

pub mod command;
pub mod constants;
pub mod coord;
pub mod range;
pub mod selector;
pub mod token;
pub mod util;
pub mod value;

pub use coord::Coord;
pub use range::Range;
pub use selector::{BlockCheck, Core, Selector};
pub use token::{Token, TokenKind, TokenView};
pub use value::{ArithOp, CompareOp, Value};
