// FILE: src/compiler/backend/mod.rs

pub mod project;

pub use project::{Asset, AssetKind, CommandFile, Project};
