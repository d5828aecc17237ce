// eos_core/src/lib.rs

// This file defines the public modules of the library.
pub mod arena;
pub mod entity;
pub mod errors;
pub mod frames;
pub mod gaussian;
pub mod indices;
pub mod landmark;
pub mod map;
pub mod prelude;
pub mod robot;
pub mod sensor;
pub mod types;
