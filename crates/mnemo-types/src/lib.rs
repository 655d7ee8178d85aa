//! Shared types for the mnemo portal: the input-step model, entities,
//! request/response DTOs, and the pure validation and legacy-migration
//! logic applied to `commands` payloads.

pub mod api;
pub mod migrate;
pub mod models;
pub mod steps;
pub mod validate;

pub use steps::{ControlKey, InputStep, MnemonicCommand};
