//! recipekit-lib: fetch infrastructure recipes from an OCI registry and deploy them
//!
//! A recipe is a deployment template packaged as the first layer of an OCI
//! artifact. This crate provides:
//! - `reference`: parsing of `repository:tag` recipe references
//! - `registry`: manifest and blob resolution against a content-addressable registry
//! - `template`: decoding of template bytes into an ordered JSON object
//! - `deploy`: submission to a deployment backend and waiting for a terminal state
//! - `engine`: the end-to-end `deploy_recipe` pipeline tying these together

pub mod config;
pub mod consts;
pub mod deploy;
pub mod engine;
pub mod reference;
pub mod registry;
pub mod template;
pub mod util;

pub use engine::{RecipeEngine, RecipeError, RecipeHandler, Stage};
