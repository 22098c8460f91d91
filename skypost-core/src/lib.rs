#![doc = "skypost-core: detection and classification pipeline for skypost."]

//! This crate holds all pipeline logic: finding the Markdown posts a change added,
//! turning each into a validated [`contract::PostVariant`], and dispatching the batch
//! to a [`contract::Publisher`]. The CLI and the Bluesky client live in `skypost`.

pub mod classify;
pub mod config;
pub mod contract;
pub mod detect;
pub mod fetch;
pub mod front_matter;
pub mod imaging;
pub mod pipeline;
pub mod publish;
