//! Transform steps for kiln sites.
//!
//! Each step turns one kind of source (pages, stylesheets, scripts, static
//! assets, style-guide entries) into files under the output directory. Steps
//! share a [`BuildConfig`] and know nothing about how they are scheduled;
//! [`pipeline`] wires them into a task graph and watch bindings.

pub mod cache;
pub mod config;
pub mod copy;
pub mod discover;
pub mod output;
pub mod pages;
pub mod pipeline;
pub mod scripts;
pub mod snippet;
pub mod styleguide;
pub mod styles;
pub mod templates;

pub use cache::{ClearCacheStep, RenderCache};
pub use config::{BuildConfig, BuildMode, TargetError};
pub use copy::{CleanStep, CopyStep};
pub use pages::PagesStep;
pub use pipeline::{build_graph, watch_bindings};
pub use scripts::ScriptsStep;
pub use styleguide::StyleguideStep;
pub use styles::StylesStep;
