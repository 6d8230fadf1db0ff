//! The site's task graph and watch bindings.

use std::sync::Arc;

use kiln_tasks::{BindingSpec, GraphError, Plan, ReloadScope, TaskGraph};

use crate::cache::{ClearCacheStep, RenderCache};
use crate::config::BuildConfig;
use crate::copy::{CleanStep, CopyStep};
use crate::pages::PagesStep;
use crate::scripts::ScriptsStep;
use crate::styleguide::StyleguideStep;
use crate::styles::StylesStep;

pub const CLEAN: &str = "clean";
pub const PAGES: &str = "pages";
pub const CLEAR_TEMPLATE_CACHE: &str = "clear-template-cache";
pub const STYLES: &str = "styles";
pub const SCRIPTS: &str = "scripts";
pub const COPY: &str = "copy";
pub const STYLEGUIDE: &str = "styleguide";
pub const BUILD: &str = "build";

/// Register every step and the `build` aggregate:
/// `clean -> {pages, scripts, copy} -> styles -> styleguide`.
pub fn build_graph(config: &Arc<BuildConfig>) -> Result<TaskGraph, GraphError> {
    let cache = Arc::new(RenderCache::new(Arc::clone(config)));

    TaskGraph::builder()
        .task(CLEAN, Arc::new(CleanStep::new(Arc::clone(config))))
        .task(
            CLEAR_TEMPLATE_CACHE,
            Arc::new(ClearCacheStep::new(Arc::clone(&cache))),
        )
        .task(PAGES, Arc::new(PagesStep::new(Arc::clone(config), cache)))
        .task(STYLES, Arc::new(StylesStep::new(Arc::clone(config))))
        .task(SCRIPTS, Arc::new(ScriptsStep::new(Arc::clone(config))))
        .task(COPY, Arc::new(CopyStep::new(Arc::clone(config))))
        .task(STYLEGUIDE, Arc::new(StyleguideStep::new(Arc::clone(config))))
        .aggregate(
            BUILD,
            Plan::series([
                Plan::task(CLEAN),
                Plan::parallel([PAGES, SCRIPTS, COPY]),
                Plan::task(STYLES),
                Plan::task(STYLEGUIDE),
            ]),
        )
        .build()
}

/// Watch bindings, evaluated top to bottom.
pub fn watch_bindings(config: &BuildConfig) -> Vec<BindingSpec> {
    vec![
        BindingSpec::new(PAGES, ["pages/**/*.html"], [PAGES]),
        BindingSpec::new(
            "templates",
            ["layouts/**/*", "partials/**/*", "data/**/*"],
            [PAGES],
        )
        .exclude(["layouts/styleguide.html"])
        .pre_action(CLEAR_TEMPLATE_CACHE),
        BindingSpec::new(STYLES, ["styles/**/*.css"], [STYLES]).reload(ReloadScope::Stream),
        BindingSpec::new(SCRIPTS, ["scripts/**/*.js", "scripts/**/*.mjs"], [SCRIPTS]),
        BindingSpec::new("assets", config.assets.clone(), [COPY]),
        BindingSpec::new(
            STYLEGUIDE,
            ["styleguide/**/*.md", "styleguide/**/*.markdown", "layouts/styleguide.html"],
            [STYLEGUIDE],
        ),
    ]
}
