//! The tool surface: five data tools, two composite tools and the place
//! resolver, all registered through the instrumentation wrapper.

pub mod activity;
pub mod airquality;
pub mod forecast;
pub mod marine;
pub mod met;
pub mod nowcast;
pub mod observations;
pub mod places;
pub mod route;

use std::sync::Arc;

use crate::gazetteer::Resolver;
use crate::metrics::MetricsRegistry;
use crate::tool::ToolSet;
use crate::upstream::UpstreamClient;
use crate::wrapper::instrument;

/// Shared state handed to every tool.
///
/// Upstream clients are stateless and shared by all concurrent calls. The
/// tool set is the same registry the router serves; composite tools call
/// their sub-tools through it so the wrapper applies uniformly.
pub struct AppState {
    pub proxy: UpstreamClient,
    pub frost: UpstreamClient,
    pub resolver: Option<Arc<Resolver>>,
    pub tools: ToolSet,
}

impl AppState {
    pub fn new(
        proxy: UpstreamClient,
        frost: UpstreamClient,
        resolver: Option<Arc<Resolver>>,
    ) -> Self {
        Self {
            proxy,
            frost,
            resolver,
            tools: ToolSet::new(),
        }
    }
}

/// Build and register every tool, instrumented, into the shared set.
///
/// The resolver tool is only registered when the gazetteer store opened.
pub fn register_all(state: &Arc<AppState>, metrics: &MetricsRegistry) {
    let mut tools = vec![
        forecast::build(state.clone()),
        nowcast::build(state.clone()),
        airquality::build(state.clone()),
        marine::build(state.clone()),
        observations::build(state.clone()),
        activity::build(state.clone()),
        route::build(state.clone()),
    ];
    if state.resolver.is_some() {
        tools.push(places::build(state.clone()));
    } else {
        tracing::warn!("Gazetteer unavailable; places.resolve_name is not registered");
    }

    for tool in tools {
        state.tools.insert(instrument(tool, metrics.clone()));
    }
}

/// Whether summaries should be rendered in Norwegian.
pub(crate) fn is_norwegian(language: Option<&str>) -> bool {
    matches!(language, Some("nb") | Some("no") | Some("nn"))
}
