//! `places.resolve_name`: fuzzy Norwegian place-name resolution against the
//! local gazetteer.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;

use crate::attribution::{self, GAZETTEER_CREDIT_LINE, GAZETTEER_PROVIDER, LICENSE_URI};
use crate::error::ToolError;
use crate::gazetteer::{PlaceMatch, PlaceQuery};
use crate::protocol::CallToolResult;
use crate::tool::{Tool, ToolBuilder};
use crate::tools::{AppState, is_norwegian};

/// Single-match confidence above which the answer counts as resolved.
const RESOLVED_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveNameInput {
    /// Free-form place name, e.g. "Oslo" or "Mo i Rana".
    pub query: String,
    /// Maximum matches to return (1..20, default 5).
    #[serde(default)]
    pub limit: Option<usize>,
    /// Restrict to these place classes when any candidate matches.
    #[serde(default)]
    pub preferred_place_classes: Option<Vec<String>>,
    /// Rank places in this municipality (4-digit code) first.
    #[serde(default)]
    pub preferred_municipality_code: Option<String>,
    /// Summary language tag ("en" or "nb").
    #[serde(default)]
    pub language: Option<String>,
}

pub fn build(state: Arc<AppState>) -> Tool {
    ToolBuilder::new("places.resolve_name")
        .description(
            "Resolve a Norwegian place name to coordinates: exact, \
             alternative-name and fuzzy matching against the national \
             gazetteer, ranked by confidence.",
        )
        .handler_with_state(
            state,
            |state: Arc<AppState>, input: ResolveNameInput| async move {
                match run(&state, input) {
                    Ok(result) => Ok(result),
                    Err(e) => Ok(attribution::error_response(&e)),
                }
            },
        )
}

fn run(state: &AppState, input: ResolveNameInput) -> Result<CallToolResult, ToolError> {
    let Some(resolver) = &state.resolver else {
        return Err(ToolError::internal("The gazetteer is not available"));
    };

    let query = PlaceQuery {
        query: input.query.clone(),
        preferred_place_classes: input.preferred_place_classes.clone().unwrap_or_default(),
        preferred_municipality_code: input.preferred_municipality_code.clone(),
        limit: input.limit,
    };
    let matches = resolver.resolve(&query)?;

    let summary = render_summary(&input, &matches);
    let count = matches.len();
    let structured = serde_json::json!({
        "query": input.query,
        "matches": matches,
        "count": count,
        "source": {
            "provider": GAZETTEER_PROVIDER,
            "licenseUri": LICENSE_URI,
            "creditLine": GAZETTEER_CREDIT_LINE,
        },
    });

    Ok(attribution::tool_response(structured, summary))
}

fn render_summary(input: &ResolveNameInput, matches: &[PlaceMatch]) -> String {
    let norwegian = is_norwegian(input.language.as_deref());

    if matches.is_empty() {
        return if norwegian {
            format!("Fant ingen steder som ligner på '{}'.", input.query)
        } else {
            format!("No places matching '{}'.", input.query)
        };
    }

    if matches.len() == 1 && matches[0].confidence >= RESOLVED_CONFIDENCE {
        let m = &matches[0];
        let region = m
            .record
            .county_name
            .as_deref()
            .unwrap_or(&m.record.place_class);
        return if norwegian {
            format!(
                "'{}' er {} i {} ({:.4}, {:.4}).",
                input.query, m.record.name, region, m.record.lat, m.record.lon
            )
        } else {
            format!(
                "Resolved '{}' to {} in {} ({:.4}, {:.4}).",
                input.query, m.record.name, region, m.record.lat, m.record.lon
            )
        };
    }

    let listed = matches
        .iter()
        .take(3)
        .map(|m| {
            format!(
                "{} ({}, confidence {:.2})",
                m.record.name,
                m.record
                    .municipality_name
                    .as_deref()
                    .unwrap_or(&m.record.place_class),
                m.confidence
            )
        })
        .collect::<Vec<_>>()
        .join("; ");
    if norwegian {
        format!(
            "Flere treff for '{}': {}. Hvilket sted mener du?",
            input.query, listed
        )
    } else {
        format!(
            "Multiple candidates for '{}': {}. Which one do you mean?",
            input.query, listed
        )
    }
}
