//! Static resource catalog: licensing, products, units and example payloads,
//! plus gazetteer metadata read through the store.

use std::sync::Arc;

use crate::attribution::{
    CREDIT_LINE, GAZETTEER_CREDIT_LINE, GAZETTEER_PROVIDER, LICENSE_URI, PROVIDER,
};
use crate::gazetteer::Resolver;
use crate::protocol::ReadResourceResult;
use crate::resource::{Resource, ResourceBuilder};
use crate::tools::{airquality, forecast, marine, nowcast, observations};

/// Build every resource. Gazetteer resources are only included when the
/// store opened.
pub fn build_all(resolver: Option<&Arc<Resolver>>) -> Vec<Resource> {
    let mut resources = vec![
        license(),
        products(),
        units(),
        examples("en"),
        examples("nb"),
    ];
    if let Some(resolver) = resolver {
        resources.push(gazetteer_license());
        resources.push(gazetteer_info(resolver.clone()));
    }
    resources
}

fn license() -> Resource {
    ResourceBuilder::new("weather://license")
        .name("Data license")
        .description("License terms for the weather data served by this server")
        .text(format!(
            "Weather data is provided by {} under the Creative Commons \
             Attribution 4.0 license ({}).\n\n\
             When presenting this data you must attribute the source: \
             \"{}\".\n\nThe data is provided as-is, with no warranty of \
             fitness for navigation or safety-critical use.",
            PROVIDER, LICENSE_URI, CREDIT_LINE
        ))
}

fn products() -> Resource {
    ResourceBuilder::new("weather://products")
        .name("Product catalog")
        .description("Products exposed by the weather tools and their coverage")
        .json(serde_json::json!({
            "provider": PROVIDER,
            "products": [
                {
                    "product": forecast::PRODUCT,
                    "tool": "weather.get_forecast",
                    "coverage": "global",
                    "horizonHours": 240
                },
                {
                    "product": nowcast::PRODUCT,
                    "tool": "weather.get_nowcast",
                    "coverage": "Nordic (lat 55..72, lon 4..32)",
                    "horizonHours": 2
                },
                {
                    "product": airquality::PRODUCT,
                    "tool": "weather.get_air_quality",
                    "coverage": "Norway (lat 58..71, lon 4..31)",
                    "horizonHours": 96
                },
                {
                    "product": marine::PRODUCT,
                    "tool": "weather.get_marine_forecast",
                    "coverage": "Norwegian coastal waters",
                    "horizonHours": 48
                },
                {
                    "product": observations::PRODUCT,
                    "tool": "weather.get_recent_observations",
                    "coverage": "Norwegian station network",
                    "lookbackHours": 168
                }
            ]
        }))
}

fn units() -> Resource {
    ResourceBuilder::new("weather://units")
        .name("Units")
        .description("Units used in structured tool output")
        .json(serde_json::json!({
            "temperature": "°C",
            "windSpeed": "m/s",
            "windDirection": "degrees, meteorological",
            "precipitation": "mm/h",
            "humidity": "%",
            "cloudCover": "%",
            "waveHeight": "m",
            "currentSpeed": "m/s",
            "concentration": "µg/m³",
            "time": "RFC 3339, UTC"
        }))
}

fn examples(language: &str) -> Resource {
    let payload = match language {
        "nb" => serde_json::json!({
            "tool": "weather.get_forecast",
            "arguments": {
                "location": {"lat": 59.91, "lon": 10.75},
                "timeWindow": {"preset": "next_24h"},
                "language": "nb"
            },
            "beskrivelse": "Timevarsel for Oslo neste døgn"
        }),
        _ => serde_json::json!({
            "tool": "weather.get_forecast",
            "arguments": {
                "location": {"lat": 59.91, "lon": 10.75},
                "timeWindow": {"preset": "next_24h"},
                "language": "en"
            },
            "description": "Hourly forecast for Oslo over the next day"
        }),
    };
    ResourceBuilder::new(format!("weather://examples/{}", language))
        .name(format!("Example call ({})", language))
        .description("A ready-to-send tools/call payload")
        .json(payload)
}

fn gazetteer_license() -> Resource {
    ResourceBuilder::new("places://license")
        .name("Gazetteer license")
        .description("License terms for the place-name gazetteer")
        .text(format!(
            "Place names are derived from the Sentralt stedsnavnregister \
             (SSR) published by {} under CC BY 4.0 ({}).\n\n\
             Attribution: \"{}\".",
            GAZETTEER_PROVIDER, LICENSE_URI, GAZETTEER_CREDIT_LINE
        ))
}

fn gazetteer_info(resolver: Arc<Resolver>) -> Resource {
    ResourceBuilder::new("places://info")
        .name("Gazetteer info")
        .description("Record count and build date of the loaded gazetteer")
        .mime_type("application/json")
        .handler(move || {
            let metadata = resolver.store().metadata().clone();
            async move {
                let body = serde_json::json!({
                    "recordCount": metadata.record_count,
                    "buildDate": metadata.build_date,
                });
                Ok(ReadResourceResult::text(
                    "places://info",
                    Some("application/json"),
                    serde_json::to_string_pretty(&body).unwrap_or_else(|_| "{}".to_string()),
                ))
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gazetteer::store::{PlaceStore, fixtures::create_fixture};

    #[tokio::test]
    async fn catalog_without_gazetteer() {
        let resources = build_all(None);
        let uris: Vec<_> = resources.iter().map(|r| r.uri.as_str()).collect();
        assert!(uris.contains(&"weather://license"));
        assert!(uris.contains(&"weather://products"));
        assert!(uris.contains(&"weather://units"));
        assert!(uris.contains(&"weather://examples/en"));
        assert!(uris.contains(&"weather://examples/nb"));
        assert!(!uris.contains(&"places://info"));
    }

    #[tokio::test]
    async fn gazetteer_info_reads_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("places.db");
        create_fixture(&path);
        let resolver = Arc::new(Resolver::new(std::sync::Arc::new(
            PlaceStore::open(&path).unwrap(),
        )));

        let resources = build_all(Some(&resolver));
        let info = resources
            .iter()
            .find(|r| r.uri == "places://info")
            .unwrap();
        let result = info.read().await.unwrap();
        assert!(result.contents[0].text.contains("\"recordCount\": 5"));
        assert!(result.contents[0].text.contains("2025-05-01"));
    }

    #[tokio::test]
    async fn license_resources_carry_credit_lines() {
        let resources = build_all(None);
        let license = resources
            .iter()
            .find(|r| r.uri == "weather://license")
            .unwrap();
        let result = license.read().await.unwrap();
        assert!(result.contents[0].text.contains(CREDIT_LINE));
    }
}
