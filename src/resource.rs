//! Resource definition and builder API.
//!
//! Resources are static reads by URI: license documents, product catalogs,
//! unit tables and gazetteer metadata. Most are fixed text or JSON; the
//! gazetteer-info resource reads through to the store, so a handler variant
//! exists too.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Result;
use crate::protocol::{ReadResourceResult, ResourceDefinition};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
type ResourceFn = dyn Fn() -> BoxFuture<'static, Result<ReadResourceResult>> + Send + Sync;

/// A readable resource with fixed metadata.
pub struct Resource {
    pub uri: String,
    pub name: String,
    pub description: Option<String>,
    pub mime_type: Option<String>,
    handler: Arc<ResourceFn>,
}

impl Resource {
    pub fn builder(uri: impl Into<String>) -> ResourceBuilder {
        ResourceBuilder::new(uri)
    }

    /// The definition for `resources/list`.
    pub fn definition(&self) -> ResourceDefinition {
        ResourceDefinition {
            uri: self.uri.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
        }
    }

    /// Read the resource contents.
    pub fn read(&self) -> BoxFuture<'static, Result<ReadResourceResult>> {
        (self.handler)()
    }
}

/// Builder for resources.
pub struct ResourceBuilder {
    uri: String,
    name: Option<String>,
    description: Option<String>,
    mime_type: Option<String>,
}

impl ResourceBuilder {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: None,
            description: None,
            mime_type: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Finish with fixed text content.
    pub fn text(self, content: impl Into<String>) -> Resource {
        let mime = self.mime_type.clone().or(Some("text/plain".to_string()));
        let uri = self.uri.clone();
        let content = content.into();
        self.build_with(mime, move || {
            let uri = uri.clone();
            let content = content.clone();
            Box::pin(async move {
                Ok(ReadResourceResult::text(
                    uri,
                    Some("text/plain"),
                    content,
                ))
            })
        })
    }

    /// Finish with fixed JSON content.
    pub fn json(self, value: serde_json::Value) -> Resource {
        let uri = self.uri.clone();
        let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string());
        self.build_with(Some("application/json".to_string()), move || {
            let uri = uri.clone();
            let text = text.clone();
            Box::pin(async move {
                Ok(ReadResourceResult::text(
                    uri,
                    Some("application/json"),
                    text,
                ))
            })
        })
    }

    /// Finish with a dynamic handler.
    pub fn handler<F, Fut>(self, handler: F) -> Resource
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ReadResourceResult>> + Send + 'static,
    {
        let mime = self.mime_type.clone();
        self.build_with(mime, move || Box::pin(handler()))
    }

    fn build_with<F>(self, mime_type: Option<String>, handler: F) -> Resource
    where
        F: Fn() -> BoxFuture<'static, Result<ReadResourceResult>> + Send + Sync + 'static,
    {
        let name = self.name.unwrap_or_else(|| self.uri.clone());
        Resource {
            uri: self.uri,
            name,
            description: self.description,
            mime_type,
            handler: Arc::new(handler),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_text_resource() {
        let resource = ResourceBuilder::new("weather://license")
            .name("License")
            .description("Data license")
            .text("CC BY 4.0");

        let def = resource.definition();
        assert_eq!(def.uri, "weather://license");
        assert_eq!(def.name, "License");

        let result = resource.read().await.unwrap();
        assert_eq!(result.contents[0].text, "CC BY 4.0");
        assert_eq!(result.contents[0].mime_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn json_resource() {
        let resource = ResourceBuilder::new("weather://products")
            .name("Products")
            .json(serde_json::json!({"products": ["Locationforecast 2.0"]}));

        let result = resource.read().await.unwrap();
        assert!(result.contents[0].text.contains("Locationforecast 2.0"));
        assert_eq!(
            result.contents[0].mime_type.as_deref(),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn dynamic_resource() {
        let resource = ResourceBuilder::new("places://info")
            .name("Gazetteer info")
            .mime_type("application/json")
            .handler(|| async {
                Ok(ReadResourceResult::text(
                    "places://info",
                    Some("application/json"),
                    r#"{"recordCount": 12}"#,
                ))
            });

        let result = resource.read().await.unwrap();
        assert!(result.contents[0].text.contains("recordCount"));
    }
}
