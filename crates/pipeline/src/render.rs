use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;
use vite_ssg_bundler::rewrite_references;
use vite_ssg_core::{Error, Result, Route};
use vite_ssg_toolchain::{Formatter, Renderer};

/// A route's final document, ready to be written into the bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRoute {
    pub route: Route,
    /// Bundle-relative path of the document
    pub document_name: PathBuf,
    pub html: String,
}

/// Renders routes against a running preview origin and rewrites their
/// asset references.
#[derive(Clone)]
pub struct RouteRenderer {
    renderer: Arc<dyn Renderer>,
    formatter: Arc<dyn Formatter>,
}

impl RouteRenderer {
    pub fn new(renderer: Arc<dyn Renderer>, formatter: Arc<dyn Formatter>) -> Self {
        Self {
            renderer,
            formatter,
        }
    }

    /// Render `route` on `origin`, rewrite its references, then format it.
    ///
    /// Any failure to obtain the markup is reported as `Error::Render`
    /// naming the route.
    pub async fn render_route(&self, origin: &str, route: &Route) -> Result<RenderedRoute> {
        let url = route.url(origin);

        let rendered = self
            .renderer
            .render(&url)
            .await
            .map_err(|e| render_failure(route, e))?;

        let rewritten = rewrite_references(&rendered);
        let html = self.formatter.format(&rewritten).await?;

        debug!(%route, bytes = html.len(), "route rendered");

        Ok(RenderedRoute {
            route: route.clone(),
            document_name: route.document_name(),
            html,
        })
    }
}

fn render_failure(route: &Route, err: Error) -> Error {
    let cause = match err {
        Error::Render { cause, .. } => cause,
        other => other.to_string(),
    };
    Error::Render {
        route: route.to_string(),
        cause,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use vite_ssg_toolchain::Passthrough;

    /// Returns a fixed document and records the URLs it was asked for
    struct FixedRenderer {
        html: String,
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Renderer for FixedRenderer {
        async fn render(&self, url: &str) -> Result<String> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(self.html.clone())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl Renderer for Unreachable {
        async fn render(&self, url: &str) -> Result<String> {
            Err(Error::Render {
                route: url.to_string(),
                cause: "net::ERR_CONNECTION_REFUSED".to_string(),
            })
        }
    }

    /// Marks documents so the test can see formatting ran after rewriting
    struct Marking;

    #[async_trait]
    impl Formatter for Marking {
        async fn format(&self, html: &str) -> Result<String> {
            Ok(format!("<!-- formatted -->{}", html))
        }
    }

    #[tokio::test]
    async fn test_render_route_rewrites_and_names_document() {
        let renderer = Arc::new(FixedRenderer {
            html: r#"<script src="/assets/index-4f2a.js"></script>"#.to_string(),
            urls: Mutex::new(vec![]),
        });
        let route_renderer = RouteRenderer::new(renderer.clone(), Arc::new(Marking));
        let route = Route::parse("/about").unwrap();

        let rendered = route_renderer
            .render_route("http://127.0.0.1:5173", &route)
            .await
            .unwrap();

        assert_eq!(rendered.document_name, PathBuf::from("about.html"));
        assert_eq!(
            rendered.html,
            r#"<!-- formatted --><script src="/scripts/index-4f2a.js"></script>"#
        );
        assert_eq!(
            *renderer.urls.lock().unwrap(),
            vec!["http://127.0.0.1:5173/about".to_string()]
        );
    }

    #[tokio::test]
    async fn test_render_failure_names_route() {
        let route_renderer = RouteRenderer::new(Arc::new(Unreachable), Arc::new(Passthrough));
        let route = Route::parse("/pricing").unwrap();

        let err = route_renderer
            .render_route("http://127.0.0.1:5173", &route)
            .await
            .unwrap_err();

        match err {
            Error::Render { route, cause } => {
                assert_eq!(route, "/pricing");
                assert!(cause.contains("ERR_CONNECTION_REFUSED"));
            }
            other => panic!("expected render failure, got {:?}", other),
        }
    }
}
