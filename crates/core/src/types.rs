use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Document written for the root route
pub const INDEX_DOCUMENT: &str = "index.html";

/// Extension appended to every non-root route's document
pub const DOCUMENT_EXTENSION: &str = "html";

/// Semantic type of a build artifact.
///
/// Each category owns a fixed set of file extensions and the bundle
/// subdirectory its files are flattened into. Extension sets are disjoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetCategory {
    Script,
    Stylesheet,
    Image,
    Font,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 4] = [
        AssetCategory::Script,
        AssetCategory::Stylesheet,
        AssetCategory::Image,
        AssetCategory::Font,
    ];

    /// Recognized extensions, lowercase and without the leading dot
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            AssetCategory::Script => &["js", "mjs", "cjs"],
            AssetCategory::Stylesheet => &["css"],
            AssetCategory::Image => &["png", "jpg", "jpeg", "gif", "svg", "webp", "ico"],
            AssetCategory::Font => &["woff", "woff2", "ttf", "otf", "eot"],
        }
    }

    /// Subdirectory of the output bundle holding this category
    pub fn dir_name(self) -> &'static str {
        match self {
            AssetCategory::Script => "scripts",
            AssetCategory::Stylesheet => "css",
            AssetCategory::Image => "images",
            AssetCategory::Font => "fonts",
        }
    }

    /// Classify a file by its (case-insensitive) extension.
    ///
    /// Only the name is inspected, never the content. Returns `None` for
    /// names without an extension or with one no category recognizes.
    pub fn classify<P: AsRef<Path>>(file_name: P) -> Option<AssetCategory> {
        let ext = file_name
            .as_ref()
            .extension()?
            .to_string_lossy()
            .to_lowercase();

        Self::ALL
            .into_iter()
            .find(|category| category.extensions().contains(&ext.as_str()))
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A logical application path to render, e.g. `/` or `/blog/post-1`.
///
/// Stored normalized: always starts with `/`, never ends with one (except
/// the root itself).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route(String);

impl Route {
    pub fn root() -> Self {
        Route("/".to_string())
    }

    /// Parse and normalize a route string.
    ///
    /// Rejects routes that could escape the output bundle once mapped to a
    /// document name (`..` segments, backslashes) and routes carrying a
    /// query or fragment.
    pub fn parse(raw: &str) -> Result<Self> {
        let route = raw.trim();

        if route.is_empty() {
            return Err(Error::InputValidation("Empty route".to_string()));
        }

        if !route.starts_with('/') {
            return Err(Error::InputValidation(format!(
                "Route must start with '/': '{}'",
                route
            )));
        }

        if route.contains(['?', '#', '\\']) {
            return Err(Error::InputValidation(format!(
                "Route may not contain '?', '#' or '\\': '{}'",
                route
            )));
        }

        let trimmed = route.trim_end_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        for segment in trimmed[1..].split('/') {
            match segment {
                "" => {
                    return Err(Error::InputValidation(format!(
                        "Route contains an empty segment: '{}'",
                        route
                    )));
                }
                "." | ".." => {
                    return Err(Error::InputValidation(format!(
                        "Relative segments not allowed in route: '{}'",
                        route
                    )));
                }
                _ => {}
            }
        }

        Ok(Route(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Relative path of the document this route is written to.
    ///
    /// `/` maps to `index.html`; any other route keeps its segments as
    /// directories and gets `.html` appended (`/blog/post-1` →
    /// `blog/post-1.html`).
    pub fn document_name(&self) -> PathBuf {
        if self.is_root() {
            return PathBuf::from(INDEX_DOCUMENT);
        }
        PathBuf::from(format!("{}.{}", &self.0[1..], DOCUMENT_EXTENSION))
    }

    /// Absolute URL of this route on the given origin (`http://127.0.0.1:5173`)
    pub fn url(&self, origin: &str) -> String {
        format!("{}{}", origin.trim_end_matches('/'), self.0)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of `POST /api/ssg`, exactly as the client sent it
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SsgRequest {
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub routes: Option<Vec<String>>,
}

/// Validated input of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub repo_url: String,
    pub routes: Vec<Route>,
}

impl RunRequest {
    pub fn new(repo_url: impl Into<String>, routes: Vec<Route>) -> Self {
        Self {
            repo_url: repo_url.into(),
            routes,
        }
    }

    /// Short name derived from the repository URL, used as a prefix for
    /// per-run directories (`https://host/org/app.git` → `app`).
    pub fn repo_name(&self) -> String {
        repo_name(&self.repo_url)
    }
}

impl TryFrom<SsgRequest> for RunRequest {
    type Error = Error;

    fn try_from(request: SsgRequest) -> Result<Self> {
        let repo_url = request
            .repo_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| Error::InputValidation("repoUrl is required".to_string()))?;

        let routes = match request.routes {
            Some(routes) if !routes.is_empty() => routes
                .iter()
                .map(|r| Route::parse(r))
                .collect::<Result<Vec<_>>>()?,
            _ => vec![Route::root()],
        };

        // two routes writing the same document would silently overwrite each other
        let mut documents = HashSet::new();
        for route in &routes {
            if !documents.insert(route.document_name()) {
                return Err(Error::InputValidation(format!(
                    "Route '{}' duplicates another route's document {}",
                    route,
                    route.document_name().display()
                )));
            }
        }

        Ok(RunRequest { repo_url, routes })
    }
}

fn repo_name(url: &str) -> String {
    let last = url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default();
    let last = last.strip_suffix(".git").unwrap_or(last);

    let name: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let name = name.trim_matches(|c| c == '.' || c == '-');

    if name.is_empty() {
        "repo".to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_every_known_extension() {
        for category in AssetCategory::ALL {
            for ext in category.extensions() {
                let name = format!("file.{}", ext);
                assert_eq!(AssetCategory::classify(&name), Some(category), "{}", name);
            }
        }
    }

    #[test]
    fn test_classify_unknown_extensions() {
        assert_eq!(AssetCategory::classify("notes.txt"), None);
        assert_eq!(AssetCategory::classify("app.js.map"), None);
        assert_eq!(AssetCategory::classify("index.html"), None);
        assert_eq!(AssetCategory::classify("LICENSE"), None);
        assert_eq!(AssetCategory::classify(".gitignore"), None);
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(AssetCategory::classify("LOGO.PNG"), Some(AssetCategory::Image));
        assert_eq!(AssetCategory::classify("Main.Js"), Some(AssetCategory::Script));
        assert_eq!(AssetCategory::classify("Inter.WOFF2"), Some(AssetCategory::Font));
    }

    #[test]
    fn test_classify_ignores_directories_in_path() {
        assert_eq!(
            AssetCategory::classify("dist/assets.css/app.abc123.js"),
            Some(AssetCategory::Script)
        );
    }

    #[test]
    fn test_extension_sets_are_disjoint() {
        for a in AssetCategory::ALL {
            for b in AssetCategory::ALL {
                if a == b {
                    continue;
                }
                for ext in a.extensions() {
                    assert!(!b.extensions().contains(ext), "{} in {} and {}", ext, a, b);
                }
            }
        }
    }

    #[test]
    fn test_route_document_names() {
        assert_eq!(Route::root().document_name(), PathBuf::from("index.html"));
        assert_eq!(
            Route::parse("/about").unwrap().document_name(),
            PathBuf::from("about.html")
        );
        assert_eq!(
            Route::parse("/blog/post-1").unwrap().document_name(),
            PathBuf::from("blog/post-1.html")
        );
    }

    #[test]
    fn test_route_trailing_slash_is_dropped() {
        let route = Route::parse("/about/").unwrap();
        assert_eq!(route.as_str(), "/about");
        assert_eq!(route.document_name(), PathBuf::from("about.html"));
        assert!(Route::parse("//").unwrap().is_root());
    }

    #[test]
    fn test_route_rejects_invalid() {
        assert!(Route::parse("").is_err());
        assert!(Route::parse("about").is_err());
        assert!(Route::parse("/../etc/passwd").is_err());
        assert!(Route::parse("/blog/./x").is_err());
        assert!(Route::parse("/a//b").is_err());
        assert!(Route::parse("/search?q=1").is_err());
        assert!(Route::parse("/page#top").is_err());
        assert!(Route::parse("/a\\b").is_err());
    }

    #[test]
    fn test_route_url() {
        let route = Route::parse("/about").unwrap();
        assert_eq!(route.url("http://127.0.0.1:5173"), "http://127.0.0.1:5173/about");
        assert_eq!(route.url("http://127.0.0.1:5173/"), "http://127.0.0.1:5173/about");
        assert_eq!(Route::root().url("http://localhost:8080"), "http://localhost:8080/");
    }

    #[test]
    fn test_repo_name() {
        assert_eq!(repo_name("https://github.com/acme/landing.git"), "landing");
        assert_eq!(repo_name("https://github.com/acme/landing"), "landing");
        assert_eq!(repo_name("https://github.com/acme/landing/"), "landing");
        assert_eq!(repo_name("git@github.com:acme/site.git"), "site");
        assert_eq!(repo_name("/tmp/local repo"), "local-repo");
        assert_eq!(repo_name(".git"), "repo");
    }

    #[test]
    fn test_run_request_requires_repo_url() {
        let err = RunRequest::try_from(SsgRequest::default()).unwrap_err();
        assert!(err.is_client_error());
        assert!(err.to_string().contains("repoUrl is required"));

        let blank = SsgRequest {
            repo_url: Some("   ".to_string()),
            routes: None,
        };
        assert!(RunRequest::try_from(blank).unwrap_err().is_client_error());
    }

    #[test]
    fn test_run_request_defaults_routes_to_root() {
        let request = SsgRequest {
            repo_url: Some("https://example.com/app.git".to_string()),
            routes: None,
        };
        let run = RunRequest::try_from(request).unwrap();
        assert_eq!(run.routes, vec![Route::root()]);

        let empty = SsgRequest {
            repo_url: Some("https://example.com/app.git".to_string()),
            routes: Some(vec![]),
        };
        assert_eq!(RunRequest::try_from(empty).unwrap().routes, vec![Route::root()]);
    }

    #[test]
    fn test_run_request_rejects_bad_route() {
        let request = SsgRequest {
            repo_url: Some("https://example.com/app.git".to_string()),
            routes: Some(vec!["/".to_string(), "../secret".to_string()]),
        };
        let err = RunRequest::try_from(request).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_run_request_rejects_routes_sharing_a_document() {
        let request = |routes: &[&str]| SsgRequest {
            repo_url: Some("https://example.com/app.git".to_string()),
            routes: Some(routes.iter().map(|r| r.to_string()).collect()),
        };

        let err = RunRequest::try_from(request(&["/about", "/about/"])).unwrap_err();
        assert!(err.is_client_error());
        assert!(err.to_string().contains("about.html"));

        let err = RunRequest::try_from(request(&["/", "/index"])).unwrap_err();
        assert!(err.to_string().contains("index.html"));

        let ok = RunRequest::try_from(request(&["/", "/about", "/blog/about"])).unwrap();
        assert_eq!(ok.routes.len(), 3);
    }

    #[test]
    fn test_ssg_request_deserializes_camel_case() {
        let request: SsgRequest =
            serde_json::from_str(r#"{"repoUrl":"https://x/y.git","routes":["/","/about"]}"#)
                .unwrap();
        assert_eq!(request.repo_url.as_deref(), Some("https://x/y.git"));
        assert_eq!(request.routes.unwrap().len(), 2);
    }
}
