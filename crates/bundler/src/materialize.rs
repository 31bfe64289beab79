use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use vite_ssg_core::{AssetCategory, Error, Result};
use walkdir::WalkDir;

/// Outcome of copying a build tree into a bundle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Bundle-relative paths of every copied file, in copy order
    pub copied: Vec<PathBuf>,
    /// Files with no asset category
    pub skipped: usize,
    /// Bundle-relative paths written more than once (last write wins)
    pub collisions: Vec<PathBuf>,
}

impl MaterializeReport {
    /// Number of files copied into the given category
    pub fn count(&self, category: AssetCategory) -> usize {
        self.copied
            .iter()
            .filter(|p| p.starts_with(category.dir_name()))
            .count()
    }
}

/// Create one empty subdirectory per asset category under `bundle_root`
pub fn prepare_bundle(bundle_root: &Path) -> Result<()> {
    for category in AssetCategory::ALL {
        let dir = bundle_root.join(category.dir_name());
        fs::create_dir_all(&dir).map_err(|e| {
            Error::Materialization(format!("Failed to create {}: {}", dir.display(), e))
        })?;
    }
    Ok(())
}

/// Copy every classified file under `source_root` into
/// `bundle_root/<category dir>/<file name>`, flattening the tree.
///
/// Unclassified files are skipped. Two files with the same name and
/// category overwrite each other in walk order; each overwrite is logged and
/// listed in the report. Any I/O failure aborts the whole copy.
pub fn materialize(source_root: &Path, bundle_root: &Path) -> Result<MaterializeReport> {
    if !source_root.is_dir() {
        return Err(Error::Materialization(format!(
            "Build output directory does not exist: {}",
            source_root.display()
        )));
    }

    prepare_bundle(bundle_root)?;

    let mut report = MaterializeReport::default();
    // bundle-relative destination -> source it was last copied from
    let mut written: HashMap<PathBuf, PathBuf> = HashMap::new();

    for entry in WalkDir::new(source_root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            Error::Materialization(format!("Failed to walk {}: {}", source_root.display(), e))
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(category) = AssetCategory::classify(entry.file_name()) else {
            debug!(path = %entry.path().display(), "skipping unclassified file");
            report.skipped += 1;
            continue;
        };

        let relative = Path::new(category.dir_name()).join(entry.file_name());
        let dest = bundle_root.join(&relative);

        fs::copy(entry.path(), &dest).map_err(|e| {
            Error::Materialization(format!(
                "Failed to copy {} to {}: {}",
                entry.path().display(),
                dest.display(),
                e
            ))
        })?;

        if let Some(previous) = written.insert(relative.clone(), entry.path().to_path_buf()) {
            warn!(
                asset = %relative.display(),
                replaced = %previous.display(),
                by = %entry.path().display(),
                "asset name collision, keeping the later file"
            );
            report.collisions.push(relative.clone());
        }

        report.copied.push(relative);
    }

    info!(
        scripts = report.count(AssetCategory::Script),
        css = report.count(AssetCategory::Stylesheet),
        images = report.count(AssetCategory::Image),
        fonts = report.count(AssetCategory::Font),
        skipped = report.skipped,
        "materialized assets"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn files_under(root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_prepare_bundle_creates_all_category_dirs() {
        let out = TempDir::new().unwrap();
        prepare_bundle(out.path()).unwrap();
        for dir in ["scripts", "css", "images", "fonts"] {
            assert!(out.path().join(dir).is_dir(), "{} missing", dir);
        }
    }

    #[test]
    fn test_materialize_flattens_nested_tree() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write(src.path(), "assets/nested/app.abc123.js", "console.log(1)");
        write(src.path(), "assets/nested/style.css", "body{}");
        write(src.path(), "assets/nested/logo.svg", "<svg/>");
        write(src.path(), "assets/nested/inter.woff2", "font");
        write(src.path(), "assets/nested/notes.txt", "ignore me");

        let report = materialize(src.path(), out.path()).unwrap();

        assert_eq!(
            files_under(out.path()),
            vec![
                PathBuf::from("css/style.css"),
                PathBuf::from("fonts/inter.woff2"),
                PathBuf::from("images/logo.svg"),
                PathBuf::from("scripts/app.abc123.js"),
            ]
        );
        assert_eq!(report.copied.len(), 4);
        assert_eq!(report.skipped, 1);
        assert!(report.collisions.is_empty());
        assert_eq!(
            fs::read_to_string(out.path().join("scripts/app.abc123.js")).unwrap(),
            "console.log(1)"
        );
    }

    #[test]
    fn test_materialize_collision_last_write_wins() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write(src.path(), "a/app.js", "first");
        write(src.path(), "b/app.js", "second");

        let report = materialize(src.path(), out.path()).unwrap();

        assert_eq!(files_under(out.path()), vec![PathBuf::from("scripts/app.js")]);
        // sorted walk visits a/ before b/
        assert_eq!(
            fs::read_to_string(out.path().join("scripts/app.js")).unwrap(),
            "second"
        );
        assert_eq!(report.collisions, vec![PathBuf::from("scripts/app.js")]);
    }

    #[test]
    fn test_materialize_creates_empty_category_dirs() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write(src.path(), "index.html", "<html></html>");

        let report = materialize(src.path(), out.path()).unwrap();

        assert!(report.copied.is_empty());
        assert_eq!(report.skipped, 1);
        for category in AssetCategory::ALL {
            assert!(out.path().join(category.dir_name()).is_dir());
        }
    }

    #[test]
    fn test_materialize_uppercase_extension() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write(src.path(), "img/PHOTO.JPG", "jpg");

        let report = materialize(src.path(), out.path()).unwrap();
        assert!(out.path().join("images/PHOTO.JPG").is_file());
        assert_eq!(report.count(AssetCategory::Image), 1);
    }

    #[test]
    fn test_materialize_missing_source_fails() {
        let out = TempDir::new().unwrap();
        let result = materialize(&out.path().join("dist"), out.path());
        let err = result.unwrap_err();
        assert!(matches!(err, Error::Materialization(_)));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_materialize_leaves_source_untouched() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write(src.path(), "assets/app.js", "x");
        write(src.path(), "robots.txt", "y");

        let before = files_under(src.path());
        materialize(src.path(), out.path()).unwrap();
        assert_eq!(files_under(src.path()), before);
    }
}
