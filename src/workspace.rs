use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

static SITE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").unwrap());

/// Directory for `site_id` under `root`. Externally supplied identifiers
/// must never escape the root.
pub fn site_dir(root: &Path, site_id: &str) -> Result<PathBuf> {
    if !SITE_ID_RE.is_match(site_id) {
        return Err(Error::validation(format!("invalid site id `{}`", site_id)));
    }
    let joined = root.join(site_id);
    let escapes = joined
        .strip_prefix(root)
        .map(|rel| {
            rel.components()
                .any(|c| !matches!(c, Component::Normal(_)))
        })
        .unwrap_or(true);
    if escapes {
        return Err(Error::validation(format!(
            "site id `{}` escapes {}",
            site_id,
            root.display()
        )));
    }
    Ok(joined)
}

/// Join a slug-derived file name under an existing site directory.
pub fn site_file(site: &Path, dir: &str, slug: &str, ext: &str) -> Result<PathBuf> {
    let dir_path = site_dir(site, dir)?;
    site_dir(&dir_path, slug).map(|p| p.with_extension(ext))
}
