#![forbid(unsafe_code)]

use std::path::{Component, Path, PathBuf};

use crate::car::error::{CatalogError, CatalogResult};

pub fn normalize_rel_path(input_root: &Path, file_path: &Path) -> CatalogResult<String> {
    let rel = file_path.strip_prefix(input_root).map_err(|_| {
        CatalogError::Invalid(format!(
            "path is outside input dir: {}",
            file_path.to_string_lossy()
        ))
    })?;

    let mut out = String::new();
    for (i, comp) in rel.components().enumerate() {
        if i != 0 {
            out.push('/');
        }
        out.push_str(&comp.as_os_str().to_string_lossy());
    }

    while out.starts_with('/') {
        out.remove(0);
    }
    out = out.replace('\\', "/");

    if out.is_empty() {
        return Err(CatalogError::Invalid("empty relative path".into()));
    }

    Ok(out)
}

pub fn prefixed(prefix: &str, rel: &str) -> String {
    if prefix.is_empty() {
        return rel.to_string();
    }
    let mut p = prefix.replace('\\', "/");
    if !p.ends_with('/') {
        p.push('/');
    }
    let r = rel.trim_start_matches('/');
    format!("{p}{r}")
}

pub fn should_exclude(norm_path: &str, excludes: &[String]) -> bool {
    excludes.iter().any(|e| !e.is_empty() && norm_path.contains(e))
}

/// Splits `dir/name@2x.png` into the lookup name `dir/name` and scale 2.
pub fn lookup_name_and_scale(logical: &str) -> (String, u16) {
    let (dir, file) = match logical.rfind('/') {
        Some(i) => (&logical[..=i], &logical[i + 1..]),
        None => ("", logical),
    };
    let stem = match file.rfind('.') {
        Some(i) if i > 0 => &file[..i],
        _ => file,
    };
    for scale in [2u16, 3] {
        if let Some(base) = stem.strip_suffix(&format!("@{scale}x")) {
            return (format!("{dir}{base}"), scale);
        }
    }
    (format!("{dir}{stem}"), 1)
}

/// Output location for an extracted item, or `None` if nothing safe remains
/// of the name. `..` and absolute components are dropped.
pub fn extraction_path(root: &Path, name: &str) -> Option<PathBuf> {
    let mut out = root.to_path_buf();
    let mut pushed = false;
    for comp in Path::new(&name.replace('\\', "/")).components() {
        if let Component::Normal(part) = comp {
            out.push(part);
            pushed = true;
        }
    }
    pushed.then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_suffix_is_stripped() {
        assert_eq!(lookup_name_and_scale("a/star@2x.png"), ("a/star".into(), 2));
        assert_eq!(lookup_name_and_scale("star@3x.png"), ("star".into(), 3));
        assert_eq!(lookup_name_and_scale("star.png"), ("star".into(), 1));
        assert_eq!(lookup_name_and_scale(".hidden"), (".hidden".into(), 1));
    }

    #[test]
    fn extraction_path_stays_under_root() {
        let root = Path::new("/out");
        assert_eq!(
            extraction_path(root, "../../etc/passwd"),
            Some(PathBuf::from("/out/etc/passwd"))
        );
        assert_eq!(
            extraction_path(root, "icons/star"),
            Some(PathBuf::from("/out/icons/star"))
        );
        assert_eq!(extraction_path(root, ".."), None);
    }

    #[test]
    fn prefix_gets_one_separator() {
        assert_eq!(prefixed("assets", "/x.png"), "assets/x.png");
        assert_eq!(prefixed("", "x.png"), "x.png");
    }
}
