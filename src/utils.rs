use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub fn expand_path(path_str: &str) -> Result<PathBuf> {
    if path_str.starts_with('~') {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::InputValidation("Could not find home directory".into()))?;

        if path_str == "~" {
            return Ok(home);
        }

        // "~user" is left alone; only the caller's own home is expanded
        if path_str.starts_with("~/") || path_str.starts_with("~\\") {
            return Ok(home.join(&path_str[2..]));
        }
    }

    Ok(PathBuf::from(path_str))
}

/// Expand `~` and anchor relative paths at the current directory.
pub fn resolve_path(path_str: &str) -> Result<PathBuf> {
    let expanded = expand_path(path_str)?;
    if expanded.is_absolute() {
        return Ok(expanded);
    }
    let cwd = std::env::current_dir().map_err(|e| Error::io("Failed to read", ".", e))?;
    Ok(cwd.join(expanded))
}

/// `path` with `suffix` appended to the file name (`key` -> `key.pub`).
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// Hide the last segment of a path-like value: `/home/u/.ssh/key` -> `/home/u/.ssh/***`.
/// Values without a separator are returned unchanged.
pub fn mask_path(value: &str) -> String {
    match value.rfind(['/', '\\']) {
        Some(idx) if idx + 1 < value.len() => format!("{}***", &value[..=idx]),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_home_prefix() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_path("~").unwrap(), home);
        assert_eq!(
            expand_path("~/.ssh/signing_key").unwrap(),
            home.join(".ssh/signing_key")
        );
        assert_eq!(expand_path("~other/x").unwrap(), PathBuf::from("~other/x"));
        assert_eq!(expand_path("/abs/key").unwrap(), PathBuf::from("/abs/key"));
    }

    #[test]
    fn resolves_relative_paths_against_cwd() {
        let resolved = resolve_path("keys/signing").unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("keys/signing"));
    }

    #[test]
    fn appends_suffix_without_replacing_extension() {
        assert_eq!(
            with_suffix(Path::new("/k/id.key"), ".pub"),
            PathBuf::from("/k/id.key.pub")
        );
    }

    #[test]
    fn masks_final_path_segment() {
        assert_eq!(mask_path("/home/u/.ssh/signing_key.pub"), "/home/u/.ssh/***");
        assert_eq!(mask_path("C:\\Users\\u\\.ssh\\key"), "C:\\Users\\u\\.ssh\\***");
        assert_eq!(mask_path("ssh"), "ssh");
        assert_eq!(mask_path("trailing/"), "trailing/");
    }
}
