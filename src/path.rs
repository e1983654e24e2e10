use crate::error::{FsError, Result};

pub fn is_blank(path: &str) -> bool {
    path.trim().is_empty()
}

/// 去掉 scheme 和 authority，例如 hdfs://nn:8020/a/b -> /a/b
pub fn strip_scheme_and_authority(path: &str) -> &str {
    match path.find("://") {
        Some(idx) => {
            let rest = &path[idx + 3..];
            match rest.find('/') {
                Some(pos) => &rest[pos..],
                None => "/",
            }
        }
        None => path,
    }
}

pub fn scheme(path: &str) -> Option<&str> {
    path.find("://").map(|idx| &path[..idx])
}

/// 规范化为以 / 开头、无重复分隔符、无结尾分隔符的逻辑路径
pub fn normalize(path: &str) -> Result<String> {
    let stripped = strip_scheme_and_authority(path);
    if is_blank(stripped) {
        return Err(FsError::InvalidPath("Can not create a Path from an empty string".into()));
    }

    let mut components = Vec::new();
    for component in stripped.split('/') {
        match component {
            "" | "." => continue,
            ".." => return Err(FsError::InvalidPath(format!("{} contains '..'", path))),
            c if c.contains('\0') => return Err(FsError::InvalidPath(path.to_string())),
            c => components.push(c),
        }
    }

    Ok(format!("/{}", components.join("/")))
}

pub fn name(path: &str) -> &str {
    let path = strip_scheme_and_authority(path).trim_end_matches('/');
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

pub fn parent(path: &str) -> Option<String> {
    let logical = normalize(path).ok()?;
    if logical == "/" {
        return None;
    }
    let idx = logical.rfind('/')?;
    if idx == 0 {
        Some("/".to_string())
    } else {
        Some(logical[..idx].to_string())
    }
}

pub fn join(base: &str, child: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), child.trim_start_matches('/'))
}

pub fn is_within(path: &str, ancestor: &str) -> bool {
    if ancestor == "/" {
        return path.starts_with('/');
    }
    path == ancestor
        || (path.starts_with(ancestor) && path.as_bytes().get(ancestor.len()) == Some(&b'/'))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    root: String,
}

impl PathResolver {
    pub fn new(root_uri: impl Into<String>) -> Self {
        let root: String = root_uri.into();
        Self {
            root: root.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn has_root(&self) -> bool {
        !self.root.is_empty()
    }

    /// 根 URI 为空时直接使用传入路径（视为已是绝对/本地路径）
    pub fn resolve(&self, path: &str) -> Result<String> {
        if !self.has_root() {
            if is_blank(path) {
                return Err(FsError::InvalidPath("Can not create a Path from an empty string".into()));
            }
            return Ok(path.to_string());
        }
        Ok(join(&self.root, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_with_root() {
        let resolver = PathResolver::new("hdfs://nn:8020/");
        assert_eq!(resolver.resolve("a/b.txt").unwrap(), "hdfs://nn:8020/a/b.txt");
        assert_eq!(resolver.resolve("/a/b.txt").unwrap(), "hdfs://nn:8020/a/b.txt");
        assert_eq!(resolver.resolve("").unwrap(), "hdfs://nn:8020/");
    }

    #[test]
    fn test_resolve_blank_root() {
        let resolver = PathResolver::new("  ");
        assert!(!resolver.has_root());
        assert_eq!(resolver.resolve("/tmp/x").unwrap(), "/tmp/x");
        assert!(matches!(resolver.resolve(" "), Err(FsError::InvalidPath(_))));
    }

    #[test]
    fn test_strip_and_normalize() {
        assert_eq!(strip_scheme_and_authority("hdfs://nn:8020/a/b"), "/a/b");
        assert_eq!(strip_scheme_and_authority("hdfs://nn:8020"), "/");
        assert_eq!(strip_scheme_and_authority("/a/b"), "/a/b");
        assert_eq!(scheme("file:///tmp"), Some("file"));
        assert_eq!(scheme("/tmp"), None);

        assert_eq!(normalize("memory://c//a/./b/").unwrap(), "/a/b");
        assert_eq!(normalize("memory://c/").unwrap(), "/");
        assert!(normalize("/a/../b").is_err());
        assert!(normalize("").is_err());
    }

    #[test]
    fn test_name_and_parent() {
        assert_eq!(name("/a/b/f.txt"), "f.txt");
        assert_eq!(name("hdfs://nn/a/"), "a");
        assert_eq!(name("/"), "");
        assert_eq!(parent("/a/b/f.txt").as_deref(), Some("/a/b"));
        assert_eq!(parent("/a").as_deref(), Some("/"));
        assert_eq!(parent("/"), None);
    }

    #[test]
    fn test_is_within() {
        assert!(is_within("/user/u/.Trash/Current/a", "/user/u/.Trash"));
        assert!(is_within("/user/u/.Trash", "/user/u/.Trash"));
        assert!(!is_within("/user/u/.TrashX", "/user/u/.Trash"));
        assert!(is_within("/anything", "/"));
    }
}
