use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Request path relative to an endpoint base url, always starting with '/'.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path(String);

#[derive(Debug, Error)]
pub enum PathError {
    #[error("Path must start with '/', got: {0}")]
    InvalidPath(String),
}

impl Path {
    /// Creates a new Path, returns Err if it doesn't start with '/'.
    pub fn new<T: Into<String>>(path: T) -> Result<Self, PathError> {
        let path_str = path.into();
        if path_str.starts_with('/') {
            Ok(Path(path_str))
        } else {
            Err(PathError::InvalidPath(path_str))
        }
    }

    /// Creates a new Path, automatically adding '/' prefix if missing.
    pub fn ensure_leading_slash<T: Into<String>>(path: T) -> Self {
        let path_str = path.into();
        if path_str.starts_with('/') {
            Path(path_str)
        } else {
            Path(format!("/{}", path_str))
        }
    }

    /// Appends a url-encoded query pair, keeping pairs already present.
    pub fn with_query(self, key: &str, value: impl Display) -> Self {
        let separator = if self.0.contains('?') { '&' } else { '?' };
        let value = value.to_string();
        Path(format!(
            "{}{}{}={}",
            self.0,
            separator,
            key,
            urlencoding::encode(&value)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.0
    }
}

impl From<&str> for Path {
    fn from(path: &str) -> Self {
        Path::ensure_leading_slash(path)
    }
}

impl From<String> for Path {
    fn from(path: String) -> Self {
        Path::ensure_leading_slash(path)
    }
}

impl AsRef<str> for Path {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
