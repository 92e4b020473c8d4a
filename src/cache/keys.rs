use std::fmt;

use crate::application::pagination::page_param;

/// Identity of one cached page.
///
/// The viewer is part of the key because the layout shows who is signed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageCacheKey {
    pub path: String,
    pub page: Option<String>,
    pub viewer: Option<String>,
}

impl PageCacheKey {
    pub fn new(path: impl Into<String>, query: Option<&str>, viewer: Option<&str>) -> Self {
        Self {
            path: path.into(),
            page: query.and_then(page_param),
            viewer: viewer.map(str::to_string),
        }
    }
}

impl fmt::Display for PageCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}?page={}#{}",
            self.path,
            self.page.as_deref().unwrap_or(""),
            self.viewer.as_deref().unwrap_or("anonymous")
        )
    }
}
