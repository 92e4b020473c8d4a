use time::OffsetDateTime;

use crate::application::viewer::Viewer;
use crate::presentation::views::{LayoutChrome, ViewerView};

/// Builds the layout shared by every public page.
#[derive(Clone)]
pub struct ChromeService {
    site_title: String,
}

impl ChromeService {
    pub fn new(site_title: impl Into<String>) -> Self {
        Self {
            site_title: site_title.into(),
        }
    }

    pub fn load(&self, viewer: Option<&Viewer>) -> LayoutChrome {
        self.load_at(viewer, OffsetDateTime::now_utc())
    }

    pub fn load_at(&self, viewer: Option<&Viewer>, now: OffsetDateTime) -> LayoutChrome {
        LayoutChrome {
            site_title: self.site_title.clone(),
            viewer: viewer.map(|viewer| ViewerView {
                username: viewer.username.clone(),
            }),
            year: now.year(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::UserId;
    use time::macros::datetime;

    #[test]
    fn footer_year_follows_clock() {
        let chrome = ChromeService::new("Yatube").load_at(None, datetime!(2031-06-01 0:00 UTC));
        assert_eq!(chrome.year, 2031);
        assert!(chrome.viewer.is_none());
    }

    #[test]
    fn viewer_is_exposed_to_layout() {
        let viewer = Viewer {
            id: UserId(1),
            username: "anna".to_string(),
        };
        let chrome = ChromeService::new("Yatube").load(Some(&viewer));
        assert_eq!(chrome.viewer.map(|v| v.username).as_deref(), Some("anna"));
    }
}
