//! Group (community) field rules.

use slug::slugify;

use crate::domain::error::DomainError;

pub const GROUP_TITLE_MAX_CHARS: usize = 200;
pub const GROUP_SLUG_MAX_CHARS: usize = 50;

/// Validated input for a new group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroup {
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl NewGroup {
    /// Validate the fields, deriving the slug from the title when none is given.
    pub fn parse(
        title: &str,
        slug: Option<&str>,
        description: &str,
    ) -> Result<Self, DomainError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DomainError::validation("group title must not be empty"));
        }
        if title.chars().count() > GROUP_TITLE_MAX_CHARS {
            return Err(DomainError::validation(format!(
                "group title must be at most {GROUP_TITLE_MAX_CHARS} characters"
            )));
        }

        let slug = match slug.map(str::trim).filter(|value| !value.is_empty()) {
            Some(explicit) => validate_slug(explicit)?.to_string(),
            None => {
                let derived = slugify(title);
                if derived.is_empty() {
                    return Err(DomainError::validation(format!(
                        "cannot derive a slug from `{title}`"
                    )));
                }
                derived.chars().take(GROUP_SLUG_MAX_CHARS).collect()
            }
        };

        Ok(Self {
            title: title.to_string(),
            slug,
            description: description.trim().to_string(),
        })
    }
}

/// Slugs are ASCII letters, digits, hyphens and underscores.
pub fn validate_slug(slug: &str) -> Result<&str, DomainError> {
    if slug.is_empty() {
        return Err(DomainError::validation("slug must not be empty"));
    }
    if slug.len() > GROUP_SLUG_MAX_CHARS {
        return Err(DomainError::validation(format!(
            "slug must be at most {GROUP_SLUG_MAX_CHARS} characters"
        )));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(DomainError::validation(format!(
            "slug `{slug}` may only contain letters, numbers, hyphens and underscores"
        )));
    }
    Ok(slug)
}
