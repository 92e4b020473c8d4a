//! Decoding of submitted post and comment forms.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::Multipart;
use serde::Deserialize;

use crate::application::{
    pagination::page_param,
    posts::{ImageUpload, PostForm},
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommentSubmission {
    pub text: String,
}

/// Requested listing page, read from the raw query string.
#[derive(Debug, Default)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl<S> FromRequestParts<S> for PageQuery
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            page: parts.uri.query().and_then(page_param),
        })
    }
}

/// Collect the multipart post form. Unknown fields are ignored and an image
/// field without a file is treated as absent.
pub async fn read_post_form(mut multipart: Multipart) -> Result<PostForm, String> {
    let mut form = PostForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| format!("failed to read multipart field: {err}"))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            "text" => {
                form.text = field
                    .text()
                    .await
                    .map_err(|err| format!("failed to read text: {err}"))?;
            }
            "group" => {
                form.group = field
                    .text()
                    .await
                    .map_err(|err| format!("failed to read group: {err}"))?;
            }
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|err| format!("failed to read image: {err}"))?;
                if !file_name.is_empty() || !data.is_empty() {
                    form.image = Some(ImageUpload { file_name, data });
                }
            }
            _ => {}
        }
    }

    Ok(form)
}
