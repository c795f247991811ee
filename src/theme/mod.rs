//! Page rendering
//!
//! Tera templates are embedded in the binary from `templates/` and rendered
//! through a [`PageRenderer`]. Every page gets the same base variables:
//! - `the_site_name` from [`SiteConfig`]
//! - `page_title`
//! - `current_user` when someone is logged in

use anyhow::Result;
use rust_embed::RustEmbed;
use serde::Serialize;
use std::error::Error as StdError;
use tera::{Context as TeraContext, Tera};

use crate::config::SiteConfig;
use crate::models::User;

mod error;

pub use error::ThemeError;

/// Embedded page templates
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct PageTemplates;

/// Renders pages with the site-wide variables filled in
pub struct PageRenderer {
    tera: Tera,
    site: SiteConfig,
}

impl PageRenderer {
    /// Load the embedded templates.
    pub fn new(site: SiteConfig) -> Result<Self> {
        let mut templates = Vec::new();
        for name in PageTemplates::iter() {
            let file = PageTemplates::get(&name)
                .ok_or_else(|| ThemeError::NotFound(name.to_string()))?;
            let content = String::from_utf8(file.data.into_owned()).map_err(|e| {
                ThemeError::TemplateError(format!("{} is not valid UTF-8: {}", name, e))
            })?;
            templates.push((name.to_string(), content));
        }

        Self::from_templates(site, templates)
    }

    /// Build a renderer from explicit `(name, source)` pairs.
    pub fn from_templates<I, N, S>(site: SiteConfig, templates: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, S)>,
        N: AsRef<str>,
        S: AsRef<str>,
    {
        let mut tera = Tera::default();
        let templates: Vec<(N, S)> = templates.into_iter().collect();
        tera.add_raw_templates(
            templates
                .iter()
                .map(|(name, source)| (name.as_ref(), source.as_ref())),
        )
        .map_err(|e| ThemeError::TemplateError(error_chain(&e)))?;

        tracing::debug!(count = templates.len(), "Loaded page templates");
        Ok(Self { tera, site })
    }

    /// Render `template` with the base variables added to `context`.
    pub fn render(
        &self,
        template: &str,
        page_title: &str,
        current_user: Option<&User>,
        mut context: TeraContext,
    ) -> Result<String> {
        if !self.has_template(template) {
            return Err(ThemeError::NotFound(template.to_string()).into());
        }

        context.insert("the_site_name", &self.site.name);
        context.insert("page_title", page_title);
        if let Some(user) = current_user {
            context.insert("current_user", &TemplateUser::from(user));
        }

        self.tera.render(template, &context).map_err(|e| {
            ThemeError::TemplateError(format!(
                "Failed to render '{}': {}",
                template,
                error_chain(&e)
            ))
            .into()
        })
    }

    /// Render, falling back to a bare error page if the template fails
    pub fn render_with_fallback(
        &self,
        template: &str,
        page_title: &str,
        current_user: Option<&User>,
        context: TeraContext,
    ) -> String {
        match self.render(template, page_title, current_user, context) {
            Ok(html) => html,
            Err(e) => {
                tracing::error!("Failed to render template '{}': {}", template, e);
                simple_error_page(&self.site.name, page_title)
            }
        }
    }

    pub fn has_template(&self, template: &str) -> bool {
        self.tera.get_template_names().any(|name| name == template)
    }
}

fn error_chain(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

/// Last-resort page when a template cannot be rendered
pub fn simple_error_page(site_name: &str, title: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title} | {site}</title>
</head>
<body>
    <h1>{title}</h1>
</body>
</html>"#,
        title = tera::escape_html(title),
        site = tera::escape_html(site_name),
    )
}

/// Logged-in user as seen by templates
#[derive(Debug, Clone, Serialize)]
pub struct TemplateUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub registration_accepted: bool,
    pub is_moderator: bool,
}

impl From<&User> for TemplateUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            registration_accepted: user.registration_accepted,
            is_moderator: user.is_moderator,
        }
    }
}
