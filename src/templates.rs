//! Embedded HTML templates for the browse, watch and error pages.

use crate::error::AppError;
use rust_embed::RustEmbed;
use std::collections::HashMap;

#[derive(RustEmbed)]
#[folder = "templates"]
struct Templates;

/// Renderer over the embedded templates, substituting `{{VARIABLE}}`
/// placeholders.
pub struct TemplateEngine;

impl TemplateEngine {
    pub fn new() -> Self {
        Self
    }

    fn load(&self, name: &str) -> Result<String, AppError> {
        let file = Templates::get(name).ok_or_else(|| {
            AppError::InternalServerError(format!("Template '{name}' not embedded"))
        })?;
        String::from_utf8(file.data.into_owned())
            .map_err(|e| AppError::InternalServerError(format!("Template '{name}' not UTF-8: {e}")))
    }

    /// Render a template with variables in the format {{VARIABLE_NAME}}.
    pub fn render(
        &self,
        template_name: &str,
        variables: &HashMap<String, String>,
    ) -> Result<String, AppError> {
        let mut rendered = self.load(template_name)?;
        for (key, value) in variables {
            let placeholder = format!("{{{{{key}}}}}");
            rendered = rendered.replace(&placeholder, value);
        }
        Ok(rendered)
    }

    /// Directory listing page. `entries_html` is the pre-rendered table body.
    pub fn render_browse_page(
        &self,
        display_path: &str,
        parent_href: Option<&str>,
        entries_html: &str,
        entry_count: usize,
    ) -> Result<String, AppError> {
        let mut variables = HashMap::new();
        variables.insert("PATH".to_string(), html_escape(display_path));
        variables.insert("ENTRY_COUNT".to_string(), entry_count.to_string());

        let parent_row = match parent_href {
            Some(href) => format!(
                r#"<tr>
                    <td class="thumb-cell"></td>
                    <td><a href="{href}" class="entry-link directory">..</a></td>
                    <td class="size">-</td>
                    <td class="date">-</td>
                </tr>"#
            ),
            None => String::new(),
        };
        variables.insert(
            "ENTRIES".to_string(),
            format!("{parent_row}{entries_html}"),
        );

        self.render("browse.html", &variables)
    }

    /// Player page wrapping a single `<video>` element.
    pub fn render_watch_page(
        &self,
        video_href: &str,
        thumb_href: &str,
        filename: &str,
        mime: &str,
    ) -> Result<String, AppError> {
        let mut variables = HashMap::new();
        variables.insert("VIDEO_HREF".to_string(), video_href.to_string());
        variables.insert("THUMB_HREF".to_string(), thumb_href.to_string());
        variables.insert("FILENAME".to_string(), html_escape(filename));
        variables.insert("MIME".to_string(), mime.to_string());
        self.render("watch.html", &variables)
    }

    /// Error page for a status code.
    pub fn render_error_page(&self, status_code: u16, status_text: &str) -> Result<String, AppError> {
        let mut variables = HashMap::new();
        variables.insert("STATUS_CODE".to_string(), status_code.to_string());
        variables.insert("STATUS_TEXT".to_string(), status_text.to_string());
        variables.insert(
            "DESCRIPTION".to_string(),
            get_error_description(status_code).to_string(),
        );
        self.render("error.html", &variables)
    }
}

/// Simple HTML entity escaping.
pub fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Get human-friendly error descriptions.
pub fn get_error_description(status_code: u16) -> &'static str {
    match status_code {
        400 => "The request could not be understood due to malformed syntax.",
        403 => "Access to this resource is forbidden.",
        404 => "The requested file or directory could not be found.",
        405 => "The request method is not allowed for this resource.",
        415 => "This file is not a playable media type.",
        416 => "The requested byte range cannot be satisfied by this file.",
        500 => "An internal server error occurred while processing your request.",
        _ => "An unexpected error occurred while processing your request.",
    }
}
