//! Certificate email rendering with HTML (Askama) and SCSS styling
use askama::Template;
use once_cell::sync::Lazy;

use crate::config::CollegeInfo;
use crate::entity::email_template;

/// Compiled and inlined CSS from SCSS
static COMPILED_CSS: Lazy<String> = Lazy::new(|| {
    let scss = include_str!("../styles/email.scss");
    grass::from_string(scss.to_string(), &grass::Options::default())
        .expect("Failed to compile SCSS")
});

/// Inline CSS into HTML
#[tracing::instrument(skip(html))]
fn inline_css(html: &str) -> String {
    let options = css_inline::InlineOptions {
        load_remote_stylesheets: false,
        ..css_inline::InlineOptions::default()
    };

    let inliner = css_inline::CSSInliner::new(options);

    let html_with_style = html.replace(
        "</head>",
        &format!("<style>{}</style></head>", COMPILED_CSS.as_str()),
    );

    match inliner.inline(&html_with_style) {
        Ok(inlined) => inlined,
        Err(e) => {
            tracing::error!(
                name = "email.inline_css.failed",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                error = ?e,
                message = "Failed to inline CSS"
            );
            html.to_string()
        }
    }
}

/// Fixed layout wrapping a template's header message and body content.
///
/// `body_content` is administrator-authored rich text and is embedded
/// unescaped; the header and branding are escaped.
#[derive(Template)]
#[template(path = "certificate_email.html")]
pub struct CertificateEmailTemplate<'a> {
    pub header_message: &'a str,
    pub body_content: &'a str,
    pub college_name: Option<&'a str>,
    pub college_email: Option<&'a str>,
    /// Content ids of inline logos, rendered as `cid:` images.
    pub logo_cids: Vec<&'a str>,
    pub for_preview: bool,
}

impl<'a> CertificateEmailTemplate<'a> {
    pub fn new(template: &'a email_template::Model, branding: Option<&'a CollegeInfo>) -> Self {
        Self {
            header_message: &template.header_message,
            body_content: &template.body_content,
            college_name: branding.map(|c| c.name.as_str()),
            college_email: branding.map(|c| c.email.as_str()),
            logo_cids: Vec::new(),
            for_preview: false,
        }
    }

    pub fn with_logos(mut self, content_ids: impl IntoIterator<Item = &'a str>) -> Self {
        self.logo_cids = content_ids.into_iter().collect();
        self
    }

    /// Same layout with a placeholder where the attachment would be.
    pub fn preview(mut self) -> Self {
        self.for_preview = true;
        self
    }

    #[tracing::instrument(skip(self))]
    pub fn render_html(&self) -> Result<String, askama::Error> {
        let html = self.render()?;
        Ok(inline_css(&html))
    }

    pub fn render_text(&self) -> String {
        format!("{}\n\n{}", self.header_message, self.body_content)
    }
}
