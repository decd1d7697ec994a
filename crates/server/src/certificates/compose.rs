//! Certificate message composition.

use lettre::message::header::{self, ContentType};
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::{Address, Message};

use crate::config::CollegeInfo;
use crate::email_templates::CertificateEmailTemplate;
use crate::entity::{email_configuration, email_template};
use crate::error::ComposeError;

use super::CertificateFile;
use super::logos::{InlineLogo, PNG_CONTENT_TYPE};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Sender mailbox `"<from_name> <from_email>"` from the email configuration.
pub fn sender_mailbox(settings: &email_configuration::Model) -> Result<Mailbox, ComposeError> {
    let address: Address =
        settings
            .from_email
            .parse()
            .map_err(|e: lettre::address::AddressError| ComposeError::InvalidSender {
                address: settings.from_email.clone(),
                reason: e.to_string(),
            })?;
    let name = Some(settings.from_name.trim())
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    Ok(Mailbox::new(name, address))
}

/// Everything a certificate email carries, before it is addressed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertificateEmail {
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub attachment_name: String,
    pub attachment: Vec<u8>,
    pub inline_logos: Vec<InlineLogo>,
}

/// Render `template` for one certificate and take the file's contents.
///
/// The template is only borrowed. The file is read exactly once, after
/// rendering succeeded.
#[tracing::instrument(skip_all, fields(template_id = template.id, file = %file.name()))]
pub fn compose_certificate_email(
    template: &email_template::Model,
    branding: Option<&CollegeInfo>,
    logos: &[InlineLogo],
    file: &mut CertificateFile,
) -> Result<CertificateEmail, ComposeError> {
    let layout = CertificateEmailTemplate::new(template, branding)
        .with_logos(logos.iter().map(|logo| logo.content_id));
    let html_body = layout.render_html()?;
    let text_body = layout.render_text();
    let attachment = file.read()?;

    Ok(CertificateEmail {
        subject: template.subject.clone(),
        text_body,
        html_body,
        attachment_name: file.name().to_string(),
        attachment,
        inline_logos: logos.to_vec(),
    })
}

impl CertificateEmail {
    /// Build the multipart message: a text/HTML alternative plus the PDF.
    ///
    /// With inline logos the HTML part becomes multipart/related, holding the
    /// logos under their content ids.
    pub fn into_message(self, from: &Mailbox, to: Address) -> Result<Message, ComposeError> {
        let pdf = content_type(PDF_CONTENT_TYPE)?;

        let text = SinglePart::builder()
            .header(ContentType::TEXT_PLAIN)
            .body(self.text_body);
        let html = SinglePart::builder()
            .header(ContentType::TEXT_HTML)
            .body(self.html_body);
        let alternative = MultiPart::alternative().singlepart(text);
        let alternative = if self.inline_logos.is_empty() {
            alternative.singlepart(html)
        } else {
            let png = content_type(PNG_CONTENT_TYPE)?;
            let related = self
                .inline_logos
                .into_iter()
                .fold(MultiPart::related().singlepart(html), |related, logo| {
                    related.singlepart(
                        Attachment::new_inline(logo.content_id.to_string())
                            .body(logo.data, png.clone()),
                    )
                });
            alternative.multipart(related)
        };

        let message = Message::builder()
            .from(from.clone())
            .to(Mailbox::new(None, to))
            .subject(self.subject)
            .header(header::MIME_VERSION_1_0)
            .multipart(
                MultiPart::mixed()
                    .multipart(alternative)
                    .singlepart(Attachment::new(self.attachment_name).body(self.attachment, pdf)),
            )?;
        Ok(message)
    }
}

fn content_type(value: &str) -> Result<ContentType, ComposeError> {
    ContentType::parse(value).map_err(|e| ComposeError::Attachment(e.to_string()))
}
