//! Logos embedded in the HTML body and referenced as `cid:` images.

use std::io::ErrorKind;
use std::path::Path;

pub const PNG_CONTENT_TYPE: &str = "image/png";

/// (file name, content id) of every logo that may be embedded.
pub const LOGO_FILES: [(&str, &str); 2] = [
    ("college_logo.png", "college_logo"),
    ("nexus_logo.png", "nexus_logo"),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineLogo {
    pub content_id: &'static str,
    pub filename: &'static str,
    pub data: Vec<u8>,
}

/// Read the logos present in `dir`, in [`LOGO_FILES`] order.
///
/// A missing directory or file only means that logo is left out.
pub async fn load_inline_logos(dir: Option<&Path>) -> Vec<InlineLogo> {
    let Some(dir) = dir else {
        return Vec::new();
    };

    let mut logos = Vec::with_capacity(LOGO_FILES.len());
    for (filename, content_id) in LOGO_FILES {
        let path = dir.join(filename);
        match tokio::fs::read(&path).await {
            Ok(data) => logos.push(InlineLogo {
                content_id,
                filename,
                data,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(
                    name = "certificates.logos.missing",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    path = %path.display(),
                    message = "Logo not found, sending without it"
                );
            }
            Err(e) => {
                tracing::warn!(
                    name = "certificates.logos.unreadable",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    path = %path.display(),
                    error = %e,
                    message = "Failed to read logo, sending without it"
                );
            }
        }
    }
    logos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "certificate-mailer-{name}-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn no_directory_means_no_logos() {
        assert!(load_inline_logos(None).await.is_empty());
    }

    #[tokio::test]
    async fn only_present_logos_are_loaded() {
        let dir = scratch_dir("college-only");
        std::fs::write(dir.join("college_logo.png"), b"\x89PNG college").unwrap();

        let logos = load_inline_logos(Some(&dir)).await;
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(
            logos,
            vec![InlineLogo {
                content_id: "college_logo",
                filename: "college_logo.png",
                data: b"\x89PNG college".to_vec(),
            }]
        );
    }

    #[tokio::test]
    async fn logos_keep_their_order() {
        let dir = scratch_dir("both");
        std::fs::write(dir.join("nexus_logo.png"), b"nexus").unwrap();
        std::fs::write(dir.join("college_logo.png"), b"college").unwrap();

        let logos = load_inline_logos(Some(&dir)).await;
        std::fs::remove_dir_all(&dir).unwrap();

        let ids: Vec<_> = logos.iter().map(|logo| logo.content_id).collect();
        assert_eq!(ids, ["college_logo", "nexus_logo"]);
    }

    #[tokio::test]
    async fn missing_directory_is_skipped() {
        let dir = std::env::temp_dir().join("certificate-mailer-no-such-logo-dir");
        assert!(load_inline_logos(Some(&dir)).await.is_empty());
    }
}
