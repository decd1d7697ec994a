//! Student id extraction from certificate file names.

use crate::error::FilenameError;

use super::CertificateFile;

/// Digit group lengths of a student id (`####-#-####`).
const STUDENT_ID_GROUPS: [usize; 3] = [4, 1, 4];

/// Validate a certificate file name and return the recipient identity.
///
/// The name must end in `.pdf` (any case). Outside testing mode the remaining
/// token must be a student id shaped `####-#-####`; in testing mode any
/// non-empty token is accepted.
pub fn validate_certificate_filename(
    filename: &str,
    testing_mode: bool,
) -> Result<String, FilenameError> {
    let identity =
        strip_pdf_extension(filename).ok_or_else(|| FilenameError::NotPdf(filename.to_string()))?;

    if identity.is_empty() {
        return Err(FilenameError::EmptyIdentity(filename.to_string()));
    }
    if !testing_mode && !is_student_id(identity) {
        return Err(FilenameError::InvalidFormat(filename.to_string()));
    }
    Ok(identity.to_string())
}

fn strip_pdf_extension(filename: &str) -> Option<&str> {
    let split = filename.len().checked_sub(".pdf".len())?;
    if !filename.is_char_boundary(split) {
        return None;
    }
    let (stem, extension) = filename.split_at(split);
    extension.eq_ignore_ascii_case(".pdf").then_some(stem)
}

pub fn is_student_id(token: &str) -> bool {
    let groups: Vec<&str> = token.split('-').collect();
    groups.len() == STUDENT_ID_GROUPS.len()
        && groups
            .iter()
            .zip(STUDENT_ID_GROUPS)
            .all(|(group, len)| group.len() == len && group.bytes().all(|b| b.is_ascii_digit()))
}

/// Uploads split into files worth sending and the reasons others were skipped.
#[derive(Debug, Default)]
pub struct UploadScreening {
    pub accepted: Vec<CertificateFile>,
    pub rejected: Vec<String>,
}

/// Drop uploads that can never be sent before a batch is created.
///
/// Order of accepted files is preserved.
pub fn screen_uploads(files: Vec<CertificateFile>, testing_mode: bool) -> UploadScreening {
    let mut screening = UploadScreening::default();
    for file in files {
        match validate_certificate_filename(file.name(), testing_mode) {
            Ok(_) => screening.accepted.push(file),
            Err(FilenameError::NotPdf(name)) => {
                screening.rejected.push(format!("'{name}' is not a PDF file."))
            }
            Err(FilenameError::InvalidFormat(name) | FilenameError::EmptyIdentity(name)) => {
                screening
                    .rejected
                    .push(format!("'{name}' has invalid format. Expected: ####-#-####.pdf"))
            }
        }
    }
    screening
}
