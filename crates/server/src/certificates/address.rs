//! Recipient address resolution.

use lettre::Address;

use crate::config::CertificateConfig;
use crate::entity::email_configuration;
use crate::error::ResolutionError;

/// Map a validated identity to the address its certificate is sent to.
///
/// Default mode strips the hyphens from the student id and appends the
/// configured domain (`2000-1-0123` -> `200010123@<domain>`). Testing mode
/// ignores the identity and always returns the configured test address, so a
/// rehearsal can never reach a real student.
pub fn resolve_address(
    identity: &str,
    settings: &email_configuration::Model,
    certificates: &CertificateConfig,
) -> Result<Address, ResolutionError> {
    if certificates.testing_mode {
        let test_address = certificates
            .test_address
            .as_deref()
            .ok_or(ResolutionError::MissingTestAddress)?;
        return test_address
            .parse()
            .map_err(|e| ResolutionError::InvalidAddress {
                identity: identity.to_string(),
                reason: format!("test address '{test_address}': {e}"),
            });
    }

    let local_part = identity.replace('-', "");
    Address::new(local_part, &settings.email_domain).map_err(|e| {
        ResolutionError::InvalidAddress {
            identity: identity.to_string(),
            reason: e.to_string(),
        }
    })
}
