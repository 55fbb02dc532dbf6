use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutopassError {
    #[error("Error: Missing option: {0}")]
    MissingOption(String),
    #[error("Error: Invalid value for option {0}: {1}")]
    InvalidOption(String, String),
    #[error("Error: No key '{}' found for this entry", .0.join("+"))]
    KeyMissing(Vec<String>),
    #[error("Error: No OTP secret found for this entry")]
    OtpSecretMissing,
    #[error("Error: No URL found for this entry")]
    UrlNotFound,
    #[error("Error: This entry has no tan attribute")]
    TanMissing,
    #[error("Error: TAN number {0} is out of range (1-{1})")]
    InvalidTanNumber(usize, usize),
    #[error("Error: {0} is not in the password store")]
    NotInCache(String),
    #[error(
        "Error: URI was not in valid Key Uri Format.\n\
         See https://github.com/google/google-authenticator/wiki/Key-Uri-Format for more information."
    )]
    InvalidKeyUri,
    #[error("Error: Invalid hash function: {0}")]
    InvalidHashFunction(String),
    #[error("Error: Secret was not valid base32")]
    InvalidBase32,
    #[error("Error: Failed parsing entry '{0}': {1}")]
    EntryParse(String, String),
    #[error("Error: Command `{0}` failed with {1}")]
    CommandFailed(String, std::process::ExitStatus),
    #[error("Error: Neither WAYLAND_DISPLAY nor DISPLAY is set")]
    NoDisplay,
    #[error("Error: User aborted")]
    UserAbort,
}
