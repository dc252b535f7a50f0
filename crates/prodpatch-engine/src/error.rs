use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("package '{package}' is not configured")]
    UnknownPackage { package: String },
}
