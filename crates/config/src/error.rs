use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// An explicitly requested config file doesn't exist.
    #[display("config file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("unsupported config file format: {}", _0.display())]
    Format(#[error(not(source))] PathBuf),
    /// Merging or deserializing the layered sources failed.
    #[display("could not read configuration")]
    Parse,
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
    #[display("no access token configured (set drive.access_token or DRIVEPATH_DRIVE__ACCESS_TOKEN)")]
    MissingToken,
}
