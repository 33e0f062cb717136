/// Error types shared by the guideline tools.
///
/// These cover infrastructure that more than one binary touches (configuration read from the
/// environment). Application-specific errors are defined in each crate and wrap `CommonError`
/// via `#[from]`.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}
