/// Error type used throughout the application.
pub type Err = anyhow::Error;
/// Result with the application-wide error type.
pub type Res<T> = Result<T, Err>;
/// Result carrying no payload.
pub type Void = Res<()>;
