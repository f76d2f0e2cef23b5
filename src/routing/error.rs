use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("Override '{pattern}' matched {artifact} but compiler profile {profile_id} is not registered")]
    UnknownProfile {
        pattern: String,
        profile_id: String,
        artifact: String,
    },
}

#[derive(Debug, Error)]
#[error("Invalid pattern '{pattern}': {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: String,
}
