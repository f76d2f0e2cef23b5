use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Import cycle in batch {profile_id}: {}", cycle.join(" -> "))]
    DependencyCycle {
        profile_id: String,
        cycle: Vec<String>,
    },

    #[error("Route for {artifact} names unregistered compiler profile {profile_id}")]
    UnknownProfile {
        artifact: String,
        profile_id: String,
    },
}

pub type Result<T> = std::result::Result<T, PlanError>;
