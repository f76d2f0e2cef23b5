use super::RoutingError;
use crate::registry::ProfileRegistry;
use crate::types::{OverrideRule, ResolvedRoute, SourceArtifact};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Routes keyed by artifact path. Sorted, so iteration order is stable.
pub type RouteTable = BTreeMap<String, ResolvedRoute>;

/// Assigns every artifact exactly one compiler profile.
///
/// Rules are evaluated in declaration order and the **first** matching rule
/// wins, even when a later rule is a narrower match. Artifacts that match no
/// rule fall back to the registry's default profile.
pub struct RoutingResolver<'a> {
    registry: &'a ProfileRegistry,
}

impl<'a> RoutingResolver<'a> {
    pub fn new(registry: &'a ProfileRegistry) -> Self {
        Self { registry }
    }

    pub fn resolve(&self, artifacts: &[SourceArtifact]) -> Result<RouteTable, RoutingError> {
        let default_profile = self.registry.resolve_default_profile();
        let mut routes = RouteTable::new();

        for artifact in artifacts {
            let profile_id = match self.matching_rule(artifact) {
                Some(rule) => {
                    if self.registry.compiler_profile(&rule.profile_id).is_none() {
                        return Err(RoutingError::UnknownProfile {
                            pattern: rule.pattern.to_string(),
                            profile_id: rule.profile_id.clone(),
                            artifact: artifact.path.clone(),
                        });
                    }
                    debug!(
                        "{} routed to {} by override '{}'",
                        artifact.path, rule.profile_id, rule.pattern
                    );
                    rule.profile_id.clone()
                }
                None => default_profile.id.clone(),
            };

            routes.insert(
                artifact.path.clone(),
                ResolvedRoute {
                    artifact: artifact.clone(),
                    profile_id,
                },
            );
        }

        info!(
            "Resolved {} artifacts against {} override rules",
            routes.len(),
            self.registry.override_rules().len()
        );
        Ok(routes)
    }

    /// The first rule, in declaration order, whose pattern matches.
    pub fn matching_rule(&self, artifact: &SourceArtifact) -> Option<&'a OverrideRule> {
        self.registry
            .override_rules()
            .iter()
            .find(|rule| rule.pattern.matches(artifact))
    }
}
