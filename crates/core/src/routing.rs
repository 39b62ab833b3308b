use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::priority::Priority;
use crate::types::{OrgId, PolicyId, RoutingRuleId, TeamId};

/// A leaf condition comparing one alert field against a value.
///
/// `field` and `op` are free-form strings on purpose: an unrecognised
/// selector or operator makes the routing engine skip the rule (logged),
/// never fail the pipeline or the deserialization of the rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MatchCondition {
    /// Field selector: `priority`, `source`, `tags`, or `message`.
    pub field: String,
    /// Operator: `equals`, `not_equals`, `contains`, `not_contains`,
    /// `matches`, or `exists`.
    pub op: String,
    /// Comparison value; absent for `exists`.
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub value: Option<serde_json::Value>,
}

/// A boolean expression tree over alert fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Every sub-condition must hold.
    All(Vec<Condition>),
    /// At least one sub-condition must hold.
    Any(Vec<Condition>),
    /// The sub-condition must not hold.
    Not(Box<Condition>),
    /// A leaf comparison.
    Match(MatchCondition),
}

impl Condition {
    /// Leaf shorthand.
    #[must_use]
    pub fn field(
        field: impl Into<String>,
        op: impl Into<String>,
        value: Option<serde_json::Value>,
    ) -> Self {
        Self::Match(MatchCondition {
            field: field.into(),
            op: op.into(),
            value,
        })
    }
}

/// One action a routing rule applies when its condition matches.
///
/// `assign_team`, `set_policy`, and `suppress` are terminal: evaluation
/// stops after the rule fires. `add_tags` and `set_priority` mutate the
/// candidate alert and evaluation continues with the mutated alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteAction {
    AssignTeam { team_id: TeamId },
    SetPriority { priority: Priority },
    SetPolicy { policy_id: PolicyId },
    AddTags { tags: BTreeSet<String> },
    Suppress,
}

impl RouteAction {
    /// Whether this action stops rule evaluation.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::AssignTeam { .. } | Self::SetPolicy { .. } | Self::Suppress
        )
    }
}

/// An ordered, tenant-scoped ingestion routing rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RoutingRule {
    pub id: RoutingRuleId,
    pub organization_id: OrgId,
    pub name: String,
    /// Evaluation order; lower values run first.
    pub priority: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub condition: Condition,
    pub actions: Vec<RouteAction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl RoutingRule {
    /// Create an enabled rule.
    #[must_use]
    pub fn new(
        organization_id: OrgId,
        name: impl Into<String>,
        priority: i64,
        condition: Condition,
        actions: Vec<RouteAction>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RoutingRuleId::generate(),
            organization_id,
            name: name.into(),
            priority,
            enabled: true,
            condition,
            actions,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether any action in the set is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.actions.iter().any(RouteAction::is_terminal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_serde_shape() {
        let cond = Condition::All(vec![
            Condition::field("source", "equals", Some(serde_json::json!("prometheus"))),
            Condition::Not(Box::new(Condition::field("tags", "contains", Some(serde_json::json!("noisy"))))),
        ]);
        let json = serde_json::to_value(&cond).unwrap();
        assert!(json.get("all").is_some());
        let back: Condition = serde_json::from_value(json).unwrap();
        assert!(matches!(back, Condition::All(v) if v.len() == 2));
    }

    #[test]
    fn unknown_operator_still_deserializes() {
        let json = serde_json::json!({
            "match": {"field": "fingerprint", "op": "sounds_like", "value": "x"}
        });
        let cond: Condition = serde_json::from_value(json).unwrap();
        match cond {
            Condition::Match(m) => assert_eq!(m.op, "sounds_like"),
            _ => panic!("expected leaf"),
        }
    }

    #[test]
    fn terminal_actions() {
        assert!(RouteAction::Suppress.is_terminal());
        assert!(
            RouteAction::AssignTeam {
                team_id: TeamId::generate()
            }
            .is_terminal()
        );
        assert!(
            !RouteAction::SetPriority {
                priority: Priority::P1
            }
            .is_terminal()
        );
        assert!(
            !RouteAction::AddTags {
                tags: BTreeSet::new()
            }
            .is_terminal()
        );
    }

    #[test]
    fn rule_terminal_when_any_action_is() {
        let rule = RoutingRule::new(
            OrgId::generate(),
            "route-db",
            10,
            Condition::field("source", "equals", Some(serde_json::json!("grafana"))),
            vec![
                RouteAction::AddTags {
                    tags: BTreeSet::from(["db".to_owned()]),
                },
                RouteAction::AssignTeam {
                    team_id: TeamId::generate(),
                },
            ],
            Utc::now(),
        );
        assert!(rule.is_terminal());
        assert!(rule.enabled);
    }

    #[test]
    fn action_serde_tagged() {
        let action = RouteAction::SetPriority {
            priority: Priority::P1,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "set_priority");
        assert_eq!(json["priority"], "P1");
    }
}
