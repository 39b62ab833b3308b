use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use pulsar_core::{
    Alert, Condition, MatchCondition, PolicyId, Priority, RouteAction, RoutingRule, RoutingRuleId,
    TeamId,
};
use pulsar_store::{RoutingRuleRepo, StoreError};

/// The result of walking the routing rules for one candidate alert.
#[derive(Debug, Clone)]
pub struct RouteOutcome {
    /// The candidate alert, including mutations from non-terminal actions.
    pub alert: Alert,
    /// Team assignment decided by a terminal rule, if any.
    pub team_id: Option<TeamId>,
    /// Escalation policy decided by a terminal rule, if any.
    pub policy_id: Option<PolicyId>,
    /// When set, ingestion drops the alert before persistence.
    pub suppressed: bool,
    /// Rules that fired, in evaluation order.
    pub matched_rules: Vec<RoutingRuleId>,
}

impl RouteOutcome {
    fn pass_through(alert: Alert) -> Self {
        Self {
            alert,
            team_id: None,
            policy_id: None,
            suppressed: false,
            matched_rules: Vec::new(),
        }
    }
}

/// Walk the ordered enabled rules and apply the first match.
///
/// Terminal actions (team assignment, policy assignment, suppress) stop
/// evaluation; non-terminal actions (`add_tags`, `set_priority`) mutate the
/// candidate and evaluation continues against the mutated alert. Rules with
/// unrecognised fields or operators are skipped and logged, never fail the
/// pipeline. The walk is a pure function of `(alert, rules)`.
#[must_use]
pub fn route(alert: Alert, rules: &[RoutingRule]) -> RouteOutcome {
    let mut ordered: Vec<&RoutingRule> = rules.iter().filter(|r| r.enabled).collect();
    ordered.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)));

    let mut outcome = RouteOutcome::pass_through(alert);

    for rule in ordered {
        let matched = match evaluate(&rule.condition, &outcome.alert) {
            Some(m) => m,
            None => {
                warn!(rule_id = %rule.id, rule = %rule.name, "skipping routing rule with unrecognised condition");
                continue;
            }
        };
        if !matched {
            continue;
        }

        debug!(rule_id = %rule.id, rule = %rule.name, "routing rule matched");
        outcome.matched_rules.push(rule.id);

        let mut terminal = false;
        for action in &rule.actions {
            match action {
                RouteAction::AssignTeam { team_id } => {
                    outcome.team_id = Some(*team_id);
                    terminal = true;
                }
                RouteAction::SetPolicy { policy_id } => {
                    outcome.policy_id = Some(*policy_id);
                    terminal = true;
                }
                RouteAction::Suppress => {
                    outcome.suppressed = true;
                    terminal = true;
                }
                RouteAction::SetPriority { priority } => {
                    outcome.alert.priority = *priority;
                }
                RouteAction::AddTags { tags } => {
                    outcome.alert.tags.extend(tags.iter().cloned());
                }
            }
        }
        if terminal {
            break;
        }
    }

    outcome
}

/// Evaluate a condition tree. `None` means the tree references an
/// unrecognised field/operator (or an invalid regex) and the rule must be
/// skipped.
fn evaluate(condition: &Condition, alert: &Alert) -> Option<bool> {
    match condition {
        Condition::All(children) => {
            for child in children {
                if !evaluate(child, alert)? {
                    return Some(false);
                }
            }
            Some(true)
        }
        Condition::Any(children) => {
            for child in children {
                if evaluate(child, alert)? {
                    return Some(true);
                }
            }
            Some(false)
        }
        Condition::Not(inner) => evaluate(inner, alert).map(|b| !b),
        Condition::Match(leaf) => evaluate_leaf(leaf, alert),
    }
}

enum FieldValue<'a> {
    Text(&'a str),
    Tags(&'a BTreeSet<String>),
}

fn field_value<'a>(alert: &'a Alert, field: &str) -> Option<FieldValue<'a>> {
    match field {
        "priority" => Some(FieldValue::Text(alert.priority.as_str())),
        "source" => Some(FieldValue::Text(&alert.source)),
        "message" => Some(FieldValue::Text(&alert.message)),
        "tags" => Some(FieldValue::Tags(&alert.tags)),
        _ => None,
    }
}

fn evaluate_leaf(leaf: &MatchCondition, alert: &Alert) -> Option<bool> {
    let value = field_value(alert, &leaf.field)?;

    if leaf.op == "exists" {
        return Some(match value {
            FieldValue::Text(s) => !s.is_empty(),
            FieldValue::Tags(tags) => !tags.is_empty(),
        });
    }

    // Every other operator needs a comparison value.
    let needle = leaf.value.as_ref()?;

    match value {
        FieldValue::Text(text) => {
            let needle = needle.as_str()?;
            match leaf.op.as_str() {
                "equals" => Some(text_equals(&leaf.field, text, needle)),
                "not_equals" => Some(!text_equals(&leaf.field, text, needle)),
                "contains" => Some(text.contains(needle)),
                "not_contains" => Some(!text.contains(needle)),
                "matches" => compile(needle).map(|re| re.is_match(text)),
                _ => None,
            }
        }
        FieldValue::Tags(tags) => match leaf.op.as_str() {
            "contains" => Some(tags.contains(needle.as_str()?)),
            "not_contains" => Some(!tags.contains(needle.as_str()?)),
            "equals" => {
                let expected: BTreeSet<String> = needle
                    .as_array()?
                    .iter()
                    .map(|v| v.as_str().map(str::to_owned))
                    .collect::<Option<_>>()?;
                Some(*tags == expected)
            }
            "matches" => {
                compile(needle.as_str()?).map(|re| tags.iter().any(|tag| re.is_match(tag)))
            }
            _ => None,
        },
    }
}

/// Priorities compare case-insensitively (`"p1"` matches `P1`); every other
/// text field compares exactly.
fn text_equals(field: &str, actual: &str, expected: &str) -> bool {
    if field == "priority" {
        expected
            .parse::<Priority>()
            .is_ok_and(|p| p.as_str() == actual)
    } else {
        actual == expected
    }
}

fn compile(pattern: &str) -> Option<regex::Regex> {
    match regex::Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(err) => {
            warn!(pattern = %pattern, error = %err, "invalid routing regex");
            None
        }
    }
}

/// Repo-backed wrapper that loads the tenant's enabled rules and routes.
pub struct RoutingEngine {
    rules: Arc<dyn RoutingRuleRepo>,
}

impl RoutingEngine {
    /// Create an engine over the routing rule port.
    #[must_use]
    pub fn new(rules: Arc<dyn RoutingRuleRepo>) -> Self {
        Self { rules }
    }

    /// Load the organization's enabled rules and route the candidate.
    pub async fn route_alert(&self, alert: Alert) -> Result<RouteOutcome, StoreError> {
        let rules = self.rules.list_enabled(alert.organization_id).await?;
        Ok(route(alert, &rules))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pulsar_core::{OrgId, RoutingRule};

    fn alert(source: &str, message: &str, priority: Priority) -> Alert {
        Alert::new(OrgId::generate(), source, message, priority, Utc::now())
    }

    fn rule(priority: i64, condition: Condition, actions: Vec<RouteAction>) -> RoutingRule {
        RoutingRule::new(
            OrgId::generate(),
            format!("rule-{priority}"),
            priority,
            condition,
            actions,
            Utc::now(),
        )
    }

    #[test]
    fn first_matching_terminal_rule_wins() {
        let team_a = TeamId::generate();
        let team_b = TeamId::generate();
        let rules = vec![
            rule(
                10,
                Condition::field("source", "equals", Some(serde_json::json!("prometheus"))),
                vec![RouteAction::AssignTeam { team_id: team_a }],
            ),
            rule(
                20,
                Condition::field("source", "exists", None),
                vec![RouteAction::AssignTeam { team_id: team_b }],
            ),
        ];
        let outcome = route(alert("prometheus", "cpu", Priority::P3), &rules);
        assert_eq!(outcome.team_id, Some(team_a));
        assert_eq!(outcome.matched_rules.len(), 1);
    }

    #[test]
    fn non_terminal_actions_cascade_into_later_rules() {
        let team = TeamId::generate();
        let rules = vec![
            rule(
                10,
                Condition::field("message", "contains", Some(serde_json::json!("disk"))),
                vec![RouteAction::AddTags {
                    tags: BTreeSet::from(["storage".to_owned()]),
                }],
            ),
            // Matches only because the previous rule added the tag.
            rule(
                20,
                Condition::field("tags", "contains", Some(serde_json::json!("storage"))),
                vec![RouteAction::AssignTeam { team_id: team }],
            ),
        ];
        let outcome = route(alert("node", "disk full on db-1", Priority::P3), &rules);
        assert!(outcome.alert.tags.contains("storage"));
        assert_eq!(outcome.team_id, Some(team));
        assert_eq!(outcome.matched_rules.len(), 2);
    }

    #[test]
    fn set_priority_mutates_candidate() {
        let rules = vec![
            rule(
                10,
                Condition::field("source", "equals", Some(serde_json::json!("pingdom"))),
                vec![RouteAction::SetPriority {
                    priority: Priority::P1,
                }],
            ),
            rule(
                20,
                Condition::field("priority", "equals", Some(serde_json::json!("p1"))),
                vec![RouteAction::SetPolicy {
                    policy_id: PolicyId::generate(),
                }],
            ),
        ];
        let outcome = route(alert("pingdom", "site down", Priority::P4), &rules);
        assert_eq!(outcome.alert.priority, Priority::P1);
        assert!(outcome.policy_id.is_some());
    }

    #[test]
    fn suppress_short_circuits() {
        let rules = vec![
            rule(
                5,
                Condition::field("tags", "contains", Some(serde_json::json!("maintenance"))),
                vec![RouteAction::Suppress],
            ),
            rule(
                10,
                Condition::field("source", "exists", None),
                vec![RouteAction::AssignTeam {
                    team_id: TeamId::generate(),
                }],
            ),
        ];
        let mut candidate = alert("node", "reboot", Priority::P5);
        candidate.tags.insert("maintenance".into());
        let outcome = route(candidate, &rules);
        assert!(outcome.suppressed);
        assert!(outcome.team_id.is_none());
    }

    #[test]
    fn unknown_operator_skips_rule_not_pipeline() {
        let team = TeamId::generate();
        let rules = vec![
            rule(
                10,
                Condition::field("message", "sounds_like", Some(serde_json::json!("x"))),
                vec![RouteAction::Suppress],
            ),
            rule(
                20,
                Condition::field("source", "equals", Some(serde_json::json!("node"))),
                vec![RouteAction::AssignTeam { team_id: team }],
            ),
        ];
        let outcome = route(alert("node", "hello", Priority::P3), &rules);
        assert!(!outcome.suppressed);
        assert_eq!(outcome.team_id, Some(team));
    }

    #[test]
    fn unknown_field_skips_rule() {
        let rules = vec![rule(
            10,
            Condition::field("fingerprint", "equals", Some(serde_json::json!("x"))),
            vec![RouteAction::Suppress],
        )];
        let outcome = route(alert("node", "hello", Priority::P3), &rules);
        assert!(!outcome.suppressed);
        assert!(outcome.matched_rules.is_empty());
    }

    #[test]
    fn invalid_regex_skips_rule() {
        let rules = vec![rule(
            10,
            Condition::field("message", "matches", Some(serde_json::json!("([unclosed"))),
            vec![RouteAction::Suppress],
        )];
        let outcome = route(alert("node", "hello", Priority::P3), &rules);
        assert!(!outcome.suppressed);
    }

    #[test]
    fn regex_matches_message() {
        let rules = vec![rule(
            10,
            Condition::field(
                "message",
                "matches",
                Some(serde_json::json!(r"db-\d+ unreachable")),
            ),
            vec![RouteAction::SetPriority {
                priority: Priority::P2,
            }],
        )];
        let outcome = route(alert("node", "db-17 unreachable", Priority::P4), &rules);
        assert_eq!(outcome.alert.priority, Priority::P2);
    }

    #[test]
    fn boolean_combinators() {
        let cond = Condition::All(vec![
            Condition::field("source", "equals", Some(serde_json::json!("prometheus"))),
            Condition::Any(vec![
                Condition::field("priority", "equals", Some(serde_json::json!("P1"))),
                Condition::field("priority", "equals", Some(serde_json::json!("P2"))),
            ]),
            Condition::Not(Box::new(Condition::field(
                "tags",
                "contains",
                Some(serde_json::json!("ignored")),
            ))),
        ]);
        let rules = vec![rule(10, cond, vec![RouteAction::Suppress])];

        let hit = alert("prometheus", "x", Priority::P2);
        assert!(route(hit, &rules).suppressed);

        let wrong_priority = alert("prometheus", "x", Priority::P4);
        assert!(!route(wrong_priority, &rules).suppressed);

        let mut tagged = alert("prometheus", "x", Priority::P1);
        tagged.tags.insert("ignored".into());
        assert!(!route(tagged, &rules).suppressed);
    }

    #[test]
    fn disabled_rules_are_ignored() {
        let mut r = rule(
            10,
            Condition::field("source", "exists", None),
            vec![RouteAction::Suppress],
        );
        r.enabled = false;
        let outcome = route(alert("node", "x", Priority::P3), &[r]);
        assert!(!outcome.suppressed);
    }

    #[test]
    fn routing_is_deterministic() {
        let rules = vec![
            rule(
                10,
                Condition::field("message", "contains", Some(serde_json::json!("cpu"))),
                vec![RouteAction::AddTags {
                    tags: BTreeSet::from(["compute".to_owned()]),
                }],
            ),
            rule(
                20,
                Condition::field("tags", "contains", Some(serde_json::json!("compute"))),
                vec![RouteAction::AssignTeam {
                    team_id: TeamId::generate(),
                }],
            ),
        ];
        let candidate = alert("node", "cpu hot", Priority::P3);
        let first = route(candidate.clone(), &rules);
        let second = route(candidate, &rules);
        assert_eq!(first.team_id, second.team_id);
        assert_eq!(first.suppressed, second.suppressed);
        assert_eq!(first.matched_rules, second.matched_rules);
        assert_eq!(first.alert.tags, second.alert.tags);
    }

    #[tokio::test]
    async fn engine_loads_rules_from_repo() {
        use pulsar_store::RoutingRuleRepo as _;
        let store = std::sync::Arc::new(pulsar_store_memory::MemoryStore::new());
        let org = OrgId::generate();
        let team = TeamId::generate();
        let mut r = rule(
            10,
            Condition::field("source", "equals", Some(serde_json::json!("grafana"))),
            vec![RouteAction::AssignTeam { team_id: team }],
        );
        r.organization_id = org;
        store.create(r).await.unwrap();

        let engine = RoutingEngine::new(store);
        let mut candidate = alert("grafana", "latency", Priority::P3);
        candidate.organization_id = org;
        let outcome = engine.route_alert(candidate).await.unwrap();
        assert_eq!(outcome.team_id, Some(team));
    }
}
