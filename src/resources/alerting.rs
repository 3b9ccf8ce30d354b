//! The alerting notification policy resource.
//!
//! The notification policy tree is a singleton: Grafana has exactly one, so
//! the resource ID is the constant [`POLICY_SINGLETON_ID`] rather than
//! something derived from attributes. Create and Update both replace the
//! whole tree; Delete resets it to the server default instead of deleting a
//! keyed object.
//!
//! The state model is genuinely recursive (a policy node carries child
//! nodes). Only the declared schema caps nesting, at
//! [`POLICY_SCHEMA_DEPTH`], because the host tool cannot express an
//! infinitely recursive schema.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{NotificationPolicyTree, PolicyMatcher, PolicyRoute};
use crate::context::ProviderContext;
use crate::error::ProviderError;
use crate::provider::ResourceHandler;
use crate::schema::{
    Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema, ValueValidator,
};

/// The constant ID of the singleton notification policy resource.
pub const POLICY_SINGLETON_ID: &str = "policy";

/// Maximum nesting depth expressible in the declared schema.
///
/// The state model itself is recursive and unbounded; this only limits what
/// the host tool can describe. Raising it is backwards compatible.
pub const POLICY_SCHEMA_DEPTH: u32 = 4;

/// State model of the notification policy root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPolicyModel {
    /// Always [`POLICY_SINGLETON_ID`] once created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The default contact point for unmatched notifications.
    pub contact_point: String,
    /// Labels to group alerts by.
    #[serde(default)]
    pub group_by: Vec<String>,
    /// Time to buffer alerts of the same group before notifying.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_wait: Option<String>,
    /// Minimum interval between two notifications for the same group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_interval: Option<String>,
    /// Minimum interval before re-sending a notification for a firing alert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_interval: Option<String>,
    /// Routing rules for specific label sets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy: Vec<PolicyNodeModel>,
}

/// State model of one routing rule; recursive through `policy`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyNodeModel {
    /// The contact point for notifications matched by this rule.
    pub contact_point: String,
    /// Labels to group alerts by.
    #[serde(default)]
    pub group_by: Vec<String>,
    /// Label matchers selecting alerts for this rule.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matcher: Vec<MatcherModel>,
    /// Mute timing names applied to matching alerts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mute_timings: Vec<String>,
    /// Whether to keep matching sibling rules after this one matches.
    #[serde(default, rename = "continue")]
    pub continue_matching: bool,
    /// Minimum interval between two notifications for the same group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_interval: Option<String>,
    /// Minimum interval before re-sending a notification for a firing alert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_interval: Option<String>,
    /// Child rules.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy: Vec<PolicyNodeModel>,
}

/// State model of a label matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherModel {
    /// The name of the label to match against.
    pub label: String,
    /// The match operator.
    #[serde(rename = "match")]
    pub match_op: String,
    /// The label value to match against.
    pub value: String,
}

/// Convert the state model to the API tree.
pub fn unpack_policy(model: &NotificationPolicyModel) -> NotificationPolicyTree {
    NotificationPolicyTree {
        receiver: model.contact_point.clone(),
        group_by: model.group_by.clone(),
        group_wait: model.group_wait.clone(),
        group_interval: model.group_interval.clone(),
        repeat_interval: model.repeat_interval.clone(),
        routes: model.policy.iter().map(unpack_node).collect(),
    }
}

fn unpack_node(node: &PolicyNodeModel) -> PolicyRoute {
    PolicyRoute {
        receiver: node.contact_point.clone(),
        group_by: node.group_by.clone(),
        object_matchers: node
            .matcher
            .iter()
            .map(|m| PolicyMatcher {
                label: m.label.clone(),
                op: m.match_op.clone(),
                value: m.value.clone(),
            })
            .collect(),
        mute_time_intervals: node.mute_timings.clone(),
        continue_matching: node.continue_matching,
        group_interval: node.group_interval.clone(),
        repeat_interval: node.repeat_interval.clone(),
        routes: node.policy.iter().map(unpack_node).collect(),
    }
}

/// Convert the API tree to the state model.
pub fn pack_policy(tree: &NotificationPolicyTree) -> NotificationPolicyModel {
    NotificationPolicyModel {
        id: Some(POLICY_SINGLETON_ID.to_string()),
        contact_point: tree.receiver.clone(),
        group_by: tree.group_by.clone(),
        group_wait: tree.group_wait.clone(),
        group_interval: tree.group_interval.clone(),
        repeat_interval: tree.repeat_interval.clone(),
        policy: tree.routes.iter().map(pack_node).collect(),
    }
}

fn pack_node(route: &PolicyRoute) -> PolicyNodeModel {
    PolicyNodeModel {
        contact_point: route.receiver.clone(),
        group_by: route.group_by.clone(),
        matcher: route
            .object_matchers
            .iter()
            .map(|m| MatcherModel {
                label: m.label.clone(),
                match_op: m.op.clone(),
                value: m.value.clone(),
            })
            .collect(),
        mute_timings: route.mute_time_intervals.clone(),
        continue_matching: route.continue_matching,
        group_interval: route.group_interval.clone(),
        repeat_interval: route.repeat_interval.clone(),
        policy: route.routes.iter().map(pack_node).collect(),
    }
}

fn policy_block(depth: u32) -> Block {
    let mut block = Block::new()
        .with_description("Routing rules for specific label sets.")
        .with_attribute(
            "contact_point",
            Attribute::required_string()
                .with_description("The contact point to route notifications that match this rule to."),
        )
        .with_attribute(
            "group_by",
            Attribute::new(
                AttributeType::list(AttributeType::String),
                AttributeFlags::required(),
            )
            .with_description("A list of alert labels to group alerts into notifications by. Use the special label `...` to group alerts by all labels, effectively disabling grouping."),
        )
        .with_block(
            "matcher",
            NestedBlock::list(
                Block::new()
                    .with_attribute(
                        "label",
                        Attribute::required_string()
                            .with_description("The name of the label to match against."),
                    )
                    .with_attribute(
                        "match",
                        Attribute::required_string()
                            .with_description("The operator to apply when matching values of the given label. Allowed operators are `=` for equality, `!=` for negated equality, `=~` for regex equality, and `!~` for negated regex equality.")
                            .with_validator(ValueValidator::OneOf(vec![
                                "=".to_string(),
                                "!=".to_string(),
                                "=~".to_string(),
                                "!~".to_string(),
                            ])),
                    )
                    .with_attribute(
                        "value",
                        Attribute::required_string()
                            .with_description("The label value to match against."),
                    ),
            )
            .with_description("Describes which labels this rule should match. When multiple matchers are supplied, an alert must match ALL matchers to be accepted by this policy."),
        )
        .with_attribute(
            "mute_timings",
            Attribute::new(
                AttributeType::list(AttributeType::String),
                AttributeFlags::optional(),
            )
            .with_description("A list of mute timing names to apply to alerts that match this policy."),
        )
        .with_attribute(
            "continue",
            Attribute::optional_bool()
                .with_description("Whether to continue matching subsequent rules if an alert matches the current rule. Otherwise, the rule will be 'consumed' by the first policy to match it."),
        )
        .with_attribute(
            "group_interval",
            Attribute::optional_string()
                .with_description("Minimum time interval between two notifications for the same group. Default is 5 minutes."),
        )
        .with_attribute(
            "repeat_interval",
            Attribute::optional_string()
                .with_description("Minimum time interval for re-sending a notification if an alert is still firing. Default is 4 hours."),
        );

    if depth > 1 {
        block = block.with_block("policy", NestedBlock::list(policy_block(depth - 1)));
    }
    block
}

/// The singleton notification policy resource.
pub struct NotificationPolicyResource;

#[async_trait::async_trait]
impl ResourceHandler for NotificationPolicyResource {
    fn type_name(&self) -> &'static str {
        "grafana_notification_policy"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "contact_point",
                Attribute::required_string().with_description(
                    "The default contact point to route all unmatched notifications to.",
                ),
            )
            .with_attribute(
                "group_by",
                Attribute::new(
                    AttributeType::list(AttributeType::String),
                    AttributeFlags::required(),
                )
                .with_description("A list of alert labels to group alerts into notifications by. Use the special label `...` to group alerts by all labels, effectively disabling grouping."),
            )
            .with_attribute(
                "group_wait",
                Attribute::optional_string().with_description(
                    "Time to wait to buffer alerts of the same group before sending a notification. Default is 30 seconds.",
                ),
            )
            .with_attribute(
                "group_interval",
                Attribute::optional_string().with_description(
                    "Minimum time interval between two notifications for the same group. Default is 5 minutes.",
                ),
            )
            .with_attribute(
                "repeat_interval",
                Attribute::optional_string().with_description(
                    "Minimum time interval for re-sending a notification if an alert is still firing. Default is 4 hours.",
                ),
            )
            .with_block("policy", NestedBlock::list(policy_block(POLICY_SCHEMA_DEPTH)))
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let model: NotificationPolicyModel = serde_json::from_value(planned)?;
        let client = ctx.grafana()?;
        client
            .set_notification_policy_tree(&unpack_policy(&model))
            .await?;
        let tree = client.notification_policy_tree().await?;
        Ok(serde_json::to_value(pack_policy(&tree))?)
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        _state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let tree = ctx.grafana()?.notification_policy_tree().await?;
        Ok(Some(serde_json::to_value(pack_policy(&tree))?))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        _prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        self.create(ctx, planned).await
    }

    async fn delete(&self, ctx: &ProviderContext, _state: Value) -> Result<(), ProviderError> {
        // The singleton tree cannot be deleted, only reset to the default
        ctx.grafana()?.reset_notification_policy_tree().await
    }

    async fn import(&self, ctx: &ProviderContext, _id: &str) -> Result<Value, ProviderError> {
        let tree = ctx.grafana()?.notification_policy_tree().await?;
        Ok(serde_json::to_value(pack_policy(&tree))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_model() -> NotificationPolicyModel {
        NotificationPolicyModel {
            id: None,
            contact_point: "default".to_string(),
            group_by: vec!["alertname".to_string()],
            group_wait: Some("45s".to_string()),
            group_interval: None,
            repeat_interval: Some("4h".to_string()),
            policy: vec![PolicyNodeModel {
                contact_point: "pager".to_string(),
                group_by: vec![],
                matcher: vec![MatcherModel {
                    label: "severity".to_string(),
                    match_op: "=".to_string(),
                    value: "critical".to_string(),
                }],
                mute_timings: vec!["weekends".to_string()],
                continue_matching: true,
                group_interval: None,
                repeat_interval: None,
                policy: vec![PolicyNodeModel {
                    contact_point: "oncall".to_string(),
                    group_by: vec!["team".to_string()],
                    matcher: vec![],
                    mute_timings: vec![],
                    continue_matching: false,
                    group_interval: Some("10m".to_string()),
                    repeat_interval: None,
                    policy: vec![],
                }],
            }],
        }
    }

    #[test]
    fn test_policy_conversion_round_trip() {
        let model = sample_model();
        let tree = unpack_policy(&model);
        let mut packed = pack_policy(&tree);
        // pack always stamps the singleton ID
        assert_eq!(packed.id.as_deref(), Some(POLICY_SINGLETON_ID));
        packed.id = None;
        assert_eq!(packed, model);
    }

    #[test]
    fn test_unpack_maps_nested_routes() {
        let tree = unpack_policy(&sample_model());
        assert_eq!(tree.receiver, "default");
        assert_eq!(tree.routes.len(), 1);
        assert_eq!(tree.routes[0].object_matchers[0].op, "=");
        assert!(tree.routes[0].continue_matching);
        assert_eq!(tree.routes[0].routes[0].receiver, "oncall");
    }

    #[test]
    fn test_state_model_continue_key() {
        let model: NotificationPolicyModel = serde_json::from_value(json!({
            "contact_point": "default",
            "group_by": ["alertname"],
            "policy": [{
                "contact_point": "pager",
                "group_by": [],
                "continue": true,
            }],
        }))
        .unwrap();
        assert!(model.policy[0].continue_matching);
    }

    #[test]
    fn test_schema_depth_is_capped() {
        let schema = NotificationPolicyResource.schema();
        let mut depth = 0;
        let mut block = &schema.block;
        while let Some(nested) = block.blocks.get("policy") {
            depth += 1;
            block = &nested.block;
        }
        assert_eq!(depth, POLICY_SCHEMA_DEPTH);
    }

    #[test]
    fn test_singleton_scenario_shape() {
        // Creating with no nested policy blocks must produce the singleton
        // state ID
        let model = NotificationPolicyModel {
            id: None,
            contact_point: "default".to_string(),
            group_by: vec!["alertname".to_string()],
            group_wait: None,
            group_interval: None,
            repeat_interval: None,
            policy: vec![],
        };
        let packed = pack_policy(&unpack_policy(&model));
        assert_eq!(packed.id.as_deref(), Some("policy"));
        assert!(packed.policy.is_empty());
    }
}
