//! The annotation resource.
//!
//! Annotations are keyed by a numeric ID assigned on creation. Times are
//! RFC 3339 strings in configuration and state, and epoch milliseconds on
//! the wire.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::Annotation;
use crate::context::ProviderContext;
use crate::error::ProviderError;
use crate::provider::ResourceHandler;
use crate::schema::{
    Attribute, AttributeFlags, AttributeType, Schema, ValueValidator,
};

/// State model of an annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnnotationModel {
    /// The numeric annotation ID, as a string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The annotation text.
    pub text: String,
    /// UID of the dashboard the annotation is attached to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard_uid: Option<String>,
    /// ID of the panel the annotation is attached to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panel_id: Option<i64>,
    /// RFC 3339 start time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// RFC 3339 end time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<String>,
    /// Annotation tags.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Convert the state model to the API payload.
pub fn to_client_model(model: &AnnotationModel) -> Result<Annotation, ProviderError> {
    Ok(Annotation {
        id: None,
        dashboard_uid: model.dashboard_uid.clone(),
        panel_id: model.panel_id,
        time: model.time.as_deref().map(rfc3339_to_epoch_ms).transpose()?,
        time_end: model
            .time_end
            .as_deref()
            .map(rfc3339_to_epoch_ms)
            .transpose()?,
        tags: model.tags.clone(),
        text: model.text.clone(),
    })
}

/// Convert the API payload to the state model.
pub fn to_state_model(annotation: &Annotation) -> AnnotationModel {
    AnnotationModel {
        id: annotation.id.map(|id| id.to_string()),
        text: annotation.text.clone(),
        dashboard_uid: annotation.dashboard_uid.clone(),
        panel_id: annotation.panel_id,
        time: annotation.time.map(epoch_ms_to_rfc3339),
        time_end: annotation.time_end.map(epoch_ms_to_rfc3339),
        tags: annotation.tags.clone(),
    }
}

fn rfc3339_to_epoch_ms(value: &str) -> Result<i64, ProviderError> {
    let parsed = DateTime::parse_from_rfc3339(value)
        .map_err(|e| ProviderError::Validation(format!("invalid RFC 3339 time \"{}\": {}", value, e)))?;
    Ok(parsed.timestamp_millis())
}

fn epoch_ms_to_rfc3339(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

fn parse_id(model: &AnnotationModel) -> Result<i64, ProviderError> {
    let id = model
        .id
        .as_deref()
        .ok_or_else(|| ProviderError::InvalidId("annotation has no ID in state".to_string()))?;
    id.parse()
        .map_err(|_| ProviderError::InvalidId(format!("\"{}\": annotation IDs are numeric", id)))
}

/// The annotation resource.
pub struct AnnotationResource;

#[async_trait::async_trait]
impl ResourceHandler for AnnotationResource {
    fn type_name(&self) -> &'static str {
        "grafana_annotation"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "text",
                Attribute::required_string().with_description("The text to associate with the annotation."),
            )
            .with_attribute(
                "dashboard_uid",
                Attribute::optional_string()
                    .with_description("The UID of the dashboard on which to create the annotation."),
            )
            .with_attribute(
                "panel_id",
                Attribute::optional_int64()
                    .with_description("The ID of the dashboard panel on which to create the annotation."),
            )
            .with_attribute(
                "time",
                Attribute::optional_string()
                    .with_description("The RFC 3339-formatted time string indicating the annotation's time.")
                    .with_validator(ValueValidator::Rfc3339Timestamp),
            )
            .with_attribute(
                "time_end",
                Attribute::optional_string()
                    .with_description("The RFC 3339-formatted time string indicating the annotation's end time.")
                    .with_validator(ValueValidator::Rfc3339Timestamp),
            )
            .with_attribute(
                "tags",
                Attribute::new(
                    AttributeType::list(AttributeType::String),
                    AttributeFlags::optional(),
                )
                .with_description("The tags to associate with the annotation."),
            )
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let model: AnnotationModel = serde_json::from_value(planned)?;
        let client = ctx.grafana()?;
        let id = client.create_annotation(&to_client_model(&model)?).await?;

        let mut created = client.annotation(id).await?;
        created.id = Some(id);
        Ok(serde_json::to_value(to_state_model(&created))?)
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let model: AnnotationModel = serde_json::from_value(state)?;
        let id = parse_id(&model)?;
        let mut annotation = ctx.grafana()?.annotation(id).await?;
        annotation.id = Some(id);
        Ok(Some(serde_json::to_value(to_state_model(&annotation))?))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior_model: AnnotationModel = serde_json::from_value(prior)?;
        let id = parse_id(&prior_model)?;
        let planned_model: AnnotationModel = serde_json::from_value(planned)?;

        let client = ctx.grafana()?;
        client
            .update_annotation(id, &to_client_model(&planned_model)?)
            .await?;

        let mut updated = client.annotation(id).await?;
        updated.id = Some(id);
        Ok(serde_json::to_value(to_state_model(&updated))?)
    }

    async fn delete(&self, ctx: &ProviderContext, state: Value) -> Result<(), ProviderError> {
        let model: AnnotationModel = serde_json::from_value(state)?;
        ctx.grafana()?.delete_annotation(parse_id(&model)?).await
    }

    async fn import(&self, ctx: &ProviderContext, id: &str) -> Result<Value, ProviderError> {
        let numeric: i64 = id
            .parse()
            .map_err(|_| ProviderError::InvalidId(format!("\"{}\": annotation IDs are numeric", id)))?;
        let mut annotation = ctx.grafana()?.annotation(numeric).await?;
        annotation.id = Some(numeric);
        Ok(serde_json::to_value(to_state_model(&annotation))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_round_trip() {
        let model = AnnotationModel {
            id: None,
            text: "deploy v42".to_string(),
            dashboard_uid: Some("dash-1".to_string()),
            panel_id: Some(3),
            time: Some("2024-03-01T10:00:00.000Z".to_string()),
            time_end: Some("2024-03-01T10:05:00.000Z".to_string()),
            tags: vec!["release".to_string()],
        };

        let client_model = to_client_model(&model).unwrap();
        let restored = to_state_model(&client_model);
        assert_eq!(restored, model);
    }

    #[test]
    fn test_time_conversion() {
        assert_eq!(
            rfc3339_to_epoch_ms("1970-01-01T00:00:01Z").unwrap(),
            1_000
        );
        assert_eq!(epoch_ms_to_rfc3339(1_000), "1970-01-01T00:00:01.000Z");

        // Offsets are normalized to UTC
        let ms = rfc3339_to_epoch_ms("2024-03-01T12:00:00+02:00").unwrap();
        assert_eq!(epoch_ms_to_rfc3339(ms), "2024-03-01T10:00:00.000Z");

        assert!(rfc3339_to_epoch_ms("yesterday").is_err());
    }

    #[test]
    fn test_parse_id() {
        let model = AnnotationModel {
            id: Some("17".to_string()),
            ..Default::default()
        };
        assert_eq!(parse_id(&model).unwrap(), 17);

        let model = AnnotationModel {
            id: Some("abc".to_string()),
            ..Default::default()
        };
        assert!(parse_id(&model).is_err());

        assert!(parse_id(&AnnotationModel::default()).is_err());
    }
}
