//! Composite resource identifiers.
//!
//! Resource identity must be re-derivable from config fields (stack ID plus
//! job name, region plus token ID, …) so import and refresh can reconstruct
//! equivalent state. A [`ResourceId`] names the fields and joins them with a
//! separator; `split` reverses `make` exactly.

use crate::error::ProviderError;

/// The canonical separator for composite IDs.
pub const ID_SEPARATOR: char = ':';

/// A composite resource ID made of named fields joined by a separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    resource_name: &'static str,
    fields: &'static [&'static str],
    /// Separator accepted on split in addition to the canonical one, for IDs
    /// written by older releases (e.g. `region/tokenId`).
    legacy_separator: Option<char>,
}

impl ResourceId {
    /// Create a resource ID definition for the given resource type and fields.
    pub const fn new(resource_name: &'static str, fields: &'static [&'static str]) -> Self {
        Self {
            resource_name,
            fields,
            legacy_separator: None,
        }
    }

    /// Accept an additional separator when splitting imported IDs.
    pub const fn with_legacy_separator(mut self, separator: char) -> Self {
        self.legacy_separator = Some(separator);
        self
    }

    /// The resource type this ID belongs to.
    pub fn resource_name(&self) -> &'static str {
        self.resource_name
    }

    /// The names of the ID fields, in order.
    pub fn fields(&self) -> &'static [&'static str] {
        self.fields
    }

    /// Join the given parts into an ID string.
    ///
    /// The number of parts must match the number of declared fields.
    pub fn make(&self, parts: &[&str]) -> String {
        debug_assert_eq!(
            parts.len(),
            self.fields.len(),
            "wrong number of ID parts for {}",
            self.resource_name
        );
        parts.join(&ID_SEPARATOR.to_string())
    }

    /// Split an ID string into its parts.
    ///
    /// Returns an error when the part count does not match the declared
    /// fields or any part is empty.
    pub fn split(&self, id: &str) -> Result<Vec<String>, ProviderError> {
        let expected = self.fields.len();

        let mut parts = self.split_on(id, ID_SEPARATOR);
        if parts.len() != expected {
            if let Some(legacy) = self.legacy_separator {
                parts = self.split_on(id, legacy);
            }
        }

        if parts.len() != expected || parts.iter().any(|p| p.is_empty()) {
            return Err(ProviderError::InvalidId(format!(
                "\"{}\" for {}: expected the format \"{}\"",
                id,
                self.resource_name,
                self.example_format()
            )));
        }

        Ok(parts)
    }

    fn split_on(&self, id: &str, separator: char) -> Vec<String> {
        // splitn keeps separators inside the last field intact
        id.splitn(self.fields.len(), separator)
            .map(|s| s.to_string())
            .collect()
    }

    fn example_format(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("{{{}}}", f))
            .collect::<Vec<_>>()
            .join(&ID_SEPARATOR.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOB_ID: ResourceId = ResourceId::new(
        "grafana_cloud_provider_aws_cloudwatch_scrape_job",
        &["stack_id", "job_name"],
    );

    const TOKEN_ID: ResourceId =
        ResourceId::new("grafana_cloud_access_policy_token", &["region", "token_id"])
            .with_legacy_separator('/');

    #[test]
    fn test_make_and_split_round_trip() {
        let id = JOB_ID.make(&["123456", "my-job"]);
        assert_eq!(id, "123456:my-job");

        let parts = JOB_ID.split(&id).unwrap();
        assert_eq!(parts, vec!["123456", "my-job"]);
    }

    #[test]
    fn test_split_rejects_wrong_shape() {
        assert!(JOB_ID.split("only-one-part").is_err());
        assert!(JOB_ID.split("").is_err());
        assert!(JOB_ID.split(":missing-first").is_err());
        assert!(JOB_ID.split("missing-second:").is_err());
    }

    #[test]
    fn test_split_error_names_expected_format() {
        let err = JOB_ID.split("bogus").unwrap_err();
        assert!(err.to_string().contains("{stack_id}:{job_name}"));
    }

    #[test]
    fn test_last_field_may_contain_separator() {
        // splitn semantics: everything after the first separator belongs to
        // the last field
        let parts = JOB_ID.split("stack:job:with:colons").unwrap();
        assert_eq!(parts, vec!["stack", "job:with:colons"]);
    }

    #[test]
    fn test_legacy_separator_accepted_on_split() {
        let parts = TOKEN_ID.split("eu/token-abc").unwrap();
        assert_eq!(parts, vec!["eu", "token-abc"]);

        // Canonical form still wins
        let parts = TOKEN_ID.split("eu:token-abc").unwrap();
        assert_eq!(parts, vec!["eu", "token-abc"]);

        // make always produces the canonical form
        assert_eq!(TOKEN_ID.make(&["eu", "token-abc"]), "eu:token-abc");
    }
}
