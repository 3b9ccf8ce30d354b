//! Configuration for the config-generation pipeline.

/// The output format of generated configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Plain JSON configuration.
    Json,
    /// HCL configuration.
    #[default]
    Hcl,
    /// Crossplane manifests.
    Crossplane,
}

impl OutputFormat {
    /// All supported output formats.
    pub const ALL: [OutputFormat; 3] = [Self::Json, Self::Hcl, Self::Crossplane];
}

/// Settings for a generation run.
#[derive(Debug, Clone, Default)]
pub struct GenerateConfig {
    /// Patterns to filter resources by, in the form `type.name` with `*` as
    /// a wildcard. A resource is included when it matches any pattern; an
    /// empty list includes everything.
    pub include_resources: Vec<String>,
    /// Directory to write generated files to.
    pub output_dir: String,
    /// Overwrite existing files in the output directory.
    pub clobber: bool,
    /// Output format.
    pub format: OutputFormat,
    /// Provider version pinned in the generated config.
    pub provider_version: String,
}

impl GenerateConfig {
    /// Whether the given `type.name` address is selected by the include
    /// patterns.
    pub fn includes(&self, address: &str) -> bool {
        self.include_resources.is_empty()
            || self
                .include_resources
                .iter()
                .any(|pattern| matches_pattern(pattern, address))
    }
}

/// Match an address against a pattern where `*` matches any substring.
pub fn matches_pattern(pattern: &str, address: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        return pattern == address;
    }

    let mut remainder = address;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        match remainder.find(segment) {
            // The first segment must anchor at the start, the last at the end
            Some(pos) => {
                if i == 0 && pos != 0 {
                    return false;
                }
                remainder = &remainder[pos + segment.len()..];
            }
            None => return false,
        }
    }
    match segments.last() {
        Some(last) if !pattern.ends_with('*') && !last.is_empty() => address.ends_with(last),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_pattern() {
        assert!(matches_pattern("grafana_dashboard.main", "grafana_dashboard.main"));
        assert!(!matches_pattern("grafana_dashboard.main", "grafana_dashboard.other"));

        assert!(matches_pattern("grafana_dashboard.*", "grafana_dashboard.main"));
        assert!(matches_pattern("*.main", "grafana_dashboard.main"));
        assert!(matches_pattern("grafana_*", "grafana_dashboard.main"));
        assert!(matches_pattern("*", "anything.at.all"));
        assert!(matches_pattern("grafana_*_token.*", "grafana_cloud_access_policy_token.ci"));

        assert!(!matches_pattern("grafana_*_token.*x", "grafana_cloud_access_policy_token.ci"));
        assert!(!matches_pattern("aws_*", "grafana_dashboard.main"));
    }

    #[test]
    fn test_includes_empty_selects_all() {
        let config = GenerateConfig::default();
        assert!(config.includes("grafana_dashboard.main"));

        let config = GenerateConfig {
            include_resources: vec!["grafana_annotation.*".to_string()],
            ..Default::default()
        };
        assert!(config.includes("grafana_annotation.deploy"));
        assert!(!config.includes("grafana_dashboard.main"));
    }
}
