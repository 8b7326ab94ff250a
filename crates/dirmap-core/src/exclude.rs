/// Path exclusion rules.
///
/// A rule is a regular expression that must match the *whole* path. Rule
/// sets are ordered and the first enabled match wins. The scanner holds its
/// own set; there is no process-wide rule list.
use crate::error::Result;
use regex::Regex;
use serde::Deserialize;

/// Rule as written in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExcludeRuleConfig {
    pub pattern: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl ExcludeRuleConfig {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExcludeRule {
    pattern: String,
    regex: Regex,
    pub enabled: bool,
}

impl ExcludeRule {
    /// Compile a rule. The pattern is anchored at both ends.
    pub fn new(pattern: &str, enabled: bool) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            enabled,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Full-string match. Disabled rules never match.
    pub fn matches(&self, text: &str) -> bool {
        self.enabled && self.regex.is_match(text)
    }
}

/// Ordered rule list.
#[derive(Debug, Clone, Default)]
pub struct ExcludeRules {
    rules: Vec<ExcludeRule>,
}

impl ExcludeRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile every configured rule, failing on the first bad pattern.
    pub fn from_config(config: &[ExcludeRuleConfig]) -> Result<Self> {
        let rules = config
            .iter()
            .map(|c| ExcludeRule::new(&c.pattern, c.enabled))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn add(&mut self, rule: ExcludeRule) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExcludeRule> {
        self.rules.iter()
    }

    pub fn matches(&self, text: &str) -> bool {
        self.matching_rule(text).is_some()
    }

    /// The first rule that matches `text`, for diagnostics.
    pub fn matching_rule(&self, text: &str) -> Option<&ExcludeRule> {
        self.rules.iter().find(|r| r.matches(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoreError;

    #[test]
    fn match_is_anchored_to_the_whole_path() {
        let rule = ExcludeRule::new("/root/a", true).unwrap();
        assert!(rule.matches("/root/a"));
        assert!(!rule.matches("/root/ab"));
        assert!(!rule.matches("/x/root/a"));

        let explicit = ExcludeRule::new("^/root/a$", true).unwrap();
        assert!(explicit.matches("/root/a"));
    }

    #[test]
    fn alternation_is_anchored_as_a_group() {
        let rule = ExcludeRule::new(".*/target|.*/node_modules", true).unwrap();
        assert!(rule.matches("/src/proj/target"));
        assert!(rule.matches("/web/node_modules"));
        assert!(!rule.matches("/src/proj/target/debug"));
    }

    #[test]
    fn disabled_rules_never_match() {
        let rule = ExcludeRule::new(".*", false).unwrap();
        assert!(!rule.matches("/anything"));
    }

    #[test]
    fn first_match_wins() {
        let mut rules = ExcludeRules::new();
        rules.add(ExcludeRule::new("/tmp/.*", true).unwrap());
        rules.add(ExcludeRule::new(".*", true).unwrap());
        assert_eq!(rules.matching_rule("/tmp/x").map(|r| r.pattern()), Some("/tmp/.*"));
        assert_eq!(rules.matching_rule("/home").map(|r| r.pattern()), Some(".*"));
        assert!(ExcludeRules::new().matching_rule("/home").is_none());
    }

    #[test]
    fn bad_pattern_is_reported() {
        let config = vec![ExcludeRuleConfig::new("/ok"), ExcludeRuleConfig::new("(unclosed")];
        let err = ExcludeRules::from_config(&config).unwrap_err();
        assert!(matches!(err, CoreError::InvalidExcludePattern(_)));
    }

    #[test]
    fn config_defaults_to_enabled() {
        let parsed: Vec<ExcludeRuleConfig> =
            serde_json::from_str(r#"[{"pattern":"/proc"},{"pattern":"/sys","enabled":false}]"#).unwrap();
        assert!(parsed[0].enabled);
        assert!(!parsed[1].enabled);

        let rules = ExcludeRules::from_config(&parsed).unwrap();
        assert!(rules.matches("/proc"));
        assert!(!rules.matches("/sys"));
    }
}
