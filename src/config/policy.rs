use crate::core::age::{DateExtractor, DEFAULT_DATE_FORMAT, DEFAULT_DATE_PATTERN};
use crate::core::condition::Condition;
use crate::domain::model::LifecycleAction;
use crate::utils::error::{LifecycleError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_regex, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub defaults: PolicyDefaults,
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyDefaults {
    pub date_pattern: Option<String>,
    pub date_format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    pub index_pattern: String,
    pub date_pattern: Option<String>,
    pub date_format: Option<String>,
    #[serde(default)]
    pub include_hidden: bool,
    pub actions: Vec<ActionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionConfig {
    Delete {
        when: Condition,
    },
    #[serde(alias = "force_merge")]
    Forcemerge {
        when: Condition,
        max_num_segments: Option<u32>,
        #[serde(default)]
        only_expunge_deletes: bool,
    },
    #[serde(alias = "allocate")]
    Reroute {
        when: Condition,
        attribute: String,
        value: String,
    },
}

impl ActionConfig {
    pub fn when(&self) -> &Condition {
        match self {
            Self::Delete { when }
            | Self::Forcemerge { when, .. }
            | Self::Reroute { when, .. } => when,
        }
    }

    pub fn to_action(&self) -> LifecycleAction {
        match self {
            Self::Delete { .. } => LifecycleAction::Delete,
            Self::Forcemerge {
                max_num_segments,
                only_expunge_deletes,
                ..
            } => LifecycleAction::ForceMerge {
                max_num_segments: *max_num_segments,
                only_expunge_deletes: *only_expunge_deletes,
            },
            Self::Reroute {
                attribute, value, ..
            } => LifecycleAction::Reroute {
                attribute: attribute.clone(),
                value: value.clone(),
            },
        }
    }
}

/// 編譯後的規則：正規表達式已建立
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: String,
    pub index_pattern: Regex,
    pub dates: DateExtractor,
    pub include_hidden: bool,
    pub actions: Vec<ActionConfig>,
}

impl CompiledRule {
    pub fn matches(&self, index: &str) -> bool {
        if index.starts_with('.') && !self.include_hidden {
            return false;
        }
        self.index_pattern.is_match(index)
    }
}

impl Policy {
    /// 從 JSON 檔案載入策略
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(LifecycleError::IoError)?;
        Self::from_json_str(&content)
    }

    /// 從 JSON 字串解析策略
    pub fn from_json_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;
        serde_json::from_str(&processed)
            .map_err(|e| LifecycleError::policy(format!("JSON parsing error: {}", e)))
    }

    /// 替換環境變數 (例如 ${RETENTION_DAYS})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| LifecycleError::config(e.to_string()))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    fn date_pattern_for<'a>(&'a self, rule: &'a RuleConfig) -> &'a str {
        rule.date_pattern
            .as_deref()
            .or(self.defaults.date_pattern.as_deref())
            .unwrap_or(DEFAULT_DATE_PATTERN)
    }

    fn date_format_for<'a>(&'a self, rule: &'a RuleConfig) -> &'a str {
        rule.date_format
            .as_deref()
            .or(self.defaults.date_format.as_deref())
            .unwrap_or(DEFAULT_DATE_FORMAT)
    }

    pub fn compile(&self) -> Result<Vec<CompiledRule>> {
        self.validate()?;
        self.rules
            .iter()
            .map(|rule| {
                let index_pattern = validate_regex(
                    &format!("rules.{}.index_pattern", rule.name),
                    &rule.index_pattern,
                )?;
                let date_pattern = validate_regex(
                    &format!("rules.{}.date_pattern", rule.name),
                    self.date_pattern_for(rule),
                )?;
                Ok(CompiledRule {
                    name: rule.name.clone(),
                    index_pattern,
                    dates: DateExtractor::new(date_pattern, self.date_format_for(rule)),
                    include_hidden: rule.include_hidden,
                    actions: rule.actions.clone(),
                })
            })
            .collect()
    }

    fn validate_rule(&self, rule: &RuleConfig) -> Result<()> {
        validate_non_empty_string("rules.name", &rule.name)?;
        let field = |suffix: &str| format!("rules.{}.{}", rule.name, suffix);

        validate_regex(&field("index_pattern"), &rule.index_pattern)?;
        let date_pattern = validate_regex(&field("date_pattern"), self.date_pattern_for(rule))?;
        if date_pattern.captures_len() < 2 {
            return Err(LifecycleError::InvalidConfigValueError {
                field: field("date_pattern"),
                value: date_pattern.as_str().to_string(),
                reason: "Pattern needs a capture group around the date".to_string(),
            });
        }
        validate_non_empty_string(&field("date_format"), self.date_format_for(rule))?;

        if rule.actions.is_empty() {
            return Err(LifecycleError::policy(format!(
                "rule '{}' has no actions",
                rule.name
            )));
        }

        for action in &rule.actions {
            let when = action.when();
            if when.days < 0 {
                return Err(LifecycleError::InvalidConfigValueError {
                    field: field("actions.when.days"),
                    value: when.days.to_string(),
                    reason: "Days must not be negative".to_string(),
                });
            }
            match action {
                ActionConfig::Reroute {
                    attribute, value, ..
                } => {
                    validate_non_empty_string(&field("actions.attribute"), attribute)?;
                    validate_non_empty_string(&field("actions.value"), value)?;
                }
                ActionConfig::Forcemerge {
                    max_num_segments: Some(0),
                    ..
                } => {
                    return Err(LifecycleError::InvalidConfigValueError {
                        field: field("actions.max_num_segments"),
                        value: "0".to_string(),
                        reason: "Value must be at least 1".to_string(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl Validate for Policy {
    fn validate(&self) -> Result<()> {
        if self.rules.is_empty() {
            return Err(LifecycleError::policy("policy has no rules"));
        }

        let mut names = HashSet::new();
        for rule in &self.rules {
            if !names.insert(rule.name.as_str()) {
                return Err(LifecycleError::policy(format!(
                    "duplicate rule name '{}'",
                    rule.name
                )));
            }
            self.validate_rule(rule)?;
        }
        Ok(())
    }
}
