use crate::config::policy::{ActionConfig, CompiledRule, Policy};
use crate::core::age::age_in_days;
use crate::core::poller::Poller;
use crate::core::tasks::wait_for_task;
use crate::domain::model::{IndexInfo, LifecycleAction};
use crate::domain::ports::ClusterApi;
use crate::utils::error::{LifecycleError, Result};
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Default)]
pub struct CuratorOptions {
    pub dry_run: bool,
    pub continue_on_error: bool,
    pub rule_filter: Option<String>,
    pub index_pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoMatchingRule,
    NoDate,
    InvalidDate(String),
    NothingDue { age_days: i64 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatchingRule => write!(f, "no rule matches"),
            Self::NoDate => write!(f, "no date in name"),
            Self::InvalidDate(reason) => write!(f, "{}", reason),
            Self::NothingDue { age_days } => write!(f, "nothing due at {} day(s)", age_days),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedIndex {
    pub index: String,
    pub rule: String,
    pub age_days: i64,
    pub actions: Vec<LifecycleAction>,
}

#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub planned: Vec<PlannedIndex>,
    pub skipped: Vec<(String, SkipReason)>,
}

impl Plan {
    pub fn action_count(&self) -> usize {
        self.planned.iter().map(|p| p.actions.len()).sum()
    }

    pub fn actions_for(&self, index: &str) -> Option<&[LifecycleAction]> {
        self.planned
            .iter()
            .find(|p| p.index == index)
            .map(|p| p.actions.as_slice())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedAction {
    pub index: String,
    pub action: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub evaluated: usize,
    pub skipped: usize,
    pub planned: usize,
    pub executed: usize,
    pub failed: Vec<FailedAction>,
    pub dry_run: bool,
}

impl RunSummary {
    /// 有失敗的動作時轉成 `ActionsFailed`
    pub fn into_result(self) -> Result<Self> {
        if self.failed.is_empty() {
            return Ok(self);
        }
        Err(LifecycleError::ActionsFailed {
            failed: self.failed.len(),
            total: self.planned,
        })
    }
}

/// 依策略對索引執行刪除、force merge 或搬移
pub struct Curator<C: ClusterApi> {
    cluster: C,
    rules: Vec<CompiledRule>,
    poller: Poller,
    options: CuratorOptions,
}

impl<C: ClusterApi> Curator<C> {
    pub fn new(cluster: C, policy: &Policy, poller: Poller, options: CuratorOptions) -> Result<Self> {
        let mut rules = policy.compile()?;
        if let Some(only) = &options.rule_filter {
            rules.retain(|r| &r.name == only);
            if rules.is_empty() {
                return Err(LifecycleError::policy(format!("no rule named '{}'", only)));
            }
        }
        Ok(Self {
            cluster,
            rules,
            poller,
            options,
        })
    }

    pub fn cluster(&self) -> &C {
        &self.cluster
    }

    /// First matching rule wins; a due `delete` replaces every other action.
    pub fn plan(&self, indices: &[IndexInfo], today: NaiveDate) -> Plan {
        let mut plan = Plan::default();

        for index in indices {
            match self.plan_index(index, today) {
                Ok(planned) => plan.planned.push(planned),
                Err(reason) => {
                    tracing::debug!("⏭️ {}: {}", index.name, reason);
                    plan.skipped.push((index.name.clone(), reason));
                }
            }
        }
        plan
    }

    fn plan_index(&self, index: &IndexInfo, today: NaiveDate) -> std::result::Result<PlannedIndex, SkipReason> {
        let rule = self
            .rules
            .iter()
            .find(|r| r.matches(&index.name))
            .ok_or(SkipReason::NoMatchingRule)?;

        let date = match rule.dates.extract(&index.name) {
            Ok(Some(date)) => date,
            Ok(None) => return Err(SkipReason::NoDate),
            Err(e) => {
                tracing::warn!("⚠️ {}", e);
                return Err(SkipReason::InvalidDate(e.to_string()));
            }
        };
        let age_days = age_in_days(date, today);

        let due: Vec<&ActionConfig> = rule
            .actions
            .iter()
            .filter(|a| a.when().matches(age_days))
            .collect();

        let actions = if due.iter().any(|a| matches!(a, ActionConfig::Delete { .. })) {
            vec![LifecycleAction::Delete]
        } else {
            due.into_iter()
                .map(ActionConfig::to_action)
                .filter(|action| self.still_needed(index, action))
                .collect()
        };

        if actions.is_empty() {
            return Err(SkipReason::NothingDue { age_days });
        }

        Ok(PlannedIndex {
            index: index.name.clone(),
            rule: rule.name.clone(),
            age_days,
            actions,
        })
    }

    fn still_needed(&self, index: &IndexInfo, action: &LifecycleAction) -> bool {
        match action {
            LifecycleAction::ForceMerge { .. } if !index.is_open() => {
                tracing::debug!("{} is closed, skipping forcemerge", index.name);
                false
            }
            LifecycleAction::Reroute { attribute, value } => {
                let current = index.setting(&routing_key(attribute));
                if current.as_deref() == Some(value.as_str()) {
                    tracing::debug!("{} already requires {}={}", index.name, attribute, value);
                    false
                } else {
                    true
                }
            }
            _ => true,
        }
    }

    pub async fn run(&self, today: NaiveDate) -> Result<RunSummary> {
        self.run_report(today).await?.into_result()
    }

    /// Same as `run`, but with `continue_on_error` the failed actions are
    /// left in the summary instead of being turned into `ActionsFailed`.
    pub async fn run_report(&self, today: NaiveDate) -> Result<RunSummary> {
        let indices = self
            .cluster
            .list_indices(self.options.index_pattern.as_deref())
            .await?;
        tracing::info!(
            "🔍 Evaluating {} indices against {} rule(s) as of {}",
            indices.len(),
            self.rules.len(),
            today
        );

        let plan = self.plan(&indices, today);
        let mut summary = RunSummary {
            evaluated: indices.len(),
            skipped: plan.skipped.len(),
            planned: plan.action_count(),
            dry_run: self.options.dry_run,
            ..RunSummary::default()
        };

        for planned in &plan.planned {
            for action in &planned.actions {
                if self.options.dry_run {
                    tracing::info!(
                        "📝 [dry-run] {} ({} days, rule {}): {}",
                        planned.index,
                        planned.age_days,
                        planned.rule,
                        action
                    );
                    continue;
                }

                tracing::info!("▶️ {} ({} days): {}", planned.index, planned.age_days, action);
                match self.execute(&planned.index, action).await {
                    Ok(()) => {
                        summary.executed += 1;
                        tracing::info!("✅ {} {}", action.name(), planned.index);
                    }
                    Err(e) => {
                        tracing::error!("❌ {} {} failed: {}", action.name(), planned.index, e);
                        if !self.options.continue_on_error {
                            return Err(e);
                        }
                        summary.failed.push(FailedAction {
                            index: planned.index.clone(),
                            action: action.name().to_string(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        tracing::info!(
            "📊 {} evaluated, {} skipped, {} action(s) planned, {} executed, {} failed",
            summary.evaluated,
            summary.skipped,
            summary.planned,
            summary.executed,
            summary.failed.len()
        );

        Ok(summary)
    }

    async fn execute(&self, index: &str, action: &LifecycleAction) -> Result<()> {
        match action {
            LifecycleAction::Delete => self.cluster.delete_index(index).await,
            LifecycleAction::ForceMerge {
                max_num_segments,
                only_expunge_deletes,
            } => {
                let task = self
                    .cluster
                    .force_merge(index, *max_num_segments, *only_expunge_deletes)
                    .await?;
                if let Some(task_id) = task {
                    tracing::info!("📋 Force merge of {} running as task {}", index, task_id);
                    wait_for_task(&self.cluster, &self.poller, &task_id).await?;
                }
                Ok(())
            }
            LifecycleAction::Reroute { attribute, value } => {
                let mut settings = Map::new();
                settings.insert(routing_key(attribute), Value::String(value.clone()));
                self.cluster
                    .update_settings(index, Value::Object(settings))
                    .await
            }
        }
    }
}

fn routing_key(attribute: &str) -> String {
    format!("index.routing.allocation.require.{}", attribute)
}
