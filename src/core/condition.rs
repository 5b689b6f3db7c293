use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    #[serde(alias = "<")]
    Lt,
    #[serde(alias = "<=")]
    Lte,
    #[serde(alias = ">")]
    Gt,
    #[serde(alias = ">=")]
    Gte,
    #[serde(alias = "==")]
    Eq,
    #[serde(alias = "!=")]
    Ne,
}

impl Comparison {
    pub fn evaluate(self, age_days: i64, threshold: i64) -> bool {
        match self {
            Self::Lt => age_days < threshold,
            Self::Lte => age_days <= threshold,
            Self::Gt => age_days > threshold,
            Self::Gte => age_days >= threshold,
            Self::Eq => age_days == threshold,
            Self::Ne => age_days != threshold,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }
}

/// 以索引年齡 (天) 為條件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub operator: Comparison,
    pub days: i64,
}

impl Condition {
    pub fn new(operator: Comparison, days: i64) -> Self {
        Self { operator, days }
    }

    pub fn matches(&self, age_days: i64) -> bool {
        self.operator.evaluate(age_days, self.days)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "age {} {}d", self.operator.symbol(), self.days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operators() {
        assert!(Comparison::Lt.evaluate(3, 4));
        assert!(!Comparison::Lt.evaluate(4, 4));
        assert!(Comparison::Lte.evaluate(4, 4));
        assert!(Comparison::Gt.evaluate(31, 30));
        assert!(!Comparison::Gt.evaluate(30, 30));
        assert!(Comparison::Gte.evaluate(30, 30));
        assert!(Comparison::Eq.evaluate(7, 7));
        assert!(!Comparison::Eq.evaluate(8, 7));
        assert!(Comparison::Ne.evaluate(8, 7));
    }

    #[test]
    fn test_negative_age_for_future_indices() {
        let condition = Condition::new(Comparison::Gte, 0);
        assert!(!condition.matches(-1));
        assert!(condition.matches(0));
    }

    #[test]
    fn test_deserialize_names_and_symbols() {
        let named: Condition = serde_json::from_str(r#"{"operator": "gte", "days": 7}"#).unwrap();
        let symbol: Condition = serde_json::from_str(r#"{"operator": ">=", "days": 7}"#).unwrap();
        assert_eq!(named, symbol);
        assert_eq!(named.to_string(), "age >= 7d");

        let not_equal: Condition = serde_json::from_str(r#"{"operator": "!=", "days": 1}"#).unwrap();
        assert_eq!(not_equal.operator, Comparison::Ne);

        assert!(serde_json::from_str::<Condition>(r#"{"operator": "~", "days": 1}"#).is_err());
    }
}
