use crate::utils::error::{LifecycleError, Result};
use chrono::NaiveDate;
use regex::Regex;

/// Logstash 風格的預設：`logs-2024.01.31`
pub const DEFAULT_DATE_PATTERN: &str = r"(\d{4}\.\d{2}\.\d{2})";
pub const DEFAULT_DATE_FORMAT: &str = "%Y.%m.%d";

const DAY_SPECIFIERS: &[&str] = &["%d", "%-d", "%e", "%j", "%F", "%D", "%x"];
const MONTH_SPECIFIERS: &[&str] = &["%m", "%-m", "%b", "%B", "%h", "%j", "%F", "%D", "%x"];
const WEEKDAY_SPECIFIERS: &[&str] = &["%u", "%w", "%a", "%A"];

/// 從索引名稱取出日期
#[derive(Debug, Clone)]
pub struct DateExtractor {
    pattern: Regex,
    format: String,
}

impl DateExtractor {
    pub fn new(pattern: Regex, format: impl Into<String>) -> Self {
        Self {
            pattern,
            format: format.into(),
        }
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    /// 名稱中沒有日期時回傳 `Ok(None)`；有日期但格式不符時回傳錯誤
    pub fn extract(&self, index: &str) -> Result<Option<NaiveDate>> {
        let Some(caps) = self.pattern.captures(index) else {
            return Ok(None);
        };
        let Some(matched) = caps.name("date").or_else(|| caps.get(1)) else {
            return Ok(None);
        };

        parse_date(matched.as_str(), &self.format)
            .map(Some)
            .map_err(|reason| LifecycleError::DateParseError {
                index: index.to_string(),
                value: matched.as_str().to_string(),
                reason,
            })
    }
}

/// 週、月或年粒度的格式補上缺少的欄位，落在期間的第一天
fn parse_date(value: &str, format: &str) -> std::result::Result<NaiveDate, String> {
    let has = |specs: &[&str]| specs.iter().any(|s| format.contains(s));

    let mut value = value.to_string();
    let mut format = format.to_string();
    if has(&["%U", "%W", "%V"]) {
        // %U 的週從星期日開始，%W 與 ISO 週從星期一開始
        if !has(WEEKDAY_SPECIFIERS) {
            if format.contains("%U") {
                value.push_str("|0");
                format.push_str("|%w");
            } else {
                value.push_str("|1");
                format.push_str("|%u");
            }
        }
        return NaiveDate::parse_from_str(&value, &format).map_err(|e| e.to_string());
    }

    if !has(MONTH_SPECIFIERS) {
        value.push_str("|01");
        format.push_str("|%m");
    }
    if !has(DAY_SPECIFIERS) {
        value.push_str("|01");
        format.push_str("|%d");
    }

    NaiveDate::parse_from_str(&value, &format).map_err(|e| e.to_string())
}

pub fn age_in_days(date: NaiveDate, today: NaiveDate) -> i64 {
    (today - date).num_days()
}
