//! Message template rendering.
//!
//! Templates use `{{placeholder}}` markers. Known placeholders are replaced
//! from a [`TemplateContext`]; unknown ones are left verbatim so a typo is
//! visible in the rendered message instead of silently disappearing.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::Date;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([a-z_]+)\s*\}\}").expect("valid placeholder regex"));

/// Values available to a notification template.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub client_name: String,
    pub policy_number: Option<String>,
    pub end_date: Option<Date>,
    pub days_left: Option<i32>,
}

impl TemplateContext {
    fn value(&self, key: &str) -> Option<String> {
        match key {
            "client_name" => Some(self.client_name.clone()),
            "policy_number" => self.policy_number.clone(),
            "end_date" => self.end_date.map(|d| d.format("%d.%m.%Y").to_string()),
            "days_left" => self.days_left.map(|d| d.to_string()),
            _ => None,
        }
    }
}

/// Render `template` against `ctx`.
pub fn render(template: &str, ctx: &TemplateContext) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            ctx.value(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
