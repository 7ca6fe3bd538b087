//! Slot value validation
//!
//! Values are JSON. Every write is checked against the slot's declared
//! type first and then against its optional [`SlotValidation`] constraints.
//! `null` is never a valid slot value: slots are satisfied by presence, so
//! an explicit null would make a state "complete" with no data in it.

use chrono::{DateTime, NaiveDate};
use coordination_types::{
    CoordinationError, CoordinationResult, Slot, SlotType, SlotValidation,
};
use dashmap::DashMap;
use regex::Regex;
use serde_json::Value;

/// Checks slot values against their slot definitions
#[derive(Debug)]
pub struct SlotValidator {
    max_value_bytes: usize,
    /// Compiled `pattern` constraints, keyed by source
    patterns: DashMap<String, Regex>,
}

impl SlotValidator {
    pub fn new(max_value_bytes: usize) -> Self {
        Self {
            max_value_bytes,
            patterns: DashMap::new(),
        }
    }

    /// Validate `value` for `slot`, failing with `SlotValidationFailed`
    pub fn check(&self, slot: &Slot, value: &Value) -> CoordinationResult<()> {
        self.check_value(slot, value)
            .map_err(|reason| CoordinationError::SlotValidationFailed {
                slot: slot.name.clone(),
                reason,
            })
    }

    fn check_value(&self, slot: &Slot, value: &Value) -> Result<(), String> {
        if value.is_null() {
            return Err("value must not be null".into());
        }

        let size = serde_json::to_vec(value)
            .map_err(|e| format!("value is not serializable: {}", e))?
            .len();
        if size > self.max_value_bytes {
            return Err(format!(
                "value is {} bytes, limit is {}",
                size, self.max_value_bytes
            ));
        }

        let rules = slot.validation.clone().unwrap_or_default();

        match slot.slot_type {
            SlotType::Text | SlotType::Phone => {
                let text = expect_str(value)?;
                self.check_text(text, &rules)
            }
            SlotType::Email => {
                let text = expect_str(value)?;
                let host = email_domain(text)?;
                check_domain(host, &rules)?;
                self.check_text(text, &rules)
            }
            SlotType::Url => {
                let text = expect_str(value)?;
                let host = url_host(text)?;
                check_domain(host, &rules)?;
                self.check_text(text, &rules)
            }
            SlotType::Date => {
                let text = expect_str(value)?;
                let date = parse_date(text).ok_or("expected an RFC 3339 timestamp or YYYY-MM-DD date")?;
                check_date_bounds(date, &rules)
            }
            SlotType::Number => {
                let n = value.as_f64().ok_or("expected a number")?;
                check_range(n, &rules)
            }
            SlotType::Currency => {
                let amount = currency_amount(value)?;
                check_range(amount, &rules)
            }
            SlotType::Boolean => value
                .is_boolean()
                .then_some(())
                .ok_or_else(|| "expected true or false".to_string()),
            SlotType::Select => {
                let choice = expect_str(value)?;
                check_option(choice, &rules)
            }
            SlotType::Multiselect => check_selections(value, &rules),
            SlotType::File => check_file(value),
            SlotType::Location => check_location(value),
            SlotType::Json => Ok(()),
        }
    }

    fn check_text(&self, text: &str, rules: &SlotValidation) -> Result<(), String> {
        let len = text.chars().count();
        if let Some(min) = rules.min_length {
            if len < min {
                return Err(format!("must be at least {} characters", min));
            }
        }
        if let Some(max) = rules.max_length {
            if len > max {
                return Err(format!("must be at most {} characters", max));
            }
        }
        if let Some(pattern) = &rules.pattern {
            if !self.matches(pattern, text)? {
                return Err(format!("does not match pattern '{}'", pattern));
            }
        }
        Ok(())
    }

    fn matches(&self, pattern: &str, text: &str) -> Result<bool, String> {
        if let Some(re) = self.patterns.get(pattern) {
            return Ok(re.is_match(text));
        }
        let re = Regex::new(pattern).map_err(|e| format!("invalid pattern '{}': {}", pattern, e))?;
        let matched = re.is_match(text);
        self.patterns.insert(pattern.to_string(), re);
        Ok(matched)
    }
}

impl Default for SlotValidator {
    fn default() -> Self {
        Self::new(crate::EngineConfig::default().max_value_bytes)
    }
}

// ── Type checks ──────────────────────────────────────────────────────

fn expect_str(value: &Value) -> Result<&str, String> {
    value.as_str().ok_or_else(|| "expected a string".to_string())
}

fn email_domain(text: &str) -> Result<&str, String> {
    let mut parts = text.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty() => {
            Ok(domain)
        }
        _ => Err("expected an email address".into()),
    }
}

fn url_host(text: &str) -> Result<&str, String> {
    let rest = text
        .strip_prefix("https://")
        .or_else(|| text.strip_prefix("http://"))
        .ok_or("expected an http(s) URL")?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority.rsplit('@').next().unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    if host.is_empty() {
        return Err("URL has no host".into());
    }
    Ok(host)
}

fn check_domain(host: &str, rules: &SlotValidation) -> Result<(), String> {
    let Some(domain) = &rules.domain else {
        return Ok(());
    };
    let host = host.to_ascii_lowercase();
    let domain = domain.trim_start_matches('.').to_ascii_lowercase();
    if host == domain || host.ends_with(&format!(".{}", domain)) {
        Ok(())
    } else {
        Err(format!("must belong to domain '{}'", domain))
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(text, "%Y-%m-%d").ok())
}

fn check_date_bounds(date: NaiveDate, rules: &SlotValidation) -> Result<(), String> {
    if let Some(min) = &rules.min_date {
        let bound = parse_date(min).ok_or_else(|| format!("invalid min_date '{}'", min))?;
        if date < bound {
            return Err(format!("must be on or after {}", bound));
        }
    }
    if let Some(max) = &rules.max_date {
        let bound = parse_date(max).ok_or_else(|| format!("invalid max_date '{}'", max))?;
        if date > bound {
            return Err(format!("must be on or before {}", bound));
        }
    }
    Ok(())
}

fn check_range(n: f64, rules: &SlotValidation) -> Result<(), String> {
    if let Some(min) = rules.min {
        if n < min {
            return Err(format!("must be at least {}", min));
        }
    }
    if let Some(max) = rules.max {
        if n > max {
            return Err(format!("must be at most {}", max));
        }
    }
    Ok(())
}

fn currency_amount(value: &Value) -> Result<f64, String> {
    if let Some(n) = value.as_f64() {
        return Ok(n);
    }
    let amount = value.get("amount").and_then(Value::as_f64);
    let currency = value.get("currency").and_then(Value::as_str);
    match (amount, currency) {
        (Some(amount), Some(code)) if !code.is_empty() => Ok(amount),
        _ => Err("expected a number or {amount, currency}".into()),
    }
}

fn check_option(choice: &str, rules: &SlotValidation) -> Result<(), String> {
    if rules.options.is_empty() || rules.allow_other || rules.options.iter().any(|o| o == choice) {
        Ok(())
    } else {
        Err(format!("'{}' is not one of {:?}", choice, rules.options))
    }
}

fn check_selections(value: &Value, rules: &SlotValidation) -> Result<(), String> {
    let items = value.as_array().ok_or("expected an array of strings")?;
    let mut seen = Vec::with_capacity(items.len());
    for item in items {
        let choice = item.as_str().ok_or("expected an array of strings")?;
        if seen.contains(&choice) {
            return Err(format!("'{}' selected more than once", choice));
        }
        check_option(choice, rules)?;
        seen.push(choice);
    }
    if let Some(min) = rules.min_selections {
        if seen.len() < min {
            return Err(format!("select at least {}", min));
        }
    }
    if let Some(max) = rules.max_selections {
        if seen.len() > max {
            return Err(format!("select at most {}", max));
        }
    }
    Ok(())
}

fn check_file(value: &Value) -> Result<(), String> {
    let ok = match value {
        Value::String(reference) => !reference.trim().is_empty(),
        Value::Object(map) => ["url", "name"]
            .iter()
            .any(|key| map.get(*key).and_then(Value::as_str).is_some_and(|s| !s.is_empty())),
        _ => false,
    };
    ok.then_some(())
        .ok_or_else(|| "expected a file reference or {url, name}".to_string())
}

fn check_location(value: &Value) -> Result<(), String> {
    match value {
        Value::String(place) if !place.trim().is_empty() => Ok(()),
        Value::Object(_) => {
            let lat = value.get("lat").and_then(Value::as_f64);
            let lng = value.get("lng").and_then(Value::as_f64);
            match (lat, lng) {
                (Some(lat), Some(lng))
                    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) =>
                {
                    Ok(())
                }
                (Some(_), Some(_)) => Err("coordinates out of range".into()),
                _ => Err("expected {lat, lng}".into()),
            }
        }
        _ => Err("expected a place name or {lat, lng}".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> SlotValidator {
        SlotValidator::new(1024)
    }

    fn rejects(slot: &Slot, value: Value) -> bool {
        matches!(
            validator().check(slot, &value),
            Err(CoordinationError::SlotValidationFailed { .. })
        )
    }

    #[test]
    fn test_null_is_rejected_for_every_type() {
        for slot_type in [SlotType::Text, SlotType::Json, SlotType::Boolean, SlotType::File] {
            assert!(rejects(&Slot::new("x", slot_type), Value::Null));
        }
    }

    #[test]
    fn test_text_constraints() {
        let slot = Slot::text("nickname").with_validation(SlotValidation {
            min_length: Some(2),
            max_length: Some(5),
            pattern: Some("^[a-z]+$".into()),
            ..Default::default()
        });
        let v = validator();
        assert!(v.check(&slot, &json!("ada")).is_ok());
        assert!(v.check(&slot, &json!("a")).is_err());
        assert!(v.check(&slot, &json!("abcdef")).is_err());
        assert!(v.check(&slot, &json!("Ada")).is_err());
        assert!(v.check(&slot, &json!(42)).is_err());
        // cached pattern is reused
        assert!(v.check(&slot, &json!("bob")).is_ok());
    }

    #[test]
    fn test_size_limit() {
        let slot = Slot::new("blob", SlotType::Json);
        let big = "x".repeat(2048);
        assert!(rejects(&slot, json!({ "data": big })));
    }

    #[test]
    fn test_number_and_currency() {
        let rules = SlotValidation {
            min: Some(0.0),
            max: Some(100.0),
            ..Default::default()
        };
        let number = Slot::number("score").with_validation(rules.clone());
        let v = validator();
        assert!(v.check(&number, &json!(42)).is_ok());
        assert!(v.check(&number, &json!(101)).is_err());
        assert!(v.check(&number, &json!("42")).is_err());

        let budget = Slot::new("budget", SlotType::Currency).with_validation(rules);
        assert!(v.check(&budget, &json!({"amount": 99.5, "currency": "EUR"})).is_ok());
        assert!(v.check(&budget, &json!({"amount": 99.5})).is_err());
        assert!(v.check(&budget, &json!({"amount": 250, "currency": "EUR"})).is_err());
    }

    #[test]
    fn test_email_and_url_domains() {
        let rules = SlotValidation {
            domain: Some("example.com".into()),
            ..Default::default()
        };
        let email = Slot::new("contact", SlotType::Email).with_validation(rules.clone());
        let v = validator();
        assert!(v.check(&email, &json!("ada@example.com")).is_ok());
        assert!(v.check(&email, &json!("ada@mail.example.com")).is_ok());
        assert!(v.check(&email, &json!("ada@evil-example.com")).is_err());
        assert!(v.check(&email, &json!("not-an-email")).is_err());
        assert!(v.check(&email, &json!("a@b@example.com")).is_err());

        let url = Slot::new("site", SlotType::Url).with_validation(rules);
        assert!(v.check(&url, &json!("https://example.com/path?q=1")).is_ok());
        assert!(v.check(&url, &json!("http://user@docs.example.com:8080/")).is_ok());
        assert!(v.check(&url, &json!("ftp://example.com")).is_err());
        assert!(v.check(&url, &json!("https://other.org")).is_err());
    }

    #[test]
    fn test_dates() {
        let slot = Slot::new("deadline", SlotType::Date).with_validation(SlotValidation {
            min_date: Some("2026-01-01".into()),
            max_date: Some("2026-12-31".into()),
            ..Default::default()
        });
        let v = validator();
        assert!(v.check(&slot, &json!("2026-06-15")).is_ok());
        assert!(v.check(&slot, &json!("2026-06-15T10:00:00Z")).is_ok());
        assert!(v.check(&slot, &json!("2025-12-31")).is_err());
        assert!(v.check(&slot, &json!("next tuesday")).is_err());
    }

    #[test]
    fn test_select_and_multiselect() {
        let rules = SlotValidation {
            options: vec!["red".into(), "green".into(), "blue".into()],
            min_selections: Some(1),
            max_selections: Some(2),
            ..Default::default()
        };
        let v = validator();
        let select = Slot::new("color", SlotType::Select).with_validation(rules.clone());
        assert!(v.check(&select, &json!("red")).is_ok());
        assert!(v.check(&select, &json!("purple")).is_err());

        let open = Slot::new("color", SlotType::Select).with_validation(SlotValidation {
            allow_other: true,
            ..rules.clone()
        });
        assert!(v.check(&open, &json!("purple")).is_ok());

        let multi = Slot::new("colors", SlotType::Multiselect).with_validation(rules);
        assert!(v.check(&multi, &json!(["red", "blue"])).is_ok());
        assert!(v.check(&multi, &json!([])).is_err());
        assert!(v.check(&multi, &json!(["red", "green", "blue"])).is_err());
        assert!(v.check(&multi, &json!(["red", "red"])).is_err());
        assert!(v.check(&multi, &json!("red")).is_err());
    }

    #[test]
    fn test_file_location_boolean() {
        let v = validator();
        let file = Slot::new("receipt", SlotType::File);
        assert!(v.check(&file, &json!("s3://bucket/receipt.pdf")).is_ok());
        assert!(v.check(&file, &json!({"name": "receipt.pdf"})).is_ok());
        assert!(v.check(&file, &json!({"size": 10})).is_err());

        let place = Slot::new("venue", SlotType::Location);
        assert!(v.check(&place, &json!("Lisbon")).is_ok());
        assert!(v.check(&place, &json!({"lat": 38.7, "lng": -9.1})).is_ok());
        assert!(v.check(&place, &json!({"lat": 123.0, "lng": 0.0})).is_err());

        let flag = Slot::new("agreed", SlotType::Boolean);
        assert!(v.check(&flag, &json!(true)).is_ok());
        assert!(v.check(&flag, &json!("yes")).is_err());
    }
}
