// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;
use time::Date;
use time::macros::format_description;

pub const DATE_LAYOUT: &str = "YYYY-MM-DD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid date, expected {DATE_LAYOUT}")]
    InvalidDate,
    #[error("invalid yen amount")]
    InvalidMoney,
    #[error("negative yen amount")]
    NegativeMoney,
    #[error("invalid percentage, expected 0 to 100")]
    InvalidPercent,
}

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// Parses an activity date as both backends store it. A trailing time part
/// (`2026-03-01T09:00:00Z`, `2026-03-01 09:00:00`) is dropped.
pub fn parse_iso_date(input: &str) -> ValidationResult<Date> {
    let trimmed = input.trim();
    let day = match (trimmed.get(..10), trimmed.get(10..)) {
        (Some(day), Some(rest)) if rest.is_empty() || rest.starts_with(['T', ' ']) => day,
        _ => return Err(ValidationError::InvalidDate),
    };
    Date::parse(day, &format_description!("[year]-[month]-[day]"))
        .map_err(|_| ValidationError::InvalidDate)
}

pub fn parse_optional_iso_date(input: Option<&str>) -> ValidationResult<Option<Date>> {
    input
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(parse_iso_date)
        .transpose()
}

pub fn format_iso_date(value: Date) -> String {
    value
        .format(&format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| "1970-01-01".to_owned())
}

/// Parses a yen amount such as `1,200,000`, `¥500000` or `500000円`.
/// Blank input is absent.
pub fn parse_optional_yen(input: &str) -> ValidationResult<Option<i64>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let clean = trimmed.replace(',', "");
    if clean.starts_with('-') {
        return Err(ValidationError::NegativeMoney);
    }
    let clean = clean.strip_prefix(['¥', '￥']).unwrap_or(&clean);
    let clean = clean.strip_suffix('円').unwrap_or(clean).trim();
    if clean.is_empty() || !clean.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ValidationError::InvalidMoney);
    }
    clean
        .parse::<i64>()
        .map(Some)
        .map_err(|_| ValidationError::InvalidMoney)
}

pub fn format_yen(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{sign}¥{grouped}")
}

/// Parses a closing probability; a trailing `%` is allowed.
pub fn parse_optional_percent(input: &str) -> ValidationResult<Option<u8>> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<u8>() {
        Ok(value) if value <= 100 => Ok(Some(value)),
        _ => Err(ValidationError::InvalidPercent),
    }
}
