use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::models::Price;

static DECIMAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("decimal pattern is valid"));
static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+(?:[.,]\d+)?").expect("number pattern is valid"));
static PERCENT_CELL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(-?\d+(?:\.\d+)?)\s*%").expect("percent pattern is valid"));

/// Lowercase, accent-stripped, whitespace-collapsed form of free text.
/// "  Ambas   Marcam? " -> "ambas marcam?"
pub fn normalize_text(value: &str) -> String {
    let stripped: String = value.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Round to the nearest integer, ties to even.
pub fn round_half_even(value: f64) -> i64 {
    value.round_ties_even() as i64
}

/// Round and clamp into a 0..=100 percentage.
pub fn to_percent(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    round_half_even(value).clamp(0, 100) as u8
}

/// Convert a betting price to a decimal price. Fractional odds (`"5/2"`) become `1 + N/D`,
/// free text yields its first decimal number. Anything <= 0 is no signal.
pub fn parse_price(price: &Price) -> Option<f64> {
    let value = match price {
        Price::Decimal(value) => *value,
        Price::Text(text) => parse_price_text(text)?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

fn parse_price_text(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(value) = text.parse::<f64>() {
        return Some(value);
    }
    if let Some((numerator, denominator)) = text.split_once('/') {
        if let (Ok(n), Ok(d)) = (numerator.trim().parse::<f64>(), denominator.trim().parse::<f64>()) {
            return (d > 0.0).then(|| 1.0 + n / d);
        }
    }
    DECIMAL_RE.find(text).and_then(|m| m.as_str().parse().ok())
}

/// Implied probability of a decimal price: `round(1/price * 100)`, 0 when price <= 0.
/// Not normalised across the outcome set, so the bookmaker margin is kept.
pub fn implied_probability(price: f64) -> u32 {
    if !price.is_finite() || price <= 0.0 {
        return 0;
    }
    round_half_even((1.0 / price) * 100.0).max(0) as u32
}

/// Implied probability straight from a raw price, 0 when the price carries no signal.
pub fn probability_from_price(price: Option<&Price>) -> u32 {
    price.and_then(parse_price).map(implied_probability).unwrap_or(0)
}

/// First number in the text (`"65%"`, `"0,45"`, `"125"`), unclamped.
pub fn parse_number(text: &str) -> Option<f64> {
    let found = NUMBER_RE.find(text)?;
    found.as_str().replace(',', ".").parse().ok()
}

/// Percentage clamped into 0..=100; empty or non-numeric text is `None`.
pub fn parse_percentage(text: &str) -> Option<u8> {
    parse_number(text).map(to_percent)
}

/// Percentage that must carry an explicit `%` sign, as in scraped table cells.
pub fn parse_percent_cell(text: &str) -> Option<u8> {
    let caps = PERCENT_CELL_RE.captures(text)?;
    caps.get(1)?.as_str().parse::<f64>().ok().map(to_percent)
}

/// Escape the characters Telegram's HTML parse mode treats as markup.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

// ── serde helpers ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// `null` deserializes as the type's default (feeds send `"odds": null`).
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts `65`, `65.0`, `"65"` or `"65%"`; anything else is `None`.
pub fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<NumberOrText>::deserialize(deserializer)? {
        Some(NumberOrText::Number(value)) => Some(value),
        Some(NumberOrText::Text(text)) => parse_number(&text),
        None => None,
    })
}

/// Labels arrive as strings or bare numbers (`1`, `2`).
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<NumberOrText>::deserialize(deserializer)? {
        Some(NumberOrText::Number(value)) if value.fract() == 0.0 => format!("{}", value as i64),
        Some(NumberOrText::Number(value)) => value.to_string(),
        Some(NumberOrText::Text(text)) => text,
        None => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Ambos   Marcam "), "ambos marcam");
        assert_eq!(normalize_text("NÃO"), "nao");
        assert_eq!(normalize_text("Mais de 2.5"), "mais de 2.5");
        assert_eq!(normalize_text("Goals Over/Under"), "goals over/under");
    }

    #[test]
    fn test_implied_probability() {
        assert_eq!(implied_probability(1.5), 67);
        assert_eq!(implied_probability(4.0), 25);
        assert_eq!(implied_probability(6.5), 15);
        assert_eq!(implied_probability(0.0), 0);
        assert_eq!(implied_probability(-2.0), 0);
        // 12.5 rounds to even
        assert_eq!(implied_probability(8.0), 12);
    }

    #[test]
    fn test_parse_price_formats() {
        assert_eq!(parse_price(&Price::Decimal(2.1)), Some(2.1));
        assert_eq!(parse_price(&Price::Text("1.85".into())), Some(1.85));
        assert_eq!(parse_price(&Price::Text("5/2".into())), Some(3.5));
        assert_eq!(parse_price(&Price::Text("odd 2.40 (best)".into())), Some(2.4));
        assert_eq!(parse_price(&Price::Text("n/a".into())), None);
        assert_eq!(parse_price(&Price::Text("3/0".into())), None);
        assert_eq!(parse_price(&Price::Decimal(0.0)), None);
        assert_eq!(parse_price(&Price::Text("-1.5".into())), None);
    }

    #[test]
    fn test_probability_from_price() {
        assert_eq!(probability_from_price(Some(&Price::Text("2.00".into()))), 50);
        assert_eq!(probability_from_price(Some(&Price::Text("abc".into()))), 0);
        assert_eq!(probability_from_price(None), 0);
    }

    #[test]
    fn test_parse_percentage() {
        assert_eq!(parse_percentage("65%"), Some(65));
        assert_eq!(parse_percentage("125"), Some(100));
        assert_eq!(parse_percentage("-4"), Some(0));
        assert_eq!(parse_percentage(""), None);
        assert_eq!(parse_percent_cell("Team 1"), None);
        assert_eq!(parse_percent_cell(" 47 %"), Some(47));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("Brighton & Hove <b>"), "Brighton &amp; Hove &lt;b&gt;");
    }
}
