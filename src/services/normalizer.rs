use chrono::Utc;
use serde_json::Value;

use crate::models::{AnalysisError, NutritionItem, NutritionReport, RawInferencePayload, UNKNOWN_ITEM_NAME};

// Ordered lookups. The first spelling of each list is the one the prompt asks
// for; the rest are spellings the model has been seen to drift to.
pub const NAME_KEYS: &[&str] = &["item_name", "name"];
pub const CALORIE_KEYS: &[&str] = &["total_calories", "calories"];
pub const PROTEIN_KEYS: &[&str] = &["total_protien", "total_protein", "protein"];
pub const CARB_KEYS: &[&str] = &["toal_carbs", "total_carbs", "carbs"];
pub const FAT_KEYS: &[&str] = &["toal_fats", "total_fats", "fats"];

/// Shape of the decoded content, decided once at the parse boundary.
#[derive(Debug)]
enum InboundPayload {
    Recognized(Vec<Value>),
    Unrecognized(Unrecognized),
}

#[derive(Debug)]
enum Unrecognized {
    NoItems,
    NotAnObject,
    ItemsNotAList,
}

impl InboundPayload {
    fn classify(value: Value) -> Self {
        let Value::Object(mut object) = value else {
            return InboundPayload::Unrecognized(Unrecognized::NotAnObject);
        };

        match object.remove("items") {
            None | Some(Value::Null) => InboundPayload::Unrecognized(Unrecognized::NoItems),
            Some(Value::Array(items)) => InboundPayload::Recognized(items),
            Some(_) => InboundPayload::Unrecognized(Unrecognized::ItemsNotAList),
        }
    }
}

/// Turns the model's JSON text into canonical nutrition items.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseNormalizer;

impl ResponseNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, payload: &RawInferencePayload) -> Result<NutritionReport, AnalysisError> {
        let parse_failed = |reason: String| AnalysisError::ParseFailed {
            reason,
            payload: payload.as_str().to_string(),
        };

        let value: Value =
            serde_json::from_str(payload.as_str()).map_err(|e| parse_failed(e.to_string()))?;

        let raw_items = match InboundPayload::classify(value) {
            InboundPayload::Recognized(items) => items,
            InboundPayload::Unrecognized(Unrecognized::NoItems) => return Err(AnalysisError::EmptyResult),
            InboundPayload::Unrecognized(Unrecognized::NotAnObject) => {
                return Err(parse_failed("top-level value is not an object".to_string()))
            }
            InboundPayload::Unrecognized(Unrecognized::ItemsNotAList) => {
                return Err(parse_failed("`items` is not a list".to_string()))
            }
        };

        if raw_items.is_empty() {
            return Err(AnalysisError::EmptyResult);
        }

        let items: Vec<NutritionItem> = raw_items.iter().map(normalize_item).collect();
        log::info!("🍽️ Normalized {} food item(s)", items.len());

        Ok(NutritionReport {
            items,
            analyzed_at: Utc::now(),
        })
    }
}

fn normalize_item(raw: &Value) -> NutritionItem {
    if !raw.is_object() {
        log::warn!("⚠️ Item is not an object, using defaults: {}", raw);
    }

    let item = NutritionItem {
        name: resolve_name(raw),
        calories: resolve_number(raw, CALORIE_KEYS),
        protein_grams: resolve_number(raw, PROTEIN_KEYS),
        carbs_grams: resolve_number(raw, CARB_KEYS),
        fat_grams: resolve_number(raw, FAT_KEYS),
    };

    log::debug!("📊 Parsed values: {:?} from {}", item, raw);
    item
}

fn resolve_name(raw: &Value) -> String {
    NAME_KEYS
        .iter()
        .filter_map(|key| raw.get(key).and_then(Value::as_str))
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_ITEM_NAME.to_string())
}

/// First key holding a positive number wins. A zero or unusable value under
/// an earlier key does not shadow a later one.
fn resolve_number(raw: &Value, keys: &[&str]) -> f64 {
    keys.iter()
        .filter_map(|key| raw.get(key))
        .filter_map(coerce_number)
        .find(|n| *n > 0.0)
        .unwrap_or(0.0)
}

/// Number or numeric-looking string to a finite, non-negative value.
fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => leading_decimal(&strip_thousands(s))?,
        _ => return None,
    };

    if !n.is_finite() {
        return None;
    }
    Some(if n > 0.0 { n } else { 0.0 })
}

/// Drops `,` group separators ("1,250 kcal" -> "1250 kcal"). A comma only
/// counts as one when a digit precedes it and exactly three digits follow.
fn strip_thousands(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());

    for (i, c) in text.char_indices() {
        if c == ',' {
            let after = &bytes[i + 1..];
            let grouped = i > 0
                && bytes[i - 1].is_ascii_digit()
                && after.len() >= 3
                && after[..3].iter().all(u8::is_ascii_digit)
                && !after.get(3).is_some_and(u8::is_ascii_digit);
            if grouped {
                continue;
            }
        }
        out.push(c);
    }

    out
}

/// Reads the decimal number at the start of `text`, ignoring whatever
/// follows ("150 kcal" -> 150).
fn leading_decimal(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        digits += j - frac_start;
        end = j;
    }

    if digits == 0 {
        return None;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut j = end + 1;
        if j < bytes.len() && matches!(bytes[j], b'+' | b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            end = j;
        }
    }

    text[..end].parse().ok()
}
