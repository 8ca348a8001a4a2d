//! Legacy estimate form adapter
//!
//! The old estimate form posts its own field names. This maps them onto
//! dataset field names and fills the form's defaults; the result still goes
//! through the reconciler like any other partial record.

use std::collections::HashMap;

use crate::data::PropertyRecord;
use crate::error::{PipelineError, PipelineResult};

/// Form field, canonical field, default
const FLOAT_FIELDS: [(&str, &str, f64); 4] = [
    ("price_by_area", "buy_price_by_area", 3000.0),
    ("latitude", "latitude", 40.4168),
    ("longitude", "longitude", -3.7038),
    // `useful_size` is handled separately; its default is `size`
    ("size", "sq_mt_built", 100.0),
];

const INTEGER_FIELDS: [(&str, &str, i64); 4] = [
    ("rooms", "n_rooms", 3),
    ("bathrooms", "n_bathrooms", 2),
    ("floor", "floor", 1),
    ("built_year", "built_year", 2000),
];

const TEXT_FIELDS: [(&str, &str); 3] = [
    ("energy_certificate", "E"),
    ("district", "Centro"),
    ("neighborhood", "Sol"),
];

/// Checkbox fields the form may send, under form names
const FLAG_FIELDS: [&str; 9] = [
    "has_lift",
    "is_exterior",
    "has_parking_space",
    "has_air_conditioning",
    "has_garden",
    "has_swimming_pool",
    "has_terrace",
    "has_box_room",
    "is_furnished",
];

/// The form always describes a flat
const HOUSE_TYPE: &str = "1";

/// Partial record for a submitted form; supplied numbers must parse
pub fn record_from_form(form: &HashMap<String, String>) -> PipelineResult<PropertyRecord> {
    let mut record = PropertyRecord::new();

    for (field, canonical, default) in FLOAT_FIELDS {
        record.insert(canonical, parse_float(form, field)?.unwrap_or(default));
    }
    let useful = match parse_float(form, "useful_size")? {
        Some(v) => v,
        None => parse_float(form, "size")?.unwrap_or(100.0),
    };
    record.insert("sq_mt_useful", useful);

    for (field, canonical, default) in INTEGER_FIELDS {
        let value = match form.get(field) {
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                PipelineError::Validation(format!("{} must be an integer, got '{}'", field, raw))
            })?,
            None => default,
        };
        record.insert(canonical, value as f64);
    }

    for field in FLAG_FIELDS {
        if let Some(raw) = form.get(field) {
            record.insert(field, raw.as_str());
        }
    }

    record.insert("house_type", HOUSE_TYPE);
    for (field, default) in TEXT_FIELDS {
        let value = form.get(field).map(String::as_str).unwrap_or(default);
        record.insert(field, value);
    }

    Ok(record)
}

fn parse_float(form: &HashMap<String, String>, field: &str) -> PipelineResult<Option<f64>> {
    match form.get(field) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| {
                PipelineError::Validation(format!("{} must be a number, got '{}'", field, raw))
            }),
    }
}
