//! Corpus builder: one listing in, one representative text blob out.
//!
//! Field order is fixed and missing fields are omitted, so identical
//! attribute values always yield byte-identical text. Numeric attributes are
//! rendered as short phrases ("3 rooms, 2 bathrooms, 80 m², stratum 4") so
//! the embedding sees quantities rather than bare numbers.

use crate::types::Record;

/// Builds the text embedded for `record`.
pub fn build(record: &Record) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(9);

    let text_fields = [
        &record.title,
        &record.location,
        &record.property_type,
        &record.condition,
        &record.description,
    ];
    for field in text_fields.into_iter().flatten() {
        push_text(&mut parts, field);
    }

    let amenities: Vec<String> = record
        .amenities
        .iter()
        .map(|a| collapse_whitespace(a))
        .filter(|a| !a.is_empty())
        .collect();
    if !amenities.is_empty() {
        parts.push(amenities.join(", "));
    }

    if let Some(sentence) = quantities(record) {
        parts.push(sentence);
    }

    if record.furnished == Some(true) {
        parts.push("Furnished".to_string());
    }
    if record.pets_allowed == Some(true) {
        parts.push("Pets allowed".to_string());
    }

    parts.join(" ")
}

fn quantities(record: &Record) -> Option<String> {
    let mut fragments = Vec::with_capacity(4);

    if let Some(rooms) = record.rooms {
        fragments.push(format!("{rooms} rooms"));
    }
    if let Some(bathrooms) = record.bathrooms {
        fragments.push(format!("{bathrooms} bathrooms"));
    }
    if let Some(area) = record.area_m2.filter(|a| a.is_finite()) {
        // f64 Display is the shortest exact form: 80.0 -> "80", 72.50 -> "72.5"
        fragments.push(format!("{area} m²"));
    }
    if let Some(stratum) = record.stratum {
        fragments.push(format!("stratum {stratum}"));
    }

    if fragments.is_empty() {
        None
    } else {
        Some(fragments.join(", "))
    }
}

fn push_text(parts: &mut Vec<String>, text: &str) {
    let text = collapse_whitespace(text);
    if !text.is_empty() {
        parts.push(text);
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
