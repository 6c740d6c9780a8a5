//! Request fingerprinting
//!
//! A fingerprint is the hex SHA-256 of the normalized request fields. Each
//! field is length-prefixed so that moving characters between adjacent
//! fields always changes the digest.

use crate::cache::types::Fingerprint;
use crate::schema::{Category, CheckRequest, TextType};
use sha2::{Digest, Sha256};

/// Compute the fingerprint of a request
pub fn fingerprint(
    text: &str,
    category: Category,
    text_type: TextType,
    special_points: &str,
    approved: bool,
) -> Fingerprint {
    let text = normalize(text);
    let special_points = normalize(special_points);
    let mut hasher = Sha256::new();
    for field in [
        text.as_str(),
        category.id(),
        text_type.id(),
        special_points.as_str(),
        if approved { "1" } else { "0" },
    ] {
        hasher.update(field.len().to_le_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Fingerprint of a [`CheckRequest`]
pub fn fingerprint_request(request: &CheckRequest) -> Fingerprint {
    fingerprint(
        &request.text,
        request.category,
        request.text_type,
        &request.special_points,
        request.approved,
    )
}

/// Line endings unified, outer whitespace trimmed
fn normalize(s: &str) -> String {
    s.replace("\r\n", "\n").trim().to_string()
}
