//! Merge keys for ingredients.
//!
//! Two ingredients land on the same grocery row exactly when their bucket keys
//! are equal. Names compare case- and whitespace-insensitively but nothing
//! fuzzier: "Garlic clove" and "garlic cloves" stay apart.

/// Separator between bucket key parts; not expected inside ingredient names.
pub const KEY_DELIMITER: char = '|';

/// `<lowercased trimmed name>|<unit code>|<0 or 1>`
pub fn bucket_key(name: &str, unit_code: &str, is_pantry_staple: bool) -> String {
    format!(
        "{name}{d}{unit}{d}{flag}",
        name = name.trim().to_lowercase(),
        unit = unit_code,
        flag = if is_pantry_staple { '1' } else { '0' },
        d = KEY_DELIMITER,
    )
}
