//! Combining per-category extraction results into one flat record.

use serde_json::Value;

/// A flat field-name → value record. Values are kept as raw JSON so that
/// models which answer with numbers instead of strings still merge cleanly.
pub type FieldMap = serde_json::Map<String, Value>;

/// Canonical key for the consumer category registered with the DISCOM.
const CATEGORY_IN_DISCOM: &str = "CategoryInDiscom";

/// Shorthand key the net-meter extraction also produces for the same value.
const CATEGORY_ALIAS: &str = "cat";

/// Union per-category results in their given order, later keys winning, then
/// apply the `cat` → `CategoryInDiscom` alias.
///
/// The alias only fires when the canonical key is absent, `null`, or `""`;
/// a non-empty canonical value always wins. The `cat` key itself is kept.
/// Absent results contribute no keys, so this step never fails.
pub fn merge_extractions<I>(results: I) -> FieldMap
where
    I: IntoIterator<Item = Option<FieldMap>>,
{
    let mut merged = FieldMap::new();
    for result in results.into_iter().flatten() {
        for (key, value) in result {
            merged.insert(key, value);
        }
    }

    if is_blank(merged.get(CATEGORY_IN_DISCOM)) {
        if let Some(alias) = merged.get(CATEGORY_ALIAS) {
            if !is_blank(Some(alias)) {
                let alias = alias.clone();
                merged.insert(CATEGORY_IN_DISCOM.to_owned(), alias);
            }
        }
    }
    merged
}

/// Absent, `null` and `""` all count as blank, matching the falsy check the
/// web clients of this API rely on.
fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}
