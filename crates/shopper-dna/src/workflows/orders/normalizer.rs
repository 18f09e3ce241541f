/// Header normalization applied to order exports: `Customer ID` and
/// `customer-id` both become `customer_id`.
pub(crate) fn normalize_header(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_ascii_lowercase().replace([' ', '-'], "_")
}

/// Trims a cell and maps blanks to `None`.
pub(crate) fn clean_cell(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.replace(['\u{feff}', '\u{200b}'], "").trim().to_string())
        .filter(|raw| !raw.is_empty())
}

#[cfg(test)]
pub(crate) fn normalize_for_tests(value: &str) -> String {
    normalize_header(value)
}
