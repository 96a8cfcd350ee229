use bytesize::ByteSize;

/// Binary units with one decimal, e.g. `1.2 MiB`; whole bytes below 1 KiB.
pub fn format_size(bytes: u64) -> String {
    bytesize::to_string(bytes, true)
}

/// Inverse of [`format_size`]. Accepts binary and decimal suffixes in any
/// case and a decimal comma.
pub fn parse_size(text: &str) -> Result<u64, String> {
    let cleaned = text.trim().replace(',', ".");
    cleaned
        .parse::<ByteSize>()
        .map(|size| size.as_u64())
        .map_err(|e| format!("Invalid size '{}': {}", text, e))
}
