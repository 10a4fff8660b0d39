/// Shared helpers for response handling across chain modules
use base64::{engine::general_purpose, Engine};

/// Create a preview string for error logging (truncates long responses)
pub fn create_error_preview(response: &str, max_len: usize) -> String {
    if response.len() <= max_len {
        return response.to_string();
    }
    let mut end = max_len;
    while !response.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &response[..end])
}

/// Decodes standard base64 into a UTF-8 string, None when either step fails
pub fn decode_base64_utf8(value: &str) -> Option<String> {
    general_purpose::STANDARD
        .decode(value)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}

/// Parses the decimal strings CometBFT and the LCD use for integers.
/// Empty strings count as zero.
pub fn parse_u64(value: &str) -> Result<u64, std::num::ParseIntError> {
    if value.is_empty() {
        Ok(0)
    } else {
        value.parse::<u64>()
    }
}
