// src/utils/html.rs

/// Clean HTML content using the ammonia library.
///
/// Whitelist-based sanitization: preserves safe tags (like <b>, <p>) while
/// stripping dangerous tags (like <script>, <iframe>) and malicious
/// attributes (like onclick). Applied to announcement bodies before storage
/// as a fail-safe against Stored XSS.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
