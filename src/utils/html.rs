use ammonia;

/// Clean HTML content using the ammonia library.
///
/// Whitelist-based sanitization: safe tags (like <b>, <p>) survive, dangerous
/// tags (like <script>, <iframe>) and attributes (like onclick) are stripped.
/// Applied to admin-supplied rich text (certificate requirements, topic and
/// material descriptions) before it is stored.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
