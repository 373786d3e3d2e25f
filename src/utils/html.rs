use ammonia;

/// Clean user-supplied quiz text using the ammonia library.
///
/// Whitelist-based: safe inline tags (like <b>, <em>) survive, while <script>,
/// <iframe> and event-handler attributes are stripped. Bare `<` and `&` are
/// entity-escaped, so clients must render the text as HTML.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(clean_html("CH capital city?"), "CH capital city?");
    }

    #[test]
    fn test_script_removed() {
        assert_eq!(clean_html("Bern<script>alert(1)</script>"), "Bern");
    }
}
