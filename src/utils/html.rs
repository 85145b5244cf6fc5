// src/utils/html.rs

/// Sanitizes teacher-authored content (question text, option text, exam
/// descriptions) before it is stored.
///
/// Whitelist-based: safe formatting tags like <b> or <sup> survive, while
/// <script>/<iframe> and event-handler attributes are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_tags() {
        let cleaned = clean_html("What is 2 + 2?<script>alert(1)</script>");
        assert_eq!(cleaned, "What is 2 + 2?");
    }

    #[test]
    fn keeps_plain_text() {
        assert_eq!(
            clean_html("Photosynthesis occurs in the?"),
            "Photosynthesis occurs in the?"
        );
    }
}
