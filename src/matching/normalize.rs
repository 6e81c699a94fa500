//! Text normalization for title and author comparison.

/// Lower-case, turn every non-alphanumeric character into a space, collapse whitespace
pub fn normalize_text(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized surname of an author name
///
/// "Vaswani, Ashish" and "Ashish Vaswani" both yield "vaswani". Initials-only
/// trailing tokens ("Vaswani A") are skipped.
pub fn surname(name: &str) -> Option<String> {
    if let Some((family, _)) = name.split_once(',') {
        let family = normalize_text(family);
        if !family.is_empty() {
            return Some(family);
        }
    }

    let normalized = normalize_text(name);
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    tokens
        .iter()
        .rev()
        .find(|t| t.chars().count() > 1)
        .or_else(|| tokens.last())
        .map(|t| t.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(
            normalize_text("  Attention Is All You Need! "),
            "attention is all you need"
        );
        assert_eq!(
            normalize_text("BERT: Pre-training of Deep\tBidirectional Transformers"),
            "bert pre training of deep bidirectional transformers"
        );
        assert_eq!(normalize_text("Über-Modelle"), "über modelle");
        assert_eq!(normalize_text("?!"), "");
    }

    #[test]
    fn test_surname() {
        assert_eq!(surname("Ashish Vaswani").as_deref(), Some("vaswani"));
        assert_eq!(surname("Vaswani, A.").as_deref(), Some("vaswani"));
        assert_eq!(surname("Vaswani A").as_deref(), Some("vaswani"));
        assert_eq!(surname("Jean-Paul Sartre").as_deref(), Some("sartre"));
        assert_eq!(surname("  "), None);
    }
}
