/// Derive a URL-safe slug from a display name: lowercase ASCII alphanumerics
/// with single dashes between words.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_dash = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn lowercases_and_dashes_words() {
        assert_eq!(slugify("Meja Belajar"), "meja-belajar");
        assert_eq!(slugify("Ferris Mug"), "ferris-mug");
    }

    #[test]
    fn collapses_punctuation_runs() {
        assert_eq!(slugify("E-book: Async Rust"), "e-book-async-rust");
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
    }

    #[test]
    fn trims_trailing_separators() {
        assert_eq!(slugify("trailing!!!"), "trailing");
        assert_eq!(slugify(""), "");
    }
}
