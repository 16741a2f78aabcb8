//! Rule-based search optimization. Pure functions of the article and the
//! site settings.

use std::collections::HashMap;

use serde_json::json;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use super::config::SiteSettings;
use super::error::GenerationError;
use crate::config::SeoConfig;
use crate::job::{Article, SeoMetadata};

const MAX_SLUG_LEN: usize = 80;
const MIN_TERM_LEN: usize = 4;

const STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "also", "among", "because", "been", "before",
    "being", "below", "between", "both", "could", "does", "doing", "down", "during", "each",
    "even", "every", "from", "further", "have", "having", "here", "hers", "herself", "himself",
    "into", "itself", "just", "like", "made", "make", "many", "more", "most", "much", "must",
    "myself", "once", "only", "other", "ours", "over", "same", "should", "some", "such", "than",
    "that", "their", "theirs", "them", "then", "there", "these", "they", "this", "those",
    "through", "under", "until", "upon", "very", "well", "were", "what", "when", "where",
    "which", "while", "whom", "will", "with", "within", "without", "would", "your", "yours",
];

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Caps `text` at `max_chars` characters, cutting at the last word boundary
/// that fits. With `ellipsis`, a trailing `…` is counted in the limit.
pub(crate) fn cap_on_word_boundary(text: &str, max_chars: usize, ellipsis: bool) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let budget = if ellipsis {
        max_chars.saturating_sub(1)
    } else {
        max_chars
    };
    let head: String = text.chars().take(budget).collect();
    let next_is_space = text
        .chars()
        .nth(budget)
        .is_some_and(|c| c.is_whitespace());

    let cut = if next_is_space {
        head.as_str()
    } else {
        match head.rfind(char::is_whitespace) {
            Some(pos) if pos > 0 => &head[..pos],
            _ => head.as_str(),
        }
    };
    let mut capped = cut
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-'))
        .to_string();
    if ellipsis {
        capped.push('…');
    }
    capped
}

/// Leading whole sentences of `body` that fit in `max_chars`. Falls back to
/// a word-boundary cut when the first sentence alone is too long.
pub(crate) fn leading_sentences(body: &str, max_chars: usize) -> String {
    let text = collapse_whitespace(body);
    let mut end = 0;
    let mut chars_seen = 0;
    let mut iter = text.char_indices().peekable();
    while let Some((idx, c)) = iter.next() {
        chars_seen += 1;
        if chars_seen > max_chars {
            break;
        }
        let at_boundary = matches!(c, '.' | '!' | '?')
            && iter.peek().map_or(true, |(_, next)| next.is_whitespace());
        if at_boundary {
            end = idx + c.len_utf8();
        }
    }
    if end == 0 {
        return cap_on_word_boundary(&text, max_chars, true);
    }
    text[..end].to_string()
}

fn fold_char(c: char, out: &mut String) {
    match c {
        'ß' => out.push_str("ss"),
        'æ' | 'Æ' => out.push_str("ae"),
        'œ' | 'Œ' => out.push_str("oe"),
        'ø' | 'Ø' => out.push('o'),
        'đ' | 'Đ' => out.push('d'),
        'ł' | 'Ł' => out.push('l'),
        _ => out.extend(c.to_lowercase()),
    }
}

/// ASCII-folded, lowercase, hyphen-separated form of `title`.
pub fn slugify(title: &str) -> String {
    let mut folded = String::with_capacity(title.len());
    for c in title.nfkd().filter(|c| !is_combining_mark(*c)) {
        fold_char(c, &mut folded);
    }

    let mut slug = String::with_capacity(folded.len());
    for c in folded.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.len() <= MAX_SLUG_LEN {
        return slug.to_string();
    }
    // Slug is pure ASCII here, so byte offsets are char offsets.
    let head = &slug[..MAX_SLUG_LEN];
    let cut = if slug.as_bytes()[MAX_SLUG_LEN] == b'-' {
        head
    } else {
        head.rfind('-').map_or(head, |pos| &head[..pos])
    };
    cut.trim_end_matches('-').to_string()
}

/// Body terms ranked by frequency, ties broken alphabetically.
fn top_terms(body: &str) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in body.split(|c: char| !c.is_alphanumeric()) {
        if word.chars().count() < MIN_TERM_LEN || word.chars().all(|c| c.is_numeric()) {
            continue;
        }
        let word = word.to_lowercase();
        if STOP_WORDS.contains(&word.as_str()) {
            continue;
        }
        *counts.entry(word).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().map(|(word, _)| word).collect()
}

fn keywords(article: &Article, limit: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(limit);
    let candidates = article.tags.iter().cloned().chain(top_terms(&article.body));
    for candidate in candidates {
        if out.len() >= limit {
            break;
        }
        if !out.contains(&candidate) {
            out.push(candidate);
        }
    }
    out
}

fn seo_title(title: &str, site_name: Option<&str>, max_len: usize) -> String {
    let capped = cap_on_word_boundary(&collapse_whitespace(title), max_len, false);
    match site_name.map(str::trim).filter(|s| !s.is_empty()) {
        Some(site) => {
            let suffixed = format!("{} | {}", capped, site);
            if suffixed.chars().count() <= max_len {
                suffixed
            } else {
                capped
            }
        }
        None => capped,
    }
}

fn canonical_url(site: &SiteSettings, slug: &str) -> String {
    let base = site.base_url.trim_end_matches('/');
    let path = site.article_path.trim_matches('/');
    if path.is_empty() {
        format!("{}/{}", base, slug)
    } else {
        format!("{}/{}/{}", base, path, slug)
    }
}

/// Derives search metadata for `article`. Fails only when the title yields
/// no usable slug.
pub fn optimize(
    article: &Article,
    site: &SiteSettings,
    limits: &SeoConfig,
) -> Result<SeoMetadata, GenerationError> {
    let slug = slugify(&article.title);
    if slug.is_empty() {
        return Err(GenerationError::MalformedDraft(format!(
            "title \"{}\" has no characters usable in a URL slug",
            article.title
        )));
    }

    let seo_title = seo_title(&article.title, site.site_name.as_deref(), limits.title_max_len);
    let description_source = if article.excerpt.trim().is_empty() {
        &article.body
    } else {
        &article.excerpt
    };
    let seo_description = cap_on_word_boundary(
        &collapse_whitespace(description_source),
        limits.description_max_len,
        true,
    );
    let seo_keywords = keywords(article, limits.keyword_count);
    let canonical_url = canonical_url(site, &slug);

    let mut structured_data = json!({
        "@context": "https://schema.org",
        "@type": "Article",
        "headline": seo_title,
        "description": seo_description,
        "keywords": seo_keywords.join(", "),
        "articleSection": article.category,
        "inLanguage": site.source_language,
        "url": canonical_url,
        "mainEntityOfPage": canonical_url,
    });
    if let Some(image) = &article.image_ref {
        structured_data["image"] = json!(image);
    }
    if let Some(site_name) = &site.site_name {
        structured_data["publisher"] = json!({
            "@type": "Organization",
            "name": site_name,
        });
    }

    Ok(SeoMetadata {
        seo_title,
        seo_description,
        seo_keywords,
        slug,
        canonical_url,
        structured_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteSettings {
        SiteSettings {
            base_url: "https://blog.example.com/".to_string(),
            article_path: "/articles/".to_string(),
            site_name: Some("Example Blog".to_string()),
            source_language: "en".to_string(),
        }
    }

    fn article(title: &str, body: &str) -> Article {
        Article {
            title: title.to_string(),
            body: body.to_string(),
            excerpt: String::new(),
            category: "engineering".to_string(),
            tags: vec!["rust".to_string()],
            image_ref: None,
            seo: None,
        }
    }

    #[test]
    fn test_cap_on_word_boundary() {
        assert_eq!(cap_on_word_boundary("short", 10, false), "short");
        assert_eq!(
            cap_on_word_boundary("The quick brown fox jumps", 12, false),
            "The quick"
        );
        assert_eq!(
            cap_on_word_boundary("The quick brown fox jumps", 16, true),
            "The quick brown…"
        );
        assert_eq!(cap_on_word_boundary("Supercalifragilistic", 5, false), "Super");
    }

    #[test]
    fn test_leading_sentences() {
        let body = "First sentence here. Second one follows! Third is too long to fit.";
        assert_eq!(leading_sentences(body, 45), "First sentence here. Second one follows!");
        assert_eq!(leading_sentences("No terminator at all", 100), "No terminator at all");
        assert_eq!(
            leading_sentences("A very long opening sentence without a break.", 20),
            "A very long opening…"
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Ownership in Rust: A Guide!"), "ownership-in-rust-a-guide");
        assert_eq!(slugify("Crème brûlée à la française"), "creme-brulee-a-la-francaise");
        assert_eq!(slugify("Straße & Œuvre"), "strasse-oeuvre");
        assert_eq!(slugify("日本語"), "");

        let long = "word ".repeat(40);
        let slug = slugify(&long);
        assert!(slug.len() <= 80);
        assert!(!slug.ends_with('-'));
        assert!(slug.ends_with("word"));
    }

    #[test]
    fn test_optimize_builds_canonical_url_and_title() {
        let seo = optimize(
            &article("Ownership in Rust", "Ownership rules keep memory safe."),
            &site(),
            &SeoConfig::default(),
        )
        .unwrap();
        assert_eq!(seo.slug, "ownership-in-rust");
        assert_eq!(
            seo.canonical_url,
            "https://blog.example.com/articles/ownership-in-rust"
        );
        assert_eq!(seo.seo_title, "Ownership in Rust | Example Blog");
        assert_eq!(seo.seo_description, "Ownership rules keep memory safe.");
        assert_eq!(seo.structured_data["@type"], "Article");
        assert_eq!(seo.structured_data["publisher"]["name"], "Example Blog");
        assert!(seo.structured_data.get("image").is_none());
    }

    #[test]
    fn test_site_name_dropped_when_it_does_not_fit() {
        let limits = SeoConfig {
            title_max_len: 20,
            ..SeoConfig::default()
        };
        let seo = optimize(
            &article("Borrowing and lifetimes explained", "Body."),
            &site(),
            &limits,
        )
        .unwrap();
        assert_eq!(seo.seo_title, "Borrowing and");
    }

    #[test]
    fn test_keywords_tags_first_then_frequency() {
        let body = "Compiler compiler borrow checker. Borrow borrow traits. \
                    The compiler checks lifetimes and traits.";
        let limits = SeoConfig {
            keyword_count: 4,
            ..SeoConfig::default()
        };
        let seo = optimize(&article("Borrow checker", body), &site(), &limits).unwrap();
        assert_eq!(seo.seo_keywords, vec!["rust", "borrow", "compiler", "traits"]);
    }

    #[test]
    fn test_description_capped_with_ellipsis() {
        let limits = SeoConfig {
            description_max_len: 30,
            ..SeoConfig::default()
        };
        let body = "This description is definitely longer than thirty characters.";
        let seo = optimize(&article("Title", body), &site(), &limits).unwrap();
        assert_eq!(seo.seo_description, "This description is…");
        assert!(seo.seo_description.chars().count() <= 30);
    }

    #[test]
    fn test_title_without_slug_is_malformed() {
        let err = optimize(&article("???", "Body"), &site(), &SeoConfig::default()).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedDraft(_)));
    }

    #[test]
    fn test_optimize_is_deterministic() {
        let a = article("Same input", "Deterministic output every single time.");
        let first = optimize(&a, &site(), &SeoConfig::default()).unwrap();
        let second = optimize(&a, &site(), &SeoConfig::default()).unwrap();
        assert_eq!(first, second);
    }
}
