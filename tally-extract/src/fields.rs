//! Strategy tables for each answer field and the deletion check.
//!
//! Order matters: structural locators pinned to the current layout come
//! first, then semantic markers (aria labels), then broad text phrases, then
//! in-page scripts that can see through virtualised or hidden nodes.

use regex::Regex;
use std::sync::LazyLock;
use tally_common::ScrapeSettings;
use tally_drivers::{Locator, PageRenderer};
use tracing::{debug, info};

use crate::cascade::{Extract, Field, FieldCascade, Locate, Strategy, Transform, Validate};

pub const NAME_NOT_FOUND: &str = "Name not found";
pub const ZERO_COUNT: &str = "0";

const COUNT_TOKEN: &str = r"(\d+(?:,\d+)*(?:\.\d+)?[KkMm]?)";

fn phrase(noun: &str, allow_view_prefix: bool) -> Extract {
    let prefix = if allow_view_prefix { r"(?:view\s+)?" } else { "" };
    let pattern = format!(r"(?i){prefix}{COUNT_TOKEN}\s+{noun}s?");
    Extract::Phrase(Regex::new(&pattern).expect("phrase pattern"))
}

fn xpath(path: &str) -> Locate {
    Locate::Elements(Locator::xpath(path))
}

const VIEWS_SCRIPT: &str = r#"
return Array.from(document.querySelectorAll('*'))
    .filter(el => el.textContent && el.textContent.includes('views'))
    .map(el => el.textContent.trim())
    .find(text => /\d+\s+views/.test(text)) || null;
"#;

const UPVOTE_BUTTON_SCRIPT: &str = r#"
const isVisible = span => {
    const style = getComputedStyle(span);
    return style.opacity !== '0' && style.display !== 'none' && style.visibility !== 'hidden';
};
for (const button of document.querySelectorAll('button[aria-label*="Upvote" i]')) {
    const visible = Array.from(button.querySelectorAll('span')).filter(span => {
        const text = span.textContent.trim();
        return /^\d+$/.test(text) && text.length < 10 && isVisible(span);
    });
    if (visible.length > 0) return visible[0].textContent.trim();

    const counters = Array.from(button.querySelectorAll(
        '.q-text.qu-whiteSpace--nowrap.qu-display--inline-flex.qu-alignItems--center.qu-justifyContent--center'
    )).filter(span => {
        const text = span.textContent.trim();
        return /^\d+$/.test(text) && text.length < 10;
    });
    if (counters.length > 0) return counters[0].textContent.trim();
}
return null;
"#;

const UPVOTE_NEARBY_SCRIPT: &str = r#"
const nearUpvote = el => !!el && (
    el.textContent.includes('Upvote') ||
    (el.parentElement && el.parentElement.textContent.includes('Upvote'))
);
const hit = Array.from(document.querySelectorAll('span')).find(span => {
    const text = span.textContent.trim();
    return /^\d+$/.test(text) && text.length < 10 &&
        getComputedStyle(span).opacity !== '0' &&
        nearUpvote(span.parentElement);
});
return hit ? hit.textContent.trim() : null;
"#;

const COMMENT_BUTTON_SCRIPT: &str = r#"
for (const button of document.querySelectorAll('button[aria-label*="comment" i]')) {
    const spans = Array.from(button.querySelectorAll('div > div:nth-child(2) > span:not([class*="visibility--hidden"])'))
        .filter(span => /^\d+$/.test(span.textContent.trim()));
    if (spans.length > 0) return spans[0].textContent.trim();
}
return null;
"#;

const COMMENT_ANY_SPAN_SCRIPT: &str = r#"
for (const button of document.querySelectorAll('button[aria-label*="comment" i]')) {
    for (const span of button.querySelectorAll('span')) {
        const text = span.textContent.trim();
        if (text && /^\d+$/.test(text) && getComputedStyle(span).opacity !== '0') return text;
    }
    const match = button.textContent.trim().match(/\d+/);
    if (match) return match[0];
}
return null;
"#;

const SHARES_SCRIPT: &str = r#"
return Array.from(document.querySelectorAll('*'))
    .filter(el => el.textContent && el.textContent.includes('share'))
    .map(el => el.textContent.trim())
    .find(text => /\d+\s+share/.test(text)) || null;
"#;

static AUTHOR: LazyLock<FieldCascade> = LazyLock::new(|| {
    let by_xpath = |name: &'static str, path: &str| Strategy {
        name,
        locate: xpath(path),
        extract: Extract::Whole,
        validate: Validate::Author,
        transform: Transform::Identity,
    };
    FieldCascade {
        field: Field::Author,
        strategies: vec![
            by_xpath(
                "author.profile_link",
                "//div[contains(@class, 'q-box')]//a[contains(@class, 'qu-bold')]/span",
            ),
            by_xpath(
                "author.bold_span",
                "//div[contains(@class, 'q-box')]//span[contains(@class, 'qu-bold')]",
            ),
            by_xpath("author.bold_done", "//span[contains(@class, 'qu-bold--done')]"),
            by_xpath(
                "author.header_bold",
                "//div[contains(@class, 'qu-borderBottom')]//span[contains(@class, 'qu-bold')]",
            ),
            Strategy {
                name: "author.url_slug",
                locate: Locate::CurrentUrl,
                extract: Extract::Phrase(
                    Regex::new(r"/answer/([^/?#]+)").expect("answer slug pattern"),
                ),
                validate: Validate::Present,
                transform: Transform::SlugToName,
            },
        ],
        default: NAME_NOT_FOUND,
    }
});

static VIEWS: LazyLock<FieldCascade> = LazyLock::new(|| FieldCascade {
    field: Field::Views,
    strategies: vec![
        Strategy::count(
            "views.stats_row",
            xpath("//div[contains(@class, 'qu-color--gray_light')]//span[contains(@class, 'c1h7helg')][1]"),
            phrase("view", false),
        ),
        Strategy::count("views.span_text", xpath("//span[contains(text(), 'views')]"), phrase("view", false)),
        Strategy::count("views.div_text", xpath("//div[contains(text(), 'views')]"), phrase("view", false)),
        Strategy::count("views.stat_spans", xpath("//span[contains(@class, 'c1h7helg')]"), phrase("view", false)),
        Strategy::count("views.script", Locate::Script(VIEWS_SCRIPT), phrase("view", false)),
    ],
    default: ZERO_COUNT,
});

static UPVOTES: LazyLock<FieldCascade> = LazyLock::new(|| FieldCascade {
    field: Field::Upvotes,
    strategies: vec![
        Strategy::count(
            "upvotes.button_counter",
            xpath("/html/body/div[2]/div/div[2]/div/div[3]/div/div/div/div[1]/div[1]/div[6]/div/div/div/div[1]/div[1]/div/div/div/button/div[2]/div/span/span[4]/div/span[2]"),
            Extract::Whole,
        ),
        Strategy::count("upvotes.button_script", Locate::Script(UPVOTE_BUTTON_SCRIPT), Extract::Whole),
        Strategy::count("upvotes.nearby_script", Locate::Script(UPVOTE_NEARBY_SCRIPT), Extract::Whole),
        Strategy::count(
            "upvotes.button_digits",
            xpath("//button[contains(@aria-label, 'Upvote')]"),
            Extract::Digits,
        ),
        Strategy::count(
            "upvotes.aria_label",
            Locate::Attribute(Locator::css(r#"button[aria-label*="Upvote"]"#), "aria-label"),
            phrase("upvote", true),
        ),
        Strategy::count("upvotes.span_text", xpath("//span[contains(text(), 'upvotes')]"), phrase("upvote", true)),
        Strategy::count("upvotes.div_text", xpath("//div[contains(text(), 'upvotes')]"), phrase("upvote", true)),
        Strategy::count(
            "upvotes.stats_row",
            xpath("//div[contains(@class, 'qu-color--gray_light')]//span[contains(@class, 'c1h7helg')][contains(text(), 'upvotes')]"),
            phrase("upvote", true),
        ),
    ],
    default: ZERO_COUNT,
});

static COMMENTS: LazyLock<FieldCascade> = LazyLock::new(|| FieldCascade {
    field: Field::Comments,
    strategies: vec![
        Strategy::count(
            "comments.button_counter",
            xpath("/html/body/div[2]/div/div[2]/div/div[3]/div/div/div/div[1]/div[1]/div[6]/div/div/div/div[1]/div[2]/div/div/div/button/div/div[2]/span[2]"),
            Extract::Whole,
        ),
        Strategy::count("comments.button_script", Locate::Script(COMMENT_BUTTON_SCRIPT), Extract::Whole),
        Strategy::count(
            "comments.button_spans",
            xpath("//button[contains(@aria-label, 'comment') or contains(@aria-label, 'Comment')]//div[contains(@class, 'q-text')]//span[contains(@class, 'q-text') and not(contains(@class, 'qu-visibility--hidden'))]"),
            Extract::Whole,
        ),
        Strategy::count(
            "comments.button_digits",
            xpath("//button[contains(@aria-label, 'Comment') or contains(@aria-label, 'comment')]"),
            Extract::Digits,
        ),
        Strategy::count("comments.any_span_script", Locate::Script(COMMENT_ANY_SPAN_SCRIPT), Extract::Whole),
        Strategy::count("comments.span_text", xpath("//span[contains(text(), 'comments')]"), phrase("comment", false)),
        Strategy::count("comments.div_text", xpath("//div[contains(text(), 'comments')]"), phrase("comment", false)),
    ],
    default: ZERO_COUNT,
});

static SHARES: LazyLock<FieldCascade> = LazyLock::new(|| FieldCascade {
    field: Field::Shares,
    strategies: vec![
        Strategy::count("shares.span_text", xpath("//span[contains(text(), 'shares')]"), phrase("share", true)),
        Strategy::count("shares.div_text", xpath("//div[contains(text(), 'shares')]"), phrase("share", true)),
        Strategy::count(
            "shares.stats_row",
            xpath("//div[contains(@class, 'qu-color--gray_light')]//span[contains(@class, 'c1h7helg')][contains(text(), 'shares')]"),
            phrase("share", true),
        ),
        Strategy::count("shares.button_text", xpath("//button[contains(@aria-label, 'Share')]"), Extract::Whole),
        Strategy::count("shares.script", Locate::Script(SHARES_SCRIPT), phrase("share", false)),
    ],
    default: ZERO_COUNT,
});

/// The strategy table used for `field`.
pub fn cascade_for(field: Field) -> &'static FieldCascade {
    match field {
        Field::Author => &AUTHOR,
        Field::Views => &VIEWS,
        Field::Upvotes => &UPVOTES,
        Field::Comments => &COMMENTS,
        Field::Shares => &SHARES,
    }
}

pub async fn extract_author(page: &dyn PageRenderer, settings: &ScrapeSettings) -> String {
    AUTHOR.extract(page, settings).await
}

pub async fn extract_views(page: &dyn PageRenderer, settings: &ScrapeSettings) -> String {
    VIEWS.extract(page, settings).await
}

pub async fn extract_upvotes(page: &dyn PageRenderer, settings: &ScrapeSettings) -> String {
    UPVOTES.extract(page, settings).await
}

pub async fn extract_comments(page: &dyn PageRenderer, settings: &ScrapeSettings) -> String {
    COMMENTS.extract(page, settings).await
}

pub async fn extract_shares(page: &dyn PageRenderer, settings: &ScrapeSettings) -> String {
    SHARES.extract(page, settings).await
}

/// Notices shown in place of an answer removed by moderation.
pub fn deletion_markers() -> [Locator; 3] {
    [
        Locator::xpath("//div[contains(text(), 'Quora deleted this answer')]"),
        Locator::xpath("//div[contains(text(), 'deleted by Quora Moderation')]"),
        Locator::xpath("//div[contains(text(), 'Quora deleted this')]"),
    ]
}

/// Whether the loaded page carries a deletion notice.
///
/// A failed lookup counts as "no notice".
pub async fn is_deleted(page: &dyn PageRenderer, settings: &ScrapeSettings) -> bool {
    for marker in deletion_markers() {
        match page.element_texts(&marker).await {
            Ok(found) if !found.is_empty() => {
                info!(target: "extract.cascade", %marker, "deletion notice found");
                return true;
            }
            Ok(_) => {}
            Err(err) if settings.debug => {
                info!(target: "extract.cascade", %marker, error = %err, "deletion lookup failed");
            }
            Err(err) => {
                debug!(target: "extract.cascade", %marker, error = %err, "deletion lookup failed");
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_count_cascade_defaults_to_zero() {
        for field in [Field::Views, Field::Upvotes, Field::Comments, Field::Shares] {
            let cascade = cascade_for(field);
            assert_eq!(cascade.default, ZERO_COUNT);
            assert_eq!(cascade.field, field);
            assert!(cascade.strategies.iter().all(|s| s.validate == Validate::Count));
        }
        assert_eq!(cascade_for(Field::Author).default, NAME_NOT_FOUND);
    }

    #[test]
    fn strategy_names_are_unique_and_prefixed() {
        for field in [Field::Author, Field::Views, Field::Upvotes, Field::Comments, Field::Shares] {
            let cascade = cascade_for(field);
            let mut names: Vec<_> = cascade.strategies.iter().map(|s| s.name).collect();
            assert!(names.iter().all(|n| n.starts_with(&field.to_string())));
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), cascade.strategies.len());
        }
    }

    #[test]
    fn phrases_capture_counts() {
        let Extract::Phrase(upvotes) = phrase("upvote", true) else {
            panic!("expected phrase extractor");
        };
        let caps = upvotes.captures("View 1,024 upvotes").unwrap();
        assert_eq!(&caps[1], "1,024");

        let Extract::Phrase(shares) = phrase("share", false) else {
            panic!("expected phrase extractor");
        };
        assert_eq!(&shares.captures("3 shares").unwrap()[1], "3");
        assert_eq!(&shares.captures("1 share").unwrap()[1], "1");
    }
}
