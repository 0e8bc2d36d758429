use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use tidemark_engine::{
    default_templates, ContentExtractor, DateSource, ExtractionResult, TemplateSpec,
    WHOLE_DOCUMENT,
};

fn init_logging() {
    tidemark_logging::initialize_for_tests();
}

fn processing_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
}

fn extractor(min: usize) -> ContentExtractor {
    ContentExtractor::new(&default_templates(), min).unwrap()
}

const BODY: &str = "The quick brown fox jumps over the lazy dog near the riverbank at dawn.";

fn extracted(result: ExtractionResult) -> tidemark_engine::ExtractedItem {
    match result {
        ExtractionResult::Extracted(item) => item,
        other => panic!("expected extracted text, got {other:?}"),
    }
}

#[test]
fn current_template_wins() {
    init_logging();
    let html = format!(
        r#"<html><body><nav>Menu</nav>
        <div class="article-content"><p>{BODY}</p><p>Posted Feb 3, 2025</p></div>
        <article><p>Older layout text that should be ignored entirely here.</p></article>
        </body></html>"#
    );
    let item = extracted(extractor(20).extract(&html, processing_date()));
    assert_eq!(item.strategy, "article-content");
    assert_eq!(item.text, format!("{BODY}\nPosted Feb 3, 2025"));
    assert_eq!(item.date, NaiveDate::from_ymd_opt(2025, 2, 3).unwrap());
    assert_eq!(item.date_source, DateSource::Page);
}

#[test]
fn legacy_only_page_uses_legacy_strategy_not_fallback() {
    init_logging();
    let html = format!(
        r#"<html><body>
        <header>Site banner with lots of navigation words in it</header>
        <article><h2>Sub</h2><p>{BODY}</p></article>
        <footer>Footer links and legal text that the fallback would also keep</footer>
        </body></html>"#
    );
    let item = extracted(extractor(20).extract(&html, processing_date()));
    assert_eq!(item.strategy, "article-tag");
    assert_eq!(item.text, format!("Sub\n{BODY}"));
}

#[test]
fn comment_anchored_block_is_recognised() {
    init_logging();
    let html = format!(
        "<html><body><table><tr><td>Sidebar</td><td>\
         <!-- BEGIN ARTICLE --><p>{BODY}</p><!-- END ARTICLE -->\
         </td></tr></table></body></html>"
    );
    let item = extracted(extractor(20).extract(&html, processing_date()));
    assert_eq!(item.strategy, "article-comment-block");
    assert_eq!(item.text, BODY);
}

#[test]
fn sub_threshold_structural_match_falls_through_to_next_template() {
    init_logging();
    let html = format!(
        r#"<html><body>
        <div class="article-content"><p>Share this</p></div>
        <article><p>{BODY}</p></article>
        </body></html>"#
    );
    let item = extracted(extractor(20).extract(&html, processing_date()));
    assert_eq!(item.strategy, "article-tag");
}

#[test]
fn whole_document_fallback_strips_chrome() {
    init_logging();
    let html = format!(
        r#"<html><head><title>Headline | Site</title><script>var a = 1;</script></head><body>
        <nav>Home About</nav><div id="sidebar">Popular posts</div>
        <div class="story"><p>{BODY}</p></div>
        <footer>Legal</footer></body></html>"#
    );
    let item = extracted(extractor(20).extract(&html, processing_date()));
    assert_eq!(item.strategy, WHOLE_DOCUMENT);
    assert_eq!(item.text, BODY);
    assert_eq!(item.title, "Headline");
    assert_eq!(item.date, processing_date());
    assert_eq!(item.date_source, DateSource::ProcessingDate);
}

#[test]
fn fallback_is_not_used_when_a_template_matched_short_text() {
    init_logging();
    let html = format!(
        r#"<html><body><div class="article-content"><p>Too short</p></div>
        <p>{BODY}</p></body></html>"#
    );
    match extractor(20).extract(&html, processing_date()) {
        ExtractionResult::NoContent { best_effort } => {
            assert_eq!(best_effort.as_deref(), Some("Too short"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn threshold_counts_characters_inclusively() {
    init_logging();
    let html = r#"<div class="article-content">ééééé</div>"#;
    assert!(matches!(
        extractor(5).extract(html, processing_date()),
        ExtractionResult::Extracted(_)
    ));
    assert!(matches!(
        extractor(6).extract(html, processing_date()),
        ExtractionResult::NoContent { .. }
    ));
}

#[test]
fn empty_page_has_no_content_and_no_best_effort() {
    init_logging();
    assert_eq!(
        extractor(20).extract("", processing_date()),
        ExtractionResult::NoContent { best_effort: None }
    );
}

#[test]
fn configured_templates_run_in_order() {
    init_logging();
    let templates = vec![
        TemplateSpec::Css {
            name: "v3".into(),
            selector: "main .body".into(),
        },
        TemplateSpec::Regex {
            name: "v1".into(),
            pattern: r"(?s)<td class=.txt.>(.*?)</td>".into(),
        },
    ];
    let ex = ContentExtractor::new(&templates, 20).unwrap();
    let html = format!(r#"<table><tr><td class="txt">{BODY}</td></tr></table>"#);
    let item = extracted(ex.extract(&html, processing_date()));
    assert_eq!(item.strategy, "v1");
    assert_eq!(item.text, BODY);
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn page_dateline_beats_dates_quoted_in_the_article() {
    init_logging();
    let html = format!(
        r#"<html><body><header><h1>Anniversary</h1><p>March 9, 2025</p></header>
        <div class="article-content"><p>Back on December 7, 1941 the fleet was hit.</p><p>{BODY}</p></div>
        </body></html>"#
    );
    let item = extracted(extractor(20).extract(&html, processing_date()));
    assert_eq!(item.date, ymd(2025, 3, 9));
    assert_eq!(item.date_source, DateSource::Page);
}

#[test]
fn date_markup_beats_everything_else() {
    init_logging();
    let html = format!(
        r#"<html><head><meta property="article:published_time" content="2024-01-05T08:00:00Z"></head>
        <body><p>Updated November 3, 2025</p>
        <div class="article-content"><p>Looking ahead to November 3, 2025.</p><p>{BODY}</p></div>
        </body></html>"#
    );
    let item = extracted(extractor(20).extract(&html, processing_date()));
    assert_eq!(item.date, ymd(2024, 1, 5));
}

#[test]
fn comment_block_dates_are_read_around_the_block() {
    init_logging();
    let html = format!(
        r#"<html><body><p>Posted 2/14/2024</p>
        <!-- begin article --><p>Recalling July 4, 1976.</p><p>{BODY}</p><!-- end article -->
        </body></html>"#
    );
    let item = extracted(extractor(20).extract(&html, processing_date()));
    assert_eq!(item.strategy, "article-comment-block");
    assert_eq!(item.date, ymd(2024, 2, 14));
}

#[test]
fn article_text_date_is_used_when_the_page_has_none() {
    init_logging();
    let html = format!(
        r#"<html><body><h1>Story</h1>
        <div class="article-content"><p>Published June 2, 2023.</p><p>{BODY}</p></div>
        </body></html>"#
    );
    let item = extracted(extractor(20).extract(&html, processing_date()));
    assert_eq!(item.date, ymd(2023, 6, 2));
    assert_eq!(item.date_source, DateSource::Page);
}
