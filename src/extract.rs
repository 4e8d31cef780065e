//! Product card extraction from rendered search pages.
//!
//! Locates the site's card fragments, applies the relevance filter against
//! the query, and pulls structured fields with tolerant fallbacks. A single
//! malformed card never aborts extraction of its siblings.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;
use utoipa::ToSchema;

use anyhow::Context;

pub const BASE_URL: &str = "https://zdravcity.ru";

/// Placeholder used when a card has no readable price.
pub const PRICE_NOT_SPECIFIED: &str = "price not specified";
/// Placeholder used when a card has no category info block.
pub const CATEGORY_NOT_SPECIFIED: &str = "category not specified";

// The site's labels are Russian regardless of UI locale.
const CATEGORY_LABEL: &str = "категория";

// Structural signature of one product card and its sub-elements. These class
// names are a hard dependency on the site's current markup.
static CARD: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.Horizontal_horizontal-wrapper__Df2dg").unwrap());
static TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.Horizontal_horizontal-title__XBc6D").unwrap());
static IMAGE: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
static PRICE: Lazy<Selector> = Lazy::new(|| Selector::parse("div.Price_price__Y1FnU").unwrap());
static INFO_ITEM: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.HorizontalInfoList_list-item__jITg2").unwrap());
static INFO_LABEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.HorizontalInfoList_list-item-label__aV5qZ").unwrap());
static INFO_VALUE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.HorizontalInfoList_list-item-value__Dq5rF").unwrap());

// Leading digit run, spaces allowed as thousands separators ("1 000 ₽").
static PRICE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d\s]*").unwrap());

static BASE: Lazy<Url> = Lazy::new(|| Url::parse(BASE_URL).unwrap());

/// One extracted product listing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductRecord {
    pub name: String,
    pub link: String,
    pub price: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Extraction result for one rendered page.
///
/// `raw_cards` counts cards before the relevance filter; the pagination
/// controller needs it to tell "site ran out of cards" apart from "cards
/// existed but nothing matched".
#[derive(Debug)]
pub struct PageExtraction {
    pub raw_cards: usize,
    pub records: Vec<ProductRecord>,
}

/// Pull every relevant product card out of a rendered page, in DOM order.
pub fn extract_cards(html: &str, query: &str) -> PageExtraction {
    let document = Html::parse_document(html);
    let query_lower = query.to_lowercase();

    let mut raw_cards = 0;
    let mut skipped = 0;
    let mut records = Vec::new();

    for card in document.select(&CARD) {
        raw_cards += 1;
        match extract_card(card, &query_lower) {
            Ok(Some(record)) => records.push(record),
            // Title did not contain the query; filtered, not an error.
            Ok(None) => {}
            Err(e) => {
                skipped += 1;
                warn!("⚠️ skipping malformed card: {e:#}");
            }
        }
    }

    if skipped > 0 {
        warn!("⚠️ {skipped}/{raw_cards} cards on this page failed to parse");
    }

    PageExtraction { raw_cards, records }
}

fn extract_card(card: ElementRef<'_>, query_lower: &str) -> anyhow::Result<Option<ProductRecord>> {
    let title = card
        .select(&TITLE)
        .next()
        .context("card has no title element")?;
    let name = collect_text(title);

    if !name.to_lowercase().contains(query_lower) {
        return Ok(None);
    }

    let href = title
        .value()
        .attr("href")
        .context("title link has no href")?;
    let link = BASE
        .join(href)
        .with_context(|| format!("unresolvable product href {href:?}"))?
        .to_string();

    let image = card
        .select(&IMAGE)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(str::to_string);

    let price = card
        .select(&PRICE)
        .next()
        .map(|el| normalize_price(&collect_text(el)))
        .unwrap_or_else(|| PRICE_NOT_SPECIFIED.to_string());

    Ok(Some(ProductRecord {
        name,
        link,
        price,
        category: find_category(card),
        image,
    }))
}

/// Reduce a raw price like `"1 000 ₽"` to its digits, or the sentinel when
/// no digit run is present.
fn normalize_price(raw: &str) -> String {
    let cleaned = raw.replace('\u{a0}', " ");
    match PRICE_DIGITS.find(&cleaned) {
        Some(m) => m.as_str().chars().filter(|c| !c.is_whitespace()).collect(),
        None => PRICE_NOT_SPECIFIED.to_string(),
    }
}

// First info block whose label mentions the category wins.
fn find_category(card: ElementRef<'_>) -> String {
    for item in card.select(&INFO_ITEM) {
        let label = item.select(&INFO_LABEL).next().map(collect_text);
        let value = item.select(&INFO_VALUE).next().map(collect_text);
        if let (Some(label), Some(value)) = (label, value) {
            if label.to_lowercase().contains(CATEGORY_LABEL) {
                return value;
            }
        }
    }
    CATEGORY_NOT_SPECIFIED.to_string()
}

fn collect_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card_html(title: &str, href: &str, price: Option<&str>, category: Option<&str>) -> String {
        let price_block = price
            .map(|p| format!(r#"<div class="Price_price__Y1FnU">{p}</div>"#))
            .unwrap_or_default();
        let category_block = category
            .map(|c| {
                format!(
                    r#"<div class="HorizontalInfoList_list-item__jITg2">
                         <span class="HorizontalInfoList_list-item-label__aV5qZ">Категория:</span>
                         <span class="HorizontalInfoList_list-item-value__Dq5rF">{c}</span>
                       </div>"#
                )
            })
            .unwrap_or_default();
        format!(
            r#"<div class="Horizontal_horizontal-wrapper__Df2dg">
                 <img src="https://cdn.zdravcity.ru/img/{href}.jpg" />
                 <a class="Horizontal_horizontal-title__XBc6D" href="/product/{href}/">{title}</a>
                 {price_block}
                 {category_block}
               </div>"#
        )
    }

    fn page(cards: &[String]) -> String {
        format!("<html><body>{}</body></html>", cards.concat())
    }

    #[test]
    fn test_extracts_matching_cards_in_dom_order() {
        let html = page(&[
            card_html("Аспирин Кардио таб. №56", "aspirin-cardio", Some("660 ₽"), Some("Лекарства")),
            card_html("Аспирин Экспресс таб. шип. №12", "aspirin-express", Some("350 ₽"), None),
        ]);
        let extraction = extract_cards(&html, "аспирин");

        assert_eq!(extraction.raw_cards, 2);
        assert_eq!(extraction.records.len(), 2);
        assert_eq!(extraction.records[0].name, "Аспирин Кардио таб. №56");
        assert_eq!(extraction.records[1].name, "Аспирин Экспресс таб. шип. №12");
        assert_eq!(
            extraction.records[0].link,
            "https://zdravcity.ru/product/aspirin-cardio/"
        );
    }

    #[test]
    fn test_relevance_filter_is_case_insensitive() {
        let html = page(&[
            card_html("АСПИРИН 500мг", "aspirin-500", Some("120 ₽"), None),
            card_html("Парацетамол 500мг", "paracetamol", Some("80 ₽"), None),
        ]);
        let extraction = extract_cards(&html, "Аспирин");

        assert_eq!(extraction.raw_cards, 2);
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].name, "АСПИРИН 500мг");
    }

    #[test]
    fn test_malformed_card_does_not_abort_siblings() {
        // Middle card has no title element at all.
        let broken = r#"<div class="Horizontal_horizontal-wrapper__Df2dg"><img src="x.jpg"/></div>"#;
        let html = page(&[
            card_html("Аспирин Кардио", "a", Some("660 ₽"), None),
            broken.to_string(),
            card_html("Аспирин Экспресс", "b", Some("350 ₽"), None),
        ]);
        let extraction = extract_cards(&html, "аспирин");

        assert_eq!(extraction.raw_cards, 3);
        assert_eq!(extraction.records.len(), 2);
    }

    #[test]
    fn test_price_with_nbsp_thousands_separator() {
        let html = page(&[card_html("Аспирин Комплекс", "c", Some("1\u{a0}000 ₽"), None)]);
        let extraction = extract_cards(&html, "аспирин");
        assert_eq!(extraction.records[0].price, "1000");
    }

    #[test]
    fn test_missing_price_element_yields_sentinel() {
        let html = page(&[card_html("Аспирин", "d", None, None)]);
        let extraction = extract_cards(&html, "аспирин");
        assert_eq!(extraction.records[0].price, PRICE_NOT_SPECIFIED);
    }

    #[test]
    fn test_digitless_price_text_yields_sentinel() {
        let html = page(&[card_html("Аспирин", "e", Some("Цена по запросу"), None)]);
        let extraction = extract_cards(&html, "аспирин");
        assert_eq!(extraction.records[0].price, PRICE_NOT_SPECIFIED);
    }

    #[test]
    fn test_category_from_labeled_info_block() {
        let html = page(&[card_html("Аспирин", "f", Some("660 ₽"), Some("Лекарственные препараты"))]);
        let extraction = extract_cards(&html, "аспирин");
        assert_eq!(extraction.records[0].category, "Лекарственные препараты");
    }

    #[test]
    fn test_missing_category_yields_sentinel() {
        let html = page(&[card_html("Аспирин", "g", Some("660 ₽"), None)]);
        let extraction = extract_cards(&html, "аспирин");
        assert_eq!(extraction.records[0].category, CATEGORY_NOT_SPECIFIED);
    }

    #[test]
    fn test_unlabeled_info_blocks_are_ignored() {
        let noise = r#"<div class="Horizontal_horizontal-wrapper__Df2dg">
            <a class="Horizontal_horizontal-title__XBc6D" href="/product/h/">Аспирин</a>
            <div class="HorizontalInfoList_list-item__jITg2">
              <span class="HorizontalInfoList_list-item-label__aV5qZ">Производитель:</span>
              <span class="HorizontalInfoList_list-item-value__Dq5rF">Bayer</span>
            </div>
          </div>"#;
        let extraction = extract_cards(&page(&[noise.to_string()]), "аспирин");
        assert_eq!(extraction.records[0].category, CATEGORY_NOT_SPECIFIED);
    }

    #[test]
    fn test_image_is_optional() {
        let no_image = r#"<div class="Horizontal_horizontal-wrapper__Df2dg">
            <a class="Horizontal_horizontal-title__XBc6D" href="/product/i/">Аспирин</a>
          </div>"#;
        let extraction = extract_cards(&page(&[no_image.to_string()]), "аспирин");
        assert!(extraction.records[0].image.is_none());

        let with_image = page(&[card_html("Аспирин", "j", None, None)]);
        let extraction = extract_cards(&with_image, "аспирин");
        assert_eq!(
            extraction.records[0].image.as_deref(),
            Some("https://cdn.zdravcity.ru/img/j.jpg")
        );
    }

    #[test]
    fn test_empty_page_yields_no_cards() {
        let extraction = extract_cards("<html><body><p>ничего</p></body></html>", "аспирин");
        assert_eq!(extraction.raw_cards, 0);
        assert!(extraction.records.is_empty());
    }
}
