use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use spendscan_core::Money;
use tracing::debug;

use crate::types::{ItemStrategy, LineItem, ParseResult};

/// Lines starting with one of these (case-insensitive) are receipt summary
/// lines and never become items.
pub const SUMMARY_KEYWORDS: [&str; 4] = ["total", "amount", "change", "cash"];

pub const MAX_DESCRIPTION_CHARS: usize = 50;

const CURRENCY_GLYPHS: [char; 5] = ['$', '€', '£', '¥', '₹'];

/// OCR engines routinely read `$` as `S`.
const DOLLAR_MISREAD: char = 'S';

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_period_decimal, r"[0-9]+\.[0-9]{2}");
re!(re_comma_decimal, r"[0-9]+,[0-9]{2}");
re!(re_bare_digits, r"\b[0-9]+\b");
re!(re_number, r"[0-9]+(?:[.,][0-9]+)*");

/// Single-line price patterns, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AmountPattern {
    PeriodDecimal,
    CommaDecimal,
    BareDigits,
}

impl AmountPattern {
    const PRIORITY: [AmountPattern; 3] =
        [AmountPattern::PeriodDecimal, AmountPattern::CommaDecimal, AmountPattern::BareDigits];

    fn regex(self) -> &'static Regex {
        match self {
            AmountPattern::PeriodDecimal => re_period_decimal(),
            AmountPattern::CommaDecimal => re_comma_decimal(),
            AmountPattern::BareDigits => re_bare_digits(),
        }
    }
}

// ── Public extraction API ─────────────────────────────────────────────────────

pub struct Extractor;

impl Extractor {
    /// Extract line items and the grand total from receipt text.
    ///
    /// Never fails: text with nothing recognizable yields an empty item list
    /// and a zero total.
    pub fn extract(text: &str) -> ParseResult {
        let lines = Self::normalize_lines(text);
        let (items, strategy) = Self::extract_items(&lines);
        let total = Self::extract_total(&lines);

        debug!(lines = lines.len(), items = items.len(), %strategy, %total, "parsed receipt text");

        ParseResult { items, total, strategy }
    }

    /// Trimmed, non-empty lines in reading order.
    pub fn normalize_lines(text: &str) -> Vec<&str> {
        text.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
    }

    /// Paired lines first; the single-line patterns only run when pairing
    /// found nothing. The two are never merged.
    fn extract_items(lines: &[&str]) -> (Vec<LineItem>, ItemStrategy) {
        let paired = Self::paired_items(lines);
        if !paired.is_empty() {
            return (paired, ItemStrategy::Paired);
        }
        let single = Self::single_line_items(lines);
        if !single.is_empty() {
            return (single, ItemStrategy::SingleLine);
        }
        (vec![], ItemStrategy::Nothing)
    }

    // ── Paired lines ──────────────────────────────────────────────────────────

    /// Treat each line as a description and the next one as its price.
    /// A successful pair consumes both lines; anything else moves on by one.
    pub fn paired_items(lines: &[&str]) -> Vec<LineItem> {
        let mut items = Vec::new();
        let mut i = 0;
        while i + 1 < lines.len() {
            let (description, price_line) = (lines[i], lines[i + 1]);

            if is_summary_line(description) {
                debug!(line = description, "skipping summary line");
                i += 1;
                continue;
            }

            match parse_amount(price_line) {
                Some(amount) => {
                    items.push(LineItem::new(description, amount));
                    i += 2;
                }
                None => i += 1,
            }
        }
        items
    }

    // ── Single line fallback ──────────────────────────────────────────────────

    pub fn single_line_items(lines: &[&str]) -> Vec<LineItem> {
        lines.iter().filter_map(|line| single_line_item(line)).collect()
    }

    // ── Total ─────────────────────────────────────────────────────────────────

    /// Rightmost number on the first line mentioning "total". A bare "Total"
    /// label takes the line right below it only when that line is nothing but
    /// an amount.
    pub fn extract_total(lines: &[&str]) -> Money {
        lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.to_lowercase().contains("total"))
            .find_map(|(idx, line)| {
                last_number(line)
                    .or_else(|| lines.get(idx + 1).and_then(|next| parse_amount(next)))
            })
            .unwrap_or_else(Money::zero)
    }
}

// ── Line helpers ──────────────────────────────────────────────────────────────

fn is_summary_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    SUMMARY_KEYWORDS.iter().any(|k| lower.starts_with(k))
}

/// The first pattern that matches the line decides: its rightmost match is the
/// price and every match is cut out of the description.
fn single_line_item(line: &str) -> Option<LineItem> {
    if is_summary_line(line) {
        return None;
    }
    let re = AmountPattern::PRIORITY
        .iter()
        .map(|p| p.regex())
        .find(|re| re.is_match(line))?;

    let amount = parse_amount(re.find_iter(line).last()?.as_str())?;
    let stripped = re.replace_all(line, "");
    let description = stripped.trim();
    if description.chars().count() < 2 {
        return None;
    }
    Some(LineItem::new(description, amount))
}

fn last_number(line: &str) -> Option<Money> {
    parse_amount(re_number().find_iter(line).last()?.as_str())
}

// ── Amount parsing ────────────────────────────────────────────────────────────

/// Convert a price token, dropping currency glyphs and the `S` misread.
/// Amounts that do not fit in an `i64` count of cents are noise.
fn parse_amount(raw: &str) -> Option<Money> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != DOLLAR_MISREAD && !CURRENCY_GLYPHS.contains(c))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&normalize_separators(cleaned))
        .ok()
        .map(Money::from_decimal)
        .filter(|amount| amount.to_cents().is_some())
}

/// `1,234.56` → `1234.56`; a trailing `,dd` is a decimal comma, so
/// `2,50` → `2.50` and `1.234,56` → `1234.56`.
fn normalize_separators(s: &str) -> String {
    match s.rfind(',') {
        Some(pos) if is_decimal_comma_tail(&s[pos + 1..]) => {
            let whole = s[..pos].replace(|c: char| c == '.' || c == ',', "");
            format!("{whole}.{}", &s[pos + 1..])
        }
        _ => s.replace(',', ""),
    }
}

fn is_decimal_comma_tail(tail: &str) -> bool {
    tail.len() == 2 && tail.bytes().all(|b| b.is_ascii_digit())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn money(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    fn item(description: &str, amount: &str) -> LineItem {
        LineItem::new(description, money(amount))
    }

    // ── Orchestration ─────────────────────────────────────────────────────────

    #[test]
    fn paired_receipt_with_total_label() {
        let r = Extractor::extract("Coffee\n4.50\nBagel\n3.25\nTotal\n7.75");
        assert_eq!(r.items, vec![item("Coffee", "4.50"), item("Bagel", "3.25")]);
        assert_eq!(r.total, money("7.75"));
        assert_eq!(r.strategy, ItemStrategy::Paired);
    }

    #[test]
    fn comma_decimals_fall_back_to_single_line() {
        let r = Extractor::extract("Bread 2,50\nMilk 1,20");
        assert_eq!(r.items, vec![item("Bread", "2.50"), item("Milk", "1.20")]);
        assert_eq!(r.strategy, ItemStrategy::SingleLine);
        assert_eq!(r.total, Money::zero());
    }

    #[test]
    fn s_misread_of_dollar_is_stripped() {
        let r = Extractor::extract("Juice\nS3.99");
        assert_eq!(r.items, vec![item("Juice", "3.99")]);
    }

    #[test]
    fn missing_total_defaults_to_zero() {
        let r = Extractor::extract("Tea\n2.00");
        assert_eq!(r.items, vec![item("Tea", "2.00")]);
        assert_eq!(r.total, Money::zero());
        assert_eq!(r.total.to_string(), "0.00");
    }

    #[test]
    fn empty_input_yields_empty_result() {
        assert_eq!(Extractor::extract(""), ParseResult::empty());
        assert_eq!(Extractor::extract("\n   \n\t\n"), ParseResult::empty());
    }

    #[test]
    fn no_panic_on_garbage_input() {
        let r = Extractor::extract("!@#$%^&*()\n\0\x01\x02");
        assert!(r.items.is_empty());
        assert_eq!(r.total, Money::zero());
    }

    #[test]
    fn fallback_does_not_run_when_pairs_were_found() {
        // "Soda 1.25" would be a single-line item, but pairing already succeeded.
        let r = Extractor::extract("Coffee\n4.50\nSoda 1.25");
        assert_eq!(r.items, vec![item("Coffee", "4.50")]);
        assert_eq!(r.strategy, ItemStrategy::Paired);
    }

    #[test]
    fn nothing_strategy_when_no_items() {
        let r = Extractor::extract("THANK YOU\nCOME AGAIN");
        assert!(r.items.is_empty());
        assert_eq!(r.strategy, ItemStrategy::Nothing);
    }

    // ── Line normalization ────────────────────────────────────────────────────

    #[test]
    fn normalize_lines_trims_and_drops_blanks() {
        let lines = Extractor::normalize_lines("  Coffee  \n\n   \n 4.50 \r\nBagel\r\n");
        assert_eq!(lines, vec!["Coffee", "4.50", "Bagel"]);
    }

    #[test]
    fn blank_lines_between_pair_are_ignored() {
        let r = Extractor::extract("Coffee\n\n\n4.50\n");
        assert_eq!(r.items, vec![item("Coffee", "4.50")]);
    }

    // ── Paired lines ──────────────────────────────────────────────────────────

    #[test]
    fn paired_skips_header_lines_that_are_not_prices() {
        let r = Extractor::extract("CORNER CAFE\n123 Main St\nCoffee\n4.50");
        assert_eq!(r.items, vec![item("Coffee", "4.50")]);
    }

    #[test]
    fn paired_strips_currency_and_thousands_separators() {
        let lines = ["Laptop", "$1,299.99", "Rent", "€ 850", "Tea", "₹120.50"];
        assert_eq!(
            Extractor::paired_items(&lines),
            vec![item("Laptop", "1299.99"), item("Rent", "850"), item("Tea", "120.50")]
        );
    }

    #[test]
    fn paired_reads_decimal_comma_price() {
        assert_eq!(Extractor::paired_items(&["Bread", "2,50"]), vec![item("Bread", "2.50")]);
    }

    #[test]
    fn paired_rounds_to_two_places() {
        let items = Extractor::paired_items(&["Fuel", "41.2371"]);
        assert_eq!(items[0].amount.to_string(), "41.24");
    }

    #[test]
    fn reserved_keywords_never_become_items() {
        let r = Extractor::extract("Amount Due\n12.00\nChange\n3.00\nCash\n15.00\nTOTAL\n12.00");
        assert!(r.items.is_empty(), "unexpected items: {:?}", r.items);
    }

    #[test]
    fn summary_line_is_skipped_but_next_line_can_pair() {
        // "Total" is skipped alone, then "Gum" pairs with its price.
        let items = Extractor::paired_items(&["Total", "Gum", "0.99"]);
        assert_eq!(items, vec![item("Gum", "0.99")]);
    }

    #[test]
    fn keyword_prefix_swallows_lookalike_descriptions() {
        // Known limitation: the keyword test is a plain prefix match.
        assert!(Extractor::paired_items(&["Cashew nuts", "5.00"]).is_empty());
    }

    #[test]
    fn paired_consumed_lines_are_not_reused() {
        // "4.50" is consumed as Coffee's price, so it never acts as a description.
        let items = Extractor::paired_items(&["Coffee", "4.50", "3.25"]);
        assert_eq!(items, vec![item("Coffee", "4.50")]);
    }

    #[test]
    fn reparsing_items_as_pairs_is_idempotent() {
        for text in ["Coffee\n4.50\nBagel\n3.25\nTotal\n7.75", "Bread 2,50\nMilk 1,20\nCheese wheel 12.99"] {
            let first = Extractor::extract(text);
            assert!(!first.items.is_empty());
            let reformatted: Vec<String> = first
                .items
                .iter()
                .map(|i| format!("{}\n{}", i.description, i.amount))
                .collect();
            let joined = reformatted.join("\n");
            let lines = Extractor::normalize_lines(&joined);
            assert_eq!(Extractor::paired_items(&lines), first.items);
        }
    }

    // ── Single line fallback ──────────────────────────────────────────────────

    #[test]
    fn single_line_period_decimal() {
        assert_eq!(Extractor::single_line_items(&["Sandwich 6.75"]), vec![item("Sandwich", "6.75")]);
    }

    #[test]
    fn single_line_bare_digits() {
        assert_eq!(
            Extractor::single_line_items(&["Parking 5", "Header"]),
            vec![item("Parking", "5.00")]
        );
    }

    #[test]
    fn single_line_period_pattern_outranks_bare_digits() {
        assert_eq!(Extractor::single_line_items(&["Milk 2 1.20"]), vec![item("Milk 2", "1.20")]);
    }

    #[test]
    fn single_line_skips_short_descriptions() {
        let items = Extractor::single_line_items(&["A 5.00", "9.99", "Bread 2.00"]);
        assert_eq!(items, vec![item("Bread", "2.00")]);
    }

    #[test]
    fn single_line_skips_summary_lines() {
        let items = Extractor::single_line_items(&["Bread 2,50", "Total 2,50"]);
        assert_eq!(items, vec![item("Bread", "2.50")]);
    }

    #[test]
    fn single_line_truncates_description() {
        let line = format!("{} 3.00", "Extra long product name ".repeat(4));
        let items = Extractor::single_line_items(&[line.as_str()]);
        assert_eq!(items.len(), 1);
        assert!(items[0].description.chars().count() <= MAX_DESCRIPTION_CHARS);
        assert!(items[0].description.starts_with("Extra long product name"));
    }

    #[test]
    fn single_line_multiple_prices_keep_rightmost_and_drop_the_rest() {
        // Known limitation: the unit price is discarded along with the
        // line total's neighbours.
        assert_eq!(
            Extractor::single_line_items(&["Apples 1.50 4.50"]),
            vec![item("Apples", "4.50")]
        );
        assert_eq!(
            Extractor::single_line_items(&["Soda 2 3"]),
            vec![item("Soda", "3.00")]
        );
    }

    // ── Total ─────────────────────────────────────────────────────────────────

    #[test]
    fn total_takes_rightmost_number() {
        assert_eq!(Extractor::extract_total(&["TOTAL: 2 items $12.34"]), money("12.34"));
    }

    #[test]
    fn total_is_case_insensitive_with_thousands() {
        // Grouped numbers are read whole rather than as their last group.
        assert_eq!(Extractor::extract_total(&["Grand Total $1,234.56"]), money("1234.56"));
    }

    #[test]
    fn total_with_decimal_comma() {
        assert_eq!(Extractor::extract_total(&["Summe / Total 12,34"]), money("12.34"));
    }

    #[test]
    fn total_first_line_wins() {
        assert_eq!(Extractor::extract_total(&["Total 5.00", "Total 9.00"]), money("5.00"));
    }

    #[test]
    fn total_subtotal_line_wins_when_first() {
        // Known limitation: "Subtotal" contains "total" and comes first.
        let lines = ["Subtotal 5.00", "Tax 0.40", "Total 5.40"];
        assert_eq!(Extractor::extract_total(&lines), money("5.00"));
    }

    #[test]
    fn total_label_without_number_keeps_scanning() {
        let lines = ["Total", "Thank you", "Total due 3.00"];
        assert_eq!(Extractor::extract_total(&lines), money("3.00"));
    }

    #[test]
    fn bare_total_label_takes_next_line_only_when_it_is_an_amount() {
        assert_eq!(Extractor::extract_total(&["Total", "$7.75"]), money("7.75"));

        let lines = ["Subtotal", "Tax 0.40", "Total 5.40"];
        assert_eq!(Extractor::extract_total(&lines), money("5.40"));
    }

    #[test]
    fn number_less_subtotal_does_not_steal_the_tax_line() {
        let r = Extractor::extract("Coffee\n4.50\nSubtotal\nTax 0.40\nTotal 4.90");
        assert_eq!(r.items, vec![item("Coffee", "4.50")]);
        assert_eq!(r.total, money("4.90"));
    }

    #[test]
    fn bare_total_label_followed_by_text_keeps_zero() {
        assert_eq!(Extractor::extract_total(&["Subtotal", "Thank you"]), Money::zero());
    }

    #[test]
    fn oversized_total_is_skipped() {
        let lines = ["Total 79228162514264337593543950335", "Total 12.00"];
        assert_eq!(Extractor::extract_total(&lines), money("12.00"));
    }

    #[test]
    fn oversized_prices_are_not_items() {
        let huge = "79228162514264337593543950335";
        let r = Extractor::extract(&format!("A\n{huge}\nB\n{huge}\nTea\n2.00"));
        assert_eq!(r.items, vec![item("Tea", "2.00")]);
        assert_eq!(r.items_sum(), money("2.00"));

        assert!(Extractor::single_line_items(&[format!("Yacht {huge}").as_str()]).is_empty());
    }

    #[test]
    fn total_is_rounded() {
        let total = Extractor::extract_total(&["Total 3.14159"]);
        assert_eq!(total.to_string(), "3.14");
        assert_eq!(total.as_decimal().scale(), 2);
    }

    #[test]
    fn total_ignores_s_misread() {
        assert_eq!(Extractor::extract_total(&["Total S12.50"]), money("12.50"));
    }

    // ── Amount parsing ────────────────────────────────────────────────────────

    #[test]
    fn parse_amount_variants() {
        assert_eq!(parse_amount("4.50"), Some(money("4.50")));
        assert_eq!(parse_amount(" $ 4.50 "), Some(money("4.50")));
        assert_eq!(parse_amount("S3.99"), Some(money("3.99")));
        assert_eq!(parse_amount("1,234"), Some(money("1234")));
        assert_eq!(parse_amount("1.234,56"), Some(money("1234.56")));
        assert_eq!(parse_amount("Milk 1,20"), None);
        assert_eq!(parse_amount("$"), None);
        assert_eq!(parse_amount("SALE"), None);
        assert_eq!(parse_amount("nan"), None);
        assert_eq!(parse_amount("inf"), None);
    }

    #[test]
    fn parse_amount_accepts_scientific_notation() {
        assert_eq!(parse_amount("1e3"), Some(money("1000")));
        assert_eq!(Extractor::paired_items(&["Gift card", "1e3"]), vec![item("Gift card", "1000")]);
    }

    #[test]
    fn parse_amount_rejects_amounts_beyond_cents_range() {
        assert_eq!(parse_amount("79228162514264337593543950335"), None);
        assert_eq!(parse_amount("92233720368547758.07"), Some(money("92233720368547758.07")));
        assert_eq!(parse_amount("92233720368547758.08"), None);
    }

    #[test]
    fn normalize_separators_cases() {
        assert_eq!(normalize_separators("1,234.56"), "1234.56");
        assert_eq!(normalize_separators("2,50"), "2.50");
        assert_eq!(normalize_separators("1,5"), "15");
        assert_eq!(normalize_separators("7.75"), "7.75");
    }
}
