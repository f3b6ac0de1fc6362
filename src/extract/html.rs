use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::strategy::{element_text, parse_selector, ById, Css, FieldChain, TextPattern};
use crate::analysis::prediction_label;
use crate::error::ExtractError;
use crate::types::{Countdown, DrawSnapshot, ExtractedRow, NotOpenedCounters, Outcome};

/// History container candidates, most specific first.
const ANCHORS: &[&str] = &["div.result-table#forecast", "#forecast", "div.result-table"];

/// Everything one document says about its feed.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub snapshot: DrawSnapshot,
    /// Document order, most recent draw first.
    pub rows: Vec<ExtractedRow>,
}

struct SnapshotChains {
    period: FieldChain,
    minutes: FieldChain,
    seconds: FieldChain,
    numbers: [FieldChain; 4],
    code: FieldChain,
    big_small: FieldChain,
    odd_even: FieldChain,
    big_odd: FieldChain,
    small_odd: FieldChain,
    small_even: FieldChain,
}

struct RowSelectors {
    anchors: Vec<Selector>,
    row: Selector,
    code_item: Selector,
    code_sum: Selector,
    prediction_token: Selector,
    marker_yes: Selector,
    marker_no: Selector,
}

/// Turns a fetched page into a [`Extraction`]. Build once, reuse for every feed.
pub struct HtmlExtractor {
    chains: SnapshotChains,
    selectors: RowSelectors,
}

fn counter_chain(field: &'static str, id: &str) -> Result<FieldChain, ExtractError> {
    Ok(FieldChain::new(field)
        .then(ById::new(id)?)
        .then(Css::first(&format!(".not-open p#{id}"))?)
        .then(TextPattern::new(&format!(r#"id="{id}"[^>]*>\s*(\d+)"#))?))
}

impl HtmlExtractor {
    pub fn new() -> Result<Self, ExtractError> {
        let chains = SnapshotChains {
            period: FieldChain::new("period")
                .then(ById::new("qishu")?)
                .then(Css::first(".period")?)
                .then(TextPattern::new(r"第\s*(\d+)\s*期")?),
            minutes: FieldChain::new("countdown_minutes")
                .then(Css::nth("#times b", 0)?)
                .then(TextPattern::new(r"(\d+)\s*分\s*\d+\s*秒")?),
            seconds: FieldChain::new("countdown_seconds")
                .then(Css::nth("#times b", 1)?)
                .then(TextPattern::new(r"\d+\s*分\s*(\d+)\s*秒")?),
            numbers: [
                FieldChain::new("num1").then(ById::new("mi-num1")?),
                FieldChain::new("num2").then(ById::new("mi-num2")?),
                FieldChain::new("num3").then(ById::new("mi-num3")?),
                FieldChain::new("sum").then(ById::new("mi-num4")?),
            ],
            code: FieldChain::new("draw_code").then(Css::first(".number")?),
            big_small: FieldChain::new("big_small")
                .then(ById::new("mi-dx")?)
                .then(Css::first(".result-dxds .dx")?)
                .then(TextPattern::new(r#"class="result-dxds"[^>]*>\s*([大小])"#)?),
            odd_even: FieldChain::new("odd_even")
                .then(ById::new("mi-ds")?)
                .then(Css::first(".result-dxds .ds")?)
                .then(TextPattern::new(r#"class="result-dxds"[^>]*>\s*[大小]?\s*([单双])"#)?),
            big_odd: counter_chain("not_opened_big_odd", "DADAN")?,
            small_odd: counter_chain("not_opened_small_odd", "XIAODAN")?,
            small_even: counter_chain("not_opened_small_even", "XIAOSHUANG")?,
        };

        let selectors = RowSelectors {
            anchors: ANCHORS.iter().map(|a| parse_selector(a)).collect::<Result<_, _>>()?,
            row: parse_selector(".result-tr")?,
            code_item: parse_selector("em.code-item")?,
            code_sum: parse_selector("em.code-sum")?,
            prediction_token: parse_selector("span.yc-yes, span.yc-no")?,
            marker_yes: parse_selector(".yc-yes2")?,
            marker_no: parse_selector(".yc-no2")?,
        };

        Ok(Self { chains, selectors })
    }

    /// Fails only when the history container is missing; every other gap
    /// degrades to an absent field.
    pub fn extract(&self, raw: &str) -> Result<Extraction, ExtractError> {
        let doc = Html::parse_document(raw);

        let anchor = self
            .selectors
            .anchors
            .iter()
            .find_map(|sel| doc.select(sel).next())
            .ok_or_else(|| ExtractError::MissingAnchor { tried: ANCHORS.join(", ") })?;

        let snapshot = self.snapshot(&doc, raw);
        let rows: Vec<ExtractedRow> = anchor
            .select(&self.selectors.row)
            .filter_map(|row| self.history_row(row))
            .collect();

        debug!(period = ?snapshot.period, rows = rows.len(), "document extracted");
        Ok(Extraction { snapshot, rows })
    }

    fn snapshot(&self, doc: &Html, raw: &str) -> DrawSnapshot {
        let c = &self.chains;

        let countdown = match (
            c.minutes.resolve_parsed::<u32>(doc, raw),
            c.seconds.resolve_parsed::<u32>(doc, raw),
        ) {
            (Some(minutes), Some(seconds)) => Some(Countdown { minutes, seconds }),
            _ => None,
        };

        let by_id: Vec<Option<i64>> =
            c.numbers.iter().map(|chain| chain.resolve_parsed(doc, raw)).collect();
        let (numbers, sum) = match by_id.as_slice() {
            [Some(a), Some(b), Some(d), sum] => (Some([*a, *b, *d]), *sum),
            _ => match c.code.resolve(doc, raw).as_deref().and_then(parse_code) {
                Some((draw, sum)) => (Some(draw), Some(sum)),
                None => (None, by_id[3]),
            },
        };

        DrawSnapshot {
            period: c.period.resolve(doc, raw),
            countdown,
            numbers,
            sum,
            big_small: c.big_small.resolve(doc, raw),
            odd_even: c.odd_even.resolve(doc, raw),
            not_opened: NotOpenedCounters {
                big_odd: c.big_odd.resolve_parsed(doc, raw),
                small_odd: c.small_odd.resolve_parsed(doc, raw),
                small_even: c.small_even.resolve_parsed(doc, raw),
            },
        }
    }

    fn history_row(&self, row: ElementRef<'_>) -> Option<ExtractedRow> {
        let s = &self.selectors;
        let cells = row_cells(row);
        if cells.len() < 4 {
            return None;
        }

        let period_text = element_text(cells[0]);
        let period = period_text.parse::<i64>().ok();

        let items: Vec<String> = cells[1].select(&s.code_item).map(element_text).collect();
        let numbers = if items.is_empty() {
            element_text(cells[1])
        } else {
            let sum = cells[1].select(&s.code_sum).map(element_text).collect::<String>();
            if sum.is_empty() {
                items.join("+")
            } else {
                format!("{}={}", items.join("+"), sum)
            }
        };

        let tokens: Vec<String> = cells[2]
            .select(&s.prediction_token)
            .map(|t| {
                let hit = t.value().classes().any(|c| c == "yc-yes");
                format!("{}{}", element_text(t), if hit { "(√)" } else { "(×)" })
            })
            .collect();
        let prediction_raw =
            if tokens.is_empty() { element_text(cells[2]) } else { tokens.join(" ") };
        let prediction = prediction_label(&prediction_raw).to_string();

        let (outcome, outcome_conflict) = self.outcome(cells[3]);
        if outcome_conflict {
            debug!(period = %period_text, outcome = %outcome, "outcome marker and text disagree");
        }

        Some(ExtractedRow {
            period_text,
            period,
            numbers,
            prediction_raw,
            prediction,
            outcome,
            outcome_conflict,
        })
    }

    fn outcome(&self, cell: ElementRef<'_>) -> (Outcome, bool) {
        let s = &self.selectors;
        let html = cell.html();
        let has_class = |name: &str| cell.value().classes().any(|c| c == name);

        let marker = Signal::from_flags(
            has_class("yc-yes2") || cell.select(&s.marker_yes).next().is_some() || html.contains("yc-yes2"),
            has_class("yc-no2") || cell.select(&s.marker_no).next().is_some() || html.contains("yc-no2"),
        );
        let text = element_text(cell);
        let text = Signal::from_flags(text.contains('中'), text.contains('错'));

        resolve_outcome(marker, text)
    }
}

/// Direct `span` children of a history row. Nested spans belong to their cell.
fn row_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "span")
        .collect()
}

/// One independent reading of a row's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Hit,
    Miss,
    /// Saw both hit and miss.
    Ambiguous,
    Absent,
}

impl Signal {
    fn from_flags(yes: bool, no: bool) -> Self {
        match (yes, no) {
            (true, false) => Signal::Hit,
            (false, true) => Signal::Miss,
            (true, true) => Signal::Ambiguous,
            (false, false) => Signal::Absent,
        }
    }

    fn decisive(self) -> Option<Outcome> {
        match self {
            Signal::Hit => Some(Outcome::Hit),
            Signal::Miss => Some(Outcome::Miss),
            _ => None,
        }
    }
}

/// Text wins when decisive, then the marker. Returns the conflict flag alongside.
fn resolve_outcome(marker: Signal, text: Signal) -> (Outcome, bool) {
    let conflict = marker == Signal::Ambiguous
        || text == Signal::Ambiguous
        || matches!((marker.decisive(), text.decisive()), (Some(m), Some(t)) if m != t);
    let outcome = text.decisive().or(marker.decisive()).unwrap_or(Outcome::Pending);
    (outcome, conflict)
}

/// `6+7+1=14` or any four digit groups.
fn parse_code(text: &str) -> Option<([i64; 3], i64)> {
    let parts: Vec<i64> = text
        .split(|c: char| !c.is_ascii_digit())
        .filter(|p| !p.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [a, b, c, sum] => Some(([*a, *b, *c], *sum)),
        _ => None,
    }
}
