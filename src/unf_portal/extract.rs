use super::model::EventRecord;
use super::normalize::{normalize_date, normalize_time, to_int};
use super::BASE_URL;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::{HashMap, HashSet};
use tracing::debug;
use url::Url;

/// Substrings of the joined lowercase header that mark a table as an event
/// listing; at least two must be present.
const HEADER_HINTS: [&str; 6] = ["navn", "dato", "klokkesl", "tid", "vagter", "reserverede"];

const NAME_KEYS: [&str; 3] = ["navn", "titel", "title"];
const DATE_KEYS: [&str; 2] = ["dato", "date"];
const TIME_KEYS: [&str; 4] = ["klokkeslæt", "klokkeslaet", "tid", "time"];
const SHIFT_KEYS: [&str; 2] = ["vagter", "vagt"];
const RESERVED_KEYS: [&str; 3] = ["reserverede", "deltagere", "tilmeldte"];

/// Column order of the pipe-text layout when no header row is present.
const PIPE_COLUMN_ORDER: [&str; 9] = [
    "Navn",
    "Dato",
    "Ugedag",
    "Klokkeslæt",
    "Vagter",
    "Reserverede",
    "Pladser",
    "Deltagere",
    "Ekstern/Intern",
];

lazy_static! {
    static ref TABLE: Selector = Selector::parse("table").unwrap();
    static ref HEADER_CELL: Selector = Selector::parse("th").unwrap();
    static ref ROW: Selector = Selector::parse("tr").unwrap();
    static ref DATA_CELL: Selector = Selector::parse("td").unwrap();
    static ref ANCHOR: Selector = Selector::parse("a[href]").unwrap();
    static ref PIPE_SPACING: Regex = Regex::new(r"\s*\|\s*").unwrap();
    static ref BASE: Url = Url::parse(BASE_URL).expect("portal base URL must parse");
}

/// Pulls event rows out of one listing page. The table layout is tried
/// first; only a page with zero table rows falls back to the pipe-text
/// layout, whose rows then get their links backfilled from the page anchors.
pub fn extract_records(document: &Html) -> Vec<EventRecord> {
    let records = extract_from_tables(document);
    if !records.is_empty() {
        return records;
    }

    let mut records = extract_from_pipe_lines(document);
    if !records.is_empty() {
        attach_urls_by_title(&mut records, document);
    }
    records
}

/// Element text the way the portal renders it: text nodes joined by single
/// spaces, outer whitespace stripped.
pub(crate) fn element_text(element: ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn absolutize(href: &str) -> String {
    if href.is_empty() {
        return String::new();
    }
    BASE.join(href)
        .map(|url| url.to_string())
        .unwrap_or_default()
}

fn extract_from_tables(document: &Html) -> Vec<EventRecord> {
    let mut records = Vec::new();

    for table in document.select(&TABLE) {
        let mut header_cells: Vec<String> =
            table.select(&HEADER_CELL).map(element_text).collect();
        if header_cells.is_empty() {
            if let Some(first_row) = table.select(&ROW).next() {
                header_cells = first_row.select(&DATA_CELL).map(element_text).collect();
            }
        }
        if header_cells.is_empty() {
            continue;
        }

        let header: Vec<String> = header_cells
            .iter()
            .map(|cell| cell.to_lowercase())
            .collect();
        let joined = header.join(" ");
        let hits = HEADER_HINTS
            .iter()
            .filter(|hint| joined.contains(*hint))
            .count();
        if hits < 2 {
            debug!(header = %joined, "Skipping table, not an event listing");
            continue;
        }

        let idx_name = index_of(&header, &NAME_KEYS);
        let idx_date = index_of(&header, &DATE_KEYS);
        let idx_time = index_of(&header, &TIME_KEYS);
        let idx_shifts = index_of(&header, &SHIFT_KEYS);
        let idx_reserved = index_of(&header, &RESERVED_KEYS);

        for row in table.select(&ROW) {
            let cells: Vec<ElementRef> = row.select(&DATA_CELL).collect();
            if cells.is_empty() {
                continue;
            }
            let cell_texts: Vec<String> = cells.iter().map(|cell| element_text(*cell)).collect();
            let text_at = |index: Option<usize>| {
                index
                    .and_then(|i| cell_texts.get(i))
                    .cloned()
                    .unwrap_or_default()
            };

            let name_cell = idx_name.and_then(|i| cells.get(i).copied());
            let (url, title) = match name_cell {
                Some(cell) => match cell.select(&ANCHOR).next() {
                    Some(anchor) => (
                        absolutize(anchor.value().attr("href").unwrap_or_default()),
                        element_text(anchor),
                    ),
                    None => (String::new(), text_at(idx_name)),
                },
                None => match row.select(&ANCHOR).next() {
                    Some(anchor) => (
                        absolutize(anchor.value().attr("href").unwrap_or_default()),
                        element_text(anchor),
                    ),
                    None => (String::new(), cell_texts.first().cloned().unwrap_or_default()),
                },
            };

            records.push(EventRecord {
                title: title.trim().to_string(),
                date: normalize_date(&text_at(idx_date)),
                time: normalize_time(&text_at(idx_time)),
                shift_count: to_int(&text_at(idx_shifts)),
                reserved_count: to_int(&text_at(idx_reserved)),
                url,
                cancelled: is_cancelled_row(row, name_cell),
            });
        }
    }

    records
}

// A cancelled row carries rowExternal, danger and one of the footable zebra
// markers as separate class tokens on the row or its name cell. An earlier
// substring match on the joined class string flagged rows that merely
// contained the words, hence the set of individual tokens.
fn is_cancelled_row(row: ElementRef, name_cell: Option<ElementRef>) -> bool {
    let mut tokens: HashSet<String> = row
        .value()
        .classes()
        .map(|class| class.to_lowercase())
        .collect();
    if let Some(cell) = name_cell {
        tokens.extend(cell.value().classes().map(|class| class.to_lowercase()));
    }

    tokens.contains("rowexternal")
        && tokens.contains("danger")
        && (tokens.contains("footable-even") || tokens.contains("footable-odd"))
}

fn index_of(header: &[String], keys: &[&str]) -> Option<usize> {
    keys.iter()
        .find_map(|key| header.iter().position(|cell| cell == key))
}

fn extract_from_pipe_lines(document: &Html) -> Vec<EventRecord> {
    let lines: Vec<String> = document
        .tree
        .nodes()
        .filter_map(|node| match node.value() {
            Node::Text(text) => {
                let trimmed = text.trim();
                (trimmed.contains('|') && trimmed.chars().count() > 10)
                    .then(|| trimmed.to_string())
            }
            _ => None,
        })
        .collect();

    let header: Option<Vec<String>> = lines
        .iter()
        .map(|line| split_pipe_row(line))
        .find(|cells| cells.len() >= 5 && cells[0].eq_ignore_ascii_case("navn"));

    let mut records = Vec::new();
    for line in &lines {
        let cells = split_pipe_row(line);
        if cells.len() < 2 || cells[0].eq_ignore_ascii_case("navn") {
            continue;
        }

        let columns: HashMap<String, String> = match &header {
            Some(names) => names.iter().cloned().zip(cells).collect(),
            None => {
                let mut padded = cells;
                padded.resize(PIPE_COLUMN_ORDER.len().max(padded.len()), String::new());
                PIPE_COLUMN_ORDER
                    .iter()
                    .map(|name| name.to_string())
                    .zip(padded)
                    .collect()
            }
        };
        let column = |name: &str| columns.get(name).cloned().unwrap_or_default();

        let reserved = match column("Reserverede") {
            raw if raw.is_empty() => column("Deltagere"),
            raw => raw,
        };

        // This layout carries neither links nor a cancellation signal.
        records.push(EventRecord {
            title: column("Navn").trim().to_string(),
            date: normalize_date(&column("Dato")),
            time: normalize_time(&column("Klokkeslæt")),
            shift_count: to_int(&column("Vagter")),
            reserved_count: to_int(&reserved),
            url: String::new(),
            cancelled: false,
        });
    }

    records
}

fn split_pipe_row(line: &str) -> Vec<String> {
    let collapsed = PIPE_SPACING.replace_all(line, "|");
    collapsed
        .split('|')
        .map(|cell| cell.trim().to_string())
        .collect()
}

/// Maps each linkless record's lowercase title to the first `/events/`
/// anchor on the page with that exact visible text.
fn attach_urls_by_title(records: &mut [EventRecord], document: &Html) {
    let mut by_title: HashMap<String, String> = HashMap::new();
    for anchor in document.select(&ANCHOR) {
        let text = element_text(anchor);
        let href = absolutize(anchor.value().attr("href").unwrap_or_default());
        if !text.is_empty() && href.contains("/events/") {
            by_title.entry(text.to_lowercase()).or_insert(href);
        }
    }

    for record in records.iter_mut().filter(|record| record.url.is_empty()) {
        if let Some(href) = by_title.get(&record.title.to_lowercase()) {
            record.url = href.clone();
        }
    }
}
