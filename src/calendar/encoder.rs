use crate::unf_portal::model::{EventRecord, LocationFeed};
use crate::unf_portal::normalize::parse_date;
use chrono::{Duration, NaiveDateTime, NaiveTime, Utc};
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

/// Wall-clock hour used when a row carries no parseable time.
pub const DEFAULT_START_HOUR: u32 = 18;
/// The portal never shows an end time; every event gets this length.
pub const DEFAULT_DURATION_HOURS: i64 = 2;

const PRODID: &str = "-//UNF Export//UNF Events to ICS//EN";
const TZID: &str = "Europe/Copenhagen";

/// RFC 5545 octet budget per physical line, continuation space included.
const FOLD_LIMIT: usize = 75;

/// Both DST transitions as recurrence rules, valid for every year.
const VTIMEZONE_EUROPE_COPENHAGEN: [&str; 18] = [
    "BEGIN:VTIMEZONE",
    "TZID:Europe/Copenhagen",
    "X-LIC-LOCATION:Europe/Copenhagen",
    "BEGIN:DAYLIGHT",
    "TZOFFSETFROM:+0100",
    "TZOFFSETTO:+0200",
    "TZNAME:CEST",
    "DTSTART:19700329T020000",
    "RRULE:FREQ=YEARLY;BYMONTH=3;BYDAY=-1SU",
    "END:DAYLIGHT",
    "BEGIN:STANDARD",
    "TZOFFSETFROM:+0200",
    "TZOFFSETTO:+0100",
    "TZNAME:CET",
    "DTSTART:19701025T030000",
    "RRULE:FREQ=YEARLY;BYMONTH=10;BYDAY=-1SU",
    "END:STANDARD",
    "END:VTIMEZONE",
];

lazy_static! {
    static ref TIME_PARTS: Regex = Regex::new(r"(\d{1,2}):(\d{2})").unwrap();
    static ref DEFAULT_START: NaiveTime =
        NaiveTime::from_hms_opt(DEFAULT_START_HOUR, 0, 0).expect("valid default start time");
    static ref UID_NAMESPACE: Uuid = Uuid::new_v5(&Uuid::NAMESPACE_DNS, b"frivillig.unf.dk");
}

/// Renders one location's feed as a complete RFC 5545 document: CRLF
/// terminated, folded to 75 octets, with a trailing CRLF after
/// `END:VCALENDAR`. Rows without a resolvable date are left out silently.
pub fn encode_calendar(feed: &LocationFeed) -> String {
    let calendar_name = feed.location.calendar_name();
    let timestamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();

    let mut lines: Vec<String> = vec![
        "BEGIN:VCALENDAR".to_string(),
        format!("PRODID:{PRODID}"),
        "VERSION:2.0".to_string(),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
        format!("X-WR-CALNAME:{}", escape_text(&calendar_name)),
        format!("X-WR-TIMEZONE:{TZID}"),
    ];
    lines.extend(VTIMEZONE_EUROPE_COPENHAGEN.iter().map(|line| line.to_string()));

    for record in &feed.records {
        let Some(start) = local_start(record) else {
            continue;
        };
        let end = start + Duration::hours(DEFAULT_DURATION_HOURS);

        let mut event = vec![
            "BEGIN:VEVENT".to_string(),
            format!("UID:{}", uid_for(record, &calendar_name)),
            format!("DTSTAMP:{timestamp}"),
            format!("DTSTART;TZID={TZID}:{}", format_local(start)),
            format!("DTEND;TZID={TZID}:{}", format_local(end)),
            format!("SUMMARY:{}", escape_text(&record.title)),
        ];
        if !record.url.is_empty() {
            event.push(format!("URL:{}", escape_text(&record.url)));
        }
        event.push(format!("DESCRIPTION:{}", description_for(record)));
        event.push(
            if record.cancelled {
                "STATUS:CANCELLED"
            } else {
                "STATUS:CONFIRMED"
            }
            .to_string(),
        );
        event.push("TRANSP:OPAQUE".to_string());
        event.push("END:VEVENT".to_string());
        lines.extend(event);
    }

    lines.push("END:VCALENDAR".to_string());
    lines.iter().map(|line| fold_line(line)).join("\r\n") + "\r\n"
}

/// ICS text escaping; backslashes first so the later substitutions cannot
/// double-escape their own output.
pub fn escape_text(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace(',', "\\,")
        .replace(';', "\\;")
}

/// Re-wraps one logical line so no physical line exceeds the 75-octet
/// budget. Continuation lines start with a single space that counts against
/// their budget; split points back off to UTF-8 code-point boundaries.
pub fn fold_line(line: &str) -> String {
    if line.len() <= FOLD_LIMIT {
        return line.to_string();
    }

    let mut folded = String::with_capacity(line.len() + 8);
    let mut rest = line;
    let mut first = true;
    while !rest.is_empty() {
        let budget = if first { FOLD_LIMIT } else { FOLD_LIMIT - 1 };
        let mut end = budget.min(rest.len());
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if !first {
            folded.push_str("\r\n ");
        }
        folded.push_str(&rest[..end]);
        rest = &rest[end..];
        first = false;
    }
    folded
}

/// Start of the event in Copenhagen wall-clock time, or `None` when the row
/// has no concrete day. Unparseable times fall back to the default hour.
fn local_start(record: &EventRecord) -> Option<NaiveDateTime> {
    let date = parse_date(&record.date)?;
    let time = TIME_PARTS
        .captures(&record.time)
        .and_then(|parts| {
            NaiveTime::from_hms_opt(parts[1].parse().ok()?, parts[2].parse().ok()?, 0)
        })
        .unwrap_or(*DEFAULT_START);
    Some(date.and_time(time))
}

fn format_local(moment: NaiveDateTime) -> String {
    // No trailing Z; the TZID parameter carries the zone.
    moment.format("%Y%m%dT%H%M%S").to_string()
}

/// Stable name-based UID so re-publishing unchanged data never churns
/// subscribers.
fn uid_for(record: &EventRecord, calendar_name: &str) -> String {
    let key = format!(
        "{}|{}|{}|{}|{}",
        calendar_name, record.url, record.title, record.date, record.time
    );
    format!("unf-{}@unf", Uuid::new_v5(&UID_NAMESPACE, key.as_bytes()))
}

fn description_for(record: &EventRecord) -> String {
    let mut parts = vec![
        format!("Vagter: {}", record.shift_count),
        format!("Reserverede: {}", record.reserved_count),
    ];
    if !record.url.is_empty() {
        parts.push(format!("URL: {}", record.url));
    }
    parts.iter().map(|part| escape_text(part)).join("\\n")
}
