use std::collections::HashMap;
use std::time::Duration;
use vagtkalender::calendar::encoder::encode_calendar;
use vagtkalender::unf_portal::model::{Location, LocationFeed};
use vagtkalender::unf_portal::walk::{walk_listing, WalkSettings};

const START_URL: &str = "https://frivillig.unf.dk/events/kbh/";

fn table_page(rows: &str, next_href: Option<&str>) -> String {
    let pagination = next_href
        .map(|href| format!(r#"<a rel="next" href="{href}">Næste</a>"#))
        .unwrap_or_default();
    format!(
        r#"<html><body>
          <table>
            <tr><th>Navn</th><th>Dato</th><th>Klokkeslæt</th><th>Vagter</th><th>Reserverede</th></tr>
            {rows}
          </table>
          {pagination}
        </body></html>"#
    )
}

fn settings() -> WalkSettings {
    WalkSettings {
        max_pages: 5,
        page_delay: Duration::ZERO,
    }
}

#[test_log::test(tokio::test)]
async fn walked_records_should_encode_into_one_calendar_per_location() {
    let mut pages = HashMap::new();
    pages.insert(
        START_URL.to_string(),
        table_page(
            r#"<tr class="footable-even">
                 <td><a href="/events/1/">Astro-aften</a></td>
                 <td>2025-06-10</td><td>18:30</td><td>4</td><td>12</td>
               </tr>
               <tr class="rowExternal danger footable-odd">
                 <td><a href="/events/2/">Aflyst foredrag</a></td>
                 <td>11. juni 2025</td><td></td><td>2</td><td>0</td>
               </tr>"#,
            Some("/events/kbh/?page=2"),
        ),
    );
    pages.insert(
        format!("{START_URL}?page=2"),
        table_page(
            // First row repeats page one; only the new one survives the merge.
            r#"<tr class="footable-even">
                 <td><a href="/events/1/">Astro-aften</a></td>
                 <td>2025-06-10</td><td>18:30</td><td>4</td><td>12</td>
               </tr>
               <tr class="footable-odd">
                 <td><a href="/events/3/">Robotdag</a></td>
                 <td>12/06/2025</td><td>10:00</td><td>2</td><td>5</td>
               </tr>"#,
            None,
        ),
    );

    let records = walk_listing(START_URL.to_string(), &settings(), |url| {
        let body = pages.get(&url).cloned();
        async move { body }
    })
    .await;

    assert_eq!(records.len(), 3);

    let ics = encode_calendar(&LocationFeed {
        location: Location::Kbh,
        records,
    });

    assert_eq!(ics.matches("BEGIN:VEVENT").count(), 3);
    assert!(ics.contains("X-WR-CALNAME:UNF KBH Events"));
    assert!(ics.contains("DTSTART;TZID=Europe/Copenhagen:20250610T183000"));
    // The cancelled row had no time cell, so it starts at the default hour.
    assert!(ics.contains("DTSTART;TZID=Europe/Copenhagen:20250611T180000"));
    assert!(ics.contains("DTSTART;TZID=Europe/Copenhagen:20250612T100000"));
    assert_eq!(ics.matches("STATUS:CANCELLED").count(), 1);
    assert_eq!(ics.matches("STATUS:CONFIRMED").count(), 2);
    assert!(ics.ends_with("END:VCALENDAR\r\n"));
}

#[test_log::test(tokio::test)]
async fn a_pipe_layout_location_should_still_produce_a_full_calendar() {
    let page = r#"<html><body>
      <p>Navn | Dato | Ugedag | Klokkeslæt | Vagter | Reserverede</p>
      <p>Astro-aften | 2025-06-10 | tirsdag | 18:30 | 4 | 12</p>
      <a href="/events/1/">Astro-aften</a>
    </body></html>"#;

    let records = walk_listing(START_URL.to_string(), &settings(), |_url| async move {
        Some(page.to_string())
    })
    .await;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].url, "https://frivillig.unf.dk/events/1/");

    let ics = encode_calendar(&LocationFeed {
        location: Location::Lyngby,
        records,
    });

    assert!(ics.contains("SUMMARY:Astro-aften"));
    assert!(ics
        .replace("\r\n ", "")
        .contains("URL:https://frivillig.unf.dk/events/1/"));
}

#[test_log::test(tokio::test)]
async fn a_location_that_never_answers_should_encode_an_empty_calendar() {
    let records = walk_listing(START_URL.to_string(), &settings(), |_url| async move {
        None::<String>
    })
    .await;

    assert!(records.is_empty());

    let ics = encode_calendar(&LocationFeed {
        location: Location::Odense,
        records,
    });

    assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
    assert!(ics.contains("BEGIN:VTIMEZONE"));
    assert!(!ics.contains("BEGIN:VEVENT"));
    assert!(ics.ends_with("END:VCALENDAR\r\n"));
}
