/// Listing sections of the volunteer portal, in the order their calendars
/// are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::IntoStaticStr, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Location {
    Kbh,
    Lyngby,
    Aalborg,
    Aarhus,
    Danmark,
    Odense,
}

impl Location {
    pub fn slug(&self) -> &'static str {
        self.into()
    }

    pub fn listing_path(&self) -> String {
        format!("/events/{}/", self.slug())
    }

    pub fn calendar_name(&self) -> String {
        format!("UNF {} Events", self.slug().to_uppercase())
    }

    pub fn file_name(&self) -> String {
        format!("unf_events_{}.ics", self.slug())
    }
}

/// One event row as extracted from a listing page.
///
/// `date` and `time` are already canonical (`YYYY-MM-DD` / `H:MM`), or empty
/// when the source cell could not be read as one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventRecord {
    pub title: String,
    pub date: String,
    pub time: String,
    pub shift_count: u32,
    pub reserved_count: u32,
    pub url: String,
    pub cancelled: bool,
}

impl EventRecord {
    /// Two records are the same event iff their keys match.
    pub fn dedupe_key(&self) -> (String, String) {
        (self.url.clone(), self.title.to_lowercase())
    }
}

/// A location's deduplicated rows, ready for encoding.
#[derive(Debug)]
pub struct LocationFeed {
    pub location: Location,
    pub records: Vec<EventRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test_log::test]
    fn should_derive_slug_paths_and_file_names() {
        assert_eq!(Location::Kbh.slug(), "kbh");
        assert_eq!(Location::Aalborg.listing_path(), "/events/aalborg/");
        assert_eq!(Location::Lyngby.calendar_name(), "UNF LYNGBY Events");
        assert_eq!(Location::Odense.file_name(), "unf_events_odense.ics");
    }

    #[test_log::test]
    fn should_iterate_locations_in_published_order() {
        let slugs: Vec<&str> = Location::iter().map(|l| l.slug()).collect();

        assert_eq!(
            slugs,
            vec!["kbh", "lyngby", "aalborg", "aarhus", "danmark", "odense"]
        );
    }

    #[test_log::test]
    fn records_with_same_url_and_title_should_share_a_key() {
        let a = EventRecord {
            title: "Foredrag".to_string(),
            url: "https://frivillig.unf.dk/events/1/".to_string(),
            ..Default::default()
        };
        let b = EventRecord {
            title: "FOREDRAG".to_string(),
            url: "https://frivillig.unf.dk/events/1/".to_string(),
            date: "2025-06-10".to_string(),
            ..Default::default()
        };

        assert_eq!(a.dedupe_key(), b.dedupe_key());
    }
}
