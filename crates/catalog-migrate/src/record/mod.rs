//! Catalog record model: the five entity shapes and their text serialization.
//!
//! Each record serializes to one line of PostgreSQL COPY text: field values
//! joined by [`DELIMITER`], with absent optionals emitted as the [`NULL_TOKEN`]
//! sentinel. Column order matches the destination tables exactly.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use uuid::Uuid;

/// Field delimiter for the COPY text stream. Reserved: it cannot occur in any
/// field's canonical text form, so a delimiter inside a field is malformed
/// input and surfaces as a server-side error rather than silent truncation.
pub const DELIMITER: char = '|';

/// Sentinel token representing SQL NULL in the COPY text stream.
pub const NULL_TOKEN: &str = "null";

/// A creative work (film, show, etc.) in the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Work {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub creation_date: Option<NaiveDate>,
    pub certificate: Option<String>,
    pub file_path: Option<String>,
    pub rating: Option<f64>,
    pub kind: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A genre label.
#[derive(Debug, Clone, PartialEq)]
pub struct Genre {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A person involved in works (actor, director, writer, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: Uuid,
    pub full_name: String,
    pub birth_date: Option<NaiveDate>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Join row linking a work to a genre.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkGenre {
    pub id: Uuid,
    pub work_id: Uuid,
    pub genre_id: Uuid,
    pub created_at: Option<DateTime<Utc>>,
}

/// Join row linking a work to a person in a given role.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkPerson {
    pub id: Uuid,
    pub work_id: Uuid,
    pub person_id: Uuid,
    pub role: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Closed set of catalog record kinds.
///
/// Each variant knows its destination column order and how to serialize its
/// fields into a COPY text line.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Work(Work),
    Genre(Genre),
    Person(Person),
    WorkGenre(WorkGenre),
    WorkPerson(WorkPerson),
}

impl Record {
    /// Destination column names, in serialization order.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Record::Work(_) => CatalogTable::Works.columns(),
            Record::Genre(_) => CatalogTable::Genres.columns(),
            Record::Person(_) => CatalogTable::People.columns(),
            Record::WorkGenre(_) => CatalogTable::WorkGenres.columns(),
            Record::WorkPerson(_) => CatalogTable::WorkPeople.columns(),
        }
    }

    /// Serialized field values, one text per column.
    pub fn fields(&self) -> Vec<String> {
        match self {
            Record::Work(w) => vec![
                w.id.to_string(),
                escape_text(&w.title),
                opt_text(&w.description),
                opt_date(&w.creation_date),
                opt_text(&w.certificate),
                opt_text(&w.file_path),
                opt_f64(&w.rating),
                escape_text(&w.kind),
                opt_timestamp(&w.created_at),
                opt_timestamp(&w.updated_at),
            ],
            Record::Genre(g) => vec![
                g.id.to_string(),
                escape_text(&g.name),
                opt_text(&g.description),
                opt_timestamp(&g.created_at),
                opt_timestamp(&g.updated_at),
            ],
            Record::Person(p) => vec![
                p.id.to_string(),
                escape_text(&p.full_name),
                opt_date(&p.birth_date),
                opt_timestamp(&p.created_at),
                opt_timestamp(&p.updated_at),
            ],
            Record::WorkGenre(wg) => vec![
                wg.id.to_string(),
                wg.work_id.to_string(),
                wg.genre_id.to_string(),
                opt_timestamp(&wg.created_at),
            ],
            Record::WorkPerson(wp) => vec![
                wp.id.to_string(),
                wp.work_id.to_string(),
                wp.person_id.to_string(),
                escape_text(&wp.role),
                opt_timestamp(&wp.created_at),
            ],
        }
    }

    /// Append this record as one COPY text line to `buf`.
    pub fn write_line(&self, buf: &mut String) {
        let fields = self.fields();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                buf.push(DELIMITER);
            }
            buf.push_str(field);
        }
        buf.push('\n');
    }

    /// Serialize to a single owned line. Convenience for tests and one-offs.
    pub fn to_line(&self) -> String {
        let mut buf = String::new();
        self.write_line(&mut buf);
        buf
    }
}

/// The five catalog tables, with their fixed load order and column lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogTable {
    Works,
    Genres,
    People,
    WorkGenres,
    WorkPeople,
}

impl CatalogTable {
    /// Load order respecting referential dependencies: parent tables first,
    /// link tables last.
    pub const LOAD_ORDER: [CatalogTable; 5] = [
        CatalogTable::Works,
        CatalogTable::Genres,
        CatalogTable::People,
        CatalogTable::WorkGenres,
        CatalogTable::WorkPeople,
    ];

    /// Table name, identical in source and destination.
    pub fn name(self) -> &'static str {
        match self {
            CatalogTable::Works => "work",
            CatalogTable::Genres => "genre",
            CatalogTable::People => "person",
            CatalogTable::WorkGenres => "work_genre",
            CatalogTable::WorkPeople => "work_person",
        }
    }

    /// Column names in destination order.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            CatalogTable::Works => &[
                "id",
                "title",
                "description",
                "creation_date",
                "certificate",
                "file_path",
                "rating",
                "kind",
                "created_at",
                "updated_at",
            ],
            CatalogTable::Genres => &["id", "name", "description", "created_at", "updated_at"],
            CatalogTable::People => &["id", "full_name", "birth_date", "created_at", "updated_at"],
            CatalogTable::WorkGenres => &["id", "work_id", "genre_id", "created_at"],
            CatalogTable::WorkPeople => &["id", "work_id", "person_id", "role", "created_at"],
        }
    }

    /// True for join tables that reference the parent tables.
    pub fn is_link(self) -> bool {
        matches!(self, CatalogTable::WorkGenres | CatalogTable::WorkPeople)
    }
}

impl std::fmt::Display for CatalogTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Serialize an optional text field: absent or empty emits the NULL sentinel.
fn opt_text(value: &Option<String>) -> String {
    match value.as_deref() {
        Some(s) if !s.is_empty() => escape_text(s),
        _ => NULL_TOKEN.to_string(),
    }
}

fn opt_date(value: &Option<NaiveDate>) -> String {
    match value {
        Some(d) => d.format("%Y-%m-%d").to_string(),
        None => NULL_TOKEN.to_string(),
    }
}

fn opt_timestamp(value: &Option<DateTime<Utc>>) -> String {
    match value {
        Some(ts) => ts.to_rfc3339_opts(SecondsFormat::Micros, true),
        None => NULL_TOKEN.to_string(),
    }
}

fn opt_f64(value: &Option<f64>) -> String {
    match value {
        Some(n) => n.to_string(),
        None => NULL_TOKEN.to_string(),
    }
}

/// Escape special characters for the COPY text format.
///
/// The delimiter is intentionally left untouched: a stray delimiter in a
/// field must be reported by the server, not papered over.
fn escape_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '\t' => result.push_str("\\t"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_work() -> Work {
        Work {
            id: Uuid::parse_str("3d825f60-9fff-4dfe-b294-1a45fa1e115d").unwrap(),
            title: "Star Wars".to_string(),
            description: Some("A long time ago".to_string()),
            creation_date: NaiveDate::from_ymd_opt(1977, 5, 25),
            certificate: None,
            file_path: None,
            rating: Some(8.6),
            kind: "movie".to_string(),
            created_at: Utc.with_ymd_and_hms(2021, 6, 16, 20, 14, 9).single(),
            updated_at: Utc.with_ymd_and_hms(2021, 6, 16, 20, 14, 9).single(),
        }
    }

    #[test]
    fn work_line_follows_column_order() {
        let record = Record::Work(sample_work());
        let line = record.to_line();
        let fields: Vec<&str> = line.trim_end_matches('\n').split(DELIMITER).collect();
        assert_eq!(fields.len(), record.columns().len());
        assert_eq!(fields[0], "3d825f60-9fff-4dfe-b294-1a45fa1e115d");
        assert_eq!(fields[1], "Star Wars");
        assert_eq!(fields[3], "1977-05-25");
        assert_eq!(fields[6], "8.6");
        assert_eq!(fields[7], "movie");
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn absent_rating_serializes_as_null_token() {
        let mut work = sample_work();
        work.rating = None;
        work.certificate = None;
        let line = Record::Work(work).to_line();
        let fields: Vec<&str> = line.trim_end_matches('\n').split(DELIMITER).collect();
        assert_eq!(fields[4], NULL_TOKEN);
        assert_eq!(fields[6], NULL_TOKEN);
    }

    #[test]
    fn zero_rating_is_not_null() {
        let mut work = sample_work();
        work.rating = Some(0.0);
        let line = Record::Work(work).to_line();
        let fields: Vec<&str> = line.trim_end_matches('\n').split(DELIMITER).collect();
        assert_eq!(fields[6], "0");
    }

    #[test]
    fn empty_description_serializes_as_null_token() {
        let mut work = sample_work();
        work.description = Some(String::new());
        let fields = Record::Work(work).fields();
        assert_eq!(fields[2], NULL_TOKEN);
    }

    #[test]
    fn genre_line_round_trips() {
        let genre = Genre {
            id: Uuid::parse_str("120a21cf-9097-479e-904a-13dd7198c1dd").unwrap(),
            name: "Action".to_string(),
            description: None,
            created_at: Utc.with_ymd_and_hms(2021, 6, 16, 20, 14, 9).single(),
            updated_at: None,
        };
        let line = Record::Genre(genre.clone()).to_line();
        let fields: Vec<&str> = line.trim_end_matches('\n').split(DELIMITER).collect();

        // Reconstruct and compare field by field through the null sentinel.
        let parsed = Genre {
            id: Uuid::parse_str(fields[0]).unwrap(),
            name: fields[1].to_string(),
            description: (fields[2] != NULL_TOKEN).then(|| fields[2].to_string()),
            created_at: (fields[3] != NULL_TOKEN)
                .then(|| fields[3].parse::<DateTime<Utc>>().unwrap()),
            updated_at: (fields[4] != NULL_TOKEN)
                .then(|| fields[4].parse::<DateTime<Utc>>().unwrap()),
        };
        assert_eq!(parsed, genre);
    }

    #[test]
    fn uuid_serializes_lowercase_hyphenated() {
        let link = WorkGenre {
            id: Uuid::parse_str("FD32D576-79B2-4B8A-AD92-7FCBAFD9DFEE").unwrap(),
            work_id: Uuid::nil(),
            genre_id: Uuid::nil(),
            created_at: None,
        };
        let fields = Record::WorkGenre(link).fields();
        assert_eq!(fields[0], "fd32d576-79b2-4b8a-ad92-7fcbafd9dfee");
    }

    #[test]
    fn escape_preserves_control_characters() {
        assert_eq!(escape_text("plain"), "plain");
        assert_eq!(escape_text("tab\there"), "tab\\there");
        assert_eq!(escape_text("new\nline"), "new\\nline");
        assert_eq!(escape_text("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn escape_leaves_delimiter_alone() {
        // A delimiter inside a field is malformed input; it must reach the
        // server verbatim so the load fails loudly.
        assert_eq!(escape_text("bad|title"), "bad|title");
    }

    #[test]
    fn load_order_puts_links_last() {
        let order = CatalogTable::LOAD_ORDER;
        let first_link = order.iter().position(|t| t.is_link()).unwrap();
        assert!(order[..first_link].iter().all(|t| !t.is_link()));
        assert!(order[first_link..].iter().all(|t| t.is_link()));
        assert_eq!(order.len(), 5);
    }

    #[test]
    fn columns_match_record_fields() {
        for table in CatalogTable::LOAD_ORDER {
            assert!(!table.columns().is_empty(), "{table} has no columns");
        }
        let work = Record::Work(sample_work());
        assert_eq!(work.fields().len(), work.columns().len());
    }
}
