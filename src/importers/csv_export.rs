use csv::StringRecord;

use crate::error::SourceError;

/// A CSV export read into memory. Tracker exports repeat column names
/// (Jira emits one `Labels` column per label), so cells are looked up by
/// header name rather than deserialized into a struct.
pub struct CsvExport {
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl CsvExport {
    pub fn parse(contents: &str) -> Result<Self, SourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(contents.as_bytes());
        let headers = reader.headers()?.clone();
        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
        Ok(Self { headers, rows })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |record| Row {
            headers: &self.headers,
            record,
        })
    }
}

pub struct Row<'a> {
    headers: &'a StringRecord,
    record: &'a StringRecord,
}

impl<'a> Row<'a> {
    /// First non-empty cell under `column`.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.all(column).into_iter().next()
    }

    /// Every non-empty cell under `column`, in column order.
    pub fn all(&self, column: &str) -> Vec<&'a str> {
        self.headers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.eq_ignore_ascii_case(column))
            .filter_map(|(idx, _)| self.record.get(idx))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect()
    }

    pub fn get_or_default(&self, column: &str) -> &'a str {
        self.get(column).unwrap_or_default()
    }
}

/// Split a delimited tag cell ("a, b,c") into trimmed, non-empty names.
pub fn split_list(cell: &str, sep: char) -> Vec<&str> {
    cell.split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_columns_are_all_returned() {
        let csv = "Summary,Labels,Labels,Labels\nFix it,backend,,urgent\n";
        let export = CsvExport::parse(csv).unwrap();
        let row = export.rows().next().unwrap();
        assert_eq!(row.get("summary"), Some("Fix it"));
        assert_eq!(row.all("Labels"), vec!["backend", "urgent"]);
        assert_eq!(row.get("Missing"), None);
        assert_eq!(row.get_or_default("Missing"), "");
    }

    #[test]
    fn short_rows_are_tolerated() {
        let export = CsvExport::parse("A,B,C\n1\n").unwrap();
        let row = export.rows().next().unwrap();
        assert_eq!(row.get("A"), Some("1"));
        assert_eq!(row.get("C"), None);
    }

    #[test]
    fn split_list_trims() {
        assert_eq!(split_list(" a, b ,,c", ','), vec!["a", "b", "c"]);
    }
}
