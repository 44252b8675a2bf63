use std::cmp::Ordering;

use crate::literal::CellValue;
use crate::sheet::Row;

/// Field positions that drive the listening-order sort. A key is only used
/// when its field was requested for this run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortKeys {
    album: Option<usize>,
    disc: Option<usize>,
    track: Option<usize>,
}

impl SortKeys {
    pub fn for_fields(fields: &[String]) -> Self {
        let find = |name: &str| fields.iter().position(|field| field == name);
        Self {
            album: find("album"),
            disc: find("discnumber"),
            track: find("tracknumber"),
        }
    }

    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        if let Some(idx) = self.album {
            let order = album_key(a.values.get(idx)).cmp(album_key(b.values.get(idx)));
            if order != Ordering::Equal {
                return order;
            }
        }
        for idx in [self.disc, self.track].into_iter().flatten() {
            let order = number_key(a.values.get(idx)).cmp(&number_key(b.values.get(idx)));
            if order != Ordering::Equal {
                return order;
            }
        }
        a.new_path.cmp(&b.new_path)
    }
}

fn album_key(value: Option<&CellValue>) -> &str {
    match value {
        Some(CellValue::Text(text)) => text,
        Some(CellValue::List(items)) => items.first().map(String::as_str).unwrap_or(""),
        _ => "",
    }
}

/// Missing or unparseable numbers sort after every real number.
fn number_key(value: Option<&CellValue>) -> (bool, i64) {
    match value.and_then(CellValue::leading_number) {
        Some(n) => (false, n),
        None => (true, 0),
    }
}

pub fn sort_rows(rows: &mut [Row], fields: &[String]) {
    let keys = SortKeys::for_fields(fields);
    rows.sort_by(|a, b| keys.compare(a, b));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn row(path: &str, album: &str, disc: &str, track: &str) -> Row {
        let cell = |text: &str| {
            if text.is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(text.to_string())
            }
        };
        Row {
            original: path.to_string(),
            new_path: path.to_string(),
            values: vec![cell(album), cell(disc), cell(track)],
        }
    }

    #[test]
    fn album_then_numeric_track_order() {
        let names = fields(&["album", "discnumber", "tracknumber"]);
        let mut rows = vec![
            row("z.mp3", "B", "1/2", "2"),
            row("y.mp3", "A", "1/2", "10"),
            row("x.mp3", "A", "1/2", "2"),
        ];
        sort_rows(&mut rows, &names);
        let order: Vec<&str> = rows.iter().map(|r| r.new_path.as_str()).collect();
        assert_eq!(order, vec!["x.mp3", "y.mp3", "z.mp3"]);
    }

    #[test]
    fn disc_dominates_track() {
        let names = fields(&["album", "discnumber", "tracknumber"]);
        let mut rows = vec![row("a.mp3", "A", "2/2", "1"), row("b.mp3", "A", "1", "9")];
        sort_rows(&mut rows, &names);
        assert_eq!(rows[0].new_path, "b.mp3");
    }

    #[test]
    fn unparseable_numbers_sort_last() {
        let names = fields(&["album", "discnumber", "tracknumber"]);
        let mut rows = vec![
            row("a.mp3", "A", "", "bonus"),
            row("b.mp3", "A", "", ""),
            row("c.mp3", "A", "", "3"),
        ];
        sort_rows(&mut rows, &names);
        let order: Vec<&str> = rows.iter().map(|r| r.new_path.as_str()).collect();
        assert_eq!(order, vec!["c.mp3", "a.mp3", "b.mp3"]);
    }

    #[test]
    fn album_compare_is_case_sensitive() {
        let names = fields(&["album", "discnumber", "tracknumber"]);
        let mut rows = vec![row("a.mp3", "b", "", ""), row("b.mp3", "B", "", "")];
        sort_rows(&mut rows, &names);
        assert_eq!(rows[0].new_path, "b.mp3");
    }

    #[test]
    fn unrequested_fields_fall_back_to_path() {
        let names = fields(&["title", "genre", "comment"]);
        let mut rows = vec![row("b.mp3", "A", "1", "1"), row("a.mp3", "Z", "9", "9")];
        sort_rows(&mut rows, &names);
        assert_eq!(rows[0].new_path, "a.mp3");
        assert_eq!(SortKeys::for_fields(&names), SortKeys::default());
    }
}
