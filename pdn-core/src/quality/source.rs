//! Discovery and loading of per-jurisdiction relation files.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::csv;
use crate::error::{PipelineError, SourceError};

/// Name of the transient column carrying each row's source file.
pub const FILENAME_COLUMN: &str = "filename";

/// One `<input>/<jurisdiction>/<relation file>` found under the input root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationFile {
    pub jurisdiction: String,
    pub path: PathBuf,
}

impl RelationFile {
    /// Text recorded as the row's source file.
    pub fn origin(&self) -> String {
        self.path.display().to_string()
    }

    /// Header record only.
    pub fn header(&self) -> Result<Vec<String>, SourceError> {
        let file = File::open(&self.path).map_err(|source| SourceError::Read {
            path: self.path.clone(),
            source,
        })?;
        let header = csv::read_header(BufReader::new(file)).map_err(|source| SourceError::Read {
            path: self.path.clone(),
            source,
        })?;
        header.map_err(|err| self.csv_error(err))
    }

    /// Whole file as a table. Short rows are padded with empty cells; a row
    /// wider than the header is malformed.
    pub fn load(&self) -> Result<Table, SourceError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| SourceError::Read {
            path: self.path.clone(),
            source,
        })?;
        let mut records = csv::parse_numbered(&text)
            .map_err(|err| self.csv_error(err))?
            .into_iter();
        let columns = records.next().map(|(_, header)| header).unwrap_or_default();
        let mut rows = Vec::new();
        for (line, mut record) in records {
            if record.len() > columns.len() {
                return Err(SourceError::Csv {
                    path: self.path.clone(),
                    line,
                    message: format!(
                        "expected {} fields, found {}",
                        columns.len(),
                        record.len()
                    ),
                });
            }
            record.resize(columns.len(), String::new());
            rows.push(record);
        }
        Ok(Table { columns, rows })
    }

    fn csv_error(&self, err: csv::CsvParseError) -> SourceError {
        SourceError::Csv {
            path: self.path.clone(),
            line: err.line,
            message: err.message,
        }
    }
}

/// Header plus text rows of one CSV file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Find `<input>/*/<file_name>`, ordered by jurisdiction name.
pub fn discover(input_dir: &Path, file_name: &str) -> Result<Vec<RelationFile>, PipelineError> {
    if !input_dir.is_dir() {
        return Err(PipelineError::InputRootMissing {
            path: input_dir.to_path_buf(),
        });
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(input_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path().join(file_name);
        if path.is_file() {
            files.push(RelationFile {
                jurisdiction: entry.file_name().to_string_lossy().into_owned(),
                path,
            });
        }
    }
    files.sort_by(|a, b| a.jurisdiction.cmp(&b.jurisdiction));
    Ok(files)
}

/// Union of column names across headers, in order of first appearance.
pub fn union_columns<'a, I>(headers: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a [String]>,
{
    let mut union: Vec<String> = Vec::new();
    for header in headers {
        for column in header {
            if !union.contains(column) {
                union.push(column.clone());
            }
        }
    }
    union
}

/// Positions of each union column within one file's header.
pub fn projection(union: &[String], header: &[String]) -> Vec<Option<usize>> {
    union
        .iter()
        .map(|column| header.iter().position(|c| c == column))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(dir: &Path, jurisdiction: &str, body: &str) {
        let sub = dir.join(jurisdiction);
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join("s1_ingresos.csv"), body).unwrap();
    }

    #[test]
    fn test_discover_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Zacatecas", "id\n");
        write(dir.path(), "Colima", "id\n");
        std::fs::create_dir_all(dir.path().join("Empty")).unwrap();
        std::fs::write(dir.path().join("stray.csv"), "id\n").unwrap();

        let files = discover(dir.path(), "s1_ingresos.csv").unwrap();
        let names: Vec<_> = files.iter().map(|f| f.jurisdiction.as_str()).collect();
        assert_eq!(names, vec!["Colima", "Zacatecas"]);
    }

    #[test]
    fn test_discover_missing_root() {
        let err = discover(Path::new("/definitely/not/here"), "s1_ingresos.csv").unwrap_err();
        assert!(matches!(err, PipelineError::InputRootMissing { .. }));
    }

    #[test]
    fn test_load_pads_short_rows_and_rejects_wide_rows() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Colima", "id,a,b\n1,2\n");
        let file = &discover(dir.path(), "s1_ingresos.csv").unwrap()[0];
        let table = file.load().unwrap();
        assert_eq!(table.rows[0], vec!["1", "2", ""]);
        assert_eq!(file.header().unwrap(), vec!["id", "a", "b"]);

        write(dir.path(), "Colima", "id,a\n1,2\n3,4,5\n");
        let err = file.load().unwrap_err();
        assert!(matches!(err, SourceError::Csv { line: 3, .. }));
    }

    #[test]
    fn test_wide_row_line_counts_multiline_fields_and_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Colima", "id,a\n1,\"multi\nline\"\n\n3,4,5\n");
        let file = &discover(dir.path(), "s1_ingresos.csv").unwrap()[0];
        let err = file.load().unwrap_err();
        assert!(matches!(err, SourceError::Csv { line: 5, .. }), "{err}");
    }

    #[test]
    fn test_union_and_projection() {
        let a = vec!["id".to_string(), "x".to_string()];
        let b = vec!["y".to_string(), "id".to_string()];
        let union = union_columns([a.as_slice(), b.as_slice()]);
        assert_eq!(union, vec!["id", "x", "y"]);
        assert_eq!(projection(&union, &b), vec![Some(1), None, Some(0)]);
    }
}
