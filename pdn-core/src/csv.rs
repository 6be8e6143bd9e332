//! Minimal CSV codec: UTF-8, comma-separated, header row, RFC 4180 quoting.

use serde_json::Value;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::OutputError;

/// A parse failure, located by 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvParseError {
    pub line: usize,
    pub message: String,
}

/// Quote a field if it contains a delimiter, quote or line break.
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Text written for one extracted cell.
pub fn cell_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed(""),
        Value::String(text) => Cow::Borrowed(text.as_str()),
        Value::Bool(true) => Cow::Borrowed("true"),
        Value::Bool(false) => Cow::Borrowed("false"),
        Value::Number(n) => Cow::Owned(n.to_string()),
        nested => Cow::Owned(nested.to_string()),
    }
}

/// Write one CSV line.
pub fn write_record<W, I, S>(out: &mut W, fields: I) -> std::io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut first = true;
    for field in fields {
        if !first {
            out.write_all(b",")?;
        }
        first = false;
        out.write_all(escape_field(field.as_ref()).as_bytes())?;
    }
    out.write_all(b"\n")
}

/// Render a header plus JSON-valued rows as CSV text.
pub fn render<C: AsRef<str>>(columns: &[C], rows: &[Vec<Value>]) -> Vec<u8> {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_record(&mut buf, columns.iter().map(|c| c.as_ref()));
    for row in rows {
        let _ = write_record(&mut buf, row.iter().map(cell_text));
    }
    buf
}

/// Write `contents` to `path` through a temporary sibling and a rename, so a
/// reader never observes a half-written file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), OutputError> {
    let tmp = temp_sibling(path);
    std::fs::write(&tmp, contents).map_err(|source| OutputError::Write {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Streaming counterpart of [`write_atomic`]: rows go to a temporary sibling
/// that only replaces `path` on [`AtomicWriter::commit`]. Dropping the writer
/// without committing removes the temporary file.
pub struct AtomicWriter {
    path: PathBuf,
    tmp: PathBuf,
    out: Option<BufWriter<File>>,
}

impl AtomicWriter {
    pub fn create(path: &Path) -> Result<Self, OutputError> {
        let tmp = temp_sibling(path);
        let file = File::create(&tmp).map_err(|source| OutputError::Write {
            path: tmp.clone(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            tmp,
            out: Some(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one CSV line.
    pub fn write_record<I, S>(&mut self, fields: I) -> Result<(), OutputError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let result = match self.out.as_mut() {
            Some(out) => write_record(out, fields),
            None => Ok(()),
        };
        result.map_err(|source| OutputError::Write {
            path: self.tmp.clone(),
            source,
        })
    }

    /// Flush and move the temporary file into place.
    pub fn commit(mut self) -> Result<PathBuf, OutputError> {
        if let Some(mut out) = self.out.take() {
            out.flush().map_err(|source| OutputError::Write {
                path: self.tmp.clone(),
                source,
            })?;
        }
        std::fs::rename(&self.tmp, &self.path).map_err(|source| OutputError::Write {
            path: self.path.clone(),
            source,
        })?;
        Ok(self.path.clone())
    }
}

impl Drop for AtomicWriter {
    fn drop(&mut self) {
        if self.out.take().is_some() {
            let _ = std::fs::remove_file(&self.tmp);
        }
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

/// Parse CSV text into records. The first record is the header.
///
/// Accepts `\n` and `\r\n` line endings and a leading byte-order mark.
/// Blank lines are skipped.
pub fn parse(text: &str) -> Result<Vec<Vec<String>>, CsvParseError> {
    Ok(parse_numbered(text)?
        .into_iter()
        .map(|(_, record)| record)
        .collect())
}

/// Like [`parse`], pairing each record with the 1-based line it starts on.
/// Quoted fields spanning lines are accounted for.
pub fn parse_numbered(text: &str) -> Result<Vec<(usize, Vec<String>)>, CsvParseError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = Vec::new();
    let mut record_line = 1;
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut field_started = false;
    let mut line = 1;
    let mut quote_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if !field_started => {
                in_quotes = true;
                field_started = true;
                quote_line = line;
            }
            '"' => {
                return Err(CsvParseError {
                    line,
                    message: "quote inside an unquoted field".into(),
                });
            }
            ',' => {
                record.push(std::mem::take(&mut field));
                field_started = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                if field_started || !record.is_empty() || !field.is_empty() {
                    record.push(std::mem::take(&mut field));
                    records.push((record_line, std::mem::take(&mut record)));
                }
                field_started = false;
                line += 1;
                record_line = line;
            }
            _ => {
                field.push(c);
                field_started = true;
            }
        }
    }

    if in_quotes {
        return Err(CsvParseError {
            line: quote_line,
            message: "unterminated quoted field".into(),
        });
    }
    if field_started || !record.is_empty() || !field.is_empty() {
        record.push(field);
        records.push((record_line, record));
    }
    Ok(records)
}

/// Read only the header record from `reader`.
///
/// Lines are accumulated until quotes balance, so a quoted header name may
/// span lines. Returns an empty header for empty input.
pub fn read_header<R: BufRead>(mut reader: R) -> std::io::Result<Result<Vec<String>, CsvParseError>> {
    let mut text = String::new();
    loop {
        let read = reader.read_line(&mut text)?;
        let balanced = text.matches('"').count() % 2 == 0;
        if read == 0 || (balanced && !text.trim_start_matches('\u{feff}').trim().is_empty()) {
            break;
        }
    }
    Ok(parse(&text).map(|mut records| {
        if records.is_empty() {
            Vec::new()
        } else {
            records.swap_remove(0)
        }
    }))
}
