// ============================================================
// Layer 4 — Atomic File Loader
// ============================================================
// Reads the interaction file of a dataset:
//
//   <data_path>/<dataset>/<dataset>.inter
//
// The file is delimiter-separated (tab by default) and its
// header names every column together with its type:
//
//   user_id:token   item_id:token   rating:float   timestamp:float
//   1               oolong          5              1609459200
//
// Only the user and item columns are required. Other columns
// are read when their names match the configured fields and
// ignored otherwise.

use std::path::{Path, PathBuf};

use crate::domain::interaction::RawInteraction;
use crate::domain::traits::InteractionSource;
use crate::error::{RecError, RecResult};
use crate::infra::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldType {
    Token,
    Float,
    TokenSeq,
    FloatSeq,
}

#[derive(Debug, Clone)]
struct Column {
    name: String,
    kind: FieldType,
}

impl Column {
    fn parse(header: &str) -> RecResult<Self> {
        let (name, kind) = header.trim().split_once(':').ok_or_else(|| {
            RecError::dataset(format!("header column `{header}` must look like `name:type`"))
        })?;
        let kind = match kind {
            "token"     => FieldType::Token,
            "float"     => FieldType::Float,
            "token_seq" => FieldType::TokenSeq,
            "float_seq" => FieldType::FloatSeq,
            other => {
                return Err(RecError::dataset(format!(
                    "column `{name}` has unknown type `{other}`"
                )))
            }
        };
        Ok(Self { name: name.to_string(), kind })
    }
}

/// Loads `.inter` atomic files.
pub struct AtomicFileLoader {
    path:         PathBuf,
    separator:    u8,
    user_field:   String,
    item_field:   String,
    rating_field: String,
    time_field:   String,
}

impl AtomicFileLoader {
    pub fn new(path: impl Into<PathBuf>, separator: u8) -> Self {
        Self {
            path:         path.into(),
            separator,
            user_field:   "user_id".to_string(),
            item_field:   "item_id".to_string(),
            rating_field: "rating".to_string(),
            time_field:   "timestamp".to_string(),
        }
    }

    pub fn from_config(config: &Config) -> RecResult<Self> {
        let path = config
            .data_path
            .join(&config.dataset)
            .join(format!("{}.inter", config.dataset));
        Ok(Self {
            path,
            separator:    config.field_separator_byte()?,
            user_field:   config.user_id_field.clone(),
            item_field:   config.item_id_field.clone(),
            rating_field: config.rating_field.clone(),
            time_field:   config.time_field.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn locate(&self, columns: &[Column], field: &str, expected: FieldType) -> RecResult<Option<usize>> {
        let Some(idx) = columns.iter().position(|c| c.name == field) else {
            return Ok(None);
        };
        if columns[idx].kind != expected {
            return Err(RecError::dataset(format!(
                "column `{field}` in '{}' must be of type {:?}, found {:?}",
                self.path.display(),
                expected,
                columns[idx].kind
            )));
        }
        Ok(Some(idx))
    }
}

impl InteractionSource for AtomicFileLoader {
    fn load_all(&self) -> RecResult<Vec<RawInteraction>> {
        if !self.path.exists() {
            return Err(RecError::dataset(format!(
                "interaction file '{}' does not exist",
                self.path.display()
            )));
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.separator)
            .has_headers(true)
            .quoting(false)
            .from_path(&self.path)
            .map_err(|e| RecError::dataset(format!("cannot open '{}': {e}", self.path.display())))?;

        let columns = reader
            .headers()
            .map_err(|e| RecError::dataset(format!("cannot read header of '{}': {e}", self.path.display())))?
            .iter()
            .map(Column::parse)
            .collect::<RecResult<Vec<_>>>()?;

        let missing = |field: &str| {
            RecError::dataset(format!(
                "'{}' has no `{field}` column",
                self.path.display()
            ))
        };
        let user_idx   = self.locate(&columns, &self.user_field, FieldType::Token)?
            .ok_or_else(|| missing(&self.user_field))?;
        let item_idx   = self.locate(&columns, &self.item_field, FieldType::Token)?
            .ok_or_else(|| missing(&self.item_field))?;
        let rating_idx = self.locate(&columns, &self.rating_field, FieldType::Float)?;
        let time_idx   = self.locate(&columns, &self.time_field, FieldType::Float)?;

        let mut rows = Vec::new();
        for (n, record) in reader.records().enumerate() {
            // Line numbers are 1-based and the header is line 1
            let line   = n + 2;
            let record = record.map_err(|e| {
                RecError::dataset(format!("{}: line {line}: {e}", self.path.display()))
            })?;

            let user = record.get(user_idx).unwrap_or("").trim();
            let item = record.get(item_idx).unwrap_or("").trim();
            if user.is_empty() || item.is_empty() {
                return Err(RecError::dataset(format!(
                    "{}: line {line}: empty user or item id",
                    self.path.display()
                )));
            }

            let float_at = |idx: Option<usize>| -> RecResult<Option<f64>> {
                let Some(idx) = idx else { return Ok(None) };
                let raw = record.get(idx).unwrap_or("").trim();
                if raw.is_empty() {
                    return Ok(None);
                }
                raw.parse::<f64>().map(Some).map_err(|_| {
                    RecError::dataset(format!(
                        "{}: line {line}: `{raw}` is not a number",
                        self.path.display()
                    ))
                })
            };

            rows.push(RawInteraction {
                user:      user.to_string(),
                item:      item.to_string(),
                rating:    float_at(rating_idx)?,
                timestamp: float_at(time_idx)?,
            });
        }

        tracing::debug!("Read {} rows from '{}'", rows.len(), self.path.display());
        Ok(rows)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_inter(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("toy.inter");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_reads_typed_columns() {
        let temp = TempDir::new().unwrap();
        let path = write_inter(
            &temp,
            "user_id:token\titem_id:token\trating:float\ttimestamp:float\n\
             u1\toolong\t5\t100\n\
             u2\tmatcha\t3.5\t\n",
        );
        let rows = AtomicFileLoader::new(path, b'\t').load_all().unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], RawInteraction::new("u1", "oolong").with_rating(5.0).with_timestamp(100.0));
        assert_eq!(rows[1].rating, Some(3.5));
        assert_eq!(rows[1].timestamp, None);
    }

    #[test]
    fn test_unrelated_columns_are_ignored() {
        let temp = TempDir::new().unwrap();
        let path = write_inter(&temp, "item_id:token\tnote:token_seq\tuser_id:token\ni1\ta b\tu1\n");
        let rows = AtomicFileLoader::new(path, b'\t').load_all().unwrap();
        assert_eq!(rows, vec![RawInteraction::new("u1", "i1")]);
    }

    #[test]
    fn test_missing_file_is_dataset_error() {
        let err = AtomicFileLoader::new("/no/such/file.inter", b'\t').load_all().unwrap_err();
        assert!(matches!(err, RecError::Dataset(_)));
    }

    #[test]
    fn test_missing_item_column_is_dataset_error() {
        let temp = TempDir::new().unwrap();
        let path = write_inter(&temp, "user_id:token\trating:float\nu1\t4\n");
        assert!(matches!(
            AtomicFileLoader::new(path, b'\t').load_all().unwrap_err(),
            RecError::Dataset(_)
        ));
    }

    #[test]
    fn test_bad_number_reports_line() {
        let temp = TempDir::new().unwrap();
        let path = write_inter(&temp, "user_id:token\titem_id:token\trating:float\nu1\ti1\t4\nu2\ti2\tfive\n");
        let err  = AtomicFileLoader::new(path, b'\t').load_all().unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_untyped_header_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = write_inter(&temp, "user_id\titem_id\nu1\ti1\n");
        assert!(AtomicFileLoader::new(path, b'\t').load_all().is_err());
    }

    #[test]
    fn test_ragged_row_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = write_inter(&temp, "user_id:token\titem_id:token\nu1\ti1\textra\n");
        assert!(matches!(
            AtomicFileLoader::new(path, b'\t').load_all().unwrap_err(),
            RecError::Dataset(_)
        ));
    }
}
