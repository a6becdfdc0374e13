//! Record sources for the insertion phase.
//!
//! Records come either from a [`RecordGenerator`] following the schema's
//! generation rules or from a JSON-lines file written by `dbbench generate`.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Write};
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::schema::{FieldGenerator, SchemaFile};
use crate::value::{Record, Value};

/// Characters used for generated strings and table name suffixes.
pub const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Random string of `len` characters from [`ALPHABET`].
pub fn random_string<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Supplier of record batches.
pub trait RecordSource {
    /// Return up to `max` records. An empty batch means the source is exhausted.
    fn next_batch(&mut self, max: usize) -> Result<Vec<Record>>;
}

/// Synthetic records following a schema's generation rules.
pub struct RecordGenerator {
    fields: Vec<(String, FieldGenerator)>,
    rng: StdRng,
}

impl RecordGenerator {
    /// Generator seeded from system entropy.
    pub fn new(schema: &SchemaFile) -> Self {
        Self::with_rng(schema, StdRng::from_entropy())
    }

    /// Reproducible generator.
    pub fn with_seed(schema: &SchemaFile, seed: u64) -> Self {
        Self::with_rng(schema, StdRng::seed_from_u64(seed))
    }

    fn with_rng(schema: &SchemaFile, rng: StdRng) -> Self {
        let fields = schema
            .fields()
            .iter()
            .map(|f| (f.name.clone(), f.generator.clone()))
            .collect();
        Self { fields, rng }
    }

    /// Generate one record.
    pub fn record(&mut self) -> Record {
        let mut record = Record::new();
        for (name, generator) in &self.fields {
            let value = match generator {
                FieldGenerator::Int { min, max } => Value::Int(self.rng.gen_range(*min..=*max)),
                FieldGenerator::String {
                    min_length,
                    max_length,
                } => {
                    let len = self.rng.gen_range(*min_length..=*max_length);
                    Value::Text(random_string(&mut self.rng, len))
                }
            };
            record.insert(name.clone(), value);
        }
        record
    }

    /// Generate `count` records.
    pub fn records(&mut self, count: usize) -> Vec<Record> {
        (0..count).map(|_| self.record()).collect()
    }
}

impl RecordSource for RecordGenerator {
    fn next_batch(&mut self, max: usize) -> Result<Vec<Record>> {
        Ok(self.records(max))
    }
}

/// Records read from a JSON-lines file, one object per line.
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl JsonLinesSource<BufReader<File>> {
    /// Open a data file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> RecordSource for JsonLinesSource<R> {
    fn next_batch(&mut self, max: usize) -> Result<Vec<Record>> {
        let mut batch = Vec::with_capacity(max);
        while batch.len() < max {
            let Some(line) = self.lines.next() else {
                break;
            };
            let line = line?;
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }
            let record: Record = serde_json::from_str(&line).map_err(|e| {
                Error::MalformedRecord(format!("line {}: {}", self.line_no, e))
            })?;
            batch.push(record);
        }
        Ok(batch)
    }
}

/// Write records as JSON lines.
pub fn write_records<'a, W: Write>(
    mut writer: W,
    records: impl IntoIterator<Item = &'a Record>,
) -> Result<()> {
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> SchemaFile {
        SchemaFile::from_json(
            r#"[
                {"name": "id", "types": {"sqlite": "INTEGER"},
                 "generator": {"type": "int", "min": 0, "max": 100}},
                {"name": "name", "types": {"sqlite": "TEXT"},
                 "generator": {"type": "string", "min_length": 3, "max_length": 3}},
                {"name": "label", "types": {"sqlite": "TEXT"},
                 "generator": {"type": "string", "min_length": 15, "max_length": 100}}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_records_follow_bounds() {
        let mut generator = RecordGenerator::with_seed(&schema(), 7);
        for record in generator.records(500) {
            assert_eq!(record.len(), 3);

            let id = record["id"].as_i64().unwrap();
            assert!((0..=100).contains(&id));

            let name = record["name"].as_str().unwrap();
            assert_eq!(name.len(), 3);
            assert!(name.bytes().all(|b| ALPHABET.contains(&b)));

            let label = record["label"].as_str().unwrap();
            assert!((15..=100).contains(&label.len()));
        }
    }

    #[test]
    fn test_seed_is_reproducible() {
        let a = RecordGenerator::with_seed(&schema(), 42).records(10);
        let b = RecordGenerator::with_seed(&schema(), 42).records(10);
        assert_eq!(a, b);
    }

    #[test]
    fn test_generator_never_exhausts() {
        let mut generator = RecordGenerator::with_seed(&schema(), 1);
        assert_eq!(generator.next_batch(4).unwrap().len(), 4);
        assert_eq!(generator.next_batch(4).unwrap().len(), 4);
    }

    #[test]
    fn test_json_lines_round_trip() {
        let records = RecordGenerator::with_seed(&schema(), 3).records(5);
        let mut buffer = Vec::new();
        write_records(&mut buffer, &records).unwrap();

        let mut source = JsonLinesSource::new(buffer.as_slice());
        assert_eq!(source.next_batch(3).unwrap(), records[..3].to_vec());
        assert_eq!(source.next_batch(3).unwrap(), records[3..].to_vec());
        assert!(source.next_batch(3).unwrap().is_empty());
    }

    #[test]
    fn test_json_lines_skips_blank_lines() {
        let data = "{\"id\": 1}\n\n   \n{\"id\": 2}\n";
        let mut source = JsonLinesSource::new(data.as_bytes());
        assert_eq!(source.next_batch(10).unwrap().len(), 2);
    }

    #[test]
    fn test_json_lines_reports_bad_line() {
        let data = "{\"id\": 1}\nnot json\n";
        let mut source = JsonLinesSource::new(data.as_bytes());
        let err = source.next_batch(10).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(msg) if msg.starts_with("line 2")));
    }
}
