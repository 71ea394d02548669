use super::properties::DataFormat;
use crate::{Error, Result};
use bytes::Bytes;
use std::path::PathBuf;
use uuid::Uuid;

/// A payload already staged in blob storage, addressed by an
/// authenticated URL. The primitive source to which all others reduce.
#[derive(Debug, Clone)]
pub struct BlobDescriptor {
    pub path: String,
    /// Uncompressed payload size, or zero when unknown.
    pub raw_size: u64,
    /// Stable id for this ingestion; a fresh one is assigned when absent.
    pub source_id: Option<Uuid>,
}

/// A local file to stage in temp storage and ingest.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    pub path: PathBuf,
    /// Uncompressed payload size, or zero to derive it from the file.
    pub raw_size: u64,
    pub source_id: Option<Uuid>,
}

/// An in-memory payload to stage in temp storage and ingest.
#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    pub data: Bytes,
    /// Basename used when synthesizing the staged blob's name.
    pub name: String,
    /// Set when `data` is already gzip-compressed.
    pub compressed: bool,
    pub source_id: Option<Uuid>,
}

/// An in-memory tabular result set, materialized to CSV for ingestion.
#[derive(Debug, Clone)]
pub struct ResultSetDescriptor {
    pub rows: Vec<Vec<String>>,
    pub name: String,
    pub source_id: Option<Uuid>,
}

/// Synthesize the name a payload is staged under:
/// `{db}__{table}__{basename}__{uuid}.{format}[.gz]`. The gzip suffix is
/// appended only when this client compressed the payload itself.
pub(super) fn blob_name(
    database: &str,
    table: &str,
    basename: &str,
    source_id: Uuid,
    format: DataFormat,
    gzipped: bool,
) -> String {
    let mut name = format!("{database}__{table}__{basename}__{source_id}.{}", format.name());
    if gzipped {
        name.push_str(".gz");
    }
    name
}

/// Gzip a payload in memory.
pub(super) fn gzip(data: &[u8]) -> Result<Bytes> {
    use std::io::Write;

    let mut encoder = flate2::write::GzEncoder::new(
        Vec::with_capacity(data.len() / 2),
        flate2::Compression::default(),
    );
    encoder.write_all(data)?;
    Ok(encoder.finish()?.into())
}

/// Materialize result-set rows as CSV.
pub(super) fn to_csv(rows: &[Vec<String>]) -> Result<Bytes> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush().map_err(Error::Io)?;
    let buf = writer.into_inner().expect("flushed above");
    Ok(buf.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn blob_names_carry_identity_format_and_compression() {
        let source_id = Uuid::new_v4();

        assert_eq!(
            blob_name("db", "events", "data.csv", source_id, DataFormat::Csv, true),
            format!("db__events__data.csv__{source_id}.csv.gz")
        );
        assert_eq!(
            blob_name("db", "events", "part.parquet", source_id, DataFormat::Parquet, false),
            format!("db__events__part.parquet__{source_id}.parquet")
        );
    }

    #[test]
    fn gzip_round_trips() {
        let packed = gzip(b"hello,world\n").unwrap();
        assert_eq!(&packed[..2], &[0x1f, 0x8b]); // gzip magic

        let mut unpacked = String::new();
        flate2::read::GzDecoder::new(&packed[..])
            .read_to_string(&mut unpacked)
            .unwrap();
        assert_eq!(unpacked, "hello,world\n");
    }

    #[test]
    fn result_sets_materialize_as_csv() {
        let rows = vec![
            vec!["a".to_string(), "b 1".to_string()],
            vec!["c,d".to_string(), "e".to_string()],
        ];

        let data = to_csv(&rows).unwrap();
        assert_eq!(&data[..], b"a,b 1\n\"c,d\",e\n");
    }
}
