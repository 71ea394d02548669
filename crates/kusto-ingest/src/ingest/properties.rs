use crate::{Error, Result};
use std::collections::HashMap;

/// How much per-ingestion status the service reports back.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ReportLevel {
    FailuresOnly,
    None,
    FailuresAndSuccesses,
}

impl serde::Serialize for ReportLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(match self {
            ReportLevel::FailuresOnly => 0,
            ReportLevel::None => 1,
            ReportLevel::FailuresAndSuccesses => 2,
        })
    }
}

/// Where the service reports per-ingestion status.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ReportMethod {
    Queue,
    Table,
    QueueAndTable,
}

impl serde::Serialize for ReportMethod {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(match self {
            ReportMethod::Queue => 0,
            ReportMethod::Table => 1,
            ReportMethod::QueueAndTable => 2,
        })
    }
}

/// Serialization format of an ingested payload.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DataFormat {
    ApacheAvro,
    Avro,
    Csv,
    Json,
    MultiJson,
    Orc,
    Parquet,
    Psv,
    Raw,
    Scsv,
    Sohsv,
    SStream,
    Tsv,
    Tsve,
    Txt,
    W3cLogFile,
}

impl DataFormat {
    /// The service's name for this format, used in blob names and the
    /// `format` ingestion property.
    pub fn name(&self) -> &'static str {
        match self {
            DataFormat::ApacheAvro => "apacheavro",
            DataFormat::Avro => "avro",
            DataFormat::Csv => "csv",
            DataFormat::Json => "json",
            DataFormat::MultiJson => "multijson",
            DataFormat::Orc => "orc",
            DataFormat::Parquet => "parquet",
            DataFormat::Psv => "psv",
            DataFormat::Raw => "raw",
            DataFormat::Scsv => "scsv",
            DataFormat::Sohsv => "sohsv",
            DataFormat::SStream => "sstream",
            DataFormat::Tsv => "tsv",
            DataFormat::Tsve => "tsve",
            DataFormat::Txt => "txt",
            DataFormat::W3cLogFile => "w3clogfile",
        }
    }

    /// Binary formats arrive pre-packed and gain nothing from gzip.
    pub fn is_compressible(&self) -> bool {
        !matches!(
            self,
            DataFormat::ApacheAvro
                | DataFormat::Avro
                | DataFormat::Orc
                | DataFormat::Parquet
                | DataFormat::SStream
        )
    }
}

/// Optional validation the service applies while ingesting.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ValidationOptions {
    DoNotValidate,
    ValidateCsvInputConstantColumns,
    ValidateCsvInputColumnLevelOnly,
}

impl serde::Serialize for ValidationOptions {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(match self {
            ValidationOptions::DoNotValidate => 0,
            ValidationOptions::ValidateCsvInputConstantColumns => 1,
            ValidationOptions::ValidateCsvInputColumnLevelOnly => 2,
        })
    }
}

/// What a validation failure does to the ingestion.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ValidationImplications {
    Fail,
    BestEffort,
}

impl serde::Serialize for ValidationImplications {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(match self {
            ValidationImplications::Fail => 0,
            ValidationImplications::BestEffort => 1,
        })
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, serde::Serialize)]
pub struct ValidationPolicy {
    #[serde(rename = "ValidationOptions")]
    pub options: ValidationOptions,
    #[serde(rename = "ValidationImplications")]
    pub implications: ValidationImplications,
}

/// IngestionProperties describes how an ingested payload should land:
/// target database and table, payload format, and reporting preferences.
#[derive(Debug, Clone)]
pub struct IngestionProperties {
    pub database: String,
    pub table: String,
    pub format: DataFormat,
    pub report_level: ReportLevel,
    pub report_method: ReportMethod,
    /// Ask the service to skip aggregation batching for this payload.
    pub flush_immediately: bool,
    pub validation_policy: Option<ValidationPolicy>,
    /// Extra ingestion properties forwarded verbatim, e.g. mapping
    /// references or creation-time overrides.
    pub additional_properties: HashMap<String, String>,
}

impl IngestionProperties {
    pub fn new(
        database: impl Into<String>,
        table: impl Into<String>,
        format: DataFormat,
    ) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            format,
            report_level: ReportLevel::FailuresOnly,
            report_method: ReportMethod::Queue,
            flush_immediately: false,
            validation_policy: None,
            additional_properties: HashMap::new(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.database.is_empty() {
            return Err(Error::InvalidArgument("database name is empty"));
        }
        if self.table.is_empty() {
            return Err(Error::InvalidArgument("table name is empty"));
        }
        Ok(())
    }
}
