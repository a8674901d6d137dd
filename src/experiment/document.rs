//! Document Model for scan data
//!
//! Implements the Bluesky-style document model the dichroism pipeline consumes
//! and emits. Documents provide:
//!
//! - **StartDoc**: Run intent, metadata and plotting hints
//! - **DescriptorDoc**: Schema for one data stream
//! - **EventDoc**: Readings at each point
//! - **StopDoc**: Completion status and summary
//!
//! # Document Flow
//!
//! ```text
//! StartDoc (1)
//!    │
//!    ├── DescriptorDoc (1+, one per data stream)
//!    │       │
//!    │       └── EventDoc (N, measurements)
//!    │
//! StopDoc (1)
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Generate a new unique document ID
pub fn new_uid() -> String {
    Uuid::new_v4().to_string()
}

/// Current timestamp in nanoseconds since Unix epoch
pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

/// Document types for scan data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Document {
    /// Run start
    Start(StartDoc),
    /// Stream schema
    Descriptor(DescriptorDoc),
    /// Readings
    Event(EventDoc),
    /// Run end
    Stop(StopDoc),
}

impl Document {
    /// Get the document UID
    pub fn uid(&self) -> &str {
        match self {
            Document::Start(d) => &d.uid,
            Document::Descriptor(d) => &d.uid,
            Document::Event(d) => &d.uid,
            Document::Stop(d) => &d.uid,
        }
    }

    /// Get the run UID this document belongs to
    pub fn run_uid(&self) -> &str {
        match self {
            Document::Start(d) => &d.uid, // Start doc UID is the run UID
            Document::Descriptor(d) => &d.run_uid,
            Document::Event(d) => &d.run_uid,
            Document::Stop(d) => &d.run_uid,
        }
    }

    /// Get the timestamp in nanoseconds
    pub fn timestamp_ns(&self) -> u64 {
        match self {
            Document::Start(d) => d.time_ns,
            Document::Descriptor(d) => d.time_ns,
            Document::Event(d) => d.time_ns,
            Document::Stop(d) => d.time_ns,
        }
    }
}

/// One scanned dimension: the fields that move and the stream they appear in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Moving fields, fastest last
    pub fields: Vec<String>,
    /// Stream the fields are recorded in
    pub stream: String,
}

/// Scan-level hints read by downstream consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hints {
    /// Directive marking the run for specialised processing (e.g. "dichro")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_type: Option<String>,
    /// Scanned dimensions, outermost first
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
}

impl Hints {
    /// First field of the first declared dimension.
    pub fn primary_axis(&self) -> Option<&str> {
        self.dimensions
            .first()
            .and_then(|dim| dim.fields.first())
            .map(String::as_str)
    }
}

/// Start document - emitted at the beginning of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartDoc {
    /// Unique run identifier (this IS the run_uid)
    pub uid: String,
    /// Plan type that generated this run
    pub plan_type: String,
    /// User-friendly plan name
    pub plan_name: String,
    /// User-provided metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Visualization and processing hints
    #[serde(default)]
    pub hints: Hints,
    /// Timestamp when run started
    pub time_ns: u64,
}

impl StartDoc {
    /// New run with a fresh uid.
    pub fn new(plan_type: &str, plan_name: &str) -> Self {
        Self {
            uid: new_uid(),
            plan_type: plan_type.to_string(),
            plan_name: plan_name.to_string(),
            metadata: HashMap::new(),
            hints: Hints::default(),
            time_ns: now_ns(),
        }
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Set the `scan_type` hint.
    pub fn with_scan_type(mut self, scan_type: &str) -> Self {
        self.hints.scan_type = Some(scan_type.to_string());
        self
    }

    /// Append a scanned dimension.
    pub fn with_dimension(mut self, fields: &[&str], stream: &str) -> Self {
        self.hints.dimensions.push(Dimension {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            stream: stream.to_string(),
        });
        self
    }
}

/// Descriptor document - defines schema for event data
///
/// Each descriptor defines a "data stream" with named fields. A run can have
/// multiple descriptors (e.g., "primary" for main data, "baseline" for
/// background readings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorDoc {
    /// Unique descriptor ID
    pub uid: String,
    /// Links to StartDoc
    pub run_uid: String,
    /// Stream name (e.g., "primary", "baseline", "monitor")
    pub name: String,
    /// Schema for data fields
    pub data_keys: HashMap<String, DataKey>,
    /// Device configuration at descriptor creation time
    #[serde(default)]
    pub configuration: HashMap<String, String>,
    /// Timestamp
    pub time_ns: u64,
}

impl DescriptorDoc {
    /// New descriptor for stream `name` of `run_uid`.
    pub fn new(run_uid: &str, name: &str) -> Self {
        Self {
            uid: new_uid(),
            run_uid: run_uid.to_string(),
            name: name.to_string(),
            data_keys: HashMap::new(),
            configuration: HashMap::new(),
            time_ns: now_ns(),
        }
    }

    /// Declare a data field.
    pub fn with_data_key(mut self, name: &str, key: DataKey) -> Self {
        self.data_keys.insert(name.to_string(), key);
        self
    }

    /// Add a configuration entry.
    pub fn with_config(mut self, key: &str, value: &str) -> Self {
        self.configuration.insert(key.to_string(), value.to_string());
        self
    }
}

/// Schema for a data field within events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataKey {
    /// Data type: "number", "integer", "array"
    pub dtype: String,
    /// Shape for arrays (empty for scalars)
    #[serde(default)]
    pub shape: Vec<i32>,
    /// Source device ID
    #[serde(default)]
    pub source: String,
    /// Physical units
    #[serde(default)]
    pub units: String,
}

impl DataKey {
    /// Create a scalar number data key
    pub fn scalar(source: &str, units: &str) -> Self {
        Self {
            dtype: "number".to_string(),
            shape: vec![],
            source: source.to_string(),
            units: units.to_string(),
        }
    }

    /// Create an array data key
    pub fn array(source: &str, shape: Vec<i32>) -> Self {
        Self {
            dtype: "array".to_string(),
            shape,
            source: source.to_string(),
            units: String::new(),
        }
    }
}

/// A single reading carried by an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    /// Single number
    Scalar(f64),
    /// Waveform or image, flattened
    Array(Vec<f64>),
}

impl DataValue {
    /// The value if it is a scalar.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            DataValue::Scalar(v) => Some(*v),
            DataValue::Array(_) => None,
        }
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        DataValue::Scalar(value)
    }
}

impl From<Vec<f64>> for DataValue {
    fn from(values: Vec<f64>) -> Self {
        DataValue::Array(values)
    }
}

/// Event document - actual measurement data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDoc {
    /// Unique event ID
    pub uid: String,
    /// Links to StartDoc (for quick run lookup)
    pub run_uid: String,
    /// Links to DescriptorDoc that defines schema
    pub descriptor_uid: String,
    /// Event sequence number within this descriptor stream
    pub seq_num: u32,
    /// Timestamp
    pub time_ns: u64,
    /// Data values (field name -> value)
    pub data: HashMap<String, DataValue>,
}

impl EventDoc {
    /// New event with no readings.
    pub fn new(run_uid: &str, descriptor_uid: &str, seq_num: u32) -> Self {
        Self {
            uid: new_uid(),
            run_uid: run_uid.to_string(),
            descriptor_uid: descriptor_uid.to_string(),
            seq_num,
            time_ns: now_ns(),
            data: HashMap::new(),
        }
    }

    /// Add one reading.
    pub fn with_datum(mut self, field: &str, value: impl Into<DataValue>) -> Self {
        self.data.insert(field.to_string(), value.into());
        self
    }
}

/// Stop document - emitted at the end of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopDoc {
    /// Unique stop doc ID
    pub uid: String,
    /// Links to StartDoc
    pub run_uid: String,
    /// Exit status: "success", "abort", "fail"
    pub exit_status: String,
    /// Reason for abort/failure
    #[serde(default)]
    pub reason: String,
    /// Timestamp when run ended
    pub time_ns: u64,
    /// Total events emitted
    #[serde(default)]
    pub num_events: u32,
}

impl StopDoc {
    /// Successful completion.
    pub fn success(run_uid: &str, num_events: u32) -> Self {
        Self::with_status(run_uid, "success", "", num_events)
    }

    /// Run aborted, e.g. by the user.
    pub fn abort(run_uid: &str, reason: &str, num_events: u32) -> Self {
        Self::with_status(run_uid, "abort", reason, num_events)
    }

    /// Run failed.
    pub fn fail(run_uid: &str, reason: &str, num_events: u32) -> Self {
        Self::with_status(run_uid, "fail", reason, num_events)
    }

    pub(crate) fn with_status(
        run_uid: &str,
        exit_status: &str,
        reason: &str,
        num_events: u32,
    ) -> Self {
        Self {
            uid: new_uid(),
            run_uid: run_uid.to_string(),
            exit_status: exit_status.to_string(),
            reason: reason.to_string(),
            time_ns: now_ns(),
            num_events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_doc_builder() {
        let doc = StartDoc::new("scan", "XMCD at Fe L3")
            .with_metadata("operator", "Alice")
            .with_scan_type("dichro")
            .with_dimension(&["energy"], "primary");

        assert_eq!(doc.plan_type, "scan");
        assert_eq!(doc.metadata.get("operator"), Some(&"Alice".to_string()));
        assert_eq!(doc.hints.scan_type.as_deref(), Some("dichro"));
        assert_eq!(doc.hints.primary_axis(), Some("energy"));
    }

    #[test]
    fn test_primary_axis_absent() {
        let doc = StartDoc::new("count", "Count").with_dimension(&[], "primary");
        assert_eq!(doc.hints.primary_axis(), None);
        assert_eq!(Hints::default().primary_axis(), None);
    }

    #[test]
    fn test_descriptor_doc() {
        let run_uid = new_uid();
        let desc = DescriptorDoc::new(&run_uid, "primary")
            .with_data_key("monitor", DataKey::scalar("ic0", "counts"))
            .with_data_key("energy", DataKey::scalar("mono", "keV"));

        assert_eq!(desc.name, "primary");
        assert!(desc.data_keys.contains_key("monitor"));
        assert!(desc.data_keys.contains_key("energy"));
    }

    #[test]
    fn test_event_doc() {
        let event = EventDoc::new(&new_uid(), &new_uid(), 0)
            .with_datum("monitor", 10.0)
            .with_datum("spectrum", vec![1.0, 2.0]);

        assert_eq!(event.seq_num, 0);
        assert_eq!(event.data["monitor"].as_scalar(), Some(10.0));
        assert_eq!(event.data["spectrum"].as_scalar(), None);
    }

    #[test]
    fn test_document_json_shape() {
        let start = StartDoc::new("scan", "Scan").with_scan_type("dichro");
        let run_uid = start.uid.clone();
        let json = serde_json::to_string(&Document::Start(start)).unwrap();
        assert!(json.contains("\"type\":\"start\""));

        let doc: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(doc.run_uid(), run_uid);

        let event = r#"{"type":"event","uid":"e","run_uid":"r","descriptor_uid":"d",
            "seq_num":1,"time_ns":5,"data":{"energy":7.1,"roi":[1.0,2.0]}}"#;
        let Document::Event(event) = serde_json::from_str(event).unwrap() else {
            panic!("expected event");
        };
        assert_eq!(event.data["energy"], DataValue::Scalar(7.1));
        assert_eq!(event.data["roi"], DataValue::Array(vec![1.0, 2.0]));
    }

    #[test]
    fn test_stop_constructors() {
        let stop = StopDoc::abort("run", "user", 3);
        assert_eq!(stop.exit_status, "abort");
        assert_eq!(stop.reason, "user");
        assert_eq!(StopDoc::success("run", 1).exit_status, "success");
    }
}
