/// ResourceKind is the closed set of ingestion resource types vended by
/// the control plane's `.get ingestion resources` command.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    /// Queues onto which ingestion notifications are posted.
    SecuredReadyForAggregationQueue,
    /// Queues onto which the service reports failed ingestions.
    FailedIngestionsQueue,
    /// Queues onto which the service reports successful ingestions.
    SuccessfulIngestionsQueue,
    /// Blob containers staging transient ingestion payloads.
    TempStorage,
    /// The key-value table tracking per-ingestion status rows.
    IngestionsStatusTable,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::SecuredReadyForAggregationQueue,
        ResourceKind::FailedIngestionsQueue,
        ResourceKind::SuccessfulIngestionsQueue,
        ResourceKind::TempStorage,
        ResourceKind::IngestionsStatusTable,
    ];

    /// The name used for this kind in control-plane responses.
    pub fn wire_name(&self) -> &'static str {
        match self {
            ResourceKind::SecuredReadyForAggregationQueue => "SecuredReadyForAggregationQueue",
            ResourceKind::FailedIngestionsQueue => "FailedIngestionsQueue",
            ResourceKind::SuccessfulIngestionsQueue => "SuccessfulIngestionsQueue",
            ResourceKind::TempStorage => "TempStorage",
            ResourceKind::IngestionsStatusTable => "IngestionsStatusTable",
        }
    }

    /// Look up a kind by its wire name, case-insensitively.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.wire_name().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}
