pub mod classify;
pub mod date_util;
pub mod enrich;
pub mod error;
pub mod issue;
pub mod metrics;
pub mod period;
pub mod report;
pub mod staff;
pub mod storage;
pub mod table;

pub use classify::{classify, Classified, PeriodFlags};
pub use enrich::{EnhanceSummary, Enricher, SpecRegistry, WorkgroupRegistry};
pub use error::{Error, Result};
pub use issue::{Dataset, Dimension, IssueRecord};
pub use metrics::backlog::{analyze_backlog, BacklogAging};
pub use metrics::band::PerformanceBand;
pub use metrics::reporters::{analyze_reporters, ReporterAnalysis};
pub use metrics::types::{AggregateRow, OverallSummary, PeriodCounts, ResolutionStats};
pub use period::Period;
pub use report::{
    analyze_file, backlog_file, render_backlog_report, render_resolution_report, ResolutionReport,
};
pub use staff::StaffList;
pub use storage::RealmStore;
pub use table::Table;
