//! Output formatters for flow query results.
//!
//! Two output modes, selected by the CLI's `--json`/`--human` flags:
//! - **JSON**: the query result struct, serialized as-is
//! - **Human** (default): short prose summaries for terminal users

pub mod human;
pub mod json;

use flow_analyze::integration_queries::{IntegrationAuditResult, RoutesToResult};
use flow_analyze::queries::{
    AuditResult, CatchesResult, EntrypointsResult, EscapesResult, ExceptionsResult, InitResult,
    RaisesResult, StatsResult, SubclassesResult, TraceResult,
};

pub trait OutputFormatter {
    fn format_init(&self, result: &InitResult) -> String;
    fn format_audit(&self, result: &AuditResult) -> String;
    fn format_integration_audit(&self, result: &IntegrationAuditResult) -> String;
    fn format_raises(&self, result: &RaisesResult) -> String;
    fn format_catches(&self, result: &CatchesResult) -> String;
    fn format_escapes(&self, result: &EscapesResult) -> String;
    fn format_routes_to(&self, result: &RoutesToResult) -> String;
    fn format_trace(&self, result: &TraceResult) -> String;
    fn format_subclasses(&self, result: &SubclassesResult) -> String;
    fn format_exceptions(&self, result: &ExceptionsResult) -> String;
    fn format_entrypoints(&self, result: &EntrypointsResult) -> String;
    fn format_stats(&self, result: &StatsResult) -> String;
}
