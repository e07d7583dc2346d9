use crate::OutputFormatter;
use flow_analyze::integration_queries::{IntegrationAuditResult, RoutesToResult};
use flow_analyze::queries::{
    AuditResult, CatchesResult, EntrypointsResult, EscapesResult, ExceptionsResult, InitResult,
    RaisesResult, StatsResult, SubclassesResult, TraceResult,
};

pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_init(&self, result: &InitResult) -> String {
        serde_json::to_string_pretty(result).unwrap_or_default()
    }
    fn format_audit(&self, result: &AuditResult) -> String {
        serde_json::to_string_pretty(result).unwrap_or_default()
    }
    fn format_integration_audit(&self, result: &IntegrationAuditResult) -> String {
        serde_json::to_string_pretty(result).unwrap_or_default()
    }
    fn format_raises(&self, result: &RaisesResult) -> String {
        serde_json::to_string_pretty(result).unwrap_or_default()
    }
    fn format_catches(&self, result: &CatchesResult) -> String {
        serde_json::to_string_pretty(result).unwrap_or_default()
    }
    fn format_escapes(&self, result: &EscapesResult) -> String {
        serde_json::to_string_pretty(result).unwrap_or_default()
    }
    fn format_routes_to(&self, result: &RoutesToResult) -> String {
        serde_json::to_string_pretty(result).unwrap_or_default()
    }
    fn format_trace(&self, result: &TraceResult) -> String {
        serde_json::to_string_pretty(result).unwrap_or_default()
    }
    fn format_subclasses(&self, result: &SubclassesResult) -> String {
        serde_json::to_string_pretty(result).unwrap_or_default()
    }
    fn format_exceptions(&self, result: &ExceptionsResult) -> String {
        serde_json::to_string_pretty(result).unwrap_or_default()
    }
    fn format_entrypoints(&self, result: &EntrypointsResult) -> String {
        serde_json::to_string_pretty(result).unwrap_or_default()
    }
    fn format_stats(&self, result: &StatsResult) -> String {
        serde_json::to_string_pretty(result).unwrap_or_default()
    }
}
