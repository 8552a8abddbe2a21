//! Field keys and event names shared by the log macros and log consumers
//!
//! Tracing field names are identifiers at the call site, so the macros
//! spell them out; these constants are for code that reads events back
//! (test capture, log processing) and must agree with them.

/// Module path of the code that emitted the event
pub const FIELD_COMPONENT: &str = "component";
/// Facade operation name (`get_board`, `create`, `reload_now`, ...)
pub const FIELD_OP: &str = "op";
/// Operation boundary: one of the `EVENT_*` names below
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
/// Correlates every event of one facade call
pub const FIELD_OP_ID: &str = "op_id";
/// Correlates the events of one publish of the backing file
pub const FIELD_PUBLISH_ID: &str = "publish_id";
/// Stable `ERR_*` code of a `BoardError`
pub const FIELD_ERR_CODE: &str = "err_code";
pub const FIELD_MESSAGE: &str = "message";

pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_distinct() {
        let names = [EVENT_START, EVENT_END, EVENT_END_ERROR];
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_correlation_fields_differ() {
        assert_ne!(FIELD_OP_ID, FIELD_PUBLISH_ID);
    }
}
