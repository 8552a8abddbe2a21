//! Operation boundary macros
//!
//! Every facade call logs a start event, then either an end event with its
//! duration or an error event carrying the `BoardError` code. All three
//! share `component`, `op` and `event`, and accept extra tracing fields
//! after the required arguments.

#[doc(hidden)]
#[macro_export]
macro_rules! __log_op_event {
    ($level:ident, $op:expr, $event:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = module_path!(),
            op = $op,
            event = $event,
            $($($field)*)?
        )
    };
}

/// Log the start of an operation (debug level)
///
/// ```
/// # use corkboard_core::log_op_start;
/// log_op_start!("get_board");
/// log_op_start!("set_status", issue_id = "bd-1a2b3c");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)*)?) => {
        $crate::__log_op_event!(debug, $op, $crate::types::schema::EVENT_START $(, $($field)*)?)
    };
}

/// Log the successful end of an operation with its duration
///
/// ```
/// # use corkboard_core::log_op_end;
/// log_op_end!("get_board", duration_ms = 3);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {
        $crate::__log_op_event!(
            info,
            $op,
            $crate::types::schema::EVENT_END,
            duration_ms = $duration
            $(, $($field)*)?
        )
    };
}

/// Log a failed operation; `$err` must be a `&BoardError`
///
/// ```
/// # use corkboard_core::log_op_error;
/// # use corkboard_core::errors::{BoardError, ErrorKind};
/// let err = BoardError::new(ErrorKind::NotFound);
/// log_op_error!("set_status", &err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {{
        let board_err: &$crate::errors::BoardError = $err;
        $crate::__log_op_event!(
            error,
            $op,
            $crate::types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_code = board_err.code(),
            error = %board_err
            $(, $($field)*)?
        )
    }};
}
