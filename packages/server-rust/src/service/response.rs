//! Response formatting: maps the terminal run state onto `{responseCode, response}`.
//!
//! | valid | rule satisfied | result  | code                    | body                                   |
//! |-------|----------------|---------|-------------------------|----------------------------------------|
//! | no    | -              | -       | 400 or `errCode`        | `{message, validationErrors}`          |
//! | yes   | no, anonymous  | -       | 401                     | `{message: "Your request is unauthorized"}` |
//! | yes   | no, signed in  | -       | 403                     | `{message: "Access forbidden"}`        |
//! | yes   | yes            | success | 200 or `errCode`        | the result object                      |
//! | yes   | yes            | error   | 500 or `errCode`        | `{message}`                            |

use serde_json::{json, Value};
use waymark_core::{ResultKind, RunnerStat};

pub const UNAUTHORIZED_MESSAGE: &str = "Your request is unauthorized";
pub const FORBIDDEN_MESSAGE: &str = "Access forbidden";
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";
const VALIDATION_FALLBACK_MESSAGE: &str = "Validation failed";

/// Computes the response code and body for `stat`.
#[must_use]
pub fn format_response(stat: &RunnerStat) -> (u16, Value) {
    let result = &stat.result;

    if !stat.is_valid {
        let message = stat
            .validation_errors
            .first()
            .map_or(VALIDATION_FALLBACK_MESSAGE, |issue| issue.message.as_str());
        let code = result.err_code.unwrap_or(400);
        return (
            code,
            json!({
                "message": message,
                "validationErrors": stat.validation_errors,
            }),
        );
    }

    if !stat.is_rule_satisfied() {
        return if stat.args.is_authenticated {
            (403, json!({ "message": FORBIDDEN_MESSAGE }))
        } else {
            (401, json!({ "message": UNAUTHORIZED_MESSAGE }))
        };
    }

    match result.kind {
        ResultKind::Success => {
            let body = serde_json::to_value(result).unwrap_or(Value::Null);
            (result.err_code.unwrap_or(200), body)
        }
        ResultKind::Error => {
            let message = result
                .err
                .as_ref()
                .map_or(UNKNOWN_ERROR_MESSAGE, |err| err.message.as_str());
            (result.err_code.unwrap_or(500), json!({ "message": message }))
        }
    }
}

/// Writes the formatted response into `stat`.
pub fn apply(stat: &mut RunnerStat) {
    let (code, body) = format_response(stat);
    stat.response_code = Some(code);
    stat.response = Some(body);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
