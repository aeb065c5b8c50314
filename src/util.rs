use std::time::{SystemTime, UNIX_EPOCH};

const HEX: &[u8; 16] = b"0123456789abcdef";

#[inline]
pub(crate) fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

/// `msg_` + 24 hex chars of a fresh v4 uuid.
pub(crate) fn new_message_id() -> String {
    let simple = uuid::Uuid::new_v4().simple().to_string();
    let mut out = String::with_capacity(28);
    out.push_str("msg_");
    out.push_str(&simple[..24]);
    out
}

pub(crate) fn new_completion_id() -> String {
    let mut out = String::with_capacity(41);
    out.push_str("chatcmpl-");
    out.push_str(&uuid::Uuid::new_v4().simple().to_string());
    out
}

/// Append `value` as a quoted JSON string.
pub(crate) fn push_json_string_escaped(out: &mut String, value: &str) {
    out.reserve(value.len() + 2);
    out.push('"');
    let mut run_start = 0;
    for (pos, ch) in value.char_indices() {
        let escaped = match ch {
            '"' => "\\\"",
            '\\' => "\\\\",
            '\n' => "\\n",
            '\r' => "\\r",
            '\t' => "\\t",
            '\u{08}' => "\\b",
            '\u{0c}' => "\\f",
            c if c < ' ' => {
                out.push_str(&value[run_start..pos]);
                let code = c as u8;
                out.push_str("\\u00");
                out.push(char::from(HEX[usize::from(code >> 4)]));
                out.push(char::from(HEX[usize::from(code & 0x0f)]));
                run_start = pos + 1;
                continue;
            }
            _ => continue,
        };
        out.push_str(&value[run_start..pos]);
        out.push_str(escaped);
        run_start = pos + 1;
    }
    out.push_str(&value[run_start..]);
    out.push('"');
}

#[inline]
pub(crate) fn push_decimal(out: &mut String, n: u64) {
    use std::fmt::Write as _;
    let _ = write!(out, "{n}");
}
