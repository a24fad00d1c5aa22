//! Injected markup and out-of-band chunk rendering.

use htms_core::{escape_text, TaskInfo};
use serde::Serialize;

/// Client runtime defining `<htms-chunk>` and `htms.cleanup()`.
pub const RUNTIME_SOURCE: &str = include_str!("../runtime/htms.js");

/// Hides placeholders that are still empty, injected before `</head>`.
pub const HIDE_EMPTY_STYLE: &str =
    "<style data-htms-remove-on-cleanup>[data-htms]:empty{display:none}</style>\n";

/// Removes every injected helper element once all chunks are in.
pub const CLEANUP_SCRIPT: &str = "<script data-htms-remove-on-cleanup>htms.cleanup()</script>\n";

/// Replacement for the suppressed `</body>`.
pub const BODY_CLOSE: &str = "</body>\n";

/// Replacement for the suppressed `</html>`.
pub const HTML_CLOSE: &str = "</html>";

const ERROR_TITLE: &str = "Unhandled Task Error";

/// The runtime script element, injected where `</body>` was.
pub fn runtime_script() -> String {
    format!(
        "<script data-htms-remove-on-cleanup>{}</script>\n",
        RUNTIME_SOURCE
    )
}

/// Wrap a task result for relocation by the client runtime.
///
/// The result is inserted as-is; producing safe HTML is the task's job.
pub fn render_chunk(uuid: &str, html: &str) -> String {
    format!("<htms-chunk uuid=\"{}\">{}</htms-chunk>\n", uuid, html)
}

#[derive(Serialize)]
struct TaskDump<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'a str,
    uuid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    specifier: Option<&'a str>,
}

/// Render the chunk shown in place of a failed task.
///
/// Outside debug mode only a generic message is shown.
pub fn render_error_chunk(
    info: &TaskInfo,
    specifier: Option<&str>,
    message: &str,
    debug: bool,
) -> String {
    let mut html = format!("<htms-chunk uuid=\"{}\">\n", info.uuid);
    html.push_str("<div data-htms-error>\n");
    html.push_str(&format!("<h2>{}</h2>\n", ERROR_TITLE));

    if debug {
        let dump = TaskDump {
            kind: "task",
            name: &info.name,
            uuid: &info.uuid,
            specifier,
        };
        let dump = serde_json::to_string_pretty(&dump).unwrap_or_default();

        html.push_str("<pre>");
        html.push_str(&format!("error: {}\n", escape_text(message)));
        html.push_str(&format!("token: {}", escape_text(&dump)));
        html.push_str("</pre>\n");
    } else {
        html.push_str("<p>Oops! We hit an unexpected error here.</p>\n");
        html.push_str("<p>Please contact the site administrator if the issue persists.</p>\n");
    }

    html.push_str("</div>\n");
    html.push_str("</htms-chunk>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_chunk() {
        assert_eq!(
            render_chunk("u-1", "<p>news</p>"),
            "<htms-chunk uuid=\"u-1\"><p>news</p></htms-chunk>\n"
        );
    }

    #[test]
    fn test_runtime_script_wraps_source() {
        let script = runtime_script();
        assert!(script.starts_with("<script data-htms-remove-on-cleanup>"));
        assert!(script.ends_with("</script>\n"));
        assert!(script.contains("customElements.define"));
        assert!(script.contains("'htms-chunk'"));
    }

    #[test]
    fn test_error_chunk_hides_details() {
        let info = TaskInfo::new("badTask", "u-2");
        let html = render_error_chunk(&info, Some("mod.js"), "secret failure", false);

        assert!(html.starts_with("<htms-chunk uuid=\"u-2\">\n<div data-htms-error>\n"));
        assert!(html.contains("<h2>Unhandled Task Error</h2>"));
        assert!(html.contains("Oops! We hit an unexpected error here."));
        assert!(!html.contains("secret failure"));
        assert!(!html.contains("mod.js"));
        assert!(html.ends_with("</div>\n</htms-chunk>\n"));
    }

    #[test]
    fn test_error_chunk_debug_details() {
        let info = TaskInfo::new("badTask", "u-2");
        let html = render_error_chunk(&info, None, "<boom>", true);

        assert!(html.contains("<pre>error: &lt;boom&gt;\n"));
        assert!(html.contains("&quot;name&quot;: &quot;badTask&quot;"));
        assert!(html.contains("&quot;type&quot;: &quot;task&quot;"));
        assert!(!html.contains("specifier"));
        assert!(!html.contains("Oops!"));
    }
}
