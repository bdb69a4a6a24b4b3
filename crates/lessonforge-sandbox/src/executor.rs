//! Sandboxed execution documents
//!
//! A compiled lesson never runs in the host page. It is embedded as the
//! `srcdoc` of an `<iframe sandbox="allow-scripts">`, which gives it an
//! opaque origin: no host cookies, storage or globals. Inside, a content
//! security policy limits scripts to the pinned runtime origin plus the
//! nonce-tagged inline scripts written here, and blocks all network
//! connections. The lesson's only way out is [`NAVIGATION_SIGNAL`].

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::compiler::{CompiledLesson, ENTRY_BINDING};

/// The single message a lesson may post to its host
pub const NAVIGATION_SIGNAL: &str = "lessonforge:navigate-home";

/// Hooks exposed to lesson code as globals
const AMBIENT_HOOKS: &[&str] = &[
    "useState",
    "useEffect",
    "useContext",
    "useReducer",
    "useCallback",
    "useMemo",
    "useRef",
    "useLayoutEffect",
    "useImperativeHandle",
    "useDebugValue",
    "useId",
    "useTransition",
    "useDeferredValue",
    "useSyncExternalStore",
    "useInsertionEffect",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SandboxError {
    #[error("Invalid runtime bundle URL '{url}': {reason}")]
    InvalidRuntimeUrl { url: String, reason: String },
}

/// Version-pinned React runtime loaded into every lesson document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeBundle {
    pub react_url: String,
    pub react_dom_url: String,
}

impl Default for RuntimeBundle {
    fn default() -> Self {
        Self {
            react_url: "https://unpkg.com/react@18.3.1/umd/react.production.min.js".to_string(),
            react_dom_url: "https://unpkg.com/react-dom@18.3.1/umd/react-dom.production.min.js"
                .to_string(),
        }
    }
}

impl RuntimeBundle {
    /// Distinct origins of the bundle scripts, for `script-src`
    pub fn script_origins(&self) -> Result<Vec<String>, SandboxError> {
        let mut origins = Vec::new();
        for raw in [&self.react_url, &self.react_dom_url] {
            let parsed = url::Url::parse(raw).map_err(|e| SandboxError::InvalidRuntimeUrl {
                url: raw.clone(),
                reason: e.to_string(),
            })?;
            if parsed.scheme() != "https" {
                return Err(SandboxError::InvalidRuntimeUrl {
                    url: raw.clone(),
                    reason: "runtime must be served over https".to_string(),
                });
            }
            let origin = parsed.origin().ascii_serialization();
            if !origins.contains(&origin) {
                origins.push(origin);
            }
        }
        Ok(origins)
    }
}

/// Builds isolated documents for compiled lessons
#[derive(Debug, Clone)]
pub struct SandboxExecutor {
    runtime: RuntimeBundle,
    script_origins: Vec<String>,
}

impl SandboxExecutor {
    pub fn new(runtime: RuntimeBundle) -> Result<Self, SandboxError> {
        let script_origins = runtime.script_origins()?;
        Ok(Self {
            runtime,
            script_origins,
        })
    }

    pub fn runtime(&self) -> &RuntimeBundle {
        &self.runtime
    }

    /// Policy for a lesson document whose inline scripts carry `nonce`
    pub fn content_security_policy(&self, nonce: &str) -> String {
        format!(
            "default-src 'none'; script-src 'nonce-{}' {}; style-src 'unsafe-inline'; \
             img-src data: https:; font-src data: https:; media-src data: https:; \
             connect-src 'none'; frame-src 'none'; form-action 'none'; base-uri 'none'",
            nonce,
            self.script_origins.join(" ")
        )
    }

    /// The complete document that runs inside the sandboxed frame
    pub fn lesson_document(&self, compiled: &CompiledLesson, title: &str) -> String {
        let nonce = Uuid::new_v4().simple().to_string();
        let hooks = AMBIENT_HOOKS
            .iter()
            .map(|h| format!("\"{}\"", h))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta http-equiv="Content-Security-Policy" content="{csp}">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
  body {{ margin: 0; font-family: system-ui, sans-serif; }}
  .lesson-error {{ margin: 2rem; padding: 1rem; border: 1px solid #d33; border-radius: 8px; color: #a00; background: #fff5f5; }}
</style>
<script src="{react}"></script>
<script src="{react_dom}"></script>
</head>
<body>
<div id="lesson-root"></div>
<script nonce="{nonce}">
(function () {{
  var signal = "{signal}";
  window.navigateHome = function () {{ window.parent.postMessage(signal, "*"); }};
  [{hooks}].forEach(function (name) {{ window[name] = React[name]; }});

  function showNotice(message) {{
    var root = document.getElementById("lesson-root");
    while (root.firstChild) root.removeChild(root.firstChild);
    var notice = document.createElement("div");
    notice.className = "lesson-error";
    notice.setAttribute("role", "alert");
    notice.textContent = "This lesson ran into a problem: " + message;
    root.appendChild(notice);
  }}
  window.__lessonNotice = showNotice;

  window.onerror = function (message) {{
    showNotice(String(message));
    return true;
  }};

  class LessonErrorBoundary extends React.Component {{
    constructor(props) {{
      super(props);
      this.state = {{ error: null }};
    }}
    static getDerivedStateFromError(error) {{
      return {{ error: error }};
    }}
    render() {{
      if (this.state.error) {{
        return React.createElement(
          "div",
          {{ className: "lesson-error", role: "alert" }},
          "This lesson ran into a problem: " + String(this.state.error.message || this.state.error)
        );
      }}
      return this.props.children;
    }}
  }}
  window.__LessonErrorBoundary = LessonErrorBoundary;
}})();
</script>
<script nonce="{nonce}">
{code}
</script>
<script nonce="{nonce}">
(function () {{
  if (typeof {entry} === "undefined") {{
    window.__lessonNotice("the lesson component could not be found.");
    return;
  }}
  var root = ReactDOM.createRoot(document.getElementById("lesson-root"));
  root.render(React.createElement(window.__LessonErrorBoundary, null, React.createElement({entry})));
}})();
</script>
</body>
</html>
"#,
            csp = escape_html(&self.content_security_policy(&nonce)),
            title = escape_html(title),
            react = escape_html(&self.runtime.react_url),
            react_dom = escape_html(&self.runtime.react_dom_url),
            nonce = nonce,
            signal = NAVIGATION_SIGNAL,
            hooks = hooks,
            code = escape_script(&compiled.code),
            entry = ENTRY_BINDING,
        )
    }

    /// Sandboxed frame embedding the lesson document
    pub fn iframe(&self, compiled: &CompiledLesson, title: &str) -> String {
        format!(
            r#"<iframe id="lesson-frame" title="{}" sandbox="allow-scripts" referrerpolicy="no-referrer" srcdoc="{}"></iframe>"#,
            escape_html(title),
            escape_html(&self.lesson_document(compiled, title))
        )
    }

    /// Host page: the frame plus a listener that navigates to `home_path`
    /// on the navigation signal and ignores every other message.
    pub fn host_page(&self, compiled: &CompiledLesson, title: &str, home_path: &str) -> String {
        let home = serde_json::to_string(home_path).unwrap_or_else(|_| "\"/\"".to_string());
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
  html, body {{ margin: 0; height: 100%; font-family: system-ui, sans-serif; }}
  header {{ padding: 0.75rem 1rem; border-bottom: 1px solid #ddd; }}
  #lesson-frame {{ border: 0; width: 100%; height: calc(100% - 3rem); }}
</style>
</head>
<body>
<header><a href="{home_href}">&larr; All lessons</a> &middot; {title}</header>
{frame}
<script>
(function () {{
  var frame = document.getElementById("lesson-frame");
  window.addEventListener("message", function (event) {{
    if (event.source !== frame.contentWindow) return;
    if (event.data !== "{signal}") return;
    window.location.assign({home});
  }});
}})();
</script>
</body>
</html>
"#,
            title = escape_html(title),
            home_href = escape_html(home_path),
            frame = self.iframe(compiled, title),
            signal = NAVIGATION_SIGNAL,
            home = escape_script(&home),
        )
    }
}

impl Default for SandboxExecutor {
    fn default() -> Self {
        Self {
            script_origins: vec!["https://unpkg.com".to_string()],
            runtime: RuntimeBundle::default(),
        }
    }
}

/// Escape text for HTML content and double-quoted attributes
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Keep inline script text from closing its `<script>` element
fn escape_script(code: &str) -> String {
    code.replace("</", "<\\/").replace("<!--", "<\\!--")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(code: &str) -> CompiledLesson {
        CompiledLesson {
            code: code.to_string(),
            diagnostics: Vec::new(),
            source_bytes: code.len(),
        }
    }

    #[test]
    fn test_default_bundle_is_pinned() {
        let bundle = RuntimeBundle::default();
        assert!(bundle.react_url.contains("react@18.3.1"));
        assert!(bundle.react_dom_url.contains("react-dom@18.3.1"));
        assert_eq!(bundle.script_origins().unwrap(), vec!["https://unpkg.com"]);
    }

    #[test]
    fn test_rejects_insecure_runtime() {
        let bundle = RuntimeBundle {
            react_url: "http://cdn.example.com/react.js".to_string(),
            ..RuntimeBundle::default()
        };
        assert!(matches!(
            SandboxExecutor::new(bundle),
            Err(SandboxError::InvalidRuntimeUrl { .. })
        ));
    }

    #[test]
    fn test_document_policy() {
        let executor = SandboxExecutor::new(RuntimeBundle::default()).unwrap();
        let document = executor.lesson_document(&compiled("var LessonComponent = 1;"), "Photosynthesis");
        assert!(document.contains("connect-src &#39;none&#39;"));
        assert!(document.contains("script-src &#39;nonce-"));
        assert!(document.contains("https://unpkg.com"));
        assert!(document.contains("window.parent.postMessage(signal, \"*\")"));
        assert!(document.contains("getDerivedStateFromError"));
        assert!(document.contains("window.onerror"));
    }

    #[test]
    fn test_iframe_capabilities() {
        let executor = SandboxExecutor::default();
        let frame = executor.iframe(&compiled("var LessonComponent = 1;"), "Lesson");
        assert!(frame.contains(r#"sandbox="allow-scripts""#));
        assert!(!frame.contains("allow-same-origin"));
        assert!(!frame.contains("allow-top-navigation"));
        assert!(!frame.contains("allow-forms"));
        assert!(!frame.contains("allow-popups"));
    }

    #[test]
    fn test_lesson_code_cannot_close_script_element() {
        let executor = SandboxExecutor::default();
        let document = executor.lesson_document(&compiled("var s = \"</script><b>\";"), "Lesson");
        assert!(document.contains(r#"var s = "<\/script><b>";"#));
        let frame = executor.iframe(&compiled("var s = \"</script>\";"), "Lesson");
        assert!(!frame.contains("</script>"));
    }

    #[test]
    fn test_host_page_listens_for_signal_only() {
        let executor = SandboxExecutor::default();
        let page = executor.host_page(&compiled("var LessonComponent = 1;"), "A <b> title", "/");
        assert!(page.contains("A &lt;b&gt; title"));
        assert!(page.contains(&format!("event.data !== \"{}\"", NAVIGATION_SIGNAL)));
        assert!(page.contains("event.source !== frame.contentWindow"));
    }
}
