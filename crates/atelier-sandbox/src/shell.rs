//! HTML documents loaded into the execution context.
//!
//! Three shells: the plain-markup pass-through (with scrollbar-suppressing
//! styles inlined), the component runner that evaluates compiled output,
//! and the diagnostic panel shown for compile and runtime failures.

use atelier_core::error::{AtelierError, Result};
use minijinja::{Environment, context};
use once_cell::sync::Lazy;

/// Nested contexts get their own scrollbars unless suppressed; the host
/// page already scrolls.
const SCROLLBAR_STYLE: &str = "\
<style>\n\
  html, body { margin: 0; padding: 0; overflow-x: hidden; }\n\
  ::-webkit-scrollbar { width: 6px; height: 6px; }\n\
  ::-webkit-scrollbar-thumb { background: rgba(0,0,0,0.2); border-radius: 3px; }\n\
</style>";

const RUNNER_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<script src="https://cdn.tailwindcss.com"></script>
<script type="importmap">
{
  "imports": {
    "react": "https://esm.sh/react@18",
    "react-dom/client": "https://esm.sh/react-dom@18/client"
  }
}
</script>
{{ scrollbar_style }}
</head>
<body>
<div id="root"></div>
<script type="module">
import React from "react";
import { createRoot } from "react-dom/client";
window.addEventListener("error", (event) => {
  window.__reportRuntimeError && window.__reportRuntimeError(String(event.message));
});
{{ compiled_code }}
const root = createRoot(document.getElementById("root"));
root.render(React.createElement({{ component_name }}));
</script>
</body>
</html>
"#;

const DIAGNOSTIC_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<style>
  body { font-family: ui-monospace, monospace; margin: 0; padding: 16px; background: #fff5f5; }
  .panel { border: 1px solid #f5c2c2; border-radius: 8px; padding: 12px 16px; }
  .title { color: #b42318; font-weight: 600; margin-bottom: 8px; }
  .message { color: #55160c; white-space: pre-wrap; }
  .suggestion { color: #475467; margin-top: 8px; }
</style>
</head>
<body>
<div class="panel">
  <div class="title">{{ title }}</div>
  <div class="message">{{ message }}</div>
  {% if suggestion %}<div class="suggestion">{{ suggestion }}</div>{% endif %}
</div>
</body>
</html>
"#;

static TEMPLATES: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    env.add_template("runner", RUNNER_TEMPLATE)
        .expect("embedded runner template is valid");
    // .html name turns on auto-escaping for the diagnostic text.
    env.add_template("diagnostic.html", DIAGNOSTIC_TEMPLATE)
        .expect("embedded diagnostic template is valid");
    env
});

/// Prepares a plain-markup document for the context, inlining the
/// scrollbar-suppressing rules.
pub fn plain_document(source: &str) -> String {
    if let Some(position) = source.find("</head>") {
        let mut document = String::with_capacity(source.len() + SCROLLBAR_STYLE.len());
        document.push_str(&source[..position]);
        document.push_str(SCROLLBAR_STYLE);
        document.push('\n');
        document.push_str(&source[position..]);
        document
    } else {
        format!("{SCROLLBAR_STYLE}\n{source}")
    }
}

/// Wraps compiled component output in the runner shell.
pub fn component_document(component_name: &str, compiled_code: &str) -> Result<String> {
    let template = TEMPLATES
        .get_template("runner")
        .map_err(|err| AtelierError::internal(format!("runner template: {err}")))?;
    template
        .render(context! {
            component_name => component_name,
            compiled_code => compiled_code,
            scrollbar_style => SCROLLBAR_STYLE,
        })
        .map_err(|err| AtelierError::internal(format!("runner template: {err}")))
}

/// In-place diagnostic panel for compile and runtime failures.
pub fn diagnostic_document(title: &str, message: &str, suggestion: Option<&str>) -> String {
    let rendered = TEMPLATES
        .get_template("diagnostic.html")
        .and_then(|template| {
            template.render(context! {
                title => title,
                message => message,
                suggestion => suggestion,
            })
        });
    match rendered {
        Ok(document) => document,
        // The panel must never itself fail a render.
        Err(_) => format!("<pre>{title}: {message}</pre>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_document_injects_style_into_head() {
        let source = "<html><head><title>t</title></head><body>hi</body></html>";
        let document = plain_document(source);
        assert!(document.contains("overflow-x: hidden"));
        let style = document.find("::-webkit-scrollbar").unwrap();
        let head_end = document.find("</head>").unwrap();
        assert!(style < head_end);
    }

    #[test]
    fn test_plain_document_without_head_prepends_style() {
        let document = plain_document("<div>bare</div>");
        assert!(document.starts_with("<style>"));
        assert!(document.ends_with("<div>bare</div>"));
    }

    #[test]
    fn test_runner_embeds_component_and_code() {
        let document =
            component_document("Counter", "function Counter() { return null; }").unwrap();
        assert!(document.contains("React.createElement(Counter)"));
        assert!(document.contains("function Counter() { return null; }"));
        assert!(document.contains("importmap"));
    }

    #[test]
    fn test_diagnostic_escapes_markup() {
        let document = diagnostic_document("Compile error", "<script>alert(1)</script>", None);
        assert!(!document.contains("<script>alert(1)</script>"));
        assert!(document.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_diagnostic_includes_suggestion_when_present() {
        let with = diagnostic_document("Compile error", "bad import", Some("check the module name"));
        assert!(with.contains("check the module name"));
        let without = diagnostic_document("Compile error", "bad import", None);
        assert!(!without.contains("class=\"suggestion\""));
    }
}
