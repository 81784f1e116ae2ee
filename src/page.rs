//! Minimal HTML page presenting one turn's result.

use crate::session::{SessionState, TurnOutput};

const TITLE: &str = "AI Image Generator";

const STYLE: &str = r#"
body { max-width: 1200px; margin: 0 auto; font-family: Arial, sans-serif; }
.main-title { color: #4a4a4a; text-align: center; margin-bottom: 30px; }
.error-message { color: #721c24; background-color: #f8d7da; border: 1px solid #f5c6cb; padding: 10px; border-radius: 5px; margin-top: 10px; }
.success-message { color: #155724; background-color: #d4edda; padding: 10px; border-radius: 5px; margin-top: 10px; }
.auto-download { display: none; }
figure img { max-width: 100%; }
"#;

/// Renders the page for a finished turn.
///
/// On success the page shows the image, embeds the automatic download
/// directive and offers the manual control. On failure it shows only the
/// safe user-facing message.
pub fn render_result_page(prompt: &str, state: &SessionState, output: Option<&TurnOutput>) -> String {
    let mut body = String::new();
    body.push_str(&format!("<h1 class=\"main-title\">{TITLE}</h1>\n"));
    body.push_str(&format!("<p class=\"prompt\">{}</p>\n", escape_html(prompt)));

    match (state, output) {
        (SessionState::Succeeded, Some(output)) => {
            body.push_str(&format!(
                "<figure>\n<img src=\"{}\" alt=\"Generated Image\" width=\"{}\" height=\"{}\">\n<figcaption>Generated Image</figcaption>\n</figure>\n",
                output.artifact.data_url(),
                output.image.width(),
                output.image.height(),
            ));
            body.push_str(&output.auto.html);
            body.push('\n');
            body.push_str(&output.manual.html);
            body.push('\n');
            body.push_str("<div class=\"success-message\">Image generated!</div>\n");
        }
        (SessionState::Failed(failure), _) => {
            body.push_str(&format!(
                "<div class=\"error-message\">{}</div>\n",
                escape_html(failure.message)
            ));
        }
        (SessionState::InProgress, _) => {
            body.push_str("<p class=\"progress\">Generating image...</p>\n");
        }
        _ => {}
    }

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{TITLE}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}</body>\n</html>\n"
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
