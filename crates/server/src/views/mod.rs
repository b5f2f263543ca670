//! Server-rendered HTML. Every piece of user or backend text goes through
//! [`text`] or [`attr`] before it reaches the page.

use std::borrow::Cow;

use services::services::session::SessionState;

pub mod pages;

pub fn text(value: &str) -> Cow<'_, str> {
    html_escape::encode_text(value)
}

pub fn attr(value: &str) -> Cow<'_, str> {
    html_escape::encode_double_quoted_attribute(value)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Error(String),
    Info(String),
}

impl Notice {
    fn render(&self) -> String {
        let (class, message) = match self {
            Notice::Error(message) => ("banner banner-error", message),
            Notice::Info(message) => ("banner banner-info", message),
        };
        format!(r#"<div class="{class}" role="alert">{}</div>"#, text(message))
    }
}

pub fn navbar(state: &SessionState) -> String {
    let links = if !state.is_settled() {
        r#"<span class="spinner" aria-label="Loading">Loading…</span>"#.to_string()
    } else if state.is_authenticated() {
        let name = state.display_name().unwrap_or_default();
        format!(
            r#"<a href="/boards">Boards</a>
<span class="user">{}</span>
<form method="post" action="/logout"><button type="submit">Logout</button></form>"#,
            text(&name)
        )
    } else {
        r#"<a href="/login">Login</a>
<a class="button" href="/register">Sign Up</a>"#
            .to_string()
    };

    format!(
        r#"<nav class="navbar"><a class="brand" href="/">Stroflo</a><div class="links">{links}</div></nav>"#
    )
}

/// Full HTML document around `body`.
pub fn layout(title: &str, state: &SessionState, notice: Option<&Notice>, body: &str) -> String {
    let notice = notice.map(Notice::render).unwrap_or_default();
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} · Stroflo</title>
</head>
<body>
{navbar}
<main>
{notice}
{body}
</main>
</body>
</html>
"#,
        title = text(title),
        navbar = navbar(state),
    )
}
