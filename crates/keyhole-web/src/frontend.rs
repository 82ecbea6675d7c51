//! Login page templates.
//!
//! Pages are rendered through the [`TemplateRenderer`] trait so a deployment
//! can swap in its own markup. [`EmbeddedTemplates`] is the built-in
//! renderer: two self-contained HTML pages with `{{placeholder}}` slots,
//! every value HTML-escaped on substitution.

use keyhole_auth::ConsumerProfile;
use serde::Serialize;

/// Template identifier for the login page.
pub const LOGIN_TEMPLATE: &str = "login";

/// Template identifier for the "consumer unavailable" page.
pub const UNAVAILABLE_TEMPLATE: &str = "unavailable";

/// Data handed to every template.
#[derive(Debug, Clone, Serialize)]
pub struct LoginContext {
    /// The provider's display name.
    pub provider_name: String,
    /// The consumer identifier from the request (`host[:port]`).
    pub client_id: String,
    /// The consumer's profile; empty when the lookup failed.
    pub consumer: ConsumerProfile,
    /// Whether the previous passphrase attempt was rejected.
    pub failed: bool,
}

/// Errors from rendering a page.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// No template is registered under this identifier.
    #[error("unknown template: {0}")]
    UnknownTemplate(String),
}

/// Renders a named template with a [`LoginContext`].
pub trait TemplateRenderer: Send + Sync {
    /// Render `template` into an HTML document.
    fn render(&self, template: &str, ctx: &LoginContext) -> Result<String, RenderError>;
}

/// The built-in templates compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedTemplates;

impl TemplateRenderer for EmbeddedTemplates {
    fn render(&self, template: &str, ctx: &LoginContext) -> Result<String, RenderError> {
        let source = match template {
            LOGIN_TEMPLATE => LOGIN_HTML,
            UNAVAILABLE_TEMPLATE => UNAVAILABLE_HTML,
            other => return Err(RenderError::UnknownTemplate(other.to_owned())),
        };

        Ok(fill(source, |slot| match slot {
            "failure_banner" if ctx.failed => Some(FAILURE_BANNER.to_owned()),
            "failure_banner" => Some(String::new()),
            "provider_name" => Some(escape_html(&ctx.provider_name)),
            "client_id" => Some(escape_html(&ctx.client_id)),
            "consumer_name" => Some(escape_html(&ctx.consumer.name)),
            "consumer_about" => Some(escape_html(&ctx.consumer.about)),
            "consumer_avatar" => Some(escape_html(&ctx.consumer.avatar)),
            "consumer_key" => Some(escape_html(&ctx.consumer.key)),
            _ => None,
        }))
    }
}

/// Substitute every `{{slot}}` in `source` in a single pass.
///
/// Substituted values are never rescanned, so a value containing `{{…}}`
/// stays literal. Unknown slots are left as they are.
fn fill(source: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let slot = &after[..end];
        match lookup(slot) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

/// Escape the five HTML-significant characters.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

const FAILURE_BANNER: &str =
    r#"<p class="failure" role="alert">Login failed. Check your passphrase and try again.</p>"#;

/// Login page shown to the user at `GET /auth`.
pub const LOGIN_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Sign in to {{consumer_name}} as {{provider_name}}</title>
<style>
*,*::before,*::after{box-sizing:border-box;margin:0;padding:0}
body{
  font-family:-apple-system,BlinkMacSystemFont,"Segoe UI",Roboto,sans-serif;
  display:flex;justify-content:center;align-items:center;
  min-height:100vh;background:#f5f5f5;color:#333;
}
.card{
  width:360px;padding:2.5rem;background:white;border-radius:12px;
  box-shadow:0 2px 10px rgba(0,0,0,0.08);text-align:center;
}
.card img{width:72px;height:72px;border-radius:50%;object-fit:cover;margin-bottom:1rem}
.card h1{font-size:1.25rem;margin-bottom:.25rem}
.card .about{color:#666;font-size:.9rem;margin-bottom:1.5rem}
.card .key{font-size:.8rem;color:#888;margin-bottom:1.5rem}
.failure{color:#e94560;margin-bottom:1rem}
input[type=password]{
  width:100%;padding:.7rem;border:1px solid #ddd;border-radius:8px;margin-bottom:1rem;
}
button{
  width:100%;padding:.7rem;border:none;border-radius:8px;
  background:#533483;color:white;font-size:1rem;cursor:pointer;
}
button:hover{background:#6a44a8}
</style>
</head>
<body>
<div class="card">
  <img src="{{consumer_avatar}}" alt="">
  <h1>{{consumer_name}}</h1>
  <p class="about">{{consumer_about}}</p>
  <p class="key"><a href="{{consumer_key}}">consumer key</a></p>
  {{failure_banner}}
  <form method="post" action="/auth">
    <input type="hidden" name="client_id" value="{{client_id}}">
    <input type="password" name="password" placeholder="Passphrase for {{provider_name}}" autofocus required>
    <button type="submit">Sign in</button>
  </form>
</div>
</body>
</html>"##;

/// Page shown when the consumer's profile cannot be fetched.
pub const UNAVAILABLE_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Consumer unavailable</title>
<style>
body{font-family:-apple-system,BlinkMacSystemFont,"Segoe UI",Roboto,sans-serif;
  display:flex;justify-content:center;align-items:center;height:100vh;margin:0;background:#f5f5f5;color:#333}
.card{text-align:center;padding:3rem;background:white;border-radius:12px;box-shadow:0 2px 10px rgba(0,0,0,0.08)}
h1{color:#e94560;margin-bottom:.5rem}
p{color:#666}
</style>
</head>
<body>
<div class="card">
  <h1>Cannot sign in</h1>
  <p>The site <code>{{client_id}}</code> could not be reached.</p>
</div>
</body>
</html>"##;
