//! HTML pages rendered with Handlebars.

use anyhow::{Result, anyhow};
use handlebars::Handlebars;
use rp_identity_oidc::SignIn;
use serde_json::json;

const TEMPLATES: [(&str, &str); 3] = [
    ("index", include_str!("../templates/index.hbs")),
    ("success", include_str!("../templates/success.hbs")),
    ("error", include_str!("../templates/error.hbs")),
];

pub struct Renderer {
    handlebars: Handlebars<'static>,
}

impl Renderer {
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);

        for (name, source) in TEMPLATES {
            handlebars
                .register_template_string(name, source)
                .map_err(|e| anyhow!("Failed to register template {}: {}", name, e))?;
        }

        Ok(Self { handlebars })
    }

    pub fn index(&self, auth_host: &str) -> Result<String> {
        self.render("index", &json!({ "auth_host": auth_host }))
    }

    /// The token response and verified claims are shown pretty-printed.
    pub fn success(&self, sign_in: &SignIn, signout_url: &str) -> Result<String> {
        let data = json!({
            "subject": sign_in.identity.subject(),
            "response": serde_json::to_string_pretty(&sign_in.tokens)?,
            "token_payload": serde_json::to_string_pretty(&sign_in.identity)?,
            "signout_url": signout_url,
        });
        self.render("success", &data)
    }

    pub fn error(&self, message: &str) -> Result<String> {
        self.render("error", &json!({ "error": message }))
    }

    fn render(&self, name: &str, data: &serde_json::Value) -> Result<String> {
        self.handlebars
            .render(name, data)
            .map_err(|e| anyhow!("Failed to render template {}: {}", name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_register() {
        assert!(Renderer::new().is_ok());
    }

    #[test]
    fn test_error_page_escapes_message() {
        let renderer = Renderer::new().unwrap();

        let html = renderer.error("<script>alert(1)</script>").unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>alert"));
    }

    #[test]
    fn test_index_shows_auth_host() {
        let renderer = Renderer::new().unwrap();

        let html = renderer.index("https://auth.example.com").unwrap();
        assert!(html.contains("https://auth.example.com"));
        assert!(html.contains("href=\"/signin\""));
    }
}
