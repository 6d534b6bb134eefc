//! Manual template rendering

use outreach_storage::models::RecipientProfile;
use regex::Regex;
use std::sync::OnceLock;

use super::GeneratedEmail;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*[A-Za-z0-9_.]+\s*\}\}").expect("valid placeholder pattern")
    })
}

/// Fills `{{placeholder}}` variables in a hand-written subject and body
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render a template with recipient data. Unknown placeholders are removed.
    pub fn render(&self, template: &str, recipient: &RecipientProfile) -> String {
        let mut result = template.to_string();

        let name = recipient.name.as_deref().unwrap_or("");
        let mut parts = name.split_whitespace();
        let first_name = parts.next().unwrap_or("");
        let last_name = parts.collect::<Vec<_>>().join(" ");

        let values = [
            ("email", recipient.email.as_str()),
            ("name", name),
            ("first_name", first_name),
            ("last_name", last_name.as_str()),
            ("company", recipient.company_name.as_deref().unwrap_or("")),
            ("industry", recipient.industry.as_deref().unwrap_or("")),
        ];
        for (key, value) in values {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }

        placeholder_pattern().replace_all(&result, "").to_string()
    }

    /// Render both parts of a manual template
    pub fn render_email(
        &self,
        subject: &str,
        body: &str,
        recipient: &RecipientProfile,
    ) -> GeneratedEmail {
        GeneratedEmail {
            subject: self.render(subject, recipient).trim().to_string(),
            body: self.render(body, recipient).trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn recipient() -> RecipientProfile {
        RecipientProfile {
            email: "john@acme.test".to_string(),
            name: Some("John Doe".to_string()),
            company_name: Some("Acme Corp".to_string()),
            industry: None,
            employee_count: None,
        }
    }

    #[test]
    fn test_render_template() {
        let renderer = TemplateRenderer::new();
        let result = renderer.render(
            "Hello {{first_name}} {{last_name}} at {{company}} ({{email}})",
            &recipient(),
        );
        assert_eq!(result, "Hello John Doe at Acme Corp (john@acme.test)");
    }

    #[test]
    fn test_unused_placeholders_removed() {
        let renderer = TemplateRenderer::new();
        let result = renderer.render("Hi {{first_name}}{{ signature }}, in {{industry}}.", &recipient());
        assert_eq!(result, "Hi John, in .");
    }

    #[test]
    fn test_render_email_trims() {
        let email = TemplateRenderer::new().render_email(
            " Idea for {{company}} ",
            "\nHi {{first_name}},\nShort note.\n",
            &recipient(),
        );
        assert_eq!(email.subject, "Idea for Acme Corp");
        assert_eq!(email.body, "Hi John,\nShort note.");
    }
}
