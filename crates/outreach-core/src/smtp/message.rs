//! RFC 5322 message rendering

use lettre::message::{Mailbox, MultiPart};
use lettre::{Address, Message};

use super::{OutgoingEmail, TransportError};

fn mailbox(name: Option<&str>, email: &str) -> Result<Mailbox, TransportError> {
    let address: Address = email
        .parse()
        .map_err(|_| TransportError::InvalidAddress(email.to_string()))?;
    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    Ok(Mailbox::new(name, address))
}

/// Render `email` as a multipart/alternative message (text + HTML)
pub fn build_message(email: &OutgoingEmail) -> Result<Message, TransportError> {
    let html = email
        .html
        .clone()
        .unwrap_or_else(|| text_to_html(&email.text));

    Message::builder()
        .from(mailbox(email.from.name.as_deref(), &email.from.email)?)
        .to(mailbox(None, &email.to)?)
        .subject(email.subject.as_str())
        .multipart(MultiPart::alternative_plain_html(email.text.clone(), html))
        .map_err(|e| TransportError::Message(e.to_string()))
}

/// Escape plain text for HTML and turn line breaks into `<br>`
pub fn text_to_html(text: &str) -> String {
    let mut html = String::with_capacity(text.len() + text.len() / 8);
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '&' => html.push_str("&amp;"),
            '<' => html.push_str("&lt;"),
            '>' => html.push_str("&gt;"),
            '"' => html.push_str("&quot;"),
            '\'' => html.push_str("&#39;"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                html.push_str("<br>");
            }
            '\n' => html.push_str("<br>"),
            other => html.push(other),
        }
    }

    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smtp::Sender;
    use pretty_assertions::assert_eq;

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            from: Sender {
                email: "sales@vendor.test".to_string(),
                name: Some("Vendor Sales".to_string()),
            },
            to: "lead@example.com".to_string(),
            subject: "Quick question".to_string(),
            text: "Hello Lee,\nShort note.".to_string(),
            html: None,
        }
    }

    #[test]
    fn test_text_to_html() {
        assert_eq!(
            text_to_html("Hi <Sam> & co,\nSee you\r\nsoon"),
            "Hi &lt;Sam&gt; &amp; co,<br>See you<br>soon"
        );
    }

    #[test]
    fn test_build_message_is_multipart_alternative() {
        let raw = build_message(&email()).unwrap().formatted();
        let parsed = mail_parser::MessageParser::default().parse(&raw[..]).unwrap();

        assert_eq!(parsed.subject(), Some("Quick question"));
        let from = parsed.from().and_then(|a| a.first()).unwrap();
        assert_eq!(from.address(), Some("sales@vendor.test"));
        assert_eq!(from.name(), Some("Vendor Sales"));
        let text = parsed.body_text(0).unwrap().replace("\r\n", "\n");
        assert_eq!(text.trim_end(), "Hello Lee,\nShort note.");
        assert!(parsed
            .body_html(0)
            .map(|h| h.contains("Hello Lee,<br>Short note."))
            .unwrap_or(false));

        let head = String::from_utf8_lossy(&raw).to_lowercase();
        assert!(head.contains("multipart/alternative"));
    }

    #[test]
    fn test_blank_sender_name_is_omitted() {
        let mut email = email();
        email.from.name = Some("  ".to_string());

        let raw = build_message(&email).unwrap().formatted();
        let parsed = mail_parser::MessageParser::default().parse(&raw[..]).unwrap();
        let from = parsed.from().and_then(|a| a.first()).unwrap();
        assert_eq!(from.address(), Some("sales@vendor.test"));
        assert_eq!(from.name(), None);
    }

    #[test]
    fn test_unparseable_recipient() {
        let mut email = email();
        email.to = "no at sign".to_string();

        assert!(matches!(
            build_message(&email),
            Err(TransportError::InvalidAddress(addr)) if addr == "no at sign"
        ));
    }
}
