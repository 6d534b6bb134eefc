//! Prompt construction

use outreach_common::types::{PersonalizationLevel, Tone};
use std::fmt::Write;

use super::EmailGenerationInput;

fn greeting_rule(tone: Tone) -> &'static str {
    match tone {
        Tone::Casual => "Open with \"Hi <first name>,\" or \"Hey <first name>,\" using the recipient's real first name. Keep the voice relaxed and conversational.",
        Tone::Professional => "Open with \"Hi <first name>,\" or \"Hello <first name>,\" using the recipient's real first name. Keep the voice clear, warm and businesslike.",
        Tone::Formal => "Open with \"Dear <full name>,\" using the recipient's real name. Keep the voice courteous and formal, without contractions.",
    }
}

fn personalization_guidance(level: PersonalizationLevel) -> &'static str {
    match level {
        PersonalizationLevel::Low => "Keep personalization light: mention the recipient's company by name and otherwise focus on the offer.",
        PersonalizationLevel::Medium => "Reference the recipient's company and industry and connect the offer to a challenge that industry commonly faces.",
        PersonalizationLevel::High => "Make the email read as if written for this one person: open with an observation specific to their company, and tie the value proposition to their industry and size.",
    }
}

/// Fixed copywriting instructions, parameterized only by style
pub fn system_prompt(input: &EmailGenerationInput) -> String {
    let (min_words, max_words) = input.style.length.word_range();

    format!(
        "You are an expert B2B cold-email copywriter. You write short, specific emails that read as if a thoughtful person wrote them by hand.

Rules:
- Write the entire email in {language}.
- Never use placeholder brackets such as [Name], [Company] or {{first_name}}. If a detail is unknown, write around it.
- Avoid cliches and filler such as \"I hope this email finds you well\", \"I wanted to reach out\", \"synergy\", \"game-changer\" or \"circle back\".
- Greeting: {greeting}
- Subject line: at most 50 characters, specific to the recipient, no clickbait and no ALL CAPS.
- Body: between {min_words} and {max_words} words.
- End with exactly one clear call to action.
- Sign off with the sender's name and, when given, their title and company.

Respond in exactly this format and nothing else:
SUBJECT: <subject line>
BODY:
<email body>",
        language = input.style.language,
        greeting = greeting_rule(input.style.tone),
    )
}

/// Per-recipient details and preferences
pub fn user_prompt(input: &EmailGenerationInput) -> String {
    let mut prompt = String::from("Write a cold email for the following campaign.\n\nCampaign:\n");

    let campaign = &input.campaign;
    let _ = writeln!(prompt, "- Name: {}", campaign.name);
    push_field(&mut prompt, "Category", campaign.category.as_deref());
    push_field(&mut prompt, "Description", campaign.description.as_deref());
    push_field(
        &mut prompt,
        "Value proposition",
        campaign.value_proposition.as_deref(),
    );
    push_field(&mut prompt, "Call to action", campaign.call_to_action.as_deref());

    prompt.push_str("\nSender:\n");
    push_field(&mut prompt, "Name", input.sender.name.as_deref());
    push_field(&mut prompt, "Title", input.sender.title.as_deref());
    push_field(&mut prompt, "Company", input.sender.company.as_deref());

    let recipient = &input.recipient;
    prompt.push_str("\nRecipient:\n");
    push_field(&mut prompt, "Name", recipient.name.as_deref());
    push_field(&mut prompt, "Company", recipient.company_name.as_deref());
    push_field(&mut prompt, "Industry", recipient.industry.as_deref());
    if let Some(count) = recipient.employee_count {
        let _ = writeln!(prompt, "- Employees: {}", count);
    }

    let style = &input.style;
    let _ = write!(
        prompt,
        "\nStyle:\n- Language: {}\n- Tone: {}\n- Length: {}\n- Personalization: {}\n\n{}\n",
        style.language,
        style.tone,
        style.length,
        style.personalization,
        personalization_guidance(style.personalization),
    );

    prompt
}

fn push_field(prompt: &mut String, label: &str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        let _ = writeln!(prompt, "- {}: {}", label, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personalize::{CampaignBrief, SenderIdentity, StylePreferences};
    use outreach_common::types::EmailLength;
    use outreach_storage::models::RecipientProfile;

    fn input() -> EmailGenerationInput {
        EmailGenerationInput {
            campaign: CampaignBrief {
                name: "Warehouse automation".to_string(),
                category: Some("Logistics".to_string()),
                description: None,
                value_proposition: Some("Cut picking errors by 40%".to_string()),
                call_to_action: Some("Book a 15 minute call".to_string()),
            },
            sender: SenderIdentity {
                name: Some("Dana Reyes".to_string()),
                company: Some("Pickwise".to_string()),
                title: None,
            },
            recipient: RecipientProfile {
                email: "ops@northwind.test".to_string(),
                name: Some("Sam Ortiz".to_string()),
                company_name: Some("Northwind".to_string()),
                industry: Some("Distribution".to_string()),
                employee_count: Some(250),
            },
            style: StylePreferences {
                language: "German".to_string(),
                tone: Tone::Formal,
                length: EmailLength::Short,
                personalization: PersonalizationLevel::High,
            },
        }
    }

    #[test]
    fn test_system_prompt_carries_style() {
        let prompt = system_prompt(&input());
        assert!(prompt.contains("in German"));
        assert!(prompt.contains("between 50 and 100 words"));
        assert!(prompt.contains("Dear <full name>"));
        assert!(prompt.contains("{first_name}"));
        assert!(prompt.contains("SUBJECT: <subject line>\nBODY:"));
    }

    #[test]
    fn test_user_prompt_skips_missing_fields() {
        let prompt = user_prompt(&input());
        assert!(prompt.contains("- Value proposition: Cut picking errors by 40%"));
        assert!(prompt.contains("- Company: Northwind"));
        assert!(prompt.contains("- Employees: 250"));
        assert!(prompt.contains("- Tone: formal"));
        assert!(!prompt.contains("Description"));
        assert!(!prompt.contains("Title"));
        assert!(prompt.contains(personalization_guidance(PersonalizationLevel::High)));
    }
}
