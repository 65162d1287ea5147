use crate::models::{Classification, PickResult, UserContact};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn headline(result: Classification) -> &'static str {
    match result {
        Classification::Won => "You won! 🏆",
        Classification::Partial => "Partial win 🏁",
        Classification::Lost => "Not this time",
    }
}

/// Settlement notification for one graded pick
pub fn settlement_email(
    contact: &UserContact,
    result: &PickResult,
    dashboard_url: &str,
) -> OutboundEmail {
    let name = contact
        .display_name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or("there");

    let payout_line = if result.payout > 0 {
        format!("<p>Payout: <strong>{} credits</strong></p>", result.payout)
    } else {
        String::new()
    };

    let html = format!(
        "<h2>{headline}</h2>\
         <p>Hi {name},</p>\
         <p>Your pick for <strong>{gp}</strong> has been settled.</p>\
         <ul>\
         <li>Mode: {mode}</li>\
         <li>Correct: {correct}/{total}</li>\
         <li>Result: {result}</li>\
         </ul>\
         {payout_line}\
         <p><a href=\"{dashboard}\">View your dashboard</a></p>",
        headline = headline(result.result),
        name = escape_html(name),
        gp = escape_html(&result.gp_name),
        mode = result.mode.label(),
        correct = result.correct_count,
        total = result.total_picks,
        result = result.result.as_str(),
        payout_line = payout_line,
        dashboard = escape_html(dashboard_url),
    );

    OutboundEmail {
        to: contact.email.clone(),
        subject: format!("Your {} pick has been settled", result.gp_name),
        html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GameMode, SessionType};
    use chrono::Utc;

    fn result(outcome: Classification, payout: i64) -> PickResult {
        PickResult {
            id: "r1".to_string(),
            pick_id: "p1".to_string(),
            user_id: "u1".to_string(),
            gp_name: "Silverstone".to_string(),
            session_type: SessionType::Race,
            selections: vec![],
            correct_count: 4,
            total_picks: 5,
            mode: GameMode::Tiered,
            result: outcome,
            payout,
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn test_settlement_email_contents() {
        let contact = UserContact {
            email: "fan@example.com".to_string(),
            display_name: Some("Max".to_string()),
        };
        let email = settlement_email(
            &contact,
            &result(Classification::Partial, 100_000),
            "https://app.example.com/dashboard",
        );

        assert_eq!(email.to, "fan@example.com");
        assert!(email.subject.contains("Silverstone"));
        assert!(email.html.contains("Hi Max"));
        assert!(email.html.contains("Correct: 4/5"));
        assert!(email.html.contains("Result: partial"));
        assert!(email.html.contains("Mode: Tiered"));
        assert!(email.html.contains("100000 credits"));
        assert!(email.html.contains("https://app.example.com/dashboard"));
    }

    #[test]
    fn test_lost_email_has_no_payout_and_escapes_name() {
        let contact = UserContact {
            email: "fan@example.com".to_string(),
            display_name: Some("<b>Kimi</b>".to_string()),
        };
        let email = settlement_email(&contact, &result(Classification::Lost, 0), "/dashboard");
        assert!(!email.html.contains("Payout"));
        assert!(email.html.contains("&lt;b&gt;Kimi&lt;/b&gt;"));
    }

    #[test]
    fn test_missing_display_name_falls_back() {
        let contact = UserContact {
            email: "fan@example.com".to_string(),
            display_name: None,
        };
        let email = settlement_email(&contact, &result(Classification::Won, 10), "/dashboard");
        assert!(email.html.contains("Hi there"));
    }
}
