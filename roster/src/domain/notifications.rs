//! Participant email templates.
//!
//! Templates render to [`OutboundEmail`] values; the notifier port owns
//! delivery. Every interpolated participant value is HTML-escaped.

use super::directory::TemporaryPassword;
use super::participant::{EmailAddress, UserPrincipalName};
use super::ports::OutboundEmail;

/// Sign-in portal named in welcome emails.
pub const SIGN_IN_URL: &str = "https://login.microsoftonline.com";

/// Fallback surname for intake rows without a last name.
pub const DEFAULT_SURNAME: &str = "Student";

/// Event identity shared by every template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBranding {
    /// Event name, e.g. `AI Skills Fest`.
    pub event_name: String,
    /// Public event site.
    pub event_url: String,
    /// Organiser mailbox copied on every message and linked for support.
    pub admin_cc: EmailAddress,
}

impl EventBranding {
    /// Thank-you note sent to a participant after the event.
    pub fn thank_you(&self, to: &EmailAddress, first_name: &str) -> OutboundEmail {
        let event = escape_html(&self.event_name);
        let greeting = escape_html(first_name.trim());
        let html_body = format!(
            "<html>\n<body>\n\
             <p>Dear {greeting},</p>\n\
             <p>Thank you for registering and attending the {event} event! We hope you enjoyed \
             the sessions and found them valuable.</p>\n\
             <p>We're looking forward to seeing you at future events. If you have any feedback \
             or questions, please contact our {support} about upcoming events or just say hi!</p>\n\
             {signature}\
             </body>\n</html>\n",
            support = self.support_link("support team"),
            signature = self.signature(),
        );
        OutboundEmail {
            to: to.clone(),
            cc: vec![self.admin_cc.clone()],
            subject: format!("Thank You for Attending {}!", self.event_name),
            html_body,
        }
    }

    /// Welcome note carrying a new account's credentials.
    pub fn welcome(
        &self,
        to: &EmailAddress,
        first_name: &str,
        surname: &str,
        username: &UserPrincipalName,
        password: &TemporaryPassword,
    ) -> OutboundEmail {
        let event = escape_html(&self.event_name);
        let name = escape_html(format!("{} {}", first_name.trim(), surname.trim()).trim());
        let username = escape_html(username.as_str());
        let password = escape_html(password.expose());
        let html_body = format!(
            "<html>\n<body>\n\
             <p>Hello {name},</p>\n\
             <p>Welcome to the {event} organization! We're excited to have you join us.</p>\n\
             <p>Your account has been created in our directory. Below are your login \
             credentials:</p>\n\
             <ul>\n\
             <li><strong>Username:</strong> {username}</li>\n\
             <li><strong>Temporary Password:</strong> {password}</li>\n\
             </ul>\n\
             <p><strong>Login Instructions:</strong></p>\n\
             <ol>\n\
             <li>Go to <a href=\"{SIGN_IN_URL}\">{SIGN_IN_URL}</a></li>\n\
             <li>Enter your username: {username}</li>\n\
             <li>Enter your temporary password: {password}</li>\n\
             <li>You will be prompted to change your password upon first login</li>\n\
             <li>Choose a strong, unique password that you haven't used elsewhere</li>\n\
             </ol>\n\
             <p>If you have any questions or need assistance, please contact our {support}.</p>\n\
             {signature}\
             </body>\n</html>\n",
            support = self.support_link("support team"),
            signature = self.signature(),
        );
        OutboundEmail {
            to: to.clone(),
            cc: vec![self.admin_cc.clone()],
            subject: format!("Welcome to {} Organization", self.event_name),
            html_body,
        }
    }

    fn support_link(&self, text: &str) -> String {
        format!(
            "<a href=\"mailto:{}?subject=Inquiry\">{text}</a>",
            escape_html(self.admin_cc.as_str())
        )
    }

    fn signature(&self) -> String {
        format!(
            "<p>Best regards,<br>\n<a href=\"{}\">The {} Team</a></p>\n",
            escape_html(&self.event_url),
            escape_html(&self.event_name)
        )
    }
}

fn escape_html(raw: impl AsRef<str>) -> String {
    let raw = raw.as_ref();
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn branding() -> EventBranding {
        EventBranding {
            event_name: "AI Skills Fest".to_owned(),
            event_url: "https://aiskillsfest.com".to_owned(),
            admin_cc: EmailAddress::parse("admins@aiskillsfest.net").expect("cc"),
        }
    }

    fn email(raw: &str) -> EmailAddress {
        EmailAddress::parse(raw).expect("fixture email")
    }

    #[rstest]
    fn thank_you_addresses_participant_and_copies_admins(branding: EventBranding) {
        let message = branding.thank_you(&email("ann@b.com"), "Ann");

        assert_eq!(message.to.as_str(), "ann@b.com");
        assert_eq!(message.subject, "Thank You for Attending AI Skills Fest!");
        assert_eq!(message.cc, vec![email("admins@aiskillsfest.net")]);
        assert!(message.html_body.contains("<p>Dear Ann,</p>"));
        assert!(message.html_body.contains("https://aiskillsfest.com"));
    }

    #[rstest]
    fn welcome_carries_credentials_and_sign_in_steps(branding: EventBranding) {
        let upn = UserPrincipalName::from_directory("jane.doe@aiskillsfest.net");
        let password = TemporaryPassword::new("Tmp#Secret12".to_owned());
        let message = branding.welcome(&email("jane.doe@gmail.com"), "Jane", "Doe", &upn, &password);

        assert_eq!(message.subject, "Welcome to AI Skills Fest Organization");
        assert!(message.html_body.contains("Hello Jane Doe,"));
        assert!(message.html_body.contains("jane.doe@aiskillsfest.net"));
        assert!(message.html_body.contains("Tmp#Secret12"));
        assert!(message.html_body.contains(SIGN_IN_URL));
    }

    #[rstest]
    fn interpolated_values_are_escaped(branding: EventBranding) {
        let message = branding.thank_you(&email("x@y.com"), "<script>alert('x')</script>");

        assert!(!message.html_body.contains("<script>"));
        assert!(message.html_body.contains("&lt;script&gt;"));
    }
}
