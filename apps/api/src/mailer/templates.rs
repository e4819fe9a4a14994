/// A rendered email, ready to hand to the transport.
#[derive(Debug, Clone)]
pub struct EmailContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

const PRODUCT: &str = "e-Qwanza";

pub fn verification_email(first_name: &str, link: &str) -> EmailContent {
    let subject = format!("Verify your email address - {PRODUCT}");
    let text = format!(
        "Hello {first_name},\n\n\
         Thank you for signing up to {PRODUCT}. Confirm your email address by opening this link:\n\
         {link}\n\n\
         This link expires in 24 hours.\n\
         If you did not create an account, you can ignore this email.\n"
    );
    let html = layout(
        &format!("Welcome to {PRODUCT}!"),
        &format!(
            "<p>Hello {first_name},</p>\
             <p>Thank you for signing up to {PRODUCT}. Confirm your email address with the button below:</p>\
             <p><a class=\"button\" href=\"{link}\">Verify my email</a></p>\
             <p>Or paste this link into your browser:</p><p>{link}</p>\
             <p>This link expires in 24 hours.</p>\
             <p>If you did not create an account, you can ignore this email.</p>"
        ),
    );
    EmailContent {
        subject,
        text,
        html,
    }
}

pub fn password_reset_email(first_name: &str, link: &str) -> EmailContent {
    let subject = format!("Reset your password - {PRODUCT}");
    let text = format!(
        "Hello {first_name},\n\n\
         A password reset was requested for your {PRODUCT} account. Choose a new password here:\n\
         {link}\n\n\
         This link expires in 1 hour. If you did not ask for a reset, ignore this email.\n"
    );
    let html = layout(
        "Password reset",
        &format!(
            "<p>Hello {first_name},</p>\
             <p>A password reset was requested for your {PRODUCT} account.</p>\
             <p><a class=\"button\" href=\"{link}\">Choose a new password</a></p>\
             <p>Or paste this link into your browser:</p><p>{link}</p>\
             <p>This link expires in 1 hour. If you did not ask for a reset, ignore this email.</p>"
        ),
    );
    EmailContent {
        subject,
        text,
        html,
    }
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<html><head><style>\
         body {{ font-family: Arial, sans-serif; color: #333; }}\
         .button {{ display: inline-block; padding: 12px 24px; background: #4f46e5; color: #fff; \
         text-decoration: none; border-radius: 6px; }}\
         </style></head><body>\
         <h1>{title}</h1>{body}\
         <p style=\"font-size: 12px; color: #888\">&copy; {PRODUCT}</p>\
         </body></html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_email_contains_link() {
        let email = verification_email("Ada", "http://app/verify-email?token=abc");
        assert!(email.subject.contains("Verify"));
        assert!(email.text.contains("http://app/verify-email?token=abc"));
        assert!(email.html.contains("href=\"http://app/verify-email?token=abc\""));
        assert!(email.html.contains("Hello Ada"));
    }

    #[test]
    fn test_reset_email_mentions_expiry() {
        let email = password_reset_email("Ada", "http://app/reset-password?token=xyz");
        assert!(email.text.contains("1 hour"));
        assert!(email.html.contains("reset-password?token=xyz"));
    }
}
