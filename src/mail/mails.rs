use super::{MailError, Mailer};

const CONFIRMATION_TEMPLATE: &str = include_str!("templates/Confirmation-email.html");

/// Replace `{{key}}` placeholders in a template
fn render(template: &str, placeholders: &[(&str, &str)]) -> String {
    let mut html = template.to_string();
    for (key, value) in placeholders {
        html = html.replace(&format!("{{{{{}}}}}", key), value);
    }
    html
}

pub async fn send_confirmation_code(
    mailer: &dyn Mailer,
    to_email: &str,
    username: &str,
    confirmation_code: &str,
) -> Result<(), MailError> {
    let subject = "Your confirmation code";
    let body = render(
        CONFIRMATION_TEMPLATE,
        &[
            ("username", username),
            ("confirmation_code", confirmation_code),
        ],
    );

    mailer.send(to_email, subject, &body).await
}
