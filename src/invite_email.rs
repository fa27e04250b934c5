use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Serialize;
use url::form_urlencoded::byte_serialize;

pub const FROM_ADDRESS: &str = "Fifados <onboarding@resend.dev>";
pub const SUBJECT: &str = "¡Te han invitado a Fifados!";

/// A rendered invitation, ready to hand to a mail provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvitationEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

pub fn register_link(app_url: &str, email: &str) -> String {
    format!(
        "{}/register?email={}",
        app_url.trim_end_matches('/'),
        byte_serialize(email.as_bytes()).collect::<String>()
    )
}

pub fn render_invitation(inviter: Option<&str>, to: &str, app_url: &str) -> InvitationEmail {
    let inviter = inviter
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("Un usuario");
    let link = register_link(app_url, to);
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h1 style="color: #1E3D8F;">¡Bienvenido a Fifados!</h1>
  <p>{inviter} te ha invitado a unirte a Fifados para registrar sus partidos.</p>
  <p>Para comenzar, haz clic en el siguiente enlace:</p>
  <a href="{link}" style="display: inline-block; background-color: #1E3D8F; color: white; padding: 12px 24px; text-decoration: none; border-radius: 4px;">Crear mi cuenta</a>
  <p style="color: #666; margin-top: 20px;">Si no esperabas esta invitación, puedes ignorar este correo.</p>
</div>"#,
        inviter = encode_text(inviter),
        link = encode_double_quoted_attribute(&link),
    );

    InvitationEmail {
        from: FROM_ADDRESS.to_string(),
        to: to.to_string(),
        subject: SUBJECT.to_string(),
        html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_the_inviter_and_links_to_register() {
        let mail = render_invitation(Some("Ana"), "beto@x.io", "https://fifados.app/");
        assert_eq!(mail.from, FROM_ADDRESS);
        assert_eq!(mail.to, "beto@x.io");
        assert_eq!(mail.subject, SUBJECT);
        assert!(mail.html.contains("Ana te ha invitado"));
        assert!(
            mail.html
                .contains("https://fifados.app/register?email=beto%40x.io")
        );
    }

    #[test]
    fn anonymous_inviter_falls_back() {
        let mail = render_invitation(None, "c@x.io", "http://localhost:3000");
        assert!(mail.html.contains("Un usuario te ha invitado"));
        let blank = render_invitation(Some("  "), "c@x.io", "http://localhost:3000");
        assert!(blank.html.contains("Un usuario te ha invitado"));
    }

    #[test]
    fn inviter_name_is_escaped() {
        let mail = render_invitation(Some("<b>x</b>"), "c@x.io", "http://h");
        assert!(mail.html.contains("&lt;b&gt;x&lt;/b&gt;"));
    }

    #[test]
    fn plus_addresses_are_encoded() {
        assert_eq!(
            register_link("http://h", "a+b@x.io"),
            "http://h/register?email=a%2Bb%40x.io"
        );
    }

    #[test]
    fn link_is_escaped_inside_the_href() {
        let mail = render_invitation(Some("Ana"), "c@x.io", "http://h/\"onclick=\"x");
        let href = r#"href="http://h/&quot;onclick=&quot;x/register?email=c%40x.io""#;
        assert!(mail.html.contains(href));
    }
}
