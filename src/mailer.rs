use crate::config::SmtpConfig;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport};
use rand::Rng;
use std::error::Error;

pub struct Mailer {
    smtp: SmtpTransport,
    from: String,
}

impl Mailer {
    /// Build a transport from the SMTP environment settings. Errors when no
    /// SMTP host is configured.
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let config = SmtpConfig::from_env().ok_or("SMTP_HOST is not configured")?;

        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let tls_parameters = TlsParameters::new(config.host.clone())?;

        let smtp = SmtpTransport::relay(&config.host)?
            .credentials(creds)
            .port(config.port)
            .tls(Tls::Wrapper(tls_parameters))
            .build();

        Ok(Mailer {
            smtp,
            from: config.from,
        })
    }

    pub fn send_password_reset(&self, to_email: &str, reset_code: &str) -> Result<(), Box<dyn Error>> {
        let email = Message::builder()
            .from(self.from.parse()?)
            .to(to_email.parse()?)
            .subject("Password Reset Request")
            .body(format!(
                "Your password reset code is: {}\nThis code will expire in 1 hour.",
                reset_code
            ))?;

        self.smtp.send(&email)?;
        Ok(())
    }

    pub fn send_invitation(&self, to_email: &str, link: &str) -> Result<(), Box<dyn Error>> {
        let email = Message::builder()
            .from(self.from.parse()?)
            .to(to_email.parse()?)
            .subject("You have been invited to a csvhub team")
            .body(format!(
                "You have been invited to collaborate on shared CSV datasets.\n\
                 Create your account here: {}\nThe invitation expires in 24 hours.",
                link
            ))?;

        self.smtp.send(&email)?;
        Ok(())
    }

    pub fn send_import_notification(
        &self,
        to_email: &str,
        dataset_name: &str,
        row_count: usize,
    ) -> Result<(), Box<dyn Error>> {
        let email = Message::builder()
            .from(self.from.parse()?)
            .to(to_email.parse()?)
            .subject("CSV import finished")
            .body(format!(
                "Your file \"{}\" was imported with {} rows.",
                dataset_name, row_count
            ))?;

        self.smtp.send(&email)?;
        Ok(())
    }
}

pub fn generate_reset_code() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();

    (0..8)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}
