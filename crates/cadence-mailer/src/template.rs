use cadence_core::intent::IntentKind;
use cadence_core::Contact;
use cadence_pipeline::{PipelineError, RenderedMessage, TemplateRenderer};
use chrono::NaiveDate;
use minijinja::{context, Environment};

const BIRTHDAY_SUBJECT: &str = "Happy Birthday, {{ first_name }}!";
const BIRTHDAY_BODY: &str = "Hi {{ first_name }},\n\nWishing you a wonderful birthday on {{ target_date }}.\n\nWarm regards";

const EFFECTIVE_DATE_SUBJECT: &str = "Your plan anniversary is coming up";
const EFFECTIVE_DATE_BODY: &str = "Hi {{ first_name }},\n\nYour plan's effective-date anniversary falls on {{ target_date }}. Reach out if you'd like to review your coverage.\n\nWarm regards";

const AEP_SUBJECT: &str = "Annual Enrollment Period is open";
const AEP_BODY: &str = "Hi {{ first_name }},\n\nThe Annual Enrollment Period runs through December 7th. Now is a great time to review your plan.\n\nWarm regards";

const POST_WINDOW_SUBJECT: &str = "Following up on your coverage";
const POST_WINDOW_BODY: &str = "Hi {{ first_name }},\n\nJust checking in now that your enrollment window has closed. Let us know if you have questions.\n\nWarm regards";

/// Default [`TemplateRenderer`], backed by `minijinja`.
///
/// Ships one built-in subject/body pair per [`IntentKind`] (§10.5's
/// supplemented templating surface); callers needing organization-specific
/// copy should implement [`TemplateRenderer`] directly instead.
pub struct MinijinjaTemplateRenderer {
    env: Environment<'static>,
}

impl std::fmt::Debug for MinijinjaTemplateRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinijinjaTemplateRenderer").finish()
    }
}

impl Default for MinijinjaTemplateRenderer {
    fn default() -> Self {
        let mut env = Environment::new();
        env.add_template("birthday.subject", BIRTHDAY_SUBJECT).unwrap();
        env.add_template("birthday.body", BIRTHDAY_BODY).unwrap();
        env.add_template("effective_date.subject", EFFECTIVE_DATE_SUBJECT).unwrap();
        env.add_template("effective_date.body", EFFECTIVE_DATE_BODY).unwrap();
        env.add_template("aep.subject", AEP_SUBJECT).unwrap();
        env.add_template("aep.body", AEP_BODY).unwrap();
        env.add_template("post_window.subject", POST_WINDOW_SUBJECT).unwrap();
        env.add_template("post_window.body", POST_WINDOW_BODY).unwrap();
        Self { env }
    }
}

impl TemplateRenderer for MinijinjaTemplateRenderer {
    fn render(
        &self,
        kind: IntentKind,
        contact: &Contact,
        target_date: NaiveDate,
    ) -> Result<RenderedMessage, PipelineError> {
        let first_name = contact.first_name.as_deref().unwrap_or("there");
        let ctx = context! {
            first_name => first_name,
            target_date => target_date.to_string(),
        };

        let prefix = kind.as_str();
        let subject = self
            .env
            .get_template(&format!("{prefix}.subject"))
            .and_then(|t| t.render(&ctx))
            .map_err(|e| render_error(contact, e))?;
        let body = self
            .env
            .get_template(&format!("{prefix}.body"))
            .and_then(|t| t.render(&ctx))
            .map_err(|e| render_error(contact, e))?;

        Ok(RenderedMessage {
            to: contact.email.clone(),
            subject,
            body: Some(body),
            html_body: None,
        })
    }
}

fn render_error(contact: &Contact, source: minijinja::Error) -> PipelineError {
    PipelineError::Render {
        contact_id: contact.id.to_string(),
        source: source.to_string(),
    }
}
