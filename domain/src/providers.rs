//! Builds the pipeline's adapters from configuration.

use crate::error::{DomainErrorKind, Error};
use crate::gateway::assembly_ai::AssemblyAiClient;
use crate::gateway::mailersend::MailerSendClient;
use crate::gateway::openai::OpenAiExtractor;
use crate::gateway::smtp::{SmtpSender, SmtpSettings};
use crate::gateway::whisper::WhisperClient;
use crate::pipeline::Adapters;
use log::*;
use meeting_ai::traits::analysis::Extractor;
use meeting_ai::traits::notification::Sender;
use meeting_ai::traits::transcription::Provider as TranscriptionProvider;
use service::config::{Config, NotificationTransport, TranscriptionProviderKind};
use std::sync::Arc;
use std::time::Duration;

fn config_error(err: meeting_ai::Error) -> Error {
    Error {
        error_kind: DomainErrorKind::Config(err.to_string()),
        source: Some(Box::new(err)),
    }
}

fn missing(setting: &str) -> Error {
    Error::new(DomainErrorKind::Config(format!("{setting} is not set")))
}

/// Transcribers with an API key configured, the primary one first.
fn transcribers(config: &Config) -> Result<Vec<Arc<dyn TranscriptionProvider>>, Error> {
    let mut whisper: Option<Arc<dyn TranscriptionProvider>> = None;
    if let Some(api_key) = config.openai_api_key() {
        whisper = Some(Arc::new(
            WhisperClient::new(&api_key, config.openai_base_url(), &config.whisper_model)
                .map_err(config_error)?,
        ));
    }

    let mut assembly_ai: Option<Arc<dyn TranscriptionProvider>> = None;
    if let Some(api_key) = config.assemblyai_api_key() {
        assembly_ai = Some(Arc::new(
            AssemblyAiClient::new(
                &api_key,
                config.assemblyai_base_url(),
                Duration::from_millis(config.assemblyai_poll_interval_ms),
            )
            .map_err(config_error)?,
        ));
    }

    let ordered = match config.primary_transcription_provider {
        TranscriptionProviderKind::Whisper => [whisper, assembly_ai],
        TranscriptionProviderKind::AssemblyAi => [assembly_ai, whisper],
    };
    let providers: Vec<_> = ordered.into_iter().flatten().collect();

    if providers.is_empty() {
        return Err(missing("OPENAI_API_KEY or ASSEMBLYAI_API_KEY"));
    }
    Ok(providers)
}

fn sender(config: &Config) -> Result<Arc<dyn Sender>, Error> {
    match config.notification_transport {
        NotificationTransport::Smtp => {
            let settings = SmtpSettings {
                host: config.smtp_host.clone(),
                port: config.smtp_port,
                username: config.smtp_user(),
                password: config.smtp_password(),
                from_email: config.smtp_from_email.clone(),
                from_name: config.smtp_from_name.clone(),
            };
            Ok(Arc::new(SmtpSender::new(settings).map_err(config_error)?))
        }
        NotificationTransport::MailerSend => {
            let api_key = config
                .mailersend_api_key()
                .ok_or_else(|| missing("MAILERSEND_API_KEY"))?;
            Ok(Arc::new(
                MailerSendClient::new(
                    &api_key,
                    config.mailersend_base_url(),
                    &config.smtp_from_email,
                    &config.smtp_from_name,
                )
                .map_err(config_error)?,
            ))
        }
    }
}

/// Fails with a `Config` error when a required credential is missing.
pub fn adapters(config: &Config) -> Result<Adapters, Error> {
    let transcribers = transcribers(config)?;

    let api_key = config
        .openai_api_key()
        .ok_or_else(|| missing("OPENAI_API_KEY"))?;
    let extractor: Arc<dyn Extractor> = Arc::new(
        OpenAiExtractor::new(
            &api_key,
            config.openai_base_url(),
            &config.openai_synthesis_model,
        )
        .map_err(config_error)?,
    );

    let sender = sender(config)?;

    info!(
        "Pipeline adapters: transcription [{}], extraction {} ({}), notification {}",
        transcribers
            .iter()
            .map(|provider| provider.provider_id())
            .collect::<Vec<_>>()
            .join(", "),
        extractor.provider_id(),
        extractor.model(),
        sender.provider_id()
    );

    Ok(Adapters {
        transcribers,
        extractor,
        sender,
    })
}
