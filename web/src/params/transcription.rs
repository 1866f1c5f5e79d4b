use utoipa::ToSchema;

/// Multipart form accepted by the transcription endpoint. Only used for the OpenAPI docs;
/// the handler reads the fields off the stream.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct UploadForm {
    /// The recording (mp3, mp4, m4a, wav, webm, ogg or flac)
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    pub language: Option<String>,
    /// Vocabulary or context hint for the provider
    pub prompt: Option<String>,
    pub prefer_provider: Option<String>,
}
