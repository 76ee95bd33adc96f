//! Prompt text for the summary request.
//!
//! Keeping the prompt here means it can be read and tested without an HTTP
//! round trip. The JSON field names it asks for are the ones
//! [`crate::output::Summary`] deserialises.

/// Instruction block placed before the document text.
pub const SUMMARY_INSTRUCTIONS: &str = r#"You are an expert at building professional presentations.
The following text was extracted from a PDF document.
Analyse it and produce a summary optimised for Google Slides.

Your answer MUST be a single valid JSON object with exactly this structure:
{
  "titulo_presentacion": "A concise, professional title for the presentation",
  "puntos_clave": [
    {
      "titulo_diapositiva": "Title of key point 1",
      "contenido_diapositiva": "One paragraph (3-4 sentences) explaining key point 1."
    },
    {
      "titulo_diapositiva": "Title of key point 2",
      "contenido_diapositiva": "One paragraph (3-4 sentences) explaining key point 2."
    },
    {
      "titulo_diapositiva": "Title of key point 3",
      "contenido_diapositiva": "One paragraph (3-4 sentences) explaining key point 3."
    }
  ]
}

Make sure the JSON is perfectly formatted. Do not include "```json" or anything before or after it.
Produce between 3 and 5 key points, depending on the content."#;

const TEXT_START: &str = "--- PDF TEXT ---";
const TEXT_END: &str = "--- END OF TEXT ---";

/// Return the first `max_chars` characters of `text`.
///
/// Counts Unicode scalar values, never splits a code point, and borrows
/// instead of copying.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Build the full prompt around already-truncated document text.
pub fn summary_prompt(document_text: &str) -> String {
    format!("{SUMMARY_INSTRUCTIONS}\n\n{TEXT_START}\n{document_text}\n{TEXT_END}\n")
}
