//! Data produced by the pipeline stages.

use serde::{Deserialize, Serialize};

/// Bounds on the number of key points a well-formed summary carries.
pub const MIN_KEY_POINTS: usize = 3;
pub const MAX_KEY_POINTS: usize = 5;

/// Structured summary returned by the model.
///
/// The field names on the wire are the ones the prompt asks for
/// (`titulo_presentacion`, `puntos_clave`); the Rust side uses English names.
/// `key_points` order is slide order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(rename = "titulo_presentacion")]
    pub title: String,
    #[serde(rename = "puntos_clave")]
    pub key_points: Vec<KeyPoint>,
}

/// One content slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPoint {
    #[serde(rename = "titulo_diapositiva")]
    pub slide_title: String,
    #[serde(rename = "contenido_diapositiva")]
    pub slide_body: String,
}

impl KeyPoint {
    pub fn new(slide_title: impl Into<String>, slide_body: impl Into<String>) -> Self {
        Self {
            slide_title: slide_title.into(),
            slide_body: slide_body.into(),
        }
    }
}

impl Summary {
    pub fn new(title: impl Into<String>, key_points: Vec<KeyPoint>) -> Self {
        Self {
            title: title.into(),
            key_points,
        }
    }

    /// Check the summary against the data contract: non-blank title and
    /// between [`MIN_KEY_POINTS`] and [`MAX_KEY_POINTS`] key points, each with
    /// a non-blank title and body. Slides rejects an empty `insertText`.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("presentation title is empty".to_string());
        }
        let n = self.key_points.len();
        if !(MIN_KEY_POINTS..=MAX_KEY_POINTS).contains(&n) {
            return Err(format!(
                "expected {MIN_KEY_POINTS}–{MAX_KEY_POINTS} key points, got {n}"
            ));
        }
        if let Some(i) = self
            .key_points
            .iter()
            .position(|p| p.slide_title.trim().is_empty())
        {
            return Err(format!("key point {} has an empty title", i + 1));
        }
        if let Some(i) = self
            .key_points
            .iter()
            .position(|p| p.slide_body.trim().is_empty())
        {
            return Err(format!("key point {} has an empty body", i + 1));
        }
        Ok(())
    }
}

/// A created presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckResult {
    pub presentation_id: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(n: usize) -> Vec<KeyPoint> {
        (1..=n)
            .map(|i| KeyPoint::new(format!("P{i}"), format!("body {i}")))
            .collect()
    }

    #[test]
    fn deserialises_wire_names() {
        let json = r#"{
            "titulo_presentacion": "T",
            "puntos_clave": [
                {"titulo_diapositiva": "A", "contenido_diapositiva": "a"},
                {"titulo_diapositiva": "B", "contenido_diapositiva": "b"}
            ]
        }"#;
        let s: Summary = serde_json::from_str(json).unwrap();
        assert_eq!(s.title, "T");
        assert_eq!(s.key_points[1], KeyPoint::new("B", "b"));
    }

    #[test]
    fn validate_key_point_bounds() {
        assert!(Summary::new("T", points(2)).validate().is_err());
        assert!(Summary::new("T", points(3)).validate().is_ok());
        assert!(Summary::new("T", points(5)).validate().is_ok());
        assert!(Summary::new("T", points(6)).validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_titles() {
        assert!(Summary::new("  ", points(3)).validate().is_err());
        let mut p = points(3);
        p[2].slide_title = String::new();
        let err = Summary::new("T", p).validate().unwrap_err();
        assert!(err.contains("key point 3"), "got: {err}");
    }

    #[test]
    fn validate_rejects_blank_bodies() {
        let mut p = points(4);
        p[1].slide_body = " \n ".into();
        let err = Summary::new("T", p).validate().unwrap_err();
        assert_eq!(err, "key point 2 has an empty body");
    }
}
