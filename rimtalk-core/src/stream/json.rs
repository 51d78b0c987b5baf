//! Incremental extraction of JSON objects from streamed text
//!
//! Prompts ask the model to answer with a JSON array of objects. While the
//! text is still arriving, each object can be handed to the caller as soon
//! as its closing brace is seen instead of waiting for the whole array.

use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tracing::warn;

/// Splits streamed text into complete top-level JSON objects and
/// deserializes each one as `T`.
///
/// Text outside of objects (array brackets, commas, prose) is skipped.
/// Objects that do not deserialize as `T` are logged and dropped.
#[derive(Debug)]
pub struct JsonObjectStream<T> {
    current: String,
    depth: usize,
    in_string: bool,
    escaped: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for JsonObjectStream<T> {
    fn default() -> Self {
        Self {
            current: String::new(),
            depth: 0,
            in_string: false,
            escaped: false,
            _marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> JsonObjectStream<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next piece of text; returns the objects it completed
    pub fn push(&mut self, text: &str) -> Vec<T> {
        let mut items = Vec::new();

        for c in text.chars() {
            if self.depth == 0 {
                if c == '{' {
                    self.depth = 1;
                    self.current.push(c);
                }
                continue;
            }

            self.current.push(c);

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if c == '\\' {
                    self.escaped = true;
                } else if c == '"' {
                    self.in_string = false;
                }
                continue;
            }

            match c {
                '"' => self.in_string = true,
                '{' => self.depth += 1,
                '}' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        if let Some(item) = self.take_object() {
                            items.push(item);
                        }
                    }
                }
                _ => {}
            }
        }

        items
    }

    /// Whether an object has been opened but not yet closed
    pub fn is_mid_object(&self) -> bool {
        self.depth > 0
    }

    fn take_object(&mut self) -> Option<T> {
        let object = std::mem::take(&mut self.current);
        match serde_json::from_str(&object) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping streamed object that failed to parse: {}\nJSON: {}", e, object);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Line {
        name: String,
        text: String,
    }

    #[test]
    fn test_objects_emitted_as_they_close() {
        let mut parser = JsonObjectStream::<Line>::new();
        assert!(parser.push(r#"[{"name":"Ada","te"#).is_empty());
        assert!(parser.is_mid_object());

        let items = parser.push(r#"xt":"Hi"},{"name":"Bo","text":"Yo"}]"#);
        assert_eq!(
            items,
            vec![
                Line { name: "Ada".into(), text: "Hi".into() },
                Line { name: "Bo".into(), text: "Yo".into() },
            ]
        );
        assert!(!parser.is_mid_object());
    }

    #[test]
    fn test_braces_inside_strings_are_not_structural() {
        let mut parser = JsonObjectStream::<Line>::new();
        let items = parser.push(r#"{"name":"A","text":"a } and \" { b"}"#);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "a } and \" { b");
    }

    #[test]
    fn test_undecodable_object_is_skipped() {
        let mut parser = JsonObjectStream::<Line>::new();
        let items = parser.push(r#"[{"name":"A"},{"name":"B","text":"ok"}]"#);
        assert_eq!(items, vec![Line { name: "B".into(), text: "ok".into() }]);
    }
}
