use std::collections::BTreeMap;
use std::fmt;

use serde::de::Error as _;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

/// The closed set of content-block types an editor may place in a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Header,
    Text,
    Button,
    Image,
    Divider,
    Spacer,
}

impl BlockKind {
    pub const ALL: [BlockKind; 6] = [
        BlockKind::Header,
        BlockKind::Text,
        BlockKind::Button,
        BlockKind::Image,
        BlockKind::Divider,
        BlockKind::Spacer,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            BlockKind::Header => "header",
            BlockKind::Text => "text",
            BlockKind::Button => "button",
            BlockKind::Image => "image",
            BlockKind::Divider => "divider",
            BlockKind::Spacer => "spacer",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == raw)
    }

    /// Seed content handed to the editor when a block of this kind is added.
    pub fn default_content(self) -> BlockContent {
        match self {
            BlockKind::Header => BlockContent::Header(HeaderContent {
                heading: "Welcome to {{COMPANY_NAME}}".to_string(),
                subheading: None,
            }),
            BlockKind::Text => BlockContent::Text(TextContent {
                text: "Write something for your customers.".to_string(),
            }),
            BlockKind::Button => BlockContent::Button(ButtonContent {
                button: ButtonStyle {
                    text: "Book an appointment".to_string(),
                    url: "{{BOOKING_URL}}".to_string(),
                    background_color: "{{PRIMARY_COLOR}}".to_string(),
                    text_color: "#ffffff".to_string(),
                },
            }),
            BlockKind::Image => BlockContent::Image(ImageContent {
                url: "{{LOGO_URL}}".to_string(),
                alt: "Logo".to_string(),
                width: None,
            }),
            BlockKind::Divider => BlockContent::Divider,
            BlockKind::Spacer => BlockContent::Spacer(SpacerContent { height: 24 }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderContent {
    pub heading: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subheading: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
}

/// Nested styling object for call-to-action buttons; camelCase on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonStyle {
    pub text: String,
    pub url: String,
    pub background_color: String,
    pub text_color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonContent {
    pub button: ButtonStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    pub url: String,
    pub alt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpacerContent {
    pub height: u16,
}

/// Typed content for one block. `Unknown` captures kinds (or field contracts)
/// this build no longer recognizes so historical revisions keep loading; new
/// saves reject it during validation.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockContent {
    Header(HeaderContent),
    Text(TextContent),
    Button(ButtonContent),
    Image(ImageContent),
    Divider,
    Spacer(SpacerContent),
    Unknown { kind: String, content: Value },
}

impl BlockContent {
    pub fn kind_label(&self) -> &str {
        match self {
            BlockContent::Header(_) => BlockKind::Header.label(),
            BlockContent::Text(_) => BlockKind::Text.label(),
            BlockContent::Button(_) => BlockKind::Button.label(),
            BlockContent::Image(_) => BlockKind::Image.label(),
            BlockContent::Divider => BlockKind::Divider.label(),
            BlockContent::Spacer(_) => BlockKind::Spacer.label(),
            BlockContent::Unknown { kind, .. } => kind,
        }
    }

    fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            BlockContent::Header(content) => serde_json::to_value(content),
            BlockContent::Text(content) => serde_json::to_value(content),
            BlockContent::Button(content) => serde_json::to_value(content),
            BlockContent::Image(content) => serde_json::to_value(content),
            BlockContent::Divider => Ok(json!({})),
            BlockContent::Spacer(content) => serde_json::to_value(content),
            BlockContent::Unknown { content, .. } => Ok(content.clone()),
        }
    }

    fn from_raw(kind: &str, content: Value) -> Self {
        let Some(known) = BlockKind::parse(kind) else {
            return BlockContent::Unknown {
                kind: kind.to_string(),
                content,
            };
        };

        let parsed = match known {
            BlockKind::Header => {
                serde_json::from_value::<HeaderContent>(content.clone()).map(BlockContent::Header)
            }
            BlockKind::Text => {
                serde_json::from_value::<TextContent>(content.clone()).map(BlockContent::Text)
            }
            BlockKind::Button => {
                serde_json::from_value::<ButtonContent>(content.clone()).map(BlockContent::Button)
            }
            BlockKind::Image => {
                serde_json::from_value::<ImageContent>(content.clone()).map(BlockContent::Image)
            }
            BlockKind::Divider => Ok(BlockContent::Divider),
            BlockKind::Spacer => {
                serde_json::from_value::<SpacerContent>(content.clone()).map(BlockContent::Spacer)
            }
        };

        // A known kind whose content no longer matches the contract is still
        // loadable history; validation keeps it out of new saves.
        parsed.unwrap_or(BlockContent::Unknown {
            kind: kind.to_string(),
            content,
        })
    }
}

/// One positioned block inside a layout. The `id` is an editing-session-local
/// ordering key supplied by the editor, not a persistent identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: u64,
    pub content: BlockContent,
}

impl Block {
    pub fn new(id: u64, content: BlockContent) -> Self {
        Self { id, content }
    }
}

impl Serialize for Block {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let content = self.content.to_value().map_err(serde::ser::Error::custom)?;
        let mut state = serializer.serialize_struct("Block", 3)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("type", self.content.kind_label())?;
        state.serialize_field("content", &content)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Block {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct RawBlock {
            #[serde(default)]
            id: u64,
            #[serde(rename = "type")]
            kind: String,
            #[serde(default)]
            content: Value,
        }

        let raw = RawBlock::deserialize(deserializer)?;
        if raw.kind.is_empty() {
            return Err(D::Error::custom("block type must not be empty"));
        }

        Ok(Block {
            id: raw.id,
            content: BlockContent::from_raw(&raw.kind, raw.content),
        })
    }
}

/// Ordered sequence of blocks; order is significant and preserved exactly
/// through save, load, and render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutDocument(pub Vec<Block>);

impl LayoutDocument {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self(blocks)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Field-level validation messages keyed by dotted field path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(pub BTreeMap<String, String>);

impl FieldErrors {
    fn push(&mut self, path: &str, message: &str) {
        self.0.insert(path.to_string(), message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (path, message) in &self.0 {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{path}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BlockValidationError {
    #[error("block {index}: unrecognized block type '{kind}'")]
    UnknownKind { index: usize, kind: String },
    #[error("block {index} ({kind}): {errors}")]
    Fields {
        index: usize,
        kind: String,
        errors: FieldErrors,
    },
}

/// Every validation failure across a layout, reported together so the editor
/// can surface all problems in one round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutErrors(pub Vec<BlockValidationError>);

impl std::error::Error for LayoutErrors {}

impl fmt::Display for LayoutErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for error in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{error}")?;
            first = false;
        }
        Ok(())
    }
}

/// Validate a layout for saving. Unknown kinds and missing or mistyped
/// required fields block the save; nothing is written on failure.
pub fn validate_layout(layout: &LayoutDocument) -> Result<(), LayoutErrors> {
    let mut errors = Vec::new();

    for (index, block) in layout.blocks().iter().enumerate() {
        match &block.content {
            BlockContent::Header(content) => {
                let mut fields = FieldErrors::default();
                require_text(&mut fields, "heading", &content.heading);
                push_field_errors(&mut errors, index, BlockKind::Header, fields);
            }
            BlockContent::Text(content) => {
                let mut fields = FieldErrors::default();
                require_text(&mut fields, "text", &content.text);
                push_field_errors(&mut errors, index, BlockKind::Text, fields);
            }
            BlockContent::Button(content) => {
                let mut fields = FieldErrors::default();
                require_text(&mut fields, "button.text", &content.button.text);
                require_text(&mut fields, "button.url", &content.button.url);
                require_text(
                    &mut fields,
                    "button.backgroundColor",
                    &content.button.background_color,
                );
                require_text(&mut fields, "button.textColor", &content.button.text_color);
                push_field_errors(&mut errors, index, BlockKind::Button, fields);
            }
            BlockContent::Image(content) => {
                let mut fields = FieldErrors::default();
                require_text(&mut fields, "url", &content.url);
                require_text(&mut fields, "alt", &content.alt);
                push_field_errors(&mut errors, index, BlockKind::Image, fields);
            }
            BlockContent::Divider | BlockContent::Spacer(_) => {}
            BlockContent::Unknown { kind, content } => match BlockKind::parse(kind) {
                Some(known) => {
                    let fields = contract_errors(known, content);
                    push_field_errors(&mut errors, index, known, fields);
                }
                None => errors.push(BlockValidationError::UnknownKind {
                    index,
                    kind: kind.clone(),
                }),
            },
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(LayoutErrors(errors))
    }
}

fn push_field_errors(
    errors: &mut Vec<BlockValidationError>,
    index: usize,
    kind: BlockKind,
    fields: FieldErrors,
) {
    if !fields.is_empty() {
        errors.push(BlockValidationError::Fields {
            index,
            kind: kind.label().to_string(),
            errors: fields,
        });
    }
}

fn require_text(fields: &mut FieldErrors, path: &str, value: &str) {
    if value.trim().is_empty() {
        fields.push(path, "must not be empty");
    }
}

/// Field-presence diagnostics for a known kind whose content failed the typed
/// parse, so save rejections name the offending fields.
fn contract_errors(kind: BlockKind, content: &Value) -> FieldErrors {
    let mut fields = FieldErrors::default();

    match kind {
        BlockKind::Header => require_raw_string(&mut fields, content, "heading"),
        BlockKind::Text => require_raw_string(&mut fields, content, "text"),
        BlockKind::Button => match content.get("button") {
            Some(button) if button.is_object() => {
                for field in ["text", "url", "backgroundColor", "textColor"] {
                    if !button.get(field).map(Value::is_string).unwrap_or(false) {
                        fields.push(&format!("button.{field}"), "required string field");
                    }
                }
            }
            _ => fields.push("button", "required object field"),
        },
        BlockKind::Image => {
            require_raw_string(&mut fields, content, "url");
            require_raw_string(&mut fields, content, "alt");
            if let Some(width) = content.get("width") {
                if !width.is_null() && !width.is_u64() {
                    fields.push("width", "must be a non-negative integer");
                }
            }
        }
        BlockKind::Divider => {}
        BlockKind::Spacer => {
            if !content.get("height").map(Value::is_u64).unwrap_or(false) {
                fields.push("height", "required integer field");
            }
        }
    }

    if fields.is_empty() {
        // Parse failed but every contract probe passed (e.g. an out-of-range
        // integer); report the block rather than silently accepting it.
        fields.push("content", "does not match the block's field contract");
    }

    fields
}

fn require_raw_string(fields: &mut FieldErrors, content: &Value, path: &str) {
    if !content.get(path).map(Value::is_string).unwrap_or(false) {
        fields.push(path, "required string field");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_round_trips_through_json_in_order() {
        let layout = LayoutDocument::new(vec![
            Block::new(1, BlockKind::Header.default_content()),
            Block::new(2, BlockKind::Text.default_content()),
            Block::new(3, BlockKind::Button.default_content()),
        ]);

        let encoded = serde_json::to_string(&layout).expect("layout encodes");
        let decoded: LayoutDocument = serde_json::from_str(&encoded).expect("layout decodes");
        assert_eq!(decoded, layout);
    }

    #[test]
    fn unrecognized_kind_survives_deserialization() {
        let raw = r#"[{"id": 7, "type": "countdown", "content": {"until": "2026-01-01"}}]"#;
        let layout: LayoutDocument = serde_json::from_str(raw).expect("legacy layout loads");

        match &layout.blocks()[0].content {
            BlockContent::Unknown { kind, .. } => assert_eq!(kind, "countdown"),
            other => panic!("expected unknown block, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_kind_is_rejected_on_save() {
        let layout = LayoutDocument::new(vec![Block::new(
            1,
            BlockContent::Unknown {
                kind: "countdown".to_string(),
                content: json!({}),
            },
        )]);

        let errors = validate_layout(&layout).expect_err("unknown kind blocks the save");
        assert!(matches!(
            errors.0[0],
            BlockValidationError::UnknownKind { index: 0, .. }
        ));
    }

    #[test]
    fn missing_button_fields_are_reported_by_path() {
        let raw = r#"[{"id": 1, "type": "button", "content": {"button": {"text": "Go"}}}]"#;
        let layout: LayoutDocument = serde_json::from_str(raw).expect("layout loads leniently");

        let errors = validate_layout(&layout).expect_err("incomplete button rejected");
        match &errors.0[0] {
            BlockValidationError::Fields { kind, errors, .. } => {
                assert_eq!(kind, "button");
                assert!(errors.0.contains_key("button.url"));
                assert!(errors.0.contains_key("button.backgroundColor"));
            }
            other => panic!("expected field errors, got {other:?}"),
        }
    }

    #[test]
    fn default_content_passes_validation_for_every_kind() {
        let layout = LayoutDocument::new(
            BlockKind::ALL
                .into_iter()
                .enumerate()
                .map(|(index, kind)| Block::new(index as u64, kind.default_content()))
                .collect(),
        );

        assert!(validate_layout(&layout).is_ok());
    }
}
