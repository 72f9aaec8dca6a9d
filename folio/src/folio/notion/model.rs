use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One cursor page of a Notion list endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct PaginatedList<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Body Notion sends alongside any non-2xx status.
#[derive(Clone, Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub status: u16,
    pub code: String,
    pub message: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Page {
    pub id: String,
    pub created_time: DateTime<Utc>,
    pub last_edited_time: DateTime<Utc>,
    #[serde(default)]
    pub icon: Option<Icon>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub properties: HashMap<String, PropertyValue>,
}

impl Page {
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn emoji(&self) -> Option<&str> {
        match &self.icon {
            Some(Icon::Emoji { emoji }) => Some(emoji.as_str()),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyValue {
    Title { title: Vec<RichText> },
    RichText { rich_text: Vec<RichText> },
    Date { date: Option<DateValue> },
    People { people: Vec<Person> },
    Select { select: Option<SelectOption> },
    MultiSelect { multi_select: Vec<SelectOption> },
    Checkbox { checkbox: bool },
    Url { url: Option<String> },
    #[serde(other)]
    Unsupported,
}

impl PropertyValue {
    /// Concatenated plain text of a title or rich_text property.
    pub fn plain_text(&self) -> Option<String> {
        match self {
            PropertyValue::Title { title: spans } | PropertyValue::RichText { rich_text: spans } => {
                Some(plain_text(spans))
            }
            PropertyValue::Url { url } => url.clone(),
            PropertyValue::Select { select } => select.as_ref().map(|s| s.name.clone()),
            _ => None,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            PropertyValue::Date { date: Some(value) } => value.start_date(),
            _ => None,
        }
    }

    pub fn people_names(&self) -> Vec<String> {
        match self {
            PropertyValue::People { people } => {
                people.iter().filter_map(|p| p.name.clone()).collect()
            }
            _ => vec![],
        }
    }

    pub fn checkbox(&self) -> Option<bool> {
        match self {
            PropertyValue::Checkbox { checkbox } => Some(*checkbox),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct DateValue {
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
}

impl DateValue {
    /// `start` may be a bare date or a full timestamp; only the date part is kept.
    pub fn start_date(&self) -> Option<NaiveDate> {
        let date_part = self.start.get(..10).unwrap_or(&self.start);
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SelectOption {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Icon {
    Emoji { emoji: String },
    External { external: ExternalFile },
    File { file: HostedFile },
    #[serde(other)]
    Unsupported,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ExternalFile {
    pub url: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct HostedFile {
    pub url: String,
    #[serde(default)]
    pub expiry_time: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileSource {
    External { external: ExternalFile },
    File { file: HostedFile },
}

impl FileSource {
    pub fn url(&self) -> &str {
        match self {
            FileSource::External { external } => &external.url,
            FileSource::File { file } => &file.url,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Annotations {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub underline: bool,
    pub code: bool,
    pub color: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RichText {
    pub plain_text: String,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub annotations: Annotations,
}

pub fn plain_text(spans: &[RichText]) -> String {
    spans.iter().map(|s| s.plain_text.as_str()).collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(default)]
    pub has_children: bool,
    #[serde(flatten)]
    pub kind: BlockKind,
    /// Filled in by enrichment; Notion never inlines children in list responses.
    #[serde(skip)]
    pub children: Vec<Block>,
}

impl Block {
    pub fn needs_children(&self) -> bool {
        self.has_children && self.children.is_empty()
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    Paragraph {
        paragraph: TextBlock,
    },
    #[serde(rename = "heading_1")]
    Heading1 {
        heading_1: TextBlock,
    },
    #[serde(rename = "heading_2")]
    Heading2 {
        heading_2: TextBlock,
    },
    #[serde(rename = "heading_3")]
    Heading3 {
        heading_3: TextBlock,
    },
    BulletedListItem {
        bulleted_list_item: TextBlock,
    },
    NumberedListItem {
        numbered_list_item: TextBlock,
    },
    ToDo {
        to_do: ToDoBlock,
    },
    Toggle {
        toggle: TextBlock,
    },
    Quote {
        quote: TextBlock,
    },
    Callout {
        callout: CalloutBlock,
    },
    Code {
        code: CodeBlock,
    },
    Image {
        image: ImageBlock,
    },
    Video {
        video: MediaBlock,
    },
    Bookmark {
        bookmark: LinkBlock,
    },
    Embed {
        embed: LinkBlock,
    },
    Equation {
        equation: EquationBlock,
    },
    Divider {},
    TableOfContents {},
    #[serde(other)]
    Unsupported,
}

impl BlockKind {
    /// Heading level (1-3) and text for the three heading kinds.
    pub fn heading(&self) -> Option<(u8, &TextBlock)> {
        match self {
            BlockKind::Heading1 { heading_1 } => Some((1, heading_1)),
            BlockKind::Heading2 { heading_2 } => Some((2, heading_2)),
            BlockKind::Heading3 { heading_3 } => Some((3, heading_3)),
            _ => None,
        }
    }

    pub fn image(&self) -> Option<&ImageBlock> {
        match self {
            BlockKind::Image { image } => Some(image),
            _ => None,
        }
    }

    pub fn image_mut(&mut self) -> Option<&mut ImageBlock> {
        match self {
            BlockKind::Image { image } => Some(image),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TextBlock {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ToDoBlock {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
    #[serde(default)]
    pub checked: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CalloutBlock {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
    #[serde(default)]
    pub icon: Option<Icon>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CodeBlock {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub caption: Vec<RichText>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ImageBlock {
    #[serde(flatten)]
    pub source: FileSource,
    #[serde(default)]
    pub caption: Vec<RichText>,
    #[serde(skip)]
    pub dimensions: Option<ImageDimensions>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MediaBlock {
    #[serde(flatten)]
    pub source: FileSource,
    #[serde(default)]
    pub caption: Vec<RichText>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LinkBlock {
    pub url: String,
    #[serde(default)]
    pub caption: Vec<RichText>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EquationBlock {
    pub expression: String,
}
