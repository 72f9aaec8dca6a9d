use crate::folio::notion::BlockKind;
use crate::folio::notion::model::{Block, CodeBlock, Icon, ImageBlock, RichText, plain_text};
use crate::folio::toc::{AnchorSet, TocEntry, table_of_contents};

/// Render an enriched block tree to an HTML fragment.
pub fn render_blocks(blocks: &[Block]) -> String {
    let toc = table_of_contents(blocks);
    let mut renderer = Renderer {
        anchors: AnchorSet::default(),
        toc: &toc,
        out: String::with_capacity(blocks.len() * 128),
    };
    renderer.render_sequence(blocks);
    renderer.out
}

pub fn render_rich_text(spans: &[RichText]) -> String {
    spans.iter().map(render_span).collect()
}

fn render_span(span: &RichText) -> String {
    let mut html = html_escape(&span.plain_text).replace('\n', "<br />");
    let a = &span.annotations;

    if a.code {
        html = format!("<code>{html}</code>");
    }
    if a.bold {
        html = format!("<strong>{html}</strong>");
    }
    if a.italic {
        html = format!("<em>{html}</em>");
    }
    if a.strikethrough {
        html = format!("<s>{html}</s>");
    }
    if a.underline {
        html = format!("<u>{html}</u>");
    }
    if !a.color.is_empty() && a.color != "default" {
        html = format!(
            r#"<span class="notion-{}">{html}</span>"#,
            html_escape(&a.color)
        );
    }
    if let Some(href) = &span.href {
        html = format!(r#"<a href="{}">{html}</a>"#, html_escape(href));
    }

    html
}

pub fn render_toc(entries: &[TocEntry]) -> String {
    let mut out = String::from(r#"<nav class="notion-toc"><ul>"#);
    for entry in entries {
        out.push_str(&format!(
            r##"<li class="toc-level-{}"><a href="#{}">{}</a></li>"##,
            entry.level,
            entry.anchor,
            html_escape(&entry.text)
        ));
    }
    out.push_str("</ul></nav>");
    out
}

struct Renderer<'a> {
    anchors: AnchorSet,
    toc: &'a [TocEntry],
    out: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bulleted,
    Numbered,
}

fn list_kind(block: &Block) -> Option<ListKind> {
    match block.kind {
        BlockKind::BulletedListItem { .. } => Some(ListKind::Bulleted),
        BlockKind::NumberedListItem { .. } => Some(ListKind::Numbered),
        _ => None,
    }
}

impl Renderer<'_> {
    /// Render siblings, wrapping runs of list items in a single `<ul>`/`<ol>`.
    fn render_sequence(&mut self, blocks: &[Block]) {
        let mut i = 0;
        while i < blocks.len() {
            let Some(kind) = list_kind(&blocks[i]) else {
                self.render_block(&blocks[i]);
                i += 1;
                continue;
            };

            let run = blocks[i..]
                .iter()
                .take_while(|b| list_kind(b) == Some(kind))
                .count();
            let tag = match kind {
                ListKind::Bulleted => "ul",
                ListKind::Numbered => "ol",
            };

            self.out.push_str(&format!("<{tag}>"));
            for item in &blocks[i..i + run] {
                self.render_block(item);
            }
            self.out.push_str(&format!("</{tag}>"));
            i += run;
        }
    }

    fn render_children(&mut self, block: &Block) {
        if !block.children.is_empty() {
            self.render_sequence(&block.children);
        }
    }

    /// Children of plain blocks sit in an indented container after the block itself.
    fn render_indented_children(&mut self, block: &Block) {
        if !block.children.is_empty() {
            self.out.push_str(r#"<div class="notion-indent">"#);
            self.render_sequence(&block.children);
            self.out.push_str("</div>");
        }
    }

    fn render_block(&mut self, block: &Block) {
        match &block.kind {
            BlockKind::Paragraph { paragraph } => {
                self.out
                    .push_str(&format!("<p>{}</p>", render_rich_text(&paragraph.rich_text)));
                self.render_indented_children(block);
            }
            BlockKind::Heading1 { .. } | BlockKind::Heading2 { .. } | BlockKind::Heading3 { .. } => {
                if let Some((level, heading)) = block.kind.heading() {
                    let anchor = self.anchors.assign(&plain_text(&heading.rich_text));
                    // h1 is reserved for the post title.
                    let tag = format!("h{}", level + 1);
                    // The self-link sits beside the text, which may carry links of its own.
                    self.out.push_str(&format!(
                        r##"<{tag} id="{anchor}">{}<a class="anchor" href="#{anchor}" aria-hidden="true">#</a></{tag}>"##,
                        render_rich_text(&heading.rich_text)
                    ));
                    self.render_indented_children(block);
                }
            }
            BlockKind::BulletedListItem {
                bulleted_list_item: item,
            }
            | BlockKind::NumberedListItem {
                numbered_list_item: item,
            } => {
                self.out.push_str("<li>");
                self.out.push_str(&render_rich_text(&item.rich_text));
                self.render_children(block);
                self.out.push_str("</li>");
            }
            BlockKind::ToDo { to_do } => {
                let checked = if to_do.checked { " checked" } else { "" };
                self.out.push_str(&format!(
                    r#"<div class="notion-to-do"><label><input type="checkbox" disabled{checked} /> <span>{}</span></label>"#,
                    render_rich_text(&to_do.rich_text)
                ));
                self.render_indented_children(block);
                self.out.push_str("</div>");
            }
            BlockKind::Toggle { toggle } => {
                self.out.push_str(&format!(
                    r#"<details class="notion-toggle"><summary>{}</summary>"#,
                    render_rich_text(&toggle.rich_text)
                ));
                self.render_children(block);
                self.out.push_str("</details>");
            }
            BlockKind::Quote { quote } => {
                self.out.push_str(&format!(
                    "<blockquote>{}",
                    render_rich_text(&quote.rich_text)
                ));
                self.render_children(block);
                self.out.push_str("</blockquote>");
            }
            BlockKind::Callout { callout } => {
                let icon = match &callout.icon {
                    Some(Icon::Emoji { emoji }) => html_escape(emoji),
                    Some(Icon::External { external }) => {
                        format!(r#"<img src="{}" alt="" />"#, html_escape(&external.url))
                    }
                    Some(Icon::File { file }) => {
                        format!(r#"<img src="{}" alt="" />"#, html_escape(&file.url))
                    }
                    Some(Icon::Unsupported) | None => String::new(),
                };
                self.out.push_str(&format!(
                    r#"<div class="notion-callout"><span class="notion-callout-icon">{icon}</span><div class="notion-callout-text">{}"#,
                    render_rich_text(&callout.rich_text)
                ));
                self.render_children(block);
                self.out.push_str("</div></div>");
            }
            BlockKind::Code { code } => self.out.push_str(&render_code(code)),
            BlockKind::Image { image } => self.out.push_str(&render_image(image)),
            BlockKind::Video { video } => {
                self.out.push_str(&format!(
                    r#"<figure class="notion-video"><video controls preload="metadata" src="{}"></video>{}</figure>"#,
                    html_escape(video.source.url()),
                    figcaption(&video.caption)
                ));
            }
            BlockKind::Bookmark { bookmark } => {
                let label = if bookmark.caption.is_empty() {
                    html_escape(&bookmark.url)
                } else {
                    render_rich_text(&bookmark.caption)
                };
                self.out.push_str(&format!(
                    r#"<div class="notion-bookmark"><a href="{}">{label}</a></div>"#,
                    html_escape(&bookmark.url)
                ));
            }
            BlockKind::Embed { embed } => {
                self.out.push_str(&format!(
                    r#"<div class="notion-embed"><a href="{url}">{url}</a>{}</div>"#,
                    figcaption(&embed.caption),
                    url = html_escape(&embed.url)
                ));
            }
            BlockKind::Equation { equation } => {
                self.out.push_str(&format!(
                    r#"<div class="notion-equation"><span class="notion-equation">{}</span></div>"#,
                    html_escape(&equation.expression)
                ));
            }
            BlockKind::Divider {} => self.out.push_str("<hr />"),
            BlockKind::TableOfContents {} => self.out.push_str(&render_toc(self.toc)),
            BlockKind::Unsupported => {
                self.out
                    .push_str(&format!("<!-- unsupported block {} -->", comment_safe(&block.id)));
                // Columns, synced blocks and the like still carry content in their children.
                if !block.children.is_empty() {
                    self.out.push_str(r#"<div class="notion-unsupported">"#);
                    self.render_sequence(&block.children);
                    self.out.push_str("</div>");
                }
            }
        }
    }
}

fn render_code(code: &CodeBlock) -> String {
    let language = code
        .language
        .as_deref()
        .filter(|l| !l.is_empty() && *l != "plain text")
        .map(|l| format!(r#" class="language-{}""#, html_escape(&l.replace(' ', "-"))))
        .unwrap_or_default();

    format!(
        r#"<figure class="notion-code"><pre><code{language}>{}</code></pre>{}</figure>"#,
        html_escape(&plain_text(&code.rich_text)),
        figcaption(&code.caption)
    )
}

fn render_image(image: &ImageBlock) -> String {
    let alt = html_escape(&plain_text(&image.caption));
    let size = image
        .dimensions
        .map(|d| format!(r#" width="{}" height="{}""#, d.width, d.height))
        .unwrap_or_default();

    format!(
        r#"<figure class="notion-image"><img src="{}" alt="{alt}"{size} loading="lazy" />{}</figure>"#,
        html_escape(image.source.url()),
        figcaption(&image.caption)
    )
}

fn figcaption(caption: &[RichText]) -> String {
    if caption.is_empty() {
        String::new()
    } else {
        format!("<figcaption>{}</figcaption>", render_rich_text(caption))
    }
}

fn comment_safe(s: &str) -> String {
    s.replace("--", "")
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::folio::notion::ImageDimensions;

    fn block(id: &str, kind: &str, payload: Value) -> Block {
        let mut value = json!({ "object": "block", "id": id, "type": kind, "has_children": false });
        value[kind] = payload;
        serde_json::from_value(value).unwrap()
    }

    fn text(s: &str) -> Value {
        json!({ "rich_text": [{ "plain_text": s }] })
    }

    #[test]
    fn rich_text_annotations_and_links() {
        let spans: Vec<RichText> = serde_json::from_value(json!([
            { "plain_text": "bold <tag>", "annotations": { "bold": true, "italic": true } },
            { "plain_text": "link", "href": "https://example.com/?a=1&b=2" },
            { "plain_text": "red", "annotations": { "color": "red_background", "code": true } }
        ]))
        .unwrap();

        assert_eq!(
            render_rich_text(&spans),
            concat!(
                "<em><strong>bold &lt;tag&gt;</strong></em>",
                r#"<a href="https://example.com/?a=1&amp;b=2">link</a>"#,
                r#"<span class="notion-red_background"><code>red</code></span>"#
            )
        );
    }

    #[test]
    fn consecutive_list_items_share_one_list() {
        let blocks = vec![
            block("1", "bulleted_list_item", text("a")),
            block("2", "bulleted_list_item", text("b")),
            block("3", "numbered_list_item", text("one")),
            block("4", "paragraph", text("end")),
            block("5", "bulleted_list_item", text("c")),
        ];

        assert_eq!(
            render_blocks(&blocks),
            "<ul><li>a</li><li>b</li></ul><ol><li>one</li></ol><p>end</p><ul><li>c</li></ul>"
        );
    }

    #[test]
    fn nested_list_children_render_inside_item() {
        let mut parent = block("1", "bulleted_list_item", text("parent"));
        parent.has_children = true;
        parent.children = vec![block("2", "bulleted_list_item", text("child"))];

        assert_eq!(
            render_blocks(&[parent]),
            "<ul><li>parent<ul><li>child</li></ul></li></ul>"
        );
    }

    #[test]
    fn headings_get_unique_anchors_matching_toc() {
        let blocks = vec![
            block("t", "table_of_contents", json!({})),
            block("h1", "heading_1", text("Getting started")),
            block("h2", "heading_2", text("Getting started")),
        ];

        let html = render_blocks(&blocks);
        assert!(html.contains(r##"<a href="#getting-started">Getting started</a>"##));
        assert!(html.contains(r##"<a href="#getting-started-1">Getting started</a>"##));
        assert!(html.contains(r#"<h2 id="getting-started">"#));
        assert!(html.contains(r#"<h3 id="getting-started-1">"#));
    }

    #[test]
    fn linked_heading_text_is_not_nested_in_the_anchor() {
        let heading = block(
            "h",
            "heading_1",
            json!({ "rich_text": [{ "plain_text": "Docs", "href": "https://docs.rs" }] }),
        );

        assert_eq!(
            render_blocks(&[heading]),
            r##"<h2 id="docs"><a href="https://docs.rs">Docs</a><a class="anchor" href="#docs" aria-hidden="true">#</a></h2>"##
        );
    }

    #[test]
    fn children_of_unsupported_containers_still_render() {
        let mut column = block("col", "column", json!({}));
        column.has_children = true;
        column.children = vec![block("p", "paragraph", text("inside column"))];
        let mut columns = block("cl", "column_list", json!({}));
        columns.has_children = true;
        columns.children = vec![column];

        let html = render_blocks(&[columns]);
        assert!(html.starts_with("<!-- unsupported block cl -->"));
        assert!(html.contains("<p>inside column</p>"));
        assert_eq!(html.matches(r#"<div class="notion-unsupported">"#).count(), 2);
    }

    #[test]
    fn image_carries_probed_dimensions() {
        let mut img = block(
            "img",
            "image",
            json!({
                "type": "external",
                "external": { "url": "https://cdn.example.com/a.png" },
                "caption": [{ "plain_text": "A \"cat\"" }]
            }),
        );
        if let Some(image) = img.kind.image_mut() {
            image.dimensions = Some(ImageDimensions {
                width: 800,
                height: 600,
            });
        }

        let html = render_blocks(&[img]);
        assert_eq!(
            html,
            concat!(
                r#"<figure class="notion-image"><img src="https://cdn.example.com/a.png" alt="A &quot;cat&quot;" width="800" height="600" loading="lazy" />"#,
                r#"<figcaption>A &quot;cat&quot;</figcaption></figure>"#
            )
        );
    }

    #[test]
    fn image_without_dimensions_omits_size() {
        let img = block(
            "img",
            "image",
            json!({ "type": "file", "file": { "url": "https://s3/a.png" } }),
        );
        let html = render_blocks(&[img]);
        assert!(!html.contains("width="));
        assert!(html.contains(r#"src="https://s3/a.png""#));
    }

    #[test]
    fn code_toggle_callout_and_unsupported() {
        let code = block(
            "c",
            "code",
            json!({ "rich_text": [{ "plain_text": "fn main() { a < b }" }], "language": "rust" }),
        );
        let mut toggle = block("t", "toggle", text("More"));
        toggle.children = vec![block("p", "paragraph", text("hidden"))];
        let callout = block(
            "co",
            "callout",
            json!({ "rich_text": [{ "plain_text": "Heads up" }], "icon": { "type": "emoji", "emoji": "💡" } }),
        );
        let unknown = block("u-1", "child_database", json!({ "title": "x" }));

        let html = render_blocks(&[code, toggle, callout, unknown]);
        assert!(html.contains(r#"<code class="language-rust">fn main() { a &lt; b }</code>"#));
        assert!(html.contains(r#"<details class="notion-toggle"><summary>More</summary><p>hidden</p></details>"#));
        assert!(html.contains(r#"<span class="notion-callout-icon">💡</span>"#));
        assert!(html.ends_with("<!-- unsupported block u-1 -->"));
    }

    #[test]
    fn to_do_and_divider() {
        let done = block(
            "d",
            "to_do",
            json!({ "rich_text": [{ "plain_text": "ship" }], "checked": true }),
        );
        let html = render_blocks(&[done, block("hr", "divider", json!({}))]);
        assert_eq!(
            html,
            r#"<div class="notion-to-do"><label><input type="checkbox" disabled checked /> <span>ship</span></label></div><hr />"#
        );
    }
}
