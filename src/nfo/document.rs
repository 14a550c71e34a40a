//! Span-preserving editor for NFO documents.
//!
//! The raw text is kept as loaded. Every edit splices only the byte range of
//! the targeted element, then the layout is scanned again, so anything the
//! caller never touched round-trips byte for byte.

use std::fs;
use std::io::{self, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use log::debug;
use quick_xml::escape::partial_escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

const UTF8_BOM: &str = "\u{feff}";
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8" standalone="yes"?>"#;
const DEFAULT_INDENT: &str = "  ";

/// Kodi field order, used to place fields that do not exist yet.
const CANONICAL_FIELD_ORDER: &[&str] = &[
    "title",
    "originaltitle",
    "showtitle",
    "sorttitle",
    "ratings",
    "rating",
    "userrating",
    "top250",
    "season",
    "episode",
    "displayseason",
    "displayepisode",
    "outline",
    "plot",
    "tagline",
    "runtime",
    "thumb",
    "fanart",
    "mpaa",
    "playcount",
    "lastplayed",
    "episodeguide",
    "id",
    "uniqueid",
    "genre",
    "tag",
    "credits",
    "director",
    "premiered",
    "year",
    "status",
    "code",
    "aired",
    "studio",
    "trailer",
    "actor",
    "namedseason",
    "resume",
    "dateadded",
];

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("malformed document {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone)]
struct ChildSpan {
    name: String,
    span: Range<usize>,
    /// `None` for self-closing elements.
    content: Option<Range<usize>>,
    text: String,
}

#[derive(Debug, Clone)]
struct Layout {
    root_name: String,
    root_span: Range<usize>,
    root_open_end: usize,
    /// `None` when the root element is self-closing.
    root_close_start: Option<usize>,
    has_declaration: bool,
    children: Vec<ChildSpan>,
}

fn element_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn scan(text: &str) -> Result<Layout, String> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);

    let mut depth = 0usize;
    let mut has_declaration = false;
    let mut root: Option<(String, usize, usize)> = None;
    let mut root_close: Option<(usize, usize)> = None;
    let mut root_self_closing = false;
    let mut children = Vec::new();
    let mut current: Option<ChildSpan> = None;

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|error| format!("{error} (byte {})", reader.error_position()))?;
        let after = reader.buffer_position() as usize;

        match event {
            Event::Decl(_) => has_declaration = true,
            Event::Start(element) => {
                let name = element_name(element.name().as_ref());
                match depth {
                    0 if root.is_some() => return Err("more than one root element".to_string()),
                    0 => root = Some((name, before, after)),
                    1 => {
                        current = Some(ChildSpan {
                            name,
                            span: before..after,
                            content: Some(after..after),
                            text: String::new(),
                        })
                    }
                    _ => {}
                }
                depth += 1;
            }
            Event::Empty(element) => {
                let name = element_name(element.name().as_ref());
                match depth {
                    0 if root.is_some() => return Err("more than one root element".to_string()),
                    0 => {
                        root = Some((name, before, after));
                        root_close = Some((after, after));
                        root_self_closing = true;
                    }
                    1 => children.push(ChildSpan {
                        name,
                        span: before..after,
                        content: None,
                        text: String::new(),
                    }),
                    _ => {}
                }
            }
            Event::End(_) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "closing tag without opening tag".to_string())?;
                match depth {
                    0 => root_close = Some((before, after)),
                    1 => {
                        if let Some(mut child) = current.take() {
                            if let Some(content) = child.content.as_mut() {
                                content.end = before;
                            }
                            child.span.end = after;
                            children.push(child);
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(content) => {
                if depth == 0 {
                    if !content.iter().all(u8::is_ascii_whitespace) {
                        return Err("text outside the root element".to_string());
                    }
                } else if depth == 2 {
                    if let Some(child) = current.as_mut() {
                        let decoded = content
                            .unescape()
                            .map(|value| value.into_owned())
                            .unwrap_or_else(|_| String::from_utf8_lossy(&content).into_owned());
                        child.text.push_str(&decoded);
                    }
                }
            }
            Event::CData(content) => {
                if depth == 2 {
                    if let Some(child) = current.as_mut() {
                        child
                            .text
                            .push_str(&String::from_utf8_lossy(&content.into_inner()));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err("unexpected end of document inside an element".to_string());
    }
    let (root_name, root_start, root_open_end) =
        root.ok_or_else(|| "document has no root element".to_string())?;
    let (close_start, root_end) = root_close.unwrap_or((root_open_end, root_open_end));
    Ok(Layout {
        root_name,
        root_span: root_start..root_end,
        root_open_end,
        root_close_start: (!root_self_closing).then_some(close_start),
        has_declaration,
        children,
    })
}

/// Writes through a sibling temporary file so readers never see a partial record.
fn write_atomically(path: &Path, contents: &[u8]) -> io::Result<()> {
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(directory)?;
    temp.write_all(contents)?;
    if let Ok(metadata) = fs::metadata(path) {
        temp.as_file().set_permissions(metadata.permissions())?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|error| error.error)?;
    Ok(())
}

/// One loaded NFO document.
#[derive(Debug, Clone)]
pub struct NfoDocument {
    path: PathBuf,
    has_bom: bool,
    original: String,
    text: String,
    layout: Layout,
}

impl NfoDocument {
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let bytes = fs::read(path).map_err(|source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw = String::from_utf8(bytes).map_err(|_| DocumentError::Parse {
            path: path.to_path_buf(),
            message: "document is not valid UTF-8".to_string(),
        })?;
        Self::parse(path, raw)
    }

    /// Builds a document from text already in memory. `path` is where `save` writes.
    pub fn parse(path: impl Into<PathBuf>, raw: String) -> Result<Self, DocumentError> {
        let path = path.into();
        let (has_bom, text) = match raw.strip_prefix(UTF8_BOM) {
            Some(stripped) => (true, stripped.to_string()),
            None => (false, raw),
        };
        let layout = scan(&text).map_err(|message| DocumentError::Parse {
            path: path.clone(),
            message,
        })?;
        Ok(Self {
            path,
            has_bom,
            original: text.clone(),
            text,
            layout,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root_name(&self) -> &str {
        &self.layout.root_name
    }

    pub fn is_modified(&self) -> bool {
        self.text != self.original
    }

    /// Trimmed text of the first direct child named `name`.
    pub fn get_text(&self, name: &str) -> Option<String> {
        self.children_named(name)
            .next()
            .map(|child| child.text.trim().to_string())
    }

    /// Trimmed, non-empty texts of every direct child named `name`, in document order.
    pub fn get_all(&self, name: &str) -> Vec<String> {
        self.children_named(name)
            .map(|child| child.text.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect()
    }

    /// Replaces the text of the first `name` child, creating it when missing.
    /// Returns whether the document changed.
    pub fn set_text(&mut self, name: &str, value: &str) -> Result<bool, DocumentError> {
        let escaped = partial_escape(value).into_owned();
        let existing = self.children_named(name).next().cloned();
        let Some(existing) = existing else {
            let element = format!("<{name}>{escaped}</{name}>");
            return self.insert_block(name, &[element]);
        };
        if existing.text.trim() == value {
            return Ok(false);
        }
        let edit = match &existing.content {
            Some(content) => (content.clone(), escaped),
            None => (existing.span.clone(), format!("<{name}>{escaped}</{name}>")),
        };
        self.apply_edits(vec![edit])
    }

    /// Replaces every `name` child with one element per value, as a block at
    /// the position of the first existing occurrence.
    pub fn replace_all(&mut self, name: &str, values: &[String]) -> Result<bool, DocumentError> {
        if self.get_all(name) == values
            && self.children_named(name).count() == values.len()
        {
            return Ok(false);
        }
        let elements = values
            .iter()
            .map(|value| format!("<{name}>{}</{name}>", partial_escape(value)))
            .collect::<Vec<_>>();

        let existing = self.children_named(name).cloned().collect::<Vec<_>>();
        let Some((first, rest)) = existing.split_first() else {
            return self.insert_block(name, &elements);
        };

        let mut edits = rest
            .iter()
            .map(|child| (self.removal_range(&child.span), String::new()))
            .collect::<Vec<_>>();
        if elements.is_empty() {
            edits.push((self.removal_range(&first.span), String::new()));
        } else {
            let indent = self
                .indent_before(first.span.start)
                .unwrap_or_else(|| self.child_indent());
            let separator = format!("{}{indent}", self.newline());
            edits.push((first.span.clone(), elements.join(&separator)));
        }
        self.apply_edits(edits)
    }

    /// Removes every direct child named `name`. Absent is a no-op.
    pub fn remove(&mut self, name: &str) -> Result<bool, DocumentError> {
        self.replace_all(name, &[])
    }

    /// Full file contents as `save` would write them.
    pub fn render(&self) -> String {
        let mut rendered = String::with_capacity(self.text.len() + XML_DECLARATION.len() + 4);
        if self.has_bom {
            rendered.push_str(UTF8_BOM);
        }
        if self.is_modified() && !self.layout.has_declaration {
            rendered.push_str(XML_DECLARATION);
            rendered.push_str(self.newline());
        }
        rendered.push_str(&self.text);
        rendered
    }

    /// Writes the document if anything changed. Returns whether a write happened.
    pub fn save(&mut self) -> Result<bool, DocumentError> {
        if !self.is_modified() {
            debug!("Nfo: {} unchanged, skipping write", self.path.display());
            return Ok(false);
        }
        let rendered = self.render();
        write_atomically(&self.path, rendered.as_bytes()).map_err(|source| {
            DocumentError::Write {
                path: self.path.clone(),
                source,
            }
        })?;
        let text = rendered
            .strip_prefix(UTF8_BOM)
            .unwrap_or(&rendered)
            .to_string();
        self.layout = self.rescan(&text)?;
        self.original = text.clone();
        self.text = text;
        Ok(true)
    }

    fn children_named<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s ChildSpan> + 's {
        self.layout
            .children
            .iter()
            .filter(move |child| child.name == name)
    }

    fn newline(&self) -> &'static str {
        if self.text.contains("\r\n") {
            "\r\n"
        } else {
            "\n"
        }
    }

    /// Leading whitespace of the line `position` sits on, if nothing else precedes it.
    fn indent_before(&self, position: usize) -> Option<String> {
        let bytes = self.text.as_bytes();
        let mut start = position;
        while start > 0 && matches!(bytes[start - 1], b' ' | b'\t') {
            start -= 1;
        }
        (start == 0 || bytes[start - 1] == b'\n').then(|| self.text[start..position].to_string())
    }

    fn child_indent(&self) -> String {
        self.layout
            .children
            .first()
            .and_then(|child| self.indent_before(child.span.start))
            .filter(|indent| !indent.is_empty())
            .unwrap_or_else(|| DEFAULT_INDENT.to_string())
    }

    /// Element span widened to swallow its own line break and indentation.
    fn removal_range(&self, span: &Range<usize>) -> Range<usize> {
        let bytes = self.text.as_bytes();
        let mut start = span.start;
        while start > 0 && matches!(bytes[start - 1], b' ' | b'\t') {
            start -= 1;
        }
        if start > 0 && bytes[start - 1] == b'\n' {
            start -= 1;
            if start > 0 && bytes[start - 1] == b'\r' {
                start -= 1;
            }
        } else {
            start = span.start;
        }
        start..span.end
    }

    /// End offset of the last child whose field comes before `name` in Kodi order.
    fn canonical_anchor(&self, name: &str) -> Option<usize> {
        let position = CANONICAL_FIELD_ORDER
            .iter()
            .position(|field| *field == name)?;
        CANONICAL_FIELD_ORDER[..position]
            .iter()
            .rev()
            .find_map(|preceding| {
                self.children_named(preceding)
                    .last()
                    .map(|child| child.span.end)
            })
    }

    fn insert_block(&mut self, name: &str, elements: &[String]) -> Result<bool, DocumentError> {
        if elements.is_empty() {
            return Ok(false);
        }
        let newline = self.newline();
        let indent = self.child_indent();
        let block = elements
            .iter()
            .map(|element| format!("{newline}{indent}{element}"))
            .collect::<String>();

        let anchor = self
            .canonical_anchor(name)
            .or_else(|| self.layout.children.last().map(|child| child.span.end));
        let edit = match (anchor, self.layout.root_close_start) {
            (Some(offset), _) => (offset..offset, block),
            (None, Some(close_start)) => {
                let open_end = self.layout.root_open_end;
                let trailing = if self.text[open_end..close_start].contains('\n') {
                    ""
                } else {
                    newline
                };
                (open_end..open_end, format!("{block}{trailing}"))
            }
            (None, None) => {
                let root = self.layout.root_name.clone();
                let opening = self.text[self.layout.root_span.clone()]
                    .trim_end_matches('>')
                    .trim_end_matches('/')
                    .trim_end()
                    .to_string();
                (
                    self.layout.root_span.clone(),
                    format!("{opening}>{block}{newline}</{root}>"),
                )
            }
        };
        self.apply_edits(vec![edit])
    }

    fn apply_edits(&mut self, mut edits: Vec<(Range<usize>, String)>) -> Result<bool, DocumentError> {
        edits.sort_by(|left, right| right.0.start.cmp(&left.0.start));
        let mut text = self.text.clone();
        for (range, replacement) in edits {
            text.replace_range(range, &replacement);
        }
        if text == self.text {
            return Ok(false);
        }
        self.layout = self.rescan(&text)?;
        self.text = text;
        Ok(true)
    }

    fn rescan(&self, text: &str) -> Result<Layout, DocumentError> {
        scan(text).map_err(|message| DocumentError::Parse {
            path: self.path.clone(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SHOW: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes" ?>
<tvshow>
    <title>Cowboy Bebop</title>
    <rating>7.0</rating>
    <plot>Space bounty hunters &amp; jazz.</plot>
    <!-- keep me -->
    <genre>Action</genre>
    <genre>Sci-Fi</genre>
    <actor>
        <name>Spike</name>
    </actor>
</tvshow>
"#;

    fn parse(text: &str) -> NfoDocument {
        NfoDocument::parse("tvshow.nfo", text.to_string()).expect("valid document")
    }

    #[test]
    fn test_untouched_document_renders_identically() {
        let document = parse(SHOW);
        assert_eq!(document.render(), SHOW);
        assert!(!document.is_modified());
        assert_eq!(document.root_name(), "tvshow");
    }

    #[test]
    fn test_get_text_unescapes_and_trims() {
        let document = parse(SHOW);
        assert_eq!(document.get_text("title").as_deref(), Some("Cowboy Bebop"));
        assert_eq!(
            document.get_text("plot").as_deref(),
            Some("Space bounty hunters & jazz.")
        );
        assert_eq!(document.get_all("genre"), vec!["Action", "Sci-Fi"]);
        assert_eq!(document.get_text("name"), None);
    }

    #[test]
    fn test_set_text_replaces_only_the_target_range() {
        let mut document = parse(SHOW);
        assert!(document.set_text("rating", "8.9").expect("edit"));
        assert_eq!(
            document.render(),
            SHOW.replace("<rating>7.0</rating>", "<rating>8.9</rating>")
        );
        assert!(!document.set_text("rating", "8.9").expect("edit"));
    }

    #[test]
    fn test_set_text_escapes_markup() {
        let mut document = parse(SHOW);
        document.set_text("title", "Tom & Jerry <Remastered>").expect("edit");
        assert!(document
            .render()
            .contains("<title>Tom &amp; Jerry &lt;Remastered&gt;</title>"));
        assert_eq!(
            document.get_text("title").as_deref(),
            Some("Tom & Jerry <Remastered>")
        );
    }

    #[test]
    fn test_missing_field_is_inserted_in_canonical_position() {
        let mut document = parse(SHOW);
        document.set_text("mpaa", "TV-14").expect("edit");
        assert!(document
            .render()
            .contains("<plot>Space bounty hunters &amp; jazz.</plot>\n    <mpaa>TV-14</mpaa>\n    <!-- keep me -->"));

        document
            .set_text("trailer", "plugin://plugin.video.youtube/play/?video_id=abc")
            .expect("edit");
        assert!(document.render().contains(
            "</genre>\n    <trailer>plugin://plugin.video.youtube/play/?video_id=abc</trailer>\n    <actor>"
        ));
    }

    #[test]
    fn test_unknown_field_goes_after_last_child() {
        let mut document = parse("<tvshow>\n\t<title>X</title>\n</tvshow>");
        document.set_text("customfield", "1").expect("edit");
        assert_eq!(
            document.render(),
            "<?xml version=\"1.0\" encoding=\"utf-8\" standalone=\"yes\"?>\n\
             <tvshow>\n\t<title>X</title>\n\t<customfield>1</customfield>\n</tvshow>"
        );
    }

    #[test]
    fn test_insert_into_empty_roots() {
        let mut open = parse("<tvshow></tvshow>");
        open.set_text("title", "A").expect("edit");
        assert!(open.render().ends_with("<tvshow>\n  <title>A</title>\n</tvshow>"));

        let mut closed = parse("<tvshow/>");
        closed.set_text("title", "A").expect("edit");
        assert!(closed.render().ends_with("<tvshow>\n  <title>A</title>\n</tvshow>"));
        assert_eq!(closed.get_text("title").as_deref(), Some("A"));
    }

    #[test]
    fn test_self_closing_field_is_expanded() {
        let mut document = parse("<tvshow>\n  <rating/>\n</tvshow>");
        document.set_text("rating", "6.5").expect("edit");
        assert!(document.render().contains("  <rating>6.5</rating>\n</tvshow>"));
    }

    #[test]
    fn test_replace_all_rewrites_block_at_first_occurrence() {
        let mut document = parse(SHOW);
        let genres = vec!["Drama".to_string(), "Action".to_string(), "Space".to_string()];
        assert!(document.replace_all("genre", &genres).expect("edit"));
        assert!(document.render().contains(
            "<!-- keep me -->\n    <genre>Drama</genre>\n    <genre>Action</genre>\n    <genre>Space</genre>\n    <actor>"
        ));
        assert!(!document.replace_all("genre", &genres).expect("edit"));
    }

    #[test]
    fn test_replace_all_inserts_missing_repeatable_field() {
        let mut document = parse(SHOW);
        let tags = vec!["Space Western".to_string(), "Adult Cast".to_string()];
        document.replace_all("tag", &tags).expect("edit");
        assert!(document.render().contains(
            "<genre>Sci-Fi</genre>\n    <tag>Space Western</tag>\n    <tag>Adult Cast</tag>\n    <actor>"
        ));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut document = parse(SHOW);
        assert!(document.remove("genre").expect("edit"));
        assert!(!document.render().contains("genre"));
        assert!(document.render().contains("<!-- keep me -->\n    <actor>"));
        assert!(!document.remove("genre").expect("edit"));
    }

    #[test]
    fn test_nested_fields_are_not_direct_children() {
        let mut document = parse(SHOW);
        document.set_text("name", "Jet").expect("edit");
        assert!(document.render().contains("<name>Spike</name>"));
        assert!(document.render().contains("<name>Jet</name>\n</tvshow>"));
    }

    #[test]
    fn test_malformed_documents_are_rejected() {
        for broken in [
            "",
            "not xml",
            "<tvshow><title>X</tvshow>",
            "<tvshow><title>X</title>",
            "<tvshow></tvshow><tvshow></tvshow>",
        ] {
            assert!(
                matches!(
                    NfoDocument::parse("tvshow.nfo", broken.to_string()),
                    Err(DocumentError::Parse { .. })
                ),
                "accepted {broken:?}"
            );
        }
    }

    #[test]
    fn test_bom_and_crlf_are_preserved() {
        let raw = "\u{feff}<tvshow>\r\n  <title>A</title>\r\n</tvshow>\r\n";
        let mut document = parse(raw);
        assert_eq!(document.render(), raw);
        document.set_text("rating", "7.5").expect("edit");
        assert_eq!(
            document.render(),
            "\u{feff}<?xml version=\"1.0\" encoding=\"utf-8\" standalone=\"yes\"?>\r\n\
             <tvshow>\r\n  <title>A</title>\r\n  <rating>7.5</rating>\r\n</tvshow>\r\n"
        );
    }

    #[test]
    fn test_save_skips_unchanged_and_writes_changes() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("tvshow.nfo");
        fs::write(&path, SHOW).expect("fixture");

        let mut document = NfoDocument::load(&path).expect("load");
        assert!(!document.save().expect("save"));
        assert_eq!(fs::read_to_string(&path).expect("read"), SHOW);

        document.set_text("rating", "8.9").expect("edit");
        assert!(document.save().expect("save"));
        let written = fs::read_to_string(&path).expect("read");
        assert!(written.contains("<rating>8.9</rating>"));
        assert!(written.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\""));
        assert!(!document.is_modified());
        assert!(!document.save().expect("save"));
        assert_eq!(fs::read_dir(dir.path()).expect("list").count(), 1);
    }

    #[test]
    fn test_load_reports_missing_file() {
        let dir = TempDir::new().expect("temp dir");
        assert!(matches!(
            NfoDocument::load(&dir.path().join("tvshow.nfo")),
            Err(DocumentError::Read { .. })
        ));
    }
}
