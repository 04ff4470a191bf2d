//! Block-level markdown document model.
//!
//! The pipeline only needs to find fenced code blocks and the document
//! title, annotate or replace blocks, and write the document back out, so
//! the model is deliberately coarse: a document is a flat sequence of
//! [`Block`]s where everything that is not an ATX heading or a fenced code
//! block passes through verbatim as [`Block::Raw`]. Untouched input renders
//! back byte-for-byte.
//!
//! Fences open with three or more backticks or tildes at column zero and
//! close with a run of the same character at least as long. The text after
//! the opening fence is the info string: the first token is the language,
//! the remainder is the directive metadata handled by [`directive`].

pub mod directive;

pub use directive::{Query, SandboxDirective, parse_meta};

/// A fenced code block with its source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// The opening fence exactly as written, e.g. ` ``` ` or `~~~~`
    pub fence: String,
    /// Info string after the opening fence (language plus metadata)
    pub info: String,
    /// Code content between the fences, without the trailing newline
    pub value: String,
    /// 1-based source line of the opening fence
    pub line: usize,
    /// Whether a closing fence was present (false only at EOF)
    pub closed: bool,
    /// Out-of-band sandbox URL annotation attached by `meta` mode;
    /// never rendered into the document
    pub sandbox_url: Option<String>,
}

impl CodeBlock {
    /// The directive metadata portion of the info string, i.e. everything
    /// after the language token.
    #[must_use]
    pub fn meta(&self) -> &str {
        match self.info.split_once(char::is_whitespace) {
            Some((_lang, meta)) => meta.trim_start(),
            None => "",
        }
    }
}

/// One top-level node of a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// ATX heading
    Heading {
        /// Heading depth, 1-6
        depth: u8,
        /// Heading text with the marker stripped
        text: String,
        /// The source line, rendered back verbatim
        raw: String,
    },
    /// Fenced code block
    Code(CodeBlock),
    /// Raw HTML inserted by `iframe` mode
    Html {
        /// The HTML fragment
        value: String,
    },
    /// Verbatim source chunk (paragraphs, lists, blank lines, ...)
    Raw {
        /// The chunk, possibly spanning multiple lines
        value: String,
    },
}

/// A parsed markdown document.
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// Top-level blocks in source order
    pub blocks: Vec<Block>,
}

fn fence_open(line: &str) -> Option<(String, String)> {
    let marker = line.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = line.chars().take_while(|c| *c == marker).count();
    if len < 3 {
        return None;
    }
    let info = line[len..].trim().to_string();
    // An info string containing the fence character would be ambiguous
    // with an inline close; CommonMark forbids it for backtick fences.
    if marker == '`' && info.contains('`') {
        return None;
    }
    Some((line[..len].to_string(), info))
}

fn fence_close(line: &str, fence: &str) -> bool {
    let marker = fence.chars().next().unwrap_or('`');
    let trimmed = line.trim_end();
    trimmed.len() >= fence.len() && trimmed.chars().all(|c| c == marker)
}

fn heading(line: &str) -> Option<(u8, String)> {
    let depth = line.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&depth) {
        return None;
    }
    let rest = &line[depth..];
    if rest.is_empty() {
        return Some((depth as u8, String::new()));
    }
    if !rest.starts_with(' ') {
        return None;
    }
    Some((depth as u8, rest.trim().to_string()))
}

impl Document {
    /// Parse markdown source into blocks.
    pub fn parse(source: &str) -> Self {
        let lines: Vec<&str> = source.split('\n').collect();
        let mut blocks = Vec::new();
        let mut run: Vec<&str> = Vec::new();
        let mut i = 0;

        let flush = |run: &mut Vec<&str>, blocks: &mut Vec<Block>| {
            if !run.is_empty() {
                blocks.push(Block::Raw {
                    value: run.join("\n"),
                });
                run.clear();
            }
        };

        while i < lines.len() {
            let line = lines[i];

            if let Some((fence, info)) = fence_open(line) {
                flush(&mut run, &mut blocks);
                let open_line = i + 1;
                let mut value_lines: Vec<&str> = Vec::new();
                let mut closed = false;
                i += 1;
                while i < lines.len() {
                    if fence_close(lines[i], &fence) {
                        closed = true;
                        i += 1;
                        break;
                    }
                    value_lines.push(lines[i]);
                    i += 1;
                }
                blocks.push(Block::Code(CodeBlock {
                    fence,
                    info,
                    value: value_lines.join("\n"),
                    line: open_line,
                    closed,
                    sandbox_url: None,
                }));
                continue;
            }

            if let Some((depth, text)) = heading(line) {
                flush(&mut run, &mut blocks);
                blocks.push(Block::Heading {
                    depth,
                    text,
                    raw: line.to_string(),
                });
                i += 1;
                continue;
            }

            run.push(line);
            i += 1;
        }
        flush(&mut run, &mut blocks);

        Self { blocks }
    }

    /// Render the document back to markdown.
    #[must_use]
    pub fn render(&self) -> String {
        let rendered: Vec<String> = self
            .blocks
            .iter()
            .map(|block| match block {
                Block::Heading { raw, .. } => raw.clone(),
                Block::Raw { value } | Block::Html { value } => value.clone(),
                Block::Code(code) => {
                    let mut out = format!("{}{}", code.fence, code.info);
                    if !code.value.is_empty() {
                        out.push('\n');
                        out.push_str(&code.value);
                    }
                    if code.closed {
                        out.push('\n');
                        out.push_str(&code.fence);
                    }
                    out
                }
            })
            .collect();
        rendered.join("\n")
    }

    /// The document title: text of the first non-empty depth-1 heading, if
    /// any.
    ///
    /// First one wins; later top-level headings never override it. A bare
    /// `#` marker has no text and does not count as a title.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.blocks.iter().find_map(|block| match block {
            Block::Heading { depth: 1, text, .. } if !text.is_empty() => Some(text.as_str()),
            _ => None,
        })
    }
}
