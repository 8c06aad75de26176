//! Markup parser.
//!
//! Template text is lexed with `chumsky` into tags, text runs and comments, each with
//! its byte span, then folded into an element tree on a stack of open elements. The
//! lexer accepts any input: a value without its closing quote or a tag cut short comes
//! out as a token that says so, and the tree builder turns it into a
//! [`ZealError::Compile`] located at the offending input. Directives are not looked at
//! here.

use chumsky::prelude::*;
use zeal_core::ZealError;

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Parser state shared by the template lexers.
pub(crate) type Extra<'src> = extra::Err<Rich<'src, char>>;

// ============================================================================
// Markup
// ============================================================================

/// A 1-based line/column location in the template text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Line, starting at 1.
    pub line: usize,
    /// Column in characters, starting at 1.
    pub column: usize,
}

impl Position {
    /// The first character of the input.
    pub const START: Self = Self { line: 1, column: 1 };

    /// The position reached after reading `text` from here.
    #[must_use]
    pub fn advance(self, text: &str) -> Self {
        text.chars().fold(self, |position, c| {
            if c == '\n' {
                Self {
                    line: position.line + 1,
                    column: 1,
                }
            } else {
                Self {
                    line: position.line,
                    column: position.column + 1,
                }
            }
        })
    }

    /// Builds a compile error located here.
    #[must_use]
    pub fn error(self, message: impl Into<String>) -> ZealError {
        ZealError::Compile {
            message: message.into(),
            line: self.line,
            column: self.column,
        }
    }
}

/// An attribute as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// The name, including any `:`/`@`/`z-` prefix and modifiers.
    pub name: String,
    /// The value; `None` for bare attributes such as `disabled` or `z-once`.
    pub value: Option<String>,
    /// Where the name starts.
    pub position: Position,
}

impl Attribute {
    /// The value, or an empty string for bare attributes.
    #[must_use]
    pub fn value(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }
}

/// An element with its attributes in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lower-cased tag name.
    pub tag: String,
    /// Attributes in source order.
    pub attributes: Vec<Attribute>,
    /// Child nodes.
    pub children: Vec<Markup>,
    /// Where the opening `<` is.
    pub position: Position,
}

impl Element {
    /// Finds an attribute by exact name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }
}

/// A parsed node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup {
    /// An element.
    Element(Element),
    /// A text run, entities decoded.
    Text {
        /// The text.
        text: String,
        /// Where the run starts.
        position: Position,
    },
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagEnd {
    Open,
    SelfClosing,
    Unexpected { found: char, at: usize },
    Eof,
}

#[derive(Debug, Clone)]
struct ValueToken<'src> {
    text: &'src str,
    terminated: bool,
    span: SimpleSpan,
}

#[derive(Debug, Clone)]
struct AttributeToken<'src> {
    name: &'src str,
    value: Option<ValueToken<'src>>,
    span: SimpleSpan,
}

#[derive(Debug, Clone)]
struct OpenTag<'src> {
    name: &'src str,
    attributes: Vec<AttributeToken<'src>>,
    end: TagEnd,
    span: SimpleSpan,
}

#[derive(Debug, Clone)]
struct CloseTag<'src> {
    name: &'src str,
    closed: bool,
    span: SimpleSpan,
}

#[derive(Debug, Clone)]
enum Token<'src> {
    Open(OpenTag<'src>),
    Close(CloseTag<'src>),
    /// `script`, `style` or `textarea` with its verbatim content.
    Raw {
        open: OpenTag<'src>,
        body: &'src str,
        body_span: SimpleSpan,
        close: CloseTag<'src>,
    },
    Text {
        text: &'src str,
        span: SimpleSpan,
    },
    Comment {
        closed: bool,
        span: SimpleSpan,
    },
    Declaration,
}

fn is_name_char(c: &char) -> bool {
    !c.is_whitespace() && !matches!(*c, '>' | '/' | '=' | '"' | '\'')
}

fn name<'src>() -> impl Parser<'src, &'src str, &'src str, Extra<'src>> + Clone {
    any().filter(is_name_char).repeated().to_slice()
}

fn quoted<'src>(quote: char) -> impl Parser<'src, &'src str, (&'src str, bool), Extra<'src>> + Clone {
    just(quote)
        .ignore_then(none_of(quote).repeated().to_slice())
        .then(just(quote).or_not())
        .map(|(text, close)| (text, close.is_some()))
}

fn attribute<'src>() -> impl Parser<'src, &'src str, AttributeToken<'src>, Extra<'src>> + Clone {
    let unquoted = any()
        .filter(|c: &char| !c.is_whitespace() && *c != '>')
        .repeated()
        .to_slice()
        .map(|text| (text, true));
    let value = choice((quoted('"'), quoted('\''), unquoted)).map_with(|(text, terminated), extra| {
        ValueToken {
            text,
            terminated,
            span: extra.span(),
        }
    });

    any()
        .filter(is_name_char)
        .repeated()
        .at_least(1)
        .to_slice()
        .map_with(|name, extra| (name, extra.span()))
        .then(
            text::whitespace()
                .ignore_then(just('='))
                .ignore_then(text::whitespace())
                .ignore_then(value)
                .or_not(),
        )
        .map(|((name, span), value)| AttributeToken { name, value, span })
}

fn open_tag<'src>() -> impl Parser<'src, &'src str, OpenTag<'src>, Extra<'src>> + Clone {
    let tag_name = any().filter(char::is_ascii_alphabetic).then(name()).to_slice();
    let tag_end = text::whitespace().ignore_then(choice((
        just("/>").to(TagEnd::SelfClosing),
        just('>').to(TagEnd::Open),
        any().map_with(|found: char, extra| TagEnd::Unexpected {
            found,
            at: { let span: SimpleSpan = extra.span(); span.start },
        }),
        end().to(TagEnd::Eof),
    )));

    just('<')
        .ignore_then(tag_name)
        .then(
            text::whitespace()
                .ignore_then(attribute())
                .repeated()
                .collect::<Vec<_>>(),
        )
        .then(tag_end)
        .map_with(|((name, attributes), end), extra| OpenTag {
            name,
            attributes,
            end,
            span: extra.span(),
        })
}

fn close_tag<'src>() -> impl Parser<'src, &'src str, CloseTag<'src>, Extra<'src>> + Clone {
    just("</")
        .ignore_then(name())
        .then(text::whitespace().ignore_then(just('>')).or_not())
        .map_with(|(name, close), extra| CloseTag {
            name,
            closed: close.is_some(),
            span: extra.span(),
        })
}

/// An element of kind `tag` whose content runs verbatim up to `close`.
fn raw_text<'src>(
    tag: &'static str,
    close: &'static str,
) -> impl Parser<'src, &'src str, Token<'src>, Extra<'src>> + Clone {
    open_tag()
        .filter(move |open: &OpenTag<'src>| {
            open.end == TagEnd::Open && open.name.eq_ignore_ascii_case(tag)
        })
        .then(
            any()
                .and_is(just(close).not())
                .repeated()
                .to_slice()
                .map_with(|body, extra| (body, extra.span())),
        )
        .then(close_tag())
        .map(|((open, (body, body_span)), close)| Token::Raw {
            open,
            body,
            body_span,
            close,
        })
}

fn lexer<'src>() -> impl Parser<'src, &'src str, Vec<Token<'src>>, Extra<'src>> {
    let comment = just("<!--")
        .ignore_then(any().and_is(just("-->").not()).repeated())
        .then(just("-->").or_not())
        .map_with(|((), close), extra| Token::Comment {
            closed: close.is_some(),
            span: extra.span(),
        });

    let declaration = just("<!")
        .then(none_of('>').repeated())
        .then(just('>').or_not())
        .to(Token::Declaration);

    let raw = choice((
        raw_text("script", "</script"),
        raw_text("style", "</style"),
        raw_text("textarea", "</textarea"),
    ));

    let markup_start = just('<').then(
        any().filter(|c: &char| c.is_ascii_alphabetic() || matches!(*c, '/' | '!')),
    );
    let text_run = any()
        .and_is(markup_start.not())
        .repeated()
        .at_least(1)
        .to_slice()
        .map_with(|text, extra| Token::Text {
            text,
            span: extra.span(),
        });

    choice((
        comment,
        declaration,
        close_tag().map(Token::Close),
        raw,
        open_tag().map(Token::Open),
        text_run,
    ))
    .repeated()
    .collect::<Vec<_>>()
    .then_ignore(end())
}

// ============================================================================
// Tree
// ============================================================================

/// Maps byte offsets of one source text to line/column positions.
#[derive(Debug)]
struct Locator<'src> {
    source: &'src str,
    line_starts: Vec<usize>,
}

impl<'src> Locator<'src> {
    fn new(source: &'src str) -> Self {
        let line_starts = core::iter::once(0)
            .chain(source.match_indices('\n').map(|(index, _)| index + 1))
            .collect();
        Self {
            source,
            line_starts,
        }
    }

    fn position(&self, offset: usize) -> Position {
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .max(1);
        let start = self.line_starts.get(line - 1).copied().unwrap_or_default();
        let column = self
            .source
            .get(start..offset)
            .map_or(0, |text| text.chars().count());
        Position {
            line,
            column: column + 1,
        }
    }

    fn at(&self, span: SimpleSpan) -> Position {
        self.position(span.start)
    }
}

/// Parses template text into its top-level nodes.
///
/// Whitespace-only text containing a line break is dropped, so indentation between
/// elements does not produce text nodes.
///
/// # Errors
///
/// Returns [`ZealError::Compile`] for unclosed elements, mismatched closing tags,
/// unterminated attribute values and comments.
pub fn parse(source: &str) -> Result<Vec<Markup>, ZealError> {
    let locator = Locator::new(source);
    let tokens = lexer().parse(source).into_result().map_err(|errors| {
        errors.first().map_or_else(
            || Position::START.error("malformed markup"),
            |error| locator.position(error.span().start).error(error.reason().to_string()),
        )
    })?;
    TreeBuilder::new(&locator).build(tokens)
}

struct TreeBuilder<'a> {
    locator: &'a Locator<'a>,
    stack: Vec<Element>,
    roots: Vec<Markup>,
}

impl<'a> TreeBuilder<'a> {
    const fn new(locator: &'a Locator<'a>) -> Self {
        Self {
            locator,
            stack: Vec::new(),
            roots: Vec::new(),
        }
    }

    fn build(mut self, tokens: Vec<Token<'_>>) -> Result<Vec<Markup>, ZealError> {
        for token in tokens {
            match token {
                Token::Comment { closed: false, span } => {
                    return Err(self.locator.at(span).error("unterminated comment"));
                }
                Token::Comment { .. } | Token::Declaration => {}
                Token::Text { text, span } => self.text(text, span),
                Token::Close(close) => self.close(&close)?,
                Token::Open(open) => {
                    let (element, self_closing) = self.open(open)?;
                    if self_closing || VOID_ELEMENTS.contains(&element.tag.as_str()) {
                        self.push(Markup::Element(element));
                    } else {
                        self.stack.push(element);
                    }
                }
                Token::Raw {
                    open,
                    body,
                    body_span,
                    close,
                } => {
                    let (mut element, _) = self.open(open)?;
                    if !close.closed {
                        return Err(self
                            .locator
                            .at(close.span)
                            .error(format!("malformed closing tag </{}", element.tag)));
                    }
                    if !body.is_empty() {
                        element.children.push(Markup::Text {
                            text: body.to_owned(),
                            position: self.locator.at(body_span),
                        });
                    }
                    self.push(Markup::Element(element));
                }
            }
        }

        if let Some(element) = self.stack.pop() {
            return Err(element
                .position
                .error(format!("unclosed element <{}>", element.tag)));
        }
        Ok(self.roots)
    }

    fn open(&self, open: OpenTag<'_>) -> Result<(Element, bool), ZealError> {
        let position = self.locator.at(open.span);
        let tag = open.name.to_ascii_lowercase();

        let mut attributes = Vec::with_capacity(open.attributes.len());
        for attribute in open.attributes {
            let value = match attribute.value {
                Some(value) if !value.terminated => {
                    return Err(self.locator.at(value.span).error("unterminated attribute value"));
                }
                Some(value) => Some(decode_entities(value.text)),
                None => None,
            };
            attributes.push(Attribute {
                name: attribute.name.to_owned(),
                value,
                position: self.locator.at(attribute.span),
            });
        }

        let self_closing = match open.end {
            TagEnd::Open => false,
            TagEnd::SelfClosing => true,
            TagEnd::Unexpected { found, at } => {
                return Err(self
                    .locator
                    .position(at)
                    .error(format!("unexpected `{found}` in tag")));
            }
            TagEnd::Eof => return Err(position.error(format!("unclosed tag <{tag}"))),
        };
        Ok((Element::new(tag, attributes, position), self_closing))
    }

    fn close(&mut self, close: &CloseTag<'_>) -> Result<(), ZealError> {
        let position = self.locator.at(close.span);
        let tag = close.name.to_ascii_lowercase();
        if !close.closed {
            return Err(position.error(format!("malformed closing tag </{tag}")));
        }
        let Some(element) = self.stack.pop() else {
            return Err(position.error(format!("unexpected closing tag </{tag}>")));
        };
        if element.tag != tag {
            return Err(position.error(format!(
                "expected </{}> (opened at {}:{}), found </{tag}>",
                element.tag, element.position.line, element.position.column
            )));
        }
        self.push(Markup::Element(element));
        Ok(())
    }

    fn text(&mut self, text: &str, span: SimpleSpan) {
        if text.trim().is_empty() && text.contains('\n') {
            return;
        }
        let position = self.locator.at(span);
        self.push(Markup::Text {
            text: decode_entities(text),
            position,
        });
    }

    fn push(&mut self, node: Markup) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }
}

impl Element {
    const fn new(tag: String, attributes: Vec<Attribute>, position: Position) -> Self {
        Self {
            tag,
            attributes,
            children: Vec::new(),
            position,
        }
    }
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_owned();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(markup: &Markup) -> &Element {
        match markup {
            Markup::Element(element) => element,
            Markup::Text { text, .. } => panic!("expected element, found text {text:?}"),
        }
    }

    #[test]
    fn parses_nested_elements_and_attributes() {
        let nodes = parse(r#"<div id="app" :class="cls" @click.prevent="go" z-once><p>hi</p></div>"#)
            .expect("valid markup");

        assert_eq!(nodes.len(), 1);
        let div = element(&nodes[0]);
        assert_eq!(div.tag, "div");
        let names: Vec<_> = div.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["id", ":class", "@click.prevent", "z-once"]);
        assert_eq!(div.attribute("id").map(Attribute::value), Some("app"));
        assert_eq!(div.attribute("z-once").and_then(|a| a.value.clone()), None);

        let p = element(&div.children[0]);
        assert_eq!(
            p.children,
            [Markup::Text {
                text: "hi".into(),
                position: Position { line: 1, column: 58 }
            }]
        );
    }

    #[test]
    fn void_and_self_closing_elements_need_no_close_tag() {
        let nodes = parse("<div><input value=x><br/><span /></div>").expect("valid markup");
        let div = element(&nodes[0]);
        let tags: Vec<_> = div.children.iter().map(|c| element(c).tag.as_str()).collect();
        assert_eq!(tags, ["input", "br", "span"]);
        assert_eq!(element(&div.children[0]).attribute("value").map(Attribute::value), Some("x"));
    }

    #[test]
    fn drops_indentation_but_keeps_inline_spaces() {
        let nodes = parse("<ul>\n  <li>a</li>\n  <li><b>x</b> <i>y</i></li>\n</ul>").expect("valid");
        let ul = element(&nodes[0]);
        assert_eq!(ul.children.len(), 2);
        let second = element(&ul.children[1]);
        assert_eq!(second.children.len(), 3);
    }

    #[test]
    fn comments_and_doctype_are_skipped() {
        let nodes = parse("<!doctype html><!-- note --><p>x</p>").expect("valid");
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn decodes_entities() {
        let nodes = parse("<p title=\"a &amp; b\">1 &lt; 2</p>").expect("valid");
        let p = element(&nodes[0]);
        assert_eq!(p.attribute("title").map(Attribute::value), Some("a & b"));
        assert!(matches!(&p.children[0], Markup::Text { text, .. } if text == "1 < 2"));
    }

    #[test]
    fn raw_text_elements_keep_markup_verbatim() {
        let nodes = parse("<style>a > b { color: red }</style>").expect("valid");
        let style = element(&nodes[0]);
        assert!(matches!(&style.children[0], Markup::Text { text, .. } if text == "a > b { color: red }"));
    }

    #[test]
    fn raw_text_may_contain_tag_like_text() {
        let nodes = parse("<script>if (a<b) {}</script><p>x</p>").expect("valid");
        assert_eq!(nodes.len(), 2);
        let script = element(&nodes[0]);
        assert!(matches!(&script.children[0], Markup::Text { text, .. } if text == "if (a<b) {}"));
    }

    #[test]
    fn locates_malformed_tags() {
        assert_eq!(
            parse("<p>\n<b \"x\"></b></p>"),
            Err(ZealError::Compile {
                message: "unexpected `\"` in tag".into(),
                line: 2,
                column: 4,
            })
        );
        assert!(matches!(
            parse("<p title=\"x>y</p>"),
            Err(ZealError::Compile { line: 1, column: 10, .. })
        ));
        assert!(matches!(
            parse("<ul>\n  <!-- open"),
            Err(ZealError::Compile { line: 2, column: 3, .. })
        ));
    }

    #[test]
    fn reports_unclosed_elements_with_location() {
        let error = parse("<div>\n  <p>text\n</div>").expect_err("mismatched");
        assert_eq!(
            error,
            ZealError::Compile {
                message: "expected </p> (opened at 2:3), found </div>".into(),
                line: 3,
                column: 1,
            }
        );

        let error = parse("<section>").expect_err("unclosed");
        assert!(matches!(error, ZealError::Compile { line: 1, column: 1, .. }));
    }

    #[test]
    fn reports_stray_closing_tags_and_unterminated_values() {
        assert!(matches!(parse("</p>"), Err(ZealError::Compile { .. })));
        assert!(matches!(parse("<p title=\"x>y</p>"), Err(ZealError::Compile { .. })));
        assert!(matches!(parse("<!-- open"), Err(ZealError::Compile { .. })));
    }
}
