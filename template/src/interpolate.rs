//! Text interpolation.
//!
//! A text run is split into literal segments and expression segments. Expressions are
//! written as `{{ expr }}` or as a bare `$identifier`, optionally dotted
//! (`$user.name`). A `$` not followed by an identifier stays literal, as does a
//! trailing `.` after a `$` token ("costs $total.").

use chumsky::prelude::*;
use zeal_core::{Resolve, Str, ZealError, evaluate_in};

use crate::parser::{Extra, Position};

/// One piece of an interpolated text run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied as is.
    Literal(Str),
    /// An expression evaluated on every build.
    Expr(Str),
}

#[derive(Debug, Clone)]
enum Piece<'src> {
    Literal(&'src str),
    Expr(&'src str),
    /// A `{{` with no `}}` after it, at this byte offset.
    Unterminated(usize),
}

fn pieces<'src>() -> impl Parser<'src, &'src str, Vec<Piece<'src>>, Extra<'src>> {
    let braces = just("{{")
        .ignore_then(any().and_is(just("}}").not()).repeated().to_slice())
        .then(just("}}").or_not())
        .map_with(|(body, close): (&str, Option<&str>), extra| match close {
            Some(_) => Piece::Expr(body.trim()),
            None => Piece::Unterminated({ let span: SimpleSpan = extra.span(); span.start }),
        });

    let word = any()
        .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_')
        .repeated()
        .at_least(1);
    let path = any()
        .filter(|c: &char| c.is_ascii_alphabetic() || *c == '_')
        .then(word.clone().or_not())
        .then(just('.').then(word).repeated())
        .to_slice();
    let dollar = just('$').ignore_then(path).map(Piece::Expr);

    let literal = any()
        .and_is(just("{{").not())
        .and_is(dollar.clone().not())
        .repeated()
        .at_least(1)
        .to_slice()
        .map(Piece::Literal);

    choice((braces, dollar, literal))
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(end())
}

/// Splits `text` into segments.
///
/// `position` is where `text` starts in the template; it locates errors.
///
/// # Errors
///
/// Returns [`ZealError::Compile`] for a `{{` without its closing `}}`.
pub fn parse(text: &str, position: Position) -> Result<Vec<Segment>, ZealError> {
    let located = |offset: usize| position.advance(text.get(..offset).unwrap_or(text));
    let pieces = pieces().parse(text).into_result().map_err(|errors| {
        let offset = errors.first().map_or(0, |error| error.span().start);
        located(offset).error("malformed interpolation")
    })?;

    let mut segments = Vec::with_capacity(pieces.len());
    for piece in pieces {
        match piece {
            Piece::Literal(literal) => segments.push(Segment::Literal(Str::from(literal))),
            Piece::Expr(expr) => segments.push(Segment::Expr(Str::from(expr))),
            Piece::Unterminated(offset) => {
                return Err(located(offset).error("unterminated `{{` interpolation"));
            }
        }
    }
    Ok(segments)
}

/// Whether the segments contain no expression.
#[must_use]
pub fn is_static(segments: &[Segment]) -> bool {
    segments.iter().all(|segment| matches!(segment, Segment::Literal(_)))
}

/// Concatenates the segments, evaluating expressions in `scope`.
///
/// Expressions that fail or yield `undefined`/`null` contribute nothing.
pub fn render<R: Resolve + ?Sized>(segments: &[Segment], scope: &R) -> Str {
    if let [Segment::Literal(text)] = segments {
        return text.clone();
    }
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Expr(expr) => out.push_str(&evaluate_in(expr, scope).to_display_string()),
        }
    }
    Str::from(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeal_core::Value;

    fn expr(text: &str) -> Segment {
        Segment::Expr(text.into())
    }

    fn lit(text: &str) -> Segment {
        Segment::Literal(text.into())
    }

    #[test]
    fn splits_braces_and_dollar_tokens() {
        let segments = parse("Hi {{ user.name }}, you owe $total.", Position::START).expect("valid");
        assert_eq!(
            segments,
            [lit("Hi "), expr("user.name"), lit(", you owe "), expr("total"), lit(".")]
        );
    }

    #[test]
    fn dotted_dollar_tokens_and_lone_dollars() {
        let segments = parse("$user.name costs $ 5", Position::START).expect("valid");
        assert_eq!(segments, [expr("user.name"), lit(" costs $ 5")]);
    }

    #[test]
    fn plain_text_is_static() {
        let segments = parse("just text", Position::START).expect("valid");
        assert!(is_static(&segments));
        assert!(!is_static(&parse("{{x}}", Position::START).expect("valid")));
    }

    #[test]
    fn unterminated_braces_are_located() {
        let error = parse("ok\nthen {{ oops", Position { line: 4, column: 7 }).expect_err("unterminated");
        assert!(matches!(error, ZealError::Compile { line: 5, column: 6, .. }));
    }

    #[test]
    fn renders_against_a_scope() {
        let scope = Value::from(serde_json::json!({ "n": 3, "name": "Ada" }));
        let segments = parse("{{name}} has $n items{{ missing }}", Position::START).expect("valid");
        assert_eq!(&*render(&segments, &scope), "Ada has 3 items");
    }
}
