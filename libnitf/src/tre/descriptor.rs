//! TRE layout descriptors and the text format they are registered from
//!
//! ```text
//! tre ENGRDA
//!     field RESRC 20 string
//!     field RECNT 3 integer
//!     loop RECNT
//!         field ENGLN 2 integer
//!         field ENGLBL ENGLN string
//!         field ENGDATA ENGDATC*ENGDTS binary
//!     end
//! end
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1, multispace1, not_line_ending, one_of, satisfy},
    combinator::{all_consuming, map, map_res, not, opt, peek, value},
    multi::{many0, many0_count},
    sequence::{pair, preceded, terminated, tuple},
    IResult,
};
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::{Error, Result};

/// Declared data type of a TRE field
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, Display)]
#[strum(serialize_all = "lowercase")]
pub enum FieldType {
    /// BCS-A text
    String,
    /// BCS-N integer
    Integer,
    /// BCS-N decimal
    Real,
    /// Unsigned binary integer, big-endian
    Uint,
    /// Opaque bytes
    Binary,
}

/// A term of a [`WidthExpr`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidthTerm {
    /// Constant
    Literal(u64),
    /// Value of an earlier field
    Field(String),
    /// All bytes not yet consumed in the current TRE
    Rest,
}

/// Arithmetic combining [`WidthTerm`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidthOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
}

/// A field width or loop count, evaluated left to right
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidthExpr {
    first: WidthTerm,
    rest: Vec<(WidthOp, WidthTerm)>,
    source: String,
}

impl WidthExpr {
    /// A constant width
    #[must_use]
    pub fn literal(value: u64) -> Self {
        Self {
            first: WidthTerm::Literal(value),
            rest: Vec::new(),
            source: value.to_string(),
        }
    }

    /// The width held by an earlier field
    #[must_use]
    pub fn field(name: &str) -> Self {
        Self {
            first: WidthTerm::Field(name.to_owned()),
            rest: Vec::new(),
            source: name.to_owned(),
        }
    }

    /// The expression as written
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the expression, resolving field references and the rest-of-record term
    /// through `resolve`
    ///
    /// # Errors
    ///
    /// Propagates resolution failures, and returns [`Error::Descriptor`] on overflow or a
    /// negative result
    pub fn evaluate(&self, mut resolve: impl FnMut(&WidthTerm) -> Result<u64>) -> Result<u64> {
        let mut total = resolve(&self.first)?;
        for (op, term) in &self.rest {
            let operand = resolve(term)?;
            total = match op {
                WidthOp::Add => total.checked_add(operand),
                WidthOp::Sub => total.checked_sub(operand),
                WidthOp::Mul => total.checked_mul(operand),
            }
            .ok_or_else(|| {
                Error::Descriptor(format!("width expression {} is out of range", self.source))
            })?;
        }
        Ok(total)
    }
}

/// One step of a TRE layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorNode {
    /// Read a single field
    Field {
        /// field name
        name: String,
        /// width in bytes
        width: WidthExpr,
        /// data type
        field_type: FieldType,
    },
    /// Repeat `body` `count` times; each iteration becomes one group
    Loop {
        /// iteration count
        count: WidthExpr,
        /// nested layout
        body: Vec<DescriptorNode>,
    },
    /// Read `body` only if an earlier field holds (or does not hold) `value`
    Condition {
        /// field tested
        field: String,
        /// `!=` rather than `=`
        negated: bool,
        /// compared against the trimmed field text
        value: String,
        /// nested layout
        body: Vec<DescriptorNode>,
    },
}

/// The layout of one TRE tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreDescriptor {
    name: String,
    length: Option<u64>,
    nodes: Vec<DescriptorNode>,
}

impl TreDescriptor {
    /// Creates a new [`TreDescriptor`]
    pub fn new(name: impl Into<String>, length: Option<u64>, nodes: Vec<DescriptorNode>) -> Self {
        Self {
            name: name.into(),
            length,
            nodes,
        }
    }

    /// The tag
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fixed `CEL` this layout expects, if it has one
    #[must_use]
    pub const fn length(&self) -> Option<u64> {
        self.length
    }

    /// The top-level layout
    #[must_use]
    pub fn nodes(&self) -> &[DescriptorNode] {
        &self.nodes
    }

    /// Parses every `tre ... end` block in `source`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Descriptor`] quoting the text where parsing stopped
    pub fn parse_all(source: &str) -> Result<Vec<Self>> {
        all_consuming(terminated(many0(tre_block), skip))(source)
            .map(|(_, descriptors)| descriptors)
            .map_err(|e| {
                let near = match &e {
                    nom::Err::Error(e) | nom::Err::Failure(e) => e.input,
                    nom::Err::Incomplete(_) => "",
                };
                Error::Descriptor(format!(
                    "unable to parse near {:?}",
                    near.chars().take(40).collect::<String>()
                ))
            })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

// Whitespace and `#` comments.
fn skip(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0_count(alt((multispace1, preceded(char('#'), not_line_ending)))),
    )(input)
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    preceded(skip, terminated(tag(word), not(peek(satisfy(is_ident_char)))))
}

fn ident(input: &str) -> IResult<&str, &str> {
    preceded(skip, take_while1(is_ident_char))(input)
}

fn number(input: &str) -> IResult<&str, u64> {
    map_res(digit1, str::parse)(input)
}

fn term(input: &str) -> IResult<&str, WidthTerm> {
    alt((
        map(number, WidthTerm::Literal),
        map(take_while1(is_ident_char), |s: &str| {
            WidthTerm::Field(s.to_owned())
        }),
    ))(input)
}

fn op(input: &str) -> IResult<&str, WidthOp> {
    map(one_of("+-*"), |c| match c {
        '+' => WidthOp::Add,
        '-' => WidthOp::Sub,
        _ => WidthOp::Mul,
    })(input)
}

fn width_expr(input: &str) -> IResult<&str, WidthExpr> {
    let (input, _) = skip(input)?;
    let start = input;
    let (input, (first, rest)) = alt((
        map(
            terminated(char('*'), not(peek(satisfy(is_ident_char)))),
            |_| (WidthTerm::Rest, Vec::new()),
        ),
        pair(term, many0(pair(op, term))),
    ))(input)?;
    let source = start[..start.len() - input.len()].to_owned();
    Ok((
        input,
        WidthExpr {
            first,
            rest,
            source,
        },
    ))
}

fn field_type(input: &str) -> IResult<&str, FieldType> {
    map_res(ident, str::parse)(input)
}

fn field_node(input: &str) -> IResult<&str, DescriptorNode> {
    map(
        preceded(keyword("field"), tuple((ident, width_expr, field_type))),
        |(name, width, field_type)| DescriptorNode::Field {
            name: name.to_owned(),
            width,
            field_type,
        },
    )(input)
}

fn loop_node(input: &str) -> IResult<&str, DescriptorNode> {
    map(
        preceded(
            keyword("loop"),
            pair(width_expr, terminated(many0(node), keyword("end"))),
        ),
        |(count, body)| DescriptorNode::Loop { count, body },
    )(input)
}

fn condition_node(input: &str) -> IResult<&str, DescriptorNode> {
    map(
        preceded(
            keyword("if"),
            tuple((
                ident,
                preceded(skip, alt((value(true, tag("!=")), value(false, tag("="))))),
                preceded(skip, take_while1(|c: char| !c.is_whitespace())),
                terminated(many0(node), keyword("end")),
            )),
        ),
        |(field, negated, value, body)| DescriptorNode::Condition {
            field: field.to_owned(),
            negated,
            value: value.to_owned(),
            body,
        },
    )(input)
}

fn node(input: &str) -> IResult<&str, DescriptorNode> {
    alt((field_node, loop_node, condition_node))(input)
}

fn tre_block(input: &str) -> IResult<&str, TreDescriptor> {
    map(
        preceded(
            keyword("tre"),
            tuple((
                ident,
                opt(preceded(skip, number)),
                terminated(many0(node), keyword("end")),
            )),
        ),
        |(name, length, nodes)| TreDescriptor::new(name, length, nodes),
    )(input)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{DescriptorNode, FieldType, TreDescriptor, WidthOp, WidthTerm};
    use crate::error::{Error, Result};

    #[test]
    fn parses_nested_layout() -> Result<()> {
        let source = "
            # comment line
            tre TESTAA 12
                field COUNT 2 integer
                loop COUNT
                    field LEN 1 integer
                    field LABEL LEN string   # trailing comment
                    if LEN != 0
                        field DATA LEN*2 binary
                    end
                end
                field TAIL * string
            end
        ";
        let descriptors = TreDescriptor::parse_all(source)?;
        assert_eq!(descriptors.len(), 1);
        let testaa = &descriptors[0];
        assert_eq!(testaa.name(), "TESTAA");
        assert_eq!(testaa.length(), Some(12));
        assert_eq!(testaa.nodes().len(), 3);

        let DescriptorNode::Loop { count, body } = &testaa.nodes()[1] else {
            panic!("expected a loop");
        };
        assert_eq!(count.source(), "COUNT");
        let DescriptorNode::Condition {
            negated, body: inner, ..
        } = &body[2]
        else {
            panic!("expected a condition");
        };
        assert!(negated);
        let DescriptorNode::Field {
            width, field_type, ..
        } = &inner[0]
        else {
            panic!("expected a field");
        };
        assert_eq!(*field_type, FieldType::Binary);
        assert_eq!(width.source(), "LEN*2");
        let doubled = width.evaluate(|t| match t {
            WidthTerm::Field(_) => Ok(3),
            WidthTerm::Literal(n) => Ok(*n),
            WidthTerm::Rest => Ok(0),
        })?;
        assert_eq!(doubled, 6);

        let DescriptorNode::Field { width, .. } = &testaa.nodes()[2] else {
            panic!("expected a field");
        };
        assert_eq!(width.source(), "*");
        Ok(())
    }

    #[test]
    fn width_expression_underflow() {
        let descriptors = TreDescriptor::parse_all("tre X field A 1-B string end").unwrap();
        let DescriptorNode::Field { width, .. } = &descriptors[0].nodes()[0] else {
            panic!("expected a field");
        };
        assert_eq!(width.rest.first().map(|(op, _)| *op), Some(WidthOp::Sub));
        assert!(matches!(
            width.evaluate(|t| match t {
                WidthTerm::Literal(n) => Ok(*n),
                _ => Ok(5),
            }),
            Err(Error::Descriptor(_))
        ));
    }

    #[test]
    fn rejects_unknown_type() {
        assert!(matches!(
            TreDescriptor::parse_all("tre X field A 1 float end"),
            Err(Error::Descriptor(_))
        ));
    }
}
