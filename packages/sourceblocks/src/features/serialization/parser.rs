//! Parsers for the parenthesized source-block encoding.
//!
//! Two entry points:
//! - [`ProfileParser`] — streaming, driven in lockstep by the inserter while
//!   it traverses a CFG; matches each token to the block or edge the
//!   traversal is currently at.
//! - [`parse_node`] — standalone recursive-descent parse to an AST, used for
//!   round-trip checks and offline inspection. Iterative with an explicit
//!   stack; profile strings nest as deep as the CFG does.

use crate::errors::{Result, SourceBlockError};
use crate::shared::models::SbValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Open,
    Close,
    Atom(&'a str),
}

struct Tokenizer<'a> {
    text: &'a str,
    pos: usize,
    /// Count of tokens handed out, for error positions.
    index: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            index: 0,
        }
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if self.pos >= bytes.len() {
            return None;
        }
        self.index += 1;
        match bytes[self.pos] {
            b'(' => {
                self.pos += 1;
                Some(Token::Open)
            }
            b')' => {
                self.pos += 1;
                Some(Token::Close)
            }
            _ => {
                let start = self.pos;
                while self.pos < bytes.len()
                    && !bytes[self.pos].is_ascii_whitespace()
                    && bytes[self.pos] != b'('
                    && bytes[self.pos] != b')'
                {
                    self.pos += 1;
                }
                Some(Token::Atom(&self.text[start..self.pos]))
            }
        }
    }
}

fn is_edge_tag(atom: &str) -> bool {
    matches!(atom, "g" | "b" | "t")
}

fn parse_val(part: &str) -> Result<Option<SbValue>> {
    if part == "x" {
        return Ok(None);
    }
    let unparseable = || SourceBlockError::UnparseableVal {
        token: part.to_string(),
    };
    let (value, appear) = part.split_once(':').ok_or_else(unparseable)?;
    let value: f32 = value.parse().map_err(|_| unparseable())?;
    let appear100: f32 = appear.parse().map_err(|_| unparseable())?;
    Ok(Some(SbValue::new(value, appear100)))
}

/// Parse a `|`-joined val group. `expected > 0` enforces the configured
/// interaction count.
pub fn parse_val_group(atom: &str, expected: usize) -> Result<Vec<Option<SbValue>>> {
    let vals: Vec<Option<SbValue>> = atom
        .split('|')
        .map(parse_val)
        .collect::<Result<Vec<_>>>()?;
    if expected > 0 && vals.len() != expected {
        return Err(SourceBlockError::ValueCountMismatch {
            expected,
            found: vals.len(),
        });
    }
    Ok(vals)
}

/// Streaming parser over one method's profile string.
///
/// The caller (the inserter's traversal) announces what it is at — block
/// start, followed edge, block end — and the parser checks the token stream
/// matches, yielding val groups as it goes. Any divergence is a
/// [`SourceBlockError::StructureMismatch`].
pub struct ProfileParser<'a> {
    toks: Tokenizer<'a>,
    expected_vals: usize,
}

impl<'a> ProfileParser<'a> {
    pub fn new(text: &'a str, expected_vals: usize) -> Self {
        Self {
            toks: Tokenizer::new(text),
            expected_vals,
        }
    }

    fn next_token(&mut self) -> Option<Token<'a>> {
        self.toks.next()
    }

    /// Consume `(` plus the block's leading val group.
    pub fn enter_block(&mut self) -> Result<Vec<Option<SbValue>>> {
        match self.next_token() {
            Some(Token::Open) => {}
            Some(tok) => {
                return Err(SourceBlockError::structure(format!(
                    "expected '(' at token {}, found {tok:?}",
                    self.toks.index
                )))
            }
            None => {
                return Err(SourceBlockError::structure(
                    "profile exhausted before traversal",
                ))
            }
        }
        self.val_group()
    }

    /// Consume one more val group (additional source block in this group).
    pub fn val_group(&mut self) -> Result<Vec<Option<SbValue>>> {
        match self.next_token() {
            Some(Token::Atom(atom)) if !is_edge_tag(atom) => {
                parse_val_group(atom, self.expected_vals)
            }
            Some(tok) => Err(SourceBlockError::structure(format!(
                "expected val group at token {}, found {tok:?}",
                self.toks.index
            ))),
            None => Err(SourceBlockError::structure(
                "profile exhausted before traversal",
            )),
        }
    }

    /// Consume the edge tag for a followed edge; it must match `tag`.
    pub fn edge(&mut self, tag: char) -> Result<()> {
        match self.next_token() {
            Some(Token::Atom(atom)) if atom.len() == 1 && atom.starts_with(tag) => Ok(()),
            Some(tok) => Err(SourceBlockError::structure(format!(
                "expected edge tag '{tag}' at token {}, found {tok:?}",
                self.toks.index
            ))),
            None => Err(SourceBlockError::structure(
                "profile exhausted before traversal",
            )),
        }
    }

    /// Consume `)`.
    pub fn exit_block(&mut self) -> Result<()> {
        match self.next_token() {
            Some(Token::Close) => Ok(()),
            Some(tok) => Err(SourceBlockError::structure(format!(
                "expected ')' at token {}, found {tok:?}",
                self.toks.index
            ))),
            None => Err(SourceBlockError::UnterminatedGroup {
                position: self.toks.index,
            }),
        }
    }

    /// The traversal is done; the token stream must be too.
    pub fn finish(&mut self) -> Result<()> {
        match self.next_token() {
            None => Ok(()),
            Some(tok) => Err(SourceBlockError::structure(format!(
                "profile has leftover tokens starting at {}: {tok:?}",
                self.toks.index
            ))),
        }
    }
}

/// Parsed node of the encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct SbNode {
    pub id: Option<u32>,
    /// One entry per source block in the group, each one val per interaction.
    pub vals: Vec<Vec<Option<SbValue>>>,
    /// Followed edges in order; `None` target marks an already-emitted block.
    pub edges: Vec<(char, Option<SbNode>)>,
}

impl SbNode {
    fn empty() -> Self {
        Self {
            id: None,
            vals: Vec::new(),
            edges: Vec::new(),
        }
    }
}

struct Building {
    node: SbNode,
    pending_tag: Option<char>,
    /// Tag that led into this node; `None` only for the root.
    via: Option<char>,
}

/// Parse a complete serialized node. `with_ids` accepts the subsystem's own
/// output (leading integer per group); `expected_vals > 0` enforces val-group
/// arity.
pub fn parse_node(text: &str, with_ids: bool, expected_vals: usize) -> Result<SbNode> {
    let mut toks = Tokenizer::new(text);
    match toks.next() {
        Some(Token::Open) => {}
        other => {
            return Err(SourceBlockError::structure(format!(
                "expected '(' at start, found {other:?}"
            )))
        }
    }

    let mut stack = vec![Building {
        node: SbNode::empty(),
        pending_tag: None,
        via: None,
    }];

    loop {
        match toks.next() {
            None => {
                return Err(SourceBlockError::UnterminatedGroup {
                    position: toks.index,
                })
            }
            Some(Token::Open) => {
                let top = stack.last_mut().unwrap();
                match top.pending_tag.take() {
                    Some(tag) => stack.push(Building {
                        node: SbNode::empty(),
                        pending_tag: None,
                        via: Some(tag),
                    }),
                    None => {
                        return Err(SourceBlockError::structure(format!(
                            "group without a preceding edge tag at token {}",
                            toks.index
                        )))
                    }
                }
            }
            Some(Token::Close) => {
                let mut done = stack.pop().unwrap();
                if let Some(tag) = done.pending_tag.take() {
                    done.node.edges.push((tag, None));
                }
                match stack.last_mut() {
                    Some(parent) => {
                        let via = done.via.unwrap();
                        parent.node.edges.push((via, Some(done.node)));
                    }
                    None => {
                        if let Some(tok) = toks.next() {
                            return Err(SourceBlockError::structure(format!(
                                "trailing tokens after root group: {tok:?}"
                            )));
                        }
                        return Ok(done.node);
                    }
                }
            }
            Some(Token::Atom(atom)) => {
                let top = stack.last_mut().unwrap();
                if is_edge_tag(atom) {
                    let tag = atom.chars().next().unwrap();
                    if let Some(prev) = top.pending_tag.replace(tag) {
                        top.node.edges.push((prev, None));
                    }
                } else if with_ids
                    && top.node.id.is_none()
                    && top.node.vals.is_empty()
                    && top.node.edges.is_empty()
                    && top.pending_tag.is_none()
                    && atom.bytes().all(|b| b.is_ascii_digit())
                {
                    top.node.id = Some(atom.parse().map_err(|_| {
                        SourceBlockError::structure(format!("id out of range: {atom}"))
                    })?);
                } else {
                    if top.pending_tag.is_some() || !top.node.edges.is_empty() {
                        return Err(SourceBlockError::structure(format!(
                            "val group after edges at token {}",
                            toks.index
                        )));
                    }
                    top.node.vals.push(parse_val_group(atom, expected_vals)?);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_own_serialization() {
        // Diamond CFG output shape.
        let node = parse_node("(0 g(1 g(2) t(3 g)) b(4 g))", true, 0).unwrap();
        assert_eq!(node.id, Some(0));
        assert_eq!(node.edges.len(), 2);
        let (tag, child) = &node.edges[0];
        assert_eq!(*tag, 'g');
        let child = child.as_ref().unwrap();
        assert_eq!(child.id, Some(1));
        assert_eq!(child.edges.len(), 2);
        // (3 g): followed edge to an already-emitted block.
        let (_, b4) = &child.edges[1];
        assert_eq!(b4.as_ref().unwrap().edges, vec![('g', None)]);
    }

    #[test]
    fn parse_profile_string() {
        let node = parse_node(
            "(0.1:0.5 g(0.2:0.4 g(0.3:0.3) t(0.4:0.2 g)) b(0.5:0.1 g))",
            false,
            1,
        )
        .unwrap();
        assert_eq!(node.id, None);
        assert_eq!(node.vals, vec![vec![Some(SbValue::new(0.1, 0.5))]]);
        assert_eq!(node.edges.len(), 2);
    }

    #[test]
    fn unparseable_val_reports_token() {
        let err = parse_node("(0hello:world g(x))", false, 0).unwrap_err();
        match err {
            SourceBlockError::UnparseableVal { token } => {
                assert_eq!(token, "0hello:world");
            }
            other => panic!("expected UnparseableVal, got {other:?}"),
        }
    }

    #[test]
    fn unterminated_group() {
        let err = parse_node("(x g(x)", false, 0).unwrap_err();
        assert!(matches!(err, SourceBlockError::UnterminatedGroup { .. }));
    }

    #[test]
    fn value_count_mismatch() {
        let err = parse_val_group("0.1:0.5|x", 3).unwrap_err();
        match err {
            SourceBlockError::ValueCountMismatch { expected, found } => {
                assert_eq!((expected, found), (3, 2));
            }
            other => panic!("expected ValueCountMismatch, got {other:?}"),
        }
    }

    #[test]
    fn streaming_matches_shape() {
        let mut p = ProfileParser::new("(0.5:1 g(x g))", 1);
        assert_eq!(p.enter_block().unwrap(), vec![Some(SbValue::new(0.5, 1.0))]);
        p.edge('g').unwrap();
        assert_eq!(p.enter_block().unwrap(), vec![None]);
        p.edge('g').unwrap();
        p.exit_block().unwrap();
        p.exit_block().unwrap();
        p.finish().unwrap();
    }

    #[test]
    fn streaming_rejects_wrong_tag() {
        let mut p = ProfileParser::new("(0.5:1 b(x))", 1);
        p.enter_block().unwrap();
        let err = p.edge('g').unwrap_err();
        assert!(matches!(err, SourceBlockError::StructureMismatch { .. }));
    }

    #[test]
    fn streaming_rejects_leftover_tokens() {
        let mut p = ProfileParser::new("(0.5:1) (x)", 1);
        p.enter_block().unwrap();
        p.exit_block().unwrap();
        let err = p.finish().unwrap_err();
        assert!(matches!(err, SourceBlockError::StructureMismatch { .. }));
    }

    #[test]
    fn multiple_groups_per_block() {
        // Two source blocks share one block group (post-throw insertion).
        let mut p = ProfileParser::new("(0.5:1 0.25:1 g)", 1);
        assert_eq!(p.enter_block().unwrap(), vec![Some(SbValue::new(0.5, 1.0))]);
        assert_eq!(
            p.val_group().unwrap(),
            vec![Some(SbValue::new(0.25, 1.0))]
        );
        p.edge('g').unwrap();
        p.exit_block().unwrap();
        p.finish().unwrap();
    }
}
