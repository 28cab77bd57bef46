//! State machine config parser.
//!
//! A state machine config has a `[STATE_VECTOR]` section binding shared
//! elements, an optional `[LOCAL]` section declaring machine-private
//! elements with initializers, and one section per state:
//!
//! ```text
//! [STATE_VECTOR]
//! U64 time  @ALIAS G
//! U32 state @ALIAS S
//!
//! [LOCAL]
//! F64 foo = 0
//!
//! [Initial]
//! .ENTRY
//!     foo = 1
//! .STEP
//!     100 <= T <= 200: foo = 7.777 ELSE: foo = 9.81
//!     foo > 100 {
//!         -> Safed
//!     }
//! ```
//!
//! Statements under a label form a chain of blocks; guards nest their
//! if/else branches as child blocks. Newlines separate statements; a
//! brace-guarded block may put its left brace on the following line.

use surefire_core::Error;

use crate::diag::ConfigError;
use crate::expr_parse::{self, ExprNode};
use crate::token::{Token, TokenCursor, TokenKind};

const ERR_CATEGORY: &str = "state machine config error";

const SECTION_STATE_VECTOR: &str = "STATE_VECTOR";
const SECTION_LOCAL: &str = "LOCAL";
const LABEL_ENTRY: &str = ".ENTRY";
const LABEL_STEP: &str = ".STEP";
const LABEL_EXIT: &str = ".EXIT";
const ANNOTATION_READ_ONLY: &str = "@READ_ONLY";
const ANNOTATION_ALIAS: &str = "@ALIAS";

/// One `[STATE_VECTOR]` element binding.
#[derive(Debug, Clone)]
pub struct SvElementParse {
    pub ty: Token,
    pub name: Token,
    pub alias: Option<Token>,
    pub read_only: bool,
}

/// One `[LOCAL]` element declaration.
#[derive(Debug, Clone)]
pub struct LocalElementParse {
    pub ty: Token,
    pub name: Token,
    pub init: ExprNode,
    pub read_only: bool,
}

/// A parsed statement action.
#[derive(Debug, Clone)]
pub enum ActionParse {
    Assignment { target: Token, rhs: ExprNode },
    Transition { keyword: Token, dest: Token },
}

/// One parsed statement. A guard carries nested if/else chains; an
/// unguarded statement carries an action. `next` links the following
/// statement in the same chain.
#[derive(Debug, Clone, Default)]
pub struct BlockParse {
    pub guard: Option<ExprNode>,
    pub if_block: Option<Box<BlockParse>>,
    pub else_block: Option<Box<BlockParse>>,
    pub action: Option<ActionParse>,
    pub next: Option<Box<BlockParse>>,
}

/// One parsed state section. A label that appears with no statements
/// parses to an empty block, distinguishing it from an absent label.
#[derive(Debug, Clone)]
pub struct StateParse {
    pub name: Token,
    pub entry: Option<BlockParse>,
    pub step: Option<BlockParse>,
    pub exit: Option<BlockParse>,
}

/// A parsed state machine config.
#[derive(Debug, Clone)]
pub struct StateMachineParse {
    pub sv_elems: Vec<SvElementParse>,
    pub local_elems: Vec<LocalElementParse>,
    pub states: Vec<StateParse>,
    pub has_sv_section: bool,
    pub has_local_section: bool,
}

/// Parse a tokenized state machine config.
pub fn parse(toks: &[Token]) -> Result<StateMachineParse, ConfigError> {
    let mut cursor = TokenCursor::new(toks);
    let mut parse = StateMachineParse {
        sv_elems: Vec::new(),
        local_elems: Vec::new(),
        states: Vec::new(),
        has_sv_section: false,
        has_local_section: false,
    };

    while let Some(tok) = cursor.peek() {
        match tok.kind {
            TokenKind::Newline => {
                cursor.take();
            }
            TokenKind::Section if tok.text == SECTION_STATE_VECTOR => {
                if parse.has_sv_section {
                    return Err(ConfigError::at(
                        Error::SmpSvDupe,
                        ERR_CATEGORY,
                        "more than one state vector section",
                        tok,
                    ));
                }
                parse_sv_section(&mut cursor, &mut parse.sv_elems)?;
                parse.has_sv_section = true;
            }
            TokenKind::Section if tok.text == SECTION_LOCAL => {
                if parse.has_local_section {
                    return Err(ConfigError::at(
                        Error::SmpLocalDupe,
                        ERR_CATEGORY,
                        "more than one local section",
                        tok,
                    ));
                }
                parse_local_section(&mut cursor, &mut parse.local_elems)?;
                parse.has_local_section = true;
            }
            TokenKind::Section => {
                parse.states.push(parse_state_section(&mut cursor)?);
            }
            _ => {
                return Err(ConfigError::at(
                    Error::SmpToken,
                    ERR_CATEGORY,
                    "unexpected token",
                    tok,
                ));
            }
        }
    }

    Ok(parse)
}

fn expect_type_and_name<'a>(
    cursor: &mut TokenCursor<'a>,
) -> Result<(&'a Token, &'a Token), ConfigError> {
    let ty = match cursor.peek() {
        Some(tok) if tok.kind == TokenKind::Identifier => {
            cursor.take();
            tok
        }
        Some(tok) => {
            return Err(ConfigError::at(
                Error::SmpElemType,
                ERR_CATEGORY,
                "expected element type",
                tok,
            ));
        }
        None => {
            return Err(ConfigError::global(
                Error::Unreachable,
                ERR_CATEGORY,
                "element scan",
            ));
        }
    };

    let name = match cursor.peek() {
        Some(tok) if tok.kind == TokenKind::Identifier => {
            cursor.take();
            tok
        }
        _ => {
            return Err(ConfigError::at(
                Error::SmpElemName,
                ERR_CATEGORY,
                "expected element name after type",
                ty,
            ));
        }
    };

    Ok((ty, name))
}

fn parse_sv_section(
    cursor: &mut TokenCursor,
    elems: &mut Vec<SvElementParse>,
) -> Result<(), ConfigError> {
    cursor.take(); // section token

    loop {
        cursor.eat_newlines();
        match cursor.kind() {
            None | Some(TokenKind::Section) => break,
            _ => {}
        }

        let (ty, name) = expect_type_and_name(cursor)?;
        let mut elem = SvElementParse {
            ty: ty.clone(),
            name: name.clone(),
            alias: None,
            read_only: false,
        };

        while cursor.kind() == Some(TokenKind::Annotation) {
            let Some(annot) = cursor.take() else { break };
            match annot.text.as_str() {
                ANNOTATION_READ_ONLY => {
                    if elem.read_only {
                        return Err(ConfigError::at(
                            Error::SmpReadOnlyDupe,
                            ERR_CATEGORY,
                            "redundant read-only annotation",
                            annot,
                        ));
                    }
                    elem.read_only = true;
                }
                ANNOTATION_ALIAS => {
                    if elem.alias.is_some() {
                        return Err(ConfigError::at(
                            Error::SmpAliasDupe,
                            ERR_CATEGORY,
                            "an element may only have one alias",
                            annot,
                        ));
                    }
                    // `@ALIAS Name` and `@ALIAS=Name` are both accepted.
                    if cursor.peek().is_some_and(|t| t.is(TokenKind::Operator, "=")) {
                        cursor.take();
                    }
                    match cursor.peek() {
                        Some(tok) if tok.kind == TokenKind::Identifier => {
                            cursor.take();
                            elem.alias = Some(tok.clone());
                        }
                        _ => {
                            return Err(ConfigError::at(
                                Error::SmpAlias,
                                ERR_CATEGORY,
                                format!("expected alias name after `{}`", annot.text),
                                annot,
                            ));
                        }
                    }
                }
                _ => {
                    return Err(ConfigError::at(
                        Error::SmpAnnotation,
                        ERR_CATEGORY,
                        "unknown annotation",
                        annot,
                    ));
                }
            }
        }

        elems.push(elem);
    }

    Ok(())
}

fn parse_local_section(
    cursor: &mut TokenCursor,
    elems: &mut Vec<LocalElementParse>,
) -> Result<(), ConfigError> {
    cursor.take(); // section token

    loop {
        cursor.eat_newlines();
        match cursor.kind() {
            None | Some(TokenKind::Section) => break,
            _ => {}
        }

        let (ty, name) = expect_type_and_name(cursor)?;

        let assign = match cursor.peek() {
            Some(tok) if tok.is(TokenKind::Operator, "=") => {
                cursor.take();
                tok
            }
            _ => {
                return Err(ConfigError::at(
                    Error::SmpLocalOp,
                    ERR_CATEGORY,
                    "expected `=` after element name",
                    name,
                ));
            }
        };

        // The initializer runs to the end of the line or to an
        // annotation attached to the element.
        let idx_end = cursor.find(&[TokenKind::Newline, TokenKind::Annotation]);
        if cursor.pos() == idx_end {
            return Err(ConfigError::at(
                Error::SmpLocalValue,
                ERR_CATEGORY,
                "expected element initial value after `=`",
                assign,
            ));
        }
        let init = expr_parse::parse(cursor.slice(cursor.pos(), idx_end))?;
        cursor.seek(idx_end);

        let mut read_only = false;
        while cursor.kind() == Some(TokenKind::Annotation) {
            let Some(annot) = cursor.take() else { break };
            match annot.text.as_str() {
                ANNOTATION_READ_ONLY => {
                    if read_only {
                        return Err(ConfigError::at(
                            Error::SmpReadOnlyDupe,
                            ERR_CATEGORY,
                            "redundant read-only annotation",
                            annot,
                        ));
                    }
                    read_only = true;
                }
                _ => {
                    return Err(ConfigError::at(
                        Error::SmpAnnotation,
                        ERR_CATEGORY,
                        "unknown annotation",
                        annot,
                    ));
                }
            }
        }

        elems.push(LocalElementParse {
            ty: ty.clone(),
            name: name.clone(),
            init,
            read_only,
        });
    }

    Ok(())
}

fn parse_state_section(cursor: &mut TokenCursor) -> Result<StateParse, ConfigError> {
    let name = match cursor.take() {
        Some(tok) => tok.clone(),
        None => {
            return Err(ConfigError::global(
                Error::Unreachable,
                ERR_CATEGORY,
                "state scan",
            ));
        }
    };

    let mut state = StateParse {
        name,
        entry: None,
        step: None,
        exit: None,
    };

    loop {
        cursor.eat_newlines();
        match cursor.kind() {
            None | Some(TokenKind::Section) => break,
            _ => {}
        }

        let Some(label) = cursor.take() else { break };
        if label.kind != TokenKind::Label {
            return Err(ConfigError::at(
                Error::SmpNoLabel,
                ERR_CATEGORY,
                "expected label",
                label,
            ));
        }

        let idx_label_end = cursor.find(&[TokenKind::Label, TokenKind::Section]);
        let block = parse_block(cursor.slice(cursor.pos(), idx_label_end))?;
        cursor.seek(idx_label_end);

        let slot = match label.text.as_str() {
            LABEL_ENTRY => &mut state.entry,
            LABEL_STEP => &mut state.step,
            LABEL_EXIT => &mut state.exit,
            _ => {
                return Err(ConfigError::at(
                    Error::SmpLabel,
                    ERR_CATEGORY,
                    format!("unknown label `{}`", label.text),
                    label,
                ));
            }
        };
        if slot.is_some() {
            return Err(ConfigError::at(
                Error::SmpLabelDupe,
                ERR_CATEGORY,
                format!("multiple `{}` labels", label.text),
                label,
            ));
        }
        *slot = Some(block);
    }

    Ok(state)
}

fn is_keyword(tok: &Token, upper: &str, lower: &str) -> bool {
    tok.kind == TokenKind::Identifier && (tok.text == upper || tok.text == lower)
}

/// Parse the statements of one label body into a block chain. An empty
/// body yields an empty block.
fn parse_block(toks: &[Token]) -> Result<BlockParse, ConfigError> {
    let mut cursor = TokenCursor::new(toks);
    let mut stmts: Vec<BlockParse> = Vec::new();

    loop {
        cursor.eat_newlines();
        if cursor.eof() {
            break;
        }

        let idx_end = cursor.find(&[TokenKind::Colon, TokenKind::LBrace, TokenKind::Newline]);

        // A colon or brace before the next newline means the statement
        // is guarded. A newline followed by a left brace also starts a
        // guard, with the brace on its own line.
        let mut guard_end = idx_end;
        let mut is_guard = idx_end < toks.len()
            && matches!(toks[idx_end].kind, TokenKind::Colon | TokenKind::LBrace);
        if !is_guard {
            let mut j = idx_end;
            while j < toks.len() && toks[j].kind == TokenKind::Newline {
                j += 1;
            }
            if j < toks.len() && toks[j].kind == TokenKind::LBrace {
                is_guard = true;
                guard_end = j;
            }
        }

        if is_guard {
            stmts.push(parse_guarded(&mut cursor, toks, guard_end)?);
        } else {
            let first = &toks[cursor.pos()];
            if is_keyword(first, "ELSE", "else") {
                return Err(ConfigError::at(
                    Error::SmpElse,
                    ERR_CATEGORY,
                    "else without matching guard",
                    first,
                ));
            }
            let action = parse_action(cursor.slice(cursor.pos(), idx_end))?;
            stmts.push(BlockParse {
                action: Some(action),
                ..BlockParse::default()
            });
            cursor.seek(idx_end);
        }
    }

    // Fold the statements into a next-linked chain.
    let mut head: Option<Box<BlockParse>> = None;
    for mut stmt in stmts.into_iter().rev() {
        stmt.next = head;
        head = Some(Box::new(stmt));
    }
    Ok(head.map(|b| *b).unwrap_or_default())
}

/// Parse one guarded statement starting at the cursor; `guard_end` is
/// the index of the colon or left brace ending the guard expression.
fn parse_guarded(
    cursor: &mut TokenCursor,
    toks: &[Token],
    guard_end: usize,
) -> Result<BlockParse, ConfigError> {
    let mut block = BlockParse::default();

    // Optional leading `if` keyword.
    if cursor.peek().is_some_and(|t| is_keyword(t, "IF", "if")) {
        cursor.take();
    }

    if cursor.pos() >= guard_end {
        let tok = &toks[guard_end.min(toks.len() - 1)];
        return Err(ConfigError::at(
            Error::SmpGuard,
            ERR_CATEGORY,
            "expected guard",
            tok,
        ));
    }

    block.guard = Some(expr_parse::parse(cursor.slice(cursor.pos(), guard_end))?);
    cursor.seek(guard_end);

    match cursor.kind() {
        Some(TokenKind::LBrace) => {
            let close = find_matching_brace(toks, cursor.pos())?;
            cursor.take();
            block.if_block = Some(Box::new(parse_block(cursor.slice(cursor.pos(), close))?));
            cursor.seek(close + 1);
        }
        _ => {
            // Colon form: the branch is a single statement running to
            // the end of the line or to a same-line `ELSE`.
            cursor.take();
            let end = stmt_end(toks, cursor.pos());
            block.if_block = Some(Box::new(parse_block(cursor.slice(cursor.pos(), end))?));
            cursor.seek(end);
        }
    }

    if cursor.peek().is_some_and(|t| is_keyword(t, "ELSE", "else")) {
        let Some(else_tok) = cursor.take() else {
            return Err(ConfigError::global(
                Error::Unreachable,
                ERR_CATEGORY,
                "else scan",
            ));
        };
        match cursor.kind() {
            Some(TokenKind::LBrace) => {
                let close = find_matching_brace(toks, cursor.pos())?;
                cursor.take();
                block.else_block =
                    Some(Box::new(parse_block(cursor.slice(cursor.pos(), close))?));
                cursor.seek(close + 1);
            }
            Some(TokenKind::Colon) => {
                cursor.take();
                let end = stmt_end(toks, cursor.pos());
                if cursor.pos() >= end {
                    return Err(ConfigError::at(
                        Error::SmpElse,
                        ERR_CATEGORY,
                        "expected logic after else",
                        else_tok,
                    ));
                }
                block.else_block =
                    Some(Box::new(parse_block(cursor.slice(cursor.pos(), end))?));
                cursor.seek(end);
            }
            _ => {
                return Err(ConfigError::at(
                    Error::SmpElse,
                    ERR_CATEGORY,
                    "expected logic after else",
                    else_tok,
                ));
            }
        }
    }

    Ok(block)
}

/// End of a single-statement branch: the next newline or same-line
/// `ELSE` keyword.
fn stmt_end(toks: &[Token], from: usize) -> usize {
    let mut idx = from;
    while idx < toks.len() {
        if toks[idx].kind == TokenKind::Newline || is_keyword(&toks[idx], "ELSE", "else") {
            break;
        }
        idx += 1;
    }
    idx
}

/// Index of the brace matching the left brace at `open`.
fn find_matching_brace(toks: &[Token], open: usize) -> Result<usize, ConfigError> {
    let mut level = 0i32;
    for (idx, tok) in toks.iter().enumerate().skip(open) {
        match tok.kind {
            TokenKind::LBrace => level += 1,
            TokenKind::RBrace => {
                level -= 1;
                if level == 0 {
                    return Ok(idx);
                }
            }
            _ => {}
        }
    }
    Err(ConfigError::at(
        Error::SmpBrace,
        ERR_CATEGORY,
        "unbalanced brace",
        &toks[open],
    ))
}

/// Parse one unguarded statement: an assignment or a transition.
fn parse_action(toks: &[Token]) -> Result<ActionParse, ConfigError> {
    let mut cursor = TokenCursor::new(toks);
    let Some(first) = cursor.take() else {
        return Err(ConfigError::global(
            Error::Unreachable,
            ERR_CATEGORY,
            "action scan",
        ));
    };

    if first.kind == TokenKind::Identifier {
        let Some(eq) = cursor.take() else {
            return Err(ConfigError::at(
                Error::SmpActionElem,
                ERR_CATEGORY,
                "expected assignment after element name",
                first,
            ));
        };
        if !eq.is(TokenKind::Operator, "=") {
            return Err(ConfigError::at(
                Error::SmpActionOp,
                ERR_CATEGORY,
                "expected assignment operator",
                eq,
            ));
        }
        if cursor.eof() {
            return Err(ConfigError::at(
                Error::SmpActionExpr,
                ERR_CATEGORY,
                "expected expression after assignment operator",
                eq,
            ));
        }
        let rhs = expr_parse::parse(cursor.slice(cursor.pos(), toks.len()))?;
        return Ok(ActionParse::Assignment {
            target: first.clone(),
            rhs,
        });
    }

    if first.is(TokenKind::Operator, "->") {
        let Some(dest) = cursor.take() else {
            return Err(ConfigError::at(
                Error::SmpTransDest,
                ERR_CATEGORY,
                "expected destination state after `->`",
                first,
            ));
        };
        if dest.kind != TokenKind::Identifier {
            return Err(ConfigError::at(
                Error::SmpTransToken,
                ERR_CATEGORY,
                "expected destination state after `->`",
                dest,
            ));
        }
        if let Some(junk) = cursor.peek() {
            return Err(ConfigError::at(
                Error::SmpTransJunk,
                ERR_CATEGORY,
                "unexpected token after transition",
                junk,
            ));
        }
        return Ok(ActionParse::Transition {
            keyword: first.clone(),
            dest: dest.clone(),
        });
    }

    Err(ConfigError::at(
        Error::SmpActionToken,
        ERR_CATEGORY,
        "expected element name for assignment or `->`",
        first,
    ))
}
