//! State vector config parser.
//!
//! A state vector config is a sequence of region sections, each holding
//! `TYPE NAME` element lines:
//!
//! ```text
//! [Telemetry]
//! U64 time
//! F64 altitude
//!
//! [Commands]
//! U8 mode
//! ```
//!
//! The legacy section spelling `[REGION/Telemetry]` is accepted; the
//! region's plain name is the part after the slash. Element lines may
//! carry annotations, which are collected for external tooling and have
//! no meaning here.

use surefire_core::Error;

use crate::diag::ConfigError;
use crate::token::{Token, TokenCursor, TokenKind};

const ERR_CATEGORY: &str = "state vector config error";

/// One parsed element line.
#[derive(Debug, Clone)]
pub struct ElementParse {
    pub ty: Token,
    pub name: Token,
    pub annotations: Vec<Token>,
}

/// One parsed region section.
#[derive(Debug, Clone)]
pub struct RegionParse {
    /// The section token (text is the bracket-less section name).
    pub name: Token,
    /// Region name with any legacy `REGION/` prefix stripped.
    pub plain_name: String,
    pub elems: Vec<ElementParse>,
}

/// A parsed state vector config.
#[derive(Debug, Clone)]
pub struct StateVectorParse {
    pub regions: Vec<RegionParse>,
}

/// Parse a tokenized state vector config.
pub fn parse(toks: &[Token]) -> Result<StateVectorParse, ConfigError> {
    let mut cursor = TokenCursor::new(toks);
    let mut regions = Vec::new();

    loop {
        cursor.eat_newlines();
        let Some(tok) = cursor.peek() else { break };

        if tok.kind != TokenKind::Section {
            return Err(ConfigError::at(
                Error::SvpToken,
                ERR_CATEGORY,
                "expected region section",
                tok,
            ));
        }

        regions.push(parse_region(&mut cursor)?);
    }

    Ok(StateVectorParse { regions })
}

fn parse_region(cursor: &mut TokenCursor) -> Result<RegionParse, ConfigError> {
    // Callers position the cursor at the section token.
    let name = cursor.take().ok_or_else(|| {
        ConfigError::global(Error::Unreachable, ERR_CATEGORY, "region scan")
    })?;
    let plain_name = name
        .text
        .rsplit('/')
        .next()
        .unwrap_or(&name.text)
        .to_string();

    let mut elems = Vec::new();
    loop {
        cursor.eat_newlines();
        match cursor.kind() {
            None | Some(TokenKind::Section) => break,
            _ => {}
        }
        elems.push(parse_element(cursor)?);
    }

    Ok(RegionParse {
        name: name.clone(),
        plain_name,
        elems,
    })
}

fn parse_element(cursor: &mut TokenCursor) -> Result<ElementParse, ConfigError> {
    let ty = match cursor.peek() {
        Some(tok) if tok.kind == TokenKind::Identifier => {
            cursor.take();
            tok.clone()
        }
        Some(tok) => {
            return Err(ConfigError::at(
                Error::SvpElemType,
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
            tok.clone()
        }
        _ => {
            return Err(ConfigError::at(
                Error::SvpElemName,
                ERR_CATEGORY,
                "expected element name after type",
                &ty,
            ));
        }
    };

    let mut annotations = Vec::new();
    while cursor.kind() == Some(TokenKind::Annotation) {
        if let Some(tok) = cursor.take() {
            annotations.push(tok.clone());
        }
    }

    // Element declarations are one per line.
    if let Some(tok) = cursor.peek() {
        if tok.kind != TokenKind::Newline {
            return Err(ConfigError::at(
                Error::SvpToken,
                ERR_CATEGORY,
                "unexpected token after element declaration",
                tok,
            ));
        }
    }

    Ok(ElementParse {
        ty,
        name,
        annotations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;

    fn parse_str(src: &str) -> Result<StateVectorParse, ConfigError> {
        parse(&tokenize(src).unwrap())
    }

    #[test]
    fn test_two_regions() {
        let parse = parse_str(
            "[Telemetry]\n\
             U64 time\n\
             F64 altitude\n\
             \n\
             [Commands]\n\
             U8 mode\n",
        )
        .unwrap();

        assert_eq!(parse.regions.len(), 2);
        assert_eq!(parse.regions[0].plain_name, "Telemetry");
        assert_eq!(parse.regions[0].elems.len(), 2);
        assert_eq!(parse.regions[0].elems[1].ty.text, "F64");
        assert_eq!(parse.regions[0].elems[1].name.text, "altitude");
        assert_eq!(parse.regions[1].elems[0].name.text, "mode");
    }

    #[test]
    fn test_legacy_region_prefix_stripped() {
        let parse = parse_str("[REGION/Foo]\nI32 a\n").unwrap();
        assert_eq!(parse.regions[0].name.text, "REGION/Foo");
        assert_eq!(parse.regions[0].plain_name, "Foo");
    }

    #[test]
    fn test_annotations_collected() {
        let parse = parse_str("[Foo]\nU32 bar @LOCK @ALIAS\n").unwrap();
        let annots: Vec<&str> = parse.regions[0].elems[0]
            .annotations
            .iter()
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(annots, vec!["@LOCK", "@ALIAS"]);
    }

    #[test]
    fn test_content_before_section_fails() {
        let err = parse_str("I32 foo\n[Foo]\n").unwrap_err();
        assert_eq!(err.code(), Error::SvpToken);
        assert_eq!((err.line(), err.col()), (1, 1));
    }

    #[test]
    fn test_missing_element_name() {
        let err = parse_str("[Foo]\nI32\n").unwrap_err();
        assert_eq!(err.code(), Error::SvpElemName);
        assert_eq!((err.line(), err.col()), (2, 1));
    }

    #[test]
    fn test_junk_after_declaration() {
        let err = parse_str("[Foo]\nI32 a 7\n").unwrap_err();
        assert_eq!(err.code(), Error::SvpToken);
        assert_eq!((err.line(), err.col()), (2, 7));
    }

    #[test]
    fn test_empty_config_parses() {
        let parse = parse_str("\n\n").unwrap();
        assert!(parse.regions.is_empty());
    }
}
