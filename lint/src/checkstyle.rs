//! Checkstyle XML → [`Diagnostic`]s.
//!
//! Every `error` element anywhere under the `checkstyle` root becomes one
//! diagnostic, in document order.

use linter_types::{DEFAULT_SEVERITY, Diagnostic};
use roxmltree::{Document, Node};
use thiserror::Error;

const ROOT_ELEMENT: &str = "checkstyle";

#[derive(Debug, Error)]
pub enum CheckstyleError {
    #[error("bad checkstyle output at {line}:{column}: {message}")]
    BadOutput {
        line: u32,
        column: u32,
        message: String,
    },
    #[error("bad checkstyle output at {line}:{column}: {attribute}=\"{value}\" is not a number")]
    BadNumber {
        attribute: &'static str,
        value: String,
        line: u32,
        column: u32,
    },
}

impl CheckstyleError {
    /// 1-based position in the linter's output where parsing failed.
    #[must_use]
    pub fn position(&self) -> (u32, u32) {
        match self {
            Self::BadOutput { line, column, .. } | Self::BadNumber { line, column, .. } => {
                (*line, *column)
            }
        }
    }
}

/// Parse a checkstyle report. Any error rejects the whole document.
pub fn parse_checkstyle(text: &str) -> Result<Vec<Diagnostic>, CheckstyleError> {
    let doc = Document::parse(text).map_err(|e| {
        let pos = e.pos();
        CheckstyleError::BadOutput {
            line: pos.row,
            column: pos.col,
            message: e.to_string(),
        }
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != ROOT_ELEMENT {
        let pos = doc.text_pos_at(root.range().start);
        return Err(CheckstyleError::BadOutput {
            line: pos.row,
            column: pos.col,
            message: format!(
                "expected <{ROOT_ELEMENT}> root element, found <{}>",
                root.tag_name().name()
            ),
        });
    }

    let diagnostics = root
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "error")
        .map(|node| to_diagnostic(&doc, node))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(count = diagnostics.len(), "Parsed checkstyle report");
    Ok(diagnostics)
}

fn to_diagnostic(doc: &Document<'_>, node: Node<'_, '_>) -> Result<Diagnostic, CheckstyleError> {
    let line = number_attribute(doc, node, "line")?;
    let column = number_attribute(doc, node, "column")?;
    let severity = node.attribute("severity").unwrap_or(DEFAULT_SEVERITY);
    let message = node.attribute("message").unwrap_or_default();
    let tool = node
        .attribute("source")
        .map(|source| source.split_once('.').map_or(source, |(tool, _)| tool))
        .unwrap_or_default();
    Ok(Diagnostic::standard(line, column, severity, message, tool))
}

/// Missing means 1; present but not a number is an error.
fn number_attribute(
    doc: &Document<'_>,
    node: Node<'_, '_>,
    attribute: &'static str,
) -> Result<u32, CheckstyleError> {
    let Some(raw) = node.attribute(attribute) else {
        return Ok(1);
    };
    raw.trim().parse().map_err(|_| {
        let pos = doc.text_pos_at(node.range().start);
        CheckstyleError::BadNumber {
            attribute,
            value: raw.to_string(),
            line: pos.row,
            column: pos.col,
        }
    })
}

#[cfg(test)]
mod tests {
    use linter_types::ErrorMode;

    use super::*;

    const TWO_FILES: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<checkstyle version="4.3">
  <file name="a.js">
    <error line="3" column="7" severity="warning" message="Unexpected var" source="eslint.rules.no-var"/>
    <error line="1" column="1" severity="error" message="Missing &quot;use strict&quot;" source="eslint.rules.strict"/>
  </file>
  <file name="b.js">
    <error line="9" column="2" severity="info" message="Line too long" source="jshint"/>
  </file>
</checkstyle>"#;

    #[test]
    fn test_parses_errors_in_document_order() {
        let diagnostics = parse_checkstyle(TWO_FILES).unwrap();
        assert_eq!(diagnostics.len(), 3);

        let first = &diagnostics[0];
        assert_eq!(first.mode(), ErrorMode::Standard);
        assert_eq!((first.line(), first.column()), (3, 7));
        assert_eq!(first.severity(), "warning");
        assert_eq!(first.message(), "Unexpected var");
        assert_eq!(first.tool(), "eslint");

        assert_eq!(diagnostics[1].message(), "Missing \"use strict\"");
        assert_eq!(diagnostics[1].line(), 1);
        assert_eq!(diagnostics[2].tool(), "jshint");
        assert_eq!(diagnostics[2].severity(), "info");
    }

    #[test]
    fn test_tool_is_source_before_first_dot() {
        let xml = r#"<checkstyle><file name="x"><error line="1" column="1" message="m" source="eslint.rules.jsdoc/require-description"/></file></checkstyle>"#;
        let diagnostics = parse_checkstyle(xml).unwrap();
        assert_eq!(diagnostics[0].tool(), "eslint");
    }

    #[test]
    fn test_missing_attributes_use_defaults() {
        let xml = r#"<checkstyle><file name="x"><error message="bare"/></file></checkstyle>"#;
        let diagnostics = parse_checkstyle(xml).unwrap();
        let d = &diagnostics[0];
        assert_eq!((d.line(), d.column()), (1, 1));
        assert_eq!(d.severity(), DEFAULT_SEVERITY);
        assert_eq!(d.tool(), "");
    }

    #[test]
    fn test_empty_report() {
        assert!(parse_checkstyle("<checkstyle/>").unwrap().is_empty());
        assert!(
            parse_checkstyle(r#"<checkstyle version="8.0"><file name="a.py"/></checkstyle>"#)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_non_numeric_line_rejects_whole_document() {
        let xml = r#"<checkstyle>
<file name="x">
<error line="2" column="1" message="fine"/>
<error line="two" column="1" message="bad"/>
</file>
</checkstyle>"#;
        let err = parse_checkstyle(xml).unwrap_err();
        match &err {
            CheckstyleError::BadNumber {
                attribute, value, ..
            } => {
                assert_eq!(*attribute, "line");
                assert_eq!(value, "two");
            }
            other => panic!("expected BadNumber, got {other:?}"),
        }
        assert_eq!(err.position(), (4, 1));
    }

    #[test]
    fn test_truncated_output_reports_position() {
        let xml = "<checkstyle>\n<file name=\"x\">\n<error line=\"1\" column=\"1\"\n";
        let err = parse_checkstyle(xml).unwrap_err();
        assert!(matches!(err, CheckstyleError::BadOutput { .. }));
        let (line, column) = err.position();
        assert!(line >= 1 && column >= 1);
    }

    #[test]
    fn test_mismatched_tag_position() {
        let xml = "<checkstyle>\n<file name=\"x\"></error>\n</checkstyle>";
        let err = parse_checkstyle(xml).unwrap_err();
        assert!(matches!(err, CheckstyleError::BadOutput { .. }));
        assert_eq!(err.position().0, 2);
    }

    #[test]
    fn test_plain_text_is_bad_output() {
        let err = parse_checkstyle("Error: cannot find module 'eslint'").unwrap_err();
        assert!(matches!(err, CheckstyleError::BadOutput { .. }));
    }

    #[test]
    fn test_wrong_root_is_bad_output() {
        let err = parse_checkstyle("\n<report><error line=\"1\"/></report>").unwrap_err();
        match err {
            CheckstyleError::BadOutput { line, message, .. } => {
                assert_eq!(line, 2);
                assert!(message.contains("<report>"), "{message}");
            }
            other @ CheckstyleError::BadNumber { .. } => panic!("unexpected {other:?}"),
        }
    }
}
