//! Block matching for nested control-flow directives
//!
//! Blocks are never materialized as objects. Given the index of an opener
//! in the flat line arena, [`find_block`] scans forward counting nesting
//! depth of the same keyword and returns the indices of the terminator and
//! of the sibling branch markers at depth 0.

use serde::Serialize;

use crate::error::{BatchError, Result};
use crate::parser::ScriptLine;

/// Kinds of block directives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlockKind {
    If,
    Foreach,
    While,
    Try,
}

impl BlockKind {
    /// Block kind opened by a directive keyword
    pub fn from_opener(keyword: &str) -> Option<Self> {
        match keyword {
            "if" => Some(BlockKind::If),
            "foreach" => Some(BlockKind::Foreach),
            "while" => Some(BlockKind::While),
            "try" => Some(BlockKind::Try),
            _ => None,
        }
    }

    /// Block kind closed by a terminator keyword
    pub fn from_terminator(keyword: &str) -> Option<Self> {
        match keyword {
            "endif" => Some(BlockKind::If),
            "endforeach" => Some(BlockKind::Foreach),
            "endwhile" => Some(BlockKind::While),
            "endtry" => Some(BlockKind::Try),
            _ => None,
        }
    }

    pub fn opener(self) -> &'static str {
        match self {
            BlockKind::If => "if",
            BlockKind::Foreach => "foreach",
            BlockKind::While => "while",
            BlockKind::Try => "try",
        }
    }

    pub fn terminator(self) -> &'static str {
        match self {
            BlockKind::If => "endif",
            BlockKind::Foreach => "endforeach",
            BlockKind::While => "endwhile",
            BlockKind::Try => "endtry",
        }
    }

    /// Branch markers that split this block's body
    pub fn branches(self) -> &'static [&'static str] {
        match self {
            BlockKind::If => &["elif", "else"],
            BlockKind::Try => &["catch", "finally"],
            BlockKind::Foreach | BlockKind::While => &[],
        }
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.opener())
    }
}

/// Location of one block in the line arena
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSpan {
    pub kind: BlockKind,
    /// Index of the opener line
    pub opener: usize,
    /// Index of the matching terminator line
    pub terminator: usize,
    /// Indices of same-depth branch markers, in source order
    pub branches: Vec<usize>,
}

impl BlockSpan {
    /// End (exclusive) of the body segment that starts after `marker`.
    ///
    /// `marker` is the opener or one of the branch indices.
    pub fn segment_end(&self, marker: usize) -> usize {
        self.branches
            .iter()
            .copied()
            .find(|&b| b > marker)
            .unwrap_or(self.terminator)
    }

    /// First branch marker with the given keyword
    pub fn branch(&self, lines: &[ScriptLine], keyword: &str) -> Option<usize> {
        self.branches
            .iter()
            .copied()
            .find(|&b| lines[b].is_directive(keyword))
    }
}

/// Match the block opened at `opener`, scanning no further than `end`
pub fn find_block(lines: &[ScriptLine], opener: usize, end: usize) -> Result<BlockSpan> {
    let opener_line = lines
        .get(opener)
        .ok_or_else(|| BatchError::parse(0, format!("no line at index {}", opener)))?;
    let kind = opener_line
        .keyword()
        .and_then(BlockKind::from_opener)
        .ok_or_else(|| {
            BatchError::parse(
                opener_line.line_number,
                format!("'{}' does not open a block", opener_line.text()),
            )
        })?;

    let end = end.min(lines.len());
    let mut depth = 0usize;
    let mut branches = Vec::new();

    for (idx, line) in lines.iter().enumerate().take(end).skip(opener + 1) {
        let Some(keyword) = line.keyword() else {
            continue;
        };
        if keyword == kind.opener() {
            depth += 1;
        } else if keyword == kind.terminator() {
            if depth == 0 {
                return Ok(BlockSpan {
                    kind,
                    opener,
                    terminator: idx,
                    branches,
                });
            }
            depth -= 1;
        } else if depth == 0 && kind.branches().contains(&keyword) {
            branches.push(idx);
        }
    }

    Err(BatchError::parse(
        opener_line.line_number,
        format!(
            "unmatched {} on line {}: no @{} found",
            kind,
            opener_line.line_number,
            kind.terminator()
        ),
    ))
}

/// Match every block opener in the script, in source order
pub fn outline(lines: &[ScriptLine]) -> Result<Vec<BlockSpan>> {
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.keyword().and_then(BlockKind::from_opener).is_some())
        .map(|(idx, _)| find_block(lines, idx, lines.len()))
        .collect()
}
