//! First assembler pass: binding labels to word offsets.

use fxhash::FxBuildHasher;
use indexmap::IndexMap;

use crate::ast::{Node, Token};
use crate::error::AsmError;
use crate::span::{Loc, Span};

// Symbol table of symbol -> word offset from origin
type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Where a label points, and where it was defined.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Symbol {
    pub offset: u16,
    pub span: Span,
    pub loc: Loc,
}

/// Labels of one assembly unit, in definition order.
///
/// Names are case-sensitive.
#[derive(Clone, Default, Debug)]
pub struct SymbolTable {
    map: FxMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            map: IndexMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Walk the nodes once, recording the offset of every label.
    ///
    /// The offset of a label is the number of words placed by all nodes before it.
    pub fn resolve(nodes: &[Node]) -> Result<Self, AsmError> {
        let mut table = SymbolTable::new();
        let mut offset: u16 = 0;
        for node in nodes {
            if let Node::Label(label) = node {
                table.insert(label, offset)?;
            }
            offset = offset.wrapping_add(node.word_len());
        }
        log::debug!("resolved {} labels over {offset} words", table.len());
        Ok(table)
    }

    fn insert(&mut self, label: &Token, offset: u16) -> Result<(), AsmError> {
        if let Some(first) = self.map.get(&label.lexeme) {
            return Err(AsmError::DuplicateLabel {
                name: label.lexeme.clone(),
                loc: label.loc,
                span: label.span.into(),
                first: first.span.into(),
            });
        }
        self.map.insert(
            label.lexeme.clone(),
            Symbol {
                offset,
                span: label.span,
                loc: label.loc,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.map.get(name)
    }

    /// Word offset of `name` from the origin.
    pub fn offset(&self, name: &str) -> Option<u16> {
        self.get(name).map(|sym| sym.offset)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Symbol)> {
        self.map.iter().map(|(name, sym)| (name.as_str(), sym))
    }
}
