// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Conditional assembly state management.

use crate::core::source_map::SourceOrigin;

/// What a conditional directive asks the front end to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalAction {
    If(bool),
    Else,
    End,
}

/// Conditional branch subtype for active block flow control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalSubType {
    If,
    Else,
}

/// State of a conditional assembly block.
#[derive(Debug, Clone)]
pub struct ConditionalContext {
    pub nest_level: u8,
    pub sub_type: ConditionalSubType,
    /// A branch of this block has been taken (or the parent is skipping).
    pub matched: bool,
    pub skipping: bool,
    pub origin: SourceOrigin,
}

impl ConditionalContext {
    pub fn new(prev: Option<&ConditionalContext>, cond: bool, origin: SourceOrigin) -> Self {
        let nest_level = match prev {
            Some(p) => p.nest_level.saturating_add(1),
            None => 1,
        };
        let parent_skipping = prev.is_some_and(|p| p.skipping);
        Self {
            nest_level,
            sub_type: ConditionalSubType::If,
            matched: parent_skipping || cond,
            skipping: parent_skipping || !cond,
            origin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionalError {
    ElseWithoutIf,
    DuplicateElse,
    EndWithoutIf,
}

impl ConditionalError {
    pub fn message(&self) -> &'static str {
        match self {
            ConditionalError::ElseWithoutIf => "else without matching if",
            ConditionalError::DuplicateElse => "else already seen in this block",
            ConditionalError::EndWithoutIf => "endc without matching if",
        }
    }
}

/// Stack of conditional assembly contexts.
#[derive(Debug, Default)]
pub struct ConditionalStack {
    stack: Vec<ConditionalContext>,
}

impl ConditionalStack {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn last(&self) -> Option<&ConditionalContext> {
        self.stack.last()
    }

    pub fn skipping(&self) -> bool {
        match self.stack.last() {
            Some(c) => c.skipping,
            None => false,
        }
    }

    pub fn apply(
        &mut self,
        action: ConditionalAction,
        origin: &SourceOrigin,
    ) -> Result<(), ConditionalError> {
        match action {
            ConditionalAction::If(cond) => {
                let ctx = ConditionalContext::new(self.stack.last(), cond, origin.clone());
                self.stack.push(ctx);
                Ok(())
            }
            ConditionalAction::Else => {
                let Some(ctx) = self.stack.last_mut() else {
                    return Err(ConditionalError::ElseWithoutIf);
                };
                if ctx.sub_type == ConditionalSubType::Else {
                    return Err(ConditionalError::DuplicateElse);
                }
                ctx.sub_type = ConditionalSubType::Else;
                ctx.skipping = ctx.matched;
                ctx.matched = true;
                Ok(())
            }
            ConditionalAction::End => self
                .stack
                .pop()
                .map(|_| ())
                .ok_or(ConditionalError::EndWithoutIf),
        }
    }
}
