//! The directive table.
//!
//! A statement whose first word names a directive runs that directive's
//! implementation over the rest of its tokens. Preprocessor directives are
//! spelled with a leading `$`.

mod preprocessor;
mod runtime;

use crate::compiler::middle_end::executor::Executor;
use crate::compiler::middle_end::session::Feature;
use crate::compiler::middle_end::statement::Cursor;
use crate::core::token::{can_view, Capability, Ident, Operand};
use crate::core::{Coord, Selector, TokenKind, Value};
use crate::error::Result;
use std::fmt;

pub type DirectiveFn = fn(&mut Executor<'_>, &mut Cursor) -> Result<()>;

pub struct Directive {
    /// Keyword as written, lowercase.
    pub name: &'static str,
    pub description: &'static str,
    /// Accepted leading token shapes. Empty accepts anything.
    pub patterns: &'static [&'static [Capability]],
    pub run: DirectiveFn,
    /// Resolve preprocessor references and squash expressions before running.
    pub resolve: bool,
    pub feature: Option<Feature>,
}

impl fmt::Debug for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directive").field("name", &self.name).finish()
    }
}

const STRING: Capability = can_view::<String>;
const INTEGER: Capability = can_view::<i32>;
const NUMBER: Capability = can_view::<f32>;
const COORD: Capability = can_view::<Coord>;
const SELECTOR: Capability = can_view::<Selector>;
const IDENT: Capability = can_view::<Ident>;
const OPERAND: Capability = can_view::<Operand>;

const LITERAL: Capability = |kind| matches!(kind, TokenKind::Literal(_));
const TEXT_OR_WORD: Capability = |kind| STRING(kind) || IDENT(kind);
const NOT_JSON: Capability = |kind| !matches!(kind, TokenKind::Literal(Value::Json(_)));

macro_rules! directive {
    ($name:literal, $run:path, $description:literal) => {
        directive!($name, $run, $description, &[], true, None)
    };
    ($name:literal, $run:path, $description:literal, $patterns:expr) => {
        directive!($name, $run, $description, $patterns, true, None)
    };
    ($name:literal, $run:path, $description:literal, $patterns:expr, $resolve:expr, $feature:expr) => {
        Directive {
            name: $name,
            description: $description,
            patterns: $patterns,
            run: $run,
            resolve: $resolve,
            feature: $feature,
        }
    };
}

pub static DIRECTIVES: &[Directive] = &[
    // preprocessor
    directive!("$var", preprocessor::var, "Set a preprocessor variable.", &[&[IDENT, NOT_JSON]]),
    directive!("$inc", preprocessor::inc, "Increment a preprocessor variable by 1.", &[&[IDENT]]),
    directive!("$dec", preprocessor::dec, "Decrement a preprocessor variable by 1.", &[&[IDENT]]),
    directive!("$add", preprocessor::add, "Add to a preprocessor variable.", &[&[IDENT, LITERAL], &[IDENT, IDENT]]),
    directive!("$sub", preprocessor::sub, "Subtract from a preprocessor variable.", &[&[IDENT, LITERAL], &[IDENT, IDENT]]),
    directive!("$mul", preprocessor::mul, "Multiply a preprocessor variable.", &[&[IDENT, LITERAL], &[IDENT, IDENT]]),
    directive!("$div", preprocessor::div, "Divide a preprocessor variable.", &[&[IDENT, LITERAL], &[IDENT, IDENT]]),
    directive!("$mod", preprocessor::modulo, "Modulo a preprocessor variable.", &[&[IDENT, LITERAL], &[IDENT, IDENT]]),
    directive!("$pow", preprocessor::pow, "Raise a preprocessor variable to a power.", &[&[IDENT, LITERAL], &[IDENT, IDENT]]),
    directive!("$swap", preprocessor::swap, "Swap two preprocessor variables.", &[&[IDENT, IDENT]]),
    directive!("$if", preprocessor::if_, "Compare preprocessor values at compile time.", &[&[IDENT]]),
    directive!("$else", preprocessor::else_, "Run when the last $if was false."),
    directive!("$repeat", preprocessor::repeat, "Repeat the next statement or block.", &[&[INTEGER]]),
    directive!("$log", preprocessor::log, "Print a message during compilation.", &[&[STRING]]),
    directive!("$macro", preprocessor::macro_, "Define or call a macro.", &[&[IDENT]], false, None),
    directive!("$include", preprocessor::include, "Compile another file in place.", &[&[STRING]]),
    directive!("$strfriendly", preprocessor::str_friendly, "Title-case text.", &[&[IDENT]]),
    directive!("$strupper", preprocessor::str_upper, "Uppercase text.", &[&[IDENT]]),
    directive!("$strlower", preprocessor::str_lower, "Lowercase text.", &[&[IDENT]]),
    directive!("$sum", preprocessor::sum, "Sum the elements of a variable.", &[&[IDENT]]),
    directive!("$median", preprocessor::median, "Median of the elements of a variable.", &[&[IDENT]]),
    directive!("$mean", preprocessor::mean, "Mean of the elements of a variable.", &[&[IDENT]]),
    directive!("$iterate", preprocessor::iterate, "Run the next block once per element.", &[&[IDENT, IDENT]]),
    directive!("$get", preprocessor::get, "Read one element of a variable.", &[&[IDENT, INTEGER, IDENT]]),
    directive!("$len", preprocessor::len, "Length of a variable.", &[&[IDENT, IDENT]]),
    directive!("$json", preprocessor::json, "Load values from a JSON file.", &[&[STRING, IDENT, STRING]]),
    // runtime
    directive!("mc", runtime::mc, "Run a raw command.", &[&[STRING]]),
    directive!("select", runtime::select, "Change the selected entity.", &[&[SELECTOR]]),
    directive!("globalprint", runtime::globalprint, "Print to every player.", &[&[STRING]]),
    directive!("print", runtime::print, "Print to the selected entity.", &[&[STRING]]),
    directive!("define", runtime::define, "Define a value.", &[&[IDENT]]),
    directive!("init", runtime::init, "Initialise values for every player.", &[&[TEXT_OR_WORD]]),
    directive!("if", runtime::if_, "Run code when a condition holds."),
    directive!("else", runtime::else_, "Run code when the last if did not."),
    directive!("give", runtime::give, "Give an item.", &[&[TEXT_OR_WORD]]),
    directive!("tp", runtime::tp, "Teleport the selected entity.", &[&[SELECTOR], &[COORD, COORD, COORD]]),
    directive!("tphere", runtime::tphere, "Teleport entities to the selected entity.", &[&[SELECTOR]]),
    directive!("move", runtime::move_, "Move relative to facing direction.", &[&[IDENT, NUMBER]]),
    directive!("face", runtime::face, "Face an entity or position.", &[&[SELECTOR], &[COORD, COORD, COORD]]),
    directive!("facehere", runtime::facehere, "Make entities face the selected entity.", &[&[SELECTOR]]),
    directive!("rotate", runtime::rotate, "Rotate the selected entity.", &[&[NUMBER]]),
    directive!("block", runtime::block, "Place a block.", &[&[TEXT_OR_WORD, COORD, COORD, COORD], &[IDENT, TEXT_OR_WORD, COORD, COORD, COORD]]),
    directive!("fill", runtime::fill, "Fill an area with a block.", &[
        &[TEXT_OR_WORD, COORD, COORD, COORD, COORD, COORD, COORD],
        &[IDENT, TEXT_OR_WORD, COORD, COORD, COORD, COORD, COORD, COORD],
    ]),
    directive!("scatter", runtime::scatter, "Scatter a block over an area.", &[&[TEXT_OR_WORD, INTEGER, COORD, COORD, COORD, COORD, COORD, COORD]]),
    directive!("replace", runtime::replace, "Replace one block with another over an area.", &[&[TEXT_OR_WORD]]),
    directive!("kill", runtime::kill, "Kill entities."),
    directive!("remove", runtime::remove, "Remove entities without a death."),
    directive!("globaltitle", runtime::globaltitle, "Show a title to every player.", &[&[STRING], &[IDENT]]),
    directive!("title", runtime::title, "Show a title to the selected entity.", &[&[STRING], &[IDENT]]),
    directive!("globalactionbar", runtime::globalactionbar, "Show an actionbar to every player.", &[&[STRING], &[IDENT]]),
    directive!("actionbar", runtime::actionbar, "Show an actionbar to the selected entity.", &[&[STRING], &[IDENT]]),
    directive!("say", runtime::say, "Say text as the selected entity.", &[&[STRING]]),
    directive!("halt", runtime::halt, "Stop execution of the current tick."),
    directive!("damage", runtime::damage, "Damage the selected entity.", &[&[INTEGER]]),
    directive!("null", runtime::null, "Manage null entities.", &[&[IDENT]], true, Some(Feature::Nulls)),
    directive!("tag", runtime::tag, "Add or remove tags.", &[&[IDENT, TEXT_OR_WORD]]),
    directive!("limit", runtime::limit, "Limit how many entities are selected."),
    directive!("feature", runtime::feature, "Enable a compiler feature.", &[&[IDENT]]),
    directive!("function", runtime::function, "Define a function."),
    directive!("return", runtime::return_, "Return a value from a function.", &[&[OPERAND]]),
    directive!("struct", runtime::struct_, "Define a struct.", &[&[IDENT]]),
];

/// Find the directive named by `word` (case-insensitive, `$` included).
pub fn lookup(word: &str) -> Option<&'static Directive> {
    DIRECTIVES.iter().find(|d| d.name.eq_ignore_ascii_case(word))
}

/// Look up a statement's leading token as a directive keyword.
pub fn lookup_token(kind: &TokenKind) -> Option<&'static Directive> {
    match kind {
        TokenKind::Identifier(word) => lookup(word).filter(|d| !d.name.starts_with('$')),
        TokenKind::PreprocessorRef(word) => lookup(&format!("${}", word)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("PRINT").unwrap().name, "print");
        assert!(lookup_token(&TokenKind::PreprocessorRef("var".into())).is_some());
        assert!(lookup_token(&TokenKind::Identifier("$var".into())).is_none());
        assert!(lookup_token(&TokenKind::Identifier("score".into())).is_none());
    }

    #[test]
    fn test_names_are_unique() {
        for (i, a) in DIRECTIVES.iter().enumerate() {
            assert!(DIRECTIVES[i + 1..].iter().all(|b| b.name != a.name), "duplicate {}", a.name);
        }
    }

    #[test]
    fn test_patterns() {
        let tp = lookup("tp").unwrap();
        let coords = vec![TokenKind::Literal(Value::Int(1)); 3];
        assert!(tp.patterns.iter().any(|p| p.len() <= coords.len() && p.iter().zip(&coords).all(|(c, k)| c(k))));
    }
}
