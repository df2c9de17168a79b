//! Signature compiler: [`RawTerm`] -> [`CompiledSignature`].
//!
//! Accepted argument-side shapes:
//! - `[d0, d1, ...]` positional only
//! - `{name: d, ...}` keywords only
//! - `[d0, ..., {name: d, ...}]` positional followed by keywords
//!
//! The return side is a single descriptor, or `nil` for "produces nothing".

use indexmap::IndexMap;

use callguard_core::Symbol;

use crate::behavior::BehaviorDescriptor;
use crate::signature::raw::{RawKey, RawTerm};
use crate::signature::{CompiledSignature, SignatureError, Slot};

/// Deepest tuple nesting accepted in a descriptor, and deepest bracket
/// nesting accepted by the notation parser.
pub const MAX_NESTING: usize = 64;

/// Which side of the contract a descriptor appears on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Argument,
    Return,
}

/// Compiles a raw `arguments => return` entry.
///
/// Pure and deterministic: the same raw input always yields an equal
/// signature.
pub fn compile(raw: &RawTerm) -> Result<CompiledSignature, SignatureError> {
    let (arguments, returns) = match raw {
        RawTerm::Map(entries) if entries.len() == 1 => {
            let (key, value) = &entries[0];
            (key, value)
        }
        other => {
            return Err(SignatureError::InvalidForm {
                found: other.to_string(),
            })
        }
    };

    let arguments = match arguments {
        RawKey::Term(term) => term,
        other => {
            return Err(SignatureError::InvalidArgumentSide {
                found: other.to_string(),
            })
        }
    };

    let (positional, keyword) = compile_arguments(arguments)?;
    let returns = compile_behavior(returns, Side::Return, &Slot::Return)?;
    Ok(CompiledSignature::new(positional, keyword, returns))
}

type ArgumentSide = (Vec<BehaviorDescriptor>, IndexMap<Symbol, BehaviorDescriptor>);

fn compile_arguments(term: &RawTerm) -> Result<ArgumentSide, SignatureError> {
    match term {
        RawTerm::List(items) => {
            let (items, keywords) = match items.split_last() {
                Some((RawTerm::Map(entries), rest)) => (rest, Some(entries)),
                _ => (items.as_slice(), None),
            };

            let mut positional = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                if matches!(item, RawTerm::Map(_)) {
                    return Err(SignatureError::MisplacedKeywords { index });
                }
                positional.push(compile_behavior(item, Side::Argument, &Slot::Position(index))?);
            }

            let keyword = match keywords {
                Some(entries) => compile_keywords(entries)?,
                None => IndexMap::new(),
            };
            Ok((positional, keyword))
        }
        RawTerm::Map(entries) => Ok((Vec::new(), compile_keywords(entries)?)),
        other => Err(SignatureError::InvalidArgumentSide {
            found: other.to_string(),
        }),
    }
}

fn compile_keywords(
    entries: &[(RawKey, RawTerm)],
) -> Result<IndexMap<Symbol, BehaviorDescriptor>, SignatureError> {
    let mut keyword = IndexMap::with_capacity(entries.len());
    for (key, term) in entries {
        let RawKey::Symbol(name) = key else {
            return Err(SignatureError::NonSymbolKeyword {
                key: key.to_string(),
            });
        };
        let descriptor = compile_behavior(term, Side::Argument, &Slot::Keyword(name.clone()))?;
        if keyword.insert(name.clone(), descriptor).is_some() {
            return Err(SignatureError::DuplicateKeyword { name: name.clone() });
        }
    }
    Ok(keyword)
}

/// Validates and converts a single descriptor literal.
///
/// `slot` is only used to locate errors. `nil` is accepted only as the
/// outermost return descriptor.
pub fn compile_behavior(
    term: &RawTerm,
    side: Side,
    slot: &Slot,
) -> Result<BehaviorDescriptor, SignatureError> {
    compile_nested(term, side, slot, 0)
}

fn compile_nested(
    term: &RawTerm,
    side: Side,
    slot: &Slot,
    depth: usize,
) -> Result<BehaviorDescriptor, SignatureError> {
    if depth > MAX_NESTING {
        return Err(SignatureError::TooDeep {
            limit: MAX_NESTING,
            slot: slot.clone(),
        });
    }
    let descriptor = match term {
        RawTerm::Scope(t) => BehaviorDescriptor::ExactType(t.clone()),
        RawTerm::Symbol(s) => BehaviorDescriptor::RespondsTo(s.clone()),
        RawTerm::Regex(p) => BehaviorDescriptor::Pattern(p.clone()),
        RawTerm::Range(r) => BehaviorDescriptor::Interval(r.clone()),
        RawTerm::Predicate(p) => BehaviorDescriptor::Predicate(p.clone()),
        RawTerm::Bool(true) => BehaviorDescriptor::BooleanTrue,
        RawTerm::Bool(false) => BehaviorDescriptor::BooleanFalse,
        RawTerm::Any => BehaviorDescriptor::Wildcard,
        RawTerm::List(items) => BehaviorDescriptor::Tuple(
            items
                .iter()
                .map(|item| compile_nested(item, side, slot, depth + 1))
                .collect::<Result<_, _>>()?,
        ),
        RawTerm::Nil => match side {
            Side::Argument => return Err(SignatureError::AbsentInArguments { slot: slot.clone() }),
            Side::Return if depth == 0 => BehaviorDescriptor::Absent,
            Side::Return => {
                return Err(SignatureError::InvalidBehavior {
                    literal: term.to_string(),
                    slot: slot.clone(),
                })
            }
        },
        RawTerm::Map(_) | RawTerm::Int(_) | RawTerm::Float(_) | RawTerm::Text(_) => {
            return Err(SignatureError::InvalidBehavior {
                literal: term.to_string(),
                slot: slot.clone(),
            })
        }
    };
    Ok(descriptor)
}
