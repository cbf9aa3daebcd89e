use std::{collections::BTreeSet, fmt, str::FromStr};

use medchain_common::Blake3Hash;
use medchain_credentials::Identity;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, map_res},
    error::{Error, ErrorKind},
    multi::separated_list1,
    sequence::delimited,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Action, Darc, MedchainDarcError};

/// How many `darc:` hops an evaluation may follow before giving up.
pub const MAX_DELEGATION_DEPTH: usize = 16;

/// How deeply parentheses may nest in the textual form.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Looks up the latest version of a DARC by its base id, so that `darc:`
/// identities can be resolved during evaluation.
pub trait DarcResolver {
    /// Latest version of the DARC with the given base id, if known.
    fn resolve(&self, base_id: &Blake3Hash) -> Option<Darc>;
}

impl<F> DarcResolver for F
where
    F: Fn(&Blake3Hash) -> Option<Darc>,
{
    fn resolve(&self, base_id: &Blake3Hash) -> Option<Darc> {
        self(base_id)
    }
}

/// Resolver that knows no DARCs; every `darc:` identity is unsatisfied.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelegation;

impl DarcResolver for NoDelegation {
    fn resolve(&self, _base_id: &Blake3Hash) -> Option<Darc> {
        None
    }
}

/// Boolean expression over signer identities.
///
/// Parsed once from text such as `ed25519:A & (ed25519:B | darc:C)`; `&`
/// binds tighter than `|`. The expression is stored and compared by its
/// canonical text form, which [`fmt::Display`] produces.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    /// Satisfied when the identity is among the signers, or when a `darc:`
    /// identity's `_sign` rule is satisfied by the signers.
    Identity(Identity),
    /// Satisfied when every operand is.
    And(Vec<Expr>),
    /// Satisfied when any operand is.
    Or(Vec<Expr>),
}

impl Expr {
    /// Parse the textual form.
    pub fn parse(text: &str) -> Result<Self, MedchainDarcError> {
        all_consuming(|input| expression(input, 0))(text)
            .map(|(_, expr)| expr)
            .map_err(|error| MedchainDarcError::InvalidExpression(format!("'{text}': {error}")))
    }

    /// An expression satisfied by exactly this identity.
    pub fn identity(identity: Identity) -> Self {
        Expr::Identity(identity)
    }

    /// Satisfied by any one of the identities. Fails on an empty list.
    pub fn any_of<I>(identities: I) -> Result<Self, MedchainDarcError>
    where
        I: IntoIterator<Item = Identity>,
    {
        Self::combine(identities, Expr::Or)
    }

    /// Satisfied only when all identities sign. Fails on an empty list.
    pub fn all_of<I>(identities: I) -> Result<Self, MedchainDarcError>
    where
        I: IntoIterator<Item = Identity>,
    {
        Self::combine(identities, Expr::And)
    }

    fn combine<I>(identities: I, wrap: fn(Vec<Expr>) -> Expr) -> Result<Self, MedchainDarcError>
    where
        I: IntoIterator<Item = Identity>,
    {
        let items = identities.into_iter().map(Expr::Identity).collect::<Vec<_>>();
        if items.is_empty() {
            return Err(MedchainDarcError::InvalidExpression(
                "an expression needs at least one identity".to_string(),
            ));
        }
        Ok(Self::collapse(items, wrap))
    }

    fn collapse(mut items: Vec<Expr>, wrap: fn(Vec<Expr>) -> Expr) -> Self {
        if items.len() == 1 {
            items.remove(0)
        } else {
            wrap(items)
        }
    }

    /// Every identity named by the expression, without resolving delegation.
    pub fn identities(&self) -> BTreeSet<Identity> {
        let mut found = BTreeSet::new();
        self.collect_identities(&mut found);
        found
    }

    fn collect_identities(&self, found: &mut BTreeSet<Identity>) {
        match self {
            Expr::Identity(identity) => {
                found.insert(identity.clone());
            }
            Expr::And(items) | Expr::Or(items) => {
                for item in items {
                    item.collect_identities(found);
                }
            }
        }
    }

    /// Decide whether `signers` satisfy the expression.
    ///
    /// `darc:` identities are followed through the resolver's `_sign` rules,
    /// at most [`MAX_DELEGATION_DEPTH`] deep. Unknown DARCs are unsatisfied.
    pub fn evaluate(
        &self,
        signers: &BTreeSet<Identity>,
        resolver: &dyn DarcResolver,
    ) -> Result<bool, MedchainDarcError> {
        self.evaluate_at(signers, resolver, 0)
    }

    fn evaluate_at(
        &self,
        signers: &BTreeSet<Identity>,
        resolver: &dyn DarcResolver,
        depth: usize,
    ) -> Result<bool, MedchainDarcError> {
        match self {
            Expr::Identity(identity) => {
                if signers.contains(identity) {
                    return Ok(true);
                }
                let Some(base_id) = identity.darc_id() else {
                    return Ok(false);
                };
                if depth >= MAX_DELEGATION_DEPTH {
                    return Err(MedchainDarcError::DelegationTooDeep(MAX_DELEGATION_DEPTH));
                }
                match resolver
                    .resolve(&base_id)
                    .and_then(|darc| darc.rules().get(&Action::sign()).cloned())
                {
                    Some(rule) => rule.evaluate_at(signers, resolver, depth + 1),
                    None => Ok(false),
                }
            }
            Expr::And(items) if items.is_empty() => Ok(false),
            Expr::And(items) => {
                for item in items {
                    if !item.evaluate_at(signers, resolver, depth)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Expr::Or(items) => {
                for item in items {
                    if item.evaluate_at(signers, resolver, depth)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

fn identity(input: &str) -> IResult<&str, Expr> {
    map_res(
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == ':' || c == '_'),
        |text: &str| text.parse::<Identity>().map(Expr::Identity),
    )(input)
}

fn factor(input: &str, depth: usize) -> IResult<&str, Expr> {
    delimited(
        multispace0,
        alt((
            identity,
            delimited(char('('), |input| expression(input, depth + 1), char(')')),
        )),
        multispace0,
    )(input)
}

fn term(input: &str, depth: usize) -> IResult<&str, Expr> {
    map(
        separated_list1(char('&'), |input| factor(input, depth)),
        |items| Expr::collapse(items, Expr::And),
    )(input)
}

fn expression(input: &str, depth: usize) -> IResult<&str, Expr> {
    if depth > MAX_NESTING_DEPTH {
        return Err(nom::Err::Failure(Error::new(input, ErrorKind::TooLarge)));
    }
    map(
        separated_list1(char('|'), |input| term(input, depth)),
        |items| Expr::collapse(items, Expr::Or),
    )(input)
}

impl FromStr for Expr {
    type Err = MedchainDarcError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Expr::parse(text)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (items, separator) = match self {
            Expr::Identity(identity) => return write!(f, "{identity}"),
            Expr::And(items) => (items, " & "),
            Expr::Or(items) => (items, " | "),
        };

        for (index, item) in items.iter().enumerate() {
            if index > 0 {
                f.write_str(separator)?;
            }
            match item {
                Expr::Identity(_) => write!(f, "{item}")?,
                _ => write!(f, "({item})")?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({self})")
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Expr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Expr::parse(&text).map_err(serde::de::Error::custom)
    }
}
