//! Paths into backing records, as written in `@field(at: ...)`, `@resolve(at: ...)` and
//! `@discriminates(with: ...)`.
//!
//! A path is a chain of keys separated by dots. Array items are addressed by `[0]` (or by a numeric
//! key), and keys containing dots or brackets are quoted inside brackets:
//!
//! ```text
//! metadata.name
//! spec.owners[0]
//! metadata.annotations["backstage.io/view-url"]
//! ```
//!
//! A path starting with `__source` reads the name of the source the record was loaded from.

use std::fmt::Display;
use std::fmt::Formatter;

use apollo_compiler::ast::Value as GraphQLValue;
use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::take_while;
use nom::bytes::complete::take_while1;
use nom::character::complete::char;
use nom::character::complete::digit1;
use nom::combinator::all_consuming;
use nom::combinator::map;
use nom::combinator::map_res;
use nom::multi::many0;
use nom::sequence::delimited;
use nom::sequence::preceded;
use serde_json::Value;

use crate::loader::Record;

pub(crate) const SOURCE_KEY: &str = "__source";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathSegment {
    Key(String),
    Index(usize),
}

/// A single parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, String> {
        match all_consuming(path)(raw) {
            Ok((_, segments)) => Ok(Self {
                raw: raw.to_string(),
                segments,
            }),
            Err(_) => Err(format!("\"{raw}\" is not a valid path")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Reads the value at this path, `None` when any segment is missing.
    pub fn get<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(value, |current, segment| match (segment, current) {
                (PathSegment::Key(key), Value::Object(map)) => map.get(key),
                (PathSegment::Key(key), Value::Array(items)) => {
                    key.parse::<usize>().ok().and_then(|index| items.get(index))
                }
                (PathSegment::Index(index), Value::Array(items)) => items.get(*index),
                (PathSegment::Index(index), Value::Object(map)) => map.get(&index.to_string()),
                _ => None,
            })
    }

    /// Reads the value at this path from a loaded record.
    pub fn lookup(&self, record: &Record) -> Option<Value> {
        match self.segments.split_first() {
            Some((PathSegment::Key(key), [])) if key == SOURCE_KEY => {
                Some(Value::String(record.source.to_string()))
            }
            _ => self.get(&record.data).cloned(),
        }
    }

    pub(crate) fn is_id(&self) -> bool {
        matches!(self.segments.as_slice(), [PathSegment::Key(key)] if key == "id")
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Alternative paths, tried in order. The first one yielding a non-null value wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPaths(Vec<FieldPath>);

impl FieldPaths {
    pub fn single(path: FieldPath) -> Self {
        Self(vec![path])
    }

    /// Parses a directive argument: either a string or a list of strings.
    pub fn from_argument(value: &GraphQLValue) -> Result<Self, String> {
        match value {
            GraphQLValue::String(path) => Ok(Self(vec![FieldPath::parse(path)?])),
            GraphQLValue::List(items) if !items.is_empty() => items
                .iter()
                .map(|item| match item.as_str() {
                    Some(path) => FieldPath::parse(path),
                    None => Err(String::from("not a string")),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self),
            _ => Err(String::from("not a string or an array of strings")),
        }
    }

    pub fn get<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .find_map(|path| path.get(value).filter(|value| !value.is_null()))
    }

    pub fn lookup(&self, record: &Record) -> Option<Value> {
        self.0
            .iter()
            .find_map(|path| path.lookup(record).filter(|value| !value.is_null()))
    }

    pub(crate) fn is_id(&self) -> bool {
        matches!(self.0.as_slice(), [path] if path.is_id())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldPath> {
        self.0.iter()
    }
}

fn key(input: &str) -> IResult<&str, PathSegment> {
    map(
        take_while1(|c: char| c != '.' && c != '[' && c != ']'),
        |key: &str| PathSegment::Key(key.to_string()),
    )(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
    ))(input)
}

fn bracket(input: &str) -> IResult<&str, PathSegment> {
    delimited(
        char('['),
        alt((
            map(quoted, |key: &str| PathSegment::Key(key.to_string())),
            map_res(digit1, |index: &str| {
                index.parse::<usize>().map(PathSegment::Index)
            }),
        )),
        char(']'),
    )(input)
}

fn path(input: &str) -> IResult<&str, Vec<PathSegment>> {
    let (input, first) = alt((bracket, key))(input)?;
    let (input, rest) = many0(alt((preceded(char('.'), key), bracket)))(input)?;
    let mut segments = Vec::with_capacity(rest.len() + 1);
    segments.push(first);
    segments.extend(rest);
    Ok((input, segments))
}
